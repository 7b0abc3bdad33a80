use crate::config::{RunConfig, StationConfig};
use crate::errors::AppError;
use crate::extract::{Extractor, PageScan};
use crate::fetch;
use crate::model::{
    LegacyView, PageData, SnapshotStatus, StationRecord, StationSnapshot, StatusCounters,
};
use chrono::{FixedOffset, Utc};
use log::{debug, info, warn};
use reqwest::Client;
use scraper::Html;
use std::collections::{BTreeMap, HashMap};

fn timestamp(tz_offset: Option<FixedOffset>) -> String {
    let now = Utc::now();
    match tz_offset {
        Some(off) => now.with_timezone(&off).to_rfc3339(),
        None => now.to_rfc3339(),
    }
}

/// Parse and extract in one synchronous step; the tree never outlives it.
fn scan_page(extractor: &Extractor, body: &str, url: &str) -> PageScan {
    let doc = Html::parse_document(body);
    extractor.scan(&doc, url)
}

fn snapshot(station: &StationConfig, tz_offset: Option<FixedOffset>) -> StationSnapshot {
    StationSnapshot {
        id: station.id.clone(),
        name: station.name.clone(),
        url: station.url.clone(),
        timestamp: timestamp(tz_offset),
        status: SnapshotStatus::Success,
        error: None,
        page_data: PageData::default(),
        counters: StatusCounters::default(),
        slots: vec![],
    }
}

fn failed(mut snap: StationSnapshot, err: String, slots: Vec<StationRecord>) -> StationSnapshot {
    snap.status = SnapshotStatus::Error;
    snap.error = Some(err);
    snap.slots = slots;
    snap
}

/// Scrape one station. Never fails: an unreachable station yields the single
/// Offline record, a non-200 answer or an unrecognised page yields no slots.
pub async fn scrape_station(
    client: &Client,
    station: &StationConfig,
    tz_offset: Option<FixedOffset>,
) -> StationSnapshot {
    let snap = snapshot(station, tz_offset);

    let extractor = match Extractor::new(&station.selectors) {
        Ok(x) => x,
        Err(e) => {
            warn!("{}: {}", station.id, e);
            return failed(snap, e.to_string(), vec![]);
        }
    };

    let body = match fetch::fetch_page(client, &station.url).await {
        Ok(b) => b,
        Err(e @ AppError::Transport(_)) => {
            warn!("could not connect to {}; it may be offline ({})", station.url, e);
            let offline = StationRecord::Offline(LegacyView::offline(&station.url));
            return failed(snap, e.to_string(), vec![offline]);
        }
        Err(e) => {
            warn!("{}: {}; skipping extraction", station.id, e);
            return failed(snap, e.to_string(), vec![]);
        }
    };

    let scan = scan_page(&extractor, &body, &station.url);
    let mut snap = StationSnapshot { page_data: scan.page, counters: scan.counters, ..snap };
    match scan.slots {
        Some(slots) => {
            info!("{}: {} slots", station.id, slots.len());
            snap.slots = slots.into_iter().map(StationRecord::Slot).collect();
            snap
        }
        None => failed(snap, "slot container not found".into(), vec![]),
    }
}

/// Scrape every enabled station concurrently; results keep config order.
pub async fn run_all(
    cfg: &RunConfig,
    tz_offset: Option<FixedOffset>,
) -> Result<Vec<StationSnapshot>, AppError> {
    let client = fetch::build_client(cfg.timeout())?;

    let mut tasks = Vec::new();
    for station in cfg.enabled() {
        let station = station.clone();
        let client = client.clone();
        let t = tokio::spawn(async move { scrape_station(&client, &station, tz_offset).await });
        tasks.push(t);
    }

    let mut out = Vec::with_capacity(tasks.len());
    for t in tasks {
        let snap = t.await.map_err(|e| AppError::IO(format!("station task join: {e}")))?;
        out.push(snap);
    }
    Ok(out)
}

/// Flat record list across all stations, in order.
pub fn flatten(snaps: &[StationSnapshot]) -> Vec<StationRecord> {
    snaps.iter().flat_map(|s| s.slots.iter().cloned()).collect()
}

pub fn status_distribution(records: &[StationRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for r in records {
        *counts.entry(r.status().to_string()).or_insert(0) += 1;
    }
    counts
}

pub fn log_status_distribution(records: &[StationRecord]) {
    info!("{} slots processed", records.len());
    for (status, n) in status_distribution(records) {
        info!("  {}: {}", status, n);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SnapshotChanges {
    pub status_changed: bool,
    pub counters_changed: bool,
    pub slots_changed: bool,
    pub new_failing_slots: Vec<String>,
    pub new_passed_slots: Vec<String>,
    pub new_testing_slots: Vec<String>,
}

impl SnapshotChanges {
    pub fn has_changes(&self) -> bool {
        self.status_changed || self.counters_changed || self.slots_changed
    }
}

/// Compare two runs of the same station. Slots are matched by name; a slot
/// count change is reported without a per-slot diff.
pub fn detect_changes(prev: &StationSnapshot, cur: &StationSnapshot) -> SnapshotChanges {
    let mut changes = SnapshotChanges {
        status_changed: prev.status != cur.status,
        counters_changed: prev.counters != cur.counters,
        ..SnapshotChanges::default()
    };

    if prev.slots.len() != cur.slots.len() {
        changes.slots_changed = true;
        return changes;
    }

    let before: HashMap<String, &StationRecord> =
        prev.slots.iter().map(|r| (r.legacy().slot_name, r)).collect();

    for slot in &cur.slots {
        let now = slot.legacy();
        let Some(old) = before.get(&now.slot_name) else {
            changes.slots_changed = true;
            continue;
        };
        if old.status() != slot.status() {
            changes.slots_changed = true;
            let name = now.slot_name.clone();
            match slot.status() {
                "failing" => changes.new_failing_slots.push(name),
                "passed" => changes.new_passed_slots.push(name),
                "testing" => changes.new_testing_slots.push(name),
                _ => {}
            }
        } else if old.legacy().test_time != now.test_time {
            changes.slots_changed = true;
        }
    }
    changes
}

/// Last snapshot seen per station id, for watch mode.
#[derive(Default)]
pub struct ChangeTracker {
    previous: HashMap<String, StationSnapshot>,
}

impl ChangeTracker {
    /// `None` the first time a station is seen.
    pub fn observe(&mut self, cur: &StationSnapshot) -> Option<SnapshotChanges> {
        let changes = self.previous.get(&cur.id).map(|prev| detect_changes(prev, cur));
        self.previous.insert(cur.id.clone(), cur.clone());
        changes
    }
}

pub fn log_changes(station_id: &str, changes: &SnapshotChanges) {
    if !changes.has_changes() {
        debug!("{}: no changes", station_id);
        return;
    }
    if changes.status_changed {
        info!("{}: station status changed", station_id);
    }
    if changes.counters_changed {
        info!("{}: counters changed", station_id);
    }
    if changes.slots_changed {
        info!("{}: slots changed", station_id);
    }
    if !changes.new_failing_slots.is_empty() {
        warn!("{}: now failing: {}", station_id, changes.new_failing_slots.join(", "));
    }
    if !changes.new_passed_slots.is_empty() {
        info!("{}: now passed: {}", station_id, changes.new_passed_slots.join(", "));
    }
    if !changes.new_testing_slots.is_empty() {
        info!("{}: now testing: {}", station_id, changes.new_testing_slots.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::time::Duration;

    /// Serves exactly one canned HTTP response on a random local port.
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut chunk).unwrap();
                if n == 0 { break; }
                buf.extend_from_slice(&chunk[..n]);
            }
            let resp = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            sock.write_all(resp.as_bytes()).unwrap();
        });
        format!("http://{}", addr)
    }

    fn client() -> Client {
        fetch::build_client(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn refused_connection_is_offline() {
        let url = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", l.local_addr().unwrap())
        };
        let snap = scrape_station(&client(), &StationConfig::from_url(&url), None).await;
        assert_eq!(snap.status, SnapshotStatus::Error);
        assert_eq!(snap.slots, vec![StationRecord::Offline(LegacyView::offline(&url))]);
    }

    #[tokio::test]
    async fn server_error_yields_no_slots() {
        let url = serve_once("500 Internal Server Error", "oops");
        let snap = scrape_station(&client(), &StationConfig::from_url(&url), None).await;
        assert_eq!(snap.status, SnapshotStatus::Error);
        assert!(snap.error.unwrap().contains("500"));
        assert!(snap.slots.is_empty());
    }

    #[tokio::test]
    async fn page_without_container_yields_no_slots() {
        let url = serve_once("200 OK", "<html><body><p>maintenance</p></body></html>");
        let snap = scrape_station(&client(), &StationConfig::from_url(&url), None).await;
        assert!(snap.slots.is_empty());
        assert_eq!(snap.page_data.station_name, "Unknown Station");
    }

    #[tokio::test]
    async fn live_page_is_extracted() {
        let url = serve_once("200 OK", include_str!("../fixtures/station.html"));
        let cfg = RunConfig::single(&url);
        let snaps = run_all(&cfg, None).await.unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].status, SnapshotStatus::Success);
        assert_eq!(snaps[0].counters.passed, 2);

        let records = flatten(&snaps);
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.legacy().station == "ESS08" && r.legacy().url == url));

        let dist = status_distribution(&records);
        assert_eq!(dist.get("testing"), Some(&1));
        assert_eq!(dist.get("available"), Some(&1));
    }

    fn slot(name: &str, status: &str, test_time: &str) -> StationRecord {
        StationRecord::Slot(crate::model::SlotRecord {
            id: format!("slot-{}", &name[4..]),
            name: name.into(),
            status: status.into(),
            test_time: test_time.into(),
            serial_number: "N/A".into(),
            sub_slots: vec![],
            production_info: "N/A".into(),
            software_version: "N/A".into(),
            station: "ESS08".into(),
            url: "http://h:1".into(),
        })
    }

    fn run(slots: Vec<StationRecord>) -> StationSnapshot {
        StationSnapshot { slots, ..snapshot(&StationConfig::from_url("http://h:1"), None) }
    }

    #[test]
    fn first_run_has_nothing_to_compare() {
        let mut tracker = ChangeTracker::default();
        assert_eq!(tracker.observe(&run(vec![slot("SLOT01", "testing", "00:01")])), None);
    }

    #[test]
    fn identical_runs_report_no_change() {
        let mut tracker = ChangeTracker::default();
        let snap = run(vec![slot("SLOT01", "testing", "00:01")]);
        tracker.observe(&snap);
        let changes = tracker.observe(&snap).unwrap();
        assert!(!changes.has_changes());
        assert_eq!(changes, SnapshotChanges::default());
    }

    #[test]
    fn slot_flipping_to_failing_is_reported() {
        let prev = run(vec![slot("SLOT01", "testing", "00:01"), slot("SLOT02", "available", "N/A")]);
        let cur = run(vec![slot("SLOT01", "failing", "00:01"), slot("SLOT02", "testing", "00:00")]);
        let changes = detect_changes(&prev, &cur);
        assert!(changes.slots_changed);
        assert!(!changes.status_changed);
        assert_eq!(changes.new_failing_slots, ["SLOT01"]);
        assert_eq!(changes.new_testing_slots, ["SLOT02"]);
        assert!(changes.new_passed_slots.is_empty());
    }

    #[test]
    fn test_time_alone_counts_as_slot_change() {
        let prev = run(vec![slot("SLOT01", "testing", "00:01")]);
        let cur = run(vec![slot("SLOT01", "testing", "00:02")]);
        let changes = detect_changes(&prev, &cur);
        assert!(changes.slots_changed);
        assert!(changes.new_testing_slots.is_empty());
    }

    #[test]
    fn slot_count_and_counters_and_status() {
        let prev = run(vec![slot("SLOT01", "testing", "00:01")]);
        let mut cur = run(vec![
            slot("SLOT01", "passed", "01:00"),
            slot("SLOT02", "testing", "00:00"),
        ]);
        cur.counters.passed = 1;
        cur.status = SnapshotStatus::Error;
        let changes = detect_changes(&prev, &cur);
        assert!(changes.slots_changed);
        assert!(changes.counters_changed);
        assert!(changes.status_changed);
        assert!(changes.new_passed_slots.is_empty());
    }

    #[test]
    fn timestamp_honours_offset() {
        let off = FixedOffset::east_opt(2 * 3600).unwrap();
        assert!(timestamp(Some(off)).ends_with("+02:00"));
    }
}
