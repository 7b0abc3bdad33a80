use serde::{Serialize, Serializer};

pub const NA: &str = "N/A";
pub const EMPTY: &str = "empty";
pub const AVAILABLE: &str = "available";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubSlot {
    pub name: String,
    pub status: SubSlotState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubSlotState {
    Active,
    Inactive,
}

impl SubSlotState {
    pub fn as_str(self) -> &'static str {
        match self {
            SubSlotState::Active => "active",
            SubSlotState::Inactive => "inactive",
        }
    }
}

/// One slot container as found on a station page.
///
/// The legacy aliases (`result`, `slot_name`, `sn`, `station`, `test_time`,
/// `url`, `led`) are not stored; they are derived from these fields whenever
/// the record is serialized or `legacy()` is called.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotRecord {
    pub id: String,
    pub name: String,
    pub status: String,
    pub test_time: String,
    pub serial_number: String,
    pub sub_slots: Vec<SubSlot>,
    pub production_info: String,
    pub software_version: String,
    pub station: String,
    pub url: String,
}

impl SlotRecord {
    pub fn is_active(&self) -> bool {
        crate::heuristics::is_active_status(&self.status)
    }

    pub fn result(&self) -> &str {
        if self.is_active() { &self.status } else { EMPTY }
    }

    pub fn legacy(&self) -> LegacyView {
        LegacyView {
            led: false,
            result: self.result().to_string(),
            slot_name: self.name.clone(),
            sn: self.serial_number.clone(),
            station: self.station.clone(),
            test_time: self.test_time.clone(),
            url: self.url.clone(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SlotWire<'a> {
    id: &'a str,
    name: &'a str,
    status: &'a str,
    test_time: &'a str,
    serial_number: &'a str,
    sub_slots: &'a [SubSlot],
    production_info: &'a str,
    software_version: &'a str,
    #[serde(flatten)]
    legacy: LegacyView,
}

impl Serialize for SlotRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SlotWire {
            id: &self.id,
            name: &self.name,
            status: &self.status,
            test_time: &self.test_time,
            serial_number: &self.serial_number,
            sub_slots: &self.sub_slots,
            production_info: &self.production_info,
            software_version: &self.software_version,
            legacy: self.legacy(),
        }
        .serialize(serializer)
    }
}

/// Field set consumed by older dashboards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LegacyView {
    pub led: bool,
    pub result: String,
    pub slot_name: String,
    pub sn: String,
    pub station: String,
    pub test_time: String,
    pub url: String,
}

impl LegacyView {
    /// The single record reported for a station that could not be reached.
    pub fn offline(url: &str) -> Self {
        LegacyView {
            led: false,
            result: EMPTY.into(),
            slot_name: "Offline".into(),
            sn: String::new(),
            station: "Offline".into(),
            test_time: NA.into(),
            url: url.to_string(),
        }
    }
}

/// What a station run contributes to the flat slot list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StationRecord {
    Slot(SlotRecord),
    Offline(LegacyView),
}

impl StationRecord {
    pub fn legacy(&self) -> LegacyView {
        match self {
            StationRecord::Slot(s) => s.legacy(),
            StationRecord::Offline(l) => l.clone(),
        }
    }

    pub fn status(&self) -> &str {
        match self {
            StationRecord::Slot(s) => &s.status,
            StationRecord::Offline(_) => "offline",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounters {
    pub testing: u32,
    pub failing: u32,
    pub aborted: u32,
    pub failed: u32,
    pub passed: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData {
    pub title: String,
    pub station_name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Success,
    Error,
}

#[derive(Clone, Debug, Serialize)]
pub struct StationSnapshot {
    pub id: String,
    pub name: String,
    pub url: String,
    pub timestamp: String,
    pub status: SnapshotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "pageData")]
    pub page_data: PageData,
    pub counters: StatusCounters,
    pub slots: Vec<StationRecord>,
}
