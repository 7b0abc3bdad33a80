use crate::config::SelectorConfig;
use crate::errors::AppError;
use crate::heuristics;
use crate::model::{PageData, SlotRecord, StatusCounters, SubSlot, NA};
use log::{debug, trace, warn};
use scraper::{ElementRef, Html, Selector};

pub const UNKNOWN_STATION: &str = "Unknown Station";

/// Everything read from one station page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageScan {
    pub page: PageData,
    pub counters: StatusCounters,
    /// `None` when the slot container is missing from the page.
    pub slots: Option<Vec<SlotRecord>>,
}

pub struct Extractor {
    station: Selector,
    container: Selector,
    slot: Selector,
    title: Selector,
    chassis_name: Selector,
    chassis_status: Selector,
    test_time: Selector,
    link: Selector,
    panel_body: Selector,
    serial_span: Selector,
    panel_footer: Selector,
    bold_label: Selector,
    counters: [Selector; 5],
}

fn sel(s: &str) -> Result<Selector, AppError> {
    Selector::parse(s).map_err(|_| AppError::Selector(s.to_string()))
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn text_or_na(el: Option<ElementRef<'_>>) -> String {
    el.map(text_of)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NA.to_string())
}

impl Extractor {
    pub fn new(cfg: &SelectorConfig) -> Result<Self, AppError> {
        Ok(Self {
            station: sel(&cfg.tester_name)?,
            container: sel(&cfg.slots_container)?,
            slot: sel("div[id^='slot-']")?,
            title: sel("title")?,
            chassis_name: sel("span.chassisname")?,
            chassis_status: sel("span.chassisstatus")?,
            test_time: sel("span.testtime")?,
            link: sel("a")?,
            panel_body: sel("div.panel-body")?,
            serial_span: sel("span.slot-sn")?,
            panel_footer: sel("div.panel-footer")?,
            bold_label: sel("span.slot-sn.fw-bold")?,
            counters: [
                sel("#testing-counter")?,
                sel("#failing-counter")?,
                sel("#aborted-counter")?,
                sel("#failed-counter")?,
                sel("#passed-counter")?,
            ],
        })
    }

    /// All slot records on the page, in document order. Empty if the slot
    /// container is missing.
    pub fn extract(&self, doc: &Html, url: &str) -> Vec<SlotRecord> {
        let Some(container) = doc.select(&self.container).next() else {
            warn!("slot container not found on {}; page structure may differ", url);
            return vec![];
        };
        let station = self.station_name(doc);

        let slots: Vec<SlotRecord> = container
            .select(&self.slot)
            .filter(|el| el.value().id().is_some_and(heuristics::is_slot_id))
            .map(|el| self.slot_record(el, &station, url))
            .collect();
        debug!("found {} slots on {}", slots.len(), url);
        slots
    }

    pub fn has_slot_container(&self, doc: &Html) -> bool {
        doc.select(&self.container).next().is_some()
    }

    pub fn scan(&self, doc: &Html, url: &str) -> PageScan {
        let page = PageData {
            title: doc.select(&self.title).next().map(text_of).unwrap_or_default(),
            station_name: self.station_name(doc),
        };
        let counters = self.counters(doc);

        if !self.has_slot_container(doc) {
            warn!("slot container not found on {}; page structure may differ", url);
            return PageScan { page, counters, slots: None };
        }
        PageScan { page, counters, slots: Some(self.extract(doc, url)) }
    }

    pub fn station_name(&self, doc: &Html) -> String {
        doc.select(&self.station)
            .next()
            .map(text_of)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNKNOWN_STATION.to_string())
    }

    fn counters(&self, doc: &Html) -> StatusCounters {
        let [testing, failing, aborted, failed, passed] = self.counters.each_ref().map(|s| {
            doc.select(s)
                .next()
                .map(|el| heuristics::counter_value(&text_of(el)))
                .unwrap_or(0)
        });
        StatusCounters { testing, failing, aborted, failed, passed }
    }

    fn slot_record(&self, slot: ElementRef<'_>, station: &str, url: &str) -> SlotRecord {
        let id = slot.value().id().unwrap_or_default().to_string();
        let name = self.slot_name(slot, &id);
        let status = self.slot_status(slot);
        let test_time = text_or_na(slot.select(&self.test_time).next());
        let serial_number = self.serial_number(slot);
        let sub_slots = self.sub_slots(slot, &serial_number);
        let (production_info, software_version) = self.footer(slot);

        trace!(
            "slot {} name={:?} status={:?} sn={:?} subs={}",
            id, name, status, serial_number, sub_slots.len()
        );

        SlotRecord {
            id,
            name,
            status,
            test_time,
            serial_number,
            sub_slots,
            production_info,
            software_version,
            station: station.to_string(),
            url: url.to_string(),
        }
    }

    fn slot_name(&self, slot: ElementRef<'_>, id: &str) -> String {
        let from_markup = slot
            .select(&self.chassis_name)
            .next()
            .map(|el| match el.select(&self.link).next() {
                Some(a) => text_of(a),
                None => text_of(el),
            })
            .unwrap_or_default();
        if from_markup.is_empty() {
            heuristics::synthesized_name(id)
        } else {
            from_markup
        }
    }

    fn slot_status(&self, slot: ElementRef<'_>) -> String {
        let by_class = heuristics::status_from_classes(slot.value().classes()).map(str::to_string);
        let by_text = slot
            .select(&self.chassis_status)
            .next()
            .and_then(|el| heuristics::status_from_text(&text_of(el)));
        heuristics::resolve_status([by_class, by_text])
    }

    /// Only the first panel body carries the unit's own serial number.
    fn serial_number(&self, slot: ElementRef<'_>) -> String {
        let candidate = slot
            .select(&self.panel_body)
            .next()
            .and_then(|body| body.select(&self.serial_span).next())
            .and_then(|span| span.select(&self.link).next())
            .map(text_of);

        match candidate {
            Some(sn) if heuristics::is_serial_number(&sn) => sn,
            Some(sn) => {
                trace!("rejected serial candidate {:?}", sn);
                NA.to_string()
            }
            None => NA.to_string(),
        }
    }

    fn sub_slots(&self, slot: ElementRef<'_>, serial_number: &str) -> Vec<SubSlot> {
        let mut out: Vec<SubSlot> = Vec::new();
        for body in slot.select(&self.panel_body) {
            for span in body.select(&self.serial_span) {
                let Some(link) = span.select(&self.link).next() else { continue };
                let name = text_of(link);
                if name.is_empty() || !heuristics::is_sub_slot_label(&name) {
                    continue;
                }
                if name == serial_number || out.iter().any(|s| s.name == name) {
                    continue;
                }
                let status = heuristics::sub_slot_state(link.value().attr("style").unwrap_or(""));
                out.push(SubSlot { name, status });
            }
        }
        out
    }

    /// (production info, software version) from the bold footer labels.
    fn footer(&self, slot: ElementRef<'_>) -> (String, String) {
        let texts: Vec<String> = slot
            .select(&self.panel_footer)
            .next()
            .map(|footer| {
                footer
                    .select(&self.bold_label)
                    .map(text_of)
                    .filter(|t| !t.is_empty())
                    .take(2)
                    .collect()
            })
            .unwrap_or_default();
        let mut it = texts.into_iter();
        (
            it.next().unwrap_or_else(|| NA.to_string()),
            it.next().unwrap_or_else(|| NA.to_string()),
        )
    }
}
