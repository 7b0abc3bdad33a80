use crate::errors::AppError;
use crate::model::StationRecord;
use csv::Writer;
use log::info;
use std::io::Write;

const HEADER: [&str; 11] = [
    "station", "slot_name", "result", "sn", "test_time", "url",
    "status", "production_info", "software_version", "sub_slots", "led",
];

/// `SLOT01_01:active;SLOT01_02:inactive`
fn sub_slot_summary(r: &StationRecord) -> String {
    match r {
        StationRecord::Slot(s) => s
            .sub_slots
            .iter()
            .map(|sub| format!("{}:{}", sub.name, sub.status.as_str()))
            .collect::<Vec<_>>()
            .join(";"),
        StationRecord::Offline(_) => String::new(),
    }
}

pub fn write_csv<W: Write>(records: &[StationRecord], out: W) -> Result<(), AppError> {
    let mut wtr = Writer::from_writer(out);
    wtr.write_record(HEADER)?;

    for r in records {
        let l = r.legacy();
        let (production_info, software_version) = match r {
            StationRecord::Slot(s) => (s.production_info.as_str(), s.software_version.as_str()),
            StationRecord::Offline(_) => ("", ""),
        };
        wtr.write_record([
            l.station.as_str(),
            l.slot_name.as_str(),
            l.result.as_str(),
            l.sn.as_str(),
            l.test_time.as_str(),
            l.url.as_str(),
            r.status(),
            production_info,
            software_version,
            sub_slot_summary(r).as_str(),
            if l.led { "true" } else { "false" },
        ])?;
    }

    wtr.flush()?;
    info!("CSV wrote {} rows", records.len());
    Ok(())
}
