//! Session log export: JSON and CSV dumps, run once after capture stops.
//!
//! Both writers overwrite their target unconditionally and make no
//! atomicity guarantee; a crash mid-write leaves a partial file.

use std::fs;
use std::path::Path;

use anyhow::Result;

use crate::session::SessionLog;

const CSV_HEADER: [&str; 5] = ["timestamp", "src", "dst", "size", "protocol"];

/// Write the full log as a pretty-printed JSON array, in capture order.
pub fn export_json(log: &SessionLog, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(log.records())?;
    fs::write(path, json)?;
    Ok(())
}

/// Write the full log as CSV with a header row, in capture order.
pub fn export_csv(log: &SessionLog, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CSV_HEADER)?;
    for record in log.records() {
        let size = record.size.to_string();
        writer.write_record([
            record.timestamp.as_str(),
            record.source.as_str(),
            record.destination.as_str(),
            size.as_str(),
            record.protocol.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
