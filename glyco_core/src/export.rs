//! CSV export of readings for reports.

use crate::{GlucoseReading, Result};
use std::fs::File;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    timestamp: String,
    value_mg_dl: u16,
    trend: &'static str,
    insulin_on_board: String,
    note: Option<String>,
}

impl From<&GlucoseReading> for CsvRow {
    fn from(reading: &GlucoseReading) -> Self {
        CsvRow {
            id: reading.id.to_string(),
            timestamp: reading.timestamp.to_rfc3339(),
            value_mg_dl: reading.value,
            trend: reading.trend.as_str(),
            insulin_on_board: format!("{:.2}", reading.insulin_on_board),
            note: reading.note.clone(),
        }
    }
}

/// Write `readings` to a fresh CSV file at `path`
///
/// The file is fsynced before returning. Returns the number of rows written.
pub fn export_readings_csv(readings: &[GlucoseReading], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(file);

    for reading in readings {
        writer.serialize(CsvRow::from(reading))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} readings to {:?}", readings.len(), path);
    Ok(readings.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Trend;
    use chrono::Utc;

    #[test]
    fn test_export_writes_header_and_rows() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("report/readings.csv");

        let readings = vec![
            GlucoseReading::new(Utc::now(), 95, Trend::Steady, 0.0),
            GlucoseReading::new(Utc::now(), 182, Trend::DoubleUp, 2.346).with_note("birthday cake"),
        ];

        let count = export_readings_csv(&readings, &path).unwrap();
        assert_eq!(count, 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,timestamp,value_mg_dl,trend,insulin_on_board,note"));
        assert!(lines[2].contains(",182,double_up,2.35,birthday cake"));
    }

    #[test]
    fn test_export_empty_writes_nothing_but_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("empty.csv");
        assert_eq!(export_readings_csv(&[], &path).unwrap(), 0);
        assert!(path.exists());
    }
}
