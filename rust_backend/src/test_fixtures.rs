//! Synthetic extracts shared by unit tests.

use std::io::Write;
use tempfile::NamedTempFile;

use crate::core::domain::{fields, REQUIRED_FIELDS, TARGET_TAG};

/// One row in [`REQUIRED_FIELDS`] order; an empty string is a missing value.
pub(crate) fn extract_row(row: usize, pole: &str, flow: &str, date: &str) -> Vec<String> {
    REQUIRED_FIELDS
        .iter()
        .map(|field| match *field {
            fields::POLE_NUMBER => pole.to_string(),
            fields::FLOW_NAME_GROUPS => flow.to_string(),
            fields::MODIFIED_DATE => date.to_string(),
            fields::MODIFIED_BY => format!("agent{}@fibertimes.co.za", row % 5),
            fields::AGENT_NAME => format!("Agent {}", row % 5),
            fields::LATITUDE => "-26.2041".to_string(),
            fields::LONGITUDE => "28.0473".to_string(),
            fields::LAT_LONG => "-26.2041, 28.0473".to_string(),
            other => format!("{} {}", other, row),
        })
        .collect()
}

/// Every 10th row lacks a pole number, every 3rd carries the target tag.
pub(crate) fn synthetic_rows(count: usize) -> Vec<Vec<String>> {
    (0..count)
        .map(|i| {
            let pole = if i % 10 == 0 {
                String::new()
            } else {
                format!("LAW.P.B{:03}", i % 20)
            };
            let flow = if i % 3 == 0 {
                format!("{}, Home Sign Ups: Approved", TARGET_TAG)
            } else {
                "Home Sign Ups: Approved & Installation Scheduled".to_string()
            };
            let date = format!("2024-03-{:02} 08:{:02}:00", 4 + i % 21, i % 60);
            extract_row(i, &pole, &flow, &date)
        })
        .collect()
}

/// Write rows under the required header to a temporary CSV file.
pub(crate) fn write_extract(rows: &[Vec<String>]) -> NamedTempFile {
    write_with_header(&REQUIRED_FIELDS, rows)
}

pub(crate) fn write_with_header(header: &[&str], rows: &[Vec<String>]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .unwrap();
    {
        let mut writer = csv::Writer::from_writer(file.as_file_mut());
        writer.write_record(header).unwrap();
        for row in rows {
            writer.write_record(row).unwrap();
        }
        writer.flush().unwrap();
    }
    file.as_file_mut().flush().unwrap();
    file
}
