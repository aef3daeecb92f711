//! Extract builders shared by the integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;

use tempfile::NamedTempFile;
use veloverify::config::PipelineConfig;
use veloverify::core::domain::{fields, REQUIRED_FIELDS, TARGET_TAG};
use veloverify::execution::FixedMemoryProbe;
use veloverify::preprocessing::ProcessingPipeline;

pub const GIB: u64 = 1024 * 1024 * 1024;

/// One extract row in header order.
pub fn row(index: usize, pole: &str, flow: &str, date: &str) -> Vec<String> {
    REQUIRED_FIELDS
        .iter()
        .map(|field| match *field {
            fields::POLE_NUMBER => pole.to_string(),
            fields::FLOW_NAME_GROUPS => flow.to_string(),
            fields::MODIFIED_DATE => date.to_string(),
            fields::MODIFIED_BY => format!("agent{}@fibertimes.co.za", index % 5),
            fields::AGENT_NAME => format!("Agent {}", index % 5),
            fields::LATITUDE => "-26.2041".to_string(),
            fields::LONGITUDE => "28.0473".to_string(),
            fields::LAT_LONG => "-26.2041, 28.0473".to_string(),
            other => format!("{} {}", other, index),
        })
        .collect()
}

/// 100-row style extract: every 10th row has no pole, every 3rd is tagged.
pub fn synthetic_rows(count: usize) -> Vec<Vec<String>> {
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
            row(i, &pole, &flow, &date)
        })
        .collect()
}

pub fn write_extract(rows: &[Vec<String>]) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    {
        let mut writer = csv::Writer::from_writer(file.as_file_mut());
        writer.write_record(REQUIRED_FIELDS).unwrap();
        for row in rows {
            writer.write_record(row).unwrap();
        }
        writer.flush().unwrap();
    }
    file.as_file_mut().flush().unwrap();
    file
}

/// Pipeline that always sees plenty of memory.
pub fn pipeline(config: PipelineConfig) -> ProcessingPipeline {
    ProcessingPipeline::new(config).with_memory_probe(Arc::new(FixedMemoryProbe::with_available(GIB)))
}
