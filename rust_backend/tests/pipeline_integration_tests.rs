//! End-to-end tests of the pole permission pipeline.
//!
//! These tests ensure that:
//! 1. A synthetic extract produces the expected weekly cohorts and QC sheets
//! 2. Every execution strategy yields the same sheet mapping
//! 3. Grouping and dedup are stable when re-applied to their own output
//! 4. Legacy-encoded extracts survive the whole run
//! 5. Dumped sheets can be read back

mod common;

use std::io::Write;

use common::{pipeline, row, synthetic_rows, write_extract};
use polars::prelude::*;
use veloverify::config::{DuplicatePolicy, EncodingPreference, PipelineConfig};
use veloverify::core::domain::{fields, sheets, REQUIRED_FIELDS, TARGET_TAG};
use veloverify::execution::{select_strategy, ExecutionStrategy};
use veloverify::io::{dump_sheets_csv, DatasetLoader};
use veloverify::preprocessing::{DataValidator, Severity};
use veloverify::transformations::{deduplicate, filter_target_rows, group_by_weeks, qc_partition};

const MB: u64 = 1024 * 1024;

fn column_values(df: &DataFrame, name: &str) -> Vec<Option<String>> {
    df.column(name)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

// ==================== Full run ====================

#[test]
fn test_synthetic_extract_end_to_end() {
    let file = write_extract(&synthetic_rows(100));
    let output = pipeline(PipelineConfig::default())
        .process(file.path())
        .unwrap();

    assert_eq!(output.stats.pole_permission_records, 34);
    assert_eq!(output.stats.no_pole_allocated, 4);
    assert_eq!(output.stats.unique_poles, 18);

    let cohorts: Vec<(String, usize)> = output
        .sheets
        .weekly_sheets()
        .map(|s| (s.name.clone(), s.data.height()))
        .collect();
    assert_eq!(
        cohorts,
        vec![
            ("Week_Ending_2024-03-10".to_string(), 9),
            ("Week_Ending_2024-03-17".to_string(), 6),
            ("Week_Ending_2024-03-24".to_string(), 3),
        ]
    );

    // Every weekly row is tagged with its own Sunday
    for sheet in output.sheets.weekly_sheets() {
        let day = sheet.name.trim_start_matches(sheets::WEEK_PREFIX);
        let expected = format!("{} 23:59:59.999", day);
        assert!(column_values(&sheet.data, fields::WEEK_ENDING)
            .iter()
            .all(|v| v.as_deref() == Some(expected.as_str())));
    }

    // No pole appears in two cohorts
    let mut poles: Vec<String> = output
        .sheets
        .weekly_sheets()
        .flat_map(|s| column_values(&s.data, fields::POLE_NUMBER))
        .flatten()
        .collect();
    let total = poles.len();
    poles.sort();
    poles.dedup();
    assert_eq!(poles.len(), total);
}

#[test]
fn test_duplicates_keep_earliest_visit() {
    let rows = vec![
        row(0, "LAW.P.A001", TARGET_TAG, "2024-03-14 10:00:00"),
        row(1, "LAW.P.A001", TARGET_TAG, "2024-03-12 09:00:00"),
        row(2, "LAW.P.A001", TARGET_TAG, "2024-03-19 07:00:00"),
        row(3, "LAW.P.A002", TARGET_TAG, "2024-03-13 08:00:00"),
    ];
    let file = write_extract(&rows);
    let output = pipeline(PipelineConfig::default())
        .process(file.path())
        .unwrap();

    let week = output.sheets.get("Week_Ending_2024-03-17").unwrap();
    assert_eq!(week.height(), 2);
    let dates = column_values(week, fields::MODIFIED_DATE);
    assert!(dates.contains(&Some("2024-03-12 09:00:00".to_string())));
    assert!(!output.sheets.contains("Week_Ending_2024-03-24"));

    let removed = output.sheets.get(sheets::DUPLICATES).unwrap();
    assert_eq!(removed.height(), 2);
}

#[test]
fn test_rows_without_target_tag_are_ignored() {
    let rows = vec![
        row(0, "LAW.P.A001", "Home Sign Ups: Approved", "2024-03-12 09:00:00"),
        row(1, "LAW.P.A002", "Pole Permission: Declined", "2024-03-12 09:00:00"),
    ];
    let file = write_extract(&rows);
    let output = pipeline(PipelineConfig::default())
        .process(file.path())
        .unwrap();

    assert_eq!(output.stats.total_input_records, 2);
    assert_eq!(output.stats.pole_permission_records, 0);
    assert_eq!(output.sheets.weekly_sheets().count(), 0);
    assert_eq!(output.sheets.names(), vec![sheets::SUMMARY]);
}

#[test]
fn test_qc_on_unfiltered_extract() {
    let file = write_extract(&synthetic_rows(100));
    let loaded = DatasetLoader::load_checked(file.path(), EncodingPreference::Auto).unwrap();

    let qc = qc_partition(&loaded.dataframe).unwrap();
    assert_eq!(qc.no_key_field.height(), 10);
    assert_eq!(qc.clean.height() + qc.date_parse_error.height(), 90);

    // Tagged rows minus the tagged rows without a key
    let tagged = filter_target_rows(&loaded.dataframe).unwrap();
    let tagged_qc = qc_partition(&tagged).unwrap();
    assert_eq!(tagged.height(), 34);
    assert_eq!(tagged_qc.clean.height(), 34 - tagged_qc.no_key_field.height());
    assert_eq!(tagged_qc.clean.height(), 30);
}

// ==================== Strategies ====================

#[test]
fn test_strategy_selection_thresholds() {
    assert_eq!(select_strategy(10 * MB, 1024 * MB), ExecutionStrategy::MemoryEfficient);
    assert_eq!(select_strategy(10 * MB, 30 * MB), ExecutionStrategy::DiskBased);
    assert_eq!(select_strategy(200 * MB, 1024 * MB), ExecutionStrategy::ChunkedParallel);
}

#[test]
fn test_every_strategy_produces_the_same_sheets() {
    let file = write_extract(&synthetic_rows(250));
    let mut config = PipelineConfig::default();
    config.processing.chunk_size = 16;

    let outputs: Vec<_> = [
        ExecutionStrategy::MemoryEfficient,
        ExecutionStrategy::ChunkedParallel,
        ExecutionStrategy::DiskBased,
    ]
    .into_iter()
    .map(|strategy| {
        pipeline(config.clone())
            .with_strategy(strategy)
            .process(file.path())
            .unwrap()
    })
    .collect();

    let reference = &outputs[0];
    for output in &outputs[1..] {
        assert_eq!(output.sheets.names(), reference.sheets.names());
        for sheet in output.sheets.weekly_sheets() {
            let expected = reference.sheets.get(&sheet.name).unwrap();
            assert!(
                sheet.data.equals_missing(expected),
                "{} differs under {}",
                sheet.name,
                output.performance.strategy
            );
        }
        assert_eq!(output.stats.duplicates_removed, reference.stats.duplicates_removed);
    }
    assert!(outputs[1].stats.chunks_processed > 1);
}

// ==================== Idempotence ====================

#[test]
fn test_grouping_and_dedup_are_stable() {
    let file = write_extract(&synthetic_rows(100));
    let output = pipeline(PipelineConfig::default())
        .process(file.path())
        .unwrap();

    for sheet in output.sheets.weekly_sheets() {
        let regrouped = group_by_weeks(&sheet.data).unwrap();
        assert_eq!(regrouped.len(), 1);
        assert_eq!(regrouped[0].sheet_name(), sheet.name);
        assert!(regrouped[0].data.equals_missing(&sheet.data));

        let again = deduplicate(&sheet.data, &[fields::POLE_NUMBER], DuplicatePolicy::EarliestDate)
            .unwrap();
        assert_eq!(again.duplicates.height(), 0);
        assert_eq!(again.unique.height(), sheet.data.height());
    }
}

// ==================== Encodings and output ====================

#[test]
fn test_legacy_encoded_extract() {
    let mut bytes = REQUIRED_FIELDS.join(",").into_bytes();
    bytes.push(b'\n');
    let mut record = row(1, "LAW.P.E001", TARGET_TAG, "2024-03-13 08:00:00");
    record[13] = "Ren\u{e9}".to_string();
    let line = record
        .iter()
        .map(|v| if v.contains(',') { format!("\"{}\"", v) } else { v.clone() })
        .collect::<Vec<_>>()
        .join(",");
    let (encoded, _, _) = encoding_rs::WINDOWS_1252.encode(&line);
    bytes.extend_from_slice(&encoded);
    bytes.push(b'\n');

    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();

    let output = pipeline(PipelineConfig::default())
        .process(file.path())
        .unwrap();
    assert_eq!(output.stats.encoding.as_deref(), Some("windows-1252"));
    let week = output.sheets.get("Week_Ending_2024-03-17").unwrap();
    assert_eq!(
        column_values(week, fields::AGENT_NAME),
        vec![Some("Ren\u{e9}".to_string())]
    );
}

#[test]
fn test_dumped_sheets_read_back() {
    let file = write_extract(&synthetic_rows(100));
    let output = pipeline(PipelineConfig::default())
        .process(file.path())
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let written = dump_sheets_csv(&output.sheets, dir.path()).unwrap();
    assert_eq!(written.len(), output.sheets.len());

    let first = DatasetLoader::load_from_file(&written[0], EncodingPreference::Utf8).unwrap();
    let expected = output.sheets.weekly_sheets().next().unwrap();
    assert_eq!(first.num_rows, expected.data.height());
    assert_eq!(
        column_values(&first.dataframe, fields::POLE_NUMBER),
        column_values(&expected.data, fields::POLE_NUMBER)
    );
}

// ==================== Validation ====================

#[test]
fn test_validation_of_synthetic_extract() {
    let file = write_extract(&synthetic_rows(100));
    let loaded = DatasetLoader::load_checked(file.path(), EncodingPreference::Auto).unwrap();
    let report = DataValidator::new(Default::default()).validate(&loaded.dataframe);

    assert!(!report.is_valid);
    let empty_keys = report
        .errors
        .iter()
        .find(|f| f.message == "Empty pole numbers found")
        .unwrap();
    assert_eq!(empty_keys.count, 10);
    assert_eq!(empty_keys.severity, Severity::Error);
    assert_eq!(report.stats.total_rows, 100);
}

#[test]
fn test_validation_of_empty_extract() {
    let file = write_extract(&[]);
    let loaded = DatasetLoader::load_from_csv(file.path(), EncodingPreference::Auto).unwrap();
    let report = DataValidator::new(Default::default()).validate(&loaded.dataframe);

    assert!(!report.is_valid);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].message, "Dataset is empty");
}
