//! Data validation with detailed error, warning and info reporting.
//!
//! This module checks a pole permission extract for completeness, consistency
//! and plausibility. It runs independently of the processing pipeline and can
//! be pointed at the raw or the filtered dataset. Every check appends findings
//! to a [`ValidationReport`]; nothing in here fails on malformed data.

use chrono::{Duration, Local, NaiveDateTime};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::config::DataValidationSettings;
use crate::core::domain::{is_blank, SECONDARY_TAG, TARGET_TAG};
use crate::core::schema::{CanonicalField, ColumnMap};
use crate::error::PipelineResult;
use crate::parsing::csv_parser::column_names;
use crate::time::parse_timestamp;
use crate::transformations::filtering::contains_tag;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

static COLUMN_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9\s()&_-]+$").expect("valid column name regex"));

static KEY_SPECIAL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("valid key character regex"));

/// Datasets above this many rows get a performance warning.
const LARGE_DATASET_ROWS: usize = 100_000;

/// Modification dates older than this are reported as info.
const VERY_OLD_DAYS: i64 = 3650;

/// Columns covered by the unique-value statistic.
const UNIQUE_STATS_COLUMNS: usize = 10;

const FLOW_TYPES: [&str; 3] = [SECONDARY_TAG, "Pole Permission", "Service Installation"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(label)
    }
}

/// One observation made by a check.
///
/// `affected_rows` holds zero-based row positions; `count` is its size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub severity: Severity,
    pub message: String,
    pub affected_rows: BTreeSet<usize>,
    pub count: usize,
}

impl ValidationFinding {
    fn new<I>(severity: Severity, message: impl Into<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let affected_rows: BTreeSet<usize> = rows.into_iter().collect();
        Self {
            severity,
            message: message.into(),
            count: affected_rows.len(),
            affected_rows,
        }
    }
}

/// Summary statistics computed during validation.
///
/// # Fields
///
/// * `total_rows` - Number of rows validated
/// * `total_columns` - Number of columns in the dataset
/// * `missing_data_percentage` - Share of null cells over all cells
/// * `duplicate_rows` - Rows identical to an earlier row in every column
/// * `unique_values_per_column` - Distinct non-null values of the first ten columns
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationStats {
    pub total_rows: usize,
    pub total_columns: usize,
    pub missing_data_percentage: f64,
    pub duplicate_rows: usize,
    pub unique_values_per_column: Vec<(String, usize)>,
}

/// Validation outcome with findings grouped by severity.
///
/// Errors make `is_valid` false; warnings and info never do.
///
/// # Examples
///
/// ```
/// use veloverify::preprocessing::validator::ValidationReport;
///
/// let mut report = ValidationReport::new();
/// assert!(report.is_valid);
///
/// report.add_warning("Empty flow name groups", [3, 7]);
/// assert!(report.is_valid);
///
/// report.add_error("Empty pole numbers found", [1]);
/// assert!(!report.is_valid);
/// assert_eq!(report.errors[0].count, 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationFinding>,
    pub warnings: Vec<ValidationFinding>,
    pub info: Vec<ValidationFinding>,
    pub stats: ValidationStats,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            info: Vec::new(),
            stats: ValidationStats::default(),
        }
    }

    /// Adds an error finding and marks the report invalid.
    pub fn add_error<I>(&mut self, message: impl Into<String>, rows: I)
    where
        I: IntoIterator<Item = usize>,
    {
        self.is_valid = false;
        self.errors
            .push(ValidationFinding::new(Severity::Error, message, rows));
    }

    pub fn add_warning<I>(&mut self, message: impl Into<String>, rows: I)
    where
        I: IntoIterator<Item = usize>,
    {
        self.warnings
            .push(ValidationFinding::new(Severity::Warning, message, rows));
    }

    pub fn add_info<I>(&mut self, message: impl Into<String>, rows: I)
    where
        I: IntoIterator<Item = usize>,
    {
        self.info
            .push(ValidationFinding::new(Severity::Info, message, rows));
    }

    /// Every finding, errors first.
    pub fn findings(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .chain(self.info.iter())
    }

    /// Plain-text summary listing errors and warnings with their row counts.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!(
                "Validation Status: {}",
                if self.is_valid { "PASSED" } else { "FAILED" }
            ),
            format!("Errors: {}", self.errors.len()),
            format!("Warnings: {}", self.warnings.len()),
        ];

        for (title, findings) in [("ERRORS:", &self.errors), ("WARNINGS:", &self.warnings)] {
            if findings.is_empty() {
                continue;
            }
            lines.push(String::new());
            lines.push(title.to_string());
            for finding in findings {
                lines.push(format!("  - {} ({} rows)", finding.message, finding.count));
            }
        }

        lines.join("\n")
    }
}

/// Rule engine validating a dataset against the extract's expectations.
///
/// The reference time for future/old date checks is captured at construction
/// and can be pinned with [`DataValidator::with_now`].
///
/// # Examples
///
/// ```no_run
/// use veloverify::config::DataValidationSettings;
/// use veloverify::preprocessing::validator::DataValidator;
/// use polars::prelude::*;
///
/// # fn example(df: &DataFrame) {
/// let report = DataValidator::new(DataValidationSettings::default()).validate(df);
/// if !report.is_valid {
///     eprintln!("{}", report.summary());
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DataValidator {
    settings: DataValidationSettings,
    now: NaiveDateTime,
}

impl DataValidator {
    pub fn new(settings: DataValidationSettings) -> Self {
        Self {
            settings,
            now: Local::now().naive_local(),
        }
    }

    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    /// Run every check over `df`.
    ///
    /// An unexpected failure inside a check ends validation with one
    /// additional error finding instead of an error return.
    pub fn validate(&self, df: &DataFrame) -> ValidationReport {
        log::info!("Starting data validation");
        let mut report = ValidationReport::new();

        if let Err(e) = self.run_checks(df, &mut report) {
            log::error!("Validation exception: {}", e);
            report.add_error(
                format!("Validation failed with exception: {}", e),
                std::iter::empty(),
            );
        }

        log::info!(
            "Validation completed: {} errors, {} warnings",
            report.errors.len(),
            report.warnings.len()
        );
        report
    }

    fn run_checks(&self, df: &DataFrame, report: &mut ValidationReport) -> PipelineResult<()> {
        report.stats.total_rows = df.height();
        report.stats.total_columns = df.width();

        if df.height() == 0 || df.width() == 0 {
            report.add_error("Dataset is empty", std::iter::empty());
            return Ok(());
        }

        let table = TextTable::new(df)?;
        let columns = ColumnMap::resolve(&table.names);

        self.check_structure(&table, report);
        self.check_columns(&table, &columns, report);
        self.check_types(&table, &columns, report);
        self.check_key_field(&table, &columns, report);
        self.check_coordinates(&table, &columns, report);
        self.check_emails(&table, &columns, report);
        self.check_flow_groups(&table, &columns, report);
        self.check_business_rules(&table, &columns, report);
        self.collect_statistics(&table, report);
        Ok(())
    }

    fn check_structure(&self, table: &TextTable, report: &mut ValidationReport) {
        let rows = table.height;
        if rows > LARGE_DATASET_ROWS {
            report.add_warning(
                format!("Large dataset ({} rows) may impact performance", rows),
                std::iter::empty(),
            );
        }

        let empty_rows: Vec<usize> = (0..rows)
            .filter(|&row| table.columns.iter().all(|c| is_blank(c[row].as_deref())))
            .collect();
        if !empty_rows.is_empty() {
            report.add_warning("Found completely empty rows", empty_rows);
        }

        report.add_info(format!("Total rows: {}", rows), std::iter::empty());
        report.add_info(
            format!("Total columns: {}", table.names.len()),
            std::iter::empty(),
        );
    }

    fn check_columns(&self, table: &TextTable, columns: &ColumnMap, report: &mut ValidationReport) {
        if !columns.missing().is_empty() {
            let names = columns
                .missing()
                .iter()
                .map(CanonicalField::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if self.settings.strict_column_checking {
                report.add_error(format!("Missing required columns: {}", names), std::iter::empty());
            } else {
                report.add_warning(format!("Missing optional columns: {}", names), std::iter::empty());
            }
        }

        let unusual: Vec<&str> = table
            .names
            .iter()
            .map(String::as_str)
            .filter(|name| !COLUMN_NAME_PATTERN.is_match(name))
            .collect();
        if !unusual.is_empty() {
            report.add_warning(
                format!("Columns with unusual characters: {}", unusual.join(", ")),
                std::iter::empty(),
            );
        }

        report.add_info(
            format!("Column mapping: {}", columns.describe()),
            std::iter::empty(),
        );
    }

    fn check_types(&self, table: &TextTable, columns: &ColumnMap, report: &mut ValidationReport) {
        for field in [CanonicalField::Latitude, CanonicalField::Longitude] {
            let Some((name, values)) = table.field(columns, field) else {
                continue;
            };
            let bad: Vec<usize> = rows_where(&values, |v| !is_blank(v) && parse_number(v).is_none());
            if !bad.is_empty() {
                report.add_warning(format!("Non-numeric values in {}", name), bad);
            }
        }

        if let Some((name, values)) = table.field(columns, CanonicalField::ModifiedDate) {
            let bad: Vec<usize> = rows_where(&values, |v| {
                !is_blank(v) && v.and_then(parse_timestamp).is_none()
            });
            if !bad.is_empty() {
                report.add_warning(format!("Unparseable dates in {}", name), bad);
            }
        }
    }

    fn check_key_field(&self, table: &TextTable, columns: &ColumnMap, report: &mut ValidationReport) {
        let Some((_, values)) = table.field(columns, CanonicalField::PoleNumber) else {
            return;
        };
        let min_length = self.settings.min_pole_number_length;

        let empty = rows_where(&values, is_blank);
        if !empty.is_empty() {
            report.add_error("Empty pole numbers found", empty);
        }

        let short = rows_where(&values, |v| {
            !is_blank(v) && v.map_or(0, |s| s.chars().count()) < min_length
        });
        if !short.is_empty() {
            report.add_warning(
                format!("Pole numbers shorter than {} characters", min_length),
                short,
            );
        }

        let mut occurrences: HashMap<&str, Vec<usize>> = HashMap::new();
        for (row, value) in values.iter().copied().enumerate() {
            if let Some(v) = value.filter(|v| !is_blank(Some(v))) {
                occurrences.entry(v).or_default().push(row);
            }
        }
        let duplicated: Vec<usize> = occurrences
            .into_values()
            .filter(|rows| rows.len() > 1)
            .flatten()
            .collect();
        if !duplicated.is_empty() {
            report.add_warning("Duplicate pole numbers found", duplicated);
        }

        let special = rows_where(&values, |v| {
            !is_blank(v) && v.is_some_and(|s| KEY_SPECIAL_CHARS.is_match(s))
        });
        if !special.is_empty() {
            report.add_info("Pole numbers with special characters", special);
        }
    }

    fn check_coordinates(&self, table: &TextTable, columns: &ColumnMap, report: &mut ValidationReport) {
        let allow_missing = self.settings.allow_missing_coordinates;
        let (Some((_, lat)), Some((_, lon))) = (
            table.field(columns, CanonicalField::Latitude),
            table.field(columns, CanonicalField::Longitude),
        ) else {
            if !allow_missing {
                report.add_error(
                    "Latitude and/or longitude columns not found",
                    std::iter::empty(),
                );
            }
            return;
        };

        let lat: Vec<Option<f64>> = lat.iter().map(|v| parse_number(*v)).collect();
        let lon: Vec<Option<f64>> = lon.iter().map(|v| parse_number(*v)).collect();
        let pairs = || lat.iter().zip(lon.iter()).enumerate();

        let missing: Vec<usize> = pairs()
            .filter(|(_, (a, b))| a.is_none() || b.is_none())
            .map(|(row, _)| row)
            .collect();
        if !missing.is_empty() {
            if allow_missing {
                report.add_warning("Missing coordinate data", missing);
            } else {
                report.add_error("Missing coordinate data", missing);
            }
        }

        let bad_lat: Vec<usize> = pairs()
            .filter(|(_, (a, _))| a.is_some_and(|v| !(-90.0..=90.0).contains(&v)))
            .map(|(row, _)| row)
            .collect();
        if !bad_lat.is_empty() {
            report.add_error(
                "Invalid latitude values (must be between -90 and 90)",
                bad_lat,
            );
        }

        let bad_lon: Vec<usize> = pairs()
            .filter(|(_, (_, b))| b.is_some_and(|v| !(-180.0..=180.0).contains(&v)))
            .map(|(row, _)| row)
            .collect();
        if !bad_lon.is_empty() {
            report.add_error(
                "Invalid longitude values (must be between -180 and 180)",
                bad_lon,
            );
        }

        let zero: Vec<usize> = pairs()
            .filter(|(_, (a, b))| **a == Some(0.0) && **b == Some(0.0))
            .map(|(row, _)| row)
            .collect();
        if !zero.is_empty() {
            report.add_warning("Coordinates at (0,0) - possible missing data", zero);
        }
    }

    fn check_emails(&self, table: &TextTable, columns: &ColumnMap, report: &mut ValidationReport) {
        if !self.settings.validate_agent_email_format {
            return;
        }
        let Some((name, values)) = table.field(columns, CanonicalField::ModifiedBy) else {
            return;
        };

        // Only values that look like an address are held to the pattern.
        let invalid = rows_where(&values, |v| match v {
            Some(s) if !is_blank(v) && s.contains('@') => !EMAIL_PATTERN.is_match(s),
            _ => false,
        });
        if !invalid.is_empty() {
            report.add_warning(format!("Invalid email formats in {}", name), invalid);
        }
    }

    fn check_flow_groups(&self, table: &TextTable, columns: &ColumnMap, report: &mut ValidationReport) {
        let Some((_, values)) = table.field(columns, CanonicalField::FlowNameGroups) else {
            return;
        };

        let counts: Vec<(&str, usize)> = FLOW_TYPES
            .iter()
            .map(|flow| (*flow, rows_where(&values, |v| contains_tag(v, flow)).len()))
            .collect();

        let permission_count = counts
            .iter()
            .find(|(flow, _)| *flow == "Pole Permission")
            .map_or(0, |(_, n)| *n);
        report.add_info(
            format!("Entries with 'Pole Permission': {}", permission_count),
            std::iter::empty(),
        );

        let distribution = counts
            .iter()
            .map(|(flow, n)| format!("{}={}", flow, n))
            .collect::<Vec<_>>()
            .join(", ");
        report.add_info(
            format!("Flow type distribution: {}", distribution),
            std::iter::empty(),
        );

        let empty = rows_where(&values, is_blank);
        if !empty.is_empty() {
            report.add_warning("Empty flow name groups", empty);
        }
    }

    fn check_business_rules(&self, table: &TextTable, columns: &ColumnMap, report: &mut ValidationReport) {
        if let (Some((_, flows)), Some((_, keys))) = (
            table.field(columns, CanonicalField::FlowNameGroups),
            table.field(columns, CanonicalField::PoleNumber),
        ) {
            let without_key: Vec<usize> = (0..table.height)
                .filter(|&row| contains_tag(flows[row], TARGET_TAG) && is_blank(keys[row]))
                .collect();
            if !without_key.is_empty() {
                report.add_error("Pole permission entries without pole numbers", without_key);
            }
        }

        let Some((_, dates)) = table.field(columns, CanonicalField::ModifiedDate) else {
            return;
        };
        let parsed: Vec<Option<NaiveDateTime>> =
            dates.iter().map(|v| v.and_then(parse_timestamp)).collect();

        let future: Vec<usize> = positions(&parsed, |ts| ts > self.now);
        if !future.is_empty() {
            report.add_warning("Future modification dates found", future);
        }

        let cutoff = self.now - Duration::days(VERY_OLD_DAYS);
        let very_old: Vec<usize> = positions(&parsed, |ts| ts < cutoff);
        if !very_old.is_empty() {
            report.add_info("Very old modification dates (>10 years)", very_old);
        }
    }

    fn collect_statistics(&self, table: &TextTable, report: &mut ValidationReport) {
        let cells = table.height * table.names.len();
        let nulls: usize = table
            .columns
            .iter()
            .map(|c| c.iter().filter(|v| v.is_none()).count())
            .sum();

        let mut seen: HashSet<Vec<Option<&str>>> = HashSet::with_capacity(table.height);
        let duplicate_rows = (0..table.height)
            .filter(|&row| !seen.insert(table.columns.iter().map(|c| c[row].as_deref()).collect()))
            .count();

        let unique_values_per_column = table
            .names
            .iter()
            .zip(table.columns.iter())
            .take(UNIQUE_STATS_COLUMNS)
            .map(|(name, values)| {
                let distinct: HashSet<&str> = values.iter().filter_map(|v| v.as_deref()).collect();
                (name.clone(), distinct.len())
            })
            .collect();

        report.stats.missing_data_percentage = if cells == 0 {
            0.0
        } else {
            nulls as f64 / cells as f64 * 100.0
        };
        report.stats.duplicate_rows = duplicate_rows;
        report.stats.unique_values_per_column = unique_values_per_column;

        report.add_info(
            format!("Missing data: {:.2}%", report.stats.missing_data_percentage),
            std::iter::empty(),
        );
        report.add_info(
            format!("Duplicate rows: {}", duplicate_rows),
            std::iter::empty(),
        );
    }
}

/// Column-major text view of a frame, any dtype cast to `String`.
struct TextTable {
    names: Vec<String>,
    columns: Vec<Vec<Option<String>>>,
    height: usize,
}

impl TextTable {
    fn new(df: &DataFrame) -> PipelineResult<Self> {
        let names = column_names(df);
        let columns = df
            .get_columns()
            .iter()
            .map(|column| -> PipelineResult<Vec<Option<String>>> {
                let text = column.cast(&DataType::String)?;
                Ok(text
                    .str()?
                    .into_iter()
                    .map(|v| v.map(str::to_string))
                    .collect())
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        Ok(Self {
            names,
            columns,
            height: df.height(),
        })
    }

    /// Actual column name and values of a canonical field.
    fn field<'a>(
        &'a self,
        columns: &'a ColumnMap,
        field: CanonicalField,
    ) -> Option<(&'a str, Vec<Option<&'a str>>)> {
        let name = columns.column(field)?;
        let idx = self.names.iter().position(|n| n == name)?;
        Some((name, self.columns[idx].iter().map(|v| v.as_deref()).collect()))
    }
}

fn rows_where<F>(values: &[Option<&str>], predicate: F) -> Vec<usize>
where
    F: Fn(Option<&str>) -> bool,
{
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| predicate(**v))
        .map(|(row, _)| row)
        .collect()
}

fn positions<F>(parsed: &[Option<NaiveDateTime>], predicate: F) -> Vec<usize>
where
    F: Fn(NaiveDateTime) -> bool,
{
    parsed
        .iter()
        .enumerate()
        .filter_map(|(row, ts)| match ts {
            Some(t) if predicate(*t) => Some(row),
            _ => None,
        })
        .collect()
}

fn parse_number(value: Option<&str>) -> Option<f64> {
    if is_blank(value) {
        return None;
    }
    value?.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}
