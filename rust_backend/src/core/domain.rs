//! Domain models for pole permission extracts and the sheets produced from them.
//!
//! This module names the fields of the field-work extract, the fixed sheet
//! names handed to export collaborators, and the accumulating statistics of
//! one pipeline run.

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Column names of the field-work extract.
pub mod fields {
    pub const PROPERTY_ID: &str = "Property ID";
    pub const NAD_ID: &str = "1map NAD ID";
    pub const POLE_NUMBER: &str = "Pole Number";
    pub const DROP_NUMBER: &str = "Drop Number";
    pub const STAND_NUMBER: &str = "Stand Number";
    pub const STATUS: &str = "Status";
    pub const FLOW_NAME_GROUPS: &str = "Flow Name Groups";
    pub const SITE: &str = "Site";
    pub const SECTIONS: &str = "Sections";
    pub const PONS: &str = "PONs";
    pub const LOCATION_ADDRESS: &str = "Location Address";
    pub const LATITUDE: &str = "Latitude";
    pub const LONGITUDE: &str = "Longitude";
    pub const AGENT_NAME: &str = "Field Agent Name (pole permission)";
    pub const LAT_LONG: &str = "Latitude & Longitude";
    pub const MODIFIED_BY: &str = "lst_mod_by";
    pub const MODIFIED_DATE: &str = "lst_mod_dt";

    /// Derived column holding the parsed modification timestamp.
    pub const PARSED_DATE: &str = "parsed_date";
    /// Derived column holding the cohort tag of a row.
    pub const WEEK_ENDING: &str = "week_ending";
}

/// Fields that must be present in every input file.
pub const REQUIRED_FIELDS: [&str; 17] = [
    fields::PROPERTY_ID,
    fields::NAD_ID,
    fields::POLE_NUMBER,
    fields::DROP_NUMBER,
    fields::STAND_NUMBER,
    fields::STATUS,
    fields::FLOW_NAME_GROUPS,
    fields::SITE,
    fields::SECTIONS,
    fields::PONS,
    fields::LOCATION_ADDRESS,
    fields::LATITUDE,
    fields::LONGITUDE,
    fields::AGENT_NAME,
    fields::LAT_LONG,
    fields::MODIFIED_BY,
    fields::MODIFIED_DATE,
];

/// Tag phrase selecting the rows this pipeline is about.
pub const TARGET_TAG: &str = "Pole Permission: Approved";

/// Tag phrase of an unrelated flow. Its presence never excludes a row that
/// also carries [`TARGET_TAG`].
pub const SECONDARY_TAG: &str = "Home Sign Ups";

/// Delimiter joining the components of a [`BusinessKey`].
pub const KEY_DELIMITER: &str = "|";

/// Fixed sheet names of the sheet mapping.
pub mod sheets {
    pub const WEEK_PREFIX: &str = "Week_Ending_";
    pub const DUPLICATES: &str = "Duplicate_Poles_Removed";
    pub const NO_KEY_FIELD: &str = "No_Pole_Allocated";
    pub const FIELD_AUTHOR_MISMATCH: &str = "Agent_Data_Mismatches";
    pub const DATE_PARSE_ERROR: &str = "Date_Parse_Errors";
    pub const SUMMARY: &str = "Processing_Summary";
}

/// Returns true for values the extract uses to mean "nothing here".
///
/// Whitespace is significant: `" "` is a value, not a blank.
pub fn is_blank(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.is_empty() || v.eq_ignore_ascii_case("nan"),
    }
}

/// Identity of a real-world entity across rows.
///
/// Built from one or more field values joined with [`KEY_DELIMITER`]. Used for
/// matching only and never written back onto a row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BusinessKey(String);

impl BusinessKey {
    /// Builds a key from its component values, verbatim; `None` if any
    /// component is blank.
    pub fn from_parts<'a, I>(parts: I) -> Option<Self>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut components = Vec::new();
        for part in parts {
            if is_blank(part) {
                return None;
            }
            components.push(part?);
        }
        if components.is_empty() {
            return None;
        }
        Some(BusinessKey(components.join(KEY_DELIMITER)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A named dataset inside a [`SheetMapping`].
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub data: DataFrame,
}

/// Ordered mapping from sheet name to dataset; the terminal artifact of a run.
///
/// Order of construction is preserved: weekly cohorts chronologically, then
/// the QC and duplicate sheets, then the summary.
#[derive(Debug, Clone, Default)]
pub struct SheetMapping {
    sheets: Vec<Sheet>,
}

impl SheetMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sheet, replacing the data of an existing sheet with the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, data: DataFrame) {
        let name = name.into();
        match self.sheets.iter_mut().find(|s| s.name == name) {
            Some(existing) => existing.data = data,
            None => self.sheets.push(Sheet { name, data }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DataFrame> {
        self.sheets.iter().find(|s| s.name == name).map(|s| &s.data)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sheet> {
        self.sheets.iter()
    }

    /// Weekly cohort sheets in mapping order.
    pub fn weekly_sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets
            .iter()
            .filter(|s| s.name.starts_with(sheets::WEEK_PREFIX))
    }
}

impl IntoIterator for SheetMapping {
    type Item = Sheet;
    type IntoIter = std::vec::IntoIter<Sheet>;

    fn into_iter(self) -> Self::IntoIter {
        self.sheets.into_iter()
    }
}

/// Counters accumulated over one run. Each stage writes its own fields once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total_input_records: usize,
    pub pole_permission_records: usize,
    pub no_pole_allocated: usize,
    pub agent_data_mismatches: usize,
    pub date_parse_errors: usize,
    pub clean_records: usize,
    pub unique_poles: usize,
    pub duplicates_removed: usize,
    pub weekly_sheets: usize,
    pub strategy: Option<String>,
    pub optimization_level: Option<String>,
    pub quality_control_level: Option<String>,
    pub chunks_processed: usize,
    pub spilled_chunks: usize,
    pub memory_pressure_events: usize,
    pub peak_memory_mb: f64,
    pub duration_seconds: f64,
    pub encoding: Option<String>,
}

impl ProcessingStats {
    /// Records a memory sample, keeping the maximum.
    pub fn observe_memory(&mut self, resident_bytes: u64) {
        let mb = resident_bytes as f64 / 1024.0 / 1024.0;
        if mb > self.peak_memory_mb {
            self.peak_memory_mb = mb;
        }
    }

    /// (metric, value) rows for the summary sheet.
    pub fn summary_rows(&self) -> Vec<(String, String)> {
        let mut rows = vec![
            ("Total Input Records", self.total_input_records.to_string()),
            ("Pole Permission Records", self.pole_permission_records.to_string()),
            ("No Pole Allocated", self.no_pole_allocated.to_string()),
            ("Agent Data Mismatches", self.agent_data_mismatches.to_string()),
            ("Date Parse Errors", self.date_parse_errors.to_string()),
            ("Clean Records", self.clean_records.to_string()),
            ("Unique Poles", self.unique_poles.to_string()),
            ("Duplicates Removed", self.duplicates_removed.to_string()),
            ("Weekly Sheets", self.weekly_sheets.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect::<Vec<_>>();

        if let Some(strategy) = &self.strategy {
            rows.push(("Execution Strategy".to_string(), strategy.clone()));
        }
        if let Some(level) = &self.optimization_level {
            rows.push(("Optimization Level".to_string(), level.clone()));
        }
        if let Some(level) = &self.quality_control_level {
            rows.push(("Quality Control Level".to_string(), level.clone()));
        }
        if let Some(encoding) = &self.encoding {
            rows.push(("Source Encoding".to_string(), encoding.clone()));
        }
        rows.push((
            "Chunks Processed".to_string(),
            self.chunks_processed.to_string(),
        ));
        rows.push(("Spilled Chunks".to_string(), self.spilled_chunks.to_string()));
        rows.push((
            "Peak Memory Mb".to_string(),
            format!("{:.1}", self.peak_memory_mb),
        ));
        rows.push((
            "Duration Seconds".to_string(),
            format!("{:.2}", self.duration_seconds),
        ));
        rows
    }
}
