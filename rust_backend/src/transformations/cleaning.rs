use chrono::NaiveDateTime;
use polars::prelude::*;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::config::DuplicatePolicy;
use crate::core::domain::{fields, is_blank, BusinessKey};
use crate::error::PipelineResult;
use crate::parsing::csv_parser::empty_frame;
use crate::time::{parse_zoned, Timestamp};

/// Quality-control partition of one dataset.
///
/// `clean`, `no_key_field` and `date_parse_error` are disjoint and together
/// hold every input row. `field_author_mismatch` is a flag view: its rows are
/// also in `clean`.
#[derive(Debug, Clone)]
pub struct QcResult {
    pub clean: DataFrame,
    pub no_key_field: DataFrame,
    pub field_author_mismatch: DataFrame,
    pub date_parse_error: DataFrame,
}

/// Names of the four [`QcResult`] frames, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QcCategory {
    Clean,
    NoKeyField,
    FieldAuthorMismatch,
    DateParseError,
}

impl QcCategory {
    pub const ALL: [QcCategory; 4] = [
        QcCategory::Clean,
        QcCategory::NoKeyField,
        QcCategory::FieldAuthorMismatch,
        QcCategory::DateParseError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QcCategory::Clean => "clean",
            QcCategory::NoKeyField => "no_key_field",
            QcCategory::FieldAuthorMismatch => "field_author_mismatch",
            QcCategory::DateParseError => "date_parse_error",
        }
    }

    /// Whether frames of this category carry the `parsed_date` column.
    fn has_parsed_date(&self) -> bool {
        matches!(self, QcCategory::Clean | QcCategory::DateParseError)
    }
}

impl QcResult {
    /// Zero-row partition for input with the given header.
    pub fn empty(headers: &[String]) -> PipelineResult<Self> {
        let mut with_parsed = headers.to_vec();
        with_parsed.push(fields::PARSED_DATE.to_string());

        let frames = QcCategory::ALL.map(|category| {
            if category.has_parsed_date() {
                empty_frame(&with_parsed)
            } else {
                empty_frame(headers)
            }
        });
        let [clean, no_key_field, field_author_mismatch, date_parse_error] = frames;
        Ok(Self {
            clean: clean?,
            no_key_field: no_key_field?,
            field_author_mismatch: field_author_mismatch?,
            date_parse_error: date_parse_error?,
        })
    }

    /// Total rows across the removing categories; equals the input row count.
    pub fn classified_rows(&self) -> usize {
        self.clean.height() + self.no_key_field.height() + self.date_parse_error.height()
    }

    pub fn frame(&self, category: QcCategory) -> &DataFrame {
        match category {
            QcCategory::Clean => &self.clean,
            QcCategory::NoKeyField => &self.no_key_field,
            QcCategory::FieldAuthorMismatch => &self.field_author_mismatch,
            QcCategory::DateParseError => &self.date_parse_error,
        }
    }

    pub fn frame_mut(&mut self, category: QcCategory) -> &mut DataFrame {
        match category {
            QcCategory::Clean => &mut self.clean,
            QcCategory::NoKeyField => &mut self.no_key_field,
            QcCategory::FieldAuthorMismatch => &mut self.field_author_mismatch,
            QcCategory::DateParseError => &mut self.date_parse_error,
        }
    }

    /// Frames in [`QcCategory::ALL`] order.
    pub fn into_frames(self) -> [DataFrame; 4] {
        [
            self.clean,
            self.no_key_field,
            self.field_author_mismatch,
            self.date_parse_error,
        ]
    }

    pub fn from_frames(frames: [DataFrame; 4]) -> Self {
        let [clean, no_key_field, field_author_mismatch, date_parse_error] = frames;
        Self {
            clean,
            no_key_field,
            field_author_mismatch,
            date_parse_error,
        }
    }
}

/// Split a dataset into clean rows and QC categories.
///
/// 1. Blank `Pole Number` (null, empty or `nan`) goes to `no_key_field`.
/// 2. Rows with an agent name and a non-email `lst_mod_by` are copied to
///    `field_author_mismatch` and stay in the working set.
/// 3. `lst_mod_dt` is parsed into a `parsed_date` column at nanosecond
///    precision, keeping the UTC offset when the source has one; rows with a
///    value that does not parse go to `date_parse_error`. Rows without a
///    value keep a null `parsed_date`.
pub fn qc_partition(df: &DataFrame) -> PipelineResult<QcResult> {
    let key_mask: BooleanChunked = df
        .column(fields::POLE_NUMBER)?
        .str()?
        .into_iter()
        .map(is_blank)
        .collect();
    let no_key_field = df.filter(&key_mask)?;
    let mut working = df.filter(&!&key_mask)?;

    let field_author_mismatch = working.filter(&mismatch_mask(&working)?)?;

    let raw_dates = working.column(fields::MODIFIED_DATE)?.str()?;
    let mut parsed = Vec::with_capacity(raw_dates.len());
    let mut failed = Vec::with_capacity(raw_dates.len());
    for raw in raw_dates.into_iter() {
        let ts = raw.and_then(parse_zoned);
        failed.push(ts.is_none() && !is_blank(raw));
        parsed.push(ts.map(|t| t.to_canonical()));
    }
    let error_mask = BooleanChunked::from_slice("date_parse_error".into(), &failed);
    if failed.iter().any(|f| *f) {
        log::debug!(
            "{} rows with unparsable modification dates",
            failed.iter().filter(|f| **f).count()
        );
    }

    working.with_column(Column::new(fields::PARSED_DATE.into(), parsed))?;
    let date_parse_error = working.filter(&error_mask)?;
    let clean = working.filter(&!&error_mask)?;

    Ok(QcResult {
        clean,
        no_key_field,
        field_author_mismatch,
        date_parse_error,
    })
}

/// Agent present and modifier present without an `@`.
fn mismatch_mask(df: &DataFrame) -> PipelineResult<BooleanChunked> {
    let agents = df.column(fields::AGENT_NAME)?.str()?;
    let modifiers = df.column(fields::MODIFIED_BY)?.str()?;
    Ok(agents
        .into_iter()
        .zip(modifiers)
        .map(|(agent, modifier)| match (agent, modifier) {
            (Some(_), Some(by)) => !by.contains('@'),
            _ => false,
        })
        .collect())
}

/// Local wall-clock timestamp of every row.
///
/// Read from the `parsed_date` column when present, otherwise parsed from
/// `lst_mod_dt`.
pub fn row_timestamps(df: &DataFrame) -> PipelineResult<Vec<Option<NaiveDateTime>>> {
    Ok(row_zoned(df)?
        .into_iter()
        .map(|ts| ts.map(|t| t.local()))
        .collect())
}

/// UTC instant of every row; rows without an offset are read as UTC.
pub fn row_instants(df: &DataFrame) -> PipelineResult<Vec<Option<NaiveDateTime>>> {
    Ok(row_zoned(df)?
        .into_iter()
        .map(|ts| ts.map(|t| t.instant()))
        .collect())
}

fn row_zoned(df: &DataFrame) -> PipelineResult<Vec<Option<Timestamp>>> {
    let source = if df.get_column_names().iter().any(|c| c.as_str() == fields::PARSED_DATE) {
        fields::PARSED_DATE
    } else {
        fields::MODIFIED_DATE
    };
    Ok(df
        .column(source)?
        .str()?
        .into_iter()
        .map(|v| v.and_then(parse_zoned))
        .collect())
}

/// Output of [`deduplicate`].
#[derive(Debug, Clone)]
pub struct DedupResult {
    /// One row per business key, ordered by key.
    pub unique: DataFrame,
    /// Every row that lost to an earlier row with the same key.
    pub duplicates: DataFrame,
}

/// Collapse rows sharing a business key to the row with the earliest timestamp.
///
/// Timestamps are compared as UTC instants. Rows are stably sorted by
/// (key, instant) with null timestamps last, so
/// any parsed timestamp beats a missing one and ties keep input order. Rows
/// whose key cannot be built are never matched against each other; they are
/// kept and placed after every keyed row.
pub fn deduplicate(
    df: &DataFrame,
    key_fields: &[&str],
    policy: DuplicatePolicy,
) -> PipelineResult<DedupResult> {
    if !policy.is_implemented() {
        log::warn!(
            "Duplicate policy '{}' is not implemented, keeping the earliest entry",
            policy.as_str()
        );
    }

    let key_columns = key_fields
        .iter()
        .map(|name| -> PipelineResult<StringChunked> { Ok(df.column(name)?.str()?.clone()) })
        .collect::<PipelineResult<Vec<_>>>()?;
    let keys: Vec<Option<BusinessKey>> = (0..df.height())
        .map(|row| BusinessKey::from_parts(key_columns.iter().map(|c| c.get(row))))
        .collect();
    let timestamps = row_instants(df)?;

    let mut order: Vec<usize> = (0..df.height()).collect();
    order.sort_by(|&a, &b| {
        compare_last_none(&keys[a], &keys[b])
            .then_with(|| compare_last_none(&timestamps[a], &timestamps[b]))
            .then(a.cmp(&b))
    });

    let mut seen = HashSet::new();
    let mut unique_idx = Vec::new();
    let mut duplicate_idx = Vec::new();
    for row in order {
        let first = match &keys[row] {
            Some(key) => seen.insert(key.clone()),
            None => true,
        };
        if first {
            unique_idx.push(row as IdxSize);
        } else {
            duplicate_idx.push(row as IdxSize);
        }
    }

    let unique = df.take(&IdxCa::from_vec("idx".into(), unique_idx))?;
    let duplicates = df.take(&IdxCa::from_vec("idx".into(), duplicate_idx))?;

    log::info!("Removed {} duplicate entries", duplicates.height());
    log::info!("Remaining unique poles: {}", unique.height());

    Ok(DedupResult { unique, duplicates })
}

fn compare_last_none<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
