use chrono::NaiveDateTime;
use polars::prelude::*;
use std::collections::BTreeMap;

use crate::core::domain::fields;
use crate::error::PipelineResult;
use crate::time::{cohort_name, format_week_ending, week_ending_sunday};
use crate::transformations::cleaning::row_timestamps;

/// Rows of one calendar week, tagged by its week-ending Sunday.
#[derive(Debug, Clone)]
pub struct WeekCohort {
    /// Sunday 23:59:59.999 closing the week.
    pub week_ending: NaiveDateTime,
    /// Rows of the week with a `week_ending` column set to the tag.
    pub data: DataFrame,
}

impl WeekCohort {
    pub fn sheet_name(&self) -> String {
        cohort_name(&self.week_ending)
    }
}

/// Bucket rows by week-ending Sunday.
///
/// Cohorts come back in chronological order. Rows without a timestamp are
/// left out. Each cohort carries a `week_ending` column, replaced if the
/// input already has one, so grouping a cohort again returns it unchanged.
pub fn group_by_weeks(df: &DataFrame) -> PipelineResult<Vec<WeekCohort>> {
    let timestamps = row_timestamps(df)?;

    let mut weeks: BTreeMap<NaiveDateTime, Vec<IdxSize>> = BTreeMap::new();
    let mut skipped = 0usize;
    for (row, ts) in timestamps.iter().enumerate() {
        match ts {
            Some(ts) => weeks
                .entry(week_ending_sunday(*ts))
                .or_default()
                .push(row as IdxSize),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        log::warn!("{} rows without a timestamp left out of weekly groups", skipped);
    }

    let mut cohorts = Vec::with_capacity(weeks.len());
    for (week_ending, rows) in weeks {
        let height = rows.len();
        let mut data = df.take(&IdxCa::from_vec("idx".into(), rows))?;
        let tag = format_week_ending(&week_ending);
        data.with_column(Column::new(
            fields::WEEK_ENDING.into(),
            vec![tag; height],
        ))?;
        cohorts.push(WeekCohort { week_ending, data });
    }

    log::info!("Created {} weekly groups", cohorts.len());
    for cohort in &cohorts {
        log::info!("  - {}: {} entries", cohort.sheet_name(), cohort.data.height());
    }

    Ok(cohorts)
}
