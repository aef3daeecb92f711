use polars::prelude::*;

use crate::core::domain::{fields, TARGET_TAG};
use crate::error::PipelineResult;

/// True when `value` contains `tag`, ignoring case. Null never matches.
pub fn contains_tag(value: Option<&str>, tag: &str) -> bool {
    match value {
        Some(v) => v.to_lowercase().contains(&tag.to_lowercase()),
        None => false,
    }
}

/// Row mask selecting rows whose flow groups carry [`TARGET_TAG`].
///
/// Other tag phrases in the same field (e.g. a home sign-up flow) do not
/// affect the result.
pub fn target_mask(df: &DataFrame) -> PipelineResult<BooleanChunked> {
    let groups = df.column(fields::FLOW_NAME_GROUPS)?.str()?;
    let tag = TARGET_TAG.to_lowercase();
    Ok(groups
        .into_iter()
        .map(|value| value.is_some_and(|v| v.to_lowercase().contains(&tag)))
        .collect())
}

/// Keep only pole permission rows, preserving row order.
pub fn filter_target_rows(df: &DataFrame) -> PipelineResult<DataFrame> {
    let mask = target_mask(df)?;
    let filtered = df.filter(&mask)?;
    log::debug!(
        "Filtered {} of {} rows to pole permission records",
        filtered.height(),
        df.height()
    );
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::SECONDARY_TAG;

    fn flows(values: &[Option<&str>]) -> DataFrame {
        df!(
            fields::POLE_NUMBER => (0..values.len()).map(|i| format!("P{}", i)).collect::<Vec<_>>(),
            fields::FLOW_NAME_GROUPS => values.to_vec(),
        )
        .unwrap()
    }

    #[test]
    fn test_contains_tag_is_case_insensitive() {
        assert!(contains_tag(Some("pole permission: APPROVED"), TARGET_TAG));
        assert!(contains_tag(
            Some("Home Sign Ups, Pole Permission: Approved"),
            TARGET_TAG
        ));
        assert!(!contains_tag(Some("Pole Permission: Declined"), TARGET_TAG));
        assert!(!contains_tag(None, TARGET_TAG));
    }

    #[test]
    fn test_filter_keeps_target_rows_in_order() {
        let df = flows(&[
            Some("Pole Permission: Approved"),
            Some(SECONDARY_TAG),
            None,
            Some("Home Sign Ups; Pole Permission: Approved"),
            Some("POLE PERMISSION: APPROVED"),
        ]);

        let filtered = filter_target_rows(&df).unwrap();
        let poles: Vec<&str> = filtered
            .column(fields::POLE_NUMBER)
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(poles, vec!["P0", "P3", "P4"]);
    }

    #[test]
    fn test_filter_on_empty_frame() {
        let df = flows(&[]);
        let filtered = filter_target_rows(&df).unwrap();
        assert_eq!(filtered.height(), 0);
        assert_eq!(filtered.width(), 2);
    }
}
