#[cfg(test)]
mod tests {
    use crate::config::EncodingPreference;
    use crate::core::domain::{sheets, SheetMapping, REQUIRED_FIELDS};
    use crate::io::loaders::{
        dump_sheets_csv, sheet_file_stem, DatasetLoadResult, DatasetLoader, NO_DATA_PLACEHOLDER,
    };
    use polars::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper to create a temp CSV file with the given suffix and bytes
    fn create_temp_file(suffix: &str, bytes: &[u8]) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn extract_bytes() -> Vec<u8> {
        let mut text = REQUIRED_FIELDS.join(",");
        text.push('\n');
        for i in 0..3 {
            let row: Vec<String> = REQUIRED_FIELDS
                .iter()
                .map(|f| match *f {
                    "Pole Number" if i == 1 => String::new(),
                    "Pole Number" => format!("LAW.P.A{:03}", i),
                    other => format!("{} {}", other.replace(['(', ')', '&'], ""), i),
                })
                .collect();
            text.push_str(&row.join(","));
            text.push('\n');
        }
        text.into_bytes()
    }

    #[test]
    fn test_dataset_load_result_new() {
        let df = df!("Pole Number" => ["A", "B"]).unwrap();
        let result = DatasetLoadResult::new(df, "UTF-8");
        assert_eq!(result.num_rows, 2);
        assert_eq!(result.encoding, "UTF-8");
    }

    #[test]
    fn test_load_from_file_csv() {
        let file = create_temp_file(".csv", &extract_bytes());
        let result = DatasetLoader::load_from_file(file.path(), EncodingPreference::Auto).unwrap();

        assert_eq!(result.num_rows, 3);
        assert_eq!(result.dataframe.width(), REQUIRED_FIELDS.len());
        let poles = result.dataframe.column("Pole Number").unwrap().str().unwrap();
        assert_eq!(poles.get(0), Some("LAW.P.A000"));
        assert_eq!(poles.get(1), None);
    }

    #[test]
    fn test_load_from_file_unsupported_extension() {
        let file = create_temp_file(".json", b"{}");
        let result = DatasetLoader::load_from_file(file.path(), EncodingPreference::Auto);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unsupported file format"));
    }

    #[test]
    fn test_load_from_file_no_extension() {
        let file = create_temp_file("", &extract_bytes());
        let result = DatasetLoader::load_from_file(file.path(), EncodingPreference::Auto);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("no extension"));
    }

    #[test]
    fn test_load_legacy_encoded_file() {
        let file = create_temp_file(".csv", b"Agent,Pole Number\nJos\xE9,LAW.P.A001\n");
        let result = DatasetLoader::load_from_csv(file.path(), EncodingPreference::Auto).unwrap();

        assert_eq!(result.encoding, "windows-1252");
        let agents = result.dataframe.column("Agent").unwrap().str().unwrap();
        assert_eq!(agents.get(0), Some("Jos\u{e9}"));
    }

    #[test]
    fn test_header_only_file_loads_empty() {
        let file = create_temp_file(".csv", b"Pole Number,Status\n");
        let result = DatasetLoader::load_from_csv(file.path(), EncodingPreference::Utf8).unwrap();
        assert_eq!(result.num_rows, 0);
        assert_eq!(result.dataframe.width(), 2);
    }

    #[test]
    fn test_load_checked_requires_fields() {
        let file = create_temp_file(".csv", b"Pole Number,Status\nP1,Approved\n");
        let err = DatasetLoader::load_checked(file.path(), EncodingPreference::Auto).unwrap_err();
        assert!(err.to_string().contains("Missing required columns"));

        let file = create_temp_file(".csv", &extract_bytes());
        assert!(DatasetLoader::load_checked(file.path(), EncodingPreference::Auto).is_ok());
    }

    #[test]
    fn test_sheet_file_stem() {
        assert_eq!(sheet_file_stem(sheets::SUMMARY), "Processing_Summary");
        assert_eq!(sheet_file_stem("a/b:c"), "a_b_c");
        assert_eq!(sheet_file_stem(&"x".repeat(40)).len(), 31);
    }

    #[test]
    fn test_dump_sheets_csv() {
        let dir = tempfile::tempdir().unwrap();
        let mut mapping = SheetMapping::new();
        mapping.insert(
            "Week_Ending_2024-03-17",
            df!("Pole Number" => ["LAW.P.A001", "LAW.P.A002"]).unwrap(),
        );
        mapping.insert(sheets::NO_KEY_FIELD, df!("Pole Number" => Vec::<String>::new()).unwrap());

        let written = dump_sheets_csv(&mapping, &dir.path().join("out")).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("Week_Ending_2024-03-17.csv"));

        let weekly = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(weekly.lines().count(), 3);
        let empty = std::fs::read_to_string(&written[1]).unwrap();
        assert!(empty.contains(NO_DATA_PLACEHOLDER));
    }
}
