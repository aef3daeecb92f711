#[cfg(test)]
mod tests {
    use crate::core::domain::REQUIRED_FIELDS;
    use crate::error::PipelineError;
    use crate::parsing::csv_parser::{
        build_frame, check_required_fields, column_names, empty_frame, ChunkReader,
    };
    use polars::prelude::*;

    fn reader(content: &str, chunk_size: usize) -> ChunkReader<&[u8]> {
        ChunkReader::new(content.as_bytes(), chunk_size).unwrap()
    }

    fn strings(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        df.column(name)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    /// Test that the input is split into chunks of the configured size
    #[test]
    fn test_chunks_have_configured_size() {
        let mut content = String::from("Pole Number,lst_mod_dt\n");
        for i in 0..25 {
            content.push_str(&format!("LAW.P.A{:03},2024-03-1{} 08:00:00\n", i, i % 10));
        }

        let chunks: Vec<DataFrame> = reader(&content, 10).map(|c| c.unwrap()).collect();

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(DataFrame::height).collect::<Vec<_>>(),
            vec![10, 10, 5]
        );
        assert_eq!(
            strings(&chunks[2], "Pole Number")[0].as_deref(),
            Some("LAW.P.A020")
        );
    }

    /// Test that every column is loaded as String, numeric-looking or not
    #[test]
    fn test_all_columns_are_strings() {
        let content = "Latitude,Longitude,Pole Number\n-26.1,28.05,00123\n";
        let df = reader(content, 100).next_chunk().unwrap().unwrap();

        for column in df.get_columns() {
            assert_eq!(column.dtype(), &DataType::String);
        }
        // Leading zeros survive because nothing is inferred.
        assert_eq!(strings(&df, "Pole Number")[0].as_deref(), Some("00123"));
    }

    /// Test empty fields and short rows become nulls
    #[test]
    fn test_empty_and_missing_fields_are_null() {
        let content = "a,b,c\n1,,3\n4\n";
        let df = reader(content, 100).next_chunk().unwrap().unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(strings(&df, "b"), vec![None, None]);
        assert_eq!(strings(&df, "c"), vec![Some("3".to_string()), None]);
    }

    /// Test surplus fields are dropped instead of shifting columns
    #[test]
    fn test_surplus_fields_are_dropped() {
        let content = "a,b\n1,2,3\n4,5\n";
        let df = reader(content, 100).next_chunk().unwrap().unwrap();

        assert_eq!(df.width(), 2);
        assert_eq!(strings(&df, "b"), vec![Some("2".to_string()), Some("5".to_string())]);
    }

    /// Test quoted fields with delimiters and newlines
    #[test]
    fn test_quoted_fields() {
        let content =
            "Location Address,Flow Name Groups\n\"12 Main Rd, Lawley\",\"Pole Permission: Approved\nHome Sign Ups\"\n";
        let df = reader(content, 100).next_chunk().unwrap().unwrap();

        assert_eq!(
            strings(&df, "Location Address")[0].as_deref(),
            Some("12 Main Rd, Lawley")
        );
        assert!(strings(&df, "Flow Name Groups")[0]
            .as_deref()
            .unwrap()
            .contains("Home Sign Ups"));
    }

    /// Test duplicate and blank header names are made unique
    #[test]
    fn test_duplicate_headers_are_renamed() {
        let content = "Status,Status,,Status\nA,B,C,D\n";
        let chunk_reader = reader(content, 100);

        assert_eq!(
            chunk_reader.headers(),
            &["Status", "Status.1", "Unnamed: 2", "Status.2"]
        );
    }

    /// Test header-only input yields no chunks
    #[test]
    fn test_header_only_input() {
        let mut chunk_reader = reader("a,b\n", 100);
        assert!(chunk_reader.next_chunk().unwrap().is_none());
        assert_eq!(chunk_reader.rows_read(), 0);
        assert_eq!(chunk_reader.headers().len(), 2);
    }

    /// Test the schema guard names every missing field
    #[test]
    fn test_schema_guard_reports_missing_fields() {
        let headers = vec!["Property ID".to_string(), "Pole Number".to_string()];
        let result = check_required_fields(&headers);

        match result {
            Err(PipelineError::Schema { missing }) => {
                assert_eq!(missing.len(), REQUIRED_FIELDS.len() - 2);
                assert!(missing.contains(&"lst_mod_dt".to_string()));
                assert!(!missing.contains(&"Pole Number".to_string()));
            }
            other => panic!("Expected schema error, got {:?}", other),
        }
    }

    /// Test the schema guard accepts extra fields
    #[test]
    fn test_schema_guard_accepts_extra_fields() {
        let mut headers: Vec<String> = REQUIRED_FIELDS.iter().map(|s| s.to_string()).collect();
        headers.push("Notes".to_string());
        assert!(check_required_fields(&headers).is_ok());
    }

    /// Test frame helpers keep column order
    #[test]
    fn test_build_and_empty_frame() {
        let headers = vec!["x".to_string(), "y".to_string()];
        let df = build_frame(
            &headers,
            vec![
                vec![Some("1".to_string())],
                vec![None],
            ],
        )
        .unwrap();
        assert_eq!(column_names(&df), headers);
        assert_eq!(df.height(), 1);

        let empty = empty_frame(&headers).unwrap();
        assert_eq!(empty.height(), 0);
        assert_eq!(empty.schema(), df.schema());
    }
}
