use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::Local;

use crate::constants::{CSV_HEADER, CSV_NAME_FORMAT};
use crate::error::WriteError;
use crate::models::{BatchResult, CsvRow, DescriptionRecord, ImageFile};
use crate::pipeline::BatchSink;

/// Collects one row per described image and writes them all when the run ends.
pub struct CsvGenerator {
    output: PathBuf,
    rows: Vec<CsvRow>,
}

impl CsvGenerator {
    /// `file_name` defaults to the run's start time.
    pub fn new(destination: &Path, file_name: Option<&str>) -> Self {
        let file_name = match file_name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) if Path::new(name).extension().is_some() => name.to_string(),
            Some(name) => format!("{name}.csv"),
            None => timestamp_file_name(),
        };
        Self {
            output: destination.join(file_name),
            rows: Vec::new(),
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn rows(&self) -> &[CsvRow] {
        &self.rows
    }
}

impl BatchSink for CsvGenerator {
    fn accept(
        &mut self,
        image: &ImageFile,
        _data: &Bytes,
        record: DescriptionRecord,
    ) -> Result<(), WriteError> {
        self.rows.push(CsvRow::new(image, record));
        Ok(())
    }

    fn finish(&mut self, result: &BatchResult) -> Result<Option<PathBuf>, WriteError> {
        if result.total == 0 {
            log::info!("No images found; no CSV written");
            return Ok(None);
        }
        write_rows(&self.output, &self.rows)?;
        log::info!(
            "Wrote {} row(s) to {}",
            self.rows.len(),
            self.output.display()
        );
        Ok(Some(self.output.clone()))
    }
}

pub fn timestamp_file_name() -> String {
    format!("{}.csv", Local::now().format(CSV_NAME_FORMAT))
}

/// Writes the header and `rows`, replacing any existing file.
pub fn write_rows(path: &Path, rows: &[CsvRow]) -> Result<(), WriteError> {
    let csv_error = |source| WriteError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_error)?;
    writer.write_record(CSV_HEADER).map_err(csv_error)?;
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer.flush().map_err(|err| WriteError::io(path, err))
}

pub fn load_rows(path: &Path) -> Result<Vec<CsvRow>, WriteError> {
    let csv_error = |source| WriteError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    reader
        .deserialize()
        .collect::<Result<Vec<CsvRow>, _>>()
        .map_err(csv_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BatchError, DescribeError};
    use crate::models::{BatchMode, BatchRequest, ErrorKind};
    use crate::pipeline::tests::{source_with, FakeClient};
    use crate::pipeline::BatchRunner;
    use crate::services::ResponseParser;

    fn runner(client: &FakeClient) -> BatchRunner<'_, FakeClient> {
        BatchRunner::new(
            client,
            ResponseParser::default(),
            vec!["jpg".into()],
            "Describe.",
        )
    }

    #[test]
    fn test_file_names() {
        let dir = Path::new("/out");
        assert_eq!(
            CsvGenerator::new(dir, Some("stock")).output(),
            Path::new("/out/stock.csv")
        );
        assert_eq!(
            CsvGenerator::new(dir, Some("stock.txt")).output(),
            Path::new("/out/stock.txt")
        );

        let generated = CsvGenerator::new(dir, Some("  ")).output().to_path_buf();
        let stem = generated.file_stem().and_then(|s| s.to_str()).unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(stem, CSV_NAME_FORMAT).is_ok());
    }

    #[test]
    fn test_rows_survive_a_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let image = ImageFile::from_path(Path::new("quote.jpg")).unwrap();
        let rows = vec![CsvRow::new(
            &image,
            DescriptionRecord {
                title: "A \"quoted\" title".into(),
                description: "Line one, with comma.".into(),
                keywords: vec!["sky".into(), "red sun".into()],
            },
        )];

        write_rows(&path, &rows).unwrap();
        let loaded = load_rows(&path).unwrap();

        assert_eq!(loaded, rows);
        assert_eq!(loaded[0].keywords(), vec!["sky", "red sun"]);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("filename,title,description,keywords\n"));
        assert!(text.contains("\"sky,red sun\""));
    }

    #[tokio::test]
    async fn test_three_file_batch_writes_two_rows() {
        let dir = source_with(&["1.jpg", "2.jpg", "3.jpg"]);
        let client = FakeClient::default()
            .reply("1.jpg", Ok("Title: Sunset\nDescription: A red sky.\nKeywords: sky, red, sunset, red"))
            .reply("2.jpg", Err(DescribeError::InvalidImage("rejected".into())));
        let request = BatchRequest::new(dir.path(), None, BatchMode::GenerateCsv);
        let mut generator = CsvGenerator::new(dir.path(), Some("out.csv"));

        let result = runner(&client).run(&request, &mut generator).await.unwrap();

        assert_eq!(result.failed_kinds(), vec![("2.jpg", ErrorKind::InvalidImage)]);
        let output = result.output.unwrap();
        let rows = load_rows(&output).unwrap();
        assert_eq!(
            rows.iter().map(|row| row.file_name.as_str()).collect::<Vec<_>>(),
            vec!["1.jpg", "3.jpg"]
        );
        assert_eq!(rows[0].title, "Sunset");
        assert_eq!(rows[0].keywords_joined, "sky,red,sunset");
    }

    #[tokio::test]
    async fn test_aborted_batch_keeps_gathered_rows() {
        let dir = source_with(&["1.jpg", "2.jpg", "3.jpg"]);
        let client = FakeClient::default().reply(
            "2.jpg",
            Err(DescribeError::AuthenticationFailed("revoked".into())),
        );
        let request = BatchRequest::new(dir.path(), None, BatchMode::GenerateCsv);
        let mut generator = CsvGenerator::new(dir.path(), Some("partial.csv"));

        let err = runner(&client)
            .run(&request, &mut generator)
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::Aborted { .. }));
        let rows = load_rows(&dir.path().join("partial.csv")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].file_name, "1.jpg");
    }

    #[tokio::test]
    async fn test_empty_batch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let request = BatchRequest::new(dir.path(), None, BatchMode::GenerateCsv);
        let client = FakeClient::default();
        let mut generator = CsvGenerator::new(dir.path(), Some("none.csv"));

        let result = runner(&client).run(&request, &mut generator).await.unwrap();

        assert_eq!(result.total, 0);
        assert_eq!(result.output, None);
        assert!(!generator.output().exists());
    }
}
