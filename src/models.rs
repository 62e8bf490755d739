use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::KEYWORD_SEPARATOR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchMode {
    EmbedMetadata,
    GenerateCsv,
}

/// One user-initiated run. Built by the front end, never changed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub source_directory: PathBuf,
    pub destination_directory: PathBuf,
    pub custom_prompt: Option<String>,
    pub author_name: Option<String>,
    pub mode: BatchMode,
}

impl BatchRequest {
    /// Destination falls back to the source directory.
    pub fn new(source: impl Into<PathBuf>, destination: Option<PathBuf>, mode: BatchMode) -> Self {
        let source_directory = source.into();
        Self {
            destination_directory: destination.unwrap_or_else(|| source_directory.clone()),
            source_directory,
            custom_prompt: None,
            author_name: None,
            mode,
        }
    }

    pub fn with_prompt(mut self, prompt: Option<String>) -> Self {
        self.custom_prompt = non_empty(prompt);
        self
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author_name = non_empty(author);
        self
    }

    pub fn writes_in_place(&self) -> bool {
        self.source_directory == self.destination_directory
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFile {
    pub path: PathBuf,
    pub base_name: String,
    pub extension: String,
}

impl ImageFile {
    pub fn from_path(path: &Path) -> Option<Self> {
        let base_name = path.file_name()?.to_str()?.to_string();
        let extension = path.extension()?.to_str()?.to_lowercase();
        Some(Self {
            path: path.to_path_buf(),
            base_name,
            extension,
        })
    }

    pub fn is_jpeg(&self) -> bool {
        matches!(self.extension.as_str(), "jpg" | "jpeg")
    }
}

impl fmt::Display for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptionRecord {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvRow {
    #[serde(rename = "filename")]
    pub file_name: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "keywords")]
    pub keywords_joined: String,
}

impl CsvRow {
    pub fn new(image: &ImageFile, record: DescriptionRecord) -> Self {
        Self {
            file_name: image.base_name.clone(),
            keywords_joined: record.keywords.join(&KEYWORD_SEPARATOR.to_string()),
            title: record.title,
            description: record.description,
        }
    }

    pub fn keywords(&self) -> Vec<String> {
        self.keywords_joined
            .split(KEYWORD_SEPARATOR)
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    RateLimited,
    AuthenticationFailed,
    TransientNetworkError,
    InvalidImage,
    ParseError,
    WriteError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::AuthenticationFailed => "authentication failed",
            ErrorKind::TransientNetworkError => "network error",
            ErrorKind::InvalidImage => "invalid image",
            ErrorKind::ParseError => "unparseable response",
            ErrorKind::WriteError => "write failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub file: ImageFile,
    pub kind: ErrorKind,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub total: usize,
    pub processed_count: usize,
    pub failed: Vec<FailedFile>,
    /// Files never attempted because the run stopped early.
    pub skipped: usize,
    pub cancelled: bool,
    pub elapsed_time: Duration,
    pub output: Option<PathBuf>,
}

impl BatchResult {
    pub fn unprocessed_count(&self) -> usize {
        self.total - self.processed_count
    }

    pub fn failed_kinds(&self) -> Vec<(&str, ErrorKind)> {
        self.failed
            .iter()
            .map(|failure| (failure.file.base_name.as_str(), failure.kind))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Checking,
    Running,
    Aborted,
    Finalizing,
    Done,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Checking => "checking",
            RunState::Running => "running",
            RunState::Aborted => "aborted",
            RunState::Finalizing => "finalizing",
            RunState::Done => "done",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_destination_defaults_to_source() {
        let request = BatchRequest::new("/photos", None, BatchMode::GenerateCsv)
            .with_prompt(Some("   ".into()))
            .with_author(Some(" Ann ".into()));
        assert_eq!(request.destination_directory, PathBuf::from("/photos"));
        assert!(request.writes_in_place());
        assert_eq!(request.custom_prompt, None);
        assert_eq!(request.author_name.as_deref(), Some("Ann"));
    }

    #[test]
    fn image_file_lowercases_extension() {
        let image = ImageFile::from_path(Path::new("/a/IMG_01.JPG")).unwrap();
        assert_eq!(image.base_name, "IMG_01.JPG");
        assert_eq!(image.extension, "jpg");
        assert!(image.is_jpeg());
        assert!(ImageFile::from_path(Path::new("/a/README")).is_none());
    }

    #[test]
    fn csv_row_joins_keywords() {
        let image = ImageFile::from_path(Path::new("sunset.jpg")).unwrap();
        let row = CsvRow::new(
            &image,
            DescriptionRecord {
                title: "Sunset".into(),
                description: "A red sky.".into(),
                keywords: vec!["sky".into(), "red".into()],
            },
        );
        assert_eq!(row.file_name, "sunset.jpg");
        assert_eq!(row.keywords_joined, "sky,red");
        assert_eq!(row.keywords(), vec!["sky", "red"]);
    }
}
