use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::constants::{APP_DIR_NAME, LEGACY_APP_DIR_NAME};
use crate::error::ConfigError;

/// Where keys, the saved prompt and the config file live.
pub fn app_storage_dir() -> PathBuf {
    if let Some(dir) = dirs::data_local_dir() {
        return dir.join(APP_DIR_NAME);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(LEGACY_APP_DIR_NAME)
}

pub async fn ensure_dir(path: &Path) -> Result<(), ConfigError> {
    fs::create_dir_all(path)
        .await
        .map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// Contents of `dir/file_name`, or `None` when the file does not exist yet.
pub async fn read_text_file(dir: &Path, file_name: &str) -> Result<Option<String>, ConfigError> {
    let path = dir.join(file_name);
    match fs::read_to_string(&path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Read { path, source }),
    }
}

pub async fn write_text_file(dir: &Path, file_name: &str, contents: &str) -> Result<(), ConfigError> {
    ensure_dir(dir).await?;
    let path = dir.join(file_name);
    fs::write(&path, contents)
        .await
        .map_err(|source| ConfigError::Write { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_text_file(dir.path(), "nothing.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_creates_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("SmartVisionAI");
        write_text_file(&nested, "note.txt", "hello").await.unwrap();
        assert_eq!(
            read_text_file(&nested, "note.txt").await.unwrap().as_deref(),
            Some("hello")
        );
    }

    #[test]
    fn test_storage_dir_is_named_after_the_app() {
        let dir = app_storage_dir();
        let name = dir.file_name().and_then(|name| name.to_str()).unwrap();
        assert!(name == APP_DIR_NAME || name == LEGACY_APP_DIR_NAME);
    }
}
