use std::path::Path;

use chrono::Local;

use crate::config::parse_key_record;
use crate::constants::{API_KEY_FILE, KEY_DATE_FORMAT, PROMPT_FILE};
use crate::error::ConfigError;
use crate::fs_utils::{read_text_file, write_text_file};

/// Stores `key` with the time it was saved, replacing any previous key.
pub async fn save_api_key(storage: &Path, key: &str) -> Result<(), ConfigError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::Invalid("API key must not be empty".into()));
    }
    let line = format!("{}; {}", Local::now().format(KEY_DATE_FORMAT), key);
    write_text_file(storage, API_KEY_FILE, &line).await?;
    log::info!("API key saved");
    Ok(())
}

pub async fn api_key_info(storage: &Path) -> Result<String, ConfigError> {
    let record = read_text_file(storage, API_KEY_FILE)
        .await?
        .as_deref()
        .and_then(parse_key_record);
    Ok(match record {
        Some(record) if !record.saved_at.is_empty() => {
            format!("Last updated API key from {}", record.saved_at)
        }
        Some(_) => "API key available".to_string(),
        None => "No API key available".to_string(),
    })
}

/// The last prompt used for a run, if one was saved.
pub async fn load_prompt(storage: &Path) -> Result<Option<String>, ConfigError> {
    Ok(read_text_file(storage, PROMPT_FILE)
        .await?
        .map(|prompt| prompt.trim().to_string())
        .filter(|prompt| !prompt.is_empty()))
}

pub async fn save_prompt(storage: &Path, prompt: &str) -> Result<(), ConfigError> {
    write_text_file(storage, PROMPT_FILE, prompt.trim()).await
}
