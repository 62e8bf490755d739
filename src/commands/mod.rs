pub mod csv_export;
pub mod describe;
pub mod settings;

use std::path::Path;

use crate::config::AppConfig;
use crate::constants::DEFAULT_PROMPT;
use crate::error::{BatchError, ConfigError};
use crate::models::{BatchMode, BatchRequest, BatchResult};
use crate::pipeline::{BatchRunner, CancelFlag};
use crate::services::{DescriptionClient, IptcWriter, ResponseParser};

use csv_export::CsvGenerator;
use describe::ImageDescriber;

/// Runs one batch in the mode the request asks for. `default_prompt` is used
/// when the request carries no custom prompt.
pub async fn run_batch<C: DescriptionClient>(
    client: &C,
    config: &AppConfig,
    request: &BatchRequest,
    default_prompt: &str,
    cancel: CancelFlag,
) -> Result<BatchResult, BatchError> {
    let mut runner = BatchRunner::new(
        client,
        ResponseParser::new(config.labels.clone()),
        config.normalized_extensions(),
        default_prompt,
    )
    .with_cancel_flag(cancel);

    log::info!(
        "Starting {} run on {}",
        match request.mode {
            BatchMode::EmbedMetadata => "metadata",
            BatchMode::GenerateCsv => "CSV",
        },
        request.source_directory.display()
    );

    match request.mode {
        BatchMode::EmbedMetadata => {
            let mut describer = ImageDescriber::new(IptcWriter::new(config.keep_originals), request);
            runner.run(request, &mut describer).await
        }
        BatchMode::GenerateCsv => {
            let mut generator = CsvGenerator::new(
                &request.destination_directory,
                config.csv_file_name.as_deref(),
            );
            runner.run(request, &mut generator).await
        }
    }
}

/// The prompt for a run: a custom prompt (which is saved for next time), else
/// the saved prompt, else the built-in one.
pub async fn resolve_prompt(storage: &Path, custom: Option<&str>) -> Result<String, ConfigError> {
    if let Some(prompt) = custom.map(str::trim).filter(|prompt| !prompt.is_empty()) {
        settings::save_prompt(storage, prompt).await?;
        return Ok(prompt.to_string());
    }
    Ok(settings::load_prompt(storage)
        .await?
        .unwrap_or_else(|| DEFAULT_PROMPT.to_string()))
}
