pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod fs_utils;
pub mod models;
pub mod pipeline;
pub mod services;

pub use commands::csv_export::{load_rows, write_rows, CsvGenerator};
pub use commands::describe::ImageDescriber;
pub use commands::settings::{api_key_info, load_prompt, save_api_key, save_prompt};
pub use commands::{resolve_prompt, run_batch};

pub use config::{AppConfig, ConfigLoader};
pub use error::{AccessError, BatchError, ConfigError, DescribeError, ParseError, WriteError};

pub use models::{
    BatchMode, BatchRequest, BatchResult, CsvRow, DescriptionRecord, ErrorKind, FailedFile,
    ImageFile, RunState,
};
pub use pipeline::{BatchProgress, BatchRunner, BatchSink, CancelFlag, LogProgress};
