pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_TOKENS: u32 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

pub const DEFAULT_PROMPT: &str = "Describe this image for a stock photo library. \
Answer in exactly three labeled sections:\n\
Title: a short title of at most 10 words\n\
Description: one or two sentences describing the scene\n\
Keywords: 20 to 40 relevant keywords separated by commas";

pub const CAPTION_CONTEXT_PREFIX: &str = "Use the following context to enhance your response:";

pub const APP_DIR_NAME: &str = "SmartVisionAI";
pub const LEGACY_APP_DIR_NAME: &str = ".SmartVisionAI";
pub const CONFIG_FILE: &str = "config.toml";
pub const API_KEY_FILE: &str = "openai_key.txt";
pub const PROMPT_FILE: &str = "prompt_msg.txt";
pub const API_KEY_ENV: &str = "SMARTVISION_API_KEY";

pub const CSV_HEADER: [&str; 4] = ["filename", "title", "description", "keywords"];
pub const CSV_NAME_FORMAT: &str = "%d-%m-%Y--%H-%M-%S";
pub const KEYWORD_SEPARATOR: char = ',';

pub const KEY_DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
pub const LOG_DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
