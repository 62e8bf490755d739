pub mod error;
pub mod providers;
pub mod types;
pub mod utils;

pub use error::LLMError;
pub use providers::send_chat;
pub use types::{LLMClient, LLMMessage, LLMMessageType, LLMProvider, LLMUserType};
