mod api;
mod models;

pub use api::send_chat_completion;
