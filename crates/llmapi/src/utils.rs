use base64::Engine as _;
use reqwest::{Client, Response};
use std::path::Path;

use crate::error::LLMError;
use crate::types::LLMClient;

pub fn detect_mime_type<P: AsRef<Path>>(path: P) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("image/jpeg")
        .to_string()
}

pub fn encode_byte_to_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn current_timestamp_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or_default()
}

pub(crate) fn http_client(client: &LLMClient) -> Result<Client, LLMError> {
    let mut builder = Client::builder();
    if let Some(timeout) = client.timeout() {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(LLMError::from)
}

/// Reads the body of a provider reply, turning non-success statuses into
/// [`LLMError::Status`] so the caller keeps the status code.
pub(crate) async fn read_success_body(
    provider: &'static str,
    response: Response,
) -> Result<String, LLMError> {
    let status = response.status();
    let response_text = response.text().await?;

    if !status.is_success() {
        log::debug!("{provider} replied with status {status}");
        return Err(LLMError::Status {
            provider,
            status: status.as_u16(),
            body: response_text,
        });
    }

    Ok(response_text)
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    provider: &'static str,
    response_text: &str,
) -> Result<T, LLMError> {
    serde_json::from_str(response_text).map_err(|err| LLMError::Decode {
        provider,
        message: format!("{err}. Raw response: {response_text}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_type_follows_extension() {
        assert_eq!(detect_mime_type("a/b/photo.PNG"), "image/png");
        assert_eq!(detect_mime_type("photo.jpeg"), "image/jpeg");
        assert_eq!(detect_mime_type("no_extension"), "image/jpeg");
    }

    #[test]
    fn decode_json_reports_raw_body() {
        let err = decode_json::<serde_json::Value>("OpenAI", "not json").unwrap_err();
        match err {
            LLMError::Decode { provider, message } => {
                assert_eq!(provider, "OpenAI");
                assert!(message.contains("not json"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
