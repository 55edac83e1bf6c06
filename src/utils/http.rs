// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use encoding_rs::{UTF_8, WINDOWS_1251};

use crate::error::{AppError, Result};
use crate::models::TimetableConfig;

/// Create a configured asynchronous HTTP client.
///
/// The per-client timeout bounds every request made through it.
pub fn create_async_client(config: &TimetableConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Decode a response body, trying UTF-8 first and windows-1251 second.
pub fn decode_body(bytes: &[u8]) -> Result<String> {
    let (text, _, had_errors) = UTF_8.decode(bytes);
    if !had_errors {
        return Ok(text.into_owned());
    }

    let (text, _, had_errors) = WINDOWS_1251.decode(bytes);
    if had_errors {
        return Err(AppError::decode(
            "body is neither UTF-8 nor windows-1251",
        ));
    }
    Ok(text.into_owned())
}

/// Percent-encode a form value after converting it to windows-1251.
pub fn encode_cp1251_form_value(value: &str) -> String {
    let (bytes, _, _) = WINDOWS_1251.encode(value);
    url::form_urlencoded::byte_serialize(&bytes).collect()
}
