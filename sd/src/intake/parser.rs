//! Intake wire format parser
//!
//! A submission is four newline-separated ASCII fields:
//!
//! ```text
//! <priority>\n<endpoint>\n<user_id>\n<max_retries>
//! ```

use std::num::ParseIntError;

use reqwest::Url;
use thiserror::Error;
use tracing::debug;

use crate::domain::Request;

/// Number of fields in a submission
const FIELD_COUNT: usize = 4;

/// Errors produced while parsing an intake datagram
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Message is not valid UTF-8")]
    NotUtf8,

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {value:?} ({source})")]
    InvalidNumber {
        field: &'static str,
        value: String,
        source: ParseIntError,
    },

    #[error("Invalid endpoint URL {value:?}: {reason}")]
    InvalidUrl { value: String, reason: String },

    #[error("Unsupported endpoint scheme: {0}")]
    UnsupportedScheme(String),
}

/// Parse a raw datagram into a [`Request`]
pub fn parse_request(data: &[u8]) -> Result<Request, ParseError> {
    let text = std::str::from_utf8(data).map_err(|_| ParseError::NotUtf8)?;
    let mut fields = text.splitn(FIELD_COUNT + 1, '\n').map(|f| f.trim());

    let priority_raw = next_field(&mut fields, "priority")?;
    let endpoint_raw = next_field(&mut fields, "endpoint")?;
    let user_raw = next_field(&mut fields, "user_id")?;
    let retries_raw = next_field(&mut fields, "max_retries")?;

    let priority: i8 = parse_number("priority", priority_raw)?;
    let user_id: u32 = parse_number("user_id", user_raw)?;
    let max_retries: u8 = parse_number("max_retries", retries_raw)?;

    let endpoint = Url::parse(endpoint_raw).map_err(|e| ParseError::InvalidUrl {
        value: endpoint_raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(endpoint.scheme(), "http" | "https") {
        return Err(ParseError::UnsupportedScheme(endpoint.scheme().to_string()));
    }

    let request = Request::new(priority, endpoint, user_id, max_retries);
    debug!(
        endpoint_key = %request.endpoint_key,
        priority,
        user_id,
        class = %request.class,
        "parse_request: parsed"
    );
    Ok(request)
}

fn next_field<'a>(fields: &mut impl Iterator<Item = &'a str>, name: &'static str) -> Result<&'a str, ParseError> {
    match fields.next() {
        Some(field) if !field.is_empty() => Ok(field),
        _ => Err(ParseError::MissingField(name)),
    }
}

fn parse_number<T>(field: &'static str, value: &str) -> Result<T, ParseError>
where
    T: std::str::FromStr<Err = ParseIntError>,
{
    value.parse().map_err(|source| ParseError::InvalidNumber {
        field,
        value: value.to_string(),
        source,
    })
}
