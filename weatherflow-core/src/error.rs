use chrono::NaiveDate;
use thiserror::Error;

use crate::observation::DecodeError;

#[derive(Debug, Error)]
pub enum WeatherFlowError {
    /// A required identifier (API key, device id) is missing. Raised before any request is sent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network request failed for {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP request failed for {url} with status {status}: {body}")]
    Http {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Unexpected response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    /// Non-zero vendor status code, or a legacy `{ "error": ... }` body. Message is passed through verbatim.
    #[error("WeatherFlow API error (status {code}): {message}")]
    VendorStatus { code: i64, message: String },

    #[error("Unsupported observation type '{0}'")]
    UnsupportedObservationType(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("No daily precipitation value reported for {date}")]
    MissingPrecipitation { date: NaiveDate },

    #[error("Accumulation window must cover at least one day")]
    InvalidWindow,

    #[error("Local time {0} does not exist in the current time zone")]
    InvalidDate(String),
}

pub type Result<T, E = WeatherFlowError> = std::result::Result<T, E>;
