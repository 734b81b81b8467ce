use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder for URL parts that could not be determined
pub const UNKNOWN: &str = "Unknown";

/// A captured HTTP request paired with its (possibly absent) response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Display number, 1-based and contiguous in store order
    pub sequence_number: u64,

    /// Wall-clock time of capture
    pub captured_at: DateTime<Utc>,

    /// Absolute request URL, or "Unknown"
    pub url: String,

    /// Host component of the URL, or "Unknown"
    pub host: String,

    /// File extension of the last path segment, original case
    pub extension: String,

    /// HTTP method token
    pub method: String,

    /// Request line and headers, trimmed
    pub request_header_block: String,

    /// Request body text
    pub request_body: String,

    /// Response status code, 0 when no response was captured
    pub status_code: u16,

    /// Stated MIME label of the response, "Unknown" when no response
    pub mime_type: String,

    /// Status line and headers of the response, trimmed
    pub response_header_block: String,

    /// Response body text
    pub response_body: String,
}

impl Transaction {
    /// Whether a response was captured for this request
    pub fn has_response(&self) -> bool {
        self.status_code != 0
    }

    /// Whether the URL could be parsed when the transaction was built
    pub fn has_valid_url(&self) -> bool {
        self.url != UNKNOWN
    }

    /// Fields that make two transactions duplicates of each other
    pub fn signature(&self) -> (&str, &str, &str, u16, &str) {
        (
            &self.method,
            &self.url,
            &self.request_body,
            self.status_code,
            &self.response_body,
        )
    }
}

/// A concise representation of a transaction for list views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSummary {
    /// Position in the store, used for deletion and export
    pub index: usize,

    /// Display number
    pub id: u64,

    /// Capture time
    pub timestamp: DateTime<Utc>,

    pub host: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub mime_type: String,
    pub extension: String,
}

impl TransactionSummary {
    pub fn new(index: usize, transaction: &Transaction) -> Self {
        Self {
            index,
            id: transaction.sequence_number,
            timestamp: transaction.captured_at,
            host: transaction.host.clone(),
            method: transaction.method.clone(),
            url: transaction.url.clone(),
            status: transaction.status_code,
            mime_type: transaction.mime_type.clone(),
            extension: transaction.extension.clone(),
        }
    }
}

/// A completed request/response pair as delivered by the capture source
#[derive(Debug, Clone, Default)]
pub struct RawExchange {
    /// HTTP method token
    pub method: String,

    /// Request URL as reported by the proxy
    pub url: Option<String>,

    /// Raw request bytes (headers followed by body)
    pub request: Vec<u8>,

    /// Offset of the request body, located at the first blank line if absent
    pub request_body_offset: Option<usize>,

    /// Response, if one was received
    pub response: Option<RawResponse>,
}

/// Raw response half of an exchange
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    /// Raw response bytes (headers followed by body)
    pub bytes: Vec<u8>,

    /// Offset of the response body, located at the first blank line if absent
    pub body_offset: Option<usize>,

    /// Status code as derived by the proxy, 0 if it did not derive one
    pub status_code: u16,

    /// MIME label stated by the proxy
    pub stated_mime_type: Option<String>,
}
