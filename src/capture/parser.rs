use chrono::Utc;
use log::{debug, log_enabled, warn, Level};
use url::Url;

use crate::models::transaction::{RawExchange, RawResponse, Transaction, UNKNOWN};

/// Builds transactions from raw exchanges delivered by the capture source
///
/// Nothing here fails: fields that cannot be derived fall back to "Unknown"
/// or empty values and the transaction is still recorded.
#[derive(Debug, Default)]
pub struct TransactionParser {}

/// URL-derived fields of a transaction
struct UrlParts {
    url: String,
    host: String,
    extension: String,
}

impl TransactionParser {
    /// Create a new transaction parser
    pub fn new() -> Self {
        Self {}
    }

    /// Turn a raw exchange into a transaction. The sequence number is left at
    /// zero for the store to assign.
    pub fn parse_exchange(&self, exchange: RawExchange) -> Transaction {
        if log_enabled!(Level::Debug) {
            debug!(
                "Parsing {} {} ({} request bytes)",
                exchange.method,
                exchange.url.as_deref().unwrap_or(UNKNOWN),
                exchange.request.len()
            );
        }

        let parts = Self::parse_url(exchange.url.as_deref());
        let (request_header_block, request_body) =
            Self::split_message(&exchange.request, exchange.request_body_offset);

        let mut transaction = Transaction {
            sequence_number: 0,
            captured_at: Utc::now(),
            url: parts.url,
            host: parts.host,
            extension: parts.extension,
            method: exchange.method.trim().to_string(),
            request_header_block,
            request_body,
            status_code: 0,
            mime_type: UNKNOWN.to_string(),
            response_header_block: String::new(),
            response_body: String::new(),
        };

        if let Some(response) = exchange.response {
            self.attach_response(&mut transaction, response);
        }

        transaction
    }

    fn attach_response(&self, transaction: &mut Transaction, response: RawResponse) {
        let (header_block, body) = Self::split_message(&response.bytes, response.body_offset);

        let status_code = if response.status_code != 0 {
            response.status_code
        } else {
            Self::status_from_header_block(&header_block).unwrap_or(0)
        };

        // A response without a status is indistinguishable from no response
        if status_code == 0 {
            warn!("Dropping response without a status code for {}", transaction.url);
            return;
        }

        let mime_type = response
            .stated_mime_type
            .map(|mime| mime.trim().to_string())
            .filter(|mime| !mime.is_empty())
            .or_else(|| {
                Self::header_value(&header_block, "content-type").and_then(Self::mime_label)
            })
            .unwrap_or_else(|| UNKNOWN.to_string());

        transaction.status_code = status_code;
        transaction.mime_type = mime_type;
        transaction.response_header_block = header_block;
        transaction.response_body = body;
    }

    fn parse_url(raw: Option<&str>) -> UrlParts {
        let unknown = || UrlParts {
            url: UNKNOWN.to_string(),
            host: UNKNOWN.to_string(),
            extension: String::new(),
        };

        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return unknown();
        };

        let parsed = match Url::parse(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Could not parse URL '{}': {}", raw, e);
                return unknown();
            }
        };

        let Some(host) = parsed.host_str().map(str::to_string) else {
            debug!("URL '{}' has no host", raw);
            return unknown();
        };

        UrlParts {
            url: raw.to_string(),
            host,
            extension: Self::extension_of(parsed.path()),
        }
    }

    /// Extension of the last path segment, or empty
    fn extension_of(path: &str) -> String {
        path.rsplit('/')
            .next()
            .and_then(|segment| segment.rsplit_once('.'))
            .map(|(_, extension)| extension.to_string())
            .unwrap_or_default()
    }

    /// Split raw bytes into a trimmed header block and a body
    fn split_message(bytes: &[u8], offset: Option<usize>) -> (String, String) {
        let offset = offset
            .unwrap_or_else(|| Self::find_body_offset(bytes))
            .min(bytes.len());
        let (head, body) = bytes.split_at(offset);
        (
            String::from_utf8_lossy(head).trim().to_string(),
            String::from_utf8_lossy(body).into_owned(),
        )
    }

    /// Offset just past the first blank line, or the end of the message
    pub fn find_body_offset(bytes: &[u8]) -> usize {
        let crlf = bytes
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|pos| pos + 4);
        let lf = bytes
            .windows(2)
            .position(|window| window == b"\n\n")
            .map(|pos| pos + 2);

        match (crlf, lf) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => bytes.len(),
        }
    }

    /// Status code from a status line such as "HTTP/1.1 404 Not Found"
    fn status_from_header_block(header_block: &str) -> Option<u16> {
        let status_line = header_block.lines().next()?;
        let mut parts = status_line.split_whitespace();
        let version = parts.next()?;
        if !version.starts_with("HTTP/") {
            return None;
        }
        parts.next()?.parse().ok()
    }

    fn header_value<'a>(header_block: &'a str, name: &str) -> Option<&'a str> {
        header_block.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }

    /// Map a Content-Type header onto the proxy's stated MIME vocabulary
    fn mime_label(content_type: &str) -> Option<String> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        let label = match essence.as_str() {
            "" => return None,
            "text/html" | "application/xhtml+xml" => "HTML",
            "application/javascript" | "text/javascript" | "application/x-javascript" => "script",
            "application/json" => "JSON",
            "text/css" => "CSS",
            "image/jpeg" | "image/jpg" => "JPEG",
            "image/gif" => "GIF",
            "image/png" => "PNG",
            e if e.ends_with("+json") => "JSON",
            e if e.ends_with("/xml") || e.ends_with("+xml") => "XML",
            e if e.starts_with("image/") => "image",
            e if e.starts_with("text/") => "text",
            _ => return None,
        };
        Some(label.to_string())
    }
}
