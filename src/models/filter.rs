use serde::{Deserialize, Serialize};

/// Extensions hidden when no other list has been configured
pub const DEFAULT_HIDDEN_EXTENSIONS: &str = "jpg,jpeg,png,gif,ico,svg,woff,woff2,mp4";

/// Raw MIME labels that all fall into the image bucket
const IMAGE_LABELS: [&str; 4] = ["JPEG", "GIF", "PNG", "image"];

/// Display criteria for the transaction log
///
/// A value of this type is a complete snapshot; edits are staged on a copy and
/// committed as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Only show transactions the scope oracle accepts
    pub in_scope_only: bool,

    pub show_2xx: bool,
    pub show_3xx: bool,
    pub show_4xx: bool,
    pub show_5xx: bool,

    pub mime_html: bool,
    pub mime_script: bool,
    pub mime_xml: bool,
    pub mime_json: bool,
    pub mime_css: bool,
    pub mime_image: bool,
    pub mime_other: bool,

    /// Comma-separated extension denylist
    pub hide_extensions: String,

    /// Free-text search over URL, method and status
    pub search_term: String,
    pub use_regex: bool,
    pub case_sensitive: bool,

    /// Substring that must appear in one query parameter
    pub param_filter: String,

    /// Substring that must appear in the request or response headers
    pub header_filter: String,

    /// Substring that must appear in the request or response body
    pub body_search: String,

    /// Pipe-separated URL substrings that hide a transaction
    pub negative_filter: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            in_scope_only: false,
            show_2xx: true,
            show_3xx: true,
            show_4xx: true,
            show_5xx: true,
            mime_html: true,
            mime_script: true,
            mime_xml: true,
            mime_json: true,
            mime_css: true,
            mime_image: true,
            mime_other: true,
            hide_extensions: DEFAULT_HIDDEN_EXTENSIONS.to_string(),
            search_term: String::new(),
            use_regex: false,
            case_sensitive: false,
            param_filter: String::new(),
            header_filter: String::new(),
            body_search: String::new(),
            negative_filter: String::new(),
        }
    }
}

impl FilterConfig {
    /// Whether the given status class is shown. Codes outside 200-599 always are.
    pub fn shows_status(&self, class: StatusClass) -> bool {
        match class {
            StatusClass::Success => self.show_2xx,
            StatusClass::Redirection => self.show_3xx,
            StatusClass::ClientError => self.show_4xx,
            StatusClass::ServerError => self.show_5xx,
            StatusClass::Other => true,
        }
    }

    /// Whether the given MIME bucket is shown
    pub fn shows_mime(&self, bucket: MimeBucket) -> bool {
        match bucket {
            MimeBucket::Html => self.mime_html,
            MimeBucket::Script => self.mime_script,
            MimeBucket::Xml => self.mime_xml,
            MimeBucket::Json => self.mime_json,
            MimeBucket::Css => self.mime_css,
            MimeBucket::Image => self.mime_image,
            MimeBucket::Other => self.mime_other,
        }
    }

    /// Labels of the active advanced filters, in display order
    pub fn active_filters(&self) -> Vec<&'static str> {
        let mut active = Vec::new();
        if self.in_scope_only {
            active.push("In-Scope");
        }
        if !self.param_filter.is_empty() {
            active.push("Params");
        }
        if !self.header_filter.is_empty() {
            active.push("Headers");
        }
        if !self.body_search.is_empty() {
            active.push("Body");
        }
        if !self.negative_filter.is_empty() {
            active.push("Negative");
        }
        active
    }

    /// Short description of the filter state for status lines
    pub fn summary(&self) -> String {
        let active = self.active_filters();
        if active.is_empty() {
            "Showing All".to_string()
        } else {
            format!("Filtered: {}", active.join(", "))
        }
    }
}

/// Coarse classification of a response status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusClass {
    Success,
    Redirection,
    ClientError,
    ServerError,
    /// Anything outside 200-599, including 0 for "no response"
    Other,
}

impl StatusClass {
    pub fn from_code(code: u16) -> Self {
        match code {
            200..=299 => StatusClass::Success,
            300..=399 => StatusClass::Redirection,
            400..=499 => StatusClass::ClientError,
            500..=599 => StatusClass::ServerError,
            _ => StatusClass::Other,
        }
    }
}

/// Content-type bucket used for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MimeBucket {
    Html,
    Script,
    Xml,
    Json,
    Css,
    Image,
    Other,
}

impl MimeBucket {
    /// Map a stated MIME label onto its bucket. Labels are matched exactly;
    /// anything unrecognised, including "Unknown", is `Other`.
    pub fn classify(label: &str) -> Self {
        match label {
            "HTML" => MimeBucket::Html,
            "script" => MimeBucket::Script,
            "XML" => MimeBucket::Xml,
            "JSON" => MimeBucket::Json,
            "CSS" => MimeBucket::Css,
            l if IMAGE_LABELS.contains(&l) => MimeBucket::Image,
            _ => MimeBucket::Other,
        }
    }
}
