//! Visibility rules for the transaction log.
//!
//! A [`FilterConfig`] snapshot is compiled once per evaluation pass into a
//! [`CompiledFilter`], which then decides for each transaction whether it is
//! shown. Every predicate group must pass; an inactive group always passes.

use log::warn;
use regex::{Regex, RegexBuilder};
use url::Url;

use crate::models::filter::{FilterConfig, MimeBucket, StatusClass};
use crate::models::transaction::Transaction;
use crate::utils::error::{AppError, AppResult};

/// Host-supplied answer to "is this URL in scope?"
pub trait ScopeOracle: Send + Sync {
    /// Must return false for malformed or relative URLs
    fn in_scope(&self, url: &str) -> bool;
}

impl<F> ScopeOracle for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn in_scope(&self, url: &str) -> bool {
        self(url)
    }
}

/// Scope made of host patterns. A pattern matches its own host and every
/// subdomain of it; a leading "*." is accepted and ignored.
#[derive(Debug, Clone, Default)]
pub struct HostScope {
    hosts: Vec<String>,
}

impl HostScope {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|host| {
                let host = host.as_ref().trim().to_lowercase();
                host.strip_prefix("*.").map(str::to_string).unwrap_or(host)
            })
            .filter(|host| !host.is_empty())
            .collect();
        Self { hosts }
    }

}

impl ScopeOracle for HostScope {
    fn in_scope(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str().map(str::to_lowercase) else {
            return false;
        };
        self.hosts.iter().any(|pattern| {
            host == *pattern
                || host
                    .strip_suffix(pattern.as_str())
                    .map_or(false, |prefix| prefix.ends_with('.'))
        })
    }
}

/// Free-text search, either a lowered substring or a compiled pattern
#[derive(Debug)]
enum SearchMatcher {
    Substring { term: String, case_sensitive: bool },
    Pattern(Regex),
}

/// A [`FilterConfig`] prepared for repeated evaluation
#[derive(Debug)]
pub struct CompiledFilter {
    config: FilterConfig,
    hidden_extensions: Vec<String>,
    search: Option<SearchMatcher>,
    param_filter: Option<String>,
    header_filter: Option<String>,
    body_filter: Option<String>,
    negative_patterns: Vec<String>,
}

impl CompiledFilter {
    /// Prepare a filter. An invalid search pattern is logged and the search
    /// predicate is disabled rather than hiding everything.
    pub fn new(config: &FilterConfig) -> Self {
        // A blank entry ("jpg,,png") hides URLs without an extension
        let hidden_extensions = if config.hide_extensions.is_empty() {
            Vec::new()
        } else {
            config
                .hide_extensions
                .split(',')
                .map(|extension| extension.trim().to_lowercase())
                .collect()
        };

        let search = match build_search(config) {
            Ok(search) => search,
            Err(e) => {
                warn!("{}; search filter ignored", e);
                None
            }
        };

        let negative_patterns = config
            .negative_filter
            .to_lowercase()
            .split('|')
            .map(str::trim)
            .filter(|pattern| !pattern.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            config: config.clone(),
            hidden_extensions,
            search,
            param_filter: lowered(&config.param_filter),
            header_filter: lowered(&config.header_filter),
            body_filter: lowered(&config.body_search),
            negative_patterns,
        }
    }

    /// The snapshot this filter was compiled from
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Decide whether a transaction is visible
    pub fn matches(&self, transaction: &Transaction, scope: &dyn ScopeOracle) -> bool {
        self.scope_passes(transaction, scope)
            && self
                .config
                .shows_status(StatusClass::from_code(transaction.status_code))
            && self
                .config
                .shows_mime(MimeBucket::classify(&transaction.mime_type))
            && self.extension_passes(transaction)
            && self.search_passes(transaction)
            && self.param_passes(transaction)
            && self.header_passes(transaction)
            && self.body_passes(transaction)
            && self.negative_passes(transaction)
    }

    fn scope_passes(&self, transaction: &Transaction, scope: &dyn ScopeOracle) -> bool {
        !self.config.in_scope_only
            || (transaction.has_valid_url() && scope.in_scope(&transaction.url))
    }

    fn extension_passes(&self, transaction: &Transaction) -> bool {
        if self.hidden_extensions.is_empty() {
            return true;
        }
        let extension = transaction.extension.to_lowercase();
        !self.hidden_extensions.contains(&extension)
    }

    fn search_passes(&self, transaction: &Transaction) -> bool {
        let Some(search) = &self.search else {
            return true;
        };
        let haystack = format!(
            "{} {} {}",
            transaction.url, transaction.method, transaction.status_code
        );
        match search {
            SearchMatcher::Substring { term, case_sensitive: true } => haystack.contains(term.as_str()),
            SearchMatcher::Substring { term, case_sensitive: false } => {
                haystack.to_lowercase().contains(term.as_str())
            }
            SearchMatcher::Pattern(regex) => regex.is_match(&haystack),
        }
    }

    fn param_passes(&self, transaction: &Transaction) -> bool {
        let Some(filter) = &self.param_filter else {
            return true;
        };
        let Some((_, query)) = transaction.url.split_once('?') else {
            return false;
        };
        let query = query.split('#').next().unwrap_or_default();
        query
            .split('&')
            .any(|pair| pair.to_lowercase().contains(filter.as_str()))
    }

    fn header_passes(&self, transaction: &Transaction) -> bool {
        let Some(filter) = &self.header_filter else {
            return true;
        };
        transaction.request_header_block.to_lowercase().contains(filter.as_str())
            || transaction.response_header_block.to_lowercase().contains(filter.as_str())
    }

    fn body_passes(&self, transaction: &Transaction) -> bool {
        let Some(filter) = &self.body_filter else {
            return true;
        };
        transaction.request_body.to_lowercase().contains(filter.as_str())
            || transaction.response_body.to_lowercase().contains(filter.as_str())
    }

    fn negative_passes(&self, transaction: &Transaction) -> bool {
        if self.negative_patterns.is_empty() {
            return true;
        }
        let url = transaction.url.to_lowercase();
        !self
            .negative_patterns
            .iter()
            .any(|pattern| url.contains(pattern.as_str()))
    }
}

/// Decide visibility of a single transaction against a filter snapshot.
///
/// Compiles the filter on every call; use [`CompiledFilter`] for passes over
/// many transactions.
pub fn is_visible(transaction: &Transaction, config: &FilterConfig, scope: &dyn ScopeOracle) -> bool {
    CompiledFilter::new(config).matches(transaction, scope)
}

/// Check that a search configuration can be compiled
pub fn validate(config: &FilterConfig) -> AppResult<()> {
    build_search(config).map(|_| ())
}

fn build_search(config: &FilterConfig) -> AppResult<Option<SearchMatcher>> {
    if config.search_term.is_empty() {
        return Ok(None);
    }

    if !config.use_regex {
        let term = if config.case_sensitive {
            config.search_term.clone()
        } else {
            config.search_term.to_lowercase()
        };
        return Ok(Some(SearchMatcher::Substring {
            term,
            case_sensitive: config.case_sensitive,
        }));
    }

    RegexBuilder::new(&config.search_term)
        .case_insensitive(!config.case_sensitive)
        .build()
        .map(|regex| Some(SearchMatcher::Pattern(regex)))
        .map_err(|e| AppError::InvalidPattern(format!("'{}': {}", config.search_term, e)))
}

/// Trimmed, lowercased filter text, or None when blank
fn lowered(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_lowercase())
}
