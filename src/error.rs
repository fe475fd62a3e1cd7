//! Error taxonomy for document loading and reference resolution

use thiserror::Error;

/// Errors raised while loading a document or walking a fragment path.
#[derive(Error, Debug)]
pub enum Error {
    /// Local file could not be read (missing, permission denied, ...)
    #[error("io error: {source} (path: {path})")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Fetch failed, timed out, or returned a non-success status
    #[error("network error: {message} (url: {url})")]
    Network { url: String, message: String },

    /// Bytes are not valid YAML/JSON, or not representable as a tree
    #[error("parse error: {message} (locator: {locator})")]
    Parse { locator: String, message: String },

    #[error("reference error: key '{segment}' not found (pointer: {pointer})")]
    MissingKey { segment: String, pointer: String },

    #[error("reference error: cannot look up '{segment}' in a {found} node (pointer: {pointer})")]
    NotAMapping {
        segment: String,
        pointer: String,
        found: &'static str,
    },

    #[error("reference error: cyclic reference ({chain})")]
    Cycle { chain: String },

    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl Error {
    /// True for fragment-walk failures (missing key, non-mapping node, cycle).
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self,
            Error::MissingKey { .. } | Error::NotAMapping { .. } | Error::Cycle { .. }
        )
    }
}

/// A resolution failure, tagged with the reference and the base it was resolved from.
#[derive(Error, Debug)]
#[error("cannot resolve '{reference}' from {base}")]
pub struct ResolveError {
    pub reference: String,
    pub base: String,
    #[source]
    pub source: Error,
}

impl ResolveError {
    pub fn new(reference: &str, base: &str, source: Error) -> Self {
        Self {
            reference: reference.to_string(),
            base: base.to_string(),
            source,
        }
    }

    /// The underlying failure.
    pub fn kind(&self) -> &Error {
        &self.source
    }

    pub fn is_reference_error(&self) -> bool {
        self.source.is_reference_error()
    }
}

/// Convenience alias for loader results.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let missing = Error::MissingKey {
            segment: "Widget".to_string(),
            pointer: "/definitions/Widget".to_string(),
        };
        assert!(missing.is_reference_error());

        let net = Error::Network {
            url: "https://example.com/a.yaml".to_string(),
            message: "HTTP 404 Not Found".to_string(),
        };
        assert!(!net.is_reference_error());
    }

    #[test]
    fn test_resolve_error_names_reference_and_base() {
        let err = ResolveError::new(
            "other.yaml#/definitions/Widget",
            "spec/root.yaml",
            Error::MissingKey {
                segment: "Widget".to_string(),
                pointer: "/definitions/Widget".to_string(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("other.yaml#/definitions/Widget"));
        assert!(msg.contains("spec/root.yaml"));
        assert!(err.is_reference_error());
        assert!(err.kind().to_string().contains("'Widget'"));
    }
}
