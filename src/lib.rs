//! ref-resolve: `$ref` resolution for YAML/JSON API description documents
//!
//! Commands:
//! - resolve: Resolve references to document fragments
//! - describe: Dump a document tree as indented text
//! - check-keys: Report missing and unexpected mapping keys

pub mod describe;
pub mod error;
pub mod keys;
pub mod loader;
pub mod resolver;
pub mod tree;

pub use describe::describe;
pub use error::{Error, ResolveError};
pub use keys::{invalid_keys, missing_keys, KeyReport, KeyRules};
pub use loader::{DocumentLoader, LoaderConfig, Locator, ResolvedDocument};
pub use resolver::{Fragment, Reference, ReferenceResolver};
pub use tree::{parse_document, Node, Scalar};
