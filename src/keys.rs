//! check-keys command: Key-set checks over mapping nodes
//!
//! Reports required keys that are missing and keys that are neither
//! allowed by name nor by pattern. Results are warnings returned as data;
//! callers decide whether they are fatal.

use crate::loader::LoaderConfig;
use crate::resolver::ReferenceResolver;
use crate::tree::Node;
use anyhow::Context;
use clap::Args;
use regex::RegexSet;
use serde::Serialize;
use tracing::warn;

#[derive(Args)]
pub struct CheckKeysArgs {
    /// Document path or URL
    pub locator: String,

    /// Check the mapping at this reference instead of the document root
    #[arg(long = "ref")]
    pub reference: Option<String>,

    /// Keys that must be present (comma-separated or repeated)
    #[arg(long, value_delimiter = ',')]
    pub required: Vec<String>,

    /// Keys that may be present (comma-separated or repeated)
    #[arg(long, value_delimiter = ',')]
    pub allowed: Vec<String>,

    /// Regex a key may match instead of an allowed name (repeatable)
    #[arg(long)]
    pub pattern: Vec<String>,

    #[command(flatten)]
    pub loader: LoaderConfig,
}

/// Output for JSON
#[derive(Debug, Serialize)]
pub struct CheckKeysOutput {
    pub locator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(flatten)]
    pub report: KeyReport,
}

pub async fn run_check_keys(args: CheckKeysArgs) -> anyhow::Result<()> {
    let rules = KeyRules::new(&args.required, &args.allowed, &args.pattern)
        .context("Invalid --pattern")?;

    let resolver = ReferenceResolver::new(&args.loader)?;
    let node = resolver
        .resolve(&args.locator, args.reference.as_deref().unwrap_or(""))
        .await?;

    let report = rules.check(&node);
    for message in report.messages() {
        warn!("{}", message);
    }

    let output = CheckKeysOutput {
        locator: args.locator,
        reference: args.reference,
        report,
    };
    println!("{}", serde_json::to_string(&output)?);

    Ok(())
}

/// Required keys absent from `node`, in the order of `required`.
///
/// A non-mapping node has no keys, so every required key is reported.
pub fn missing_keys<S: AsRef<str>>(node: &Node, required: &[S]) -> Vec<String> {
    required
        .iter()
        .map(|k| k.as_ref())
        .filter(|k| !node.has_key(k))
        .map(String::from)
        .collect()
}

/// Keys of `node` matching neither an allowed name nor any allowed pattern.
///
/// Patterns are unanchored, so a pattern matching any part of the key
/// allows it. Order follows the mapping.
pub fn invalid_keys<S: AsRef<str>>(
    node: &Node,
    allowed: &[S],
    patterns: &RegexSet,
) -> Vec<String> {
    let Some(entries) = node.as_mapping() else {
        return Vec::new();
    };

    entries
        .iter()
        .map(|(k, _)| k.as_str())
        .filter(|k| !allowed.iter().any(|a| a.as_ref() == *k))
        .filter(|k| !patterns.is_match(k))
        .map(String::from)
        .collect()
}

/// Required/allowed key rules for one kind of mapping
#[derive(Debug, Clone)]
pub struct KeyRules {
    pub required: Vec<String>,
    pub allowed: Vec<String>,
    patterns: RegexSet,
}

impl KeyRules {
    /// Build rules; fails if a pattern is not a valid regex.
    pub fn new<S: AsRef<str>>(
        required: &[S],
        allowed: &[S],
        patterns: &[S],
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            required: required.iter().map(|s| s.as_ref().to_string()).collect(),
            allowed: allowed.iter().map(|s| s.as_ref().to_string()).collect(),
            patterns: RegexSet::new(patterns.iter().map(|p| p.as_ref()))?,
        })
    }

    pub fn patterns(&self) -> &[String] {
        self.patterns.patterns()
    }

    pub fn check(&self, node: &Node) -> KeyReport {
        // Required keys are implicitly allowed.
        let allowed: Vec<&str> = self
            .allowed
            .iter()
            .chain(self.required.iter())
            .map(String::as_str)
            .collect();

        KeyReport {
            missing: missing_keys(node, &self.required),
            invalid: invalid_keys(node, &allowed, &self.patterns),
        }
    }
}

/// Outcome of [`KeyRules::check`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyReport {
    pub missing: Vec<String>,
    pub invalid: Vec<String>,
}

impl KeyReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }

    /// One line per problem, e.g. "missing required properties: a, b".
    pub fn messages(&self) -> Vec<String> {
        let mut out = Vec::new();
        if !self.missing.is_empty() {
            out.push(format!(
                "missing required {}: {}",
                plural_properties(self.missing.len()),
                self.missing.join(", ")
            ));
        }
        if !self.invalid.is_empty() {
            out.push(format!(
                "invalid {}: {}",
                plural_properties(self.invalid.len()),
                self.invalid.join(", ")
            ));
        }
        out
    }
}

pub fn plural_properties(count: usize) -> &'static str {
    if count == 1 {
        "property"
    } else {
        "properties"
    }
}
