//! resolve command: Resolve `$ref` pointers into document fragments
//!
//! A reference is `[file]["#"fragment]`. The file part is located relative
//! to the base document; the fragment is a `/`-separated key path walked
//! through mappings. Results are memoized per resolver, so one resolver
//! should live for one resolution session.

use crate::error::{Error, ResolveError};
use crate::loader::{DocumentLoader, LoaderConfig, Locator, ResolvedDocument};
use crate::tree::Node;
use anyhow::Result;
use clap::Args;
use futures::future::{join_all, BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

#[derive(Args)]
pub struct ResolveArgs {
    /// Base document (path or URL) that references are relative to
    pub base: String,

    /// References to resolve, e.g. '#/definitions/Pet' or 'common.yaml#/Error'
    #[arg(required = true)]
    pub refs: Vec<String>,

    /// Inline nested $ref entries in the result
    #[arg(long)]
    pub deep: bool,

    /// Output format: json (default) or yaml
    #[arg(long, short, default_value = "json")]
    pub format: String,

    #[command(flatten)]
    pub loader: LoaderConfig,
}

pub async fn run_resolve(args: ResolveArgs) -> Result<()> {
    let resolver = ReferenceResolver::new(&args.loader)?;
    let base = args.base.as_str();
    let deep = args.deep;

    // Output keys must stay unique; keep the first occurrence of each ref.
    let mut seen = HashSet::new();
    let refs: Vec<&str> = args
        .refs
        .iter()
        .map(String::as_str)
        .filter(|r| seen.insert(*r))
        .collect();

    let results = join_all(refs.iter().map(|reference| {
        let resolver = &resolver;
        async move {
            if deep {
                resolver.resolve_deep(base, reference).await
            } else {
                resolver
                    .resolve(base, reference)
                    .await
                    .map(|fragment| fragment.node().clone())
            }
        }
    }))
    .await
    .into_iter()
    .collect::<std::result::Result<Vec<Node>, ResolveError>>()?;

    let output = match <[Node; 1]>::try_from(results) {
        Ok([node]) => node,
        Err(results) => Node::Mapping(
            refs.iter()
                .map(|r| r.to_string())
                .zip(results)
                .collect(),
        ),
    };

    let text = match args.format.as_str() {
        "yaml" | "yml" => serde_yaml::to_string(&output)?,
        _ => serde_json::to_string_pretty(&output)?,
    };
    println!("{}", text.trim_end());

    debug!(
        loads = resolver.load_count(),
        resolutions = resolver.resolution_count(),
        "done"
    );

    Ok(())
}

/// A reference string split into its file and fragment parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference<'a> {
    /// Empty for same-document references
    pub file: &'a str,
    pub fragment: Option<&'a str>,
}

impl<'a> Reference<'a> {
    pub fn parse(raw: &'a str) -> Self {
        match raw.split_once('#') {
            Some((file, fragment)) => Reference {
                file,
                fragment: Some(fragment),
            },
            None => Reference {
                file: raw,
                fragment: None,
            },
        }
    }

    /// Decoded key path; `~1` and `~0` decode to `/` and `~`.
    ///
    /// A missing or empty fragment names the whole document. Exactly one
    /// leading `/` is dropped and every other segment is a key, empty ones
    /// included: `#/` names the `""` key and `#/a//b` looks up `""` under `a`.
    ///
    /// A fragment without a leading `/` (`#a/b`) walks all of its segments,
    /// starting with `a`; the first segment is not skipped unconditionally.
    pub fn segments(&self) -> Vec<String> {
        let fragment = self.fragment.unwrap_or("");
        if fragment.is_empty() {
            return Vec::new();
        }

        fragment
            .strip_prefix('/')
            .unwrap_or(fragment)
            .split('/')
            .map(|s| s.replace("~1", "/").replace("~0", "~"))
            .collect()
    }
}

/// Walk `segments` down a chain of mappings.
pub fn walk<'n>(root: &'n Node, segments: &[String]) -> Result<&'n Node, Error> {
    let positions = locate(root, segments)?;
    Ok(follow(root, &positions))
}

/// Entry positions, one per segment, leading from `root` to the target.
fn locate(root: &Node, segments: &[String]) -> Result<Vec<usize>, Error> {
    let mut node = root;
    let mut pointer = String::new();
    let mut positions = Vec::with_capacity(segments.len());

    for segment in segments {
        pointer.push('/');
        pointer.push_str(segment);

        let Some(entries) = node.as_mapping() else {
            return Err(Error::NotAMapping {
                segment: segment.clone(),
                pointer,
                found: node.kind_name(),
            });
        };
        let position = entries
            .iter()
            .position(|(k, _)| k == segment)
            .ok_or_else(|| Error::MissingKey {
                segment: segment.clone(),
                pointer: pointer.clone(),
            })?;

        positions.push(position);
        node = &entries[position].1;
    }

    Ok(positions)
}

fn follow<'n>(root: &'n Node, positions: &[usize]) -> &'n Node {
    positions.iter().fold(root, |node, &i| match node {
        Node::Mapping(entries) => &entries[i].1,
        _ => node,
    })
}

/// A resolved subtree, borrowed from the cached document it lives in
///
/// Cloning is cheap: the document is shared and only the entry positions
/// leading to the subtree are copied. Dereferences to the [`Node`].
#[derive(Debug, Clone)]
pub struct Fragment {
    document: Arc<ResolvedDocument>,
    positions: Vec<usize>,
}

impl Fragment {
    pub fn node(&self) -> &Node {
        follow(&self.document.root, &self.positions)
    }

    /// The whole document this fragment belongs to
    pub fn document(&self) -> &Arc<ResolvedDocument> {
        &self.document
    }

    /// Identity of the document the fragment came from
    pub fn identity(&self) -> &str {
        &self.document.identity
    }
}

impl Deref for Fragment {
    type Target = Node;

    fn deref(&self) -> &Node {
        self.node()
    }
}

type DocumentCell = Arc<OnceCell<Arc<ResolvedDocument>>>;

/// Resolves references, memoizing fragments by (base, reference) and
/// documents by identity.
///
/// The fragment cache key includes the base locator, not just the reference
/// string: `#/definitions/Pet` from `a.yaml` and from `b.yaml` name different
/// nodes and must not share an entry.
///
/// Safe to share between concurrent callers: each document is loaded at
/// most once, even when several callers ask for it at the same time.
pub struct ReferenceResolver {
    loader: DocumentLoader,
    documents: Mutex<HashMap<String, DocumentCell>>,
    fragments: Mutex<HashMap<(String, String), Fragment>>,
    loads: AtomicUsize,
    resolutions: AtomicUsize,
}

impl ReferenceResolver {
    pub fn new(config: &LoaderConfig) -> Result<Self, Error> {
        Ok(Self::with_loader(DocumentLoader::new(config)?))
    }

    pub fn with_loader(loader: DocumentLoader) -> Self {
        Self {
            loader,
            documents: Mutex::new(HashMap::new()),
            fragments: Mutex::new(HashMap::new()),
            loads: AtomicUsize::new(0),
            resolutions: AtomicUsize::new(0),
        }
    }

    /// Number of documents actually read or fetched
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of resolutions that missed the fragment cache
    pub fn resolution_count(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }

    /// Resolve `reference` relative to the document at `base`.
    ///
    /// The returned fragment points into the cached document; repeated calls
    /// with the same arguments return the same node without further I/O.
    pub async fn resolve(&self, base: &str, reference: &str) -> Result<Fragment, ResolveError> {
        self.resolve_entry(base, reference).await
    }

    /// Resolve `reference`, then replace every nested `{$ref: ...}` mapping
    /// with its target, recursively. Nested references are relative to the
    /// document they appear in.
    ///
    /// A reference that is already being expanded further up the chain
    /// fails with [`Error::Cycle`].
    pub async fn resolve_deep(&self, base: &str, reference: &str) -> Result<Node, ResolveError> {
        let mut chain = Vec::new();
        self.expand(base, reference, &mut chain).await
    }

    /// Load (or fetch from cache) the whole document at `locator`.
    pub async fn load_document(
        &self,
        locator: &str,
    ) -> Result<Arc<ResolvedDocument>, ResolveError> {
        self.document(&Locator::parse(locator))
            .await
            .map_err(|e| ResolveError::new("", locator, e))
    }

    async fn resolve_entry(&self, base: &str, reference: &str) -> Result<Fragment, ResolveError> {
        let key = (base.to_string(), reference.to_string());
        if let Some(hit) = self.fragments.lock().await.get(&key) {
            debug!(reference, base, "cache hit");
            return Ok(hit.clone());
        }

        let n = self.resolutions.fetch_add(1, Ordering::SeqCst);
        debug!(n, reference, base, "resolving");

        let fail = |e: Error| ResolveError::new(reference, base, e);
        let parsed = Reference::parse(reference);
        let base_locator = Locator::parse(base);
        let target = if parsed.file.is_empty() {
            base_locator
        } else {
            base_locator.join(parsed.file).map_err(fail)?
        };

        let document = self.document(&target).await.map_err(fail)?;
        let positions = locate(&document.root, &parsed.segments()).map_err(fail)?;
        let resolved = Fragment {
            document,
            positions,
        };

        // Another caller may have finished first; keep whichever landed first.
        let mut cache = self.fragments.lock().await;
        Ok(cache.entry(key).or_insert(resolved).clone())
    }

    async fn document(&self, locator: &Locator) -> Result<Arc<ResolvedDocument>, Error> {
        let cell = {
            let mut documents = self.documents.lock().await;
            Arc::clone(documents.entry(locator.identity()).or_default())
        };

        let document = cell
            .get_or_try_init(|| async {
                self.loads.fetch_add(1, Ordering::SeqCst);
                self.loader.load(locator).await.map(Arc::new)
            })
            .await?;

        Ok(Arc::clone(document))
    }

    fn expand<'a>(
        &'a self,
        base: &'a str,
        reference: &'a str,
        chain: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<Node, ResolveError>> {
        async move {
            let resolved = self.resolve_entry(base, reference).await?;
            let target = format!(
                "{}#{}",
                resolved.identity(),
                Reference::parse(reference).segments().join("/")
            );

            if chain.contains(&target) {
                let mut links = chain.clone();
                links.push(target);
                return Err(ResolveError::new(
                    reference,
                    base,
                    Error::Cycle {
                        chain: links.join(" -> "),
                    },
                ));
            }

            chain.push(target);
            let expanded = self
                .inline(resolved.node(), resolved.identity(), chain)
                .await;
            chain.pop();
            expanded
        }
        .boxed()
    }

    fn inline<'a>(
        &'a self,
        node: &'a Node,
        base: &'a str,
        chain: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<Node, ResolveError>> {
        async move {
            match node {
                Node::Mapping(entries) => {
                    if let Some(reference) = node.get("$ref").and_then(Node::as_str) {
                        return self.expand(base, reference, chain).await;
                    }
                    let mut out = Vec::with_capacity(entries.len());
                    for (key, value) in entries {
                        out.push((key.clone(), self.inline(value, base, chain).await?));
                    }
                    Ok(Node::Mapping(out))
                }
                Node::Sequence(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.inline(item, base, chain).await?);
                    }
                    Ok(Node::Sequence(out))
                }
                Node::Scalar(_) => Ok(node.clone()),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_document;

    #[test]
    fn test_parse_reference() {
        assert_eq!(
            Reference::parse("other.yaml#/definitions/Widget"),
            Reference {
                file: "other.yaml",
                fragment: Some("/definitions/Widget")
            }
        );
        assert_eq!(
            Reference::parse("#/definitions/Widget"),
            Reference {
                file: "",
                fragment: Some("/definitions/Widget")
            }
        );
        assert_eq!(
            Reference::parse("other.yaml"),
            Reference {
                file: "other.yaml",
                fragment: None
            }
        );
    }

    #[test]
    fn test_split_on_first_hash() {
        let r = Reference::parse("a.yaml#/x#y");
        assert_eq!(r.file, "a.yaml");
        assert_eq!(r.segments(), vec!["x#y"]);
    }

    #[test]
    fn test_segments() {
        assert_eq!(
            Reference::parse("#/definitions/Widget").segments(),
            vec!["definitions", "Widget"]
        );
        assert_eq!(
            Reference::parse("#/paths/~1pets~1{id}/get").segments(),
            vec!["paths", "/pets/{id}", "get"]
        );
        assert_eq!(Reference::parse("#/a~01").segments(), vec!["a~1"]);
        assert!(Reference::parse("other.yaml").segments().is_empty());
        assert!(Reference::parse("other.yaml#").segments().is_empty());
    }

    #[test]
    fn test_segments_keep_empty_keys() {
        assert_eq!(Reference::parse("#/").segments(), vec![""]);
        assert_eq!(
            Reference::parse("#/definitions//Widget").segments(),
            vec!["definitions", "", "Widget"]
        );
        assert_eq!(
            Reference::parse("#/definitions/Widget/").segments(),
            vec!["definitions", "Widget", ""]
        );
        assert_eq!(
            Reference::parse("#definitions/Widget").segments(),
            vec!["definitions", "Widget"]
        );
    }

    #[test]
    fn test_walk() {
        let doc = parse_document(b"definitions:\n  Widget:\n    type: object\n").unwrap();
        let segments = vec!["definitions".to_string(), "Widget".to_string()];
        let node = walk(&doc, &segments).unwrap();
        assert_eq!(node.get("type").and_then(Node::as_str), Some("object"));
    }

    #[test]
    fn test_walk_missing_key_names_segment() {
        let doc = parse_document(b"definitions:\n  Widget: {}\n").unwrap();
        let segments = vec!["definitions".to_string(), "Gadget".to_string()];
        match walk(&doc, &segments).unwrap_err() {
            Error::MissingKey { segment, pointer } => {
                assert_eq!(segment, "Gadget");
                assert_eq!(pointer, "/definitions/Gadget");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_walk_does_not_index_sequences() {
        let doc = parse_document(b"tags:\n  - a\n  - b\n").unwrap();
        let segments = vec!["tags".to_string(), "0".to_string()];
        match walk(&doc, &segments).unwrap_err() {
            Error::NotAMapping { found, .. } => assert_eq!(found, "sequence"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_walk_empty_segment_is_a_key() {
        let doc = parse_document(b"definitions:\n  Widget: {}\n").unwrap();
        let segments = vec!["definitions".to_string(), String::new(), "Widget".to_string()];
        match walk(&doc, &segments).unwrap_err() {
            Error::MissingKey { segment, pointer } => {
                assert_eq!(segment, "");
                assert_eq!(pointer, "/definitions/");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_walk_through_scalar_fails() {
        let doc = parse_document(b"a: 1\n").unwrap();
        let segments = vec!["a".to_string(), "b".to_string()];
        assert!(walk(&doc, &segments).unwrap_err().is_reference_error());
    }
}
