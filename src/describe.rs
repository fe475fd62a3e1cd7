//! describe command: Indented text dump of a document tree

use crate::loader::LoaderConfig;
use crate::resolver::ReferenceResolver;
use crate::tree::Node;
use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct DescribeArgs {
    /// Document path or URL
    pub locator: String,

    /// Only describe this reference within the document (e.g. '#/definitions')
    #[arg(long = "ref")]
    pub reference: Option<String>,

    #[command(flatten)]
    pub loader: LoaderConfig,
}

pub async fn run_describe(args: DescribeArgs) -> Result<()> {
    let resolver = ReferenceResolver::new(&args.loader)?;
    let reference = args.reference.as_deref().unwrap_or("");
    let node = resolver.resolve(&args.locator, reference).await?;

    print!("{}", describe(&node, ""));
    Ok(())
}

/// Render `node` one entry per line, two more spaces per level.
///
/// Mapping entries print as `key:`, sequence items as `index:`, both
/// followed by the nested value. Scalars print their literal value.
pub fn describe(node: &Node, indent: &str) -> String {
    let mut out = String::new();
    describe_into(&mut out, node, indent);
    out
}

fn describe_into(out: &mut String, node: &Node, indent: &str) {
    let deeper = format!("{}  ", indent);
    match node {
        Node::Mapping(entries) => {
            for (key, value) in entries {
                out.push_str(&format!("{}{}:\n", indent, key));
                describe_into(out, value, &deeper);
            }
        }
        Node::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                out.push_str(&format!("{}{}:\n", indent, i));
                describe_into(out, item, &deeper);
            }
        }
        Node::Scalar(scalar) => out.push_str(&format!("{}{}\n", indent, scalar)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse_document;

    #[test]
    fn test_describe_nested() {
        let doc = parse_document(b"info:\n  title: Pets\ntags:\n  - a\n  - b\n").unwrap();
        assert_eq!(
            describe(&doc, ""),
            "info:\n  title:\n    Pets\ntags:\n  0:\n    a\n  1:\n    b\n"
        );
    }

    #[test]
    fn test_describe_keeps_mapping_order() {
        let doc = parse_document(b"b: 1\na: 2\n").unwrap();
        assert_eq!(describe(&doc, ""), "b:\n  1\na:\n  2\n");
    }

    #[test]
    fn test_describe_scalars_and_indent() {
        let doc = parse_document(b"[~, true, 1.5]").unwrap();
        assert_eq!(describe(&doc, "> "), "> 0:\n>   null\n> 1:\n>   true\n> 2:\n>   1.5\n");
    }

    #[test]
    fn test_describe_empty_structures() {
        assert_eq!(describe(&Node::Mapping(vec![]), ""), "");
        assert_eq!(describe(&Node::Sequence(vec![]), "  "), "");
        let doc = parse_document(b"a: {}\nb: []\n").unwrap();
        assert_eq!(describe(&doc, ""), "a:\nb:\n");
    }

    #[test]
    fn test_describe_deep_nesting() {
        let mut node = Node::from("leaf");
        for i in 0..200 {
            node = if i % 2 == 0 {
                Node::Mapping(vec![(format!("k{}", i), node)])
            } else {
                Node::Sequence(vec![node])
            };
        }
        let text = describe(&node, "");
        assert_eq!(text.lines().count(), 201);
        assert!(text.ends_with("leaf\n"));
    }
}
