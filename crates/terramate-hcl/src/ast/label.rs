//! label path normalization
//!
//! The same logical block can be written with inline labels or with nested single-child blocks:
//!
//! ```hcl
//! bundle "x" "environment" "prod" {}
//!
//! bundle "x" {
//!   environment {
//!     prod {}
//!   }
//! }
//! ```
//!
//! Both normalize to the [LabelPath] `bundle "x" "environment" "prod"`. Nesting is only pulled into the path while a
//! body has no attributes and exactly one child block, and only up to the block type's maximum label count.
use super::RawBlock;
use crate::errors::Error;

/// Canonical identity of a block: its type and labels
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct LabelPath {
    pub block_type: String,
    pub labels: Vec<String>,
}

impl LabelPath {
    pub fn new(block_type: impl Into<String>, labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            block_type: block_type.into(),
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn unlabeled(block_type: impl Into<String>) -> Self {
        Self {
            block_type: block_type.into(),
            labels: vec![],
        }
    }

    /// Path as written inline, nesting is not considered
    pub fn of(block: &RawBlock) -> Self {
        Self::new(&block.block_type, &block.labels)
    }

    /// The block type followed by the labels
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.block_type.as_str()).chain(self.labels.iter().map(String::as_str))
    }
}

impl std::fmt::Display for LabelPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.block_type)?;
        for label in &self.labels {
            write!(f, " {label:?}")?;
        }
        Ok(())
    }
}

/// Label rules of one block type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSchema {
    /// `None` means unbounded
    pub max_labels: Option<usize>,
    /// pull single-child nesting into the label path
    pub nested_labels: bool,
}

impl LabelSchema {
    /// Any number of inline labels, nesting is kept as is
    pub const INLINE: LabelSchema = LabelSchema {
        max_labels: None,
        nested_labels: false,
    };

    pub const fn nested(max_labels: usize) -> Self {
        Self {
            max_labels: Some(max_labels),
            nested_labels: true,
        }
    }

    /// Rules for the children of the block at `path`
    ///
    /// A child key `t "l"` continues the label path of its parent, so whatever the parent used up is not available to
    /// the child anymore.
    pub fn below(&self, path: &LabelPath) -> LabelSchema {
        LabelSchema {
            max_labels: self.max_labels.map(|max| max.saturating_sub(path.labels.len() + 1)),
            nested_labels: self.nested_labels,
        }
    }

    fn allows(&self, count: usize) -> bool {
        self.max_labels.map_or(true, |max| count <= max)
    }
}

/// Result of [normalize]
#[derive(Debug)]
pub struct Normalized<'b> {
    pub path: LabelPath,
    /// the innermost block whose attributes and children belong to `path`
    pub body: &'b RawBlock,
}

/// Computes the canonical label path of `block`
pub fn normalize<'b>(block: &'b RawBlock, schema: LabelSchema) -> Result<Normalized<'b>, Error> {
    if !schema.allows(block.labels.len()) {
        return Err(Error::schema(
            block.labels_range(),
            format!(
                "too many labels for block {:?}: expected at most {} but got {}",
                block.block_type,
                schema.max_labels.unwrap_or_default(),
                block.labels.len()
            ),
        ));
    }

    let mut normalized = Normalized {
        path: LabelPath::of(block),
        body: block,
    };
    pull_nesting(&mut normalized, schema);

    tracing::trace!(path = %normalized.path, "normalized");
    Ok(normalized)
}

/// Key of a block nested in a merged block
///
/// `schema` is the one of the parent, see [LabelSchema::below]. Inline labels beyond the maximum are kept as written,
/// the section checks of the handler report them.
pub fn normalize_child(child: &RawBlock, schema: LabelSchema) -> Normalized<'_> {
    let mut normalized = Normalized {
        path: LabelPath::of(child),
        body: child,
    };
    pull_nesting(&mut normalized, schema);
    normalized
}

fn pull_nesting(normalized: &mut Normalized<'_>, schema: LabelSchema) {
    if !schema.nested_labels {
        return;
    }

    while let [child] = normalized.body.blocks.as_slice() {
        if !normalized.body.attributes.is_empty() {
            break;
        }

        let depth = normalized.path.labels.len() + 1 + child.labels.len();
        if !schema.allows(depth) {
            break;
        }

        normalized.path.labels.push(child.block_type.clone());
        normalized.path.labels.extend(child.labels.iter().cloned());
        normalized.body = child;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::test::parse;
    use pretty_assertions::assert_eq;

    fn normalized(text: &str, schema: LabelSchema) -> (LabelPath, Vec<String>) {
        let file = parse("/cfg.tm", text);
        let normalized = normalize(&file.blocks[0], schema).expect("must normalize");
        let attributes = normalized.body.attributes.iter().map(|a| a.name.clone()).collect();
        (normalized.path, attributes)
    }

    #[test]
    fn inline_nested_and_mixed_agree() {
        let schema = LabelSchema::nested(3);
        let expected = (LabelPath::new("block", ["a", "b", "c"]), vec!["x".to_string()]);

        assert_eq!(normalized(r#"block "a" "b" "c" { x = 1 }"#, schema), expected);
        assert_eq!(normalized("block \"a\" {\n  b {\n    c {\n      x = 1\n    }\n  }\n}\n", schema), expected);
        assert_eq!(normalized("block \"a\" \"b\" {\n  c {\n    x = 1\n  }\n}\n", schema), expected);
        assert_eq!(normalized("block \"a\" {\n  b \"c\" {\n    x = 1\n  }\n}\n", schema), expected);
    }

    #[test]
    fn stops_at_attributes_and_siblings() {
        let schema = LabelSchema::nested(3);

        let (path, attributes) =
            normalized("bundle \"x\" {\n  source = \"s\"\n  inputs {\n    a = 1\n  }\n}\n", schema);
        assert_eq!(path, LabelPath::new("bundle", ["x"]));
        assert_eq!(attributes, vec!["source"]);

        let (path, _) = normalized("bundle \"x\" {\n  inputs {\n    a = 1\n  }\n  environment \"e\" {}\n}\n", schema);
        assert_eq!(path, LabelPath::new("bundle", ["x"]));
    }

    #[test]
    fn stops_at_max_depth() {
        let (path, _) = normalized(
            "bundle \"x\" {\n  environment \"prod\" {\n    inputs {\n      a = 1\n    }\n  }\n}\n",
            LabelSchema::nested(3),
        );
        assert_eq!(path, LabelPath::new("bundle", ["x", "environment", "prod"]));
    }

    #[test]
    fn inline_schema_keeps_nesting() {
        let (path, _) = normalized("globals \"a\" {\n  b {\n    c = 1\n  }\n}\n", LabelSchema::INLINE);
        assert_eq!(path, LabelPath::new("globals", ["a"]));
    }

    #[test]
    fn too_many_labels() {
        let file = parse("/cfg.tm", r#"component "a" "b" "c" {}"#);
        let error = normalize(&file.blocks[0], LabelSchema::nested(2)).unwrap_err();

        assert_eq!(error.kind, crate::errors::ErrorKind::Schema);
        assert_eq!(error.range, Some(file.blocks[0].labels_range()));
        assert!(error.message.starts_with("too many labels"));
    }

    #[test]
    fn children_share_the_label_budget() {
        let schema = LabelSchema::nested(3);
        let file = parse(
            "/cfg.tm",
            r#"
bundle "x" {
  uuid = "u"
  environment {
    prod {
      inputs {
        a = 1
      }
    }
  }
}
"#,
        );
        let top = normalize(&file.blocks[0], schema).unwrap();
        assert_eq!(top.path, LabelPath::new("bundle", ["x"]));

        let child_schema = schema.below(&top.path);
        assert_eq!(child_schema.max_labels, Some(1));

        let child = normalize_child(&top.body.blocks[0], child_schema);
        assert_eq!(child.path, LabelPath::new("environment", ["prod"]));

        let grandchild = normalize_child(&child.body.blocks[0], child_schema.below(&child.path));
        assert_eq!(grandchild.path, LabelPath::unlabeled("inputs"));
    }

    #[test]
    fn inline_children_are_kept_as_written() {
        let file = parse("/cfg.tm", "globals {\n  a {\n    b {\n      c = 1\n    }\n  }\n}\n");
        let child = normalize_child(&file.blocks[0].blocks[0], LabelSchema::INLINE);
        assert_eq!(child.path, LabelPath::unlabeled("a"));

        let file = parse("/cfg.tm", "x {\n  component \"a\" \"b\" \"c\" {}\n}\n");
        let child = normalize_child(&file.blocks[0].blocks[0], LabelSchema::nested(1));
        assert_eq!(child.path, LabelPath::new("component", ["a", "b", "c"]));
    }

    #[test]
    fn display() {
        assert_eq!(LabelPath::new("bundle", ["x", "inputs"]).to_string(), r#"bundle "x" "inputs""#);
        assert_eq!(LabelPath::unlabeled("terramate").to_string(), "terramate");
    }
}
