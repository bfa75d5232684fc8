//! declarative block schemas
//!
//! Composite blocks (`bundle`, `component`, `define`) can address the same target through many label depths:
//!
//! ```hcl
//! bundle "x" {
//!   environment "prod" {
//!     source = "a"
//!   }
//! }
//!
//! bundle "x" "environment" "prod" {
//!   source = "a"
//! }
//!
//! bundle "x" {
//!   environment {
//!     prod {
//!       source = "a"
//!     }
//!   }
//! }
//! ```
//!
//! Instead of branching on the label count per block type, each of them declares a static [Section] tree and
//! [dispatch] walks it. Remaining labels and nested blocks are treated the same: a sub-block `t "l"` below a section
//! continues the walk with the segments `t`, `l`. A [Section::named] section consumes one extra segment as the
//! member name, so `environment "prod"` visits section `environment` with the name `prod`.
//!
//! The walk checks attribute names against the section, the [SectionVisitor] only stores them.
use crate::ast::merged::MergedBlock;
use crate::ast::{Attribute, RawBlock};
use crate::errors::{Error, Errors};
use crate::info::SourceRange;
use crate::util::quoted_choice;
use indexmap::IndexMap;

/// Attribute names a section accepts
#[derive(Debug, Clone, Copy)]
pub enum Attrs {
    /// free form, for example `inputs`
    Any,
    Only(&'static [&'static str]),
}

#[derive(Debug)]
pub struct Section<S: 'static> {
    pub id: S,
    pub keyword: &'static str,
    /// consumes a member name after the keyword
    pub named: bool,
    pub attributes: Attrs,
    pub children: &'static [Section<S>],
}

impl<S> Section<S> {
    fn child(&self, keyword: &str) -> Option<&'static Section<S>> {
        self.children.iter().find(|child| child.keyword == keyword)
    }

    fn check_attributes(&self, block: &MergedBlock, errors: &mut Errors) {
        let Attrs::Only(valid) = self.attributes else {
            return;
        };

        for attribute in block.attributes.values() {
            if valid.contains(&attribute.name.as_str()) {
                continue;
            }

            let message = if valid.is_empty() {
                format!("{:?} block must not have attributes but found {:?}", self.keyword, attribute.name)
            } else {
                format!(
                    "unrecognized attribute {}.{}: valid attributes are [{}] but found {:?}",
                    self.keyword,
                    attribute.name,
                    valid.join(", "),
                    attribute.name
                )
            };
            errors.log(Error::schema(attribute.name_range.clone(), message));
        }
    }
}

pub trait SectionVisitor<S> {
    /// Called for each merged block that lands on `section`
    ///
    /// `names` holds the member names of all named sections on the way, outermost first.
    fn visit(&mut self, section: S, names: &[String], block: &MergedBlock) -> Result<(), Errors>;
}

#[derive(Clone, Copy)]
enum Cursor<S: 'static> {
    At(&'static Section<S>),
    /// keyword consumed, member name pending
    Naming(&'static Section<S>),
}

/// Walks `root` along the labels of `block` and then along its sub-blocks
pub fn dispatch<S: Copy>(
    root: &'static Section<S>,
    block: &MergedBlock,
    visitor: &mut impl SectionVisitor<S>,
) -> Result<(), Errors> {
    let mut errors = Errors::new();
    let cursor = if root.named {
        Cursor::Naming(root)
    } else {
        Cursor::At(root)
    };

    let mut names = vec![];
    walk(
        cursor,
        &mut names,
        &block.path.labels,
        block,
        block.labels_range(),
        visitor,
        &mut errors,
    );

    errors.into_result()
}

fn walk<S: Copy>(
    mut cursor: Cursor<S>,
    names: &mut Vec<String>,
    segments: &[String],
    block: &MergedBlock,
    range: Option<SourceRange>,
    visitor: &mut impl SectionVisitor<S>,
    errors: &mut Errors,
) {
    let depth = names.len();

    for segment in segments {
        cursor = match cursor {
            Cursor::At(section) => match section.child(segment) {
                Some(child) if child.named => Cursor::Naming(child),
                Some(child) => Cursor::At(child),
                None => {
                    let expected: Vec<&str> = section.children.iter().map(|child| child.keyword).collect();
                    let message = if expected.is_empty() {
                        format!("unexpected {segment:?} in {:?} block, it has no sub-blocks", section.keyword)
                    } else {
                        format!(
                            "unexpected {segment:?} in {:?} block, expected {}",
                            section.keyword,
                            quoted_choice(&expected)
                        )
                    };
                    errors.log(Error::schema(range, message));
                    names.truncate(depth);
                    return;
                }
            },
            Cursor::Naming(section) => {
                names.push(segment.clone());
                Cursor::At(section)
            }
        };
    }

    match cursor {
        Cursor::At(section) => {
            section.check_attributes(block, errors);
            errors.collect(visitor.visit(section.id, names, block));

            for (path, sub_block) in &block.sub_blocks {
                let segments: Vec<String> = path.segments().map(str::to_owned).collect();
                walk(
                    Cursor::At(section),
                    names,
                    &segments,
                    sub_block,
                    sub_block.def_range(),
                    visitor,
                    errors,
                );
            }
        }
        Cursor::Naming(section) => {
            for attribute in block.attributes.values() {
                errors.log(Error::schema(
                    attribute.name_range.clone(),
                    format!(
                        "{:?} block requires a label, attribute {:?} is not allowed here",
                        section.keyword, attribute.name
                    ),
                ));
            }

            if block.sub_blocks.is_empty() {
                errors.log(Error::schema(
                    range,
                    format!("{:?} block requires a label", section.keyword),
                ));
            }

            for (path, sub_block) in &block.sub_blocks {
                let segments: Vec<String> = path.segments().map(str::to_owned).collect();
                walk(
                    Cursor::Naming(section),
                    names,
                    &segments,
                    sub_block,
                    sub_block.def_range(),
                    visitor,
                    errors,
                );
            }
        }
    }

    names.truncate(depth);
}

/// Stores an attribute that may be declared only once across all forms
pub fn set_attr(slot: &mut Option<Attribute>, attribute: &Attribute, qualified: &str) -> Result<(), Error> {
    if let Some(existing) = slot {
        if existing.range == attribute.range {
            return Ok(());
        }

        return Err(Error::conflict(
            attribute.name_range.clone(),
            format!("attribute {qualified} already declared at {}", existing.name_range),
        ));
    }

    *slot = Some(attribute.clone());
    Ok(())
}

/// [set_attr] for free form attribute maps (inputs, lets, ...)
pub fn set_entry(
    entries: &mut IndexMap<String, Attribute>,
    attribute: &Attribute,
    qualified: &str,
) -> Result<(), Error> {
    if let Some(existing) = entries.get(&attribute.name) {
        if existing.range == attribute.range {
            return Ok(());
        }

        return Err(Error::conflict(
            attribute.name_range.clone(),
            format!(
                "{qualified} {:?} already declared at {}",
                attribute.name, existing.name_range
            ),
        ));
    }

    entries.insert(attribute.name.clone(), attribute.clone());
    Ok(())
}

/// Error for a required attribute that is not set
pub fn missing(range: Option<SourceRange>, block: &str, attribute: &str) -> Error {
    Error::schema(range, format!("{block:?} block requires a {attribute:?} attribute"))
}

/// Checks the attribute names of a raw block
pub fn check_raw_attributes(block: &RawBlock, qualifier: &str, valid: &[&str]) -> Errors {
    let mut errors = Errors::new();
    for attribute in &block.attributes {
        if !valid.contains(&attribute.name.as_str()) {
            errors.log(Error::schema(
                attribute.name_range.clone(),
                format!("unrecognized attribute {qualifier}.{}", attribute.name),
            ));
        }
    }
    errors
}

/// Rejects sub-blocks of a raw block whose type is not in `allowed`
pub fn check_raw_sub_blocks(block: &RawBlock, qualifier: &str, allowed: &[&str]) -> Errors {
    let mut errors = Errors::new();
    for child in &block.blocks {
        if !allowed.contains(&child.block_type.as_str()) {
            errors.log(Error::schema(
                child.def_range(),
                format!("unrecognized block {:?} in {qualifier}", child.block_type),
            ));
        }
    }
    errors
}

/// Label count check for raw blocks
pub fn expect_labels(block: &RawBlock, expected: usize) -> Result<(), Error> {
    if block.labels.len() == expected {
        return Ok(());
    }

    Err(Error::schema(
        block.labels_range(),
        format!(
            "{:?} block expects {expected} label(s) but got {}",
            block.block_type,
            block.labels.len()
        ),
    ))
}

/// Merges the `lets` sub-blocks of a raw block into one attribute map
///
/// `lets` takes no labels and only attributes, duplicates are conflicts.
pub fn merge_lets(block: &RawBlock) -> Result<IndexMap<String, Attribute>, Errors> {
    let mut errors = Errors::new();
    let mut lets = IndexMap::new();

    for child in block.blocks.iter().filter(|child| child.block_type == "lets") {
        if !child.labels.is_empty() {
            errors.log(Error::schema(child.labels_range(), "lets block must have no labels"));
        }

        errors.append(check_raw_sub_blocks(child, "lets", &[]));
        for attribute in &child.attributes {
            errors.collect_one(set_entry(&mut lets, attribute, "lets attribute"));
        }
    }

    errors.into_result_with(lets)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::label::{normalize, LabelSchema};
    use crate::ast::merged::{ConflictPolicy, Occurrence};
    use crate::ast::test::parse;
    use crate::errors::ErrorKind;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Id {
        Thing,
        Settings,
        Member,
        Leaf,
    }

    static TREE: Section<Id> = Section {
        id: Id::Thing,
        keyword: "thing",
        named: true,
        attributes: Attrs::Only(&["source"]),
        children: &[
            Section {
                id: Id::Settings,
                keyword: "settings",
                named: false,
                attributes: Attrs::Any,
                children: &[],
            },
            Section {
                id: Id::Member,
                keyword: "member",
                named: true,
                attributes: Attrs::Only(&["value"]),
                children: &[Section {
                    id: Id::Leaf,
                    keyword: "leaf",
                    named: false,
                    attributes: Attrs::Only(&[]),
                    children: &[],
                }],
            },
        ],
    };

    #[derive(Default)]
    struct Recorder {
        visits: Vec<(Id, Vec<String>, Vec<String>)>,
    }

    impl SectionVisitor<Id> for Recorder {
        fn visit(&mut self, section: Id, names: &[String], block: &MergedBlock) -> Result<(), Errors> {
            let attributes = block.attributes.keys().cloned().collect();
            self.visits.push((section, names.to_vec(), attributes));
            Ok(())
        }
    }

    fn run(text: &str) -> (Recorder, Result<(), Errors>) {
        let file = parse("/cfg.tm", text);
        let schema = LabelSchema::nested(4);
        let normalized = normalize(&file.blocks[0], schema).unwrap();
        let mut merged = MergedBlock::new(normalized.path.clone());
        merged
            .merge_raw(normalized.body, Occurrence::of(&file.blocks[0]), schema, ConflictPolicy::SameDirectory)
            .unwrap();

        let mut recorder = Recorder::default();
        let result = dispatch(&TREE, &merged, &mut recorder);
        (recorder, result)
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn labels_and_nesting_reach_the_same_section() {
        let expected = vec![(Id::Member, strings(&["a", "m"]), strings(&["value"]))];

        for text in [
            r#"thing "a" "member" "m" { value = 1 }"#,
            "thing \"a\" {\n  member \"m\" {\n    value = 1\n  }\n}\n",
            "thing \"a\" {\n  member {\n    m {\n      value = 1\n    }\n  }\n}\n",
            "thing {\n  a {\n    member \"m\" {\n      value = 1\n    }\n  }\n}\n",
        ] {
            let (recorder, result) = run(text);
            result.unwrap();
            let member_visits: Vec<_> =
                recorder.visits.into_iter().filter(|(id, _, _)| *id == Id::Member).collect();
            assert_eq!(member_visits, expected, "{text}");
        }
    }

    #[test]
    fn visits_every_section_once() {
        let (recorder, result) = run(r#"
thing "a" {
  source = "s"
  settings {
    x = 1
  }
  member "m" {
    leaf {}
  }
}
"#);
        result.unwrap();

        let visited: Vec<_> = recorder.visits.iter().map(|(id, names, _)| (*id, names.clone())).collect();
        assert_eq!(
            visited,
            vec![
                (Id::Thing, strings(&["a"])),
                (Id::Settings, strings(&["a"])),
                (Id::Member, strings(&["a", "m"])),
                (Id::Leaf, strings(&["a", "m"])),
            ]
        );
    }

    #[test]
    fn unknown_labels_and_attributes() {
        let (_, result) = run("thing \"a\" {\n  source = \"s\"\n  other = 1\n  unknown {}\n}\n");
        let errors = result.unwrap_err();

        assert_eq!(errors.kinds(), vec![ErrorKind::Schema, ErrorKind::Schema]);
        let messages: Vec<_> = errors.iter().map(|error| error.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                r#"unrecognized attribute thing.other: valid attributes are [source] but found "other""#,
                r#"unexpected "unknown" in "thing" block, expected "settings" or "member""#,
            ]
        );
    }

    #[test]
    fn missing_member_name() {
        let (_, result) = run("thing \"a\" {\n  source = \"s\"\n  member {\n    value = 1\n  }\n}\n");
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|error| error.message.contains("requires a label")));
    }

    #[test]
    fn set_attr_rejects_second_form() {
        let file = parse("/cfg.tm", "a = 1\na = 2\n");
        let mut slot = None;

        set_attr(&mut slot, &file.attributes[0], "thing.a").unwrap();
        set_attr(&mut slot, &file.attributes[0], "thing.a").unwrap();
        let error = set_attr(&mut slot, &file.attributes[1], "thing.a").unwrap_err();
        assert_eq!(error.kind, ErrorKind::MergeConflict);
    }

    #[test]
    fn lets_are_merged() {
        let file = parse("/cfg.tm", "script {\n lets { a = 1 }\n lets { b = 2 }\n}\n");
        let lets = merge_lets(&file.blocks[0]).unwrap();
        assert_eq!(lets.keys().collect::<Vec<_>>(), vec!["a", "b"]);

        let file = parse("/cfg.tm", "script {\n lets { a = 1 }\n lets { a = 2 }\n}\n");
        assert!(merge_lets(&file.blocks[0]).is_err());
    }
}
