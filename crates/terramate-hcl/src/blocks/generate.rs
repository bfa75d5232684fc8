//! `generate_file` and `generate_hcl` blocks
//!
//! ```hcl
//! generate_file "version.txt" {
//!   content   = "v${global.version}"
//!   condition = tm_can(global.version)
//! }
//!
//! generate_hcl "backend.tf" {
//!   lets {
//!     bucket = global.bucket
//!   }
//!   content {
//!     terraform {
//!       backend "gcs" { bucket = let.bucket }
//!     }
//!   }
//! }
//! ```
//!
//! The label is the name of the generated file, it has to be unique in the directory for both block types.
use crate::ast::{Attribute, RawBlock};
use crate::config::Config;
use crate::errors::{Error, Errors};
use crate::handler::{BlockHandler, ParseContext, UnmergedHandler};
use crate::info::SourceRange;
use crate::schema::{check_raw_sub_blocks, expect_labels, merge_lets, missing, set_attr};
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct GenerateFile {
    pub label: String,
    pub content: Attribute,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Attribute>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub lets: IndexMap<String, Attribute>,
    #[serde(skip)]
    pub range: SourceRange,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateHcl {
    pub label: String,
    /// the `content` block, copied verbatim into the generated file
    pub content: RawBlock,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Attribute>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub lets: IndexMap<String, Attribute>,
    #[serde(skip)]
    pub range: SourceRange,
}

pub struct GenerateFileHandler;

impl BlockHandler for GenerateFileHandler {
    fn name(&self) -> &str {
        "generate_file"
    }
}

impl UnmergedHandler for GenerateFileHandler {
    fn parse(&self, ctx: &mut ParseContext<'_>, block: &RawBlock) -> Result<(), Errors> {
        let mut errors = Errors::new();
        let label = errors.collect_one(file_label(ctx.config(), block));

        errors.append(check_raw_sub_blocks(block, "generate_file", &["lets"]));
        let lets = errors.collect(merge_lets(block)).unwrap_or_default();

        let mut content = None;
        let mut condition = None;
        for attribute in &block.attributes {
            match attribute.name.as_str() {
                "content" => errors.collect_one(set_attr(&mut content, attribute, "generate_file.content")),
                "condition" => errors.collect_one(set_attr(&mut condition, attribute, "generate_file.condition")),
                name => {
                    errors.log(Error::schema(
                        attribute.name_range.clone(),
                        format!("unrecognized attribute generate_file.{name}"),
                    ));
                    None
                }
            };
        }

        if content.is_none() {
            errors.log(missing(Some(block.def_range()), "generate_file", "content"));
        }

        if let (Some(label), Some(content)) = (label, content) {
            ctx.config().generate_files.push(GenerateFile {
                label,
                content,
                condition,
                lets,
                range: block.range.clone(),
            });
        }

        errors.into_result()
    }
}

pub struct GenerateHclHandler;

impl BlockHandler for GenerateHclHandler {
    fn name(&self) -> &str {
        "generate_hcl"
    }
}

impl UnmergedHandler for GenerateHclHandler {
    fn parse(&self, ctx: &mut ParseContext<'_>, block: &RawBlock) -> Result<(), Errors> {
        let mut errors = Errors::new();
        let label = errors.collect_one(file_label(ctx.config(), block));

        errors.append(check_raw_sub_blocks(block, "generate_hcl", &["lets", "content"]));
        let lets = errors.collect(merge_lets(block)).unwrap_or_default();

        let mut condition = None;
        for attribute in &block.attributes {
            if attribute.name == "condition" {
                errors.collect_one(set_attr(&mut condition, attribute, "generate_hcl.condition"));
            } else {
                errors.log(Error::schema(
                    attribute.name_range.clone(),
                    format!("unrecognized attribute generate_hcl.{}", attribute.name),
                ));
            }
        }

        let contents: Vec<&RawBlock> = block.blocks.iter().filter(|child| child.block_type == "content").collect();
        let content = match contents.as_slice() {
            [] => {
                errors.log(Error::schema(
                    block.def_range(),
                    "generate_hcl must have one 'content' block",
                ));
                None
            }
            [content] => {
                errors.collect_one(expect_labels(content, 0));
                Some((*content).clone())
            }
            [_, extra, ..] => {
                errors.log(Error::schema(
                    extra.def_range(),
                    "multiple generate_hcl.content blocks defined",
                ));
                None
            }
        };

        if let (Some(label), Some(content)) = (label, content) {
            ctx.config().generate_hcls.push(GenerateHcl {
                label,
                content,
                condition,
                lets,
                range: block.range.clone(),
            });
        }

        errors.into_result()
    }
}

/// The single, non-empty label naming the generated file
fn file_label(config: &Config, block: &RawBlock) -> Result<String, Error> {
    expect_labels(block, 1)?;

    let label = &block.labels[0];
    if label.is_empty() {
        return Err(Error::schema(
            block.labels_range(),
            format!("{} label can't be empty", block.block_type),
        ));
    }

    let existing = config
        .generate_files
        .iter()
        .map(|generate| (&generate.label, &generate.range))
        .chain(config.generate_hcls.iter().map(|generate| (&generate.label, &generate.range)))
        .find(|(existing, _)| *existing == label);

    if let Some((_, range)) = existing {
        return Err(Error::conflict(
            block.labels_range(),
            format!("file {label:?} is already generated by the block at {range}"),
        ));
    }

    Ok(label.clone())
}

#[cfg(test)]
mod test {
    use crate::blocks::test::{messages, parse_root};
    use crate::errors::ErrorKind;
    use crate::hcl_files;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn generate_file() {
        let parsed = parse_root(hcl_files!(
            r#"
generate_file "a.txt" {
  lets {
    x = 1
  }
  lets {
    y = let.x
  }
  content   = "hello"
  condition = true
}
"#
        ))
        .unwrap();

        let generate = &parsed.root().unwrap().generate_files[0];
        assert_eq!(generate.label, "a.txt");
        assert_eq!(generate.content.value(), Value::String("hello".into()));
        assert_eq!(generate.condition.as_ref().unwrap().value(), Value::Boolean(true));
        assert_eq!(generate.lets.keys().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn generate_file_requires_content_and_one_label() {
        let errors = parse_root(hcl_files!("generate_file {\n}\ngenerate_file \"\" {\n  content = 1\n}\n")).unwrap_err();

        assert_eq!(
            messages(&errors),
            vec![
                r#""generate_file" block expects 1 label(s) but got 0"#.to_string(),
                r#""generate_file" block requires a "content" attribute"#.to_string(),
                "generate_file label can't be empty".to_string(),
            ]
        );
    }

    #[test]
    fn generate_hcl_content_block() {
        let parsed = parse_root(hcl_files!(
            "generate_hcl \"main.tf\" {\n  content {\n    resource \"a\" \"b\" {}\n  }\n}\n"
        ))
        .unwrap();

        let generate = &parsed.root().unwrap().generate_hcls[0];
        assert_eq!(generate.content.blocks[0].block_type, "resource");
        assert_eq!(generate.content.blocks[0].labels, vec!["a", "b"]);

        let errors = parse_root(hcl_files!("generate_hcl \"main.tf\" {\n  content {}\n  content {}\n}\n")).unwrap_err();
        assert_eq!(messages(&errors), vec!["multiple generate_hcl.content blocks defined"]);

        let errors = parse_root(hcl_files!("generate_hcl \"main.tf\" {\n}\n")).unwrap_err();
        assert_eq!(messages(&errors), vec!["generate_hcl must have one 'content' block"]);
    }

    #[test]
    fn labels_are_unique_across_both_kinds() {
        let errors = parse_root(hcl_files! {
            "/a.tm" => "generate_file \"main.tf\" {\n  content = \"\"\n}\n",
            "/b.tm" => "generate_hcl \"main.tf\" {\n  content {}\n}\n"
        })
        .unwrap_err();

        assert_eq!(errors.kinds(), vec![ErrorKind::MergeConflict]);
    }
}
