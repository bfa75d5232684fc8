//! `stack` block
//!
//! Marks the directory as a stack. Every attribute is optional and kept unevaluated.
use crate::ast::{Attribute, RawBlock};
use crate::errors::{Error, Errors};
use crate::handler::{BlockHandler, ParseContext, UnmergedHandler};
use crate::info::SourceRange;
use crate::schema::{check_raw_sub_blocks, expect_labels, set_attr};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Stack {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wants: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wanted_by: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch: Option<Attribute>,
    #[serde(skip)]
    pub range: Option<SourceRange>,
}

pub struct StackHandler;

impl BlockHandler for StackHandler {
    fn name(&self) -> &str {
        "stack"
    }
}

impl UnmergedHandler for StackHandler {
    fn parse(&self, ctx: &mut ParseContext<'_>, block: &RawBlock) -> Result<(), Errors> {
        let mut errors = Errors::new();

        if let Some(existing) = ctx.config().stack.as_ref().and_then(|stack| stack.range.clone()) {
            errors.log(Error::conflict(
                block.def_range(),
                format!("duplicated stack blocks, first one declared at {existing}"),
            ));
            return Err(errors);
        }

        errors.collect_one(expect_labels(block, 0));
        errors.append(check_raw_sub_blocks(block, "stack", &[]));

        let mut stack = Stack {
            range: Some(block.range.clone()),
            ..Default::default()
        };

        for attribute in &block.attributes {
            let slot = match attribute.name.as_str() {
                "id" => &mut stack.id,
                "name" => &mut stack.name,
                "description" => &mut stack.description,
                "tags" => &mut stack.tags,
                "after" => &mut stack.after,
                "before" => &mut stack.before,
                "wants" => &mut stack.wants,
                "wanted_by" => &mut stack.wanted_by,
                "watch" => &mut stack.watch,
                name => {
                    errors.log(Error::schema(
                        attribute.name_range.clone(),
                        format!("unrecognized attribute stack.{name}"),
                    ));
                    continue;
                }
            };

            let qualified = format!("stack.{}", attribute.name);
            errors.collect_one(set_attr(slot, attribute, &qualified));
        }

        ctx.config().stack = Some(stack);
        errors.into_result()
    }
}

#[cfg(test)]
mod test {
    use crate::blocks::test::{messages, parse_root};
    use crate::errors::ErrorKind;
    use crate::hcl_files;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn attributes_are_kept() {
        let parsed = parse_root(hcl_files!(
            "stack {\n  name = \"app\"\n  tags = [\"a\", \"b\"]\n  after = [global.dep]\n}\n"
        ))
        .unwrap();

        let stack = parsed.root().unwrap().stack.as_ref().unwrap();
        assert_eq!(stack.name.as_ref().unwrap().value(), Value::String("app".into()));
        assert_eq!(
            stack.tags.as_ref().unwrap().value(),
            Value::Array(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            stack.after.as_ref().unwrap().value(),
            Value::Expression("[global.dep]".into())
        );
        assert!(stack.id.is_none());
    }

    #[test]
    fn only_one_stack_per_directory() {
        let errors = parse_root(hcl_files! {
            "/a.tm" => "stack {}\n",
            "/b.tm" => "stack {}\n"
        })
        .unwrap_err();

        assert_eq!(errors.kinds(), vec![ErrorKind::MergeConflict]);
        assert!(messages(&errors)[0].starts_with("duplicated stack blocks"));
    }

    #[test]
    fn rejects_labels_blocks_and_unknown_attributes() {
        let errors = parse_root(hcl_files!("stack \"x\" {\n  nme = \"a\"\n  lets {}\n}\n")).unwrap_err();

        assert_eq!(
            messages(&errors),
            vec![
                r#""stack" block expects 0 label(s) but got 1"#.to_string(),
                r#"unrecognized block "lets" in stack"#.to_string(),
                "unrecognized attribute stack.nme".to_string(),
            ]
        );
    }
}
