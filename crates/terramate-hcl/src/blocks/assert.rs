//! `assert` block
//!
//! ```hcl
//! assert {
//!   assertion = global.region != ""
//!   message   = "region must be set"
//!   warning   = true
//! }
//! ```
use crate::ast::{Attribute, RawBlock};
use crate::errors::{Error, Errors};
use crate::handler::{BlockHandler, ParseContext, UnmergedHandler};
use crate::info::SourceRange;
use crate::schema::{check_raw_sub_blocks, expect_labels, missing, set_attr};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Assert {
    pub assertion: Attribute,
    pub message: Attribute,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<Attribute>,
    #[serde(skip)]
    pub range: SourceRange,
}

pub struct AssertHandler;

impl BlockHandler for AssertHandler {
    fn name(&self) -> &str {
        "assert"
    }
}

impl UnmergedHandler for AssertHandler {
    fn parse(&self, ctx: &mut ParseContext<'_>, block: &RawBlock) -> Result<(), Errors> {
        let mut errors = Errors::new();
        errors.collect_one(expect_labels(block, 0));
        errors.append(check_raw_sub_blocks(block, "assert", &[]));

        let (mut assertion, mut message, mut warning) = (None, None, None);
        for attribute in &block.attributes {
            let slot = match attribute.name.as_str() {
                "assertion" => &mut assertion,
                "message" => &mut message,
                "warning" => &mut warning,
                name => {
                    errors.log(Error::schema(
                        attribute.name_range.clone(),
                        format!("unrecognized attribute assert.{name}"),
                    ));
                    continue;
                }
            };
            errors.collect_one(set_attr(slot, attribute, &format!("assert.{}", attribute.name)));
        }

        for (slot, name) in [(&assertion, "assertion"), (&message, "message")] {
            if slot.is_none() {
                errors.log(missing(Some(block.def_range()), "assert", name));
            }
        }

        if let (Some(assertion), Some(message)) = (assertion, message) {
            ctx.config().asserts.push(Assert {
                assertion,
                message,
                warning,
                range: block.range.clone(),
            });
        }

        errors.into_result()
    }
}
