//! `environment` block
//!
//! ```hcl
//! environment {
//!   id           = "prod"
//!   name         = "Production"
//!   promote_from = "staging"
//! }
//! ```
use crate::ast::{Attribute, RawBlock};
use crate::errors::{Error, Errors};
use crate::handler::{BlockHandler, ParseContext, UnmergedHandler};
use crate::info::SourceRange;
use crate::schema::{check_raw_sub_blocks, expect_labels, missing, set_attr};
use crate::util::string_literal;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Environment {
    pub id: Attribute,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promote_from: Option<Attribute>,
    #[serde(skip)]
    pub range: SourceRange,
}

impl Environment {
    /// The id when written as a string literal
    pub fn literal_id(&self) -> Option<String> {
        string_literal(&self.id).ok()
    }
}

pub struct EnvironmentHandler;

impl BlockHandler for EnvironmentHandler {
    fn name(&self) -> &str {
        "environment"
    }
}

impl UnmergedHandler for EnvironmentHandler {
    fn parse(&self, ctx: &mut ParseContext<'_>, block: &RawBlock) -> Result<(), Errors> {
        let mut errors = Errors::new();
        errors.collect_one(expect_labels(block, 0));
        errors.append(check_raw_sub_blocks(block, "environment", &[]));

        let (mut id, mut name, mut description, mut promote_from) = (None, None, None, None);
        for attribute in &block.attributes {
            let slot = match attribute.name.as_str() {
                "id" => &mut id,
                "name" => &mut name,
                "description" => &mut description,
                "promote_from" => &mut promote_from,
                other => {
                    errors.log(Error::schema(
                        attribute.name_range.clone(),
                        format!("unrecognized attribute environment.{other}"),
                    ));
                    continue;
                }
            };
            errors.collect_one(set_attr(slot, attribute, &format!("environment.{}", attribute.name)));
        }

        let Some(id) = id else {
            errors.log(missing(Some(block.def_range()), "environment", "id"));
            return Err(errors);
        };

        let environment = Environment {
            id,
            name,
            description,
            promote_from,
            range: block.range.clone(),
        };

        if let Some(literal) = environment.literal_id() {
            let duplicate = ctx
                .config()
                .environments
                .iter()
                .find(|other| other.literal_id().as_deref() == Some(literal.as_str()))
                .map(|other| other.id.range.clone());

            if let Some(first) = duplicate {
                errors.log(Error::conflict(
                    environment.id.expr_range.clone(),
                    format!("environment {literal:?} already declared at {first}"),
                ));
            }
        }

        ctx.config().environments.push(environment);
        errors.into_result()
    }
}
