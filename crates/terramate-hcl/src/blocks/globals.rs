//! `globals` block
//!
//! ```hcl
//! globals {
//!   env = "prod"
//! }
//! globals "gcp" "project" {
//!   id = "x"
//! }
//! ```
//!
//! Labels form the object path the attributes are assigned below, `global.gcp.project.id` in the example.
use crate::ast::label::LabelSchema;
use crate::ast::merged::MergedBlock;
use crate::ast::Attribute;
use crate::errors::{Error, Errors};
use crate::handler::{BlockHandler, MergedLabelsHandler, ParseContext};
use crate::info::SourceRange;
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Globals {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub attributes: IndexMap<String, Attribute>,
    #[serde(skip)]
    pub range: Option<SourceRange>,
}

pub struct GlobalsHandler;

impl BlockHandler for GlobalsHandler {
    fn name(&self) -> &str {
        "globals"
    }
}

impl MergedLabelsHandler for GlobalsHandler {
    fn label_schema(&self) -> LabelSchema {
        LabelSchema::INLINE
    }

    fn parse(&self, ctx: &mut ParseContext<'_>, block: &MergedBlock) -> Result<(), Errors> {
        let mut errors = Errors::new();

        for sub_block in block.sub_blocks.values() {
            errors.log(Error::schema(
                sub_block.def_range(),
                format!("unrecognized block {:?} in globals", sub_block.path.block_type),
            ));
        }

        for (idx, label) in block.path.labels.iter().enumerate() {
            if label.is_empty() {
                errors.log(Error::schema(
                    block.labels_range(),
                    format!("globals label #{idx} must not be empty"),
                ));
            }
        }

        ctx.config().globals.push(Globals {
            labels: block.path.labels.clone(),
            attributes: block.attributes.clone(),
            range: block.first_range().cloned(),
        });

        errors.into_result()
    }
}
