//! output sharing blocks (experiment `outputs-sharing`)
//!
//! ```hcl
//! sharing_backend "default" {
//!   type     = terraform
//!   command  = ["terraform", "output", "-json"]
//!   filename = "sharing.tf"
//! }
//!
//! input "vpc_id" {
//!   backend       = "default"
//!   from_stack_id = "vpc"
//!   value         = outputs.vpc_id.value
//! }
//!
//! output "vpc_id" {
//!   backend = "default"
//!   value   = module.vpc.id
//! }
//! ```
use crate::ast::{Attribute, RawBlock};
use crate::errors::{Error, Errors};
use crate::handler::{BlockHandler, ParseContext, UnmergedHandler};
use crate::info::SourceRange;
use crate::schema::{check_raw_sub_blocks, missing, set_attr};
use crate::util::string_literal;
use serde::Serialize;

pub const EXPERIMENT: &str = "outputs-sharing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SharingBackendType {
    Terraform,
}

#[derive(Debug, Clone, Serialize)]
pub struct SharingBackend {
    pub name: String,
    #[serde(rename = "type")]
    pub backend_type: SharingBackendType,
    pub command: Attribute,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Input {
    pub name: String,
    pub backend: Attribute,
    pub from_stack_id: Attribute,
    pub value: Attribute,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitive: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mock: Option<Attribute>,
    #[serde(skip)]
    pub range: SourceRange,
}

#[derive(Debug, Clone, Serialize)]
pub struct Output {
    pub name: String,
    pub backend: Attribute,
    pub value: Attribute,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitive: Option<Attribute>,
    #[serde(skip)]
    pub range: SourceRange,
}

/// Attributes of a flat block, keyed by the accepted names
struct Slots<const N: usize> {
    names: [&'static str; N],
    values: [Option<Attribute>; N],
}

impl<const N: usize> Slots<N> {
    /// Collects the attributes of `block`, reporting unknown and repeated ones
    fn collect(block: &RawBlock, names: [&'static str; N], errors: &mut Errors) -> Self {
        let mut slots = Self {
            names,
            values: std::array::from_fn(|_| None),
        };

        for attribute in &block.attributes {
            let qualified = format!("{}.{}", block.block_type, attribute.name);
            match slots.names.iter().position(|name| *name == attribute.name) {
                Some(idx) => {
                    errors.collect_one(set_attr(&mut slots.values[idx], attribute, &qualified));
                }
                None => errors.log(Error::schema(
                    attribute.name_range.clone(),
                    format!("unrecognized attribute {qualified}"),
                )),
            }
        }

        slots
    }

    fn take(&mut self, name: &str) -> Option<Attribute> {
        let idx = self.names.iter().position(|candidate| *candidate == name)?;
        self.values[idx].take()
    }

    /// Like [Slots::take] but reports a missing attribute
    fn require(&mut self, block: &RawBlock, name: &str, errors: &mut Errors) -> Option<Attribute> {
        let value = self.take(name);
        if value.is_none() {
            errors.log(missing(Some(block.range.clone()), &block.block_type, name));
        }
        value
    }
}

/// The single label shared by all sharing blocks
fn single_label(block: &RawBlock, errors: &mut Errors) -> Option<String> {
    if let [label] = block.labels.as_slice() {
        return Some(label.clone());
    }

    errors.log(Error::schema(
        block.labels_range(),
        format!("expected a single label but {} given", block.labels.len()),
    ));
    None
}

pub struct SharingBackendHandler;

impl BlockHandler for SharingBackendHandler {
    fn name(&self) -> &str {
        "sharing_backend"
    }

    fn experiment(&self) -> Option<&str> {
        Some(EXPERIMENT)
    }
}

impl UnmergedHandler for SharingBackendHandler {
    fn parse(&self, ctx: &mut ParseContext<'_>, block: &RawBlock) -> Result<(), Errors> {
        let mut errors = Errors::new();
        let name = single_label(block, &mut errors);
        errors.append(check_raw_sub_blocks(block, "sharing_backend", &[]));

        let mut slots = Slots::collect(block, ["type", "command", "filename"], &mut errors);

        let backend_type = slots.require(block, "type", &mut errors).and_then(|attribute| {
            if attribute.text == "terraform" {
                Some(SharingBackendType::Terraform)
            } else {
                errors.log(Error::schema(
                    attribute.expr_range.clone(),
                    format!("unrecognized sharing backend type: {}", attribute.text),
                ));
                None
            }
        });

        let command = slots.require(block, "command", &mut errors);

        let filename = slots
            .require(block, "filename", &mut errors)
            .and_then(|attribute| errors.collect_one(string_literal(&attribute)));
        let filename = filename.and_then(|filename| {
            if filename.is_empty() {
                errors.log(Error::schema(block.range.clone(), "empty sharing_backend.filename"));
                None
            } else {
                Some(filename)
            }
        });

        if let (Some(name), Some(backend_type), Some(command), Some(filename)) = (name, backend_type, command, filename)
        {
            ctx.config().sharing_backends.push(SharingBackend {
                name,
                backend_type,
                command,
                filename,
            });
        }

        errors.into_result()
    }
}

pub struct InputHandler;

impl BlockHandler for InputHandler {
    fn name(&self) -> &str {
        "input"
    }

    fn experiment(&self) -> Option<&str> {
        Some(EXPERIMENT)
    }
}

impl UnmergedHandler for InputHandler {
    fn parse(&self, ctx: &mut ParseContext<'_>, block: &RawBlock) -> Result<(), Errors> {
        let mut errors = Errors::new();
        let name = single_label(block, &mut errors);
        errors.append(check_raw_sub_blocks(block, "input", &[]));

        let mut slots = Slots::collect(
            block,
            ["backend", "from_stack_id", "value", "sensitive", "mock"],
            &mut errors,
        );
        let backend = slots.require(block, "backend", &mut errors);
        let from_stack_id = slots.require(block, "from_stack_id", &mut errors);
        let value = slots.require(block, "value", &mut errors);

        if let (Some(name), Some(backend), Some(from_stack_id), Some(value)) = (name, backend, from_stack_id, value) {
            ctx.config().inputs.push(Input {
                name,
                backend,
                from_stack_id,
                value,
                sensitive: slots.take("sensitive"),
                mock: slots.take("mock"),
                range: block.range.clone(),
            });
        }

        errors.into_result()
    }
}

pub struct OutputHandler;

impl BlockHandler for OutputHandler {
    fn name(&self) -> &str {
        "output"
    }

    fn experiment(&self) -> Option<&str> {
        Some(EXPERIMENT)
    }
}

impl UnmergedHandler for OutputHandler {
    fn parse(&self, ctx: &mut ParseContext<'_>, block: &RawBlock) -> Result<(), Errors> {
        let mut errors = Errors::new();
        let name = single_label(block, &mut errors);
        errors.append(check_raw_sub_blocks(block, "output", &[]));

        let mut slots = Slots::collect(block, ["backend", "value", "description", "sensitive"], &mut errors);
        let backend = slots.require(block, "backend", &mut errors);
        let value = slots.require(block, "value", &mut errors);

        if let (Some(name), Some(backend), Some(value)) = (name, backend, value) {
            ctx.config().outputs.push(Output {
                name,
                backend,
                value,
                description: slots.take("description"),
                sensitive: slots.take("sensitive"),
                range: block.range.clone(),
            });
        }

        errors.into_result()
    }
}
