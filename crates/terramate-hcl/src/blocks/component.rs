//! `component` block
//!
//! ```hcl
//! component "vpc" {
//!   source      = "/components/vpc"
//!   environment = "prod"
//!   inputs {
//!     cidr = "10.0.0.0/16"
//!   }
//! }
//!
//! component "vpc" "inputs" {
//!   azs = 3
//! }
//! ```
use super::bundle::Inputs;
use crate::ast::label::LabelSchema;
use crate::ast::merged::MergedBlock;
use crate::ast::Attribute;
use crate::errors::{Error, Errors};
use crate::handler::{BlockHandler, MergedLabelsHandler, ParseContext};
use crate::info::SourceRange;
use crate::schema::{dispatch, set_attr, Attrs, Section, SectionVisitor};
use derive_new::new;
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Part {
    Component,
    Inputs,
}

static COMPONENT: Section<Part> = Section {
    id: Part::Component,
    keyword: "component",
    named: true,
    attributes: Attrs::Only(&["condition", "environment", "inputs", "source"]),
    children: &[Section {
        id: Part::Inputs,
        keyword: "inputs",
        named: false,
        attributes: Attrs::Any,
        children: &[],
    }],
};

#[derive(Debug, Clone, Serialize, new)]
pub struct Component {
    pub name: String,
    #[new(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Attribute>,
    #[new(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Attribute>,
    #[new(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Attribute>,
    #[new(default)]
    #[serde(skip_serializing_if = "Inputs::is_empty")]
    pub inputs: Inputs,
    #[serde(skip)]
    pub range: Option<SourceRange>,
}

struct ComponentVisitor<'c> {
    components: &'c mut IndexMap<String, Component>,
}

impl SectionVisitor<Part> for ComponentVisitor<'_> {
    fn visit(&mut self, section: Part, names: &[String], block: &MergedBlock) -> Result<(), Errors> {
        let Some(name) = names.first() else {
            return Ok(());
        };

        let component = self
            .components
            .entry(name.clone())
            .or_insert_with(|| Component::new(name.clone(), block.def_range()));

        let mut errors = Errors::new();
        match section {
            Part::Component => {
                for attribute in block.attributes.values() {
                    let result = match attribute.name.as_str() {
                        "source" => set_attr(&mut component.source, attribute, "component.source"),
                        "condition" => set_attr(&mut component.condition, attribute, "component.condition"),
                        "environment" => set_attr(&mut component.environment, attribute, "component.environment"),
                        "inputs" => component.inputs.set_attribute(attribute, "component.inputs"),
                        _ => Ok(()),
                    };
                    errors.collect_one(result);
                }
            }
            Part::Inputs => {
                errors.collect(component.inputs.merge_block(block, "component input"));
            }
        }

        errors.into_result()
    }
}

pub struct ComponentHandler;

impl BlockHandler for ComponentHandler {
    fn name(&self) -> &str {
        "component"
    }
}

impl MergedLabelsHandler for ComponentHandler {
    fn label_schema(&self) -> LabelSchema {
        LabelSchema::nested(2)
    }

    fn parse(&self, ctx: &mut ParseContext<'_>, block: &MergedBlock) -> Result<(), Errors> {
        let mut visitor = ComponentVisitor {
            components: &mut ctx.config().components,
        };
        dispatch(&COMPONENT, block, &mut visitor)
    }

    fn validate(&self, ctx: &mut ParseContext<'_>) -> Result<(), Errors> {
        let mut errors = Errors::new();

        for component in ctx.config().components.values() {
            if component.source.is_none() {
                errors.log(Error::schema(
                    component.range.clone(),
                    format!("component {:?} is missing required attribute \"source\"", component.name),
                ));
            }
            errors.collect_one(component.inputs.check(&format!("component {:?}", component.name)));
        }

        errors.into_result()
    }
}
