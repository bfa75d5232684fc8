//! `define` block
//!
//! Definitions of components, bundles and schemas. A single definition is usually spread over many blocks and
//! label depths:
//!
//! ```hcl
//! define component metadata {
//!   class   = "example.com/vpc/v1"
//!   name    = "vpc"
//!   version = "1.0.0"
//! }
//!
//! define component input "cidr" {
//!   type    = string
//!   default = "10.0.0.0/16"
//! }
//!
//! define bundle {
//!   alias = "app"
//!   stack "main" {
//!     metadata {
//!       path = "/stacks/${bundle.input.name.value}"
//!     }
//!     component "vpc" {
//!       source = "/components/vpc"
//!     }
//!   }
//! }
//! ```
use super::bundle::Inputs;
use crate::ast::label::LabelSchema;
use crate::ast::merged::MergedBlock;
use crate::ast::Attribute;
use crate::errors::{Error, Errors};
use crate::handler::{BlockHandler, MergedLabelsHandler, ParseContext};
use crate::info::SourceRange;
use crate::schema::{dispatch, missing, set_attr, set_entry, Attrs, Section, SectionVisitor};
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Part {
    Define,
    Component,
    ComponentMetadata,
    ComponentInput,
    ComponentInputAttribute,
    ComponentUses,
    Bundle,
    BundleMetadata,
    BundleInput,
    BundleInputAttribute,
    BundleExport,
    BundleStack,
    BundleStackMetadata,
    BundleStackComponent,
    BundleStackComponentInputs,
    BundleScaffolding,
    BundleScaffoldingEnabled,
    BundleEnvironments,
    BundleUses,
    Schema,
    SchemaAttribute,
}

const METADATA_ATTRIBUTES: &[&str] = &["class", "description", "name", "technologies", "version"];

const INPUT_ATTRIBUTES: &[&str] = &[
    "default",
    "description",
    "multiline",
    "multiselect",
    "options",
    "prompt",
    "required_for_scaffold",
    "type",
];

const TYPE_ATTRIBUTES: &[&str] = &["default", "description", "required", "type"];

static DEFINE: Section<Part> = Section {
    id: Part::Define,
    keyword: "define",
    named: false,
    attributes: Attrs::Only(&[]),
    children: &[
        Section {
            id: Part::Component,
            keyword: "component",
            named: false,
            attributes: Attrs::Only(&[]),
            children: &[
                Section {
                    id: Part::ComponentMetadata,
                    keyword: "metadata",
                    named: false,
                    attributes: Attrs::Only(METADATA_ATTRIBUTES),
                    children: &[],
                },
                Section {
                    id: Part::ComponentInput,
                    keyword: "input",
                    named: true,
                    attributes: Attrs::Only(INPUT_ATTRIBUTES),
                    children: &[Section {
                        id: Part::ComponentInputAttribute,
                        keyword: "attribute",
                        named: true,
                        attributes: Attrs::Only(TYPE_ATTRIBUTES),
                        children: &[],
                    }],
                },
                Section {
                    id: Part::ComponentUses,
                    keyword: "uses",
                    named: true,
                    attributes: Attrs::Only(&["source"]),
                    children: &[],
                },
            ],
        },
        Section {
            id: Part::Bundle,
            keyword: "bundle",
            named: false,
            attributes: Attrs::Only(&["alias"]),
            children: &[
                Section {
                    id: Part::BundleMetadata,
                    keyword: "metadata",
                    named: false,
                    attributes: Attrs::Only(METADATA_ATTRIBUTES),
                    children: &[],
                },
                Section {
                    id: Part::BundleInput,
                    keyword: "input",
                    named: true,
                    attributes: Attrs::Only(INPUT_ATTRIBUTES),
                    children: &[Section {
                        id: Part::BundleInputAttribute,
                        keyword: "attribute",
                        named: true,
                        attributes: Attrs::Only(TYPE_ATTRIBUTES),
                        children: &[],
                    }],
                },
                Section {
                    id: Part::BundleExport,
                    keyword: "export",
                    named: true,
                    attributes: Attrs::Only(&["description", "value"]),
                    children: &[],
                },
                Section {
                    id: Part::BundleStack,
                    keyword: "stack",
                    named: true,
                    attributes: Attrs::Only(&["condition"]),
                    children: &[
                        Section {
                            id: Part::BundleStackMetadata,
                            keyword: "metadata",
                            named: false,
                            attributes: Attrs::Only(&[
                                "after",
                                "before",
                                "description",
                                "name",
                                "path",
                                "tags",
                                "wanted_by",
                                "wants",
                                "watch",
                            ]),
                            children: &[],
                        },
                        Section {
                            id: Part::BundleStackComponent,
                            keyword: "component",
                            named: true,
                            attributes: Attrs::Only(&["condition", "environment", "inputs", "source"]),
                            children: &[Section {
                                id: Part::BundleStackComponentInputs,
                                keyword: "inputs",
                                named: false,
                                attributes: Attrs::Any,
                                children: &[],
                            }],
                        },
                    ],
                },
                Section {
                    id: Part::BundleScaffolding,
                    keyword: "scaffolding",
                    named: false,
                    attributes: Attrs::Only(&["name", "path"]),
                    children: &[Section {
                        id: Part::BundleScaffoldingEnabled,
                        keyword: "enabled",
                        named: false,
                        attributes: Attrs::Only(&["condition", "error_message"]),
                        children: &[],
                    }],
                },
                Section {
                    id: Part::BundleEnvironments,
                    keyword: "environments",
                    named: false,
                    attributes: Attrs::Only(&["required"]),
                    children: &[],
                },
                Section {
                    id: Part::BundleUses,
                    keyword: "uses",
                    named: true,
                    attributes: Attrs::Only(&["source"]),
                    children: &[],
                },
            ],
        },
        Section {
            id: Part::Schema,
            keyword: "schema",
            named: true,
            attributes: Attrs::Only(&["description", "type"]),
            children: &[Section {
                id: Part::SchemaAttribute,
                keyword: "attribute",
                named: true,
                attributes: Attrs::Only(TYPE_ATTRIBUTES),
                children: &[],
            }],
        },
    ],
};

/// Attributes of one definition section, the allowed names are checked by the section tree
#[derive(Debug, Clone, Default, Serialize)]
pub struct Fields {
    #[serde(flatten)]
    pub attributes: IndexMap<String, Attribute>,
    /// first block that contributed
    #[serde(skip)]
    pub range: Option<SourceRange>,
}

impl Fields {
    fn merge(&mut self, block: &MergedBlock, qualifier: &str) -> Result<(), Errors> {
        let mut errors = Errors::new();
        if self.range.is_none() {
            self.range = block.def_range();
        }

        for attribute in block.attributes.values() {
            errors.collect_one(set_entry(&mut self.attributes, attribute, qualifier));
        }
        errors.into_result()
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Define {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<BundleDefinition>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub schemas: IndexMap<String, TypeDefinition>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ComponentDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Fields>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub inputs: IndexMap<String, TypeDefinition>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub uses: IndexMap<String, Fields>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BundleDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Fields>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub inputs: IndexMap<String, TypeDefinition>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub exports: IndexMap<String, Fields>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub stacks: IndexMap<String, StackDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaffolding: Option<Scaffolding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environments: Option<Fields>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub uses: IndexMap<String, Fields>,
}

/// An input or schema: its own attributes plus named object attributes
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeDefinition {
    #[serde(flatten)]
    pub fields: Fields,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, Fields>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StackDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Fields>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub components: IndexMap<String, ComponentReference>,
}

/// A component instantiated by a bundle stack
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComponentReference {
    #[serde(flatten)]
    pub fields: Fields,
    #[serde(skip_serializing_if = "Inputs::is_empty")]
    pub inputs: Inputs,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Scaffolding {
    #[serde(flatten)]
    pub fields: Fields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<Fields>,
}

struct DefineVisitor<'c> {
    define: &'c mut Define,
}

impl DefineVisitor<'_> {
    fn component(&mut self) -> &mut ComponentDefinition {
        self.define.component.get_or_insert_with(Default::default)
    }

    fn bundle(&mut self) -> &mut BundleDefinition {
        self.define.bundle.get_or_insert_with(Default::default)
    }
}

/// `names[idx]`, present whenever the visited section sits below that many named sections
fn nth(names: &[String], idx: usize) -> Result<&String, Errors> {
    names
        .get(idx)
        .ok_or_else(|| Error::schema(None::<SourceRange>, format!("missing member name #{idx} in define block")).into())
}

impl SectionVisitor<Part> for DefineVisitor<'_> {
    fn visit(&mut self, section: Part, names: &[String], block: &MergedBlock) -> Result<(), Errors> {
        match section {
            Part::Define | Part::Component => Ok(()),
            Part::ComponentMetadata => self
                .component()
                .metadata
                .get_or_insert_with(Default::default)
                .merge(block, "define.component.metadata attribute"),
            Part::ComponentInput => {
                let input = self.component().inputs.entry(nth(names, 0)?.clone()).or_default();
                input.fields.merge(block, "define.component.input attribute")
            }
            Part::ComponentInputAttribute => {
                let input = self.component().inputs.entry(nth(names, 0)?.clone()).or_default();
                input
                    .attributes
                    .entry(nth(names, 1)?.clone())
                    .or_default()
                    .merge(block, "define.component.input.attribute attribute")
            }
            Part::ComponentUses => self
                .component()
                .uses
                .entry(nth(names, 0)?.clone())
                .or_default()
                .merge(block, "define.component.uses attribute"),
            Part::Bundle => {
                let mut errors = Errors::new();
                if let Some(alias) = block.attributes.get("alias") {
                    errors.collect_one(set_attr(&mut self.bundle().alias, alias, "define.bundle.alias"));
                }
                errors.into_result()
            }
            Part::BundleMetadata => self
                .bundle()
                .metadata
                .get_or_insert_with(Default::default)
                .merge(block, "define.bundle.metadata attribute"),
            Part::BundleInput => {
                let input = self.bundle().inputs.entry(nth(names, 0)?.clone()).or_default();
                input.fields.merge(block, "define.bundle.input attribute")
            }
            Part::BundleInputAttribute => {
                let input = self.bundle().inputs.entry(nth(names, 0)?.clone()).or_default();
                input
                    .attributes
                    .entry(nth(names, 1)?.clone())
                    .or_default()
                    .merge(block, "define.bundle.input.attribute attribute")
            }
            Part::BundleExport => self
                .bundle()
                .exports
                .entry(nth(names, 0)?.clone())
                .or_default()
                .merge(block, "define.bundle.export attribute"),
            Part::BundleStack => {
                let stack = self.bundle().stacks.entry(nth(names, 0)?.clone()).or_default();
                let mut errors = Errors::new();
                if let Some(condition) = block.attributes.get("condition") {
                    errors.collect_one(set_attr(&mut stack.condition, condition, "define.bundle.stack.condition"));
                }
                errors.into_result()
            }
            Part::BundleStackMetadata => self
                .bundle()
                .stacks
                .entry(nth(names, 0)?.clone())
                .or_default()
                .metadata
                .get_or_insert_with(Default::default)
                .merge(block, "define.bundle.stack.metadata attribute"),
            Part::BundleStackComponent => {
                let stack = self.bundle().stacks.entry(nth(names, 0)?.clone()).or_default();
                let component = stack.components.entry(nth(names, 1)?.clone()).or_default();

                let mut errors = Errors::new();
                if component.fields.range.is_none() {
                    component.fields.range = block.def_range();
                }
                for attribute in block.attributes.values() {
                    if attribute.name == "inputs" {
                        errors.collect_one(component.inputs.set_attribute(attribute, "define.bundle.stack.component.inputs"));
                    } else {
                        errors.collect_one(set_entry(
                            &mut component.fields.attributes,
                            attribute,
                            "define.bundle.stack.component attribute",
                        ));
                    }
                }
                errors.into_result()
            }
            Part::BundleStackComponentInputs => {
                let stack = self.bundle().stacks.entry(nth(names, 0)?.clone()).or_default();
                stack
                    .components
                    .entry(nth(names, 1)?.clone())
                    .or_default()
                    .inputs
                    .merge_block(block, "define.bundle.stack.component input")
            }
            Part::BundleScaffolding => self
                .bundle()
                .scaffolding
                .get_or_insert_with(Default::default)
                .fields
                .merge(block, "define.bundle.scaffolding attribute"),
            Part::BundleScaffoldingEnabled => self
                .bundle()
                .scaffolding
                .get_or_insert_with(Default::default)
                .enabled
                .get_or_insert_with(Default::default)
                .merge(block, "define.bundle.scaffolding.enabled attribute"),
            Part::BundleEnvironments => self
                .bundle()
                .environments
                .get_or_insert_with(Default::default)
                .merge(block, "define.bundle.environments attribute"),
            Part::BundleUses => self
                .bundle()
                .uses
                .entry(nth(names, 0)?.clone())
                .or_default()
                .merge(block, "define.bundle.uses attribute"),
            Part::Schema => self
                .define
                .schemas
                .entry(nth(names, 0)?.clone())
                .or_default()
                .fields
                .merge(block, "define.schema attribute"),
            Part::SchemaAttribute => self
                .define
                .schemas
                .entry(nth(names, 0)?.clone())
                .or_default()
                .attributes
                .entry(nth(names, 1)?.clone())
                .or_default()
                .merge(block, "define.schema.attribute attribute"),
        }
    }
}

pub struct DefineHandler;

impl BlockHandler for DefineHandler {
    fn name(&self) -> &str {
        "define"
    }
}

impl MergedLabelsHandler for DefineHandler {
    fn label_schema(&self) -> LabelSchema {
        LabelSchema::nested(4)
    }

    fn parse(&self, ctx: &mut ParseContext<'_>, block: &MergedBlock) -> Result<(), Errors> {
        let mut visitor = DefineVisitor {
            define: ctx.config().define.get_or_insert_with(Default::default),
        };
        dispatch(&DEFINE, block, &mut visitor)
    }

    fn validate(&self, ctx: &mut ParseContext<'_>) -> Result<(), Errors> {
        let config = ctx.config();
        let Some(define) = &config.define else {
            return Ok(());
        };

        let mut errors = Errors::new();
        let metadata = [
            ("define.component.metadata", define.component.as_ref().and_then(|c| c.metadata.as_ref())),
            ("define.bundle.metadata", define.bundle.as_ref().and_then(|b| b.metadata.as_ref())),
        ];

        for (qualifier, metadata) in metadata {
            let Some(metadata) = metadata else {
                continue;
            };

            for required in ["class", "name", "version"] {
                if metadata.get(required).is_none() {
                    errors.log(missing(metadata.range.clone(), qualifier, required));
                }
            }
        }

        if let Some(bundle) = &define.bundle {
            for (stack_name, stack) in &bundle.stacks {
                for (name, component) in &stack.components {
                    let owner = format!("define.bundle.stack {stack_name:?} component {name:?}");
                    errors.collect_one(component.inputs.check(&owner));
                }
            }
        }

        errors.into_result()
    }
}
