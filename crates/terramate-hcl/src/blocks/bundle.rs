//! `bundle` block
//!
//! A bundle instantiates a bundle definition. All of the following address the same bundle:
//!
//! ```hcl
//! bundle "app" {
//!   source = "/bundles/app.tm.yml"
//!   inputs {
//!     replicas = 2
//!   }
//!   environment "prod" {
//!     inputs {
//!       replicas = 5
//!     }
//!   }
//! }
//!
//! bundle "app" "inputs" {
//!   name = "app"
//! }
//!
//! bundle "app" "environment" "prod" {
//!   source = "/bundles/app-prod.tm.yml"
//! }
//! ```
//!
//! Inputs are either one `inputs = {...}` attribute or any number of `inputs` blocks, never both.
use crate::ast::label::LabelSchema;
use crate::ast::merged::MergedBlock;
use crate::ast::Attribute;
use crate::errors::{Error, Errors};
use crate::handler::{BlockHandler, MergedLabelsHandler, ParseContext};
use crate::info::SourceRange;
use crate::project::ProjectPath;
use crate::schema::{dispatch, set_attr, set_entry, Attrs, Section, SectionVisitor};
use derive_new::new;
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Part {
    Bundle,
    Inputs,
    Environment,
    EnvironmentInputs,
}

static BUNDLE: Section<Part> = Section {
    id: Part::Bundle,
    keyword: "bundle",
    named: true,
    attributes: Attrs::Only(&["inputs", "source", "uuid"]),
    children: &[
        Section {
            id: Part::Inputs,
            keyword: "inputs",
            named: false,
            attributes: Attrs::Any,
            children: &[],
        },
        Section {
            id: Part::Environment,
            keyword: "environment",
            named: true,
            attributes: Attrs::Only(&["source"]),
            children: &[Section {
                id: Part::EnvironmentInputs,
                keyword: "inputs",
                named: false,
                attributes: Attrs::Any,
                children: &[],
            }],
        },
    ],
};

/// Inputs given either as attribute or as blocks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs {
    pub attribute: Option<Attribute>,
    pub entries: IndexMap<String, Attribute>,
    /// every `inputs` block seen, even empty ones
    pub blocks: Vec<SourceRange>,
}

impl Inputs {
    pub fn set_attribute(&mut self, attribute: &Attribute, qualified: &str) -> Result<(), Error> {
        set_attr(&mut self.attribute, attribute, qualified)
    }

    /// Adds the attributes of one `inputs` block, an input set twice is a conflict
    pub fn merge_block(&mut self, block: &MergedBlock, qualified: &str) -> Result<(), Errors> {
        let mut errors = Errors::new();
        if let Some(range) = block.def_range() {
            if !self.blocks.contains(&range) {
                self.blocks.push(range);
            }
        }

        for attribute in block.attributes.values() {
            errors.collect_one(set_entry(&mut self.entries, attribute, qualified));
        }
        errors.into_result()
    }

    pub fn is_empty(&self) -> bool {
        self.attribute.is_none() && self.entries.is_empty()
    }

    /// Rejects inputs given in both forms
    pub fn check(&self, owner: &str) -> Result<(), Error> {
        match (&self.attribute, self.blocks.first()) {
            (Some(attribute), Some(block)) => Err(Error::schema(
                attribute.name_range.clone(),
                format!("ambiguous inputs of {owner}: inputs attribute conflicts with the inputs block at {block}"),
            )),
            _ => Ok(()),
        }
    }
}

impl Serialize for Inputs {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match &self.attribute {
            Some(attribute) => attribute.serialize(serializer),
            None => self.entries.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Serialize, new)]
pub struct Bundle {
    pub name: String,
    pub workdir: ProjectPath,
    #[new(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Attribute>,
    #[new(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Attribute>,
    #[new(default)]
    #[serde(skip_serializing_if = "Inputs::is_empty")]
    pub inputs: Inputs,
    #[new(default)]
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub environments: IndexMap<String, BundleEnvironment>,
    #[serde(skip)]
    pub range: Option<SourceRange>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BundleEnvironment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Attribute>,
    #[serde(skip_serializing_if = "Inputs::is_empty")]
    pub inputs: Inputs,
}

struct BundleVisitor<'c> {
    bundles: &'c mut IndexMap<String, Bundle>,
    workdir: &'c ProjectPath,
}

impl SectionVisitor<Part> for BundleVisitor<'_> {
    fn visit(&mut self, section: Part, names: &[String], block: &MergedBlock) -> Result<(), Errors> {
        let Some(name) = names.first() else {
            return Ok(());
        };

        let bundle = self
            .bundles
            .entry(name.clone())
            .or_insert_with(|| Bundle::new(name.clone(), self.workdir.clone(), block.def_range()));

        let mut errors = Errors::new();
        match (section, names.get(1)) {
            (Part::Bundle, _) => {
                for attribute in block.attributes.values() {
                    let result = match attribute.name.as_str() {
                        "uuid" => set_attr(&mut bundle.uuid, attribute, "bundle.uuid"),
                        "source" => set_attr(&mut bundle.source, attribute, "bundle.source"),
                        "inputs" => bundle.inputs.set_attribute(attribute, "bundle.inputs"),
                        _ => Ok(()),
                    };
                    errors.collect_one(result);
                }
            }
            (Part::Inputs, _) => {
                errors.collect(bundle.inputs.merge_block(block, "bundle input"));
            }
            (Part::Environment, Some(env)) => {
                let environment = bundle.environments.entry(env.clone()).or_default();
                if let Some(source) = block.attributes.get("source") {
                    errors.collect_one(set_attr(&mut environment.source, source, "bundle.environment.source"));
                }
            }
            (Part::EnvironmentInputs, Some(env)) => {
                let environment = bundle.environments.entry(env.clone()).or_default();
                errors.collect(environment.inputs.merge_block(block, "bundle environment input"));
            }
            _ => {}
        }

        errors.into_result()
    }
}

pub struct BundleHandler;

impl BlockHandler for BundleHandler {
    fn name(&self) -> &str {
        "bundle"
    }
}

impl MergedLabelsHandler for BundleHandler {
    fn label_schema(&self) -> LabelSchema {
        LabelSchema::nested(3)
    }

    fn parse(&self, ctx: &mut ParseContext<'_>, block: &MergedBlock) -> Result<(), Errors> {
        let workdir = ctx.dir().clone();
        let mut visitor = BundleVisitor {
            bundles: &mut ctx.config().bundles,
            workdir: &workdir,
        };
        dispatch(&BUNDLE, block, &mut visitor)
    }

    fn validate(&self, ctx: &mut ParseContext<'_>) -> Result<(), Errors> {
        let mut errors = Errors::new();

        for bundle in ctx.config().bundles.values() {
            if bundle.source.is_none() {
                errors.log(Error::schema(
                    bundle.range.clone(),
                    format!("bundle {:?} is missing required attribute \"source\"", bundle.name),
                ));
            }

            errors.collect_one(bundle.inputs.check(&format!("bundle {:?}", bundle.name)));
            for (env, environment) in &bundle.environments {
                errors.collect_one(
                    environment
                        .inputs
                        .check(&format!("bundle {:?} environment {env:?}", bundle.name)),
                );
            }
        }

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
    fn all_forms_build_one_bundle() {
        let parsed = parse_root(hcl_files! {
            "/a.tm" => r#"
bundle "x" {
  source = "s"
  inputs {
    a = 1
  }
  environment "prod" {
    inputs {
      a = 5
    }
  }
}
"#,
            "/b.tm" => r#"
bundle "x" "inputs" {
  b = 2
}

bundle "x" "environment" "prod" {
  source = "s-prod"
}

bundle "x" {
  environment {
    dev {
      source = "s-dev"
    }
  }
}
"#
        })
        .unwrap();

        let bundles = &parsed.root().unwrap().bundles;
        assert_eq!(bundles.len(), 1);

        let bundle = &bundles["x"];
        assert_eq!(bundle.source.as_ref().unwrap().value(), Value::String("s".into()));
        assert_eq!(bundle.workdir.as_str(), "/");

        let inputs: Vec<(&str, Value)> = bundle
            .inputs
            .entries
            .iter()
            .map(|(name, attribute)| (name.as_str(), attribute.value()))
            .collect();
        assert_eq!(inputs, vec![("a", Value::Integer(1)), ("b", Value::Integer(2))]);

        let prod = &bundle.environments["prod"];
        assert_eq!(prod.source.as_ref().unwrap().value(), Value::String("s-prod".into()));
        assert_eq!(prod.inputs.entries["a"].value(), Value::Integer(5));
        assert_eq!(
            bundle.environments["dev"].source.as_ref().unwrap().value(),
            Value::String("s-dev".into())
        );
    }

    #[test]
    fn input_declared_in_two_forms() {
        let errors = parse_root(hcl_files!(
            "bundle \"x\" {\n  source = \"s\"\n  inputs {\n    a = 1\n  }\n}\nbundle \"x\" \"inputs\" {\n  a = 2\n}\n"
        ))
        .unwrap_err();

        assert_eq!(errors.kinds(), vec![ErrorKind::MergeConflict]);
        assert!(messages(&errors)[0].starts_with(r#"bundle input "a" already declared at"#));
    }

    #[test]
    fn inputs_attribute_and_block_are_ambiguous() {
        let errors = parse_root(hcl_files!(
            "bundle \"x\" {\n  source = \"s\"\n  inputs = {a = 1}\n}\nbundle \"x\" \"inputs\" {\n  b = 2\n}\n"
        ))
        .unwrap_err();

        assert_eq!(errors.kinds(), vec![ErrorKind::Schema]);
        assert!(messages(&errors)[0].starts_with(r#"ambiguous inputs of bundle "x""#));
    }

    #[test]
    fn source_is_required() {
        let errors = parse_root(hcl_files!("bundle \"x\" \"inputs\" {\n  a = 1\n}\n")).unwrap_err();
        assert_eq!(messages(&errors), vec![r#"bundle "x" is missing required attribute "source""#]);
    }

    #[test]
    fn unknown_parts() {
        let errors = parse_root(hcl_files!(
            "bundle \"x\" {\n  source = \"s\"\n  version = 1\n  output {}\n}\nbundle \"x\" \"a\" \"b\" \"c\" {}\nbundle {}\n"
        ))
        .unwrap_err();

        // label arity is checked while merging, before any handler runs
        assert_eq!(
            messages(&errors),
            vec![
                r#"too many labels for block "bundle": expected at most 3 but got 4"#,
                r#"unrecognized attribute bundle.version: valid attributes are [inputs, source, uuid] but found "version""#,
                r#"unexpected "output" in "bundle" block, expected "inputs" or "environment""#,
                r#""bundle" block requires a label"#,
            ]
        );
    }
}
