//! `script` block (experiment `scripts`)
//!
//! ```hcl
//! script "deploy" "all" {
//!   description = "deploy everything"
//!   job {
//!     commands = [["terraform", "init"], ["terraform", "apply"]]
//!   }
//! }
//! ```
use crate::ast::{Attribute, RawBlock};
use crate::errors::{Error, Errors};
use crate::handler::{BlockHandler, ParseContext, UnmergedHandler};
use crate::info::SourceRange;
use crate::schema::{check_raw_sub_blocks, merge_lets, set_attr};
use indexmap::IndexMap;
use serde::Serialize;

pub const EXPERIMENT: &str = "scripts";

#[derive(Debug, Clone, Serialize)]
pub struct Script {
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Attribute>,
    pub jobs: Vec<ScriptJob>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub lets: IndexMap<String, Attribute>,
    #[serde(skip)]
    pub range: SourceRange,
}

impl Script {
    /// Space separated labels, quoting the ones containing spaces
    pub fn accessor_name(&self) -> String {
        self.labels
            .iter()
            .map(|label| {
                if label.contains(' ') {
                    format!("\"{label}\"")
                } else {
                    label.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptJob {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Attribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Attribute>,
    /// a single command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Attribute>,
    /// a list of commands
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<Attribute>,
}

pub struct ScriptHandler;

impl BlockHandler for ScriptHandler {
    fn name(&self) -> &str {
        "script"
    }

    fn experiment(&self) -> Option<&str> {
        Some(EXPERIMENT)
    }
}

impl UnmergedHandler for ScriptHandler {
    fn parse(&self, ctx: &mut ParseContext<'_>, block: &RawBlock) -> Result<(), Errors> {
        if let Some(other) = ctx.config().scripts.iter().find(|script| script.labels == block.labels) {
            return Err(Error::schema(
                block.def_range(),
                format!(
                    "multiple script blocks with same labels in the same directory: {:?} defined at {}",
                    block.labels, other.range
                ),
            )
            .into());
        }

        let mut errors = Errors::new();
        let mut script = Script {
            labels: block.labels.clone(),
            name: None,
            description: None,
            jobs: vec![],
            lets: IndexMap::new(),
            range: block.range.clone(),
        };

        if block.labels.is_empty() {
            errors.log(Error::schema(
                block.type_range.clone(),
                "script must provide at least one label",
            ));
        }

        for attribute in &block.attributes {
            match attribute.name.as_str() {
                "name" => errors.collect_one(set_attr(&mut script.name, attribute, "script.name")),
                "description" => errors.collect_one(set_attr(&mut script.description, attribute, "script.description")),
                name => {
                    errors.log(Error::schema(
                        attribute.name_range.clone(),
                        format!("unrecognized attribute script.{name}"),
                    ));
                    None
                }
            };
        }

        errors.append(check_raw_sub_blocks(block, "script", &["job", "lets"]));
        script.lets = errors.collect(merge_lets(block)).unwrap_or_default();

        for job in block.blocks.iter().filter(|child| child.block_type == "job") {
            if let Some(job) = errors.collect(parse_job(job)) {
                script.jobs.push(job);
            }
        }

        if script.jobs.is_empty() {
            errors.log(Error::schema(block.def_range(), "script is missing a valid job"));
        }

        if errors.is_empty() {
            ctx.config().scripts.push(script);
        }
        errors.into_result()
    }
}

fn parse_job(block: &RawBlock) -> Result<ScriptJob, Errors> {
    let mut errors = Errors::new();
    let mut job = ScriptJob::default();

    if !block.labels.is_empty() {
        errors.log(Error::schema(block.labels_range(), "script.job must have no labels"));
    }
    errors.append(check_raw_sub_blocks(block, "script.job", &[]));

    for attribute in &block.attributes {
        let slot = match attribute.name.as_str() {
            "name" => &mut job.name,
            "description" => &mut job.description,
            "command" => &mut job.command,
            "commands" => &mut job.commands,
            name => {
                errors.log(Error::schema(
                    attribute.name_range.clone(),
                    format!("unrecognized attribute script.job.{name}"),
                ));
                continue;
            }
        };
        errors.collect_one(set_attr(slot, attribute, &format!("script.job.{}", attribute.name)));
    }

    match (&job.command, &job.commands) {
        (Some(command), Some(commands)) => {
            for attribute in [command, commands] {
                errors.log(Error::conflict(
                    attribute.name_range.clone(),
                    "script.job: conflicting attribute already set, use either command or commands",
                ));
            }
        }
        (None, None) => errors.log(Error::schema(block.def_range(), "script.job: missing command or commands")),
        _ => {}
    }

    errors.into_result_with(job)
}

#[cfg(test)]
mod test {
    use crate::blocks::test::{messages, parse_root};
    use crate::errors::ErrorKind;
    use crate::hcl_files;
    use pretty_assertions::assert_eq;

    #[test]
    fn jobs_and_lets() {
        let parsed = parse_root(hcl_files!(
            r#"
script "deploy" "all envs" {
  description = "deploy"
  lets {
    flags = ["-auto-approve"]
  }
  job {
    command = ["terraform", "apply"]
  }
  job {
    name     = "plan"
    commands = [["terraform", "init"], ["terraform", "plan"]]
  }
}
"#
        ))
        .unwrap();

        let script = &parsed.root().unwrap().scripts[0];
        assert_eq!(script.labels, vec!["deploy", "all envs"]);
        assert_eq!(script.accessor_name(), r#"deploy "all envs""#);
        assert_eq!(script.jobs.len(), 2);
        assert!(script.jobs[0].command.is_some());
        assert!(script.jobs[1].commands.is_some());
        assert!(script.lets.contains_key("flags"));
    }

    #[test]
    fn command_and_commands_conflict() {
        let errors = parse_root(hcl_files!(
            "script \"a\" {\n  job {\n    command  = [\"a\"]\n    commands = [[\"b\"]]\n  }\n}\n"
        ))
        .unwrap_err();

        assert_eq!(
            errors.kinds(),
            vec![ErrorKind::MergeConflict, ErrorKind::MergeConflict, ErrorKind::Schema]
        );
        let lines: Vec<usize> = errors.iter().take(2).map(|error| error.range.as_ref().unwrap().start.line).collect();
        assert_eq!(lines, vec![3, 4]);
    }

    #[test]
    fn missing_labels_and_jobs() {
        let errors = parse_root(hcl_files!("script {\n  job {}\n}\n")).unwrap_err();

        assert_eq!(
            messages(&errors),
            vec![
                "script must provide at least one label",
                "script.job: missing command or commands",
                "script is missing a valid job",
            ]
        );
    }

    #[test]
    fn redeclared_labels() {
        let errors = parse_root(hcl_files! {
            "/a.tm" => "script \"a\" {\n  job {\n    command = [\"a\"]\n  }\n}\n",
            "/b.tm" => "script \"a\" {\n  job {\n    command = [\"b\"]\n  }\n}\n"
        })
        .unwrap_err();

        assert_eq!(errors.len(), 1);
        assert!(messages(&errors)[0].starts_with("multiple script blocks with same labels"));
    }
}
