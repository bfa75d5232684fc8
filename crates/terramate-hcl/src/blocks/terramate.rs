//! `terramate` block
//!
//! ```hcl
//! terramate {
//!   required_version = ">= 0.4"
//!   config {
//!     experiments = ["scripts"]
//!     git {
//!       default_branch = "main"
//!     }
//!   }
//! }
//! ```
//!
//! Merged per directory. `config` is only accepted in the root directory.
use crate::ast::label::LabelPath;
use crate::ast::merged::MergedBlock;
use crate::errors::{Error, Errors};
use crate::handler::{BlockHandler, MergedHandler, ParseContext};
use crate::util::{bool_literal, string_list_literal, string_literal};
use serde::Serialize;

#[derive(Debug, Default, Clone, Serialize)]
pub struct Terramate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_version_allow_prereleases: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<RootConfig>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct RootConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub experiments: Vec<String>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct GitConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_remote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_untracked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_uncommitted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_remote: Option<bool>,
}

pub struct TerramateHandler;

impl BlockHandler for TerramateHandler {
    fn name(&self) -> &str {
        "terramate"
    }
}

impl MergedHandler for TerramateHandler {
    fn parse(&self, ctx: &mut ParseContext<'_>, block: &MergedBlock) -> Result<(), Errors> {
        let mut errors = Errors::new();
        let mut terramate = Terramate::default();

        for attribute in block.attributes.values() {
            match attribute.name.as_str() {
                "required_version" => terramate.required_version = errors.collect_one(string_literal(attribute)),
                "required_version_allow_prereleases" => {
                    terramate.required_version_allow_prereleases = errors.collect_one(bool_literal(attribute))
                }
                name => errors.log(Error::schema(
                    attribute.name_range.clone(),
                    format!("unrecognized attribute terramate.{name}"),
                )),
            }
        }

        for (path, sub_block) in &block.sub_blocks {
            if path.block_type != "config" {
                errors.log(unrecognized(sub_block, "terramate"));
                continue;
            }

            if !ctx.is_root() {
                errors.log(Error::schema(
                    sub_block.def_range(),
                    format!(
                        "terramate.config is only allowed at the root directory, found in {}",
                        ctx.dir()
                    ),
                ));
                continue;
            }

            if let Some(config) = errors.collect(parse_root_config(sub_block)) {
                terramate.config = Some(config);
            }
        }

        ctx.config().terramate = Some(terramate);
        errors.into_result()
    }
}

fn parse_root_config(block: &MergedBlock) -> Result<RootConfig, Errors> {
    let mut errors = Errors::new();
    let mut config = RootConfig::default();

    if !block.path.labels.is_empty() {
        errors.log(Error::schema(block.labels_range(), "terramate.config must have no labels"));
    }

    for attribute in block.attributes.values() {
        match attribute.name.as_str() {
            "experiments" => {
                config.experiments = errors.collect_one(string_list_literal(attribute)).unwrap_or_default()
            }
            name => errors.log(Error::schema(
                attribute.name_range.clone(),
                format!("unrecognized attribute terramate.config.{name}"),
            )),
        }
    }

    for (path, sub_block) in &block.sub_blocks {
        if *path == LabelPath::unlabeled("git") {
            config.git = errors.collect(parse_git(sub_block));
        } else {
            errors.log(unrecognized(sub_block, "terramate.config"));
        }
    }

    errors.into_result_with(config)
}

fn parse_git(block: &MergedBlock) -> Result<GitConfig, Errors> {
    let mut errors = Errors::new();
    let mut git = GitConfig::default();

    for attribute in block.attributes.values() {
        match attribute.name.as_str() {
            "default_branch" => git.default_branch = errors.collect_one(string_literal(attribute)),
            "default_remote" => git.default_remote = errors.collect_one(string_literal(attribute)),
            "check_untracked" => git.check_untracked = errors.collect_one(bool_literal(attribute)),
            "check_uncommitted" => git.check_uncommitted = errors.collect_one(bool_literal(attribute)),
            "check_remote" => git.check_remote = errors.collect_one(bool_literal(attribute)),
            name => errors.log(Error::schema(
                attribute.name_range.clone(),
                format!("unrecognized attribute terramate.config.git.{name}"),
            )),
        }
    }

    for sub_block in block.sub_blocks.values() {
        errors.log(unrecognized(sub_block, "terramate.config.git"));
    }

    errors.into_result_with(git)
}

fn unrecognized(block: &MergedBlock, parent: &str) -> Error {
    Error::schema(
        block.def_range(),
        format!("unrecognized block {:?} in {parent}", block.path.block_type),
    )
}

/// Experiments listed in a merged `terramate` block
///
/// Only literal lists are understood, anything else is reported later when the block is parsed.
pub fn declared_experiments(block: &MergedBlock) -> Vec<String> {
    block
        .sub_blocks
        .get(&LabelPath::unlabeled("config"))
        .and_then(|config| config.attributes.get("experiments"))
        .and_then(|attribute| string_list_literal(attribute).ok())
        .unwrap_or_default()
}
