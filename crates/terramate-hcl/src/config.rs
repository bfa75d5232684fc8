//! typed configuration
//!
//! [ParsedConfig] is what a successful parse returns: one [Config] per parsed directory plus the configuration wide
//! parts (vendoring, enabled experiments). Handlers fill it while blocks are dispatched to them.
use crate::blocks::assert::Assert;
use crate::blocks::bundle::Bundle;
use crate::blocks::component::Component;
use crate::blocks::define::Define;
use crate::blocks::environment::Environment;
use crate::blocks::generate::{GenerateFile, GenerateHcl};
use crate::blocks::globals::Globals;
use crate::blocks::script::Script;
use crate::blocks::sharing::{Input, Output, SharingBackend};
use crate::blocks::stack::Stack;
use crate::blocks::terramate::Terramate;
use crate::blocks::vendor::VendorConfig;
use crate::project::ProjectPath;
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ParsedConfig {
    /// experiments enabled for the configuration root
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub experiments: Vec<String>,
    pub dirs: IndexMap<ProjectPath, Config>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<VendorConfig>,
}

impl ParsedConfig {
    pub fn new() -> Self {
        Self {
            experiments: vec![],
            dirs: Default::default(),
            vendor: None,
        }
    }

    /// Configuration of one directory, `dir` being a project path like `/stack`
    pub fn dir(&self, dir: &str) -> Option<&Config> {
        let dir = ProjectPath::new(dir).ok()?;
        self.dirs.get(&dir)
    }

    pub fn root(&self) -> Option<&Config> {
        self.dirs.get(&ProjectPath::root())
    }
}

impl Default for ParsedConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything declared in one directory (including its imports)
#[derive(Debug, Default, Clone, Serialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terramate: Option<Terramate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Stack>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub globals: Vec<Globals>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generate_files: Vec<GenerateFile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generate_hcls: Vec<GenerateHcl>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scripts: Vec<Script>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub asserts: Vec<Assert>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub environments: Vec<Environment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sharing_backends: Vec<SharingBackend>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Input>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<Output>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub bundles: IndexMap<String, Bundle>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub components: IndexMap<String, Component>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub define: Option<Define>,
}
