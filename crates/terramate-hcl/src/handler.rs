//! block handlers
//!
//! A handler owns one block type. It declares one of four merge disciplines by implementing the matching trait:
//!
//! | trait | occurrences handed to `parse` |
//! |---|---|
//! | [UnmergedHandler] | every raw block, independently |
//! | [MergedHandler] | one [MergedBlock] per directory (no labels allowed) |
//! | [MergedLabelsHandler] | one [MergedBlock] per normalized [crate::ast::label::LabelPath] per directory |
//! | [UniqueHandler] | the single raw block of the whole configuration |
//!
//! After all blocks of a directory were parsed, `validate` runs once per handler for cross-block checks
//! (required attributes that may come from any form, duplicates, ...).
//!
//! Handlers are collected in a [Registry]. [Registry::default] knows every [BuiltinBlock].
use crate::ast::label::LabelSchema;
use crate::ast::merged::MergedBlock;
use crate::ast::RawBlock;
use crate::blocks;
use crate::config::{Config, ParsedConfig};
use crate::errors::Errors;
use crate::project::ProjectPath;
use indexmap::IndexMap;

/// Block type reserved for the import resolver
pub const IMPORT_BLOCK: &str = "import";

pub trait BlockHandler {
    /// block type this handler owns
    fn name(&self) -> &str;

    /// name of the experiment that must be enabled before the block is recognized
    fn experiment(&self) -> Option<&str> {
        None
    }
}

pub trait UnmergedHandler: BlockHandler {
    fn parse(&self, ctx: &mut ParseContext<'_>, block: &RawBlock) -> Result<(), Errors>;

    fn validate(&self, _ctx: &mut ParseContext<'_>) -> Result<(), Errors> {
        Ok(())
    }
}

pub trait MergedHandler: BlockHandler {
    fn parse(&self, ctx: &mut ParseContext<'_>, block: &MergedBlock) -> Result<(), Errors>;

    fn validate(&self, _ctx: &mut ParseContext<'_>) -> Result<(), Errors> {
        Ok(())
    }
}

pub trait MergedLabelsHandler: BlockHandler {
    fn label_schema(&self) -> LabelSchema;

    fn parse(&self, ctx: &mut ParseContext<'_>, block: &MergedBlock) -> Result<(), Errors>;

    fn validate(&self, _ctx: &mut ParseContext<'_>) -> Result<(), Errors> {
        Ok(())
    }
}

pub trait UniqueHandler: BlockHandler {
    fn parse(&self, ctx: &mut ParseContext<'_>, block: &RawBlock) -> Result<(), Errors>;

    fn validate(&self, _ctx: &mut ParseContext<'_>) -> Result<(), Errors> {
        Ok(())
    }
}

/// A registered handler, tagged with its discipline
#[derive(Clone, Copy)]
pub enum Handler<'r> {
    Unmerged(&'r dyn UnmergedHandler),
    Merged(&'r dyn MergedHandler),
    MergedLabels(&'r dyn MergedLabelsHandler),
    Unique(&'r dyn UniqueHandler),
}

impl<'r> Handler<'r> {
    pub fn name(&self) -> &'r str {
        match self {
            Handler::Unmerged(handler) => handler.name(),
            Handler::Merged(handler) => handler.name(),
            Handler::MergedLabels(handler) => handler.name(),
            Handler::Unique(handler) => handler.name(),
        }
    }

    pub fn experiment(&self) -> Option<&'r str> {
        match self {
            Handler::Unmerged(handler) => handler.experiment(),
            Handler::Merged(handler) => handler.experiment(),
            Handler::MergedLabels(handler) => handler.experiment(),
            Handler::Unique(handler) => handler.experiment(),
        }
    }

    pub fn discipline(&self) -> Discipline {
        match self {
            Handler::Unmerged(_) => Discipline::Unmerged,
            Handler::Merged(_) => Discipline::Merged,
            Handler::MergedLabels(handler) => Discipline::MergedLabels(handler.label_schema()),
            Handler::Unique(_) => Discipline::Unique,
        }
    }

    pub fn validate(&self, ctx: &mut ParseContext<'_>) -> Result<(), Errors> {
        match self {
            Handler::Unmerged(handler) => handler.validate(ctx),
            Handler::Merged(handler) => handler.validate(ctx),
            Handler::MergedLabels(handler) => handler.validate(ctx),
            Handler::Unique(handler) => handler.validate(ctx),
        }
    }
}

impl std::fmt::Debug for Handler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name())
            .field("discipline", &self.discipline())
            .finish()
    }
}

/// How occurrences of a block type are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    Unmerged,
    Merged,
    MergedLabels(LabelSchema),
    Unique,
}

enum Entry {
    Unmerged(Box<dyn UnmergedHandler>),
    Merged(Box<dyn MergedHandler>),
    MergedLabels(Box<dyn MergedLabelsHandler>),
    Unique(Box<dyn UniqueHandler>),
}

impl Entry {
    fn handler(&self) -> Handler<'_> {
        match self {
            Entry::Unmerged(handler) => Handler::Unmerged(handler.as_ref()),
            Entry::Merged(handler) => Handler::Merged(handler.as_ref()),
            Entry::MergedLabels(handler) => Handler::MergedLabels(handler.as_ref()),
            Entry::Unique(handler) => Handler::Unique(handler.as_ref()),
        }
    }
}

/// Block type name to handler table
///
/// Registration order is kept. It decides the order of the validate phase and breaks ties in "did you mean" hints.
pub struct Registry {
    entries: IndexMap<String, Entry>,
}

impl Registry {
    /// A registry without any handler
    pub fn empty() -> Self {
        Self {
            entries: Default::default(),
        }
    }

    pub fn register_unmerged(&mut self, handlers: Vec<Box<dyn UnmergedHandler>>) {
        for handler in handlers {
            self.register(handler.name().to_owned(), Entry::Unmerged(handler));
        }
    }

    pub fn register_merged(&mut self, handlers: Vec<Box<dyn MergedHandler>>) {
        for handler in handlers {
            self.register(handler.name().to_owned(), Entry::Merged(handler));
        }
    }

    pub fn register_merged_labels(&mut self, handlers: Vec<Box<dyn MergedLabelsHandler>>) {
        for handler in handlers {
            self.register(handler.name().to_owned(), Entry::MergedLabels(handler));
        }
    }

    pub fn register_unique(&mut self, handlers: Vec<Box<dyn UniqueHandler>>) {
        for handler in handlers {
            self.register(handler.name().to_owned(), Entry::Unique(handler));
        }
    }

    /// # Panic
    /// Panics when the block type is registered already or reserved
    fn register(&mut self, name: String, entry: Entry) {
        assert!(name != IMPORT_BLOCK, "block type {name:?} is reserved for imports");
        assert!(
            !self.entries.contains_key(&name),
            "block type {name:?} is already registered"
        );

        tracing::trace!(%name, "handler registered");
        self.entries.insert(name, entry);
    }

    pub fn lookup(&self, name: &str) -> Option<Handler<'_>> {
        self.entries.get(name).map(Entry::handler)
    }

    pub fn discipline(&self, name: &str) -> Option<Discipline> {
        self.lookup(name).map(|handler| handler.discipline())
    }

    /// Handlers in registration order
    pub fn handlers(&self) -> impl Iterator<Item = Handler<'_>> {
        self.entries.values().map(Entry::handler)
    }

    /// Closest registered block type within a small edit distance
    pub fn suggest(&self, name: &str) -> Option<&str> {
        let mut best: Option<(usize, &str)> = None;
        for candidate in self.entries.keys() {
            let distance = crate::util::edit_distance(name, candidate);
            if distance > 2 {
                continue;
            }

            if best.map_or(true, |(best_distance, _)| distance < best_distance) {
                best = Some((distance, candidate));
            }
        }

        best.map(|(_, candidate)| candidate)
    }
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_unmerged(vec![
            Box::new(blocks::stack::StackHandler),
            Box::new(blocks::generate::GenerateFileHandler),
            Box::new(blocks::generate::GenerateHclHandler),
            Box::new(blocks::script::ScriptHandler),
            Box::new(blocks::assert::AssertHandler),
            Box::new(blocks::environment::EnvironmentHandler),
            Box::new(blocks::sharing::SharingBackendHandler),
            Box::new(blocks::sharing::InputHandler),
            Box::new(blocks::sharing::OutputHandler),
        ]);
        registry.register_merged(vec![Box::new(blocks::terramate::TerramateHandler)]);
        registry.register_merged_labels(vec![
            Box::new(blocks::globals::GlobalsHandler),
            Box::new(blocks::bundle::BundleHandler),
            Box::new(blocks::component::ComponentHandler),
            Box::new(blocks::define::DefineHandler),
        ]);
        registry.register_unique(vec![Box::new(blocks::vendor::VendorHandler)]);
        registry
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.handlers()).finish()
    }
}

/// Block types known out of the box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinBlock {
    Terramate,
    Globals,
    Stack,
    GenerateFile,
    GenerateHcl,
    Script,
    Assert,
    Environment,
    SharingBackend,
    Input,
    Output,
    Vendor,
    Bundle,
    Component,
    Define,
    Import,
}

impl BuiltinBlock {
    pub const ALL: [BuiltinBlock; 16] = [
        BuiltinBlock::Terramate,
        BuiltinBlock::Globals,
        BuiltinBlock::Stack,
        BuiltinBlock::GenerateFile,
        BuiltinBlock::GenerateHcl,
        BuiltinBlock::Script,
        BuiltinBlock::Assert,
        BuiltinBlock::Environment,
        BuiltinBlock::SharingBackend,
        BuiltinBlock::Input,
        BuiltinBlock::Output,
        BuiltinBlock::Vendor,
        BuiltinBlock::Bundle,
        BuiltinBlock::Component,
        BuiltinBlock::Define,
        BuiltinBlock::Import,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinBlock::Terramate => "terramate",
            BuiltinBlock::Globals => "globals",
            BuiltinBlock::Stack => "stack",
            BuiltinBlock::GenerateFile => "generate_file",
            BuiltinBlock::GenerateHcl => "generate_hcl",
            BuiltinBlock::Script => "script",
            BuiltinBlock::Assert => "assert",
            BuiltinBlock::Environment => "environment",
            BuiltinBlock::SharingBackend => "sharing_backend",
            BuiltinBlock::Input => "input",
            BuiltinBlock::Output => "output",
            BuiltinBlock::Vendor => "vendor",
            BuiltinBlock::Bundle => "bundle",
            BuiltinBlock::Component => "component",
            BuiltinBlock::Define => "define",
            BuiltinBlock::Import => IMPORT_BLOCK,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }
}

impl std::fmt::Display for BuiltinBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a handler gets to see while parsing
///
/// Gives access to the typed configuration of the directory being parsed (and the configuration as a whole for
/// handlers whose blocks are unique across directories).
pub struct ParseContext<'a> {
    dir: &'a ProjectPath,
    parsed: &'a mut ParsedConfig,
    experiments: &'a [String],
}

impl<'a> ParseContext<'a> {
    pub fn new(dir: &'a ProjectPath, parsed: &'a mut ParsedConfig, experiments: &'a [String]) -> Self {
        Self {
            dir,
            parsed,
            experiments,
        }
    }

    pub fn dir(&self) -> &ProjectPath {
        self.dir
    }

    pub fn is_root(&self) -> bool {
        self.dir.is_root()
    }

    /// Typed configuration of the current directory
    pub fn config(&mut self) -> &mut Config {
        self.parsed.dirs.entry(self.dir.clone()).or_default()
    }

    pub fn parsed(&mut self) -> &mut ParsedConfig {
        self.parsed
    }

    pub fn has_experiment(&self, name: &str) -> bool {
        self.experiments.iter().any(|experiment| experiment == name)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Custom(&'static str);

    impl BlockHandler for Custom {
        fn name(&self) -> &str {
            self.0
        }
    }

    impl UnmergedHandler for Custom {
        fn parse(&self, _ctx: &mut ParseContext<'_>, _block: &RawBlock) -> Result<(), Errors> {
            Ok(())
        }
    }

    #[test]
    fn builtins_are_registered() {
        let registry = Registry::default();
        for builtin in BuiltinBlock::ALL {
            if builtin == BuiltinBlock::Import {
                assert!(registry.lookup(builtin.name()).is_none());
                continue;
            }
            assert!(registry.lookup(builtin.name()).is_some(), "{builtin} missing");
        }

        assert_eq!(registry.discipline("stack"), Some(Discipline::Unmerged));
        assert_eq!(registry.discipline("terramate"), Some(Discipline::Merged));
        assert_eq!(registry.discipline("vendor"), Some(Discipline::Unique));
        assert_eq!(
            registry.discipline("bundle"),
            Some(Discipline::MergedLabels(LabelSchema::nested(3)))
        );
        assert_eq!(registry.lookup("script").and_then(|h| h.experiment()), Some("scripts"));
        assert_eq!(BuiltinBlock::from_name("generate_hcl"), Some(BuiltinBlock::GenerateHcl));
    }

    #[test]
    fn suggestions_prefer_registration_order() {
        let mut registry = Registry::empty();
        registry.register_unmerged(vec![Box::new(Custom("abcd")), Box::new(Custom("abce"))]);

        assert_eq!(registry.suggest("abcf"), Some("abcd"));
        assert_eq!(registry.suggest("abce"), Some("abce"));
        assert_eq!(registry.suggest("zzzzzz"), None);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn double_registration_panics() {
        let mut registry = Registry::default();
        registry.register_unmerged(vec![Box::new(Custom("stack"))]);
    }

    #[test]
    #[should_panic(expected = "reserved")]
    fn import_is_reserved() {
        let mut registry = Registry::empty();
        registry.register_unmerged(vec![Box::new(Custom("import"))]);
    }
}
