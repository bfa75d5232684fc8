//! parser orchestration
//!
//! A [TerramateParser] collects directories with [TerramateParser::add_directory] and parses them all at once with
//! [TerramateParser::parse_config]:
//!
//! 1. merge: the files of every directory (and the files they import) are folded into one [RawConfig] per directory
//! 2. experiments enabled for the configuration root are read from the merged root `terramate` block
//! 3. build: every handler gets the blocks of its type per directory, then validates what it built
//!
//! Errors of all phases and directories are accumulated, merge errors come first. A parser is single use.
use crate::ast::label::{LabelPath, LabelSchema};
use crate::ast::merged::{ConflictPolicy, MergedBlock, Occurrence};
use crate::ast::RawBlock;
use crate::blocks::terramate::declared_experiments;
use crate::config::ParsedConfig;
use crate::errors::{Error, Errors};
use crate::handler::{Handler, ParseContext, Registry};
use crate::hcl_files::{HclFiles, LoadError};
use crate::imports::ImportResolver;
use crate::info::SourceRange;
use crate::project::ProjectPath;
use crate::raw_config::RawConfig;
use indexmap::IndexMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// unknown top level blocks and attributes are errors instead of being skipped
    pub strict: bool,
    /// experiments enabled on top of the ones the root configuration declares
    pub experiments: Vec<String>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            strict: true,
            experiments: vec![],
        }
    }
}

impl ParserOptions {
    pub fn non_strict() -> Self {
        Self {
            strict: false,
            ..Default::default()
        }
    }
}

pub struct TerramateParser {
    files: HclFiles,
    registry: Registry,
    options: ParserOptions,
    /// directories to parse with their files, in the order they were added
    dirs: IndexMap<ProjectPath, Vec<ProjectPath>>,
    parsed: bool,
}

impl TerramateParser {
    /// Strict parser with the built-in handlers
    pub fn new(files: HclFiles) -> Self {
        Self::with_options(files, ParserOptions::default())
    }

    pub fn with_options(files: HclFiles, options: ParserOptions) -> Self {
        Self::with_registry(files, options, Registry::default())
    }

    pub fn with_registry(files: HclFiles, options: ParserOptions, registry: Registry) -> Self {
        Self {
            files,
            registry,
            options,
            dirs: Default::default(),
            parsed: false,
        }
    }

    /// Parser reading the configuration below the host directory `root`
    pub fn on_disk(root: impl Into<PathBuf>, options: ParserOptions) -> Self {
        Self::with_options(HclFiles::on_disk(root), options)
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn files(&self) -> &HclFiles {
        &self.files
    }

    /// Directories added so far
    pub fn directories(&self) -> impl Iterator<Item = &ProjectPath> {
        self.dirs.keys()
    }

    /// Adds a directory, given as project path, and loads its configuration files
    ///
    /// Adding a directory twice has no effect.
    ///
    /// # Panic
    /// Panics when the configuration was parsed already
    pub fn add_directory(&mut self, dir: &str) -> Result<(), LoadError> {
        assert!(!self.parsed, "configuration already parsed, no directory can be added");

        let dir = ProjectPath::new(dir)?;
        if self.dirs.contains_key(&dir) {
            return Ok(());
        }

        let files = self.files.load_directory(&dir)?;
        tracing::debug!(%dir, files = files.len(), "directory added");
        self.dirs.insert(dir, files);
        Ok(())
    }

    /// Parses all added directories
    ///
    /// Returns every error found, merge errors of all directories before the errors of the handlers.
    ///
    /// # Panic
    /// Panics when called a second time
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn parse_config(&mut self) -> Result<ParsedConfig, Errors> {
        assert!(!self.parsed, "configuration already parsed");
        self.parsed = true;

        let mut errors = Errors::new();
        let scopes = self.merge_phase(&mut errors);

        let experiments = self.experiments(&scopes);
        let mut parsed = ParsedConfig::new();
        parsed.experiments = experiments.clone();

        self.build_phase(&scopes, &experiments, &mut parsed, &mut errors);

        errors.into_result_with(parsed)
    }

    #[tracing::instrument(level = "trace", skip_all)]
    fn merge_phase(&mut self, errors: &mut Errors) -> Vec<(ProjectPath, RawConfig)> {
        let dirs: Vec<(ProjectPath, Vec<ProjectPath>)> =
            self.dirs.iter().map(|(dir, files)| (dir.clone(), files.clone())).collect();

        dirs.into_iter()
            .map(|(dir, files)| {
                let raw = self.merge_directory(&dir, &files, errors);
                (dir, raw)
            })
            .collect()
    }

    fn merge_directory(&mut self, dir: &ProjectPath, paths: &[ProjectPath], errors: &mut Errors) -> RawConfig {
        tracing::debug!(%dir, "merging directory");

        let mut native = vec![];
        for path in paths {
            match self.files.get(path) {
                Some(Ok(file)) => native.push(file.clone()),
                Some(Err(syntax)) => errors.log(syntax.clone()),
                None => {}
            }
        }

        let mut raw = RawConfig::new();
        for file in &native {
            errors.collect(raw.merge_file(file, &self.registry, ConflictPolicy::SameDirectory));
        }

        let (imported, import_errors) = ImportResolver::new(&mut self.files, &self.registry, dir).resolve(&native);
        errors.append(import_errors);
        errors.collect(raw.merge_imported(imported));

        raw
    }

    /// Experiments of the options plus the ones enabled by the root configuration
    fn experiments(&mut self, scopes: &[(ProjectPath, RawConfig)]) -> Vec<String> {
        let mut experiments = self.options.experiments.clone();

        let declared = match scopes.iter().find(|(dir, _)| dir.is_root()) {
            Some((_, raw)) => raw.merged.get("terramate").map(declared_experiments).unwrap_or_default(),
            None => self.unparsed_root_experiments(),
        };

        for experiment in declared {
            if !experiments.contains(&experiment) {
                experiments.push(experiment);
            }
        }

        tracing::debug!(?experiments, "experiments enabled");
        experiments
    }

    /// Reads the experiments of the root directory when it is not among the parsed ones
    ///
    /// Problems of the root configuration are not reported here, they belong to whoever parses it.
    fn unparsed_root_experiments(&mut self) -> Vec<String> {
        let root = ProjectPath::root();
        let Ok(paths) = self.files.load_directory(&root) else {
            return vec![];
        };

        let mut terramate: Option<MergedBlock> = None;
        for path in &paths {
            let Some(Ok(file)) = self.files.get(path) else {
                continue;
            };

            for block in file.blocks.iter().filter(|block| block.block_type == "terramate") {
                let merged = terramate.get_or_insert_with(|| MergedBlock::new(LabelPath::unlabeled("terramate")));
                let origin = Occurrence::of(block);
                let result = merged.merge_raw(block, origin, LabelSchema::INLINE, ConflictPolicy::SameDirectory);
                if let Err(problems) = result {
                    tracing::debug!(problems = problems.len(), "ignoring problems of the root terramate block");
                }
            }
        }

        terramate.as_ref().map(declared_experiments).unwrap_or_default()
    }

    #[tracing::instrument(level = "trace", skip_all)]
    fn build_phase(
        &self,
        scopes: &[(ProjectPath, RawConfig)],
        experiments: &[String],
        parsed: &mut ParsedConfig,
        errors: &mut Errors,
    ) {
        // first occurrence of every unique block type across all directories
        let mut unique: IndexMap<String, SourceRange> = IndexMap::new();

        for (dir, raw) in scopes {
            tracing::debug!(%dir, "building directory");
            let mut ctx = ParseContext::new(dir, parsed, experiments);
            ctx.config();

            self.check_unrecognized(raw, errors);

            let mut enabled = vec![];
            for handler in self.registry.handlers() {
                match handler.experiment() {
                    Some(experiment) if !experiments.iter().any(|enabled| enabled == experiment) => {
                        self.reject_gated(handler, experiment, raw, errors);
                    }
                    _ => {
                        errors.append(build(handler, &mut ctx, raw, &mut unique));
                        enabled.push(handler);
                    }
                }
            }

            for handler in enabled {
                errors.collect(handler.validate(&mut ctx));
            }
        }
    }

    fn check_unrecognized(&self, raw: &RawConfig, errors: &mut Errors) {
        if !self.options.strict {
            for block in &raw.unrecognized {
                tracing::debug!(block_type = %block.block_type, "skipping unrecognized block");
            }
            return;
        }

        for attribute in raw.attributes.values() {
            errors.log(Error::schema(
                attribute.name_range.clone(),
                format!("unrecognized attribute {:?}: top level attributes are not allowed", attribute.name),
            ));
        }

        for block in &raw.unrecognized {
            let message = match self.registry.suggest(&block.block_type) {
                Some(suggestion) => format!(
                    "unrecognized block {:?}, did you mean {suggestion:?}?",
                    block.block_type
                ),
                None => format!("unrecognized block {:?}", block.block_type),
            };
            errors.log(Error::schema(block.def_range(), message));
        }
    }

    /// Blocks of a handler whose experiment is off are unrecognized blocks with a hint
    fn reject_gated(&self, handler: Handler<'_>, experiment: &str, raw: &RawConfig, errors: &mut Errors) {
        let name = handler.name();
        let ranges = blocks_of(name, raw);
        if ranges.is_empty() {
            return;
        }

        if !self.options.strict {
            tracing::debug!(block_type = %name, %experiment, "skipping block of disabled experiment");
            return;
        }

        for range in ranges {
            errors.log(Error::schema(
                range,
                format!(
                    "unrecognized block {name:?} ({name} is an experimental feature, it must be enabled before \
                     usage with `terramate.config.experiments = [{experiment:?}]`)"
                ),
            ));
        }
    }
}

/// Hands the blocks of the current directory to one handler
fn build(
    handler: Handler<'_>,
    ctx: &mut ParseContext<'_>,
    raw: &RawConfig,
    unique: &mut IndexMap<String, SourceRange>,
) -> Errors {
    let name = handler.name();
    let mut errors = Errors::new();

    match handler {
        Handler::Unmerged(handler) => {
            for block in raw.unmerged.iter().filter(|block| block.block_type == name) {
                errors.collect(handler.parse(ctx, block));
            }
        }
        Handler::Merged(handler) => {
            if let Some(block) = raw.merged.get(name) {
                errors.collect(handler.parse(ctx, block));
            }
        }
        Handler::MergedLabels(handler) => {
            for (_, block) in raw.merged_labels.iter().filter(|(path, _)| path.block_type == name) {
                errors.collect(handler.parse(ctx, block));
            }
        }
        Handler::Unique(handler) => {
            for block in raw.unique.iter().filter(|block| block.block_type == name) {
                match unique.get(name) {
                    // one file imported by several directories
                    Some(first) if *first == block.def_range() => {
                        tracing::debug!(block_type = %name, at = %first, "unique block seen again through an import");
                    }
                    Some(first) => errors.log(Error::conflict(
                        block.def_range(),
                        format!("multiple {name:?} blocks, first one declared at {first}"),
                    )),
                    None => {
                        unique.insert(name.to_owned(), block.def_range());
                        errors.collect(handler.parse(ctx, block));
                    }
                }
            }
        }
    }

    errors
}

/// Definition ranges of every block of a type, whatever bucket it landed in
fn blocks_of(name: &str, raw: &RawConfig) -> Vec<SourceRange> {
    let raw_ranges = raw
        .unmerged
        .iter()
        .chain(&raw.unique)
        .filter(|block| block.block_type == name)
        .map(RawBlock::def_range);

    let merged_ranges = raw
        .merged
        .get(name)
        .into_iter()
        .chain(
            raw.merged_labels
                .iter()
                .filter(|(path, _)| path.block_type == name)
                .map(|(_, block)| block),
        )
        .flat_map(|block| block.raw_origins.iter().map(|origin| origin.def_range.clone()));

    raw_ranges.chain(merged_ranges).collect()
}
