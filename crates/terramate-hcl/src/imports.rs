//! `import` blocks
//!
//! ```hcl
//! import {
//!   source = "/modules/common/*.tm"
//! }
//! ```
//!
//! The blocks of an imported file become part of the importing directory as if they were written there. Sources are
//! relative to the importing file unless they start with `/`, which is the configuration root. The file name may be a
//! glob pattern, its matches are imported in file name order. Imported files may import further files, the resolver
//! walks them depth first:
//!
//! - a file in the current import chain (a cycle) is an error at the import closing the cycle
//! - a file imported before by another file of the same directory is merged only once
//! - a file imported twice by the same file is an error
//! - files of the importing directory itself, or of any directory above it, can't be imported
use crate::ast::merged::ConflictPolicy;
use crate::ast::{RawBlock, RawFile};
use crate::errors::{Error, Errors};
use crate::handler::{Registry, IMPORT_BLOCK};
use crate::hcl_files::{HclFiles, LoadError};
use crate::info::SourceRange;
use crate::project::ProjectPath;
use crate::raw_config::RawConfig;
use crate::schema::{check_raw_attributes, check_raw_sub_blocks, missing};
use crate::util::string_literal;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Resolving,
    Resolved,
}

/// Resolves the imports of one directory
pub struct ImportResolver<'a> {
    files: &'a mut HclFiles,
    registry: &'a Registry,
    scope: &'a ProjectPath,
    states: HashMap<ProjectPath, State>,
    chain: Vec<ProjectPath>,
    imported: RawConfig,
    errors: Errors,
}

impl<'a> ImportResolver<'a> {
    pub fn new(files: &'a mut HclFiles, registry: &'a Registry, scope: &'a ProjectPath) -> Self {
        Self {
            files,
            registry,
            scope,
            states: Default::default(),
            chain: vec![],
            imported: RawConfig::new(),
            errors: Errors::new(),
        }
    }

    /// Follows the imports of the native files of the directory
    ///
    /// Returns the merged configuration of all files that could be imported, to be folded into the native one with
    /// [RawConfig::merge_imported], together with the problems of the ones that could not.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn resolve(mut self, native: &[RawFile]) -> (RawConfig, Errors) {
        tracing::debug!(scope = %self.scope, "resolving imports");
        for file in native {
            self.enter(&file.path);
            self.visit_imports(file);
            self.leave(&file.path);
        }

        (self.imported, self.errors)
    }

    fn enter(&mut self, path: &ProjectPath) {
        self.states.insert(path.clone(), State::Resolving);
        self.chain.push(path.clone());
    }

    fn leave(&mut self, path: &ProjectPath) {
        self.chain.pop();
        self.states.insert(path.clone(), State::Resolved);
    }

    fn visit_imports(&mut self, file: &RawFile) {
        let mut seen: Vec<ProjectPath> = vec![];

        for block in file.blocks.iter().filter(|block| block.block_type == IMPORT_BLOCK) {
            let Some((source, range)) = self.errors.collect(import_source(block)) else {
                continue;
            };

            let Some(targets) = self.targets(file, &source, &range) else {
                continue;
            };

            for target in targets {
                if seen.contains(&target) {
                    self.errors.log(Error::import(
                        range.clone(),
                        format!("file {target} is imported more than once by {}", file.path),
                    ));
                    continue;
                }
                seen.push(target.clone());

                self.import(file, target, range.clone());
            }
        }
    }

    /// Files a source names, patterns are expanded in file name order
    fn targets(&mut self, file: &RawFile, source: &str, range: &SourceRange) -> Option<Vec<ProjectPath>> {
        let Ok(target) = file.dir().join(source) else {
            self.errors.log(Error::import(
                range.clone(),
                format!("import source {source:?} escapes the configuration root"),
            ));
            return None;
        };

        if !is_pattern(source) {
            return Some(vec![target]);
        }

        let dir = target.dir();
        if is_pattern(dir.as_str()) {
            self.errors.log(Error::import(
                range.clone(),
                format!("import source {source:?}: patterns are only allowed in the file name"),
            ));
            return None;
        }

        let pattern = match glob::Pattern::new(target.file_name()) {
            Ok(pattern) => pattern,
            Err(error) => {
                self.errors
                    .log(Error::import(range.clone(), format!("invalid import pattern {source:?}: {error}")));
                return None;
            }
        };

        let matches = match self.files.glob(&dir, &pattern) {
            Ok(matches) => matches,
            Err(LoadError::NotADirectory(_)) => vec![],
            Err(error) => {
                self.errors
                    .log(Error::import(range.clone(), format!("failed to expand import pattern {source:?}: {error}")));
                return None;
            }
        };

        if matches.is_empty() {
            self.errors
                .log(Error::import(range.clone(), format!("import pattern {source:?} matches no files")));
            return None;
        }

        Some(matches)
    }

    fn import(&mut self, from: &RawFile, target: ProjectPath, range: SourceRange) {
        if target == from.path {
            self.errors.log(Error::import(range, format!("file {target} imports itself")));
            return;
        }

        match self.states.get(&target) {
            Some(State::Resolving) => {
                let mut cycle: Vec<String> = self.chain.iter().map(ToString::to_string).collect();
                cycle.push(target.to_string());
                self.errors.log(Error::import(
                    range,
                    format!("import cycle detected: {}", cycle.join(" -> ")),
                ));
                return;
            }
            Some(State::Resolved) => {
                tracing::debug!(path = %target, "already imported");
                return;
            }
            None => {}
        }

        let target_dir = target.dir();
        if &target_dir == self.scope {
            self.errors.log(Error::import(
                range,
                format!("importing files in the same directory is not permitted: {target}"),
            ));
            return;
        }

        if target_dir.is_ancestor_of(self.scope) {
            self.errors.log(Error::import(
                range,
                format!("importing files in the same tree is not permitted: {target} is above {}", self.scope),
            ));
            return;
        }

        let file = match self.files.get_or_load(&target) {
            Ok(Some(Ok(file))) => file.clone(),
            Ok(Some(Err(syntax))) => {
                self.errors.log(syntax.clone());
                self.states.insert(target, State::Resolved);
                return;
            }
            Ok(None) => {
                self.errors.log(Error::import(range, format!("import source {target} not found")));
                return;
            }
            Err(error) => {
                self.errors
                    .log(Error::import(range, format!("failed to load import source {target}: {error}")));
                return;
            }
        };

        tracing::debug!(path = %target, from = %from.path, "importing");
        self.enter(&target);
        self.visit_imports(&file);
        self.errors
            .collect(self.imported.merge_file(&file, self.registry, ConflictPolicy::SameDirectory));
        self.leave(&target);
    }
}

fn is_pattern(source: &str) -> bool {
    source.contains(['*', '?', '['])
}

/// Validates an import block, returning its source and the range to report import problems at
fn import_source(block: &RawBlock) -> Result<(String, SourceRange), Errors> {
    let mut errors = Errors::new();

    if !block.labels.is_empty() {
        errors.log(Error::schema(block.labels_range(), "import must have no labels"));
    }
    errors.append(check_raw_attributes(block, "import", &["source"]));
    errors.append(check_raw_sub_blocks(block, "import", &[]));

    let source = match block.attribute("source") {
        Some(attribute) => errors
            .collect_one(string_literal(attribute))
            .map(|source| (source, attribute.expr_range.clone())),
        None => {
            errors.log(missing(Some(block.def_range()), "import", "source"));
            None
        }
    };

    match source {
        Some(source) if errors.is_empty() => Ok(source),
        _ => Err(errors),
    }
}
