//! per directory merge state
//!
//! A [RawConfig] receives every block of a merge scope (the files of one directory plus their imports) and sorts it
//! into the bucket of its discipline. It knows nothing about schemas beyond the [Discipline] and [LabelSchema] a
//! handler declares, the buckets are handed to the handlers afterwards.
use crate::ast::label::{normalize, LabelPath, LabelSchema};
use crate::ast::merged::{insert_attribute, ConflictPolicy, MergedBlock, Occurrence};
use crate::ast::{Attribute, RawBlock, RawFile};
use crate::errors::{Error, ErrorKind, Errors};
use crate::handler::{Discipline, Registry, IMPORT_BLOCK};
use indexmap::IndexMap;

#[derive(Debug, Default, Clone)]
pub struct RawConfig {
    /// top level attributes, only valid in non-strict mode
    pub attributes: IndexMap<String, Attribute>,
    pub unmerged: Vec<RawBlock>,
    /// keyed by block type
    pub merged: IndexMap<String, MergedBlock>,
    pub merged_labels: IndexMap<LabelPath, MergedBlock>,
    pub unique: Vec<RawBlock>,
    /// blocks without a registered handler
    pub unrecognized: Vec<RawBlock>,
}

impl RawConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges all top level attributes and blocks of a file, `import` blocks are skipped
    pub fn merge_file(&mut self, file: &RawFile, registry: &Registry, policy: ConflictPolicy) -> Result<(), Errors> {
        tracing::debug!(path = %file.path, "merging file");
        let mut errors = Errors::new();

        for attribute in &file.attributes {
            errors.collect_one(insert_attribute(&mut self.attributes, attribute.clone(), policy));
        }

        for block in &file.blocks {
            errors.collect(self.merge_block(block, registry, policy));
        }

        errors.into_result()
    }

    /// Sorts one raw block into the bucket its handler asks for
    pub fn merge_block(&mut self, block: &RawBlock, registry: &Registry, policy: ConflictPolicy) -> Result<(), Errors> {
        if block.block_type == IMPORT_BLOCK {
            return Ok(());
        }

        match registry.discipline(&block.block_type) {
            None => {
                self.unrecognized.push(block.clone());
                Ok(())
            }
            Some(Discipline::Unmerged) => {
                self.unmerged.push(block.clone());
                Ok(())
            }
            Some(Discipline::Unique) => {
                self.unique.push(block.clone());
                Ok(())
            }
            Some(Discipline::Merged) => self.merge_unlabeled(block, policy),
            Some(Discipline::MergedLabels(schema)) => self.merge_labeled(block, schema, policy),
        }
    }

    fn merge_unlabeled(&mut self, block: &RawBlock, policy: ConflictPolicy) -> Result<(), Errors> {
        if !block.labels.is_empty() {
            return Err(Error::schema(
                block.labels_range(),
                format!("{:?} block must have no labels", block.block_type),
            )
            .into());
        }

        self.merged
            .entry(block.block_type.clone())
            .or_insert_with(|| MergedBlock::new(LabelPath::unlabeled(block.block_type.clone())))
            .merge_raw(block, Occurrence::of(block), LabelSchema::INLINE, policy)
    }

    fn merge_labeled(&mut self, block: &RawBlock, schema: LabelSchema, policy: ConflictPolicy) -> Result<(), Errors> {
        let normalized = normalize(block, schema)?;

        self.merged_labels
            .entry(normalized.path.clone())
            .or_insert_with(|| MergedBlock::new(normalized.path.clone()))
            .merge_raw(normalized.body, Occurrence::of(block), schema, policy)
    }

    /// Folds the configuration of imported files into this one
    ///
    /// Imported and native content must be disjoint: every attribute conflict is reported as an import error with
    /// the conflict as cause.
    pub fn merge_imported(&mut self, other: RawConfig) -> Result<(), Errors> {
        let mut errors = Errors::new();

        for (_, attribute) in other.attributes {
            errors.collect_one(insert_attribute(&mut self.attributes, attribute, ConflictPolicy::Always));
        }

        for (block_type, block) in other.merged {
            match self.merged.get_mut(&block_type) {
                Some(existing) => {
                    errors.collect(existing.merge_block(block, ConflictPolicy::Always));
                }
                None => {
                    self.merged.insert(block_type, block);
                }
            }
        }

        for (path, block) in other.merged_labels {
            match self.merged_labels.get_mut(&path) {
                Some(existing) => {
                    errors.collect(existing.merge_block(block, ConflictPolicy::Always));
                }
                None => {
                    self.merged_labels.insert(path, block);
                }
            }
        }

        self.unmerged.extend(other.unmerged);
        self.unique.extend(other.unique);
        self.unrecognized.extend(other.unrecognized);

        errors.into_result().map_err(|errors| errors.map_each(import_conflict))
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
            && self.unmerged.is_empty()
            && self.merged.is_empty()
            && self.merged_labels.is_empty()
            && self.unique.is_empty()
            && self.unrecognized.is_empty()
    }
}

fn import_conflict(error: Error) -> Error {
    if error.kind != ErrorKind::MergeConflict {
        return error;
    }

    Error::new(
        ErrorKind::Import,
        error.range.clone(),
        "imported configuration conflicts with the importing directory",
    )
    .with_cause(error)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::test::parse;
    use pretty_assertions::assert_eq;

    fn merge(files: &[(&str, &str)]) -> (RawConfig, Result<(), Errors>) {
        let registry = Registry::default();
        let mut config = RawConfig::new();
        let mut errors = Errors::new();
        for (path, text) in files {
            errors.collect(config.merge_file(&parse(path, text), &registry, ConflictPolicy::SameDirectory));
        }
        (config, errors.into_result())
    }

    #[test]
    fn blocks_land_in_their_buckets() {
        let (config, result) = merge(&[(
            "/cfg.tm",
            r#"
top = 1
terramate {}
globals "a" {}
stack {}
vendor {}
unknown {}
import {
  source = "/other.tm"
}
"#,
        )]);
        result.unwrap();

        assert_eq!(config.attributes.keys().collect::<Vec<_>>(), vec!["top"]);
        assert_eq!(config.merged.keys().collect::<Vec<_>>(), vec!["terramate"]);
        assert_eq!(
            config.merged_labels.keys().collect::<Vec<_>>(),
            vec![&LabelPath::new("globals", ["a"])]
        );
        assert_eq!(config.unmerged[0].block_type, "stack");
        assert_eq!(config.unique[0].block_type, "vendor");
        assert_eq!(config.unrecognized[0].block_type, "unknown");
    }

    #[test]
    fn unmerged_blocks_never_conflict() {
        let (config, result) = merge(&[
            ("/a.tm", "assert {\n  assertion = true\n}\n"),
            ("/b.tm", "assert {\n  assertion = false\n}\n"),
        ]);
        result.unwrap();
        assert_eq!(config.unmerged.len(), 2);
    }

    #[test]
    fn labeled_merged_blocks_are_normalized() {
        let (config, result) = merge(&[
            ("/a.tm", "bundle \"x\" \"inputs\" {\n  a = 1\n}\n"),
            ("/b.tm", "bundle \"x\" {\n  inputs {\n    b = 2\n  }\n}\n"),
        ]);
        result.unwrap();

        assert_eq!(config.merged_labels.len(), 1);
        let inputs = &config.merged_labels[&LabelPath::new("bundle", ["x", "inputs"])];
        assert_eq!(inputs.attributes.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(inputs.raw_origins.len(), 2);
    }

    #[test]
    fn merged_blocks_take_no_labels() {
        let (_, result) = merge(&[("/cfg.tm", "terramate \"x\" {}\n")]);
        let errors = result.unwrap_err();
        assert_eq!(errors.kinds(), vec![ErrorKind::Schema]);
    }

    #[test]
    fn imported_conflicts_wrap_the_cause() {
        let (mut native, result) = merge(&[("/stack/cfg.tm", "globals {\n  a = 1\n}\n")]);
        result.unwrap();
        let (imported, result) = merge(&[("/modules/cfg.tm", "globals {\n  a = 2\n  b = 3\n}\n")]);
        result.unwrap();

        let errors = native.merge_imported(imported).unwrap_err();
        assert_eq!(errors.kinds(), vec![ErrorKind::Import]);

        let error = errors.first().unwrap();
        assert_eq!(error.cause.as_ref().unwrap().kind, ErrorKind::MergeConflict);
        assert_eq!(error.range.as_ref().unwrap().path().to_str(), Some("/modules/cfg.tm"));

        let globals = &native.merged_labels[&LabelPath::unlabeled("globals")];
        assert_eq!(globals.attributes.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
