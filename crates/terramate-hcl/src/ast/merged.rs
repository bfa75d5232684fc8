//! merged blocks
//!
//! A [MergedBlock] collects every occurrence of one [LabelPath] inside a merge scope. Attributes are united by name,
//! child blocks are merged recursively by their normalized label path and each contributing occurrence is remembered
//! for error reporting.
use super::label::{normalize_child, LabelPath, LabelSchema};
use super::{Attribute, RawBlock};
use crate::errors::{Error, Errors};
use crate::info::SourceRange;
use indexmap::IndexMap;

/// When two declarations of the same attribute are a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// only if both are defined in the same directory, otherwise the later one replaces the earlier one
    SameDirectory,
    /// always
    Always,
}

/// Where one raw block occurrence was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub range: SourceRange,
    pub def_range: SourceRange,
    pub labels_range: SourceRange,
}

impl Occurrence {
    pub fn of(block: &RawBlock) -> Self {
        Self {
            range: block.range.clone(),
            def_range: block.def_range(),
            labels_range: block.labels_range(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedBlock {
    pub path: LabelPath,
    pub attributes: IndexMap<String, Attribute>,
    pub sub_blocks: IndexMap<LabelPath, MergedBlock>,
    pub raw_origins: Vec<Occurrence>,
}

impl MergedBlock {
    pub fn new(path: LabelPath) -> Self {
        Self {
            path,
            attributes: Default::default(),
            sub_blocks: Default::default(),
            raw_origins: Default::default(),
        }
    }

    /// Folds the body of one raw occurrence into this block
    ///
    /// `body` is the block that holds the attributes and children, which differs from the written block when nesting
    /// was pulled into the label path. Children are keyed with [normalize_child] under `schema`, so an inline
    /// `environment "prod"` and a nested `environment { prod }` land on the same sub-block. All conflicts are
    /// reported, merging continues after each of them.
    pub fn merge_raw(
        &mut self,
        body: &RawBlock,
        origin: Occurrence,
        schema: LabelSchema,
        policy: ConflictPolicy,
    ) -> Result<(), Errors> {
        let mut errors = Errors::new();
        self.raw_origins.push(origin);

        for attribute in &body.attributes {
            errors.collect_one(self.insert_attribute(attribute.clone(), policy));
        }

        let child_schema = schema.below(&self.path);
        for child in &body.blocks {
            let normalized = normalize_child(child, child_schema);
            let sub_block = self
                .sub_blocks
                .entry(normalized.path.clone())
                .or_insert_with(|| MergedBlock::new(normalized.path.clone()));

            errors.collect(sub_block.merge_raw(normalized.body, Occurrence::of(child), child_schema, policy));
        }

        errors.into_result()
    }

    /// Folds an already merged block (of the same path) into this one
    pub fn merge_block(&mut self, other: MergedBlock, policy: ConflictPolicy) -> Result<(), Errors> {
        let mut errors = Errors::new();
        self.raw_origins.extend(other.raw_origins);

        for (_, attribute) in other.attributes {
            errors.collect_one(self.insert_attribute(attribute, policy));
        }

        for (path, sub_block) in other.sub_blocks {
            match self.sub_blocks.get_mut(&path) {
                Some(existing) => {
                    errors.collect(existing.merge_block(sub_block, policy));
                }
                None => {
                    self.sub_blocks.insert(path, sub_block);
                }
            }
        }

        errors.into_result()
    }

    pub fn insert_attribute(&mut self, attribute: Attribute, policy: ConflictPolicy) -> Result<(), Error> {
        insert_attribute(&mut self.attributes, attribute, policy)
    }

    /// Range of the first occurrence, used to point at the block as a whole
    pub fn first_range(&self) -> Option<&SourceRange> {
        self.raw_origins.first().map(|origin| &origin.range)
    }

    pub fn def_range(&self) -> Option<SourceRange> {
        self.raw_origins.first().map(|origin| origin.def_range.clone())
    }

    pub fn labels_range(&self) -> Option<SourceRange> {
        self.raw_origins.first().map(|origin| origin.labels_range.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.sub_blocks.is_empty()
    }
}

/// Name keyed attribute union shared by merged blocks and top level attributes
pub fn insert_attribute(
    attributes: &mut IndexMap<String, Attribute>,
    attribute: Attribute,
    policy: ConflictPolicy,
) -> Result<(), Error> {
    if let Some(existing) = attributes.get(&attribute.name) {
        let conflict = match policy {
            ConflictPolicy::Always => true,
            ConflictPolicy::SameDirectory => existing.range.dir() == attribute.range.dir(),
        };

        if conflict {
            return Err(Error::conflict(
                attribute.name_range.clone(),
                format!(
                    "attribute {:?} redeclared in file {:?} (first defined at {})",
                    attribute.name,
                    attribute.defining_file().display().to_string(),
                    existing.name_range
                ),
            ));
        }

        tracing::debug!(name = %attribute.name, from = %attribute.range, "attribute replaced by other directory");
    }

    attributes.insert(attribute.name.clone(), attribute);
    Ok(())
}
