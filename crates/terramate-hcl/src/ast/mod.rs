//! configuration syntax tree
//!
//! [RawFile], [RawBlock] and [Attribute] are the engine's own, immutable view of a parsed file. They are built once
//! from an [hcl_edit::structure::Body] and never change afterwards. Attribute values are kept as unevaluated
//! [hcl::Expression]s together with their source text.
//!
//! - [label] turns raw blocks into canonical [label::LabelPath]s
//! - [merged] accumulates raw blocks that share a label path into one [merged::MergedBlock]
pub mod label;
pub mod merged;

use crate::errors::Error;
use crate::info::{LineIndex, SourceRange};
use crate::project::ProjectPath;
use crate::value::Value;
use hcl_edit::structure::{Body, Structure};
use hcl_edit::Span;
use std::path::{Path, PathBuf};

/// `name = expression`
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub expr: hcl::Expression,
    /// source text of `expr`
    pub text: String,
    pub range: SourceRange,
    pub name_range: SourceRange,
    pub expr_range: SourceRange,
}

impl Attribute {
    pub fn defining_file(&self) -> &Path {
        self.range.path()
    }

    pub fn value(&self) -> Value {
        Value::from(self)
    }
}

impl serde::Serialize for Attribute {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.value().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawBlock {
    pub block_type: String,
    pub labels: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub blocks: Vec<RawBlock>,
    pub range: SourceRange,
    pub type_range: SourceRange,
    pub label_ranges: Vec<SourceRange>,
}

impl RawBlock {
    /// From the block type up to and including the last label
    pub fn def_range(&self) -> SourceRange {
        match self.label_ranges.last() {
            Some(last) => self.type_range.union(last),
            None => self.type_range.clone(),
        }
    }

    /// All labels, or the block type if there are none
    pub fn labels_range(&self) -> SourceRange {
        match (self.label_ranges.first(), self.label_ranges.last()) {
            (Some(first), Some(last)) => first.union(last),
            _ => self.type_range.clone(),
        }
    }

    pub fn file(&self) -> &Path {
        self.range.path()
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }
}

impl serde::Serialize for RawBlock {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.block_type)?;
        if !self.labels.is_empty() {
            map.serialize_entry("labels", &self.labels)?;
        }
        let attributes: indexmap::IndexMap<&str, &Attribute> = self
            .attributes
            .iter()
            .map(|attribute| (attribute.name.as_str(), attribute))
            .collect();
        map.serialize_entry("attributes", &attributes)?;
        if !self.blocks.is_empty() {
            map.serialize_entry("blocks", &self.blocks)?;
        }
        map.end()
    }
}

/// One parsed configuration file
#[derive(Debug, Clone, PartialEq)]
pub struct RawFile {
    pub path: ProjectPath,
    pub attributes: Vec<Attribute>,
    pub blocks: Vec<RawBlock>,
}

impl RawFile {
    /// Parses `text` with the HCL grammar
    ///
    /// A grammar failure is reported as a single syntax error pointing at the offending position.
    pub fn parse(path: ProjectPath, text: &str) -> Result<Self, Error> {
        let index = LineIndex::new(text);
        let source = PathBuf::from(path.as_str());

        let body = hcl_edit::parser::parse_body(text).map_err(|error| {
            let location = error.location();
            let pos = crate::info::Pos::new(location.line(), location.column(), location.offset());
            Error::syntax(SourceRange::new(&source, pos, pos), error.message().to_string())
        })?;

        Ok(Self::from_body(path, &body, &index))
    }

    pub fn from_body(path: ProjectPath, body: &Body, index: &LineIndex) -> Self {
        let source = PathBuf::from(path.as_str());
        let converter = Converter {
            path: &source,
            index,
        };

        let (attributes, blocks) = converter.body(body);
        Self {
            path,
            attributes,
            blocks,
        }
    }

    pub fn dir(&self) -> ProjectPath {
        self.path.dir()
    }
}

struct Converter<'a> {
    path: &'a Path,
    index: &'a LineIndex,
}

impl<'a> Converter<'a> {
    fn body(&self, body: &Body) -> (Vec<Attribute>, Vec<RawBlock>) {
        let mut attributes = Vec::new();
        let mut blocks = Vec::new();

        for structure in body.iter() {
            match structure {
                Structure::Attribute(attribute) => attributes.push(self.attribute(attribute)),
                Structure::Block(block) => blocks.push(self.block(block)),
            }
        }

        (attributes, blocks)
    }

    fn attribute(&self, attribute: &hcl_edit::structure::Attribute) -> Attribute {
        Attribute {
            name: attribute.key.value().as_str().to_owned(),
            expr: attribute.value.clone().into(),
            text: self.index.snippet(attribute.value.span()).to_owned(),
            range: self.index.range(self.path, attribute.span()),
            name_range: self.index.range(self.path, attribute.key.span()),
            expr_range: self.index.range(self.path, attribute.value.span()),
        }
    }

    fn block(&self, block: &hcl_edit::structure::Block) -> RawBlock {
        let (attributes, blocks) = self.body(&block.body);

        RawBlock {
            block_type: block.ident.value().as_str().to_owned(),
            labels: block.labels.iter().map(|label| label.as_str().to_owned()).collect(),
            attributes,
            blocks,
            range: self.index.range(self.path, block.span()),
            type_range: self.index.range(self.path, block.ident.span()),
            label_ranges: block
                .labels
                .iter()
                .map(|label| self.index.range(self.path, label.span()))
                .collect(),
        }
    }
}
