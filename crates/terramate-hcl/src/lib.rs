//! # terramate-hcl - merge engine for terramate configuration
//!
//! Reads the configuration files (`*.tm`, `*.tm.hcl`) of a set of directories, reconciles all occurrences of the
//! same logical block and hands them to per block type handlers that validate them and build a typed
//! [config::ParsedConfig].
//!
//! ```
//! use terramate_hcl::hcl_files;
//! use terramate_hcl::parser::TerramateParser;
//!
//! let files = hcl_files! {
//!   "/stack/a.tm" => "bundle \"app\" {\n  source = \"/bundles/app.tm.yml\"\n  inputs {\n    a = 1\n  }\n}\n",
//!   "/stack/b.tm" => "bundle \"app\" \"inputs\" {\n  b = 2\n}\n"
//! };
//!
//! let mut parser = TerramateParser::new(files);
//! parser.add_directory("/stack").unwrap();
//! let parsed = parser.parse_config().unwrap();
//!
//! let bundle = &parsed.dir("/stack").unwrap().bundles["app"];
//! assert_eq!(bundle.inputs.entries.len(), 2);
//! ```
//!
//! ## Introduction for developers
//!
//! ### Loading files
//!
//! Files are parsed with [hcl_edit] into an owned tree of [ast::RawFile], [ast::RawBlock] and [ast::Attribute]. Each
//! node remembers where it was written ([info::SourceRange]) so every error can point at the offending token.
//! [hcl_files::HclFiles] stores the files by [project::ProjectPath]. A file only has to be valid HCL to be accepted,
//! a syntax error is kept and reported together with all other problems.
//!
//! ### Labels
//!
//! The same block can be written with inline labels or with nested single blocks:
//!
//! ```hcl
//! bundle "x" "environment" "prod" {}
//!
//! bundle "x" {
//!   environment {
//!     prod {}
//!   }
//! }
//! ```
//!
//! [ast::label::normalize] turns both into the [ast::label::LabelPath] `bundle.x.environment.prod`. Whether nesting
//! counts as labels, and how many labels are allowed, is declared per block type ([ast::label::LabelSchema]).
//!
//! ### Merging
//!
//! Each block type follows one of four disciplines ([handler::Discipline]):
//!
//! | discipline | behavior |
//! |---|---|
//! | unmerged | every occurrence is handed over on its own |
//! | merged | one [ast::merged::MergedBlock] per directory, no labels |
//! | merged labels | one [ast::merged::MergedBlock] per label path per directory |
//! | unique | one occurrence in the whole configuration |
//!
//! [raw_config::RawConfig] sorts the blocks of one directory into these buckets. Declaring an attribute twice within
//! one directory is a conflict. Blocks of imported files ([imports]) are merged into the importing directory and must
//! not overlap with it.
//!
//! ### Handlers
//!
//! After merging, [parser::TerramateParser] gives each handler of the [handler::Registry] the blocks of its type. The
//! built-in handlers live in [blocks]. Composite blocks (`bundle`, `component`, `define`) describe their accepted
//! shape as a [schema::Section] tree which [schema::dispatch] walks for them.
//!
//! ### Errors
//!
//! Nothing stops at the first problem: every phase returns all [errors::Error]s it found, merge errors of all
//! directories first.
pub mod ast;
pub mod blocks;
pub mod config;
pub mod errors;
pub mod handler;
pub mod hcl_files;
pub mod imports;
pub mod info;
pub mod parser;
pub mod project;
pub mod raw_config;
pub mod schema;
mod util;
pub mod value;
