//! `vendor` block
//!
//! ```hcl
//! vendor {
//!   dir = "/modules"
//!   manifest {
//!     default {
//!       files = ["/main.tf", "/modules/**"]
//!     }
//!   }
//! }
//! ```
//!
//! Configures vendoring for the whole project, so it may appear only once across all directories.
use crate::ast::RawBlock;
use crate::errors::{Error, Errors};
use crate::handler::{BlockHandler, ParseContext, UniqueHandler};
use crate::schema::{check_raw_attributes, check_raw_sub_blocks, expect_labels};
use crate::util::{string_list_literal, string_literal};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct VendorConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Manifest>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Manifest {
    /// file patterns of the default manifest
    pub files: Vec<String>,
}

pub struct VendorHandler;

impl BlockHandler for VendorHandler {
    fn name(&self) -> &str {
        "vendor"
    }
}

impl UniqueHandler for VendorHandler {
    fn parse(&self, ctx: &mut ParseContext<'_>, block: &RawBlock) -> Result<(), Errors> {
        let mut errors = Errors::new();
        let mut vendor = VendorConfig::default();

        errors.collect_one(expect_labels(block, 0));
        errors.append(check_raw_attributes(block, "vendor", &["dir"]));
        errors.append(check_raw_sub_blocks(block, "vendor", &["manifest"]));

        if let Some(dir) = block.attribute("dir") {
            vendor.dir = errors.collect_one(string_literal(dir));
            if let Some(dir) = &vendor.dir {
                if !dir.starts_with('/') {
                    errors.log(Error::schema(
                        dir_range(block),
                        format!("vendor.dir must be an absolute project path, got {dir:?}"),
                    ));
                }
            }
        }

        let manifests: Vec<&RawBlock> = block.blocks.iter().filter(|child| child.block_type == "manifest").collect();
        if let [_, extra, ..] = manifests.as_slice() {
            errors.log(Error::schema(extra.def_range(), "multiple vendor.manifest blocks"));
        }

        if let Some(manifest) = manifests.first() {
            vendor.manifest = errors.collect(parse_manifest(manifest));
        }

        ctx.parsed().vendor = Some(vendor);
        errors.into_result()
    }
}

fn dir_range(block: &RawBlock) -> Option<crate::info::SourceRange> {
    block.attribute("dir").map(|attribute| attribute.expr_range.clone())
}

fn parse_manifest(block: &RawBlock) -> Result<Manifest, Errors> {
    let mut errors = Errors::new();
    let mut manifest = Manifest::default();

    errors.collect_one(expect_labels(block, 0));
    errors.append(check_raw_attributes(block, "vendor.manifest", &[]));
    errors.append(check_raw_sub_blocks(block, "vendor.manifest", &["default"]));

    for default in block.blocks.iter().filter(|child| child.block_type == "default") {
        errors.collect_one(expect_labels(default, 0));
        errors.append(check_raw_attributes(default, "vendor.manifest.default", &["files"]));
        errors.append(check_raw_sub_blocks(default, "vendor.manifest.default", &[]));

        if let Some(files) = default.attribute("files") {
            if let Some(files) = errors.collect_one(string_list_literal(files)) {
                manifest.files.extend(files);
            }
        }
    }

    errors.into_result_with(manifest)
}

#[cfg(test)]
mod test {
    use crate::blocks::test::{messages, parse_dirs, parse_root};
    use crate::errors::ErrorKind;
    use crate::hcl_files;
    use pretty_assertions::assert_eq;

    #[test]
    fn vendor_config() {
        let parsed = parse_root(hcl_files!(
            "vendor {\n  dir = \"/vendor\"\n  manifest {\n    default {\n      files = [\"/a\", \"/b/**\"]\n    }\n  }\n}\n"
        ))
        .unwrap();

        let vendor = parsed.vendor.unwrap();
        assert_eq!(vendor.dir.as_deref(), Some("/vendor"));
        assert_eq!(vendor.manifest.unwrap().files, vec!["/a", "/b/**"]);
    }

    #[test]
    fn relative_dir() {
        let errors = parse_root(hcl_files!("vendor {\n  dir = \"vendor\"\n}\n")).unwrap_err();
        assert_eq!(
            messages(&errors),
            vec![r#"vendor.dir must be an absolute project path, got "vendor""#]
        );
    }

    #[test]
    fn unique_across_directories() {
        let errors = parse_dirs(
            hcl_files! {
                "/cfg.tm" => "vendor {\n  dir = \"/a\"\n}\n",
                "/stack/cfg.tm" => "vendor {\n  dir = \"/b\"\n}\n"
            },
            &["/", "/stack"],
        )
        .unwrap_err();

        assert_eq!(errors.kinds(), vec![ErrorKind::MergeConflict]);
        assert_eq!(
            errors.first().unwrap().range.as_ref().unwrap().path().to_str(),
            Some("/stack/cfg.tm")
        );
    }
}
