//! End to end behavior of the parser over in-memory and on-disk configurations

use pretty_assertions::assert_eq;
use terramate_hcl::ast::label::LabelPath;
use terramate_hcl::ast::merged::ConflictPolicy;
use terramate_hcl::ast::RawFile;
use terramate_hcl::config::ParsedConfig;
use terramate_hcl::errors::{ErrorKind, Errors};
use terramate_hcl::handler::Registry;
use terramate_hcl::hcl_files;
use terramate_hcl::hcl_files::HclFiles;
use terramate_hcl::parser::{ParserOptions, TerramateParser};
use terramate_hcl::project::ProjectPath;
use terramate_hcl::raw_config::RawConfig;
use terramate_hcl::value::Value;

fn parse(files: HclFiles, options: ParserOptions, dirs: &[&str]) -> Result<ParsedConfig, Errors> {
    let mut parser = TerramateParser::with_options(files, options);
    for dir in dirs {
        parser.add_directory(dir).unwrap();
    }
    parser.parse_config()
}

fn merge(texts: &[&str]) -> Result<RawConfig, Errors> {
    let registry = Registry::default();
    let mut config = RawConfig::new();
    let mut errors = Errors::new();
    for (idx, text) in texts.iter().enumerate() {
        let path = ProjectPath::new(&format!("/f{idx}.tm")).unwrap();
        let file = RawFile::parse(path, text).unwrap();
        errors.collect(config.merge_file(&file, &registry, ConflictPolicy::SameDirectory));
    }
    errors.into_result_with(config)
}

/// attribute names and values of one merged entry, provenance left out
fn content(config: &RawConfig, path: &LabelPath) -> Vec<(String, Value)> {
    let block = &config.merged_labels[path];
    assert!(block.sub_blocks.is_empty());
    block
        .attributes
        .values()
        .map(|attribute| (attribute.name.clone(), attribute.value()))
        .collect()
}

#[test]
fn bundle_round_trip() {
    let parsed = parse(
        hcl_files!("bundle \"x\" {\n  source = \"s\"\n  inputs {\n    a = 1\n  }\n}\nbundle \"x\" \"inputs\" {\n  b = 2\n}\n"),
        ParserOptions::default(),
        &["/"],
    )
    .unwrap();

    let bundle = &parsed.root().unwrap().bundles["x"];
    assert_eq!(bundle.source.as_ref().unwrap().value(), Value::String("s".into()));

    let inputs: Vec<(&str, Value)> = bundle
        .inputs
        .entries
        .iter()
        .map(|(name, attribute)| (name.as_str(), attribute.value()))
        .collect();
    assert_eq!(inputs, vec![("a", Value::Integer(1)), ("b", Value::Integer(2))]);
}

#[test]
fn inline_nested_and_mixed_labels_merge_the_same() {
    let path = LabelPath::new("bundle", ["x", "environment", "prod"]);
    let forms = [
        "bundle \"x\" \"environment\" \"prod\" {\n  source = \"s\"\n}\n",
        "bundle \"x\" {\n  environment {\n    prod {\n      source = \"s\"\n    }\n  }\n}\n",
        "bundle \"x\" \"environment\" {\n  prod {\n    source = \"s\"\n  }\n}\n",
    ];

    let expected = vec![("source".to_string(), Value::String("s".into()))];
    for form in forms {
        let config = merge(&[form]).unwrap();
        assert_eq!(config.merged_labels.keys().collect::<Vec<_>>(), vec![&path], "{form}");
        assert_eq!(content(&config, &path), expected, "{form}");
    }

    // below a block with attributes, children are keyed the same way
    let inline = "bundle \"x\" {\n  source = \"b\"\n  environment \"prod\" {\n    source = \"s\"\n  }\n}\n";
    let nested = "bundle \"x\" {\n  source = \"b\"\n  environment {\n    prod {\n      source = \"s\"\n    }\n  }\n}\n";
    let environment = LabelPath::new("environment", ["prod"]);

    for form in [inline, nested] {
        let config = merge(&[form]).unwrap();
        let bundle = &config.merged_labels[&LabelPath::new("bundle", ["x"])];
        assert_eq!(bundle.sub_blocks.keys().collect::<Vec<_>>(), vec![&environment], "{form}");

        let prod = &bundle.sub_blocks[&environment];
        assert!(prod.sub_blocks.is_empty(), "{form}");
        assert_eq!(prod.attributes["source"].value(), Value::String("s".into()), "{form}");

        let parsed = parse(hcl_files!(form), ParserOptions::default(), &["/"]).unwrap();
        let built = &parsed.root().unwrap().bundles["x"].environments["prod"];
        assert_eq!(built.source.as_ref().unwrap().value(), Value::String("s".into()), "{form}");
    }

    // one key for both spellings, so declaring `source` in each is a plain redeclaration
    let errors = merge(&[inline, nested]).unwrap_err();
    assert_eq!(errors.kinds(), vec![ErrorKind::MergeConflict]);
}

#[test]
fn merge_order_does_not_change_the_result() {
    let a = "globals \"obj\" {\n  a = 1\n}\n";
    let b = "globals \"obj\" {\n  b = 2\n}\n";
    let c = "globals {\n  obj {\n    c = 3\n  }\n}\nglobals \"obj\" {\n  c2 = 4\n}\n";
    let path = LabelPath::new("globals", ["obj"]);

    let sorted = |config: RawConfig| {
        let mut content = content(&config, &path);
        content.sort_by(|left, right| left.0.cmp(&right.0));
        content
    };

    assert_eq!(sorted(merge(&[b, a]).unwrap()), sorted(merge(&[a, b]).unwrap()));

    // nesting is not label sugar for globals, so `c` lands in the unlabeled entry
    let with_c = merge(&[c, a, b]).unwrap();
    assert_eq!(
        sorted(with_c.clone()).iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
        vec!["a", "b", "c2"]
    );
    assert!(with_c.merged_labels.contains_key(&LabelPath::unlabeled("globals")));
}

#[test]
fn redeclaration_conflicts_in_any_order_and_form() {
    let inline = "bundle \"x\" \"inputs\" {\n  a = 1\n}\n";
    let nested = "bundle \"x\" {\n  inputs {\n    a = 2\n  }\n}\n";

    for files in [[inline, nested], [nested, inline]] {
        let errors = merge(&files).unwrap_err();
        assert_eq!(errors.kinds(), vec![ErrorKind::MergeConflict]);
    }
}

#[test]
fn import_cycle_names_the_closing_edge() {
    let errors = parse(
        hcl_files! {
            "/stack/cfg.tm" => "import {\n  source = \"/a/a.tm\"\n}\n",
            "/a/a.tm" => "import {\n  source = \"../b/b.tm\"\n}\n",
            "/b/b.tm" => "import {\n  source = \"/c/c.tm\"\n}\n",
            "/c/c.tm" => "import {\n  source = \"/a/a.tm\"\n}\n"
        },
        ParserOptions::default(),
        &["/stack"],
    )
    .unwrap_err();

    assert_eq!(errors.kinds(), vec![ErrorKind::Import]);
    let error = errors.first().unwrap();
    assert!(error.message.ends_with("/c/c.tm -> /a/a.tm"), "{}", error.message);
    assert_eq!(error.range.as_ref().unwrap().path().to_str(), Some("/c/c.tm"));
}

#[test]
fn imported_blocks_join_the_directory() {
    let parsed = parse(
        hcl_files! {
            "/stack/cfg.tm" => "import {\n  source = \"/modules/common.tm\"\n}\nglobals {\n  a = 1\n}\nstack {}\n",
            "/modules/common.tm" => "globals {\n  b = 2\n}\ngenerate_file \"a.txt\" {\n  content = \"a\"\n}\n"
        },
        ParserOptions::default(),
        &["/stack"],
    )
    .unwrap();

    let stack = parsed.dir("/stack").unwrap();
    assert_eq!(stack.globals[0].attributes.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(stack.generate_files[0].label, "a.txt");
    assert!(parsed.dir("/modules").is_none());
}

#[test]
fn imported_content_must_not_overlap() {
    let errors = parse(
        hcl_files! {
            "/stack/cfg.tm" => "import {\n  source = \"/modules/common.tm\"\n}\nglobals {\n  a = 1\n}\n",
            "/modules/common.tm" => "globals {\n  a = 2\n}\n"
        },
        ParserOptions::default(),
        &["/stack"],
    )
    .unwrap_err();

    assert_eq!(errors.kinds(), vec![ErrorKind::Import]);
    assert_eq!(
        errors.first().unwrap().cause.as_ref().unwrap().kind,
        ErrorKind::MergeConflict
    );
}

#[test]
fn unique_blocks_across_directories() {
    let errors = parse(
        hcl_files! {
            "/a/cfg.tm" => "vendor {\n  dir = \"/vendor\"\n}\n",
            "/b/cfg.tm" => "vendor {\n  dir = \"/vendor\"\n}\n"
        },
        ParserOptions::default(),
        &["/a", "/b"],
    )
    .unwrap_err();
    assert_eq!(errors.kinds(), vec![ErrorKind::MergeConflict]);
}

#[test]
fn one_imported_unique_block_shared_by_directories() {
    let parsed = parse(
        hcl_files! {
            "/a/cfg.tm" => "import {\n  source = \"/m/vendor.tm\"\n}\n",
            "/b/cfg.tm" => "import {\n  source = \"/m/vendor.tm\"\n}\n",
            "/m/vendor.tm" => "vendor {\n  dir = \"/vendor\"\n}\n"
        },
        ParserOptions::default(),
        &["/a", "/b"],
    )
    .unwrap();

    assert_eq!(parsed.vendor.unwrap().dir.as_deref(), Some("/vendor"));
}

#[test]
fn failed_imports_do_not_drop_the_successful_ones() {
    let errors = parse(
        hcl_files! {
            "/stack/cfg.tm" => r#"
import {
  source = "/m/src.tm"
}
import {
  source = "/m/missing.tm"
}
bundle "x" "inputs" {
  a = 1
}
"#,
            "/m/src.tm" => "bundle \"x\" {\n  source = \"s\"\n}\n"
        },
        ParserOptions::default(),
        &["/stack"],
    )
    .unwrap_err();

    assert_eq!(errors.kinds(), vec![ErrorKind::Import]);
    assert_eq!(errors.first().unwrap().message, "import source /m/missing.tm not found");
}

#[test]
fn import_patterns() {
    let parsed = parse(
        hcl_files! {
            "/stack/cfg.tm" => "import {\n  source = \"/modules/*.tm\"\n}\nstack {}\n",
            "/modules/b.tm" => "globals {\n  b = 2\n}\n",
            "/modules/a.tm" => "globals {\n  a = 1\n}\n"
        },
        ParserOptions::default(),
        &["/stack"],
    )
    .unwrap();

    let stack = parsed.dir("/stack").unwrap();
    assert_eq!(stack.globals[0].attributes.keys().collect::<Vec<_>>(), vec!["a", "b"]);
}

#[test]
fn unmerged_blocks_never_conflict() {
    let parsed = parse(
        hcl_files! {
            "/a.tm" => "assert {\n  assertion = true\n  message = \"a\"\n}\n",
            "/b.tm" => "assert {\n  assertion = true\n  message = \"a\"\n}\n"
        },
        ParserOptions::default(),
        &["/"],
    )
    .unwrap();
    assert_eq!(parsed.root().unwrap().asserts.len(), 2);
}

#[test]
fn strict_mode_only_changes_unknown_blocks() {
    let known = "stack {\n  name = \"s\"\n}\nglobals {\n  a = 1\n}\n";
    let with_unknown = format!("{known}unknown_block {{\n  x = 1\n}}\n");

    let strict = parse(hcl_files!(known), ParserOptions::default(), &["/"]).unwrap();
    let relaxed = parse(hcl_files!(with_unknown.as_str()), ParserOptions::non_strict(), &["/"]).unwrap();
    assert_eq!(
        serde_json::to_value(&strict).unwrap(),
        serde_json::to_value(&relaxed).unwrap()
    );

    let errors = parse(hcl_files!(with_unknown.as_str()), ParserOptions::default(), &["/"]).unwrap_err();
    assert_eq!(errors.kinds(), vec![ErrorKind::Schema]);
}

#[test]
fn all_errors_are_reported() {
    let errors = parse(
        hcl_files! {
            "/a/cfg.tm" => "stak {}\n",
            "/b/cfg.tm" => "globals {\n  a = 1\n}\n",
            "/b/more.tm" => "globals {\n  a = 2\n}\n",
            "/c/cfg.tm" => "stack {"
        },
        ParserOptions::default(),
        &["/a", "/b", "/c"],
    )
    .unwrap_err();

    assert_eq!(
        errors.kinds(),
        vec![ErrorKind::MergeConflict, ErrorKind::Syntax, ErrorKind::Schema]
    );
}

#[test]
fn error_rendering() {
    let errors = parse(
        hcl_files! {
            "/cfg.tm" => "stak {}\nvendor {}\n",
            "/stack/cfg.tm" => "vendor {}\n"
        },
        ParserOptions::default(),
        &["/", "/stack"],
    )
    .unwrap_err();

    let rendered: Vec<String> = errors.iter().map(ToString::to_string).collect();
    insta::assert_snapshot!(rendered.join("\n"), @r###"
    /cfg.tm:1,1-1,5: terramate schema error: unrecognized block "stak", did you mean "stack"?
    /stack/cfg.tm:1,1-1,7: merge conflict: multiple "vendor" blocks, first one declared at /cfg.tm:2,1-2,7
    "###);
}

#[test]
#[should_panic(expected = "already parsed")]
fn parsing_twice_panics() {
    let mut parser = TerramateParser::new(hcl_files!("stack {}"));
    parser.add_directory("/").unwrap();
    parser.parse_config().unwrap();
    let _ = parser.parse_config();
}

#[test]
fn configuration_on_disk() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("modules")).unwrap();
    std::fs::create_dir_all(root.path().join("stacks/app")).unwrap();
    std::fs::write(
        root.path().join("terramate.tm.hcl"),
        "terramate {\n  config {\n    experiments = [\"scripts\"]\n  }\n}\n",
    )
    .unwrap();
    std::fs::write(
        root.path().join("modules/scripts.tm"),
        "script \"deploy\" {\n  job {\n    command = [\"terraform\", \"apply\"]\n  }\n}\n",
    )
    .unwrap();
    std::fs::write(
        root.path().join("stacks/app/stack.tm"),
        "stack {\n  name = \"app\"\n}\nimport {\n  source = \"/modules/*.tm\"\n}\n",
    )
    .unwrap();

    let mut parser = TerramateParser::on_disk(root.path(), ParserOptions::default());
    parser.add_directory("/").unwrap();
    parser.add_directory("/stacks/app").unwrap();
    let parsed = parser.parse_config().unwrap();

    assert_eq!(parsed.experiments, vec!["scripts"]);
    let app = parsed.dir("/stacks/app").unwrap();
    assert_eq!(app.stack.as_ref().unwrap().name.as_ref().unwrap().value(), Value::String("app".into()));
    assert_eq!(app.scripts[0].labels, vec!["deploy"]);
}
