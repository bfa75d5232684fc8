mod cli;

use terramate_hcl::config::ParsedConfig;
use terramate_hcl::errors::Errors;
use terramate_hcl::parser::{ParserOptions, TerramateParser};

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("TMHCL_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let options = ParserOptions {
        strict: !cli.parser.non_strict,
        experiments: cli.parser.experiments,
    };

    let command_result = match cli.command {
        cli::Command::Check(dirs) => check(options, dirs),
        cli::Command::Dump(dump) => dump_config(options, dump),
    };

    match command_result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            for error in e.chain() {
                eprintln!("{error}")
            }
            std::process::exit(2);
        }
    }
}

/// Returns whether the configuration is valid
fn check(options: ParserOptions, cli: cli::DirsArgs) -> anyhow::Result<bool> {
    match parse(options, &cli)? {
        Ok(_) => Ok(true),
        Err(errors) => {
            report(&errors);
            Ok(false)
        }
    }
}

fn dump_config(options: ParserOptions, cli: cli::DumpCommand) -> anyhow::Result<bool> {
    let parsed = match parse(options, &cli.dirs)? {
        Ok(parsed) => parsed,
        Err(errors) => {
            report(&errors);
            return Ok(false);
        }
    };

    match cli.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), &parsed)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), &parsed)?,
    };

    Ok(true)
}

fn parse(options: ParserOptions, cli: &cli::DirsArgs) -> anyhow::Result<Result<ParsedConfig, Errors>> {
    let mut parser = TerramateParser::on_disk(std::env::current_dir()?, options);
    for dir in &cli.dirs {
        parser.add_directory(dir)?;
    }

    Ok(parser.parse_config())
}

fn report(errors: &Errors) {
    for error in errors {
        eprintln!("{error}");
        let mut cause = error.cause.as_deref();
        while let Some(error) = cause {
            eprintln!("  caused by: {error}");
            cause = error.cause.as_deref();
        }
    }
    eprintln!("{} error(s) found", errors.len());
}
