mod etl;
mod data;
mod errors;

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::error;
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use crate::data::schema::Schema;
use crate::errors::{Error, Result};
use crate::etl::audit::AuditEtl;
use crate::etl::normalize::NormalizationTables;
use crate::etl::osm_to_csv::OsmToCsvEtl;
use crate::etl::validate::OnInvalid;
use crate::etl::Etl;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct UserConfig {
    pub data_path: String,
    pub output_dir: String,
    pub log_level: String,
    pub validate: bool,
    pub on_invalid: OnInvalid,
    pub progress: bool,
    pub normalization: NormalizationTables,
    pub schema: Schema,
}

impl Default for UserConfig {
    fn default() -> Self {
        UserConfig {
            data_path: String::new(),
            output_dir: "output".to_string(),
            log_level: "info".to_string(),
            validate: true,
            on_invalid: OnInvalid::default(),
            progress: false,
            normalization: NormalizationTables::default(),
            schema: Schema::default(),
        }
    }
}

/// Cleans an OpenStreetMap XML extract into CSV tables for a SQL loader.
#[derive(Parser, Debug)]
#[command(name = "osm_clean", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// .osm or .osm.xz file, overrides data_path
    #[arg(short, long, global = true)]
    input: Option<String>,

    /// Output directory, overrides output_dir
    #[arg(short, long, global = true)]
    output: Option<String>,

    /// Do not check rows against the schema
    #[arg(long, global = true)]
    no_validate: bool,

    /// Leave out elements that fail validation instead of stopping
    #[arg(long, global = true)]
    skip_invalid: bool,

    /// Show a progress bar
    #[arg(long, global = true)]
    progress: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Clean nodes and ways and write the CSV tables (default)
    Extract,
    /// Count tag keys and address values, write audit.json
    Audit,
}

fn load_user_config(args: &Cli) -> Result<UserConfig> {
    let mut config: UserConfig = match &args.config {
        Some(path) => {
            let file = File::open(path)
                .map_err(|err| Error::config(format!("could not open {}: {}", path.display(), err)))?;
            serde_json::from_reader(BufReader::new(file))?
        }
        None => UserConfig::default(),
    };

    if let Some(input) = &args.input {
        config.data_path = input.clone();
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if args.no_validate {
        config.validate = false;
    }
    if args.skip_invalid {
        config.on_invalid = OnInvalid::Skip;
    }
    if args.progress {
        config.progress = true;
    }

    if config.data_path.is_empty() {
        return Err(Error::config("no input file, pass --input or set data_path"));
    }
    Ok(config)
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn extract_command(user_config: &UserConfig) -> Result<()> {
    let mut etl = OsmToCsvEtl::new(user_config)?;
    let result = etl.process();
    if result.is_err() {
        etl.stats().log_summary("Tables written before the run stopped");
    }
    result
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let user_config = load_user_config(&cli)?;
    setup_logging(&user_config.log_level);

    match cli.command.unwrap_or(Commands::Extract) {
        Commands::Extract => extract_command(&user_config),
        Commands::Audit => AuditEtl::new(&user_config).process(),
    }
}

fn main() {
    if let Err(err) = run() {
        error!(kind = format!("{:?}", err.kind).as_str(), err = err.message.as_str(); "Run aborted");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn parse(list: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("osm_clean").chain(list.iter().copied()))
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_command_and_flags() {
        let cli = parse(&["audit", "--input", "map.osm", "--skip-invalid"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Audit));
        assert_eq!(cli.input.as_deref(), Some("map.osm"));
        assert!(cli.skip_invalid);
        assert!(!cli.no_validate);

        let cli = parse(&["--progress", "-i", "map.osm.xz"]).unwrap();
        assert_eq!(cli.command, None);
        assert!(cli.progress);

        assert!(parse(&["--input"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
        assert!(parse(&["render"]).is_err());
    }

    #[test]
    fn config_file_is_overridden_by_flags() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        fs::write(
            &config_path,
            r#"{
                "data_path": "rochester.osm",
                "output_dir": "tables",
                "on_invalid": "skip",
                "normalization": {
                    "street_abbreviations": {"Ln": "Lane"}
                }
            }"#,
        )
        .unwrap();

        let parsed = parse(&[
            "extract",
            "--config",
            config_path.to_str().unwrap(),
            "--output",
            "elsewhere",
            "--no-validate",
        ])
        .unwrap();
        let config = load_user_config(&parsed).unwrap();

        assert_eq!(config.data_path, "rochester.osm");
        assert_eq!(config.output_dir, "elsewhere");
        assert_eq!(config.on_invalid, OnInvalid::Skip);
        assert!(!config.validate);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.normalization.street_abbreviations["Ln"], "Lane");
        assert!(config.normalization.city_corrections.contains_key("Rochestet"));
        assert_eq!(config.schema, Schema::default());
    }

    #[test]
    fn input_is_required() {
        let parsed = parse(&["extract"]).unwrap();
        let err = load_user_config(&parsed).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::Config);
    }
}
