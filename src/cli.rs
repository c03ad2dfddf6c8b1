use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::error;

use crate::config::PipelineConfig;
use crate::data::registry::DatasetRegistry;
use crate::error::IngestError;
use crate::logging;
use crate::pipeline::ingest;

/// Ingest a raw dataset: load it, profile its schema and record it in the catalog.
#[derive(Parser, Debug)]
#[command(name = "norp-ingest", version, subcommand_negates_reqs = true)]
pub struct Cli {
    /// Path to the raw data file (CSV, TSV, Excel/ODS, or JSON)
    #[arg(short, long, required = true)]
    pub file: Option<PathBuf>,

    /// Short dataset name, e.g. irs_990_2020
    #[arg(short, long, required = true)]
    pub name: Option<String>,

    /// Directory for the registry and profile documents
    #[arg(long, global = true)]
    pub processed_dir: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print a summary of every registered dataset as JSON
    List,
    /// Print the registry entry of one dataset as JSON
    Show {
        /// Registered dataset name
        name: String,
    },
}

pub fn run_with_args(args: &[String]) -> i32 {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return err.exit_code();
        }
    };
    logging::init(cli.verbose, cli.quiet);

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(err) => return report_failure("configuration", &err),
    };

    match &cli.command {
        Some(Command::List) => handle_list(&config),
        Some(Command::Show { name }) => handle_show(&config, name),
        None => handle_ingest(&config, &cli),
    }
}

fn resolve_config(cli: &Cli) -> Result<PipelineConfig, IngestError> {
    let mut config = PipelineConfig::resolve(cli.config.as_deref())?;
    if let Some(dir) = &cli.processed_dir {
        config.processed_dir = dir.clone();
    }
    Ok(config)
}

fn handle_ingest(config: &PipelineConfig, cli: &Cli) -> i32 {
    let (Some(file), Some(name)) = (&cli.file, &cli.name) else {
        eprintln!("usage: norp-ingest --file <path> --name <dataset-name>");
        return 2;
    };

    match ingest(config, file, name) {
        Ok(report) => {
            println!(
                "ingestion complete: dataset='{}', rows={}, columns={}, profile='{}'",
                report.dataset_name,
                report.profile.row_count,
                report.profile.column_count,
                report.profile_path.display()
            );
            0
        }
        Err(err) => report_failure("ingestion", &err),
    }
}

fn handle_list(config: &PipelineConfig) -> i32 {
    let registry = DatasetRegistry::new(config.registry_path());
    match registry.list() {
        Ok(summaries) => print_json(&summaries),
        Err(err) => report_failure("list", &err),
    }
}

fn handle_show(config: &PipelineConfig, name: &str) -> i32 {
    let registry = DatasetRegistry::new(config.registry_path());
    match registry.get(name) {
        Ok(Some(entry)) => print_json(&entry),
        Ok(None) => {
            error!(dataset = name, "dataset is not registered");
            1
        }
        Err(err) => report_failure("show", &err),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            error!("failed to serialize output: {err}");
            1
        }
    }
}

fn report_failure(stage: &str, err: &IngestError) -> i32 {
    error!(kind = err.kind(), "{stage} failed: {err}");
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn parses_file_and_name() {
        let cli = Cli::try_parse_from(args(&["norp-ingest", "-f", "a.csv", "--name", "a"])).unwrap();
        assert_eq!(cli.file, Some(PathBuf::from("a.csv")));
        assert_eq!(cli.name.as_deref(), Some("a"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn subcommands_do_not_need_file_and_name() {
        let cli = Cli::try_parse_from(args(&["norp-ingest", "show", "a", "-vv"])).unwrap();
        assert_eq!(cli.command, Some(Command::Show { name: "a".to_string() }));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn missing_name_is_a_usage_error() {
        let err = Cli::try_parse_from(args(&["norp-ingest", "--file", "a.csv"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(run_with_args(&args(&["norp-ingest", "--file", "a.csv"])), 2);
    }
}
