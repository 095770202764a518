use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "confstore", about = "Inspect and validate confstore files", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the version and sections of a store file
    Inspect(FileArgs),
    /// Check that a store file parses
    Validate(FileArgs),
    /// Show the file table of a configuration
    Files(FilesArgs),
}

#[derive(Args)]
pub struct FileArgs {
    pub path: PathBuf,
}

#[derive(Args)]
pub struct FilesArgs {
    /// TOML store configuration; defaults apply without one
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_inspect() {
        let cli = Cli::try_parse_from(["confstore", "inspect", "ConfigStore.xml"]).unwrap();
        if let Command::Inspect(args) = cli.command {
            assert_eq!(args.path, PathBuf::from("ConfigStore.xml"));
        } else {
            panic!("wrong command");
        }
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn parse_validate_json() {
        let cli = Cli::try_parse_from(["confstore", "validate", "a.xml", "--format", "json"]).unwrap();
        assert!(matches!(cli.command, Command::Validate(_)));
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn parse_files_with_config() {
        let cli = Cli::try_parse_from(["confstore", "-v", "files", "--config", "store.toml"]).unwrap();
        assert!(cli.verbose);
        if let Command::Files(args) = cli.command {
            assert_eq!(args.config, Some(PathBuf::from("store.toml")));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn inspect_requires_path() {
        assert!(Cli::try_parse_from(["confstore", "inspect"]).is_err());
    }
}
