use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use flamingo_types::ProjectId;

#[derive(Parser)]
#[command(
    name = "flamingo",
    about = "Flamingo: projects and step-grouped item ingestion",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// SQLite database to operate on [default: flamingo.db]
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// List, create, rename, or delete projects
    Project(ProjectArgs),
    /// Ingest one batch of items into a project
    Ingest(IngestArgs),
    /// Show the project's items for the given keys
    Known(KeysArgs),
    /// Show the given keys the project does not hold yet
    Unknown(KeysArgs),
    /// List a project's items
    Items(ItemsArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Address to listen on, overrides the config file
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Keep everything in memory instead of SQLite, ignoring `--db`
    #[arg(long)]
    pub memory: bool,
}

#[derive(Args)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub action: ProjectAction,
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// List all projects
    List,
    /// Create a project
    Create {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Arbitrary JSON payload
        #[arg(long)]
        data: Option<String>,
    },
    /// Show one project
    Show { id: ProjectId },
    /// Rename a project
    Rename { id: ProjectId, name: String },
    /// Delete a project and all of its items
    Delete { id: ProjectId },
}

#[derive(Args)]
pub struct IngestArgs {
    pub project: ProjectId,
    /// Keys to ingest without payload
    pub keys: Vec<String>,
    /// JSON file holding an array of `{"key": ..., "data": ...}` candidates
    #[arg(short, long, conflicts_with = "keys")]
    pub file: Option<PathBuf>,
    /// Fail the whole batch if any key is already taken
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args)]
pub struct KeysArgs {
    pub project: ProjectId,
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(Args)]
pub struct ItemsArgs {
    pub project: ProjectId,
    /// Only items of this batch
    #[arg(long)]
    pub step: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ingest_keys() {
        let cli = Cli::try_parse_from(["flamingo", "ingest", "7", "a", "b", "--format", "json"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::Ingest(args) => {
                assert_eq!(args.project, ProjectId::new(7));
                assert_eq!(args.keys, vec!["a", "b"]);
                assert!(args.file.is_none());
                assert!(!args.strict);
            }
            _ => panic!("expected ingest"),
        }
    }

    #[test]
    fn ingest_file_conflicts_with_keys() {
        assert!(Cli::try_parse_from(["flamingo", "ingest", "1", "a", "--file", "x.json"]).is_err());
    }

    #[test]
    fn unknown_requires_keys() {
        assert!(Cli::try_parse_from(["flamingo", "unknown", "1"]).is_err());
    }

    #[test]
    fn rejects_non_numeric_project_id() {
        assert!(Cli::try_parse_from(["flamingo", "project", "show", "abc"]).is_err());
    }

    #[test]
    fn global_db_after_subcommand() {
        let cli = Cli::try_parse_from(["flamingo", "project", "list", "--db", "/tmp/f.db", "-v"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/f.db")));
        assert!(cli.verbose);
    }
}
