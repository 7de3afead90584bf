use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use flamingo_ingest::{IngestionEngine, QueryLayer};
use flamingo_server::{FlamingoServer, ServerConfig, StorageConfig};
use flamingo_store::{ProjectRegistry, SqliteStore, Storage};
use flamingo_types::{CandidateItem, Item, NewProject, Project, ProjectPatch, Step};
use serde::Serialize;

use crate::cli::*;

const DEFAULT_DB: &str = "flamingo.db";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args, cli.db),
        command => {
            let path = cli.db.unwrap_or_else(|| PathBuf::from(DEFAULT_DB));
            let local = Local::open(&path, cli.format)?;
            local.run(command)
        }
    }
}

fn serve_config(args: &ServeArgs, db: Option<PathBuf>) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if args.memory {
        config.storage = StorageConfig::Memory;
    } else if let Some(path) = db {
        config.storage = StorageConfig::Sqlite { path };
    }
    Ok(config)
}

fn cmd_serve(args: ServeArgs, db: Option<PathBuf>) -> anyhow::Result<()> {
    let config = serve_config(&args, db)?;
    let backend = match &config.storage {
        StorageConfig::Memory => "memory".to_string(),
        StorageConfig::Sqlite { path } => path.display().to_string(),
    };
    let server = FlamingoServer::new(config)?;
    println!(
        "{} Flamingo server on {} (storage: {})",
        "✓".green().bold(),
        server.config().bind_addr.to_string().bold(),
        backend
    );
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(server.serve())?;
    Ok(())
}

/// Commands that work directly against a local database.
struct Local {
    storage: Arc<dyn Storage>,
    engine: IngestionEngine,
    queries: QueryLayer,
    format: OutputFormat,
}

impl Local {
    fn open(path: &Path, format: OutputFormat) -> anyhow::Result<Self> {
        tracing::debug!(path = %path.display(), "opening local database");
        let store = SqliteStore::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;
        Ok(Self::with_storage(Arc::new(store), format))
    }

    fn with_storage(storage: Arc<dyn Storage>, format: OutputFormat) -> Self {
        Self {
            engine: IngestionEngine::new(Arc::clone(&storage)),
            queries: QueryLayer::new(Arc::clone(&storage)),
            storage,
            format,
        }
    }

    fn run(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Serve(_) => anyhow::bail!("serve is not a local command"),
            Command::Project(args) => self.cmd_project(args.action),
            Command::Ingest(args) => self.cmd_ingest(args),
            Command::Known(args) => self.cmd_known(args),
            Command::Unknown(args) => self.cmd_unknown(args),
            Command::Items(args) => self.cmd_items(args),
        }
    }

    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn cmd_project(&self, action: ProjectAction) -> anyhow::Result<()> {
        match action {
            ProjectAction::List => {
                let projects = self.storage.list_projects()?;
                if self.json() {
                    return print_json(&projects);
                }
                if projects.is_empty() {
                    println!("No projects.");
                }
                for project in &projects {
                    print_project(project);
                }
            }
            ProjectAction::Create {
                name,
                description,
                data,
            } => {
                let mut new = NewProject::new(name);
                new.description = description;
                if let Some(raw) = data {
                    new.data = Some(serde_json::from_str(&raw).context("--data must be valid JSON")?);
                }
                let project = self.storage.create_project(&new)?;
                if self.json() {
                    return print_json(&project);
                }
                println!(
                    "{} Created project {} (id {})",
                    "✓".green().bold(),
                    project.name.bold(),
                    project.id.to_string().yellow()
                );
            }
            ProjectAction::Show { id } => {
                let project = self.storage.require_project(id)?;
                if self.json() {
                    return print_json(&project);
                }
                print_project(&project);
                if let Some(data) = &project.data {
                    println!("      data: {data}");
                }
                println!("      created {}, modified {}", project.created, project.modified);
            }
            ProjectAction::Rename { id, name } => {
                let project = self.storage.update_project(id, &ProjectPatch::rename(name))?;
                if self.json() {
                    return print_json(&project);
                }
                println!("{} Renamed project {} to {}", "✓".green(), id, project.name.bold());
            }
            ProjectAction::Delete { id } => {
                let removed = self.engine.delete_project(id)?;
                if self.json() {
                    return print_json(&serde_json::json!({ "message": format!("Deleted project {id}") }));
                }
                println!("{} Deleted project {} ({} items)", "✓".green(), id, removed);
            }
        }
        Ok(())
    }

    fn cmd_ingest(&self, args: IngestArgs) -> anyhow::Result<()> {
        let candidates = match &args.file {
            Some(path) => read_candidates(path)?,
            None => args.keys.into_iter().map(CandidateItem::new).collect(),
        };
        let report = if args.strict {
            self.engine.ingest_strict(args.project, candidates)?
        } else {
            self.engine.ingest(args.project, candidates)?
        };
        if self.json() {
            return print_json(&report);
        }
        println!(
            "{} Batch {} on project {}: {} inserted, {} skipped",
            "✓".green().bold(),
            report.step.to_string().yellow(),
            report.project,
            report.inserted_count().to_string().green(),
            report.skipped_count()
        );
        for key in &report.skipped {
            println!("  {} {}", "skipped:".dimmed(), key);
        }
        Ok(())
    }

    fn cmd_known(&self, args: KeysArgs) -> anyhow::Result<()> {
        let items = self.queries.known(args.project, &args.keys)?;
        if self.json() {
            return print_json(&items);
        }
        print_items(&items);
        Ok(())
    }

    fn cmd_unknown(&self, args: KeysArgs) -> anyhow::Result<()> {
        let unknown = self.queries.unknown(args.project, &args.keys)?;
        if self.json() {
            return print_json(&unknown);
        }
        if unknown.is_empty() {
            println!("{} All keys are known.", "✓".green());
        }
        for key in &unknown {
            println!("  {} {}", "unknown:".cyan(), key);
        }
        Ok(())
    }

    fn cmd_items(&self, args: ItemsArgs) -> anyhow::Result<()> {
        let items = match args.step {
            Some(step) => self.queries.batch(args.project, Step::new(step))?,
            None => self.queries.items(args.project)?,
        };
        if self.json() {
            return print_json(&items);
        }
        print_items(&items);
        Ok(())
    }
}

fn read_candidates(path: &Path) -> anyhow::Result<Vec<CandidateItem>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing candidates in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_project(project: &Project) {
    let description = project.description.as_deref().unwrap_or("");
    println!(
        "{:>5}  {}  step {}  {}",
        project.id.to_string().yellow(),
        project.name.bold(),
        project.step,
        description.dimmed()
    );
}

fn print_items(items: &[Item]) {
    if items.is_empty() {
        println!("No items.");
    }
    for item in items {
        println!(
            "{:>7}  {}  step {}",
            item.id.to_string().dimmed(),
            item.key.bold(),
            item.step.to_string().yellow()
        );
    }
}
