mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, eyre, Result, WrapErr};
use studypath_core::config::NEW_ROADMAP_ID;
use studypath_core::llm::{Provider, LLM};
use studypath_core::navigation::LearningSession;
use studypath_core::{
    logging, Config, FileStore, LlmRoadmapGenerator, MixedResourceFetcher, RoadmapManager,
    RoadmapRepository,
};

type Session<'a> = LearningSession<'a, FileStore, MixedResourceFetcher>;
type Manager = RoadmapManager<FileStore, LlmRoadmapGenerator<Box<dyn LLM>>>;

#[derive(Parser)]
#[command(name = "studypath", version)]
#[command(about = "Generate learning roadmaps with AI and work through them", long_about = None)]
struct Cli {
    /// Log level for StudyPath crates (overrides config)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory holding saved roadmaps (overrides config)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a roadmap for a topic
    New {
        /// What you want to learn
        #[arg(required = true)]
        topic: Vec<String>,
    },
    /// List saved roadmaps
    List {
        /// Print the metadata list as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a roadmap as a tree with progress
    Show { id: String },
    /// Resume a roadmap at its saved position ("new" with --topic generates one)
    Open {
        id: String,
        #[arg(long)]
        topic: Option<String>,
    },
    /// Jump to a topic
    Select { id: String, node: String },
    /// Move to the next resource or topic
    Next { id: String },
    /// Move to the previous resource or topic
    Prev { id: String },
    /// Toggle completion of the current resource, or of RESOURCE in the current topic
    Done { id: String, resource: Option<String> },
    /// Write a roadmap as JSON
    Export {
        id: String,
        /// Output file ("-" for stdout); defaults to <topic>-roadmap.json
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Add a roadmap from a JSON file
    Import { file: PathBuf },
    /// Delete a roadmap
    Delete { id: String },
    /// Print a default configuration file
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let mut config = Config::load().wrap_err("failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }
    logging::init_tracing(&config.logging.level);

    let repository = RoadmapRepository::with_config(
        FileStore::with_config(&config.storage),
        config.storage.clone(),
    );
    let fetcher = MixedResourceFetcher::from_config(&config.resources);

    match cli.command {
        Commands::New { topic } => {
            let manager = build_manager(&config, repository)?;
            let roadmap = generate(&manager, NEW_ROADMAP_ID, &topic.join(" ")).await?;
            println!("Created roadmap {}", roadmap.id);
            println!();
            render::print_outline(&roadmap);
        }
        Commands::List { json } => {
            let entries = repository.list_metadata()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                render::print_list(&entries);
            }
        }
        Commands::Show { id } => {
            let roadmap = repository
                .get(&id)?
                .ok_or_else(|| eyre!("Roadmap not found: {id}"))?;
            render::print_outline(&roadmap);
        }
        Commands::Open { id, topic } if id == NEW_ROADMAP_ID => {
            let topic = topic.ok_or_else(|| eyre!("--topic is required with 'open new'"))?;
            let manager = build_manager(&config, repository)?;
            let roadmap = generate(&manager, &id, &topic).await?;
            println!("Created roadmap {}", roadmap.id);
            let session = open_session(manager.repository(), &fetcher, &roadmap.id).await?;
            print_session(&session);
        }
        Commands::Open { id, .. } => {
            let session = open_session(&repository, &fetcher, &id).await?;
            print_session(&session);
        }
        Commands::Select { id, node } => {
            let session = open_session(&repository, &fetcher, &id).await?;
            let pb = render::spinner("Loading topic...");
            let step = session.select_node(&node).await;
            pb.finish_and_clear();
            render::print_fetch(&step?);
            print_session(&session);
        }
        Commands::Next { id } => {
            let session = open_session(&repository, &fetcher, &id).await?;
            let pb = render::spinner("Loading next...");
            let step = session.advance().await;
            pb.finish_and_clear();
            match step? {
                Some(step) => render::print_fetch(&step),
                None => println!("Already at the last resource."),
            }
            print_session(&session);
        }
        Commands::Prev { id } => {
            let session = open_session(&repository, &fetcher, &id).await?;
            let pb = render::spinner("Loading previous...");
            let step = session.retreat().await;
            pb.finish_and_clear();
            match step? {
                Some(step) => render::print_fetch(&step),
                None => println!("Already at the first resource."),
            }
            print_session(&session);
        }
        Commands::Done { id, resource } => {
            let session = open_session(&repository, &fetcher, &id).await?;
            let Some(position) = session.current() else {
                bail!("No current topic; use 'studypath select {id} <node>' first");
            };
            let complete = match resource {
                Some(resource_id) => {
                    session.toggle_resource_complete(&position.node_id, &resource_id)?
                }
                None => session
                    .toggle_current()?
                    .ok_or_else(|| eyre!("The current topic has no resources"))?,
            };
            println!(
                "Marked {}. Progress: {}",
                if complete { "complete" } else { "incomplete" },
                render::progress_line(&session.progress())
            );
        }
        Commands::Export { id, output } => {
            let roadmap = repository
                .get(&id)?
                .ok_or_else(|| eyre!("Roadmap not found: {id}"))?;
            let document = roadmap.to_pretty_json()?;
            match output {
                Some(path) if path.as_os_str() == "-" => println!("{document}"),
                output => {
                    let path = output.unwrap_or_else(|| PathBuf::from(roadmap.export_file_name()));
                    std::fs::write(&path, document)
                        .wrap_err_with(|| format!("failed to write {}", path.display()))?;
                    println!("Exported to {}", path.display());
                }
            }
        }
        Commands::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .wrap_err_with(|| format!("failed to read {}", file.display()))?;
            let roadmap = repository.import(&raw)?;
            println!("Imported '{}' as {}", roadmap.title, roadmap.id);
        }
        Commands::Delete { id } => {
            repository.delete(&id)?;
            println!("Deleted {id}");
        }
        Commands::Config => {
            print!("{}", Config::default_config_string());
        }
    }

    Ok(())
}

fn build_manager(config: &Config, repository: RoadmapRepository<FileStore>) -> Result<Manager> {
    let llm = Provider::build_from_config(&config.llm)?;
    let generator = LlmRoadmapGenerator::with_config(llm, &config.generation);
    Ok(RoadmapManager::new(repository, generator))
}

async fn generate(
    manager: &Manager,
    id: &str,
    topic: &str,
) -> Result<studypath_core::Roadmap> {
    let pb = render::spinner(format!("Generating roadmap for '{topic}'..."));
    let roadmap = manager.open(id, Some(topic)).await;
    pb.finish_and_clear();
    Ok(roadmap?)
}

async fn open_session<'a>(
    repository: &'a RoadmapRepository<FileStore>,
    fetcher: &'a MixedResourceFetcher,
    id: &str,
) -> Result<Session<'a>> {
    let pb = render::spinner("Opening roadmap...");
    let session = LearningSession::open(repository, fetcher, id).await;
    pb.finish_and_clear();
    Ok(session?)
}

fn print_session(session: &Session<'_>) {
    let roadmap = session.roadmap();
    match session.current() {
        Some(position) => {
            render::print_position(&roadmap, &position);
            println!();
            println!(
                "Progress: {}{}{}",
                render::progress_line(&roadmap.progress()),
                if session.can_retreat() { "  [prev]" } else { "" },
                if session.can_advance() { "  [next]" } else { "" },
            );
        }
        None => {
            render::print_outline(&roadmap);
            println!();
            println!("Pick a topic with 'studypath select {} <node>'.", roadmap.id);
        }
    }
}
