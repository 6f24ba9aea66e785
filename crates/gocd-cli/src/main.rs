//! GoCD CLI - pipeline dependency queries and polling
//!
//! Usage:
//!   gocd init                         Write a default .gocd/config.toml
//!   gocd graph                        Show every pipeline with its direct links
//!   gocd upstream <pipeline>          Pipelines a pipeline depends on
//!   gocd downstream <pipeline>        Pipelines depending on a pipeline
//!   gocd schedule <pipeline> --wait   Trigger a pipeline, optionally wait for it
//!   gocd wait-artifact ...            Wait until a job artifact is published

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gocd_client::{
    schedule_and_wait, wait_for_artifact, GoServer, HttpServer, PipelineGraph, PollConfig,
};
use gocd_core::{ArtifactLocator, GocdConfig, PipelineGroup};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "gocd")]
#[command(author, version, about = "GoCD pipeline dependency client")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to .gocd/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Server URL, overrides the configuration file
    #[arg(long, global = true, value_name = "URL")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show every pipeline with its direct predecessors and descendants
    Graph {
        /// Read pipeline groups from a JSON file instead of the server
        #[arg(long, value_name = "FILE")]
        from_file: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List every pipeline a pipeline depends on
    Upstream {
        /// Pipeline name
        pipeline: String,

        /// Read pipeline groups from a JSON file instead of the server
        #[arg(long, value_name = "FILE")]
        from_file: Option<PathBuf>,
    },

    /// List every pipeline depending on a pipeline
    Downstream {
        /// Pipeline name
        pipeline: String,

        /// Read pipeline groups from a JSON file instead of the server
        #[arg(long, value_name = "FILE")]
        from_file: Option<PathBuf>,
    },

    /// Trigger a pipeline
    Schedule {
        /// Pipeline name
        pipeline: String,

        /// Wait until the new instance shows up
        #[arg(long)]
        wait: bool,
    },

    /// Wait until a job artifact is published
    WaitArtifact {
        pipeline: String,
        pipeline_counter: u64,
        stage: String,
        stage_counter: u64,
        job: String,
        /// Path of the artifact inside the job
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // init never reads the existing config file
    if let Commands::Init { path } = &cli.command {
        return cmd_init(path);
    }

    let config = load_config(cli.config.as_deref(), cli.server)?;

    match cli.command {
        Commands::Init { path } => cmd_init(&path),
        Commands::Graph { from_file, json } => cmd_graph(&config, from_file, json).await,
        Commands::Upstream {
            pipeline,
            from_file,
        } => cmd_transitive(&config, from_file, &pipeline, Direction::Upstream).await,
        Commands::Downstream {
            pipeline,
            from_file,
        } => cmd_transitive(&config, from_file, &pipeline, Direction::Downstream).await,
        Commands::Schedule { pipeline, wait } => cmd_schedule(&config, &pipeline, wait).await,
        Commands::WaitArtifact {
            pipeline,
            pipeline_counter,
            stage,
            stage_counter,
            job,
            path,
        } => {
            let locator = ArtifactLocator {
                pipeline,
                pipeline_counter,
                stage,
                stage_counter,
                job,
                path,
            };
            cmd_wait_artifact(&config, &locator).await
        }
    }
}

fn load_config(path: Option<&Path>, server: Option<String>) -> Result<GocdConfig> {
    let config = match path {
        Some(path) => GocdConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => GocdConfig::load_or_default(&std::env::current_dir()?)
            .context("Failed to load .gocd/config.toml")?,
    };

    Ok(match server {
        Some(url) => config.with_url(url),
        None => config,
    })
}

fn connect(config: &GocdConfig) -> Result<HttpServer> {
    info!("Connecting to {}", config.base_url());
    HttpServer::from_config(config).context("Failed to create HTTP client")
}

async fn load_graph(config: &GocdConfig, from_file: Option<PathBuf>) -> Result<PipelineGraph> {
    match from_file {
        Some(file) => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let groups: Vec<PipelineGroup> =
                serde_json::from_str(&content).context("Failed to parse pipeline groups JSON")?;
            Ok(PipelineGraph::from_groups(groups))
        }
        None => {
            let server = connect(config)?;
            PipelineGraph::fetch(&server)
                .await
                .context("Failed to fetch pipeline groups")
        }
    }
}

fn cmd_init(path: &Path) -> Result<()> {
    info!("Initializing GoCD client config in {:?}", path);

    GocdConfig::write_default(path).context("Failed to write default config")?;

    println!("Created {}", path.join(".gocd/config.toml").display());
    Ok(())
}

async fn cmd_graph(config: &GocdConfig, from_file: Option<PathBuf>, json: bool) -> Result<()> {
    let graph = load_graph(config, from_file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&graph.entries())?);
        return Ok(());
    }

    if graph.is_empty() {
        println!("No pipelines found.");
        return Ok(());
    }

    for entry in graph.entries() {
        println!("{}", entry.name);
        if !entry.predecessors.is_empty() {
            println!("  <- {}", entry.predecessors.join(", "));
        }
        if !entry.descendants.is_empty() {
            println!("  -> {}", entry.descendants.join(", "));
        }
    }

    println!(
        "\n{} pipelines, {} roots, {} leaves",
        graph.len(),
        graph.roots().len(),
        graph.leaves().len()
    );
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Upstream,
    Downstream,
}

async fn cmd_transitive(
    config: &GocdConfig,
    from_file: Option<PathBuf>,
    pipeline: &str,
    direction: Direction,
) -> Result<()> {
    let graph = load_graph(config, from_file).await?;

    let reached = match direction {
        Direction::Upstream => graph.upstream(pipeline)?,
        Direction::Downstream => graph.downstream(pipeline)?,
    };

    for name in sorted(reached) {
        println!("{}", name);
    }
    Ok(())
}

fn sorted(names: HashSet<String>) -> Vec<String> {
    let mut names: Vec<String> = names.into_iter().collect();
    names.sort();
    names
}

async fn cmd_schedule(config: &GocdConfig, pipeline: &str, wait: bool) -> Result<()> {
    let server = connect(config)?;

    if !wait {
        server
            .schedule(pipeline)
            .await
            .with_context(|| format!("Failed to schedule {}", pipeline))?;
        println!("Scheduled {}", pipeline);
        return Ok(());
    }

    let poll = PollConfig::from(&config.polling);
    let instance = schedule_and_wait(&server, pipeline, poll)
        .await
        .with_context(|| format!("Failed to schedule {}", pipeline))?;

    println!(
        "{} #{} ({})",
        instance.name,
        instance.counter,
        instance.label.as_deref().unwrap_or("-")
    );
    Ok(())
}

async fn cmd_wait_artifact(config: &GocdConfig, locator: &ArtifactLocator) -> Result<()> {
    let server = connect(config)?;
    let poll = PollConfig::from(&config.polling);

    wait_for_artifact(&server, locator, poll)
        .await
        .with_context(|| format!("Artifact {} never showed up", locator))?;

    println!("{}", server.url(&format!("files/{}", locator.url_path())));
    Ok(())
}
