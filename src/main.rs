use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use stepflow_core::config::AppConfig;
use stepflow_core::types::ChatTurn;
use stepflow_engine::{Collaborators, GraphExecutor, Workflow};
use stepflow_llm::ProviderRouter;
use stepflow_memory::{chunk_text, EmbeddingRegistry, KnowledgeStore};

#[derive(Parser)]
#[command(
    name = "stepflow",
    version,
    about = "Run retrieval-augmented question answering workflows"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "stepflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a workflow's structure without running it
    Validate {
        /// Workflow file (.json or .toml)
        workflow: PathBuf,
    },
    /// Execute a workflow against a query
    Run {
        /// Workflow file (.json or .toml)
        workflow: PathBuf,
        /// Prior chat turns: a JSON array or a path to a JSON file
        #[arg(long)]
        history: Option<String>,
        /// The query (read from stdin when omitted)
        #[arg(trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Chunk a text file and add it to a knowledge base
    Ingest {
        knowledge_base: String,
        /// UTF-8 text file
        file: PathBuf,
        /// Embedding model name from the [embedding] config
        #[arg(long, default_value = "openai")]
        embedding_model: String,
        /// Words per chunk
        #[arg(long, default_value_t = stepflow_memory::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Words shared by consecutive chunks
        #[arg(long, default_value_t = stepflow_memory::DEFAULT_CHUNK_OVERLAP)]
        overlap: usize,
    },
    /// Inspect or remove knowledge bases
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },
    /// List generation providers with credentials
    Providers,
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum KbAction {
    /// List knowledge bases and their chunk counts
    List,
    /// Number of chunks in a knowledge base
    Count { knowledge_base: String },
    /// Delete every chunk of a knowledge base
    Delete { knowledge_base: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stepflow=info,warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that need no config
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "stepflow", &mut io::stdout());
            return Ok(());
        }
        Commands::Validate { workflow } => return validate_workflow(workflow),
        _ => {}
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Run {
            workflow,
            history,
            query,
        } => run_workflow(&config, &workflow, history.as_deref(), query).await?,
        Commands::Ingest {
            knowledge_base,
            file,
            embedding_model,
            chunk_size,
            overlap,
        } => {
            let store = open_store(&config)?;
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let chunks = chunk_text(&text, chunk_size, overlap);
            if chunks.is_empty() {
                bail!("{} contains no text", file.display());
            }

            let mut metadata = serde_json::Map::new();
            metadata.insert(
                "source".into(),
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
                    .into(),
            );
            let ids = store
                .add_texts(&knowledge_base, &embedding_model, &chunks, metadata)
                .await?;
            println!(
                "Added {} chunks to '{}' ({} total)",
                ids.len(),
                knowledge_base,
                store.count(&knowledge_base)?
            );
        }
        Commands::Kb { action } => {
            let store = open_store(&config)?;
            match action {
                KbAction::List => {
                    let bases = store.list_knowledge_bases()?;
                    if bases.is_empty() {
                        println!("No knowledge bases.");
                    }
                    for (name, count) in bases {
                        println!("{:<32} {} chunks", name, count);
                    }
                }
                KbAction::Count { knowledge_base } => {
                    println!("{}", store.count(&knowledge_base)?);
                }
                KbAction::Delete { knowledge_base } => {
                    let removed = store.delete_knowledge_base(&knowledge_base)?;
                    println!("Deleted {} chunks from '{}'", removed, knowledge_base);
                }
            }
        }
        Commands::Providers => {
            let router = ProviderRouter::from_config(&config);
            let available = router.available_providers();
            if available.is_empty() {
                println!("No providers configured. Set OPENAI_API_KEY, GOOGLE_API_KEY or COHERE_API_KEY.");
            } else {
                println!("Generation: {}", available.join(", "));
            }
            let embeddings = EmbeddingRegistry::from_config(&config).names();
            if !embeddings.is_empty() {
                println!("Embedding: {}", embeddings.join(", "));
            }
            if let Some(search) = router.web_search() {
                let providers = search.available();
                if !providers.is_empty() {
                    println!("Web search: {}", providers.join(", "));
                }
            }
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Completions { .. } | Commands::Validate { .. } => {
            unreachable!("handled before config load")
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let mut config = if path.exists() {
        AppConfig::load(path)?
    } else {
        match dirs_home().map(|h| h.join(".stepflow").join("config.toml")) {
            Some(home_config) if home_config.exists() => {
                info!(path = %home_config.display(), "Loading config from home directory");
                AppConfig::load(&home_config)?
            }
            _ => AppConfig::default(),
        }
    };
    config.apply_env_defaults();
    Ok(config)
}

fn open_store(config: &AppConfig) -> anyhow::Result<KnowledgeStore> {
    let path = config.storage_path();
    let store = KnowledgeStore::open(&path, EmbeddingRegistry::from_config(config))
        .with_context(|| format!("opening knowledge store at {}", path.display()))?;
    Ok(store)
}

fn validate_workflow(path: &Path) -> anyhow::Result<()> {
    let workflow = Workflow::load(path)?;
    let result = workflow.validate();
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.valid {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_workflow(
    config: &AppConfig,
    path: &Path,
    history: Option<&str>,
    query: Vec<String>,
) -> anyhow::Result<()> {
    let workflow = Workflow::load(path)?;
    workflow.validate().into_result()?;

    let query = if query.is_empty() {
        read_query(io::stdin().lock())?
    } else {
        query.join(" ")
    };
    let history = match history {
        Some(raw) => parse_history(raw)?,
        None => Vec::new(),
    };

    let collaborators = Collaborators::new(
        Arc::new(open_store(config)?),
        stepflow_llm::build_generator(config),
    );
    let executor = GraphExecutor::with_builtins(collaborators, config.engine.clone());

    match executor.execute(&workflow, &query, &history).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Workflow execution failed");
            Err(e.into())
        }
    }
}

fn read_query(reader: impl BufRead) -> io::Result<String> {
    let lines = reader.lines().collect::<io::Result<Vec<_>>>()?;
    Ok(lines.join("\n"))
}

/// Accept either inline JSON or a path to a JSON file.
fn parse_history(raw: &str) -> anyhow::Result<Vec<ChatTurn>> {
    let path = Path::new(raw);
    let json = if !raw.trim_start().starts_with('[') && path.exists() {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    } else {
        raw.to_string()
    };
    serde_json::from_str(&json).context("history must be a JSON array of {role, content} objects")
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
