use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::chat::{ChatSession, ConversationHistory, render_outcome};
use crate::config::Config;
use crate::database::lancedb::VectorStore;
use crate::dataset::load_dataset;
use crate::embeddings::{Embedder, build_chunks};
use crate::generation::{ResponseGenerator, TextGenerator};
use crate::indexer::{
    ConsistencyValidator, IndexHandle, IndexSource, dataset_fingerprint, get_or_build_index,
    open_chunk_database,
};
use crate::ollama::OllamaClient;
use crate::retrieval::Retriever;

/// Load the configuration from `data_dir`, applying a dataset override
#[inline]
pub fn load_config(data_dir: &Path, dataset: Option<PathBuf>) -> Result<Config> {
    let mut config = Config::load(data_dir)?;
    if let Some(path) = dataset {
        config.dataset.path = path;
    }
    Ok(config)
}

/// Read the dataset and flatten it into chunks
#[inline]
pub fn load_chunks(config: &Config) -> Result<Vec<String>> {
    let record_set = load_dataset(config.dataset_path())?;
    if record_set.is_empty() {
        warn!(
            "Dataset {} has no FAQs or products, only contact info will be searchable",
            config.dataset_path().display()
        );
    }
    let chunks = build_chunks(&record_set);
    info!(
        "Built {} chunks from {}",
        chunks.len(),
        config.dataset_path().display()
    );
    Ok(chunks)
}

async fn open_index(
    config: &Config,
    client: &OllamaClient,
    force_rebuild: bool,
) -> Result<IndexHandle> {
    let chunks = load_chunks(config)?;
    let index = get_or_build_index(config, &chunks, client, force_rebuild)
        .await
        .context("Failed to prepare the index")?;
    Ok(index)
}

/// Setup shared by every query command: the client and a ready retriever
async fn prepare_retriever(config: &Config) -> Result<(Arc<OllamaClient>, Arc<Retriever>)> {
    let client = Arc::new(
        OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?,
    );
    let index = open_index(config, &client, false).await?;
    let retriever = Retriever::from_index(index, Arc::clone(&client) as Arc<dyn Embedder>);
    Ok((client, Arc::new(retriever)))
}

async fn prepare_generator(config: &Config) -> Result<ResponseGenerator> {
    let (client, retriever) = prepare_retriever(config).await?;
    Ok(ResponseGenerator::new(
        retriever,
        client as Arc<dyn TextGenerator>,
        config,
    ))
}

/// Run the interactive console session
#[inline]
pub async fn start_chat(config: &Config) -> Result<()> {
    let generator = prepare_generator(config).await?;

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut session = ChatSession::new(&generator, config.assistant.name.clone());
    session.run(stdin.lock(), stdout.lock()).await
}

/// Answer a single query and print it as it streams
#[inline]
pub async fn ask(config: &Config, query: &str) -> Result<()> {
    let generator = prepare_generator(config).await?;

    let outcome = generator.generate(query, &ConversationHistory::new()).await;
    let failed = outcome.is_failed();
    render_outcome(outcome, None, &mut std::io::stdout().lock())?;

    if failed {
        anyhow::bail!("No answer could be generated");
    }
    Ok(())
}

/// Print the chunks nearest to a query
#[inline]
pub async fn search(config: &Config, query: &str, k: usize) -> Result<()> {
    let (_client, retriever) = prepare_retriever(config).await?;

    let results = retriever.retrieve(query, k).await?;
    if results.is_empty() {
        println!("No chunks found.");
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    for (rank, chunk) in results.iter().enumerate() {
        writeln!(
            stdout,
            "{}. [#{} distance {:.4}] {}",
            rank + 1,
            chunk.position,
            chunk.distance,
            chunk.text
        )?;
    }
    Ok(())
}

/// Build the index pair, or confirm the persisted one is current
#[inline]
pub async fn build_index(config: &Config, rebuild: bool) -> Result<()> {
    let client = OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?;
    let index = open_index(config, &client, rebuild).await?;

    match index.source {
        IndexSource::Loaded => println!("✅ Index is up to date"),
        IndexSource::Built(reason) => println!("✅ Index built ({})", reason),
    }
    println!("   📊 Chunks: {}", index.chunk_table.len());
    println!("   🔢 Dimension: {}", index.meta.dimension);
    println!("   🤖 Embedding model: {}", index.meta.embedding_model);
    println!("   🔑 Dataset fingerprint: {}", index.meta.short_fingerprint());
    Ok(())
}

/// Report paths, index state, and service health
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 Support RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("📁 Paths:");
    println!("   Data directory: {}", config.get_base_dir().display());
    println!("   Dataset: {}", config.dataset_path().display());
    println!("   Chunk table: {}", config.chunk_database_path().display());
    println!("   Vector index: {}", config.vector_database_path().display());
    println!("   Cache policy: {}", config.dataset.cache_policy);
    println!();

    println!("🗄️  Index Status:");
    let database = match open_chunk_database(config).await {
        Ok(db) => Some(db),
        Err(e) => {
            println!("   ❌ Chunk table: Failed to open - {}", e);
            None
        }
    };
    let vector_store = match VectorStore::open(config).await {
        Ok(store) => Some(store),
        Err(e) => {
            println!("   ❌ Vector index: Failed to open - {}", e);
            None
        }
    };

    if let (Some(database), Some(vector_store)) = (&database, &vector_store) {
        match database.load_meta().await? {
            None => println!("   💤 No completed index. Run 'support-rag index' to build it."),
            Some(meta) => {
                println!("   📅 Built: {}", meta.built_at);
                println!("   📊 Chunks: {}", meta.chunk_count);
                println!("   🔢 Dimension: {}", meta.dimension);
                println!("   🤖 Embedding model: {}", meta.embedding_model);

                match ConsistencyValidator::new(database, vector_store)
                    .validate_consistency()
                    .await
                {
                    Ok(report) if report.is_consistent => {
                        println!("   ✅ {}", report.summary());
                    }
                    Ok(report) => println!("   ⚠️  {}", report.summary()),
                    Err(e) => println!("   ❌ Consistency check failed - {}", e),
                }

                match load_chunks(config) {
                    Ok(chunks) if meta.matches_dataset(&dataset_fingerprint(&chunks)) => {
                        println!("   ✅ Dataset unchanged since last build");
                    }
                    Ok(_) => println!("   ⚠️  Dataset changed since last build"),
                    Err(e) => {
                        warn!("Could not read dataset: {:#}", e);
                        println!("   ❌ Dataset unreadable - {}", e);
                    }
                }
            }
        }
    }
    if let Some(database) = database {
        database.close().await;
    }
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!("   ✅ Ollama: Connected ({})", client.base_url());
                println!("   📋 Embedding model: {}", config.ollama.embedding_model);
                println!("   💬 Generation model: {}", config.ollama.generation_model);
            }
            Err(e) => println!("   ⚠️  Ollama: Unhealthy - {:#}", e),
        },
        Err(e) => println!("   ❌ Ollama: Invalid configuration - {}", e),
    }

    Ok(())
}
