//! CLI entry point for the wagescope engine.
//!
//! Drives the engine against a JSON corpus file and a JSON-file-backed
//! store: index a corpus, run similarity searches, ingest and analyze
//! salary observations, and inspect index status.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use wagescope::config::Settings;
use wagescope::embedding::FastEmbedProvider;
use wagescope::generation::DisabledModel;
use wagescope::salary::{SalaryBenchmark, SalaryIngest, SalaryQuery};
use wagescope::search::DocumentSearchEngine;
use wagescope::store::NewSourceRecord;
use wagescope::store::memory::{MemoryDocumentStore, MemorySalaryStore};
use wagescope::sync::IndexSyncManager;

/// Corpus file shape accepted by `wagescope index`.
#[derive(Deserialize)]
struct CorpusFile {
    #[serde(default)]
    documents: Vec<NewSourceRecord>,
    #[serde(default)]
    salaries: Vec<SalaryIngest>,
}

#[derive(Parser)]
#[command(name = "wagescope", version, about = "Salary benchmarking and document RAG engine")]
struct Cli {
    /// Configuration file (defaults to ./wagescope.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed, and index a JSON corpus file.
    Index {
        /// Corpus file with `documents` and optional `salaries` arrays.
        corpus: PathBuf,
    },
    /// Search the document index.
    Search {
        query: String,
        /// Hits to return (defaults to search.default_limit).
        #[arg(short = 'k', long)]
        limit: Option<usize>,
    },
    /// Answer a question grounded in retrieved document chunks.
    Answer { question: String },
    /// Ingest one salary observation through the validation gate.
    Ingest {
        job_title: String,
        location: String,
        #[arg(long)]
        years: f32,
        #[arg(long)]
        salary: f64,
    },
    /// Analyze a salary against comparable observations.
    Analyze {
        job_title: String,
        location: String,
        #[arg(long)]
        years: f32,
        #[arg(long)]
        salary: f64,
    },
    /// Show index status.
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    std::fs::create_dir_all(&settings.data_dir)
        .with_context(|| format!("creating data dir {}", settings.data_dir.display()))?;

    match cli.command {
        Commands::Index { corpus } => index(&settings, &corpus),
        Commands::Search { query, limit } => search(
            &settings,
            &query,
            limit.unwrap_or(settings.search.default_limit),
        ),
        Commands::Answer { question } => answer(&settings, &question),
        Commands::Ingest {
            job_title,
            location,
            years,
            salary,
        } => ingest(
            &settings,
            SalaryIngest {
                job_title,
                location,
                experience_years: years,
                salary,
            },
        ),
        Commands::Analyze {
            job_title,
            location,
            years,
            salary,
        } => analyze(
            &settings,
            SalaryQuery {
                job_title,
                location,
                experience_years: years,
                current_salary: salary,
            },
        ),
        Commands::Status => status(&settings),
    }
}

fn doc_store_path(settings: &Settings) -> PathBuf {
    settings.data_dir.join("docs.store.json")
}

fn salary_store_path(settings: &Settings) -> PathBuf {
    settings.data_dir.join("salary.store.json")
}

fn embedder(settings: &Settings) -> Result<Arc<FastEmbedProvider>> {
    Ok(Arc::new(FastEmbedProvider::from_config(
        &settings.embedding,
    )?))
}

fn document_engine(
    settings: &Settings,
    store: Arc<MemoryDocumentStore>,
) -> Result<DocumentSearchEngine<MemoryDocumentStore>> {
    let provider = embedder(settings)?;
    let sync = Arc::new(IndexSyncManager::new(
        store.clone(),
        provider.clone(),
        settings.chunking,
        settings.embedding.batch_size,
        settings.index_paths("docs"),
    ));
    Ok(DocumentSearchEngine::new(store, provider, sync))
}

fn salary_engine(settings: &Settings) -> Result<SalaryBenchmark<MemorySalaryStore>> {
    let provider = embedder(settings)?;
    let path = salary_store_path(settings);
    let store = Arc::new(if path.exists() {
        MemorySalaryStore::load_from(&path)?
    } else {
        MemorySalaryStore::new()
    });
    let sync = Arc::new(IndexSyncManager::new(
        store.clone(),
        provider.clone(),
        settings.chunking,
        settings.embedding.batch_size,
        settings.index_paths("salary"),
    ));
    Ok(SalaryBenchmark::new(
        store,
        provider,
        sync,
        Arc::new(DisabledModel),
        settings.search.candidate_pool,
    ))
}

fn index(settings: &Settings, corpus: &PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(corpus)
        .with_context(|| format!("reading corpus {}", corpus.display()))?;
    let corpus: CorpusFile = serde_json::from_str(&raw).context("parsing corpus file")?;

    let store = Arc::new(MemoryDocumentStore::new());
    let loaded = store.load_documents(corpus.documents)?;

    let provider = embedder(settings)?;
    let sync = IndexSyncManager::new(
        store.clone(),
        provider,
        settings.chunking,
        settings.embedding.batch_size,
        settings.index_paths("docs"),
    );
    sync.rebuild()?;
    store.save_to(&doc_store_path(settings))?;
    println!(
        "indexed {loaded} documents into {} vectors (snapshot v{})",
        sync.vector_count(),
        sync.version()
    );

    if !corpus.salaries.is_empty() {
        let bench = salary_engine(settings)?;
        let mut valid = 0usize;
        let mut invalid = 0usize;
        for entry in corpus.salaries {
            let outcome = bench.ingest(entry)?;
            if outcome.status.is_valid() {
                valid += 1;
            } else {
                invalid += 1;
            }
            // Each accepted observation becomes searchable for the next
            // one's validation gate.
            bench.sync().rebuild()?;
        }
        bench.store().save_to(&salary_store_path(settings))?;
        println!("ingested {valid} valid / {invalid} invalid salary observations");
    }
    Ok(())
}

fn search(settings: &Settings, query: &str, limit: usize) -> Result<()> {
    let store_path = doc_store_path(settings);
    let store = Arc::new(
        MemoryDocumentStore::load_from(&store_path)
            .with_context(|| format!("loading store {} (run `index` first)", store_path.display()))?,
    );
    let engine = document_engine(settings, store)?;
    let hits = engine.search(query, limit)?;
    println!("{}", serde_json::to_string_pretty(&hits)?);
    Ok(())
}

fn answer(settings: &Settings, question: &str) -> Result<()> {
    let store_path = doc_store_path(settings);
    let store = Arc::new(
        MemoryDocumentStore::load_from(&store_path)
            .with_context(|| format!("loading store {} (run `index` first)", store_path.display()))?,
    );
    let engine = document_engine(settings, store)?;
    let (answer, hits) = engine.answer(question, settings.search.context_chunks, &DisabledModel)?;
    let payload = serde_json::json!({ "answer": answer, "sources": hits });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn ingest(settings: &Settings, request: SalaryIngest) -> Result<()> {
    let bench = salary_engine(settings)?;
    let outcome = bench.ingest(request)?;
    bench.sync().rebuild()?;
    bench.store().save_to(&salary_store_path(settings))?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn analyze(settings: &Settings, request: SalaryQuery) -> Result<()> {
    let bench = salary_engine(settings)?;
    let analysis = bench.analyze(request)?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn status(settings: &Settings) -> Result<()> {
    let bench = salary_engine(settings)?;
    let status = bench.status()?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
