use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::Mutex;

mod cli;

use xfilter::config::{Config, FeedSettings};
use xfilter::embedding::{Embedder, OrtBackend};
use xfilter::pipeline::FeedPipeline;
use xfilter::tracker::ItemState;
use xfilter::{dom, pipeline, reconcile, reorder, score};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = cli::Args::parse();
    let config = match &args.config_dir {
        Some(dir) => Config::load_with(&dir.to_string_lossy()),
        None => Config::load(),
    };

    match args.command {
        cli::Command::Run { feed, update } => run_snapshot(config, &feed, update.as_deref()),
        cli::Command::CheckModel {} => check_model(config),
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot build runtime")
}

fn run_snapshot(config: Config, feed: &Path, update: Option<&Path>) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(feed)
        .with_context(|| format!("cannot read feed snapshot {}", feed.display()))?;
    let update: Option<FeedSettings> = update
        .map(|path| {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read settings update {}", path.display()))?;
            serde_json::from_str(&raw).context("settings update is malformed")
        })
        .transpose()?;

    runtime()?.block_on(async move {
        let tree = Arc::new(Mutex::new(dom::parse_document(&html)));
        let embedder = Arc::new(Embedder::new(config.embedding.clone()));
        let mut pipeline = FeedPipeline::new(
            tree.clone(),
            config.feed.clone(),
            embedder,
            config.scoring_concurrency,
        );

        pipeline.ensure_scoring_ready().await;
        pipeline.run_pass().await;
        print_report(&pipeline, &tree).await;

        if let Some(update) = update {
            println!("\napplying settings update...\n");
            let request = reconcile::apply_settings(&mut pipeline, update).await;
            if request != reconcile::PassRequest::None {
                pipeline.run_pass().await;
            }
            print_report(&pipeline, &tree).await;
        }

        Ok(())
    })
}

async fn print_report(pipeline: &FeedPipeline, tree: &pipeline::SharedTree) {
    let tree = tree.lock().await;
    let container = reorder::find_timeline_container(&tree);

    let ordered_items: Vec<dom::NodeId> = match container {
        Some(container) => tree
            .children(container)
            .iter()
            .flat_map(|cell| tree.items_within(*cell))
            .collect(),
        None => tree.items(),
    };

    println!("{} items after pass #{}:", ordered_items.len(), pipeline.passes());
    for item in ordered_items {
        let text = score::item_text(&tree, item);
        let snippet: String = text.chars().take(60).collect();
        match pipeline.tracker().state(item) {
            ItemState::Hidden(reason) => println!("  [hidden: {reason}] {snippet}"),
            ItemState::Scored(score) => println!("  [{score:+.3}] {snippet}"),
            _ => println!("  [visible] {snippet}"),
        }
    }
}

fn check_model(config: Config) -> anyhow::Result<()> {
    let backend = OrtBackend::load(
        Path::new(&config.embedding.model_path),
        Path::new(&config.embedding.tokenizer_path),
        config.embedding.max_sequence_length,
    )
    .context("embedding model failed to load")?;

    println!("model loaded");
    println!("  hidden states output: {}", backend.output_name());
    println!("  token_type_ids input: {}", backend.wants_type_ids());

    runtime()?.block_on(async move {
        let embedder = Arc::new(Embedder::with_backend(Arc::new(backend)));
        match embedder.embed("hello world").await {
            Some(vector) => println!("  probe embedding: {} dims", vector.len()),
            None => anyhow::bail!("probe embedding failed"),
        }
        Ok(())
    })
}
