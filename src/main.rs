//! channelmind - Main CLI entry point

use anyhow::Result;
use channelmind::cache::SemanticCache;
use channelmind::cli::{Args, CacheAction, Commands};
use channelmind::config::Settings;
use channelmind::controller::{ControllerOptions, RagController};
use channelmind::llm::{CompletionClient, EmbeddingClient, OllamaChatClient};
use channelmind::vector::{QdrantStore, VectorStore};
use clap::Parser;
use colored::Colorize;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = Args::parse();
    let settings = Settings::load()?;
    let controller = build_controller(&settings)?;

    match args.command {
        Commands::Ask {
            question,
            channel,
            fast,
            json,
        } => {
            let response = controller
                .query(&question, &channel, None, None, fast.then_some(true))
                .await;

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_response(&response);
            }
        }
        Commands::Channels => {
            let channels = controller.list_channels().await?;
            if channels.is_empty() {
                println!("{}", "No indexed channels found.".yellow());
            } else {
                for channel in channels {
                    println!("{}", channel);
                }
            }
        }
        Commands::Health => {
            let health = controller.health_check().await;
            let label = if health.is_healthy() {
                health.status.green()
            } else {
                health.status.yellow()
            };
            println!("status: {}", label);
            println!("  completion endpoint: {}", mark(health.components.completion_endpoint));
            println!("  vector store:        {}", mark(health.components.vector_store));
            println!("  cache:               {}", mark(health.components.cache));
            println!("  collections:         {}", health.collections);
            println!("  cache hit rate:      {:.1}%", health.cache_hit_rate * 100.0);
        }
        Commands::Cache { action } => match action {
            CacheAction::Stats => {
                let stats = controller.cache_stats();
                println!("requests: {}", stats.total_requests);
                println!("hits:     {}", stats.cache_hits);
                println!("misses:   {}", stats.cache_misses);
                println!("hit rate: {:.1}%", stats.hit_rate() * 100.0);
            }
            CacheAction::Clear => {
                if controller.cache_clear() {
                    println!("{}", "Cache cleared.".green());
                } else {
                    println!("{}", "Cache not available.".yellow());
                }
            }
            CacheAction::Cleanup => {
                let evicted = controller.cache_cleanup_expired();
                println!("Evicted {} expired entries.", evicted);
            }
        },
    }

    Ok(())
}

fn build_controller(settings: &Settings) -> Result<RagController> {
    let llm: Arc<dyn CompletionClient> = Arc::new(OllamaChatClient::new(
        &settings.llm.base_url,
        &settings.llm.chat_model,
    )?);

    let embedder = EmbeddingClient::new(&settings.llm.base_url, &settings.llm.embed_model)?;
    let store: Arc<dyn VectorStore> = Arc::new(QdrantStore::new(&settings.vector.url, embedder)?);

    let cache = if settings.cache.enabled {
        match SemanticCache::open(&settings.cache_dir()?) {
            Ok(cache) => Some(Arc::new(cache)),
            Err(e) => {
                tracing::warn!("cache unavailable, continuing without it: {}", e);
                None
            }
        }
    } else {
        None
    };

    Ok(RagController::new(
        store,
        llm,
        cache,
        ControllerOptions {
            prompts_dir: settings.prompts.dir.clone(),
            ..Default::default()
        },
    ))
}

fn print_response(response: &channelmind::RagResponse) {
    println!("{}", response.answer);
    println!();
    println!(
        "{}",
        format!(
            "confidence {:.2} | {} documents | {:.0}ms (search {:.0}ms, answer {:.0}ms)",
            response.confidence,
            response.documents_found,
            response.total_time_ms,
            response.search_time_ms,
            response.answer_time_ms
        )
        .dimmed()
    );
    if !response.sources_used.is_empty() {
        println!("{}", format!("sources: {}", response.sources_used.join(", ")).dimmed());
    }
}

fn mark(ok: bool) -> colored::ColoredString {
    if ok {
        "ok".green()
    } else {
        "unavailable".red()
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(false).init();
}
