//! Command-line argument parsing
//!
//! Provides clap-based CLI with subcommands for asking questions and
//! inspecting system state.

use clap::{Parser, Subcommand};

/// channelmind - ask questions against per-channel video transcript corpora
#[derive(Parser, Debug)]
#[command(name = "channelmind")]
#[command(version)]
#[command(about = "Retrieval-augmented Q&A over per-channel video transcripts", long_about = None)]
pub struct Args {
    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a question against one channel's corpus
    Ask {
        /// The question to answer
        #[arg(value_name = "QUESTION")]
        question: String,

        /// Channel to search
        #[arg(short, long)]
        channel: String,

        /// Force fast mode (skips rewrite/fusion/rerank/self-refine)
        #[arg(long)]
        fast: bool,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// List channels with an indexed collection
    Channels,

    /// Check completion endpoint, vector store and cache availability
    Health,

    /// Semantic cache operations
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show hit/miss statistics
    Stats,
    /// Delete every cache entry
    Clear,
    /// Evict expired entries
    Cleanup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_parses() {
        let args = Args::parse_from([
            "channelmind",
            "ask",
            "what is a 1R unit",
            "--channel",
            "demo",
            "--fast",
        ]);
        match args.command {
            Commands::Ask {
                question,
                channel,
                fast,
                json,
            } => {
                assert_eq!(question, "what is a 1R unit");
                assert_eq!(channel, "demo");
                assert!(fast);
                assert!(!json);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_cache_subcommands() {
        let args = Args::parse_from(["channelmind", "cache", "cleanup"]);
        assert!(matches!(
            args.command,
            Commands::Cache {
                action: CacheAction::Cleanup
            }
        ));
    }
}
