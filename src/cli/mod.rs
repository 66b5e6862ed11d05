//! Admin CLI for a file-backed semantic cache
//!
//! Every subcommand opens the cache directory, performs one operation and
//! prints the result as JSON on stdout. Logs go to stderr.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::run;

/// PMP Semantic Cache - exact, lexical and embedding based response reuse
#[derive(Parser)]
#[command(name = "pmp-semantic-cache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding `default` / `local` configuration files
    #[arg(long, global = true, default_value = "config")]
    pub config_dir: String,

    /// Cache directory (overrides `cache.storage.directory`)
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a response for a query
    Store {
        query: String,
        value: String,
        /// Time to live in seconds (defaults to the policy TTL)
        #[arg(long)]
        ttl: Option<u64>,
        /// JSON object mixed into the cache key
        #[arg(long)]
        context: Option<String>,
    },

    /// Look up a cached response
    Resolve {
        query: String,
        #[arg(long)]
        context: Option<String>,
    },

    /// Remove the entry stored for a query
    Invalidate {
        query: String,
        #[arg(long)]
        context: Option<String>,
        /// Treat QUERY as a raw cache key
        #[arg(long)]
        raw_key: bool,
        #[arg(long, default_value = "manual")]
        reason: String,
    },

    /// Remove every entry whose key starts with PREFIX
    InvalidatePrefix {
        prefix: String,
        #[arg(long, default_value = "manual")]
        reason: String,
    },

    /// Remove every expired entry
    Purge,

    /// Show size, capacity and counters
    Stats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_store() {
        let cli = Cli::parse_from([
            "pmp-semantic-cache",
            "--dir",
            "/tmp/cache",
            "store",
            "What is 2+2?",
            "4",
            "--ttl",
            "60",
        ]);

        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/cache")));
        match cli.command {
            Command::Store { query, value, ttl, context } => {
                assert_eq!(query, "What is 2+2?");
                assert_eq!(value, "4");
                assert_eq!(ttl, Some(60));
                assert!(context.is_none());
            }
            _ => panic!("expected store"),
        }
    }

    #[test]
    fn test_parse_invalidate_prefix() {
        let cli = Cli::parse_from(["pmp-semantic-cache", "invalidate-prefix", "ab"]);

        assert!(matches!(
            cli.command,
            Command::InvalidatePrefix { ref prefix, ref reason } if prefix == "ab" && reason == "manual"
        ));
    }
}
