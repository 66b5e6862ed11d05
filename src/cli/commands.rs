use anyhow::Context;
use serde_json::{json, Value};
use tracing::debug;

use super::{Cli, Command};
use crate::config::AppConfig;
use crate::domain::cache::CacheContext;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::services::{SemanticCacheFactory, SemanticCacheService};

const CLI_TRIGGER: &str = "cli";

/// Load configuration, open the cache directory and run one command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load_from(&cli.config_dir)
        .with_context(|| format!("Failed to load configuration from '{}'", cli.config_dir))?;
    init_logging(&config.logging);

    config.cache.storage.backend = "file".to_string();

    if let Some(dir) = cli.dir {
        config.cache.storage.directory = dir;
    }

    debug!(directory = %config.cache.storage.directory.display(), "Opening cache");

    let cache = SemanticCacheFactory::create(&config.cache).await?;
    let output = execute(&cache, cli.command).await?;

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

async fn execute(cache: &SemanticCacheService, command: Command) -> anyhow::Result<Value> {
    let output = match command {
        Command::Store {
            query,
            value,
            ttl,
            context,
        } => {
            let context = parse_context(context.as_deref())?;
            let outcome = cache
                .store(&query, value.into_bytes(), ttl, context.as_ref())
                .await?;

            serde_json::to_value(outcome)?
        }
        Command::Resolve { query, context } => {
            let context = parse_context(context.as_deref())?;
            serde_json::to_value(cache.resolve(&query, context.as_ref()).await)?
        }
        Command::Invalidate {
            query,
            context,
            raw_key,
            reason,
        } => {
            let key = if raw_key {
                query
            } else {
                let context = parse_context(context.as_deref())?;
                cache.cache_key(&query, context.as_ref())?
            };
            let removed = cache.invalidate(&key, &reason, CLI_TRIGGER).await?;

            json!({ "key": key, "removed": removed })
        }
        Command::InvalidatePrefix { prefix, reason } => {
            let removed = cache.invalidate_prefix(&prefix, &reason, CLI_TRIGGER).await?;
            json!({ "prefix": prefix, "removed": removed })
        }
        Command::Purge => {
            let purged = cache.purge_expired().await?;
            json!({ "purged": purged })
        }
        Command::Stats => serde_json::to_value(cache.stats().await?)?,
    };

    Ok(output)
}

fn parse_context(raw: Option<&str>) -> anyhow::Result<Option<CacheContext>> {
    raw.map(|raw| {
        serde_json::from_str::<CacheContext>(raw)
            .with_context(|| format!("--context must be a JSON object, got '{}'", raw))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheSettings;

    async fn file_cache(dir: &std::path::Path) -> SemanticCacheService {
        let mut settings = CacheSettings::default();
        settings.storage.backend = "file".to_string();
        settings.storage.directory = dir.to_path_buf();

        SemanticCacheFactory::create(&settings).await.unwrap()
    }

    #[test]
    fn test_parse_context() {
        assert!(parse_context(None).unwrap().is_none());

        let context = parse_context(Some(r#"{"model": "a"}"#)).unwrap().unwrap();
        assert_eq!(context["model"], json!("a"));

        assert!(parse_context(Some("[1, 2]")).is_err());
    }

    #[tokio::test]
    async fn test_store_resolve_invalidate_across_processes() {
        let dir = tempfile::tempdir().unwrap();

        let stored = execute(
            &file_cache(dir.path()).await,
            Command::Store {
                query: "What is 2+2?".to_string(),
                value: "4".to_string(),
                ttl: None,
                context: None,
            },
        )
        .await
        .unwrap();

        let resolved = execute(
            &file_cache(dir.path()).await,
            Command::Resolve {
                query: "what is 2+2?".to_string(),
                context: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(resolved["status"], json!("hit"));
        assert_eq!(resolved["kind"], json!("exact"));
        assert_eq!(resolved["value"], json!("4"));
        assert_eq!(resolved["entry_key"], stored["key"]);

        let invalidated = execute(
            &file_cache(dir.path()).await,
            Command::Invalidate {
                query: "What is 2+2?".to_string(),
                context: None,
                raw_key: false,
                reason: "manual".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(invalidated["removed"], json!(true));

        let stats = execute(&file_cache(dir.path()).await, Command::Stats).await.unwrap();
        assert_eq!(stats["entries"], json!(0));
    }
}
