//! Feed replay: reads newline-delimited gateway frames from stdin and applies
//! them to the configured cache backend.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use guildcache::cache::{self, DiscordCache, DiscordCacheExt};
use guildcache::config::Config;
use guildcache::database::Database;
use guildcache::events::payload::MessageCreate;
use guildcache::events::{EventDispatcher, GatewayEvent};
use guildcache::memo::MemoRegistry;
use guildcache::model::Permissions;
use guildcache::proxy::{MongoProxyStore, ProxyCache};
use guildcache::rest::DiscordRest;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("guildcache=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting guildcache...");

    let config = Config::from_env()?;
    info!("Cache backend: {:?}", config.backend);

    let cache = cache::connect(&config).await?;
    let rest = Arc::new(DiscordRest::new(
        config.discord_api_base.as_deref(),
        config.bot_token.as_deref(),
    )?);
    let dispatcher = EventDispatcher::new(cache, rest);

    let proxy = match &config.mongodb_uri {
        Some(uri) => {
            let db = Database::connect(uri, &config.mongodb_database).await?;
            let registry = MemoRegistry::new();
            Some(ProxyCache::new(Arc::new(MongoProxyStore::new(&db)), &registry))
        }
        None => {
            info!("MONGODB_URI not set, proxy configuration lookups disabled");
            None
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut handled: u64 = 0;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let event = match GatewayEvent::parse(&line) {
                    Ok(Some(event)) => event,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("Skipping malformed event: {}", e);
                        continue;
                    }
                };

                if let Err(e) = dispatcher.handle(&event).await {
                    error!("Failed to handle {}: {}", event.name(), e);
                    continue;
                }
                handled += 1;

                if let (Some(proxy), GatewayEvent::MessageCreate(message)) = (&proxy, &event) {
                    lookup_proxy_config(proxy, dispatcher.cache().as_ref(), message).await;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    info!("Handled {} events", handled);
    Ok(())
}

/// Load (and so warm) the configuration a proxy decision would need.
async fn lookup_proxy_config(proxy: &ProxyCache, cache: &dyn DiscordCache, message: &MessageCreate) {
    let Some(guild_id) = message.guild_id else {
        return;
    };
    if message.author.bot {
        return;
    }

    let (guild, account) = tokio::join!(
        proxy.get_guild_data_cached(guild_id),
        proxy.get_account_data_cached(message.author.id),
    );

    match (guild, account) {
        (Ok(guild), Ok(Some(account))) => {
            let settings = account.settings_for_guild(guild_id);
            debug!(
                "Author {} is in system {} (proxy enabled: {}, guild blacklist: {})",
                message.author.id,
                account.system.id,
                settings.proxy_enabled,
                guild.blacklist.contains(&message.channel_id)
            );

            match cache.permissions_in(Some(guild_id), message.channel_id).await {
                Ok(perms) if !perms.contains(Permissions::MANAGE_WEBHOOKS | Permissions::MANAGE_MESSAGES) => {
                    warn!("Missing webhook or message permissions in channel {}", message.channel_id);
                }
                Ok(_) => {}
                Err(e) => debug!("Could not compute permissions in {}: {}", message.channel_id, e),
            }
        }
        (Ok(_), Ok(None)) => {}
        (Err(e), _) | (_, Err(e)) => error!("Proxy config lookup failed: {}", e),
    }
}
