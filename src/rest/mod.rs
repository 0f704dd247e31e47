//! Discord REST lookups used by the read-through paths.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::model::{Channel, User};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

#[async_trait]
pub trait RestClient: Send + Sync {
    async fn get_user(&self, user_id: u64) -> Result<Option<User>>;
    async fn get_channel(&self, channel_id: u64) -> Result<Option<Channel>>;
}

pub struct DiscordRest {
    client: Client,
    base: String,
}

impl DiscordRest {
    pub fn new(base: Option<&str>, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bot {token}"))
                .map_err(|_| CacheError::Config("bot token contains invalid characters".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base: base.unwrap_or(DEFAULT_API_BASE).trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}{}", self.base, path);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(CacheError::HttpStatus {
                status: status.as_u16(),
                url,
            }),
        }
    }
}

#[async_trait]
impl RestClient for DiscordRest {
    async fn get_user(&self, user_id: u64) -> Result<Option<User>> {
        debug!("Fetching user {} from REST", user_id);
        self.get(&format!("/users/{user_id}")).await
    }

    async fn get_channel(&self, channel_id: u64) -> Result<Option<Channel>> {
        debug!("Fetching channel {} from REST", channel_id);
        self.get(&format!("/channels/{channel_id}")).await
    }
}
