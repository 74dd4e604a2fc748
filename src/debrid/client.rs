use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::types::ApiErrorBody;
use super::{
    AddMagnetResponse, CredentialProvider, TorrentJob, TorrentService, UnlockResult,
    UnlockService, User,
};
use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.real-debrid.com/rest/1.0";

/// Real-Debrid REST client
pub struct RealDebridClient {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl RealDebridClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rdebrid/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        Ok(builder.bearer_auth(self.credentials.bearer_token()?))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = self.authorized(builder)?.send().await?;
        let status = response.status();
        debug!("{} {}", status.as_u16(), response.url());

        if status.is_success() {
            return Ok(response);
        }

        // The error body is best effort; anything undecodable becomes "Unknown"
        let message = response
            .json::<ApiErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| "Unknown".to_string());

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Authorization(message));
        }

        Err(Error::RemoteService {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        Ok(self.send(builder).await?.json::<T>().await?)
    }

    /// Account details, used to check a token before saving it
    pub async fn user(&self) -> Result<User> {
        self.send_json(self.client.get(self.url("user"))).await
    }
}

#[async_trait]
impl UnlockService for RealDebridClient {
    async fn unlock(&self, link: &str) -> Result<UnlockResult> {
        debug!("Unrestricting {}", link);
        self.send_json(
            self.client
                .post(self.url("unrestrict/link"))
                .form(&[("link", link)]),
        )
        .await
    }
}

#[async_trait]
impl TorrentService for RealDebridClient {
    async fn submit_magnet(&self, magnet: &str) -> Result<String> {
        let added: AddMagnetResponse = self
            .send_json(
                self.client
                    .post(self.url("torrents/addMagnet"))
                    .form(&[("magnet", magnet)]),
            )
            .await?;
        debug!("Magnet accepted as torrent {}", added.id);
        Ok(added.id)
    }

    async fn select_all_files(&self, id: &str) -> Result<()> {
        self.send(
            self.client
                .post(self.url(&format!("torrents/selectFiles/{}", id)))
                .form(&[("files", "all")]),
        )
        .await?;
        Ok(())
    }

    async fn poll(&self, id: &str) -> Result<TorrentJob> {
        self.send_json(self.client.get(self.url(&format!("torrents/info/{}", id))))
            .await
    }
}
