use reqwest::Client;
use tracing::debug;
use url::Url;

use super::auth::SessionProvider;
use super::types::{self, AlbumRecord, AssetRecordPage};
use super::RemoteError;
use crate::model::Asset;

/// Client for the remote photo library API. Narrow contract: enumerate
/// assets, enumerate albums, download bytes, refresh the session. Every
/// failure is classified into [`RemoteError`] so the engine can decide
/// between retry and abort.
pub struct RemoteClient {
    http: Client,
    base_url: String,
    session: SessionProvider,
}

impl RemoteClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(RemoteError::from_transport)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: SessionProvider::new(api_key),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, RemoteError> {
        let (header_name, header_value) = self.session.auth_header().await;
        let response = self
            .http
            .get(url)
            .header(&header_name, &header_value)
            .send()
            .await
            .map_err(RemoteError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::from_status(status));
        }
        Ok(response)
    }

    /// Fetches the two asset record streams and joins them into typed
    /// assets.
    pub async fn fetch_all_assets(&self) -> Result<Vec<Asset>, RemoteError> {
        let url = format!("{}/api/records/assets", self.base_url);
        debug!("fetching asset records from {url}");

        let page: AssetRecordPage = self
            .get(&url)
            .await?
            .json()
            .await
            .map_err(RemoteError::from_transport)?;

        let assets = types::project_assets(page)?;
        debug!("remote lists {} assets", assets.len());
        Ok(assets)
    }

    /// Fetches the raw album records. Projection into typed albums happens
    /// at the fetch phase, once the joined asset list is available to
    /// resolve member filenames.
    pub async fn fetch_all_albums(&self) -> Result<Vec<AlbumRecord>, RemoteError> {
        let url = format!("{}/api/records/albums", self.base_url);
        debug!("fetching album records from {url}");

        let records: Vec<AlbumRecord> = self
            .get(&url)
            .await?
            .json()
            .await
            .map_err(RemoteError::from_transport)?;

        debug!("remote lists {} albums", records.len());
        Ok(records)
    }

    /// Downloads one asset's bytes from the URL carried in its master
    /// record.
    pub async fn download(&self, url: &Url) -> Result<Vec<u8>, RemoteError> {
        debug!("downloading {url}");
        let response = self.get(url.as_str()).await?;
        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(RemoteError::from_transport)
    }

    /// Re-establishes the remote session; called by the engine before every
    /// retry of a failed attempt.
    pub async fn refresh_session(&self) -> Result<(), RemoteError> {
        self.session.refresh(&self.http, &self.base_url).await
    }
}
