use tokio::sync::RwLock;
use tracing::debug;

use super::RemoteError;

/// Session state for the remote transport. Requests authenticate with the
/// configured API key until a session token has been minted; after that the
/// token is presented instead. `refresh` re-mints the token and is the
/// engine's recovery hook between attempts.
pub struct SessionProvider {
    api_key: String,
    token: RwLock<Option<String>>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    session_token: String,
}

impl SessionProvider {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            token: RwLock::new(None),
        }
    }

    /// Header pair to attach to every request.
    pub async fn auth_header(&self) -> (String, String) {
        let token = self.token.read().await;
        match token.as_ref() {
            Some(token) => ("x-session-token".to_string(), token.clone()),
            None => ("x-api-key".to_string(), self.api_key.clone()),
        }
    }

    /// Exchanges the API key for a fresh session token. Idempotent: a
    /// second refresh simply replaces the stored token.
    pub async fn refresh(
        &self,
        http: &reqwest::Client,
        base_url: &str,
    ) -> Result<(), RemoteError> {
        let url = format!("{base_url}/api/session/refresh");
        debug!("refreshing remote session");

        let response = http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(RemoteError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::from_status(status));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(RemoteError::from_transport)?;

        let mut token = self.token.write().await;
        *token = Some(session.session_token);
        Ok(())
    }
}
