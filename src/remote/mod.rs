pub mod auth;
pub mod client;
pub mod types;

pub use auth::SessionProvider;
pub use client::RemoteClient;
pub use types::{AlbumRecord, AssetRecordPage};

/// Failures of the remote transport, classified the way the retry loop
/// needs them: bad responses, rejected requests and DNS hiccups are
/// recoverable; a final authentication failure or anything unclassified is
/// not.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("bad response from remote: HTTP {status}")]
    BadResponse { status: u16 },

    #[error("request rejected by remote: HTTP {status}")]
    BadRequest { status: u16 },

    #[error("name resolution failed: {0}")]
    Dns(String),

    #[error("authentication rejected by remote")]
    Auth,

    #[error("downloaded payload for {uuid} failed verification: {reason}")]
    Verification { uuid: String, reason: String },

    #[error("malformed remote record: {0}")]
    Decode(String),

    #[error("remote transport error: {0}")]
    Transport(#[source] reqwest::Error),
}

impl RemoteError {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RemoteError::BadResponse { .. }
                | RemoteError::BadRequest { .. }
                | RemoteError::Dns(_)
                | RemoteError::Verification { .. }
        )
    }

    /// Maps an HTTP status outside 2xx onto the taxonomy. 401/403 is the
    /// authentication-final case and aborts the run.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            RemoteError::Auth
        } else if status.is_server_error() {
            RemoteError::BadResponse {
                status: status.as_u16(),
            }
        } else {
            RemoteError::BadRequest {
                status: status.as_u16(),
            }
        }
    }

    /// Wraps a wire-level failure. Connection establishment failures are
    /// the DNS/transient class; everything else stays unclassified.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() {
            RemoteError::Dns(err.to_string())
        } else {
            RemoteError::Transport(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            RemoteError::from_status(reqwest::StatusCode::UNAUTHORIZED),
            RemoteError::Auth
        ));
        assert!(matches!(
            RemoteError::from_status(reqwest::StatusCode::BAD_GATEWAY),
            RemoteError::BadResponse { status: 502 }
        ));
        assert!(matches!(
            RemoteError::from_status(reqwest::StatusCode::NOT_FOUND),
            RemoteError::BadRequest { status: 404 }
        ));
    }

    #[test]
    fn recoverability_split() {
        assert!(RemoteError::Dns("lookup failed".into()).is_recoverable());
        assert!(RemoteError::Verification {
            uuid: "a1".into(),
            reason: "size".into()
        }
        .is_recoverable());
        assert!(!RemoteError::Auth.is_recoverable());
        assert!(!RemoteError::Decode("bad json".into()).is_recoverable());
    }
}
