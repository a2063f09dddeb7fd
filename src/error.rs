use crate::remote::RemoteError;
use crate::store::StoreError;

/// Top-level error taxonomy of a sync run. The engine's retry loop matches
/// on [`SyncError::is_recoverable`]; everything else aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("album {uuid} refers to missing parent {parent}")]
    DanglingParent { uuid: String, parent: String },

    #[error("cycle in album hierarchy involving {uuid}")]
    HierarchyCycle { uuid: String },

    #[error("retry budget exhausted after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<SyncError>,
    },
}

impl SyncError {
    /// Transport failures worth refreshing the session and retrying the
    /// whole attempt for. Local and invariant failures never are.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SyncError::Remote(err) => err.is_recoverable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classes_drive_recoverability() {
        assert!(SyncError::Remote(RemoteError::BadResponse { status: 503 }).is_recoverable());
        assert!(SyncError::Remote(RemoteError::BadRequest { status: 410 }).is_recoverable());
        assert!(!SyncError::Remote(RemoteError::Auth).is_recoverable());
    }

    #[test]
    fn invariant_and_budget_errors_are_fatal() {
        let dangling = SyncError::DanglingParent {
            uuid: "a1".into(),
            parent: "f1".into(),
        };
        assert!(!dangling.is_recoverable());

        let exhausted = SyncError::RetriesExhausted {
            attempts: 3,
            source: Box::new(SyncError::Remote(RemoteError::BadResponse { status: 500 })),
        };
        assert!(!exhausted.is_recoverable());
    }
}
