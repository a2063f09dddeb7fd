use tokio::sync::mpsc;

/// Tagged progress records emitted by the engine, monotonic within a
/// phase. Consumers only observe; they cannot influence the run.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    AttemptStarted {
        attempt: u32,
    },
    Fetched {
        remote_assets: usize,
        remote_albums: usize,
        local_assets: usize,
        local_albums: usize,
    },
    Diffed {
        assets_to_add: usize,
        assets_to_delete: usize,
        albums_to_add: usize,
        albums_to_delete: usize,
    },
    AssetDeleted {
        uuid: String,
    },
    AssetAdded {
        uuid: String,
    },
    AlbumRemoved {
        uuid: String,
    },
    AlbumCreated {
        uuid: String,
    },
    AttemptFailed {
        attempt: u32,
        error: String,
    },
    Completed {
        assets: usize,
        albums: usize,
    },
}

/// Sending side of the progress stream. A disconnected or absent receiver
/// never affects the run; events are simply dropped.
#[derive(Clone)]
pub struct ProgressSender(Option<mpsc::UnboundedSender<SyncEvent>>);

impl ProgressSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(Some(tx)), rx)
    }

    pub fn disabled() -> Self {
        Self(None)
    }

    pub fn emit(&self, event: SyncEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}
