use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::ids::StreamId;

/// Errors from stream registration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Stream already registered: {0}")]
    AlreadyRegistered(StreamId),
}

/// Map from stream id to the token that cancels it.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    streams: Mutex<HashMap<StreamId, CancellationToken>>,
}

impl StreamRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<StreamId, CancellationToken>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a fresh token under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyRegistered`] if `id` is live.
    pub fn register(&self, id: StreamId) -> Result<CancellationToken, RegistryError> {
        let mut streams = self.lock();
        if streams.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }
        let token = CancellationToken::new();
        streams.insert(id.clone(), token.clone());
        debug!(stream_id = %id, active = streams.len(), "Stream registered");
        Ok(token)
    }

    /// Register a newly generated stream id and tie its removal to the guard.
    #[must_use]
    pub fn register_guarded(self: &Arc<Self>) -> StreamGuard {
        loop {
            let id = StreamId::generate();
            if let Ok(token) = self.register(id.clone()) {
                return StreamGuard {
                    registry: Arc::clone(self),
                    id,
                    token,
                };
            }
        }
    }

    /// Cancel and remove a stream. Returns false if it was not registered.
    ///
    /// The token is cancelled before the lock is released, so once
    /// [`cleanup`](Self::cleanup) has run, every `cancel` that returned true
    /// is visible on the token.
    pub fn cancel(&self, id: &StreamId) -> bool {
        let mut streams = self.lock();
        let Some(token) = streams.remove(id) else {
            return false;
        };
        token.cancel();
        drop(streams);
        info!(stream_id = %id, "Stream cancelled");
        true
    }

    /// Remove a stream without cancelling it. Idempotent.
    pub fn cleanup(&self, id: &StreamId) {
        if self.lock().remove(id).is_some() {
            debug!(stream_id = %id, "Stream deregistered");
        }
    }

    #[must_use]
    pub fn is_registered(&self, id: &StreamId) -> bool {
        self.lock().contains_key(id)
    }

    /// Number of live streams.
    #[must_use]
    pub fn size(&self) -> usize {
        self.lock().len()
    }
}

/// Registration that removes itself from the registry when dropped.
#[derive(Debug)]
pub struct StreamGuard {
    registry: Arc<StreamRegistry>,
    id: StreamId,
    token: CancellationToken,
}

impl StreamGuard {
    #[must_use]
    pub const fn id(&self) -> &StreamId {
        &self.id
    }

    /// The stream's cancellation token.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.registry.cleanup(&self.id);
    }
}
