// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `SessionRuntime` (spec §4.1): a mapping from transport ID to an open
//! [`Session`], created lazily and torn down together.

use crate::error::SessionError;
use crate::local::LocalSession;
use crate::session::Session;
use crate::transport_scoped::TransportScopedSession;
use opal_core::LOCAL_TRANSPORT;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a `Session` for a transport ID not yet seen. Fallible: remote
/// factories may need to dial out.
pub type SessionFactory =
    Arc<dyn Fn(&str) -> Result<Arc<dyn Session>, Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

/// The default factory (spec §4.1): `"local"` gets a bare [`LocalSession`];
/// anything else gets a [`TransportScopedSession`] shim wrapping one. Real
/// remote transports are expected to supply their own factory.
pub fn default_factory() -> SessionFactory {
    Arc::new(|transport_id: &str| {
        let session: Arc<dyn Session> = if transport_id == LOCAL_TRANSPORT {
            Arc::new(LocalSession::new())
        } else {
            TransportScopedSessionBuilder::build(transport_id)
        };
        Ok(session)
    })
}

/// Indirection purely so `default_factory` reads as a single expression per
/// branch; `TransportScopedSession::new` itself does the freezing.
struct TransportScopedSessionBuilder;

impl TransportScopedSessionBuilder {
    fn build(transport_id: &str) -> Arc<dyn Session> {
        let base: Arc<dyn Session> = Arc::new(LocalSession::new());
        Arc::new(TransportScopedSession::new(transport_id, base))
    }
}

/// Owns every open session, keyed by transport ID. Access is serialized by
/// a single mutex.
pub struct SessionRuntime {
    sessions: Mutex<HashMap<String, Arc<dyn Session>>>,
    factory: SessionFactory,
}

impl SessionRuntime {
    pub fn new(factory: SessionFactory) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), factory }
    }

    pub fn with_default_factory() -> Self {
        Self::new(default_factory())
    }

    /// Return the cached session for `transport_id`, creating one via the
    /// factory on first use. Empty IDs normalize to `"local"`.
    pub fn session_for(&self, transport_id: &str) -> Result<Arc<dyn Session>, SessionError> {
        let transport_id = if transport_id.is_empty() { LOCAL_TRANSPORT } else { transport_id };

        let mut sessions = self.sessions.lock();
        if let Some(existing) = sessions.get(transport_id) {
            return Ok(Arc::clone(existing));
        }

        let created = (self.factory)(transport_id).map_err(|source| SessionError::FactoryFailed {
            transport_id: transport_id.to_string(),
            source,
        })?;
        sessions.insert(transport_id.to_string(), Arc::clone(&created));
        Ok(created)
    }

    /// Close every cached session, ignoring individual errors, and empty
    /// the map.
    pub async fn close(&self) {
        let sessions: Vec<Arc<dyn Session>> = {
            let mut guard = self.sessions.lock();
            guard.drain().map(|(_, session)| session).collect()
        };
        for session in sessions {
            let _ = session.close().await;
        }
    }
}
