//! Comparison of remote cache reads against a local shadow cache.

use std::fmt::Debug;
use std::sync::Arc;

use tracing::{debug, warn};

use super::InMemoryCache;
use crate::error::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivergenceKind {
    /// Remote had it, local didn't.
    RemoteOnly,
    /// Local had it, remote didn't. The local value is served.
    LocalOnly,
    /// Both had it with different contents. The remote value is served.
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub entity: EntityKind,
    pub id: u64,
    pub kind: DivergenceKind,
}

/// Receives divergence reports.
pub trait DivergenceReporter: Send + Sync {
    fn report(&self, divergence: &Divergence);
}

/// Reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl DivergenceReporter for LogReporter {
    fn report(&self, divergence: &Divergence) {
        debug!(
            entity = %divergence.entity,
            id = divergence.id,
            kind = ?divergence.kind,
            "Remote cache diverged from local cache"
        );
    }
}

/// Shadow cache plus the reporter divergences go to.
#[derive(Clone)]
pub struct DivergenceAudit {
    local: Arc<InMemoryCache>,
    reporter: Arc<dyn DivergenceReporter>,
}

impl DivergenceAudit {
    pub fn new(local: Arc<InMemoryCache>) -> Self {
        Self::with_reporter(local, Arc::new(LogReporter))
    }

    pub fn with_reporter(local: Arc<InMemoryCache>, reporter: Arc<dyn DivergenceReporter>) -> Self {
        Self { local, reporter }
    }

    pub fn local(&self) -> &Arc<InMemoryCache> {
        &self.local
    }

    /// Pick the value to serve and report any disagreement.
    pub fn reconcile<T: PartialEq + Debug>(
        &self,
        entity: EntityKind,
        id: u64,
        remote: Option<T>,
        local: Option<T>,
    ) -> Option<T> {
        let kind = match (&remote, &local) {
            (Some(r), Some(l)) if r != l => DivergenceKind::Mismatch,
            (Some(_), None) => DivergenceKind::RemoteOnly,
            (None, Some(_)) => {
                warn!("Remote cache is missing {} {}, serving local copy", entity, id);
                DivergenceKind::LocalOnly
            }
            _ => return remote,
        };

        self.reporter.report(&Divergence { entity, id, kind });

        match kind {
            DivergenceKind::LocalOnly => local,
            _ => remote,
        }
    }
}
