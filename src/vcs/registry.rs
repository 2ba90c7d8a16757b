//! Registry mapping repository kinds to their version control adapters

use crate::config::schema::VcsConfig;
use crate::error::{VcsError, VcsResult};
use crate::repository::VcsKind;
use crate::vcs::git::GitVcs;
use crate::vcs::VersionControlSystem;
use std::collections::HashMap;
use std::sync::Arc;

/// Flat lookup of adapters by [`VcsKind`]
#[derive(Clone, Default)]
pub struct VcsRegistry {
    systems: HashMap<VcsKind, Arc<dyn VersionControlSystem>>,
}

impl VcsRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every adapter this crate ships
    pub fn with_defaults(config: &VcsConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GitVcs::new(config.git_program.clone())));
        registry
    }

    /// Add an adapter, replacing any previous one for the same kind
    pub fn register(&mut self, system: Arc<dyn VersionControlSystem>) -> &mut Self {
        self.systems.insert(system.kind(), system);
        self
    }

    /// Adapter for a repository kind
    pub fn get(&self, kind: VcsKind) -> VcsResult<Arc<dyn VersionControlSystem>> {
        self.systems
            .get(&kind)
            .cloned()
            .ok_or_else(|| VcsError::UnsupportedVcs(kind.to_string()))
    }

    /// Kinds with a registered adapter, sorted by name
    pub fn kinds(&self) -> Vec<VcsKind> {
        let mut kinds: Vec<VcsKind> = self.systems.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

impl std::fmt::Debug for VcsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VcsRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
