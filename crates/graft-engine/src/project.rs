//! Several codebases side by side, addressed by id.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::codebase::Codebase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub u32);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "project{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct ProjectArena {
    projects: DashMap<ProjectId, Arc<Codebase>>,
    next: AtomicU32,
}

impl ProjectArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, codebase: Codebase) -> ProjectId {
        let id = ProjectId(self.next.fetch_add(1, Ordering::Relaxed));
        tracing::debug!("Registered {} at {}", id, codebase.root().display());
        self.projects.insert(id, Arc::new(codebase));
        id
    }

    pub fn get(&self, id: ProjectId) -> Option<Arc<Codebase>> {
        self.projects.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, id: ProjectId) -> Option<Arc<Codebase>> {
        self.projects.remove(&id).map(|(_, codebase)| codebase)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<ProjectId> {
        let mut ids: Vec<ProjectId> = self.projects.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
