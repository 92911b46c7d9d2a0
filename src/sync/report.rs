use serde::{Deserialize, Serialize};

/// Counters for one project in one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSyncStats {
    pub project: String,
    /// In-range signatures examined
    pub scanned: usize,
    /// Burn events classified
    pub found: usize,
    pub inserted: usize,
    /// Already stored
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl ProjectSyncStats {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Default::default()
        }
    }
}

/// Result of `run_sync`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub added: usize,
    pub skipped: usize,
    /// Prefixed with the project slug
    pub errors: Vec<String>,
    pub projects: Vec<ProjectSyncStats>,
    pub dry_run: bool,
    /// Set when the deadline or a cancel request cut the run short
    pub interrupted: bool,
}

impl SyncReport {
    pub fn push(&mut self, stats: ProjectSyncStats) {
        self.added += stats.inserted;
        self.skipped += stats.skipped;
        self.errors
            .extend(stats.errors.iter().map(|e| format!("{}: {}", stats.project, e)));
        self.projects.push(stats);
    }

    pub fn total_found(&self) -> usize {
        self.projects.iter().map(|p| p.found).sum()
    }

    pub fn total_scanned(&self) -> usize {
        self.projects.iter().map(|p| p.scanned).sum()
    }
}
