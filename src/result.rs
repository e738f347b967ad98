use serde::Serialize;

use crate::cli::Mode;
use crate::model::metadata::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Saved,
    Deleted,
    Skipped,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Saved => write!(f, "SAVED"),
            Action::Deleted => write!(f, "DELETED"),
            Action::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// One connection applied on the federation server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub role: Role,
    /// Friendly name; deletes address connections by entity and role only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityOutcome {
    pub entity_id: String,
    pub action: Action,
    pub connections: Vec<Connection>,
}

impl EntityOutcome {
    pub fn skipped(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            action: Action::Skipped,
            connections: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub entities: usize,
    pub skipped: usize,
    pub connections: usize,
}

/// What a run did, in processing order. Kept up to date while the run
/// progresses so it can be printed after an abort.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub mode: Mode,
    pub source: String,
    pub dry_run: bool,
    pub entities: Vec<EntityOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(mode: Mode, source: &str, dry_run: bool) -> Self {
        Self {
            mode,
            source: source.to_string(),
            dry_run,
            entities: Vec::new(),
            error: None,
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            entities: self.entities.len(),
            skipped: self
                .entities
                .iter()
                .filter(|e| e.action == Action::Skipped)
                .count(),
            connections: self.entities.iter().map(|e| e.connections.len()).sum(),
        }
    }
}
