//! Sync incident journal model.
//!
//! Incidents record every point where local state and the policy store
//! were left apart, with enough detail for manual reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IncidentKind {
    PartialSync,
    CascadeIncomplete,
    HandoverIncomplete,
}

impl IncidentKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            IncidentKind::PartialSync => "PartialSync",
            IncidentKind::CascadeIncomplete => "CascadeIncomplete",
            IncidentKind::HandoverIncomplete => "HandoverIncomplete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PartialSync" => Some(IncidentKind::PartialSync),
            "CascadeIncomplete" => Some(IncidentKind::CascadeIncomplete),
            "HandoverIncomplete" => Some(IncidentKind::HandoverIncomplete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncIncident {
    pub id: Uuid,
    pub kind: IncidentKind,
    /// The employee, team or department the operation was acting on.
    pub entity_id: String,
    pub principal: Option<String>,
    pub failed: Vec<String>,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSyncIncident {
    pub kind: IncidentKind,
    pub entity_id: String,
    pub principal: Option<String>,
    pub failed: Vec<String>,
    pub detail: String,
}
