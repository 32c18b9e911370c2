//! Admin session types for Handover.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::message::Role;

/// Presence status of an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminStatus {
    Online,
    Away,
    Offline,
}

impl fmt::Display for AdminStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminStatus::Online => write!(f, "online"),
            AdminStatus::Away => write!(f, "away"),
            AdminStatus::Offline => write!(f, "offline"),
        }
    }
}

impl FromStr for AdminStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(AdminStatus::Online),
            "away" => Ok(AdminStatus::Away),
            "offline" => Ok(AdminStatus::Offline),
            other => Err(format!("invalid admin status: '{other}'")),
        }
    }
}

/// An admin's presence record.
///
/// Identity and role arrive with the admin's join event, already validated
/// upstream; this service stores them as-is. The set of conversations an
/// admin owns concurrently is bounded by `MAX_CONCURRENT`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSession {
    pub admin_id: Uuid,
    pub admin_name: String,
    pub role: Role,
    pub status: AdminStatus,
    pub last_seen: DateTime<Utc>,
}

impl AdminSession {
    /// Maximum conversations a single admin may own at once.
    pub const MAX_CONCURRENT: usize = 5;

    /// A freshly joined, online admin.
    pub fn online(admin_id: Uuid, admin_name: impl Into<String>, role: Role) -> Self {
        Self {
            admin_id,
            admin_name: admin_name.into(),
            role,
            status: AdminStatus::Online,
            last_seen: Utc::now(),
        }
    }
}

/// Identity of an admin as supplied by the upstream identity collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminIdentity {
    pub admin_id: Uuid,
    pub admin_name: String,
    pub role: Role,
}
