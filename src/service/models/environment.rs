use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trellis_core::string_enum;

use crate::persistence::Persistable;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalRequirement {
    Manual,
    Automatic,
}

string_enum!(ApprovalRequirement {
    Manual => "manual",
    Automatic => "automatic",
});

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentPolicy {
    pub id: String,
    pub name: String,

    pub approval_requirement: ApprovalRequirement,
}

impl EnvironmentPolicy {
    pub fn requires_approval(&self) -> bool {
        self.approval_requirement == ApprovalRequirement::Manual
    }
}

impl Persistable<EnvironmentPolicy> for EnvironmentPolicy {
    fn get_id(&self) -> String {
        self.id.clone()
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub id: String,
    pub name: String,
    pub policy_id: Option<String>,

    pub deleted_at: Option<DateTime<Utc>>,
}

impl Environment {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Persistable<Environment> for Environment {
    fn get_id(&self) -> String {
        self.id.clone()
    }
}
