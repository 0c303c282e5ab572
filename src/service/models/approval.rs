use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trellis_core::string_enum;
use uuid::Uuid;

use crate::persistence::Persistable;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

string_enum!(ApprovalStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

/// At most one approval exists per (policy, release) pair.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentPolicyApproval {
    pub id: String,
    pub policy_id: String,
    pub release_id: String,

    pub status: ApprovalStatus,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl EnvironmentPolicyApproval {
    pub fn pending(policy_id: &str, release_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            policy_id: policy_id.to_string(),
            release_id: release_id.to_string(),
            status: ApprovalStatus::Pending,
            resolved_at: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == ApprovalStatus::Approved
    }
}

impl Persistable<EnvironmentPolicyApproval> for EnvironmentPolicyApproval {
    fn get_id(&self) -> String {
        self.id.clone()
    }
}
