use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trellis_core::string_enum;
use uuid::Uuid;

use crate::persistence::Persistable;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    NewRelease,
    NewTarget,
    TargetChanged,
    ApiCall,
    Redeploy,
    ForceDeploy,
}

string_enum!(TriggerType {
    NewRelease => "new_release",
    NewTarget => "new_target",
    TargetChanged => "target_changed",
    ApiCall => "api_call",
    Redeploy => "redeploy",
    ForceDeploy => "force_deploy",
});

/// Request to consider a release for deployment into an environment,
/// optionally pinned to one target.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseJobTrigger {
    pub id: String,
    pub trigger_type: TriggerType,

    pub release_id: String,
    pub environment_id: String,
    pub target_id: Option<String>,

    pub caused_by_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ReleaseJobTrigger {
    pub fn new(
        trigger_type: TriggerType,
        release_id: &str,
        environment_id: &str,
        target_id: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            trigger_type,
            release_id: release_id.to_string(),
            environment_id: environment_id.to_string(),
            target_id: target_id.map(str::to_string),
            caused_by_id: None,
            created_at: Utc::now(),
        }
    }
}

impl Persistable<ReleaseJobTrigger> for ReleaseJobTrigger {
    fn get_id(&self) -> String {
        self.id.clone()
    }
}
