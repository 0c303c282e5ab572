use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persistence::Persistable;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    pub name: String,

    pub job_agent_id: Option<String>,
}

impl Persistable<Deployment> for Deployment {
    fn get_id(&self) -> String {
        self.id.clone()
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub id: String,
    pub deployment_id: String,
    pub version: String,

    pub created_at: DateTime<Utc>,
}

impl Persistable<Release> for Release {
    fn get_id(&self) -> String {
        self.id.clone()
    }
}
