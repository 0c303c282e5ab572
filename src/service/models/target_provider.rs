use serde::{Deserialize, Serialize};

use crate::persistence::Persistable;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleProviderConfig {
    pub project_ids: Vec<String>,
    pub impersonate_service_account: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TargetProviderConfig {
    Google(GoogleProviderConfig),
}

impl TargetProviderConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            TargetProviderConfig::Google(_) => "google",
        }
    }

    /// Delegated identity scans run as, if any.
    pub fn principal(&self) -> Option<&str> {
        match self {
            TargetProviderConfig::Google(config) => config.impersonate_service_account.as_deref(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetProvider {
    pub id: String,
    pub workspace_id: String,
    pub name: String,

    pub config: TargetProviderConfig,
}

impl Persistable<TargetProvider> for TargetProvider {
    fn get_id(&self) -> String {
        self.id.clone()
    }
}
