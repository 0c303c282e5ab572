use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

use crate::persistence::Persistable;

pub type Labels = BTreeMap<String, String>;

/// Resource type of a target. Providers may report kinds this crate has no
/// dedicated handling for, which are carried through verbatim.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(from = "String", into = "String")]
pub enum TargetKind {
    KubernetesApi,
    KubernetesNamespace,
    Other(String),
}

impl TargetKind {
    pub fn as_str(&self) -> &str {
        match self {
            TargetKind::KubernetesApi => "KubernetesAPI",
            TargetKind::KubernetesNamespace => "KubernetesNamespace",
            TargetKind::Other(kind) => kind,
        }
    }
}

impl From<String> for TargetKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "KubernetesAPI" => TargetKind::KubernetesApi,
            "KubernetesNamespace" => TargetKind::KubernetesNamespace,
            _ => TargetKind::Other(kind),
        }
    }
}

impl From<TargetKind> for String {
    fn from(kind: TargetKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: String,
    pub workspace_id: String,
    pub provider_id: Option<String>,

    pub identifier: String,
    pub name: String,
    pub kind: TargetKind,
    pub version: String,

    pub config: serde_json::Value,
    pub labels: Labels,

    pub locked_at: Option<DateTime<Utc>>,
}

impl Target {
    pub const IDENTIFIER_SEPARATOR: char = '/';

    pub fn make_identifier(segments: &[&str]) -> String {
        segments.join(&Self::IDENTIFIER_SEPARATOR.to_string())
    }

    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    /// True when both records describe the same inventory row.
    pub fn same_key(&self, other: &Target) -> bool {
        self.workspace_id == other.workspace_id && self.identifier == other.identifier
    }
}

impl Persistable<Target> for Target {
    fn get_id(&self) -> String {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_kind_text_form() {
        assert_eq!(TargetKind::KubernetesApi.to_string(), "KubernetesAPI");
        assert_eq!(
            TargetKind::from("KubernetesNamespace".to_string()),
            TargetKind::KubernetesNamespace
        );
        assert_eq!(
            TargetKind::from("VirtualMachine".to_string()),
            TargetKind::Other("VirtualMachine".to_string())
        );

        let serialized = serde_json::to_string(&TargetKind::KubernetesApi).unwrap();
        assert_eq!(serialized, "\"KubernetesAPI\"");
    }

    #[test]
    fn test_make_identifier() {
        assert_eq!(
            Target::make_identifier(&["my-project", "prod", "default"]),
            "my-project/prod/default"
        );
    }
}
