use semver::{BuildMetadata, Version};
use serde_json::Value;

use crate::models::Labels;

/// Parses a control plane or node version such as `1.29.4-gke.1043002`,
/// falling back to `0.0.0` when it is missing or malformed. Build metadata
/// is dropped.
pub fn parse_version_or_default(version: Option<&str>) -> Version {
    version
        .and_then(|version| Version::parse(version.trim().trim_start_matches('v')).ok())
        .map(|version| Version {
            build: BuildMetadata::EMPTY,
            ..version
        })
        .unwrap_or_else(|| Version::new(0, 0, 0))
}

/// Adds the `{prefix}`, `{prefix}-major`, `{prefix}-minor` and
/// `{prefix}-patch` labels for `version`.
pub fn insert_version_labels(labels: &mut Labels, prefix: &str, version: &Version) {
    labels.insert(prefix.to_string(), version.to_string());
    labels.insert(format!("{prefix}-major"), version.major.to_string());
    labels.insert(format!("{prefix}-minor"), version.minor.to_string());
    labels.insert(format!("{prefix}-patch"), version.patch.to_string());
}

/// Inserts `key` only when the fact is known.
pub fn insert_present<V: ToString>(labels: &mut Labels, key: &str, value: Option<V>) {
    if let Some(value) = value {
        labels.insert(key.to_string(), value.to_string());
    }
}

/// `child` wins on key collision. Values are opaque strings, never merged
/// structurally.
pub fn merge_labels(parent: &Labels, child: &Labels) -> Labels {
    let mut merged = parent.clone();

    for (key, value) in child {
        merged.insert(key.clone(), value.clone());
    }

    merged
}

/// Recursive object merge. Objects are merged key by key; any other value in
/// `overlay` replaces what is in `base`.
pub fn merge_config(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();

            for (key, overlay_value) in overlay {
                let merged_value = match merged.get(key) {
                    Some(base_value) => merge_config(base_value, overlay_value),
                    None => overlay_value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }

            Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_gke_version() {
        let version = parse_version_or_default(Some("1.29.4-gke.1043002"));

        assert_eq!(version.major, 1);
        assert_eq!(version.minor, 29);
        assert_eq!(version.patch, 4);
        assert_eq!(version.to_string(), "1.29.4-gke.1043002");

        let version = parse_version_or_default(Some(" v1.30.0+build.5"));
        assert_eq!(version.to_string(), "1.30.0");
    }

    #[test]
    fn test_malformed_version_falls_back() {
        for malformed in ["", "0", "1.29", "1.29.x", "01.2.3", "1.2.3.4", "1.2.3-"] {
            assert_eq!(
                parse_version_or_default(Some(malformed)),
                Version::new(0, 0, 0),
                "{malformed}"
            );
        }

        assert_eq!(parse_version_or_default(None).to_string(), "0.0.0");
    }

    #[test]
    fn test_version_labels() {
        let mut labels = Labels::new();
        let version = parse_version_or_default(Some("1.29.4-gke.1"));

        insert_version_labels(&mut labels, "kubernetes/master-version", &version);

        assert_eq!(labels["kubernetes/master-version"], "1.29.4-gke.1");
        assert_eq!(labels["kubernetes/master-version-major"], "1");
        assert_eq!(labels["kubernetes/master-version-minor"], "29");
        assert_eq!(labels["kubernetes/master-version-patch"], "4");
    }

    #[test]
    fn test_child_labels_win() {
        let cluster = Labels::from([
            ("region".to_string(), "us-1".to_string()),
            ("team".to_string(), "x".to_string()),
        ]);
        let namespace = Labels::from([("team".to_string(), "y".to_string())]);

        let merged = merge_labels(&cluster, &namespace);

        assert_eq!(
            merged,
            Labels::from([
                ("region".to_string(), "us-1".to_string()),
                ("team".to_string(), "y".to_string()),
            ])
        );
    }

    #[test]
    fn test_merge_config_is_deep() {
        let base = json!({
            "name": "prod",
            "cluster": { "endpoint": "https://10.0.0.1", "certificateAuthorityData": "ca" }
        });
        let overlay = json!({ "namespace": "default", "cluster": { "endpoint": "https://10.0.0.2" } });

        assert_eq!(
            merge_config(&base, &overlay),
            json!({
                "name": "prod",
                "namespace": "default",
                "cluster": { "endpoint": "https://10.0.0.2", "certificateAuthorityData": "ca" }
            })
        );
    }
}
