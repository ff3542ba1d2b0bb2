//! Runtime feature flag configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Runtime backend variant selection.
///
/// Each entry names the variant to use for a capability that has more than
/// one variant compiled into this artifact, e.g.:
///
/// ```toml
/// [features]
/// storage = "postgres"
/// spool = "memory"
/// ```
///
/// Selections are validated against the compiled-in catalog at startup; a
/// variant that is not compiled in is a startup failure, never a silent
/// fallback.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct FeaturesConfig {
    /// Capability name → requested variant identifier.
    pub requested: BTreeMap<String, String>,
}

impl FeaturesConfig {
    /// Iterate requested (capability, variant) pairs in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.requested
            .iter()
            .map(|(c, v)| (c.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparent_table_shape() {
        let parsed: FeaturesConfig =
            serde_json::from_str(r#"{"storage": "postgres", "spool": "memory"}"#)
                .expect("deserialize");
        assert_eq!(parsed.requested.get("storage").unwrap(), "postgres");
        assert_eq!(parsed.requested.get("spool").unwrap(), "memory");
    }

    #[test]
    fn test_iter_is_sorted() {
        let parsed: FeaturesConfig =
            serde_json::from_str(r#"{"spool": "memory", "storage": "maildir"}"#)
                .expect("deserialize");
        let pairs: Vec<_> = parsed.iter().collect();
        assert_eq!(pairs, vec![("spool", "memory"), ("storage", "maildir")]);
    }
}
