use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decoded content of a bundle's `info.json`.
///
/// `hash` identifies the bundle across scans and `javid` is the naming key
/// every derived catalog record is prefixed with. All other keys written by
/// the producer are kept in `extra` so the video service sees the manifest as
/// it was uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub hash: String,
    #[serde(rename = "JAVID")]
    pub javid: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BundleManifest {
    pub fn new(hash: impl Into<String>, javid: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            javid: javid.into(),
            extra: Map::new(),
        }
    }

    /// Prefix shared by every record name derived from this bundle.
    pub fn record_prefix(&self) -> String {
        format!("{}_", self.javid)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_unknown_keys_and_renames_naming_key() {
        let manifest: BundleManifest = serde_json::from_str(
            r#"{"hash":"abc","JAVID":"ABC-123","title":"Clip","tags":["a"]}"#,
        )
        .expect("valid manifest json");

        assert_eq!(manifest.hash, "abc");
        assert_eq!(manifest.javid, "ABC-123");
        assert_eq!(manifest.field("title"), Some(&Value::from("Clip")));
        assert_eq!(manifest.record_prefix(), "ABC-123_");

        let round = serde_json::to_value(&manifest).expect("serialize");
        assert_eq!(round["JAVID"], "ABC-123");
        assert_eq!(round["tags"][0], "a");
    }
}
