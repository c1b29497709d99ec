//! Protocol messages.
//!
//! Field names on the wire are capitalized (`Name`, `Data`, `Saves`,
//! `LastModifiedDate`) to stay compatible with existing MineSync servers.

use crate::codec::Message;
use serde::{Deserialize, Serialize};

/// A named payload exchanged over the upload and download endpoints.
///
/// Uploads carry the archive name and archive bytes. A download request
/// carries the wanted archive name and no data; the response carries the
/// archive name and bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEnvelope {
    /// Archive name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Archive bytes, empty for requests.
    #[serde(rename = "Data", with = "serde_bytes", default)]
    pub data: Vec<u8>,
}

impl SyncEnvelope {
    /// Creates an envelope carrying data.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Creates a download request for the named archive.
    pub fn request(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// Returns true if the envelope carries no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Message for SyncEnvelope {}

/// One save known to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRecord {
    /// Archive name under which the save is stored.
    #[serde(rename = "Name")]
    pub name: String,
    /// Last modification time, milliseconds since the Unix epoch.
    #[serde(rename = "LastModifiedDate")]
    pub last_modified: u64,
}

impl SaveRecord {
    /// Creates a new record.
    pub fn new(name: impl Into<String>, last_modified: u64) -> Self {
        Self {
            name: name.into(),
            last_modified,
        }
    }
}

/// The full listing served by the manifest endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveManifest {
    /// All saves on the remote store.
    #[serde(rename = "Saves", default)]
    pub saves: Vec<SaveRecord>,
}

impl SaveManifest {
    /// Creates a manifest from records.
    pub fn new(saves: Vec<SaveRecord>) -> Self {
        Self { saves }
    }

    /// Number of saves listed.
    pub fn len(&self) -> usize {
        self.saves.len()
    }

    /// Returns true if no saves are listed.
    pub fn is_empty(&self) -> bool {
        self.saves.is_empty()
    }
}

impl Message for SaveManifest {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use ciborium::Value;

    #[test]
    fn envelope_roundtrip() {
        let envelope = SyncEnvelope::new("minesync_World_1.zip", vec![1, 2, 3]);
        let bytes = envelope.encode().unwrap();
        let decoded = SyncEnvelope::decode(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn envelope_data_is_a_byte_string() {
        let bytes = SyncEnvelope::new("n", vec![7, 8]).encode().unwrap();
        let value: Value = ciborium::from_reader(bytes.as_slice()).unwrap();
        let map = value.as_map().unwrap();

        let data = map
            .iter()
            .find(|(k, _)| k.as_text() == Some("Data"))
            .map(|(_, v)| v)
            .unwrap();
        assert_eq!(data.as_bytes(), Some(&vec![7u8, 8]));
        assert!(map.iter().any(|(k, _)| k.as_text() == Some("Name")));
    }

    #[test]
    fn request_without_data_field_decodes() {
        let value = Value::Map(vec![(
            Value::Text("Name".into()),
            Value::Text("minesync_A.zip".into()),
        )]);
        let mut bytes = Vec::new();
        ciborium::into_writer(&value, &mut bytes).unwrap();

        let envelope = SyncEnvelope::decode(&bytes).unwrap();
        assert_eq!(envelope.name, "minesync_A.zip");
        assert!(envelope.is_empty());
    }

    #[test]
    fn envelope_missing_name_is_malformed() {
        let value = Value::Map(vec![(Value::Text("Data".into()), Value::Bytes(vec![1]))]);
        let mut bytes = Vec::new();
        ciborium::into_writer(&value, &mut bytes).unwrap();

        let result = SyncEnvelope::decode(&bytes);
        assert!(matches!(result, Err(ProtocolError::Malformed { .. })));
    }

    #[test]
    fn manifest_roundtrip() {
        let manifest = SaveManifest::new(vec![
            SaveRecord::new("minesync_World_1.zip", 1_700_000_000_000),
            SaveRecord::new("minesync_New.zip", 10),
        ]);
        let bytes = manifest.encode().unwrap();
        let decoded = SaveManifest::decode(&bytes).unwrap();
        assert_eq!(decoded, manifest);
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn truncated_manifest_is_an_error() {
        let manifest = SaveManifest::new(vec![SaveRecord::new("minesync_World_1.zip", 100)]);
        let bytes = manifest.encode().unwrap();

        for cut in 0..bytes.len() {
            let result = SaveManifest::decode(&bytes[..cut]);
            assert!(
                matches!(result, Err(ProtocolError::Truncated)),
                "prefix of {cut} bytes decoded as {result:?}"
            );
        }
    }
}
