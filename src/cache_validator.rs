use sha2::{Digest, Sha256};

/// Session entry with a SHA-256 checksum of its payload.
///
/// Every value written to the session cache is wrapped in one of these so
/// that a truncated or hand-edited entry reads back as "no data" instead of
/// being rendered.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidatedCacheEntry {
    /// The stored value (JSON text)
    pub data: String,
    /// SHA-256 checksum of the data (hex encoded)
    pub checksum: String,
}

impl ValidatedCacheEntry {
    pub fn new(data: String) -> Self {
        let checksum = Self::compute_checksum(&data);
        Self { data, checksum }
    }

    fn compute_checksum(data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Returns true if the checksum matches the data.
    pub fn is_valid(&self) -> bool {
        Self::compute_checksum(&self.data) == self.checksum
    }

    /// JSON string with both data and checksum.
    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Returns the payload if the entry decodes and its checksum matches.
    pub fn deserialize_and_validate(serialized: &str) -> Option<String> {
        let entry: ValidatedCacheEntry = match serde_json::from_str(serialized) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Session entry is not a valid envelope: {}", e);
                return None;
            }
        };

        if entry.is_valid() {
            Some(entry.data)
        } else {
            tracing::warn!(
                "Session entry failed validation: checksum mismatch. Expected: {}, Data length: {}",
                entry.checksum,
                entry.data.len()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let data = r#"{"riskLevel":"low"}"#.to_string();
        let serialized = ValidatedCacheEntry::new(data.clone()).serialize().unwrap();

        assert_eq!(
            ValidatedCacheEntry::deserialize_and_validate(&serialized),
            Some(data)
        );
    }

    #[test]
    fn test_tampered_entry_rejected() {
        let serialized = ValidatedCacheEntry::new(r#""Panadería Sol""#.to_string())
            .serialize()
            .unwrap();
        let tampered = serialized.replace("Sol", "Luna");

        assert_eq!(ValidatedCacheEntry::deserialize_and_validate(&tampered), None);
    }

    #[test]
    fn test_garbage_rejected() {
        assert_eq!(ValidatedCacheEntry::deserialize_and_validate("not json"), None);
    }
}
