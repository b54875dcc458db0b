//! Cosmos DB account key
//!
//! The key is wrapped in [`secrecy::Secret`]: it is zeroized on drop, redacted
//! from `Debug` output and only read back through `expose_secret()` when the
//! SDK client is built. Serializing a configuration never writes the key out.
//!
//! ```rust
//! use bulkwriter::config::account_key;
//! use secrecy::ExposeSecret;
//!
//! let key = account_key("c2VjcmV0");
//! assert_eq!(key.expose_secret().as_str(), "c2VjcmV0");
//! assert!(!format!("{key:?}").contains("c2VjcmV0"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

const REDACTED: &str = "[REDACTED]";

/// Raw key material held inside an [`AccountKey`]
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct KeyMaterial(String);

impl CloneableSecret for KeyMaterial {}
impl DebugSecret for KeyMaterial {}
impl SerializableSecret for KeyMaterial {}

impl KeyMaterial {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Serialize for KeyMaterial {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for KeyMaterial {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(KeyMaterial)
    }
}

/// Account key as stored in [`CosmosDbConfig`](super::CosmosDbConfig)
pub type AccountKey = Secret<KeyMaterial>;

/// Wraps a plain key
pub fn account_key(value: impl Into<String>) -> AccountKey {
    Secret::new(KeyMaterial(value.into()))
}
