use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cart, CartEntry, SnapshotError};

/// Schema version written by this crate
pub const CART_SCHEMA_VERSION: u32 = 1;

/// Persisted form of a cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub entries: Vec<CartEntry>,
}

/// Every shape the store may hold. The legacy shape is the bare entry array
/// written before snapshots were versioned.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredCart {
    Versioned(CartSnapshot),
    Legacy(Vec<CartEntry>),
}

impl CartSnapshot {
    pub fn from_cart(cart: &Cart) -> Self {
        Self {
            version: CART_SCHEMA_VERSION,
            saved_at: Utc::now(),
            entries: cart.entries().to_vec(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode stored bytes, migrating older shapes to the current version
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot = match serde_json::from_slice::<StoredCart>(bytes) {
            Ok(StoredCart::Versioned(snapshot)) => snapshot,
            Ok(StoredCart::Legacy(entries)) => CartSnapshot {
                version: 0,
                saved_at: Utc::now(),
                entries,
            },
            // Re-parse as the current shape so the error names the real problem
            Err(_) => serde_json::from_slice::<CartSnapshot>(bytes)?,
        };

        if snapshot.version > CART_SCHEMA_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
                supported: CART_SCHEMA_VERSION,
            });
        }

        Ok(snapshot.migrate())
    }

    fn migrate(self) -> Self {
        // Version 0 differs only in framing; entries carry the same fields.
        Self {
            version: CART_SCHEMA_VERSION,
            ..self
        }
    }

    pub fn into_cart(self) -> Result<Cart, SnapshotError> {
        Ok(Cart::try_from_entries(self.entries)?)
    }
}
