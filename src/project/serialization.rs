// Chain codec - versioned encode/decode between chains and stored documents

use super::migration::{ensure_version, VersionCheck};
use super::store::KeyValueStore;
use super::types::{Chain, ChainDocument};
use super::PersistenceError;
use std::rc::Rc;

pub const SCHEMA_VERSION: &str = "1";
pub const VERSION_KEY: &str = "synthchain.version";
pub const CHAIN_KEY: &str = "synthchain.chain";

pub struct PersistenceCodec {
    store: Rc<dyn KeyValueStore>,
    version: String,
}

impl PersistenceCodec {
    /// Open the codec on `store` at the current schema version
    pub fn open(store: Rc<dyn KeyValueStore>) -> Self {
        Self::with_version(store, SCHEMA_VERSION)
    }

    /// Open with an explicit schema version. Stored state written under any
    /// other version is discarded.
    pub fn with_version(store: Rc<dyn KeyValueStore>, version: &str) -> Self {
        match ensure_version(store.as_ref(), VERSION_KEY, version) {
            Ok(VersionCheck::Current) => log::debug!("Schema version {} is current", version),
            Ok(VersionCheck::Reset { .. }) => {}
            Err(e) => log::warn!("Could not check stored schema version: {}", e),
        }

        Self {
            store,
            version: version.to_string(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn encode(&self, chain: &Chain) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(&chain.to_document())?)
    }

    pub fn try_decode(&self, document: &str) -> Result<Chain, PersistenceError> {
        let document: ChainDocument = serde_json::from_str(document)?;
        Chain::from_document(document)
    }

    /// Decode a stored document, falling back to the default chain when it
    /// is absent or malformed
    pub fn decode(&self, document: Option<&str>) -> Chain {
        let Some(document) = document else {
            log::debug!("No stored chain, using default");
            return Chain::default_chain();
        };

        match self.try_decode(document) {
            Ok(chain) => chain,
            Err(e) => {
                log::warn!("Stored chain is unreadable ({}), using default", e);
                Chain::default_chain()
            }
        }
    }

    /// Load the stored chain (or the default one)
    pub fn load(&self) -> Chain {
        match self.store.get(CHAIN_KEY) {
            Ok(document) => self.decode(document.as_deref()),
            Err(e) => {
                log::warn!("Could not read stored chain ({}), using default", e);
                Chain::default_chain()
            }
        }
    }

    pub fn save(&self, chain: &Chain) -> Result<(), PersistenceError> {
        let document = self.encode(chain)?;
        self.store.set(CHAIN_KEY, &document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::MemoryStore;
    use serde_json::{json, Value};

    fn codec() -> (MemoryStore, PersistenceCodec) {
        let store = MemoryStore::new();
        let codec = PersistenceCodec::open(Rc::new(store.clone()));
        (store, codec)
    }

    #[test]
    fn test_round_trip_ignores_array_order() {
        let (_store, codec) = codec();
        let document = json!({
            "nodes": [
                {"id": 2, "pos": 1, "name": "EQ", "wrapperSettings": {"open": true}, "settings": {"gain": 4}},
                {"id": 5, "pos": 0, "name": "ES1", "wrapperSettings": {}, "settings": {"mode": "mono"}},
                {"id": 9, "pos": 2, "name": "Flanger", "wrapperSettings": {"pos": [1.0, 2.0]}, "settings": {}},
                {"id": 11, "pos": 3, "name": "Reverb", "wrapperSettings": {"open": false, "pos": [120, 40], "zoom": 2}, "settings": {}}
            ]
        });

        let chain = codec.decode(Some(&document.to_string()));
        let encoded: Value = serde_json::from_str(&codec.encode(&chain).unwrap()).unwrap();
        let again = codec.decode(Some(&encoded.to_string()));

        assert_eq!(chain, again);
        assert_eq!(chain.len(), 4);
        assert_eq!(chain.get(9).unwrap().name, "Flanger");

        let mut original: Vec<Value> = document["nodes"].as_array().unwrap().clone();
        let mut output: Vec<Value> = encoded["nodes"].as_array().unwrap().clone();
        original.sort_by_key(|n| n["id"].as_u64());
        output.sort_by_key(|n| n["id"].as_u64());
        assert_eq!(original, output);
    }

    #[test]
    fn test_malformed_document_decodes_to_default() {
        let (_store, codec) = codec();
        assert_eq!(codec.decode(Some("{\"nodes\": 3")), Chain::default_chain());
        assert_eq!(codec.decode(None), Chain::default_chain());

        let duplicated = r#"{"nodes":[{"id":1,"pos":0,"name":"EQ"},{"id":1,"pos":1,"name":"EQ"}]}"#;
        assert!(codec.try_decode(duplicated).is_err());
        assert_eq!(codec.decode(Some(duplicated)), Chain::default_chain());
    }

    #[test]
    fn test_save_then_load() {
        let (store, codec) = codec();
        let mut chain = Chain::default_chain();
        chain.fold(&crate::project::NodeUpdate::settings(2, json!({"ratio": 4})));

        codec.save(&chain).unwrap();
        assert!(store.get(CHAIN_KEY).unwrap().is_some());
        assert_eq!(codec.load(), chain);
    }

    #[test]
    fn test_version_mismatch_discards_chain() {
        let store = MemoryStore::new();
        store.set(VERSION_KEY, "0").unwrap();
        store
            .set(CHAIN_KEY, r#"{"nodes":[{"id":1,"pos":0,"name":"EQ"}]}"#)
            .unwrap();

        let codec = PersistenceCodec::open(Rc::new(store.clone()));

        assert_eq!(codec.load(), Chain::default_chain());
        assert_eq!(store.get(VERSION_KEY).unwrap(), Some(SCHEMA_VERSION.to_string()));
        assert_eq!(store.get(CHAIN_KEY).unwrap(), None);
    }
}
