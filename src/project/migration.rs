// Schema version check
//
// Stored state is only valid for the schema version that wrote it. Any
// other version (or none) throws the stored state away; nothing is migrated.

use super::store::KeyValueStore;
use super::PersistenceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheck {
    /// Stored version matches
    Current,
    /// Stored state was discarded; `found` is the version that was there
    Reset { found: Option<String> },
}

/// Make sure `store` holds state for `version`, wiping it otherwise
pub fn ensure_version(
    store: &dyn KeyValueStore,
    key: &str,
    version: &str,
) -> Result<VersionCheck, PersistenceError> {
    let found = store.get(key)?;
    if found.as_deref() == Some(version) {
        return Ok(VersionCheck::Current);
    }

    log::info!(
        "Stored schema version {:?} does not match {}, discarding persisted state",
        found,
        version
    );
    store.clear()?;
    store.set(key, version)?;
    Ok(VersionCheck::Reset { found })
}
