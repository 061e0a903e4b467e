//! Read-only access to the résumé-variant version store.
//!
//! Variants are authored and rewritten externally; the engine only ever
//! resolves the current text of a variant or retrieves a historical
//! version by identifier. Version identifiers are content hashes, so the
//! id captured on an application pins the exact text that was sent.

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::Archetype;

#[derive(Debug, Error)]
pub enum VersionStoreError {
    #[error("variant file for archetype '{0}' not found")]
    VariantMissing(Archetype),
    #[error("version '{version}' of archetype '{archetype}' not found")]
    VersionMissing {
        archetype: Archetype,
        version: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A resolved variant: its text and the version identifier of that text.
#[derive(Debug, Clone)]
pub struct VariantText {
    pub archetype: Archetype,
    pub version_id: String,
    pub path: PathBuf,
    pub text: String,
}

/// Addressing contract for variant content.
pub trait VersionStore {
    /// Resolve the current text of an archetype's variant.
    ///
    /// # Errors
    ///
    /// Fails when the variant does not exist or cannot be read.
    fn current(&self, archetype: Archetype) -> Result<VariantText, VersionStoreError>;

    /// Retrieve a historical version by identifier.
    ///
    /// # Errors
    ///
    /// Fails when that version was never recorded.
    fn retrieve(
        &self,
        archetype: Archetype,
        version_id: &str,
    ) -> Result<VariantText, VersionStoreError>;
}

/// Filesystem-backed store.
///
/// Layout: `<root>/<archetype>/current.md` is the live variant;
/// `<root>/<archetype>/versions/<id>.md` holds retained history. The id
/// of any text is the hex SHA-256 of its bytes, truncated to 16 chars.
#[derive(Debug, Clone)]
pub struct FsVersionStore {
    root: PathBuf,
}

impl FsVersionStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn current_path(&self, archetype: Archetype) -> PathBuf {
        self.root.join(archetype.as_str()).join("current.md")
    }

    fn version_path(&self, archetype: Archetype, version_id: &str) -> PathBuf {
        self.root
            .join(archetype.as_str())
            .join("versions")
            .join(format!("{version_id}.md"))
    }
}

/// Content-addressed version identifier for variant text.
#[must_use]
pub fn version_id_for(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..16].to_string()
}

impl VersionStore for FsVersionStore {
    fn current(&self, archetype: Archetype) -> Result<VariantText, VersionStoreError> {
        let path = self.current_path(archetype);
        if !path.exists() {
            return Err(VersionStoreError::VariantMissing(archetype));
        }
        let text = std::fs::read_to_string(&path)?;
        Ok(VariantText {
            archetype,
            version_id: version_id_for(&text),
            path,
            text,
        })
    }

    fn retrieve(
        &self,
        archetype: Archetype,
        version_id: &str,
    ) -> Result<VariantText, VersionStoreError> {
        // The current file may already be the requested version.
        if let Ok(current) = self.current(archetype) {
            if current.version_id == version_id {
                return Ok(current);
            }
        }
        let path = self.version_path(archetype, version_id);
        if !path.exists() {
            return Err(VersionStoreError::VersionMissing {
                archetype,
                version: version_id.to_string(),
            });
        }
        let text = std::fs::read_to_string(&path)?;
        Ok(VariantText {
            archetype,
            version_id: version_id.to_string(),
            path,
            text,
        })
    }
}
