//! Key directory loading: `<key_id>.{pub,priv}` files into a [`KeyRegistry`].

use std::path::Path;

use nanoprobe_crypto::KeyRegistry;

use crate::error::AgentError;

/// Loads every `<key_id>.pub` and `<key_id>.priv` file in `dir` into
/// `registry`. The key id's owning identity is taken to be the key id
/// itself — the naming convention carries no separate identity field, per
/// spec.md §6.
pub fn load_key_directory(dir: &Path, registry: &mut KeyRegistry) -> Result<(), AgentError> {
    let entries = std::fs::read_dir(dir).map_err(|source| AgentError::Io { path: dir.display().to_string(), source })?;

    for entry in entries {
        let entry = entry.map_err(|source| AgentError::Io { path: dir.display().to_string(), source })?;
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else { continue };

        if let Some(key_id) = file_name.strip_suffix(".pub") {
            let bytes = read_key_bytes(&path)?;
            registry.add_public_key(key_id, key_id, bytes);
        } else if let Some(key_id) = file_name.strip_suffix(".priv") {
            let bytes = read_key_bytes(&path)?;
            registry.add_private_key(key_id, bytes);
        }
    }
    Ok(())
}

fn read_key_bytes(path: &Path) -> Result<Vec<u8>, AgentError> {
    std::fs::read(path).map_err(|source| AgentError::Io { path: path.display().to_string(), source })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn loads_public_and_private_keys_by_filename() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("k1.pub"), [1, 2, 3]).unwrap();
        std::fs::write(dir.path().join("k1.priv"), [4, 5, 6]).unwrap();
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let mut registry = KeyRegistry::new();
        load_key_directory(dir.path(), &mut registry).unwrap();

        assert_eq!(registry.public_key("k1").unwrap().bytes, vec![1, 2, 3]);
        assert_eq!(*registry.private_key("k1").unwrap().bytes, vec![4, 5, 6]);
    }

    #[test]
    fn missing_directory_errors() {
        let mut registry = KeyRegistry::new();
        assert!(load_key_directory(Path::new("/nonexistent/path/for/sure"), &mut registry).is_err());
    }
}
