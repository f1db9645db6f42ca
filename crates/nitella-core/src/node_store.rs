//! Signed node certificates on disk.
//!
//! Layout is `<data_dir>/nodes/<sanitized node id>.crt`. The directory is
//! private (0700), the certificates themselves are public (0644).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use nitella_crypto::cert::certificate_public_key;

use crate::errors::StoreError;
use crate::files::{create_dir_with_mode, write_with_mode};

const NODES_DIR: &str = "nodes";
const CERT_EXT: &str = "crt";

/// Replace path-hostile characters in a node id with `_`.
pub fn sanitize_node_id(node_id: &str) -> String {
    node_id
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}

/// Certificate store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct NodeCertStore {
    dir: PathBuf,
}

impl NodeCertStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join(NODES_DIR),
        }
    }

    /// Directory holding the `.crt` files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, node_id: &str) -> Result<PathBuf, StoreError> {
        if node_id.is_empty() {
            return Err(StoreError::EmptyNodeId);
        }
        Ok(self
            .dir
            .join(format!("{}.{}", sanitize_node_id(node_id), CERT_EXT)))
    }

    pub fn save(&self, node_id: &str, cert_pem: &str) -> Result<PathBuf, StoreError> {
        let path = self.path_for(node_id)?;
        create_dir_with_mode(&self.dir, 0o700).map_err(|e| StoreError::io(&self.dir, e))?;
        write_with_mode(&path, cert_pem.as_bytes(), 0o644).map_err(|e| StoreError::io(&path, e))?;
        debug!(node_id = %node_id, path = %path.display(), "stored node certificate");
        Ok(path)
    }

    pub fn exists(&self, node_id: &str) -> bool {
        self.path_for(node_id).map(|p| p.is_file()).unwrap_or(false)
    }

    pub fn load(&self, node_id: &str) -> Result<String, StoreError> {
        let path = self.path_for(node_id)?;
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(node_id.to_string()),
            _ => StoreError::io(&path, e),
        })
    }

    /// Ed25519 public key of the stored certificate.
    pub fn load_public_key(&self, node_id: &str) -> Result<[u8; 32], StoreError> {
        let pem = self.load(node_id)?;
        Ok(certificate_public_key(pem.as_bytes())?)
    }

    /// Stored node ids (sanitized form), sorted. A missing directory is an
    /// empty store.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(CERT_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn delete(&self, node_id: &str) -> Result<(), StoreError> {
        let path = self.path_for(node_id)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(node_id.to_string()),
            _ => StoreError::io(&path, e),
        })?;
        debug!(node_id = %node_id, "deleted node certificate");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use nitella_crypto::cert::{create_csr, create_root_ca, sign_csr};

    fn signed_cert(cn: &str) -> (String, [u8; 32]) {
        let ca_key = SigningKey::from_bytes(&[7u8; 32]);
        let ca_pem = create_root_ca(&ca_key, "Test Root CA", 1).unwrap();
        let node_key = SigningKey::from_bytes(&[9u8; 32]);
        let csr = create_csr(&node_key, cn, "").unwrap();
        let cert = sign_csr(csr.as_bytes(), ca_pem.as_bytes(), &ca_key, 30).unwrap();
        (cert, node_key.verifying_key().to_bytes())
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_node_id("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_node_id("node-42"), "node-42");
    }

    #[test]
    fn test_save_load_list_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let store = NodeCertStore::new(tmp.path());
        assert!(store.list().unwrap().is_empty());

        let (cert, pubkey) = signed_cert("node-42");
        let path = store.save("node-42", &cert).unwrap();
        assert_eq!(path, tmp.path().join("nodes").join("node-42.crt"));
        store.save("site/a", &cert).unwrap();

        assert!(store.exists("node-42"));
        assert_eq!(store.load("node-42").unwrap(), cert);
        assert_eq!(store.load_public_key("node-42").unwrap(), pubkey);
        assert_eq!(store.list().unwrap(), vec!["node-42".to_string(), "site_a".to_string()]);

        store.delete("node-42").unwrap();
        assert!(!store.exists("node-42"));
        assert!(matches!(store.load("node-42"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete("node-42"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_list_skips_dirs_and_other_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = NodeCertStore::new(tmp.path());
        fs::create_dir_all(store.dir().join("sub.crt")).unwrap();
        fs::write(store.dir().join("notes.txt"), "x").unwrap();
        fs::write(store.dir().join("n1.crt"), "x").unwrap();
        assert_eq!(store.list().unwrap(), vec!["n1".to_string()]);
    }

    #[test]
    fn test_empty_node_id() {
        let tmp = tempfile::tempdir().unwrap();
        let store = NodeCertStore::new(tmp.path());
        assert!(matches!(store.save("", "x"), Err(StoreError::EmptyNodeId)));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_modes() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let store = NodeCertStore::new(tmp.path());
        let path = store.save("n", "pem").unwrap();
        let dir_mode = fs::metadata(store.dir()).unwrap().permissions().mode() & 0o777;
        let file_mode = fs::metadata(path).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
        assert_eq!(file_mode, 0o644);
    }
}
