// Preference store: a small key-value map persisted as JSON in the config
// directory. The preferred backend encrypts the whole map with AES-256-GCM
// under a locally generated master key; when that backend cannot be opened
// we quietly fall back to a plain JSON file so the user is never locked out.

use crate::error::StoreError;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, warn};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const SECURE_PREFS_FILE: &str = "papra_secure_prefs.json";
pub const FALLBACK_PREFS_FILE: &str = "papra_prefs_fallback.json";
pub const MASTER_KEY_FILE: &str = "master.key";

const KEY_BYTES: usize = 32;
const NONCE_BYTES: usize = 12;
const FORMAT_VERSION: u32 = 1;

/// Which backend a `Preferences` instance ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Encrypted,
    Plain,
}

/// On-disk envelope of the encrypted store.
#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    nonce: String,
    data: String,
}

pub struct Preferences {
    path: PathBuf,
    cipher: Option<Aes256Gcm>,
    values: BTreeMap<String, Value>,
}

impl Preferences {
    /// Open the encrypted store in `dir`, falling back to the plain store
    /// if the encrypted one cannot be initialized. Never fails.
    pub fn open(dir: &Path) -> Self {
        match Self::open_encrypted(dir) {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!("encrypted preferences unavailable ({}), using fallback store", e);
                Self::open_plain(dir)
            }
        }
    }

    pub fn open_encrypted(dir: &Path) -> Result<Self, StoreError> {
        let key = load_or_create_key(dir)?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| StoreError::Key(e.to_string()))?;
        let path = dir.join(SECURE_PREFS_FILE);

        let values = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let envelope: Envelope = serde_json::from_str(&raw)?;
            decrypt_values(&cipher, &envelope)?
        } else {
            BTreeMap::new()
        };

        debug!("opened encrypted preferences at {}", path.display());
        Ok(Preferences {
            path,
            cipher: Some(cipher),
            values,
        })
    }

    /// Open the plain-text store. An unreadable or corrupt file loads as
    /// empty; the next commit overwrites it.
    pub fn open_plain(dir: &Path) -> Self {
        let path = dir.join(FALLBACK_PREFS_FILE);
        let values: BTreeMap<String, Value> = fs::read_to_string(&path)
            .ok()
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(values) => Some(values),
                Err(e) => {
                    warn!("ignoring unreadable {}: {}", path.display(), e);
                    None
                }
            })
            .unwrap_or_default();
        Preferences {
            path,
            cipher: None,
            values,
        }
    }

    pub fn kind(&self) -> StoreKind {
        if self.cipher.is_some() {
            StoreKind::Encrypted
        } else {
            StoreKind::Plain
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.values
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    /// Apply all `entries` and persist the whole map in one atomic write.
    /// The in-memory map only changes if the write succeeds.
    pub fn commit<I, K>(&mut self, entries: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut next = self.values.clone();
        for (key, value) in entries {
            next.insert(key.into(), value);
        }

        let contents = match &self.cipher {
            Some(cipher) => serde_json::to_string(&encrypt_values(cipher, &next)?)?,
            None => serde_json::to_string_pretty(&next)?,
        };
        write_atomically(&self.path, contents.as_bytes())?;

        self.values = next;
        Ok(())
    }
}

fn load_or_create_key(dir: &Path) -> Result<[u8; KEY_BYTES], StoreError> {
    let path = dir.join(MASTER_KEY_FILE);
    if path.exists() {
        let encoded = fs::read_to_string(&path)?;
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| StoreError::Key(e.to_string()))?;
        return bytes
            .try_into()
            .map_err(|b: Vec<u8>| StoreError::Key(format!("expected {} bytes, found {}", KEY_BYTES, b.len())));
    }

    let mut key = [0u8; KEY_BYTES];
    OsRng.fill_bytes(&mut key);
    fs::create_dir_all(dir)?;
    write_atomically(&path, BASE64.encode(key).as_bytes())?;
    debug!("generated new master key at {}", path.display());
    Ok(key)
}

fn encrypt_values(
    cipher: &Aes256Gcm,
    values: &BTreeMap<String, Value>,
) -> Result<Envelope, StoreError> {
    let plaintext = serde_json::to_vec(values)?;
    let mut nonce = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
        .map_err(|_| StoreError::Crypto("encryption failed".into()))?;
    Ok(Envelope {
        version: FORMAT_VERSION,
        nonce: BASE64.encode(nonce),
        data: BASE64.encode(ciphertext),
    })
}

fn decrypt_values(
    cipher: &Aes256Gcm,
    envelope: &Envelope,
) -> Result<BTreeMap<String, Value>, StoreError> {
    if envelope.version != FORMAT_VERSION {
        return Err(StoreError::Crypto(format!(
            "unsupported store version {}",
            envelope.version
        )));
    }
    let nonce = BASE64
        .decode(&envelope.nonce)
        .map_err(|e| StoreError::Crypto(e.to_string()))?;
    if nonce.len() != NONCE_BYTES {
        return Err(StoreError::Crypto("invalid nonce length".into()));
    }
    let ciphertext = BASE64
        .decode(&envelope.data)
        .map_err(|e| StoreError::Crypto(e.to_string()))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| StoreError::Crypto("preferences do not decrypt with the current master key".into()))?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// Write to a sibling temp file and rename it over `path`.
fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
