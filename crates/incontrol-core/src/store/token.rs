// ── Token store ──
//
// Persists the single OAuth token record between runs. The on-disk blob is
// versioned: `{ "version": 1, "key": "incontrol2_auth", "data": {...} }`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use incontrol_api::TokenRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;

/// Key the token blob is stored under.
pub const STORAGE_KEY: &str = "incontrol2_auth";

/// Current blob layout version.
pub const STORAGE_VERSION: u32 = 1;

/// Load/save boundary for the persisted token.
pub trait TokenStore: Send + Sync {
    /// The stored token, or `None` if nothing has been saved yet.
    fn load(&self) -> Result<Option<TokenRecord>, CoreError>;

    /// Replace the stored token.
    fn save(&self, token: &TokenRecord) -> Result<(), CoreError>;

    /// Forget the stored token. Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), CoreError>;
}

#[derive(Serialize, Deserialize)]
struct StoredBlob {
    version: u32,
    key: String,
    data: TokenRecord,
}

// ── File-backed store ────────────────────────────────────────────────

/// JSON file store, one file per profile.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, action: &str, err: &std::io::Error) -> CoreError {
        CoreError::TokenStore {
            message: format!("cannot {action} {}: {err}", self.path.display()),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<TokenRecord>, CoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error("read", &e)),
        };

        let blob: StoredBlob = serde_json::from_str(&raw).map_err(|e| CoreError::TokenStore {
            message: format!("corrupt token file {}: {e}", self.path.display()),
        })?;

        if blob.version != STORAGE_VERSION {
            return Err(CoreError::TokenStore {
                message: format!(
                    "token file {} has version {}, expected {STORAGE_VERSION}",
                    self.path.display(),
                    blob.version
                ),
            });
        }
        if blob.key != STORAGE_KEY {
            return Err(CoreError::TokenStore {
                message: format!(
                    "token file {} holds key {:?}, expected {STORAGE_KEY:?}",
                    self.path.display(),
                    blob.key
                ),
            });
        }

        debug!(path = %self.path.display(), "loaded token");
        Ok(Some(blob.data))
    }

    fn save(&self, token: &TokenRecord) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error("create directory for", &e))?;
        }

        let blob = StoredBlob {
            version: STORAGE_VERSION,
            key: STORAGE_KEY.to_owned(),
            data: token.clone(),
        };
        let json = serde_json::to_string_pretty(&blob)
            .map_err(|e| CoreError::Internal(format!("cannot encode token: {e}")))?;

        // Write-then-rename so a crash never leaves a half-written token.
        let tmp = self.path.with_extension("json.tmp");
        write_private(&tmp, json.as_bytes()).map_err(|e| self.io_error("write", &e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error("replace", &e))?;

        debug!(path = %self.path.display(), expires_at = token.expires_at, "saved token");
        Ok(())
    }

    fn clear(&self) -> Result<(), CoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error("remove", &e)),
        }
    }
}

/// Write `contents` to a fresh file readable by the owner only.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        // `mode` only applies on creation; a leftover temp file keeps its bits.
        if fs::metadata(path).is_ok_and(|meta| meta.permissions().mode() & 0o077 != 0) {
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

// ── In-memory store ──────────────────────────────────────────────────

/// Process-local store, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<TokenRecord>>,
    saves: AtomicUsize,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: TokenRecord) -> Self {
        Self {
            token: Mutex::new(Some(token)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<TokenRecord>, CoreError> {
        Ok(self.token.lock().expect("token store lock poisoned").clone())
    }

    fn save(&self, token: &TokenRecord) -> Result<(), CoreError> {
        *self.token.lock().expect("token store lock poisoned") = Some(token.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<(), CoreError> {
        *self.token.lock().expect("token store lock poisoned") = None;
        Ok(())
    }
}
