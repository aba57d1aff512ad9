use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use credguard_core::error::{CredGuardError, Result};
use credguard_core::UsageSnapshot;

const USAGE_FILE_VERSION: u32 = 1;

/// Backing storage for the usage store. `save` always receives the whole
/// store.
pub trait UsagePersistence: Send + Sync {
    fn load(&self) -> Result<UsageSnapshot>;
    fn save(&self, snapshot: &UsageSnapshot) -> Result<()>;
}

/// Keeps the last saved snapshot in memory.
#[derive(Default)]
pub struct InMemoryUsagePersistence {
    saved: Mutex<UsageSnapshot>,
}

impl InMemoryUsagePersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsagePersistence for InMemoryUsagePersistence {
    fn load(&self) -> Result<UsageSnapshot> {
        Ok(self.saved.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, snapshot: &UsageSnapshot) -> Result<()> {
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct UsageFile {
    version: u32,
    #[serde(rename = "credentialUsageMap", default)]
    credential_usage: UsageSnapshot,
}

/// JSON file, replaced atomically on every save. A missing file loads as an
/// empty store.
pub struct JsonFileUsagePersistence {
    path: PathBuf,
}

impl JsonFileUsagePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UsagePersistence for JsonFileUsagePersistence {
    fn load(&self) -> Result<UsageSnapshot> {
        let s = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(UsageSnapshot::new()),
            Err(e) => {
                return Err(CredGuardError::Persistence(format!(
                    "read {} failed: {e}",
                    self.path.display()
                )))
            }
        };
        let file: UsageFile = serde_json::from_str(&s).map_err(|e| {
            CredGuardError::Persistence(format!("invalid usage file {}: {e}", self.path.display()))
        })?;
        if file.version != USAGE_FILE_VERSION {
            return Err(CredGuardError::UnsupportedVersion);
        }
        for (id, rec) in &file.credential_usage {
            if id != rec.credential_id() {
                tracing::warn!(key = %id, credential = %rec.credential_id(), "usage record keyed under a different credential id");
            }
        }
        Ok(file.credential_usage)
    }

    fn save(&self, snapshot: &UsageSnapshot) -> Result<()> {
        let file = UsageFile { version: USAGE_FILE_VERSION, credential_usage: snapshot.clone() };
        let bytes = serde_json::to_vec_pretty(&file)
            .map_err(|e| CredGuardError::Internal(format!("json encode failed: {e}")))?;
        write_atomic(&self.path, &bytes)
    }
}

/// Write to a sibling temp file, fsync, then rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let err = |what: &str, e: std::io::Error| {
        CredGuardError::Persistence(format!("{what} {} failed: {e}", path.display()))
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| err("create parent of", e))?;
    }

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut f = fs::File::create(&tmp).map_err(|e| err("create temp for", e))?;
    f.write_all(bytes).map_err(|e| err("write", e))?;
    f.sync_all().map_err(|e| err("sync", e))?;
    drop(f);
    fs::rename(&tmp, path).map_err(|e| err("rename into", e))
}
