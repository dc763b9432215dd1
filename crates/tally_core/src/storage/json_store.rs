use crate::error::AppError;
use crate::model::{Task, User};
use crate::storage::{Store, StoreState};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const SCHEMA_VERSION: u32 = 2;
pub const STORE_ENV_VAR: &str = "TALLY_STORE_PATH";
const STORE_FILE_NAME: &str = "store.json";
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
struct StoredState {
    schema_version: u32,
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    tasks: Vec<Task>,
}

pub fn store_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(STORE_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("tally").join(STORE_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("tally")
            .join(STORE_FILE_NAME))
    }
}

pub fn load_state(path: &Path) -> Result<StoreState, AppError> {
    if !path.exists() {
        return Ok(StoreState::default());
    }

    let content = std::fs::read_to_string(path)?;
    let stored: StoredState =
        serde_json::from_str(&content).map_err(|err| AppError::invalid_data(err.to_string()))?;

    if !(1..=SCHEMA_VERSION).contains(&stored.schema_version) {
        return Err(AppError::invalid_data("schema_version mismatch"));
    }

    let state = StoreState {
        users: stored.users,
        tasks: stored.tasks,
    };
    state.validate()?;
    Ok(state)
}

/// Writes the whole state to a sibling temp file and renames it into place.
pub fn save_state(path: &Path, state: &StoreState) -> Result<(), AppError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let stored = StoredState {
        schema_version: SCHEMA_VERSION,
        users: state.users.clone(),
        tasks: state.tasks.clone(),
    };
    let content = serde_json::to_string_pretty(&stored)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;

    let temp_path = sibling_path(path, "tmp");
    let mut file = std::fs::File::create(&temp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    drop(file);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&temp_path, permissions)?;
    }

    if let Err(err) = std::fs::rename(&temp_path, path) {
        std::fs::remove_file(&temp_path).ok();
        return Err(err.into());
    }

    Ok(())
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| STORE_FILE_NAME.into());
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

pub struct JsonStore {
    path: PathBuf,
    lock_timeout: Duration,
    guard: Mutex<()>,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            guard: Mutex::new(()),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self::new(store_path()?))
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits for the OS lock on `<store>.lock`. The lock dies with the
    /// process holding it, so a crashed writer never blocks the store.
    fn acquire_lock(&self) -> Result<StoreLock, AppError> {
        let lock_path = sibling_path(&self.path, "lock");
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let started = Instant::now();
        loop {
            if let Some(file) = try_lock_exclusive(&lock_path)? {
                return Ok(StoreLock { _file: file });
            }
            if started.elapsed() >= self.lock_timeout {
                return Err(AppError::persistence(format!(
                    "store is locked: {}",
                    lock_path.display()
                )));
            }
            std::thread::sleep(LOCK_RETRY_INTERVAL);
        }
    }
}

/// Held for the length of one transaction; closing the file releases the lock.
struct StoreLock {
    _file: File,
}

/// Opens the lock file and takes an exclusive, non-blocking lock on it.
///
/// Returns `Ok(None)` while another handle holds the lock.
#[cfg(unix)]
fn try_lock_exclusive(path: &Path) -> io::Result<Option<File>> {
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o600)
        .open(path)?;
    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(Some(file));
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(None);
    }
    Err(err)
}

#[cfg(windows)]
fn try_lock_exclusive(path: &Path) -> io::Result<Option<File>> {
    use std::os::windows::fs::OpenOptionsExt;
    const ERROR_SHARING_VIOLATION: i32 = 32;

    // No sharing: a second open fails until this handle is closed.
    match OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .share_mode(0)
        .open(path)
    {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.raw_os_error() == Some(ERROR_SHARING_VIOLATION) => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(not(any(unix, windows)))]
fn try_lock_exclusive(path: &Path) -> io::Result<Option<File>> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map(Some)
}

impl Store for JsonStore {
    fn load(&self) -> Result<StoreState, AppError> {
        load_state(&self.path)
    }

    fn transaction<T, F>(&self, apply: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut StoreState) -> Result<T, AppError>,
    {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| AppError::persistence("store guard poisoned"))?;
        let _lock = self.acquire_lock()?;

        let mut state = load_state(&self.path)?;
        let value = apply(&mut state)?;
        save_state(&self.path, &state)?;
        tracing::debug!(path = %self.path.display(), "store committed");
        Ok(value)
    }
}
