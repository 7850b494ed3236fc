//! Filesystem locations used by PlantMama.
//!
//! # Storage Structure
//!
//! All application data lives under `~/.plantmama/` unless overridden:
//!
//! ```text
//! ~/.plantmama/
//! ├── config/      # .env.local with secrets
//! ├── data/        # JSON records (users, plants, sessions, ...)
//! └── uploads/     # processed plant photos
//! ```
//!
//! # Environment Variables
//!
//! - `PLANTMAMA_STATE_DIR`: Override the base state directory
//! - `PLANTMAMA_DATA_DIR`: Override the data directory
//! - `UPLOAD_DIR`: Override the uploads directory

use std::path::PathBuf;

/// Environment variable for custom state directory.
pub const STATE_DIR_ENV: &str = "PLANTMAMA_STATE_DIR";

/// Environment variable for custom data directory.
pub const DATA_DIR_ENV: &str = "PLANTMAMA_DATA_DIR";

/// Environment variable for custom upload directory.
pub const UPLOAD_DIR_ENV: &str = "UPLOAD_DIR";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".plantmama";

const DATA_SUBDIR: &str = "data";
const UPLOADS_SUBDIR: &str = "uploads";
const CONFIG_SUBDIR: &str = "config";

/// Get the PlantMama state directory.
///
/// Resolution order:
/// 1. `PLANTMAMA_STATE_DIR` environment variable if set
/// 2. `~/.plantmama` if a home directory is available
/// 3. `.plantmama` in the current directory
pub fn state_dir() -> PathBuf {
    std::env::var(STATE_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(DEFAULT_STATE_DIR))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
        })
}

/// Directory holding the JSON records.
pub fn data_dir() -> PathBuf {
    std::env::var(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join(DATA_SUBDIR))
}

/// Directory holding processed uploads.
pub fn uploads_dir() -> PathBuf {
    std::env::var(UPLOAD_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join(UPLOADS_SUBDIR))
}

/// User config directory.
pub fn config_dir() -> PathBuf {
    state_dir().join(CONFIG_SUBDIR)
}

/// The `.env.local` file with secrets.
pub fn env_file() -> PathBuf {
    config_dir().join(".env.local")
}

/// Ensure the state directory and all subdirectories exist.
///
/// # Errors
/// Returns an error if any directory cannot be created.
pub fn ensure_all_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(data_dir())?;
    std::fs::create_dir_all(uploads_dir())?;
    std::fs::create_dir_all(config_dir())?;
    Ok(())
}

/// Load environment files: config dir `.env.local`, then `./.env.local`, then `./.env`.
///
/// Variables already set in the process environment win.
pub fn load_env_files() {
    let env_path = env_file();
    if env_path.exists() {
        let _ = dotenvy::from_path(&env_path);
    }
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();
}
