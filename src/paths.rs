//! Path resolution for stackplan
//!
//! # Environment Variables
//!
//! - `STACKPLAN_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For state_dir():
//! 1. `STACKPLAN_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/stackplan` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\stackplan`
//!    - macOS/Linux: `~/.local/state/stackplan`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "STACKPLAN_STATE_DIR";

const APP_DIR: &str = "stackplan";

/// Get the stackplan state directory path
///
/// Priority:
/// 1. `STACKPLAN_STATE_DIR` env var
/// 2. `XDG_STATE_HOME/stackplan`
/// 3. Platform default
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_DIR);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            let path = local_app_data.join(APP_DIR);
            log::debug!("Using Windows state dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join(APP_DIR);
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Helper to run a test with temporary env var
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: Tests run in isolation
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    fn without_env_var<F, R>(key: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::remove_var(key) };
        let result = f();
        if let Some(v) = original {
            // SAFETY: Tests run in isolation
            unsafe { env::set_var(key, v) };
        }
        result
    }

    #[test]
    fn test_state_dir_env_override() {
        with_env_var(ENV_STATE_DIR, "/custom/state/path", || {
            assert_eq!(state_dir().unwrap(), PathBuf::from("/custom/state/path"));
        });
    }

    #[test]
    fn test_xdg_state_home() {
        without_env_var(ENV_STATE_DIR, || {
            with_env_var("XDG_STATE_HOME", "/tmp/xdg-state-test", || {
                assert_eq!(
                    state_dir().unwrap(),
                    PathBuf::from("/tmp/xdg-state-test/stackplan")
                );
            });
        });
    }

    #[cfg(unix)]
    #[test]
    fn test_default_state_dir_unix() {
        without_env_var(ENV_STATE_DIR, || {
            without_env_var("XDG_STATE_HOME", || {
                let home = dirs::home_dir().unwrap();
                assert_eq!(
                    state_dir().unwrap(),
                    home.join(".local").join("state").join("stackplan")
                );
            });
        });
    }

    #[test]
    fn test_expand_with_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~/plans"), home.join("plans"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_VAR_12345/file");
        assert_eq!(result, PathBuf::from("/path/$NONEXISTENT_VAR_12345/file"));
    }
}
