//! Centralized path configuration for xmconf.
//!
//! The library and the CLI both resolve the definitions directory and the
//! settings file through this module.

use std::path::PathBuf;

/// Environment variable overriding the definitions directory.
pub const CONFIG_DIR_ENV: &str = "LIBVIRT_XM_CONFIG_DIR";

/// Where xm keeps domain configuration files.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/xen";

/// Whether the process runs with borrowed privileges (setuid/setgid).
///
/// Environment overrides are not trusted in that case.
pub fn privileges_differ() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: these calls have no preconditions and cannot fail
        unsafe { libc::geteuid() != libc::getuid() || libc::getegid() != libc::getgid() }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Get the domain definitions directory.
///
/// Resolution order:
/// 1. `LIBVIRT_XM_CONFIG_DIR`, unless running setuid/setgid
/// 2. `/etc/xen`
pub fn config_dir() -> PathBuf {
    if !privileges_differ() {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return PathBuf::from(dir);
        }
    }
    PathBuf::from(DEFAULT_CONFIG_DIR)
}

/// Get the xmconf settings file (`$XDG_CONFIG_HOME/xmconf/config.json`).
pub fn settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/etc"))
        .join("xmconf")
        .join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_from_env() {
        std::env::set_var(CONFIG_DIR_ENV, "/tmp/xm-test");
        if privileges_differ() {
            assert_eq!(config_dir(), PathBuf::from(DEFAULT_CONFIG_DIR));
        } else {
            assert_eq!(config_dir(), PathBuf::from("/tmp/xm-test"));
        }
        std::env::remove_var(CONFIG_DIR_ENV);
        assert_eq!(config_dir(), PathBuf::from(DEFAULT_CONFIG_DIR));
    }

    #[test]
    fn test_settings_path_name() {
        assert!(settings_path().ends_with("xmconf/config.json"));
    }
}
