use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "FLOATPET_CONFIG_DIR";
pub const CONFIG_FILE_NAME: &str = "config.toml";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Floatpet";
const APPLICATION: &str = "Floatpet";

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Builtin,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Builtin => f.write_str("built-in defaults"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directories searched for `config.toml`, highest priority first.
    config_dirs: Vec<PathBuf>,
}

impl AppPaths {
    pub fn discover() -> Self {
        let mut config_dirs = Vec::new();
        if let Some(dir) = env_override(ENV_CONFIG_DIR) {
            config_dirs.push(dir);
        }
        if let Some(project_dirs) = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION) {
            config_dirs.push(project_dirs.config_dir().to_path_buf());
        }
        Self { config_dirs }
    }

    pub fn config_dirs(&self) -> &[PathBuf] {
        &self.config_dirs
    }

    /// Resolves the config to load: an explicit file must exist; otherwise
    /// the first `config.toml` found in the search directories wins, and the
    /// built-in defaults apply when none exists.
    pub fn resolve_config(&self, explicit: Option<&Path>) -> Result<ConfigSource> {
        if let Some(path) = explicit {
            if !path.is_file() {
                bail!("config file {} does not exist", path.display());
            }
            return Ok(ConfigSource::File(path.to_path_buf()));
        }
        Ok(self
            .config_dirs
            .iter()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
            .map(ConfigSource::File)
            .unwrap_or(ConfigSource::Builtin))
    }
}

#[cfg(test)]
impl AppPaths {
    pub fn from_raw(config_dirs: Vec<PathBuf>) -> Self {
        Self { config_dirs }
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::fs;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    struct EnvGuard {
        key: &'static str,
        previous: Option<OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &Path) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = self.previous.take() {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    #[test]
    fn env_dir_is_searched_first() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let _env = EnvGuard::set(ENV_CONFIG_DIR, root.path());

        let paths = AppPaths::discover();
        assert_eq!(paths.config_dirs()[0], root.path());

        fs::write(root.path().join(CONFIG_FILE_NAME), "version = 1").unwrap();
        assert_eq!(
            paths.resolve_config(None).unwrap(),
            ConfigSource::File(root.path().join(CONFIG_FILE_NAME))
        );
    }

    #[test]
    fn falls_back_to_builtin_when_nothing_exists() {
        let root = TempDir::new().unwrap();
        let paths = AppPaths::from_raw(vec![root.path().join("a"), root.path().join("b")]);
        assert_eq!(paths.resolve_config(None).unwrap(), ConfigSource::Builtin);
    }

    #[test]
    fn later_dirs_are_used_when_earlier_ones_are_empty() {
        let root = TempDir::new().unwrap();
        let second = root.path().join("second");
        fs::create_dir_all(&second).unwrap();
        fs::write(second.join(CONFIG_FILE_NAME), "version = 1").unwrap();
        let paths = AppPaths::from_raw(vec![root.path().join("first"), second.clone()]);
        assert_eq!(
            paths.resolve_config(None).unwrap(),
            ConfigSource::File(second.join(CONFIG_FILE_NAME))
        );
    }

    #[test]
    fn explicit_file_must_exist() {
        let root = TempDir::new().unwrap();
        let paths = AppPaths::from_raw(Vec::new());
        let missing = root.path().join("nope.toml");
        assert!(paths.resolve_config(Some(&missing)).is_err());

        let present = root.path().join("pets.toml");
        fs::write(&present, "version = 1").unwrap();
        assert_eq!(
            paths.resolve_config(Some(&present)).unwrap(),
            ConfigSource::File(present)
        );
    }
}
