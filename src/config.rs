//! Persistent key/value settings store for the laptopctld daemon.
//!
//! Every setting (button bindings, performance mode, fan curves) lives in a
//! single JSON object file. The whole map is rewritten on each mutation.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    env, fmt, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::RwLock;

/// Key holding the active performance mode.
pub const PERFORMANCE_MODE: &str = "performance_mode";

/// Value returned by [`ConfigStore::get_int`] for absent or non-numeric keys.
pub const MISSING_INT: i64 = -1;

const CONFIG_ENV: &str = "LAPTOPCTLD_CONFIG";
const CONFIG_RELATIVE: &str = "laptopctld/config.json";

/// A single stored setting.
///
/// The backing file mixes JSON numbers and JSON strings under one map, so
/// the in-memory form keeps the same two shapes. Any other JSON value found
/// on disk is carried as-is so it is written back unchanged.
///
/// # Example
///
/// ```
/// use laptopctld::config::ConfigValue;
///
/// assert_eq!(ConfigValue::from(2).as_int(), Some(2));
/// assert_eq!(ConfigValue::from("7").as_int(), Some(7));
/// assert_eq!(ConfigValue::from("notepad").as_int(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Int(i64),
    Str(String),
    /// Booleans, floats, `null`, arrays and objects.
    Other(serde_json::Value),
}

impl ConfigValue {
    /// Integer view of the value, parsing its textual form otherwise.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(value) => Some(*value),
            ConfigValue::Str(text) => text.trim().parse().ok(),
            ConfigValue::Other(value) => value.to_string().trim().parse().ok(),
        }
    }

    fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => ConfigValue::Str(text),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(int) => ConfigValue::Int(int),
                None => ConfigValue::Other(serde_json::Value::Number(number)),
            },
            other => ConfigValue::Other(other),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Int(value) => write!(f, "{value}"),
            ConfigValue::Str(text) => f.write_str(text),
            ConfigValue::Other(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Int(i64::from(value))
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Str(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Str(value.to_string())
    }
}

type Entries = BTreeMap<String, ConfigValue>;

fn default_entries() -> Entries {
    BTreeMap::from([(PERFORMANCE_MODE.to_string(), ConfigValue::Int(0))])
}

/// Resolves the backing file when no explicit path is given.
///
/// Search order:
/// 1. `LAPTOPCTLD_CONFIG` environment variable
/// 2. `$XDG_CONFIG_HOME/laptopctld/config.json`
/// 3. `$HOME/.config/laptopctld/config.json`
pub fn locate_config() -> Result<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(env_path));
    }

    env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
        .map(|dir| dir.join(CONFIG_RELATIVE))
        .context("Neither XDG_CONFIG_HOME nor HOME is set")
}

/// Shared handle to the settings map and its backing file.
///
/// Cloning is cheap; all clones see the same map. Reads take the shared
/// lock, `set` holds the exclusive lock across insert and file rewrite so
/// concurrent writers never interleave partial files.
///
/// # Example
///
/// ```no_run
/// use laptopctld::config::ConfigStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = ConfigStore::load(None).await?;
///
/// store.set("m4", 2).await?;
/// store.set("m4_custom", "/usr/bin/alacritty").await?;
///
/// assert_eq!(store.get_int("m4").await, 2);
/// assert_eq!(store.get_int("never_set").await, -1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigStore {
    entries: Arc<RwLock<Entries>>,
    path: PathBuf,
}

impl ConfigStore {
    /// Opens the store at `path`, or at the standard location when `None`.
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => locate_config().context("No configuration location available")?,
        };

        Self::open(config_path).await
    }

    /// Opens the store backed by `path`.
    ///
    /// A missing, non-UTF-8 or unparseable file is replaced by
    /// `{"performance_mode": 0}` and written back immediately. A file that
    /// exists but cannot be read (permissions, I/O) is left alone and the
    /// defaults stay in memory only. Only a failure to create the parent
    /// directory is reported as an error.
    pub async fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }

        info!("Loading config from: {}", path.display());
        let entries = match read_entries(&path) {
            Ok(entries) => entries,
            Err(LoadError::Unreadable(e)) => {
                warn!("Using default config, leaving the file untouched: {e:#}");
                default_entries()
            }
            Err(LoadError::Invalid(e)) => {
                warn!("Resetting config to defaults: {e:#}");
                let entries = default_entries();
                if let Err(e) = write_entries(&entries, &path) {
                    warn!("Could not persist default config: {e:#}");
                }
                entries
            }
        };

        Ok(Self {
            entries: Arc::new(RwLock::new(entries)),
            path,
        })
    }

    /// Returns the path to the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw stored value.
    pub async fn get(&self, key: &str) -> Option<ConfigValue> {
        self.entries.read().await.get(key).cloned()
    }

    /// Integer setting, or `-1` if the key is absent or not numeric.
    pub async fn get_int(&self, key: &str) -> i64 {
        self.entries
            .read()
            .await
            .get(key)
            .and_then(ConfigValue::as_int)
            .unwrap_or(MISSING_INT)
    }

    /// Textual form of a setting, `None` if the key is absent.
    pub async fn get_string(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).map(ToString::to_string)
    }

    /// Inserts or overwrites `key`, then rewrites the backing file.
    ///
    /// The in-memory value is updated even when the write fails; the
    /// returned error tells the caller the value was not persisted.
    pub async fn set(&self, key: &str, value: impl Into<ConfigValue>) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.into());
        write_entries(&entries, &self.path)
    }

    /// Clones the current map.
    pub async fn snapshot(&self) -> BTreeMap<String, ConfigValue> {
        self.entries.read().await.clone()
    }
}

/// Why the backing file could not be loaded.
enum LoadError {
    /// Missing, not UTF-8, or not a JSON object; safe to overwrite.
    Invalid(anyhow::Error),
    /// Present but unreadable; must not be overwritten.
    Unreadable(anyhow::Error),
}

fn read_entries(path: &Path) -> Result<Entries, LoadError> {
    let content = fs::read_to_string(path).map_err(|e| {
        let kind = e.kind();
        let e = anyhow::Error::new(e)
            .context(format!("Failed to read config file: {}", path.display()));
        match kind {
            ErrorKind::NotFound | ErrorKind::InvalidData => LoadError::Invalid(e),
            _ => LoadError::Unreadable(e),
        }
    })?;

    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON in: {}", path.display()))
        .map_err(LoadError::Invalid)?;

    Ok(raw
        .into_iter()
        .map(|(key, value)| (key, ConfigValue::from_json(value)))
        .collect())
}

fn write_entries(entries: &Entries, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(entries).context("Failed to serialize configuration")?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json)
        .with_context(|| format!("Failed to write temporary config to {}", tmp_path.display()))?;

    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move config to {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use tempfile::TempDir;

    fn config_path(dir: &TempDir) -> PathBuf {
        dir.path().join("config.json")
    }

    fn read_back(path: &Path) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn missing_file_creates_defaults() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);

        let store = ConfigStore::open(path.clone()).await.unwrap();

        assert_eq!(store.get_int(PERFORMANCE_MODE).await, 0);
        assert_eq!(read_back(&path), serde_json::json!({ "performance_mode": 0 }));
    }

    #[tokio::test]
    async fn corrupt_file_is_reset_and_rewritten() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        fs::write(&path, "{ this is not json").unwrap();

        let store = ConfigStore::open(path.clone()).await.unwrap();

        assert_eq!(store.snapshot().await, default_entries());
        assert_eq!(read_back(&path), serde_json::json!({ "performance_mode": 0 }));
    }

    #[tokio::test]
    async fn non_object_json_is_treated_as_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        fs::write(&path, "[1, 2, 3]").unwrap();

        let store = ConfigStore::open(path).await.unwrap();

        assert_eq!(store.snapshot().await, default_entries());
    }

    #[tokio::test]
    async fn creates_missing_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/config.json");

        ConfigStore::open(path.clone()).await.unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn absent_keys_return_sentinels() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::open(config_path(&dir)).await.unwrap();

        assert_eq!(store.get_int("anything").await, -1);
        assert_eq!(store.get_string("anything").await, None);
        assert_eq!(store.get("anything").await, None);
    }

    #[tokio::test]
    async fn get_int_parses_string_values() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::open(config_path(&dir)).await.unwrap();

        store.set("numeric_text", "12").await.unwrap();
        store.set("word", "abc").await.unwrap();

        assert_eq!(store.get_int("numeric_text").await, 12);
        assert_eq!(store.get_int("word").await, -1);
    }

    #[tokio::test]
    async fn get_string_stringifies_integers() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::open(config_path(&dir)).await.unwrap();

        store.set("charge_limit", 80).await.unwrap();

        assert_eq!(store.get_string("charge_limit").await.as_deref(), Some("80"));
    }

    #[tokio::test]
    async fn set_rewrites_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        let store = ConfigStore::open(path.clone()).await.unwrap();

        store.set("m3", 2).await.unwrap();
        store.set("m3_custom", "/usr/bin/foot").await.unwrap();

        assert_eq!(
            read_back(&path),
            serde_json::json!({
                "m3": 2,
                "m3_custom": "/usr/bin/foot",
                "performance_mode": 0,
            })
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);

        let store = ConfigStore::open(path.clone()).await.unwrap();
        store.set(PERFORMANCE_MODE, 2).await.unwrap();
        store.set("m4_custom", "foo.exe").await.unwrap();
        drop(store);

        let reopened = ConfigStore::open(path).await.unwrap();
        assert_eq!(reopened.get_int(PERFORMANCE_MODE).await, 2);
        assert_eq!(
            reopened.get("m4_custom").await,
            Some(ConfigValue::Str("foo.exe".to_string()))
        );
    }

    #[tokio::test]
    async fn unknown_keys_are_preserved() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        fs::write(
            &path,
            r#"{ "performance_mode": 1, "gpu_auto": 1, "theme": "dark" }"#,
        )
        .unwrap();

        let store = ConfigStore::open(path.clone()).await.unwrap();
        store.set("m3", 1).await.unwrap();

        let persisted = read_back(&path);
        assert_eq!(persisted["gpu_auto"], serde_json::json!(1));
        assert_eq!(persisted["theme"], serde_json::json!("dark"));
        assert_eq!(persisted["performance_mode"], serde_json::json!(1));
    }

    #[tokio::test]
    async fn other_json_kinds_survive_set_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        fs::write(
            &path,
            r#"{"performance_mode":0,"flag":true,"ratio":1.5,"nested":{"a":1},"nothing":null}"#,
        )
        .unwrap();

        let store = ConfigStore::open(path.clone()).await.unwrap();
        store.set("m3", 1).await.unwrap();

        assert_eq!(
            read_back(&path),
            serde_json::json!({
                "flag": true,
                "m3": 1,
                "nested": { "a": 1 },
                "nothing": null,
                "performance_mode": 0,
                "ratio": 1.5,
            })
        );
    }

    #[tokio::test]
    async fn other_json_kinds_read_as_text() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        fs::write(&path, r#"{ "flag": true, "ratio": 1.5, "nested": {"a":1} }"#).unwrap();

        let store = ConfigStore::open(path).await.unwrap();

        assert_eq!(store.get_string("flag").await.as_deref(), Some("true"));
        assert_eq!(store.get_int("flag").await, -1);
        assert_eq!(store.get_string("ratio").await.as_deref(), Some("1.5"));
        assert_eq!(store.get_int("ratio").await, -1);
        assert_eq!(store.get_string("nested").await.as_deref(), Some(r#"{"a":1}"#));
    }

    #[tokio::test]
    async fn unreadable_file_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        // Reading a directory fails with something other than NotFound.
        fs::create_dir(&path).unwrap();

        let store = ConfigStore::open(path.clone()).await.unwrap();

        assert_eq!(store.snapshot().await, default_entries());
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn non_utf8_file_is_reset() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let store = ConfigStore::open(path.clone()).await.unwrap();

        assert_eq!(store.snapshot().await, default_entries());
        assert_eq!(read_back(&path), serde_json::json!({ "performance_mode": 0 }));
    }

    #[tokio::test]
    async fn set_reports_write_failure_but_keeps_value() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        let store = ConfigStore::open(path.clone()).await.unwrap();

        // A directory in place of the temp file makes the write fail.
        fs::create_dir(path.with_extension("json.tmp")).unwrap();

        assert!(store.set("m4", 1).await.is_err());
        assert_eq!(store.get_int("m4").await, 1);
    }

    #[tokio::test]
    async fn concurrent_writers_leave_valid_file() {
        let dir = TempDir::new().unwrap();
        let path = config_path(&dir);
        let store = ConfigStore::open(path.clone()).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.set(&format!("key_{i}"), i).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let persisted = read_back(&path);
        assert_eq!(persisted.as_object().unwrap().len(), 17);
    }

    #[test]
    fn config_value_display() {
        assert_eq!(ConfigValue::Int(-3).to_string(), "-3");
        assert_eq!(ConfigValue::from("a b").to_string(), "a b");
    }

    #[test]
    fn other_value_uses_json_text() {
        let value = ConfigValue::from_json(serde_json::json!(false));
        assert_eq!(value, ConfigValue::Other(serde_json::json!(false)));
        assert_eq!(value.to_string(), "false");
        assert_eq!(value.as_int(), None);
    }

    #[test]
    fn config_value_as_int_trims_whitespace() {
        assert_eq!(ConfigValue::from(" 42 ").as_int(), Some(42));
    }

    #[test]
    #[serial]
    fn locate_config_prefers_env_override() {
        // SAFETY: serialized with the other environment tests.
        unsafe {
            env::set_var(CONFIG_ENV, "/tmp/override.json");
        }
        let located = locate_config();
        unsafe {
            env::remove_var(CONFIG_ENV);
        }

        assert_eq!(located.unwrap(), PathBuf::from("/tmp/override.json"));
    }

    #[test]
    #[serial]
    fn locate_config_uses_xdg_config_home() {
        let previous = env::var_os("XDG_CONFIG_HOME");
        // SAFETY: serialized with the other environment tests.
        unsafe {
            env::remove_var(CONFIG_ENV);
            env::set_var("XDG_CONFIG_HOME", "/tmp/xdg");
        }
        let located = locate_config();
        unsafe {
            match previous {
                Some(value) => env::set_var("XDG_CONFIG_HOME", value),
                None => env::remove_var("XDG_CONFIG_HOME"),
            }
        }

        assert_eq!(
            located.unwrap(),
            PathBuf::from("/tmp/xdg/laptopctld/config.json")
        );
    }
}
