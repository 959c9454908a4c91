// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_VERSION: i64 = 1;
const DEFAULT_EXPORT_TITLE: &str = "Estimate";
const DEFAULT_ROWS_PER_PAGE: i64 = 40;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub export: Export,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            ui: Ui::default(),
            export: Export::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub initial_section_name: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            initial_section_name: Some(smeta_app::DEFAULT_SECTION_NAME.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Export {
    pub title: Option<String>,
    pub rows_per_page: Option<i64>,
    pub dir: Option<String>,
}

impl Default for Export {
    fn default() -> Self {
        Self {
            title: Some(DEFAULT_EXPORT_TITLE.to_owned()),
            rows_per_page: Some(DEFAULT_ROWS_PER_PAGE),
            dir: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("SMETA_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set SMETA_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(smeta_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and move values under [storage], [ui], and [export]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.version != CONFIG_VERSION {
            bail!(
                "config {} has version {}; expected 1",
                path.display(),
                self.version
            );
        }

        if let Some(db_path) = &self.storage.db_path {
            smeta_db::validate_db_path(db_path)?;
        }

        if let Some(rows) = self.export.rows_per_page
            && rows <= 0
        {
            bail!(
                "export.rows_per_page in {} must be positive, got {}",
                path.display(),
                rows
            );
        }

        if let Some(name) = &self.ui.initial_section_name
            && name.trim().is_empty()
        {
            bail!(
                "ui.initial_section_name in {} must not be blank",
                path.display()
            );
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => smeta_db::default_db_path(),
        }
    }

    pub fn initial_section_name(&self) -> &str {
        self.ui
            .initial_section_name
            .as_deref()
            .unwrap_or(smeta_app::DEFAULT_SECTION_NAME)
    }

    pub fn export_title(&self) -> &str {
        self.export.title.as_deref().unwrap_or(DEFAULT_EXPORT_TITLE)
    }

    pub fn export_rows_per_page(&self) -> usize {
        self.export
            .rows_per_page
            .unwrap_or(DEFAULT_ROWS_PER_PAGE)
            .max(1) as usize
    }

    pub fn export_dir(&self) -> PathBuf {
        match &self.export.dir {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from("."),
        }
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# smeta config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/smeta/smeta.db)\n# db_path = \"/absolute/path/to/smeta.db\"\n\n[ui]\ninitial_section_name = \"{}\"\n\n[export]\ntitle = \"{}\"\nrows_per_page = {}\n# dir = \"/absolute/path/to/exports\"\n",
            path.display(),
            smeta_app::DEFAULT_SECTION_NAME,
            DEFAULT_EXPORT_TITLE,
            DEFAULT_ROWS_PER_PAGE,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.export_title(), "Estimate");
        assert_eq!(config.export_rows_per_page(), 40);
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[storage]\ndb_path=\"/tmp/s.db\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[storage], [ui], and [export]"));
        Ok(())
    }

    #[test]
    fn versioned_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[storage]\ndb_path = \"/tmp/estimates.db\"\n[ui]\ninitial_section_name = \"Kitchen\"\n[export]\ntitle = \"Kitchen remodel\"\nrows_per_page = 25\ndir = \"/tmp/out\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.db_path()?, PathBuf::from("/tmp/estimates.db"));
        assert_eq!(config.initial_section_name(), "Kitchen");
        assert_eq!(config.export_title(), "Kitchen remodel");
        assert_eq!(config.export_rows_per_page(), 25);
        assert_eq!(config.export_dir(), PathBuf::from("/tmp/out"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 7\n")?;
        let error = Config::load(&path).expect_err("v7 config should fail");
        assert!(error.to_string().contains("unsupported config version 7"));
        Ok(())
    }

    #[test]
    fn non_positive_rows_per_page_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[export]\nrows_per_page = 0\n")?;
        let error = Config::load(&path).expect_err("zero rows_per_page should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn blank_section_name_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[ui]\ninitial_section_name = \"  \"\n")?;
        let error = Config::load(&path).expect_err("blank section name should fail");
        assert!(error.to_string().contains("must not be blank"));
        Ok(())
    }

    #[test]
    fn uri_style_db_path_is_rejected() -> Result<()> {
        let (_temp, path) =
            write_config("version = 1\n[storage]\ndb_path = \"https://evil.example/smeta.db\"\n")?;
        let error = Config::load(&path).expect_err("URI db_path should fail validation");
        let message = error.to_string();
        assert!(
            message.contains("looks like a URI") || message.contains("filesystem path"),
            "unexpected message: {message}"
        );
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("SMETA_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("SMETA_CONFIG_PATH");
        }
        assert_eq!(resolved?, override_path);
        Ok(())
    }

    #[test]
    fn db_path_prefers_storage_config_over_env_override() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) =
            write_config("version = 1\n[storage]\ndb_path = \"/explicit/from-config.db\"\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("SMETA_DB_PATH", "/from/env.db");
        }
        let config = Config::load(&path)?;
        let resolved = config.db_path();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("SMETA_DB_PATH");
        }
        assert_eq!(resolved?, PathBuf::from("/explicit/from-config.db"));
        Ok(())
    }

    #[test]
    fn db_path_uses_env_override_when_storage_db_path_missing() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("SMETA_DB_PATH", "/from/env-only.db");
        }
        let config = Config::load(&path)?;
        let resolved = config.db_path();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("SMETA_DB_PATH");
        }
        assert_eq!(resolved?, PathBuf::from("/from/env-only.db"));
        Ok(())
    }

    #[test]
    fn db_path_defaults_to_smeta_db_when_unset() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("SMETA_DB_PATH");
        }
        let config = Config::load(&path)?;
        let resolved = config.db_path()?;
        assert!(resolved.ends_with("smeta.db"), "got {}", resolved.display());
        Ok(())
    }

    #[test]
    fn example_config_includes_required_sections() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        assert!(example.contains("[storage]"));
        assert!(example.contains("[ui]"));
        assert!(example.contains("[export]"));
        Ok(())
    }
}
