use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::{BaseDirs, ProjectDirs};
use inquire::Text;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_DATA_ROOT: &str = "~/Documents/Invoices";
/// Placeholder host; share links are opened with `open-share` unless the
/// user configures a page of their own.
pub const DEFAULT_SHARE_BASE_URL: &str = "https://invoices.example/";
pub const DEFAULT_EXTRACTION_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_EXTRACTION_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_KEY_ENV: &str = "API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("setup cancelled: {0}")]
    Prompt(#[from] inquire::InquireError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub data_root: String,
    pub share: ShareSettings,
    pub extraction: ExtractionSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            data_root: DEFAULT_DATA_ROOT.to_string(),
            share: ShareSettings::default(),
            extraction: ExtractionSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareSettings {
    /// Where share links point; the encoded invoice is appended as `?share=`.
    pub base_url: String,
}

impl Default for ShareSettings {
    fn default() -> Self {
        Self { base_url: DEFAULT_SHARE_BASE_URL.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// OpenAI-compatible API root; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key. The key itself
    /// never goes into the settings file.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EXTRACTION_BASE_URL.to_string(),
            model: DEFAULT_EXTRACTION_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: 60,
        }
    }
}

impl ExtractionSettings {
    /// Request timeout, never shorter than one second. A zero timeout
    /// would fail every request before it is sent.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl AppSettings {
    pub fn data_root(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.data_root))
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout::new(self.data_root())
    }
}

/// Directories under the data root.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working invoice and saved entities.
    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    /// User-editable copies of the layout templates.
    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }
}

pub fn config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "invoice-studio", "app") {
        return proj_dirs.config_dir().join("settings.toml");
    }
    PathBuf::from("settings.toml")
}

/// `Ok(None)` when no settings file exists yet.
pub fn load() -> Result<Option<AppSettings>, ConfigError> {
    load_from(&config_path())
}

pub fn load_from(path: &Path) -> Result<Option<AppSettings>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let settings = toml::from_str(&content).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
    debug!(path = %path.display(), "Loaded settings");
    Ok(Some(settings))
}

pub fn save(settings: &AppSettings) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_to(&path, settings)?;
    Ok(path)
}

pub fn save_to(path: &Path, settings: &AppSettings) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| ConfigError::Io { path: dir.to_path_buf(), source })?;
    }
    let toml_str = toml::to_string_pretty(settings)?;
    fs::write(path, toml_str).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    info!(path = %path.display(), "Settings saved");
    Ok(())
}

/// Interactive setup. Existing values are offered as defaults.
pub fn setup_config_wizard() -> Result<AppSettings, ConfigError> {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = load().ok().flatten().unwrap_or_default();

    let data_root = Text::new("Data directory:").with_default(&current.data_root).prompt()?;
    let share_base = Text::new("Share link base URL (links open with `invoice-studio open-share`):")
        .with_default(&current.share.base_url)
        .prompt()?;
    let model = Text::new("Extraction model:")
        .with_default(&current.extraction.model)
        .prompt()?;
    let api_key_env = Text::new("Environment variable holding the extraction API key:")
        .with_default(&current.extraction.api_key_env)
        .prompt()?;

    let settings = AppSettings {
        data_root,
        share: ShareSettings { base_url: share_base },
        extraction: ExtractionSettings { model, api_key_env, ..current.extraction },
    };
    let path = save(&settings)?;
    println!("✅ Settings saved to {}", path.display());
    Ok(settings)
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
