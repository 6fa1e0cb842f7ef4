use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::atomic_io::write_text_atomic;
use crate::screen::{LogoId, TitleScreenExpansion, Vec3, FALLBACK_SCREEN_NAME};

pub const RANDOM_SCREEN_NAME: &str = "Random";
pub const RANDOM_CUSTOM_SCREEN_NAME: &str = "Random (custom)";
pub const DEFAULT_CUSTOM_SCREEN_NAME: &str = "Dawntrail";
pub const CONFIGURATION_VERSION: u32 = 2;

/// How a user-level logo preference combines with the value a screen
/// definition carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverridePolicy {
    #[serde(alias = "Override")]
    AlwaysOverride,
    #[default]
    #[serde(alias = "UseIfUnspecified")]
    UseScreenValueIfUnspecified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    pub selected_screen_name: String,
    pub custom_screen_names: Vec<String>,
    pub selected_logo: LogoId,
    pub display_logo: bool,
    pub display_version_text: bool,
    pub logo_override: OverridePolicy,
    pub visibility_override: OverridePolicy,
    pub show_toast_on_load: bool,
    pub debug_logging: bool,
    pub version: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            selected_screen_name: DEFAULT_CUSTOM_SCREEN_NAME.to_string(),
            custom_screen_names: Vec::new(),
            selected_logo: LogoId::Dawntrail,
            display_logo: true,
            display_version_text: true,
            logo_override: OverridePolicy::UseScreenValueIfUnspecified,
            visibility_override: OverridePolicy::UseScreenValueIfUnspecified,
            show_toast_on_load: false,
            debug_logging: false,
            version: CONFIGURATION_VERSION,
        }
    }
}

impl Configuration {
    /// Puts the selection back into the known-good state used after a screen
    /// fails to load. Calling it again changes nothing.
    pub fn reset_to_fallback(&mut self) {
        self.custom_screen_names.clear();
        self.display_logo = true;
        self.selected_screen_name = FALLBACK_SCREEN_NAME.to_string();
        self.selected_logo = LogoId::ARealmReborn;
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("failed to encode configuration: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write configuration {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Persistence for [`Configuration`].
pub trait ConfigStore: Send {
    fn save(&mut self, configuration: &Configuration) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored configuration, writing defaults first when the file
    /// does not exist yet.
    pub fn load_or_init(&mut self) -> Result<Configuration, ConfigError> {
        if !self.path.exists() {
            let configuration = Configuration::default();
            self.save(&configuration)?;
            info!(path = %self.path.display(), "configuration_initialized");
            return Ok(configuration);
        }

        let raw = fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        parse_configuration(&raw).map_err(|message| ConfigError::Parse {
            path: self.path.clone(),
            message,
        })
    }
}

impl ConfigStore for JsonConfigStore {
    fn save(&mut self, configuration: &Configuration) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(configuration).map_err(ConfigError::Encode)?;
        write_text_atomic(&self.path, &text).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "configuration_saved");
        Ok(())
    }
}

fn parse_configuration(raw: &str) -> Result<Configuration, String> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, Configuration>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        if path.is_empty() || path == "." {
            source.to_string()
        } else {
            format!("at {path}: {source}")
        }
    })
}

/// Tuning for the title state machine. None of this is user-facing; the
/// defaults match what the host needs in practice.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    pub forcing_duration_ms: u64,
    pub weather_interval_ms: u64,
    pub time_interval_ms: u64,
    pub toast_delay_ms: u64,
    pub logo_hide_delay_ms: u64,
    pub logo_fade_ms: u64,
    pub chara_select_camera: Vec3,
    pub chara_select_focus: Vec3,
    pub chara_select_fov: f32,
    /// Built-in title type whose sequence is a cinematic and whose logo reveal
    /// has to be started by hand.
    pub cinematic_title: TitleScreenExpansion,
    /// Built-in title types that are forced back to `neutral_title` every
    /// frame when no override is configured.
    pub neutralized_titles: Vec<TitleScreenExpansion>,
    pub neutral_title: TitleScreenExpansion,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            forcing_duration_ms: 5_000,
            weather_interval_ms: 20,
            time_interval_ms: 50,
            toast_delay_ms: 2_000,
            logo_hide_delay_ms: 2_001,
            logo_fade_ms: 500,
            chara_select_camera: Vec3::ZERO,
            chara_select_focus: Vec3::new(0.0, 0.858_010_3, 0.0),
            chara_select_fov: 1.0,
            cinematic_title: TitleScreenExpansion::Dawntrail,
            neutralized_titles: vec![TitleScreenExpansion::Dawntrail],
            neutral_title: TitleScreenExpansion::Endwalker,
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn load_or_init_writes_defaults_then_round_trips_edits() {
        let temp = TempDir::new().expect("tempdir");
        let mut store = JsonConfigStore::new(temp.path().join("config").join("title_edit.json"));

        let mut configuration = store.load_or_init().expect("init");
        assert_eq!(configuration, Configuration::default());
        assert!(store.path().is_file());

        configuration.selected_screen_name = RANDOM_CUSTOM_SCREEN_NAME.to_string();
        configuration.custom_screen_names = vec!["Gridania".to_string()];
        configuration.logo_override = OverridePolicy::AlwaysOverride;
        store.save(&configuration).expect("save");

        let reloaded = store.load_or_init().expect("reload");
        assert_eq!(reloaded, configuration);
    }

    #[test]
    fn missing_fields_take_defaults_and_legacy_policy_names_parse() {
        let raw = r#"{ "selectedScreenName": "Gridania", "logoOverride": "Override" }"#;
        let configuration = parse_configuration(raw).expect("parse");
        assert_eq!(configuration.selected_screen_name, "Gridania");
        assert_eq!(configuration.logo_override, OverridePolicy::AlwaysOverride);
        assert_eq!(
            configuration.visibility_override,
            OverridePolicy::UseScreenValueIfUnspecified
        );
        assert!(configuration.display_logo);
    }

    #[test]
    fn parse_error_names_the_failing_field() {
        let raw = r#"{ "displayLogo": "yes" }"#;
        let message = parse_configuration(raw).expect_err("should fail");
        assert!(message.contains("displayLogo"), "{message}");
    }

    #[test]
    fn reset_to_fallback_is_idempotent() {
        let mut configuration = Configuration {
            selected_screen_name: "Broken".to_string(),
            custom_screen_names: vec!["Broken".to_string()],
            selected_logo: LogoId::Endwalker,
            display_logo: false,
            ..Configuration::default()
        };

        configuration.reset_to_fallback();
        let once = configuration.clone();
        configuration.reset_to_fallback();

        assert_eq!(configuration, once);
        assert_eq!(configuration.selected_screen_name, FALLBACK_SCREEN_NAME);
        assert_eq!(configuration.selected_logo, LogoId::ARealmReborn);
        assert!(configuration.display_logo);
        assert!(configuration.custom_screen_names.is_empty());
    }
}
