use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

mod atomic_io;
pub mod camera;
pub mod config;
pub mod forcing;
pub mod host;
pub mod logo;
pub mod repository;
pub mod scheduler;
pub mod screen;
pub mod sim;
pub mod title;

pub use camera::CameraController;
pub use config::{
    ConfigError, ConfigStore, Configuration, JsonConfigStore, MachineConfig, OverridePolicy,
    RANDOM_CUSTOM_SCREEN_NAME, RANDOM_SCREEN_NAME,
};
pub use forcing::{CancellationToken, ForcingLoop, ForcingOutcome, ForcingSession};
pub use host::{
    AmbientError, AmbientStateAccessor, AssetCatalog, CameraDevice, EngineEventSource,
    InterceptionListener, LobbyType, Notification, Notifier, TimelineJump, UiState, UiSurface,
};
pub use logo::{logo_asset_name, resolve_logo, LogoController, LogoResolution};
pub use repository::{ScreenLoadError, ScreenRepository};
pub use scheduler::{DeferredAction, DeferredScheduler};
pub use screen::{LogoId, ScreenDefinition, TitleScreenExpansion, Vec3, FALLBACK_SCREEN_NAME};
pub use title::{LobbyPhase, MachineParts, RuntimeSnapshot, TitleScreenStateMachine};

pub const ROOT_ENV_VAR: &str = "TITLE_EDIT_ROOT";

#[derive(Debug, Clone)]
pub struct TitleEditPaths {
    pub root: PathBuf,
    pub screens_dir: PathBuf,
    pub host_files_manifest: PathBuf,
    pub config_path: PathBuf,
}

impl TitleEditPaths {
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            screens_dir: root.join("assets").join("screens"),
            host_files_manifest: root.join("assets").join("host_files.json"),
            config_path: root.join("config").join("title_edit.json"),
            root,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("screen directory does not exist: {0}")]
    MissingScreensDir(PathBuf),
    #[error(
        "{var} is set but does not point to a valid title edit root: {path}\n\
A valid root must contain Cargo.toml and assets/."
    )]
    InvalidRoot { var: &'static str, path: PathBuf },
    #[error(
        "Could not detect the title edit root by walking upward from: {start_dir}\n\
Expected a directory containing Cargo.toml and assets/.\n\
Set {env_var} or pass --root explicitly."
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

/// Resolves the data layout from an explicit root, `TITLE_EDIT_ROOT`, or the
/// nearest ancestor of the executable that looks like a checkout.
pub fn resolve_paths(explicit_root: Option<&Path>) -> Result<TitleEditPaths, StartupError> {
    let root = match explicit_root {
        Some(root) => checked_root("--root", root)?,
        None => resolve_root()?,
    };
    let paths = TitleEditPaths::under(root);
    if !paths.screens_dir.is_dir() {
        return Err(StartupError::MissingScreensDir(paths.screens_dir));
    }
    Ok(paths)
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => checked_root(ROOT_ENV_VAR, Path::new(&value)),
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            exe_dir
                .ancestors()
                .find(|candidate| is_root_marker(candidate))
                .map(normalize_path)
                .ok_or_else(|| StartupError::RootNotFound {
                    start_dir: normalize_path(&exe_dir),
                    env_var: ROOT_ENV_VAR,
                })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn checked_root(var: &'static str, raw: &Path) -> Result<PathBuf, StartupError> {
    let normalized = normalize_path(raw);
    if is_root_marker(&normalized) {
        Ok(normalized)
    } else {
        Err(StartupError::InvalidRoot {
            var,
            path: normalized,
        })
    }
}

fn is_root_marker(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && path.join("assets").is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn root_marker_requires_cargo_toml_and_assets() {
        let temp = TempDir::new().expect("tempdir");
        assert!(!is_root_marker(temp.path()));

        fs::create_dir_all(temp.path().join("assets")).expect("assets");
        assert!(!is_root_marker(temp.path()));

        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("cargo toml");
        assert!(is_root_marker(temp.path()));
    }

    #[test]
    fn explicit_root_requires_a_screen_directory() {
        let temp = TempDir::new().expect("tempdir");
        fs::create_dir_all(temp.path().join("assets")).expect("assets");
        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("cargo toml");

        let err = resolve_paths(Some(temp.path())).expect_err("no screens dir");
        assert!(matches!(err, StartupError::MissingScreensDir(_)));

        fs::create_dir_all(temp.path().join("assets").join("screens")).expect("screens");
        let paths = resolve_paths(Some(temp.path())).expect("paths");
        assert!(paths.config_path.ends_with("config/title_edit.json"));
    }
}
