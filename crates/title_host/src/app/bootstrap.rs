use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use thiserror::Error;
use title_edit::sim::{
    SimAmbient, SimCamera, SimNotifier, SimUi, SimulatedEngine, StaticAssetCatalog,
};
use title_edit::{
    resolve_paths, ConfigError, Configuration, EngineEventSource, JsonConfigStore, MachineConfig,
    MachineParts, ScreenRepository, StartupError, TitleEditPaths, TitleScreenStateMachine,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// The host's title logo element: animated node plus the visible logo.
const LOGO_NODE_COUNT: usize = 2;

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read host file manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse host file manifest {path}: {message}")]
    ManifestParse { path: PathBuf, message: String },
}

/// Resolved layout plus the stored configuration, loaded before logging is up.
pub(crate) struct Settings {
    pub(crate) paths: TitleEditPaths,
    pub(crate) store: JsonConfigStore,
    pub(crate) configuration: Configuration,
}

pub(crate) struct HostWiring {
    pub(crate) machine: Rc<RefCell<TitleScreenStateMachine>>,
    pub(crate) engine: SimulatedEngine,
    pub(crate) ui: SimUi,
    pub(crate) camera: SimCamera,
    pub(crate) notifier: SimNotifier,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HostFileManifest {
    files: Vec<String>,
}

pub(crate) fn load_settings(root: Option<&Path>) -> Result<Settings, BootstrapError> {
    let paths = resolve_paths(root)?;
    let mut store = JsonConfigStore::new(&paths.config_path);
    let configuration = store.load_or_init()?;
    Ok(Settings {
        paths,
        store,
        configuration,
    })
}

pub(crate) fn init_tracing(debug_logging: bool) {
    let default_level = if debug_logging { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

pub(crate) fn build_repository(paths: &TitleEditPaths) -> Result<ScreenRepository, BootstrapError> {
    let assets = load_host_files(&paths.host_files_manifest)?;
    info!(
        files = assets.len(),
        manifest = %paths.host_files_manifest.display(),
        "host_files_loaded"
    );
    Ok(ScreenRepository::new(
        paths.screens_dir.clone(),
        Arc::new(assets),
    ))
}

pub(crate) fn build_host(
    settings: Settings,
    seed: Option<u64>,
) -> Result<HostWiring, BootstrapError> {
    info!(root = %settings.paths.root.display(), "=== Title Edit Host Startup ===");
    let repository = build_repository(&settings.paths)?;

    let ambient = SimAmbient::default();
    let camera = SimCamera::default();
    let ui = SimUi::with_logo_nodes(LOGO_NODE_COUNT);
    let notifier = SimNotifier::default();

    let parts = MachineParts {
        ambient: Arc::new(ambient.clone()),
        camera: Box::new(camera.clone()),
        ui: Box::new(ui.clone()),
        notifier: Box::new(notifier.clone()),
        repository,
        configuration: settings.configuration,
        store: Box::new(settings.store),
        settings: MachineConfig::default(),
    };
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let machine = Rc::new(RefCell::new(TitleScreenStateMachine::with_rng(parts, rng)));

    let mut engine = SimulatedEngine::new(ambient);
    engine.subscribe(Box::new(Rc::clone(&machine)));

    Ok(HostWiring {
        machine,
        engine,
        ui,
        camera,
        notifier,
    })
}

fn load_host_files(path: &Path) -> Result<StaticAssetCatalog, BootstrapError> {
    let raw = fs::read_to_string(path).map_err(|source| BootstrapError::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest = parse_manifest(&raw).map_err(|message| BootstrapError::ManifestParse {
        path: path.to_path_buf(),
        message,
    })?;
    Ok(StaticAssetCatalog::new(manifest.files))
}

fn parse_manifest(raw: &str) -> Result<HostFileManifest, String> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, HostFileManifest>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        if path.is_empty() || path == "." {
            source.to_string()
        } else {
            format!("at {path}: {source}")
        }
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::data_root;
    use super::*;

    #[test]
    fn settings_load_the_stored_configuration() {
        let root = data_root("Limsa");
        let settings = load_settings(Some(root.path())).expect("settings");
        assert_eq!(settings.configuration.selected_screen_name, "Limsa");
        assert!(settings.configuration.show_toast_on_load);
    }

    #[test]
    fn missing_configuration_is_created_with_defaults() {
        let root = data_root("Limsa");
        fs::remove_file(root.path().join("config").join("title_edit.json")).expect("remove");

        let settings = load_settings(Some(root.path())).expect("settings");
        assert_eq!(settings.configuration, Configuration::default());
        assert!(settings.paths.config_path.is_file());
    }

    #[test]
    fn host_starts_on_the_selected_screen() {
        let root = data_root("Limsa");
        let settings = load_settings(Some(root.path())).expect("settings");
        let host = build_host(settings, Some(1)).expect("host");
        assert_eq!(host.machine.borrow().current_screen().name, "Limsa");
    }

    #[test]
    fn manifest_errors_name_the_failing_field() {
        let err = parse_manifest(r#"{"files": ["a", 3]}"#).expect_err("bad entry");
        assert!(err.contains("files[1]"), "{err}");

        let root = data_root("Limsa");
        fs::write(root.path().join("assets").join("host_files.json"), "{").expect("write");
        let settings = load_settings(Some(root.path())).expect("settings");
        assert!(matches!(
            build_host(settings, None),
            Err(BootstrapError::ManifestParse { .. })
        ));
    }
}
