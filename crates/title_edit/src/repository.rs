use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::seq::IndexedRandom;
use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{
    ConfigStore, Configuration, DEFAULT_CUSTOM_SCREEN_NAME, RANDOM_CUSTOM_SCREEN_NAME,
    RANDOM_SCREEN_NAME,
};
use crate::host::AssetCatalog;
use crate::screen::ScreenDefinition;

const SCREEN_FILE_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum ScreenLoadError {
    #[error("no screen definitions found in {dir}")]
    NoScreens { dir: PathBuf },
    #[error("failed to list screen directory {dir}: {source}")]
    ListDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("screen file {path} does not exist")]
    Missing { path: PathBuf },
    #[error("failed to read screen file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse screen file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("screen '{name}' references game files that do not exist ({missing})")]
    MissingAssets { name: String, missing: String },
}

/// Loads screen definitions from disk and picks the one to show.
pub struct ScreenRepository {
    screens_dir: PathBuf,
    assets: Arc<dyn AssetCatalog>,
}

impl ScreenRepository {
    pub fn new(screens_dir: impl Into<PathBuf>, assets: Arc<dyn AssetCatalog>) -> Self {
        Self {
            screens_dir: screens_dir.into(),
            assets,
        }
    }

    pub fn screens_dir(&self) -> &Path {
        &self.screens_dir
    }

    /// Names of every definition file in the screen directory, sorted.
    pub fn available_screen_names(&self) -> Result<Vec<String>, ScreenLoadError> {
        let entries = fs::read_dir(&self.screens_dir).map_err(|source| ScreenLoadError::ListDir {
            dir: self.screens_dir.clone(),
            source,
        })?;
        let mut names = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|ext| ext.to_str()) == Some(SCREEN_FILE_EXTENSION)
            })
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(ToString::to_string)
            })
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    /// Picks the screen for the next title load. Never fails: anything that
    /// goes wrong resets `configuration` to the fallback selection, persists
    /// it and hands back [`ScreenDefinition::fallback`].
    pub fn select<R: Rng + ?Sized>(
        &self,
        configuration: &mut Configuration,
        store: &mut dyn ConfigStore,
        rng: &mut R,
    ) -> ScreenDefinition {
        let loaded = self
            .resolve_name(configuration, rng)
            .and_then(|name| self.load_valid(&name));
        match loaded {
            Ok(screen) => {
                info!(
                    screen = %screen.name,
                    selection = %configuration.selected_screen_name,
                    "screen_selected"
                );
                screen
            }
            Err(err) => {
                warn!(
                    error = %err,
                    selection = %configuration.selected_screen_name,
                    "screen_selection_failed_resetting"
                );
                configuration.reset_to_fallback();
                if let Err(save_err) = store.save(configuration) {
                    warn!(error = %save_err, "fallback_configuration_not_saved");
                }
                ScreenDefinition::fallback()
            }
        }
    }

    fn resolve_name<R: Rng + ?Sized>(
        &self,
        configuration: &Configuration,
        rng: &mut R,
    ) -> Result<String, ScreenLoadError> {
        match configuration.selected_screen_name.as_str() {
            RANDOM_SCREEN_NAME => {
                let names = self.available_screen_names()?;
                names
                    .choose(rng)
                    .cloned()
                    .ok_or_else(|| ScreenLoadError::NoScreens {
                        dir: self.screens_dir.clone(),
                    })
            }
            RANDOM_CUSTOM_SCREEN_NAME => Ok(configuration
                .custom_screen_names
                .choose(rng)
                .cloned()
                .unwrap_or_else(|| DEFAULT_CUSTOM_SCREEN_NAME.to_string())),
            name => Ok(name.to_string()),
        }
    }

    /// Loads `<screens_dir>/<name>.json` and checks it can be shown.
    pub fn load_valid(&self, name: &str) -> Result<ScreenDefinition, ScreenLoadError> {
        let path = self
            .screens_dir
            .join(format!("{name}.{SCREEN_FILE_EXTENSION}"));
        if !path.is_file() {
            return Err(ScreenLoadError::Missing { path });
        }
        let raw = fs::read_to_string(&path).map_err(|source| ScreenLoadError::Read {
            path: path.clone(),
            source,
        })?;
        let screen = parse_screen(&raw).map_err(|message| ScreenLoadError::Parse {
            path: path.clone(),
            message,
        })?;
        self.validate(&screen)?;
        Ok(screen)
    }

    /// A screen is showable when it uses a built-in title sequence or when
    /// both its level and its music exist in the game data.
    pub fn validate(&self, screen: &ScreenDefinition) -> Result<(), ScreenLoadError> {
        if screen.title_override.is_some() {
            return Ok(());
        }
        let missing = [screen.level_asset_path(), screen.bgm_path.clone()]
            .into_iter()
            .filter(|asset| !self.assets.file_exists(asset))
            .collect::<Vec<_>>();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ScreenLoadError::MissingAssets {
                name: screen.name.clone(),
                missing: missing.join(", "),
            })
        }
    }
}

fn parse_screen(raw: &str) -> Result<ScreenDefinition, String> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, ScreenDefinition>(&mut deserializer).map_err(|error| {
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
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    use super::*;
    use crate::screen::{LogoId, TitleScreenExpansion, FALLBACK_SCREEN_NAME};
    use crate::sim::{MemoryConfigStore, StaticAssetCatalog};

    struct Fixture {
        temp: TempDir,
        repository: ScreenRepository,
        store: MemoryConfigStore,
        rng: StdRng,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().expect("tempdir");
            let assets = StaticAssetCatalog::new([
                "bg/ffxiv/sea_s1/twn/s1t1/level/s1t1.lvb",
                "music/ffxiv/BGM_Town_Limsa.scd",
                "bg/ffxiv/fst_f1/twn/f1t1/level/f1t1.lvb",
                "music/ffxiv/BGM_Town_Gridania.scd",
            ]);
            let repository = ScreenRepository::new(temp.path(), Arc::new(assets));
            Self {
                temp,
                repository,
                store: MemoryConfigStore::default(),
                rng: StdRng::seed_from_u64(7),
            }
        }

        fn write_screen(&self, screen: &ScreenDefinition) {
            let path = self.temp.path().join(format!("{}.json", screen.name));
            let raw = serde_json::to_string_pretty(screen).expect("encode");
            fs::write(path, raw).expect("write screen");
        }

        fn select(&mut self, configuration: &mut Configuration) -> ScreenDefinition {
            self.repository
                .select(configuration, &mut self.store, &mut self.rng)
        }
    }

    fn town(name: &str, zone: &str, bgm: &str) -> ScreenDefinition {
        ScreenDefinition {
            name: name.to_string(),
            territory_path: zone.to_string(),
            logo: LogoId::Unspecified,
            bgm_path: bgm.to_string(),
            ..ScreenDefinition::fallback()
        }
    }

    fn limsa() -> ScreenDefinition {
        town(
            "Limsa",
            "ffxiv/sea_s1/twn/s1t1/level/s1t1",
            "music/ffxiv/BGM_Town_Limsa.scd",
        )
    }

    fn gridania() -> ScreenDefinition {
        town(
            "Gridania",
            "ffxiv/fst_f1/twn/f1t1/level/f1t1",
            "music/ffxiv/BGM_Town_Gridania.scd",
        )
    }

    fn dawntrail() -> ScreenDefinition {
        ScreenDefinition {
            name: DEFAULT_CUSTOM_SCREEN_NAME.to_string(),
            territory_path: String::new(),
            bgm_path: String::new(),
            title_override: Some(TitleScreenExpansion::Dawntrail),
            ..ScreenDefinition::fallback()
        }
    }

    fn selecting(name: &str) -> Configuration {
        Configuration {
            selected_screen_name: name.to_string(),
            ..Configuration::default()
        }
    }

    #[test]
    fn named_selection_loads_that_file_verbatim() {
        let mut fixture = Fixture::new();
        fixture.write_screen(&limsa());
        fixture.write_screen(&gridania());
        let mut configuration = selecting("Gridania");

        let screen = fixture.select(&mut configuration);

        assert_eq!(screen, gridania());
        assert_eq!(configuration, selecting("Gridania"));
        assert!(fixture.store.saved().is_empty());
    }

    #[test]
    fn missing_file_resets_and_persists_configuration() {
        let mut fixture = Fixture::new();
        let mut configuration = Configuration {
            custom_screen_names: vec!["Limsa".to_string()],
            display_logo: false,
            ..selecting("Deleted Screen")
        };

        let screen = fixture.select(&mut configuration);

        assert_eq!(screen, ScreenDefinition::fallback());
        assert_eq!(configuration.selected_screen_name, FALLBACK_SCREEN_NAME);
        assert_eq!(configuration.selected_logo, LogoId::ARealmReborn);
        assert!(configuration.display_logo);
        assert!(configuration.custom_screen_names.is_empty());
        assert_eq!(fixture.store.saved(), vec![configuration.clone()]);
    }

    #[test]
    fn screen_with_missing_assets_is_rejected() {
        let mut fixture = Fixture::new();
        fixture.write_screen(&town(
            "Ishgard",
            "ffxiv/roc_r1/twn/r1t1/level/r1t1",
            "music/ffxiv/BGM_Town_Ishgard.scd",
        ));
        let mut configuration = selecting("Ishgard");

        assert_eq!(fixture.select(&mut configuration), ScreenDefinition::fallback());
        assert_eq!(configuration.selected_screen_name, FALLBACK_SCREEN_NAME);

        let err = fixture.repository.load_valid("Ishgard").expect_err("invalid");
        assert!(matches!(err, ScreenLoadError::MissingAssets { .. }));
    }

    #[test]
    fn unparsable_file_reports_the_failing_field() {
        let fixture = Fixture::new();
        fs::write(
            fixture.temp.path().join("Broken.json"),
            r#"{ "name": "Broken", "fovY": "wide" }"#,
        )
        .expect("write");

        let err = fixture.repository.load_valid("Broken").expect_err("invalid");
        match err {
            ScreenLoadError::Parse { message, .. } => {
                assert!(message.contains("fovY"), "{message}")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn title_override_skips_asset_validation() {
        let mut fixture = Fixture::new();
        fixture.write_screen(&dawntrail());
        let mut configuration = selecting(DEFAULT_CUSTOM_SCREEN_NAME);

        assert_eq!(fixture.select(&mut configuration), dawntrail());
    }

    #[test]
    fn random_custom_with_empty_list_uses_the_default_name() {
        let mut fixture = Fixture::new();
        fixture.write_screen(&dawntrail());
        fixture.write_screen(&limsa());
        let mut configuration = selecting(RANDOM_CUSTOM_SCREEN_NAME);

        for _ in 0..5 {
            assert_eq!(fixture.select(&mut configuration), dawntrail());
        }
        assert_eq!(configuration.selected_screen_name, RANDOM_CUSTOM_SCREEN_NAME);
    }

    #[test]
    fn random_custom_picks_only_from_the_list() {
        let mut fixture = Fixture::new();
        fixture.write_screen(&limsa());
        fixture.write_screen(&gridania());
        fixture.write_screen(&dawntrail());
        let mut configuration = Configuration {
            custom_screen_names: vec!["Limsa".to_string(), "Gridania".to_string()],
            ..selecting(RANDOM_CUSTOM_SCREEN_NAME)
        };

        for _ in 0..20 {
            let screen = fixture.select(&mut configuration);
            assert!(screen.name == "Limsa" || screen.name == "Gridania", "{}", screen.name);
        }
    }

    #[test]
    fn random_picks_among_every_file_in_the_directory() {
        let mut fixture = Fixture::new();
        fixture.write_screen(&limsa());
        fixture.write_screen(&gridania());
        fs::write(fixture.temp.path().join("notes.txt"), "not a screen").expect("write");
        let mut configuration = selecting(RANDOM_SCREEN_NAME);

        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..40 {
            seen.insert(fixture.select(&mut configuration).name);
        }
        assert_eq!(
            seen.into_iter().collect::<Vec<_>>(),
            vec!["Gridania".to_string(), "Limsa".to_string()]
        );
    }

    #[test]
    fn random_over_an_empty_directory_falls_back() {
        let mut fixture = Fixture::new();
        let mut configuration = selecting(RANDOM_SCREEN_NAME);

        assert_eq!(fixture.select(&mut configuration), ScreenDefinition::fallback());
        assert_eq!(configuration.selected_screen_name, FALLBACK_SCREEN_NAME);
    }

    #[test]
    fn reselecting_after_failure_is_idempotent() {
        let mut fixture = Fixture::new();
        let mut configuration = selecting("Gone");

        let first = fixture.select(&mut configuration);
        let after_first = configuration.clone();
        let second = fixture.select(&mut configuration);

        assert_eq!(first, second);
        assert_eq!(configuration, after_first);
    }
}
