use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use title_edit::host::TITLE_MENU_ADDON;
use title_edit::{ScreenRepository, UiState};
use tracing::{debug, error, info, warn};

use super::bootstrap::HostWiring;
use super::script::ReplayEvent;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReplaySummary {
    pub(crate) events: usize,
    pub(crate) frames: u64,
    pub(crate) scenes: Vec<String>,
    pub(crate) music: Vec<String>,
    pub(crate) logos: Vec<String>,
    pub(crate) notifications: Vec<String>,
    pub(crate) camera_calls: usize,
    pub(crate) current_screen: String,
    pub(crate) last_loaded_screen: Option<String>,
    pub(crate) weather: u8,
    pub(crate) time_offset: Option<u16>,
}

/// Feeds `events` through the host in order, then stops the forcing loops.
pub(crate) fn replay(
    host: &mut HostWiring,
    events: &[ReplayEvent],
    realtime: bool,
) -> ReplaySummary {
    let mut frames = 0u64;
    for (index, event) in events.iter().enumerate() {
        debug!(index, event = ?event, "replay_event");
        frames += apply(host, event, realtime);
    }

    host.machine.borrow_mut().shutdown();

    let machine = host.machine.borrow();
    let log = host.engine.log();
    let ambient = host.engine.ambient();
    ReplaySummary {
        events: events.len(),
        frames,
        scenes: log.scenes.clone(),
        music: log.music.clone(),
        logos: log.logos.clone(),
        notifications: host
            .notifier
            .sent()
            .into_iter()
            .map(|notification| notification.content)
            .collect(),
        camera_calls: host.camera.calls().len(),
        current_screen: machine.current_screen().name.clone(),
        last_loaded_screen: machine.last_loaded_screen().map(|screen| screen.name.clone()),
        weather: ambient.current_weather(),
        time_offset: ambient.current_time_offset(),
    }
}

fn apply(host: &mut HostWiring, event: &ReplayEvent, realtime: bool) -> u64 {
    let engine = &mut host.engine;
    match event {
        ReplayEvent::LobbyLoad { lobby } => engine.load_lobby((*lobby).into()),
        ReplayEvent::SceneCreate { zone } => {
            engine.create_scene(zone);
        }
        ReplayEvent::PlayMusic { file } => {
            engine.play_music(file);
        }
        ReplayEvent::LoadLogo { resource } => {
            engine.load_logo_resource(resource);
        }
        ReplayEvent::FixOn {
            camera,
            focus,
            fov_y,
        } => engine.fix_on(*camera, *focus, *fov_y),
        ReplayEvent::TitleLogoReady => engine.title_logo_ready(),
        ReplayEvent::PlayMovie { movie_id } => {
            engine.play_movie(*movie_id);
        }
        ReplayEvent::Frames { count, dt_ms } => {
            if !realtime {
                engine.frames(*count, *dt_ms);
                return u64::from(*count);
            }
            for _ in 0..*count {
                engine.frames(1, *dt_ms);
                thread::sleep(Duration::from_millis(*dt_ms));
            }
            return u64::from(*count);
        }
        ReplayEvent::ShowTitleMenu { visible } => {
            let state = if *visible {
                UiState::Visible
            } else {
                UiState::Hidden
            };
            host.ui.place_addon(TITLE_MENU_ADDON, state);
        }
        ReplayEvent::Cinematic { playing } => engine.ambient().place_cinematic(*playing),
    }
    0
}

pub(crate) fn run_replay(mut host: HostWiring, events: &[ReplayEvent], realtime: bool) -> ExitCode {
    let summary = replay(&mut host, events, realtime);
    info!(
        events = summary.events,
        frames = summary.frames,
        scenes = ?summary.scenes,
        music = ?summary.music,
        logos = ?summary.logos,
        camera_calls = summary.camera_calls,
        notifications = ?summary.notifications,
        screen = %summary.current_screen,
        last_loaded = ?summary.last_loaded_screen,
        weather = summary.weather,
        time_offset = ?summary.time_offset,
        "replay_finished"
    );
    ExitCode::SUCCESS
}

/// Prints every screen definition and whether it could be shown right now.
pub(crate) fn run_list(repository: &ScreenRepository) -> ExitCode {
    let names = match repository.available_screen_names() {
        Ok(names) => names,
        Err(err) => {
            error!(error = %err, "screen_list_failed");
            return ExitCode::FAILURE;
        }
    };
    if names.is_empty() {
        warn!(dir = %repository.screens_dir().display(), "no_screen_definitions");
    }
    for name in names {
        match repository.load_valid(&name) {
            Ok(screen) => match screen.title_override {
                Some(title) => println!("{name}\tbuilt-in {}", title.label()),
                None => println!("{name}\t{}", screen.territory_path),
            },
            Err(err) => println!("{name}\tunusable: {err}"),
        }
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::bootstrap::fixtures::{data_root, LIMSA_BGM, LIMSA_ZONE};
    use crate::app::bootstrap::{build_host, load_settings};
    use crate::app::script::LobbyName;

    const TITLE_ZONE: &str = "ffxiv/zon_z1/chr/z1c1/level/z1c1";
    const TITLE_THEME: &str = "music/ffxiv/BGM_Ex4_System_Title.scd";

    fn title_boot() -> Vec<ReplayEvent> {
        vec![
            ReplayEvent::ShowTitleMenu { visible: true },
            ReplayEvent::LobbyLoad {
                lobby: LobbyName::Title,
            },
            ReplayEvent::SceneCreate {
                zone: TITLE_ZONE.to_string(),
            },
            ReplayEvent::PlayMusic {
                file: TITLE_THEME.to_string(),
            },
            ReplayEvent::LoadLogo {
                resource: "Title_Logo600".to_string(),
            },
            ReplayEvent::Frames {
                count: 25,
                dt_ms: 100,
            },
        ]
    }

    #[test]
    fn title_boot_replays_onto_the_selected_screen() {
        let root = data_root("Limsa");
        let settings = load_settings(Some(root.path())).expect("settings");
        let mut host = build_host(settings, Some(3)).expect("host");

        let summary = replay(&mut host, &title_boot(), false);

        assert_eq!(summary.events, 6);
        assert_eq!(summary.frames, 25);
        assert_eq!(summary.scenes, vec![LIMSA_ZONE.to_string()]);
        assert_eq!(summary.music, vec![LIMSA_BGM.to_string()]);
        assert_eq!(summary.logos, vec!["Title_Logo".to_string()]);
        assert_eq!(summary.notifications, vec!["Now displaying: Limsa".to_string()]);
        assert_eq!(summary.last_loaded_screen.as_deref(), Some("Limsa"));
        assert_eq!(summary.camera_calls, 25);
    }

    #[test]
    fn unusable_selection_replays_the_fallback_screen() {
        let root = data_root("Broken");
        let settings = load_settings(Some(root.path())).expect("settings");
        let mut host = build_host(settings, Some(3)).expect("host");

        let summary = replay(&mut host, &title_boot(), false);

        assert_eq!(summary.current_screen, "A Realm Reborn");
        assert_eq!(summary.scenes, vec![TITLE_ZONE.to_string()]);
        assert_eq!(
            summary.music,
            vec!["music/ffxiv/BGM_System_Title.scd".to_string()]
        );

        let stored = std::fs::read_to_string(root.path().join("config").join("title_edit.json"))
            .expect("stored configuration");
        assert!(stored.contains("\"selectedScreenName\": \"A Realm Reborn\""), "{stored}");
    }

    #[test]
    fn list_reports_every_definition() {
        let root = data_root("Limsa");
        let settings = load_settings(Some(root.path())).expect("settings");
        let repository =
            crate::app::bootstrap::build_repository(&settings.paths).expect("repository");
        assert_eq!(
            repository.available_screen_names().expect("names"),
            vec!["Broken".to_string(), "Limsa".to_string()]
        );
        assert_eq!(run_list(&repository), ExitCode::SUCCESS);
    }
}
