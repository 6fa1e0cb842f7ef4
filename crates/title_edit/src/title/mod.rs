use std::io;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info};

use crate::camera::CameraController;
use crate::config::{ConfigStore, Configuration, MachineConfig};
use crate::forcing::{ForcingLoop, ForcingSession};
use crate::host::{
    AmbientStateAccessor, CameraDevice, InterceptionListener, LobbyType, Notification, Notifier,
    UiState, UiSurface, TITLE_MENU_ADDON,
};
use crate::logo::{resolve_logo, LogoController, LOGO_RESOURCE_MARKER};
use crate::repository::ScreenRepository;
use crate::scheduler::{DeferredAction, DeferredScheduler};
use crate::screen::{ScreenDefinition, Vec3};

pub const TITLE_THEME_SUFFIX: &str = "_System_Title.scd";
pub const NOTIFICATION_TITLE: &str = "Title Edit";

/// Which scene load the machine is waiting to intercept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyPhase {
    Idle,
    AwaitingTitleSceneLoad,
    AwaitingCharaSelectSceneLoad,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSnapshot {
    pub phase: LobbyPhase,
    pub current_screen: String,
    pub last_loaded_screen: Option<String>,
    pub forcing_time: bool,
    pub forcing_weather: bool,
    pub camera_needs_reapply: bool,
    pub pending_logo_animation: bool,
    pub pending_deferred: usize,
}

/// Everything the machine needs from the outside world.
pub struct MachineParts {
    pub ambient: Arc<dyn AmbientStateAccessor>,
    pub camera: Box<dyn CameraDevice>,
    pub ui: Box<dyn UiSurface>,
    pub notifier: Box<dyn Notifier>,
    pub repository: ScreenRepository,
    pub configuration: Configuration,
    pub store: Box<dyn ConfigStore>,
    pub settings: MachineConfig,
}

/// Decides, per intercepted engine call, what to substitute on the title and
/// character-select screens, and owns the forcing loops and deferred UI work
/// that go with each title load.
pub struct TitleScreenStateMachine {
    settings: MachineConfig,
    configuration: Configuration,
    store: Box<dyn ConfigStore>,
    repository: ScreenRepository,
    rng: StdRng,
    ambient: Arc<dyn AmbientStateAccessor>,
    camera: CameraController,
    logo: LogoController,
    notifier: Box<dyn Notifier>,
    scheduler: DeferredScheduler,
    phase: LobbyPhase,
    current_screen: ScreenDefinition,
    last_loaded_screen: Option<ScreenDefinition>,
    pending_logo_animation: bool,
    time_forcing: Option<ForcingSession>,
    weather_forcing: Option<ForcingSession>,
}

impl TitleScreenStateMachine {
    pub fn new(parts: MachineParts) -> Self {
        Self::with_rng(parts, StdRng::from_os_rng())
    }

    /// Builds the machine and selects the first screen.
    pub fn with_rng(parts: MachineParts, rng: StdRng) -> Self {
        let MachineParts {
            ambient,
            camera,
            ui,
            notifier,
            repository,
            configuration,
            store,
            settings,
        } = parts;
        let logo = LogoController::new(ui, settings.logo_fade_ms);
        let mut machine = Self {
            settings,
            configuration,
            store,
            repository,
            rng,
            ambient,
            camera: CameraController::new(camera),
            logo,
            notifier,
            scheduler: DeferredScheduler::new(),
            phase: LobbyPhase::Idle,
            current_screen: ScreenDefinition::fallback(),
            last_loaded_screen: None,
            pending_logo_animation: false,
            time_forcing: None,
            weather_forcing: None,
        };
        machine.refresh_screen();
        machine
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn current_screen(&self) -> &ScreenDefinition {
        &self.current_screen
    }

    pub fn last_loaded_screen(&self) -> Option<&ScreenDefinition> {
        self.last_loaded_screen.as_ref()
    }

    pub fn phase(&self) -> LobbyPhase {
        self.phase
    }

    pub fn snapshot(&self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            phase: self.phase,
            current_screen: self.current_screen.name.clone(),
            last_loaded_screen: self.last_loaded_screen.as_ref().map(|s| s.name.clone()),
            forcing_time: self.time_forcing.as_ref().is_some_and(ForcingSession::is_active),
            forcing_weather: self
                .weather_forcing
                .as_ref()
                .is_some_and(ForcingSession::is_active),
            camera_needs_reapply: self.camera.needs_reapply(),
            pending_logo_animation: self.pending_logo_animation,
            pending_deferred: self.scheduler.pending_count(),
        }
    }

    /// Re-runs screen selection for the next title load.
    pub fn refresh_screen(&mut self) {
        self.current_screen =
            self.repository
                .select(&mut self.configuration, self.store.as_mut(), &mut self.rng);
    }

    pub fn stop_forcing(&mut self) {
        if let Some(session) = self.time_forcing.take() {
            session.cancel();
        }
        if let Some(session) = self.weather_forcing.take() {
            session.cancel();
        }
        self.camera.disarm_reapply();
    }

    /// Stops the forcing loops and waits for their threads.
    pub fn shutdown(&mut self) {
        for session in [self.time_forcing.take(), self.weather_forcing.take()]
            .into_iter()
            .flatten()
        {
            session.cancel();
            let label = session.label();
            let outcome = session.join();
            debug!(label, outcome = ?outcome, "forcing_joined");
        }
        self.scheduler.clear();
        self.camera.disarm_reapply();
    }

    fn start_forcing(&mut self) {
        let duration = Duration::from_millis(self.settings.forcing_duration_ms);
        let weather_id = self.current_screen.weather_id;
        let time_offset = self.current_screen.time_offset;
        debug!(
            previous_weather = ?self.ambient.weather().ok(),
            weather_id,
            time_offset,
            "ambient_forcing_started"
        );

        let ambient = Arc::clone(&self.ambient);
        let weather = ForcingLoop::new(
            "weather",
            Duration::from_millis(self.settings.weather_interval_ms),
            duration,
        )
        .spawn(move || ambient.set_weather(weather_id));
        self.weather_forcing = started_or_logged("weather", weather);

        let ambient = Arc::clone(&self.ambient);
        let time = ForcingLoop::new(
            "time",
            Duration::from_millis(self.settings.time_interval_ms),
            duration,
        )
        .spawn(move || ambient.set_time_offset(time_offset));
        self.time_forcing = started_or_logged("time", time);
    }

    fn force_title_type(&self) {
        if let Some(title) = self.current_screen.title_override {
            self.ambient.set_title_screen_type(title);
        } else if self
            .ambient
            .title_screen_type()
            .is_some_and(|title| self.settings.neutralized_titles.contains(&title))
        {
            self.ambient
                .set_title_screen_type(self.settings.neutral_title);
        }
    }

    fn run_deferred(&mut self, action: DeferredAction) {
        match action {
            DeferredAction::LoadToast { screen_name } => {
                if self.logo.ui().addon_state(TITLE_MENU_ADDON) != UiState::Visible {
                    debug!(screen = %screen_name, "load_toast_skipped_menu_hidden");
                    return;
                }
                self.notifier.notify(Notification {
                    title: NOTIFICATION_TITLE.to_string(),
                    content: format!("Now displaying: {screen_name}"),
                });
            }
            DeferredAction::HideLogo { delay_ms } => {
                self.logo.begin_hide(delay_ms, self.scheduler.now_ms());
            }
        }
    }

    fn reap_finished_forcing(&mut self) {
        if self.time_forcing.as_ref().is_some_and(ForcingSession::is_finished) {
            self.time_forcing = None;
        }
        if self
            .weather_forcing
            .as_ref()
            .is_some_and(ForcingSession::is_finished)
        {
            self.weather_forcing = None;
        }
    }
}

fn started_or_logged(
    label: &'static str,
    spawned: io::Result<ForcingSession>,
) -> Option<ForcingSession> {
    match spawned {
        Ok(session) => Some(session),
        Err(err) => {
            error!(label, error = %err, "forcing_spawn_failed");
            None
        }
    }
}

impl InterceptionListener for TitleScreenStateMachine {
    fn on_lobby_load(&mut self, lobby: LobbyType, original: &mut dyn FnMut(LobbyType)) {
        debug!(lobby = ?lobby, "lobby_load");
        self.stop_forcing();
        if self.ambient.title_cinematic_playing() {
            // The cinematic's own cleanup switches cameras too late for the
            // lobby we are entering.
            info!("title_cinematic_stopped_on_lobby_load");
            self.ambient.stop_title_cinematic();
            self.camera.reset_active_camera();
        }
        match lobby {
            LobbyType::Title if self.current_screen.title_override.is_none() => {
                self.phase = LobbyPhase::AwaitingTitleSceneLoad;
            }
            LobbyType::CharaSelect => {
                self.refresh_screen();
                self.phase = LobbyPhase::AwaitingCharaSelectSceneLoad;
            }
            _ => {}
        }
        original(lobby);
    }

    fn on_scene_create(&mut self, zone_path: &str, original: &mut dyn FnMut(&str) -> i32) -> i32 {
        debug!(zone = zone_path, phase = ?self.phase, "scene_create");
        match self.phase {
            LobbyPhase::AwaitingCharaSelectSceneLoad => {
                self.phase = LobbyPhase::Idle;
                let result = original(zone_path);
                let (camera, focus, fov) = (
                    self.settings.chara_select_camera,
                    self.settings.chara_select_focus,
                    self.settings.chara_select_fov,
                );
                self.camera.fix_on(camera, focus, fov);
                result
            }
            LobbyPhase::AwaitingTitleSceneLoad => {
                self.phase = LobbyPhase::Idle;
                self.last_loaded_screen = Some(self.current_screen.clone());
                if self.configuration.show_toast_on_load {
                    self.scheduler.schedule(
                        self.settings.toast_delay_ms,
                        DeferredAction::LoadToast {
                            screen_name: self.current_screen.name.clone(),
                        },
                    );
                }
                info!(
                    screen = %self.current_screen.name,
                    zone = %self.current_screen.territory_path,
                    "title_scene_substituted"
                );
                let zone = self.current_screen.territory_path.clone();
                let result = original(&zone);
                self.camera.arm_reapply();
                self.start_forcing();
                result
            }
            LobbyPhase::Idle => original(zone_path),
        }
    }

    fn on_play_music(&mut self, file: &str, original: &mut dyn FnMut(&str) -> u64) -> u64 {
        let substitute = file.ends_with(TITLE_THEME_SUFFIX)
            && self.ambient.lobby_type() == LobbyType::Title
            && self.current_screen.title_override.is_none();
        if substitute {
            debug!(
                requested = file,
                bgm = %self.current_screen.bgm_path,
                "title_music_substituted"
            );
            original(&self.current_screen.bgm_path)
        } else {
            original(file)
        }
    }

    fn on_load_logo_resource(
        &mut self,
        resource: &str,
        original: &mut dyn FnMut(&str) -> u64,
    ) -> u64 {
        if !resource.contains(LOGO_RESOURCE_MARKER) {
            return original(resource);
        }
        let resolution = resolve_logo(&self.configuration, &self.current_screen);
        debug!(
            requested = resource,
            logo = %resolution.logo,
            asset = resolution.asset_name,
            display = resolution.display,
            "logo_resource_substituted"
        );
        let result = original(resolution.asset_name);

        // The cinematic logo is normally revealed by its cutscene, which never
        // plays on a custom screen.
        let cinematic = self.settings.cinematic_title;
        if resolution.logo.title_type() == Some(cinematic)
            && self.current_screen.title_override != Some(cinematic)
        {
            self.pending_logo_animation = true;
        }
        if !resolution.display {
            self.logo
                .hide(&mut self.scheduler, self.settings.logo_hide_delay_ms);
        }
        result
    }

    fn on_fix_on(
        &mut self,
        camera: Vec3,
        focus: Vec3,
        fov_y: f32,
        original: &mut dyn FnMut(Vec3, Vec3, f32),
    ) {
        self.camera
            .on_fix_on(camera, focus, fov_y, &self.current_screen, original);
    }

    fn on_play_movie(&mut self, movie_id: i32, original: &mut dyn FnMut(i32) -> u64) -> u64 {
        debug!(movie_id, "play_movie");
        self.stop_forcing();
        self.refresh_screen();
        original(movie_id)
    }

    fn on_title_logo_ready(&mut self) {
        if self.pending_logo_animation {
            self.pending_logo_animation = false;
            self.logo.animate_idle_loop();
        }
    }

    fn on_frame(&mut self, frame_dt_ms: u64) {
        self.force_title_type();

        match self.ambient.lobby_type() {
            LobbyType::Title => {
                if let Some(screen) = self.last_loaded_screen.as_ref() {
                    self.camera.apply_screen(screen);
                }
            }
            LobbyType::CharaSelect => self.camera.relevel_lobby_look(),
            _ => {}
        }

        for action in self.scheduler.advance(frame_dt_ms) {
            self.run_deferred(action);
        }
        self.logo.step(self.scheduler.now_ms());
        self.reap_finished_forcing();
    }
}
