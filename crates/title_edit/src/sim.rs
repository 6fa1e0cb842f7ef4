//! In-memory host used by the tests and by the replay harness. Every fake is
//! a cheap `Clone` handle over shared state, so a test can keep one copy for
//! inspection while the machine owns another.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

use crate::config::{ConfigError, ConfigStore, Configuration};
use crate::host::{
    AmbientError, AmbientStateAccessor, AssetCatalog, CameraDevice, EngineEventSource,
    InterceptionListener, LobbyType, Notification, Notifier, TimelineJump, UiState, UiSurface,
    TITLE_LOGO_ADDON,
};
use crate::screen::{TitleScreenExpansion, Vec3};

static SIM_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_sim_lock_poison_once(operation: &'static str) {
    if SIM_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "sim state lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Default)]
struct Shared<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Shared<T> {
    fn read(&self) -> RwLockReadGuard<'_, T> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn_sim_lock_poison_once("read");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, T> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn_sim_lock_poison_once("write");
                poisoned.into_inner()
            }
        }
    }
}

#[derive(Debug)]
struct AmbientState {
    weather: u8,
    time_offset: Option<u16>,
    weather_writes: usize,
    time_writes: usize,
    fail_weather_writes: bool,
    lobby: LobbyType,
    title_type_raw: i32,
    title_type_writes: Vec<TitleScreenExpansion>,
    cinematic_playing: bool,
}

impl Default for AmbientState {
    fn default() -> Self {
        Self {
            weather: 2,
            time_offset: None,
            weather_writes: 0,
            time_writes: 0,
            fail_weather_writes: false,
            lobby: LobbyType::None,
            title_type_raw: TitleScreenExpansion::Endwalker as i32,
            title_type_writes: Vec::new(),
            cinematic_playing: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimAmbient {
    state: Shared<AmbientState>,
}

impl SimAmbient {
    pub fn current_weather(&self) -> u8 {
        self.state.read().weather
    }

    pub fn current_time_offset(&self) -> Option<u16> {
        self.state.read().time_offset
    }

    pub fn weather_writes(&self) -> usize {
        self.state.read().weather_writes
    }

    pub fn time_writes(&self) -> usize {
        self.state.read().time_writes
    }

    pub fn fail_weather_writes(&self, fail: bool) {
        self.state.write().fail_weather_writes = fail;
    }

    pub fn place_lobby(&self, lobby: LobbyType) {
        self.state.write().lobby = lobby;
    }

    pub fn place_title_type_raw(&self, raw: i32) {
        self.state.write().title_type_raw = raw;
    }

    pub fn title_type_raw(&self) -> i32 {
        self.state.read().title_type_raw
    }

    pub fn title_type_writes(&self) -> Vec<TitleScreenExpansion> {
        self.state.read().title_type_writes.clone()
    }

    pub fn place_cinematic(&self, playing: bool) {
        self.state.write().cinematic_playing = playing;
    }
}

impl AmbientStateAccessor for SimAmbient {
    fn weather(&self) -> Result<u8, AmbientError> {
        Ok(self.state.read().weather)
    }

    fn set_weather(&self, weather_id: u8) -> Result<(), AmbientError> {
        let mut state = self.state.write();
        if state.fail_weather_writes {
            return Err(AmbientError::Write {
                target: "weather",
                message: "environment manager unavailable".to_string(),
            });
        }
        state.weather = weather_id;
        state.weather_writes += 1;
        Ok(())
    }

    fn set_time_offset(&self, time_offset: u16) -> Result<(), AmbientError> {
        let mut state = self.state.write();
        state.time_offset = Some(time_offset);
        state.time_writes += 1;
        Ok(())
    }

    fn lobby_type(&self) -> LobbyType {
        self.state.read().lobby
    }

    fn title_screen_type(&self) -> Option<TitleScreenExpansion> {
        TitleScreenExpansion::from_raw(self.state.read().title_type_raw)
    }

    fn set_title_screen_type(&self, title: TitleScreenExpansion) {
        let mut state = self.state.write();
        state.title_type_raw = title as i32;
        state.title_type_writes.push(title);
    }

    fn title_cinematic_playing(&self) -> bool {
        self.state.read().cinematic_playing
    }

    fn stop_title_cinematic(&self) {
        self.state.write().cinematic_playing = false;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CameraCall {
    FixOn { camera: Vec3, focus: Vec3, fov_y: f32 },
    SetActiveCamera(i32),
    SetLookAt(Vec3),
}

#[derive(Debug)]
struct CameraState {
    lobby_camera_present: bool,
    look_at: Option<Vec3>,
    calls: Vec<CameraCall>,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            lobby_camera_present: true,
            look_at: Some(Vec3::new(0.0, 1.0, 0.0)),
            calls: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimCamera {
    state: Shared<CameraState>,
}

impl SimCamera {
    pub fn place_lobby_camera(&self, present: bool) {
        self.state.write().lobby_camera_present = present;
    }

    pub fn place_look_at(&self, look_at: Option<Vec3>) {
        self.state.write().look_at = look_at;
    }

    pub fn current_look_at(&self) -> Option<Vec3> {
        self.state.read().look_at
    }

    pub fn calls(&self) -> Vec<CameraCall> {
        self.state.read().calls.clone()
    }

    pub fn fix_on_calls(&self) -> Vec<(Vec3, Vec3, f32)> {
        self.state
            .read()
            .calls
            .iter()
            .filter_map(|call| match call {
                CameraCall::FixOn {
                    camera,
                    focus,
                    fov_y,
                } => Some((*camera, *focus, *fov_y)),
                _ => None,
            })
            .collect()
    }
}

impl CameraDevice for SimCamera {
    fn lobby_camera_present(&self) -> bool {
        self.state.read().lobby_camera_present
    }

    fn fix_on(&mut self, camera: Vec3, focus: Vec3, fov_y: f32) {
        self.state.write().calls.push(CameraCall::FixOn {
            camera,
            focus,
            fov_y,
        });
    }

    fn set_active_camera(&mut self, index: i32) {
        self.state.write().calls.push(CameraCall::SetActiveCamera(index));
    }

    fn lobby_look_at(&self) -> Option<Vec3> {
        self.state.read().look_at
    }

    fn set_lobby_look_at(&mut self, look_at: Vec3) {
        let mut state = self.state.write();
        state.look_at = Some(look_at);
        state.calls.push(CameraCall::SetLookAt(look_at));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoNodeState {
    pub alpha: u8,
    pub visible: bool,
    pub animations: Vec<(TimelineJump, u16)>,
}

impl Default for LogoNodeState {
    fn default() -> Self {
        Self {
            alpha: u8::MAX,
            visible: true,
            animations: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct UiStateTable {
    addons: HashMap<String, UiState>,
    logo_nodes: Vec<LogoNodeState>,
    alpha_history: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct SimUi {
    state: Shared<UiStateTable>,
}

impl SimUi {
    pub fn with_logo_nodes(count: usize) -> Self {
        let ui = Self::default();
        ui.place_logo_nodes(count);
        ui
    }

    /// Rebuilds the title logo element with `count` fresh nodes; zero removes it.
    pub fn place_logo_nodes(&self, count: usize) {
        let mut state = self.state.write();
        state.logo_nodes = vec![LogoNodeState::default(); count];
        let logo_state = if count == 0 {
            UiState::Missing
        } else {
            UiState::Visible
        };
        state.addons.insert(TITLE_LOGO_ADDON.to_string(), logo_state);
    }

    pub fn place_addon(&self, addon: &str, ui_state: UiState) {
        self.state.write().addons.insert(addon.to_string(), ui_state);
    }

    pub fn logo_node(&self, node: usize) -> Option<LogoNodeState> {
        self.state.read().logo_nodes.get(node).cloned()
    }

    /// Every alpha written to the logo, in order.
    pub fn alpha_history(&self) -> Vec<u8> {
        self.state.read().alpha_history.clone()
    }
}

impl UiSurface for SimUi {
    fn addon_state(&self, addon: &str) -> UiState {
        self.state
            .read()
            .addons
            .get(addon)
            .copied()
            .unwrap_or(UiState::Missing)
    }

    fn logo_node_count(&self) -> usize {
        self.state.read().logo_nodes.len()
    }

    fn set_logo_node_alpha(&mut self, node: usize, alpha: u8) {
        let mut state = self.state.write();
        state.alpha_history.push(alpha);
        if let Some(entry) = state.logo_nodes.get_mut(node) {
            entry.alpha = alpha;
        }
    }

    fn set_logo_node_visible(&mut self, node: usize, visible: bool) {
        if let Some(entry) = self.state.write().logo_nodes.get_mut(node) {
            entry.visible = visible;
        }
    }

    fn play_logo_node_animation(&mut self, node: usize, jump: TimelineJump, label: u16) {
        if let Some(entry) = self.state.write().logo_nodes.get_mut(node) {
            entry.animations.push((jump, label));
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimNotifier {
    sent: Shared<Vec<Notification>>,
}

impl SimNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.read().clone()
    }
}

impl Notifier for SimNotifier {
    fn notify(&mut self, notification: Notification) {
        self.sent.write().push(notification);
    }
}

/// Config store that keeps every saved configuration in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    saved: Shared<Vec<Configuration>>,
}

impl MemoryConfigStore {
    pub fn saved(&self) -> Vec<Configuration> {
        self.saved.read().clone()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn save(&mut self, configuration: &Configuration) -> Result<(), ConfigError> {
        self.saved.write().push(configuration.clone());
        Ok(())
    }
}

/// Asset catalog backed by a fixed list of game file paths.
#[derive(Debug, Clone, Default)]
pub struct StaticAssetCatalog {
    files: BTreeSet<String>,
}

impl StaticAssetCatalog {
    pub fn new<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl AssetCatalog for StaticAssetCatalog {
    fn file_exists(&self, path: &str) -> bool {
        self.files.contains(path)
    }
}

/// What the unhooked engine functions were actually called with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineLog {
    pub lobbies: Vec<LobbyType>,
    pub scenes: Vec<String>,
    pub music: Vec<String>,
    pub logos: Vec<String>,
    pub fix_ons: Vec<(Vec3, Vec3, f32)>,
    pub movies: Vec<i32>,
}

/// Event source that plays the role of the hooked client. Subscribed
/// listeners form a hook chain: the first listener's original is the second
/// listener, and the last one reaches the recording engine function.
pub struct SimulatedEngine {
    ambient: SimAmbient,
    listeners: Vec<Box<dyn InterceptionListener>>,
    log: EngineLog,
}

type Chain<'a> = &'a mut [Box<dyn InterceptionListener>];
type EngineHandles<'a> = (SimAmbient, &'a mut EngineLog);

impl SimulatedEngine {
    pub fn new(ambient: SimAmbient) -> Self {
        Self {
            ambient,
            listeners: Vec::new(),
            log: EngineLog::default(),
        }
    }

    pub fn log(&self) -> &EngineLog {
        &self.log
    }

    pub fn ambient(&self) -> &SimAmbient {
        &self.ambient
    }

    /// Loading a lobby also makes it the host's current lobby type.
    pub fn load_lobby(&mut self, lobby: LobbyType) {
        fn chain(listeners: Chain<'_>, lobby: LobbyType, engine: &mut EngineHandles<'_>) {
            match listeners.split_first_mut() {
                Some((first, rest)) => {
                    first.on_lobby_load(lobby, &mut |lobby| chain(&mut *rest, lobby, &mut *engine))
                }
                None => {
                    engine.0.place_lobby(lobby);
                    engine.1.lobbies.push(lobby);
                }
            }
        }
        let mut engine = (self.ambient.clone(), &mut self.log);
        chain(&mut self.listeners, lobby, &mut engine);
    }

    pub fn create_scene(&mut self, zone_path: &str) -> i32 {
        fn chain(listeners: Chain<'_>, zone: &str, log: &mut EngineLog) -> i32 {
            match listeners.split_first_mut() {
                Some((first, rest)) => {
                    first.on_scene_create(zone, &mut |zone| chain(&mut *rest, zone, &mut *log))
                }
                None => {
                    log.scenes.push(zone.to_string());
                    0
                }
            }
        }
        chain(&mut self.listeners, zone_path, &mut self.log)
    }

    pub fn play_music(&mut self, file: &str) -> u64 {
        fn chain(listeners: Chain<'_>, file: &str, log: &mut EngineLog) -> u64 {
            match listeners.split_first_mut() {
                Some((first, rest)) => {
                    first.on_play_music(file, &mut |file| chain(&mut *rest, file, &mut *log))
                }
                None => {
                    log.music.push(file.to_string());
                    1
                }
            }
        }
        chain(&mut self.listeners, file, &mut self.log)
    }

    pub fn load_logo_resource(&mut self, resource: &str) -> u64 {
        fn chain(listeners: Chain<'_>, resource: &str, log: &mut EngineLog) -> u64 {
            match listeners.split_first_mut() {
                Some((first, rest)) => first.on_load_logo_resource(resource, &mut |resource| {
                    chain(&mut *rest, resource, &mut *log)
                }),
                None => {
                    log.logos.push(resource.to_string());
                    1
                }
            }
        }
        chain(&mut self.listeners, resource, &mut self.log)
    }

    pub fn fix_on(&mut self, camera: Vec3, focus: Vec3, fov_y: f32) {
        fn chain(listeners: Chain<'_>, framing: (Vec3, Vec3, f32), log: &mut EngineLog) {
            match listeners.split_first_mut() {
                Some((first, rest)) => {
                    let (camera, focus, fov_y) = framing;
                    first.on_fix_on(camera, focus, fov_y, &mut |camera, focus, fov_y| {
                        chain(&mut *rest, (camera, focus, fov_y), &mut *log)
                    })
                }
                None => log.fix_ons.push(framing),
            }
        }
        chain(&mut self.listeners, (camera, focus, fov_y), &mut self.log)
    }

    /// Starting a movie switches the host into the movie lobby.
    pub fn play_movie(&mut self, movie_id: i32) -> u64 {
        fn chain(listeners: Chain<'_>, movie_id: i32, engine: &mut EngineHandles<'_>) -> u64 {
            match listeners.split_first_mut() {
                Some((first, rest)) => first.on_play_movie(movie_id, &mut |movie_id| {
                    chain(&mut *rest, movie_id, &mut *engine)
                }),
                None => {
                    engine.0.place_lobby(LobbyType::Movie);
                    engine.1.movies.push(movie_id);
                    1
                }
            }
        }
        let mut engine = (self.ambient.clone(), &mut self.log);
        chain(&mut self.listeners, movie_id, &mut engine)
    }

    pub fn title_logo_ready(&mut self) {
        for listener in &mut self.listeners {
            listener.on_title_logo_ready();
        }
    }

    pub fn frames(&mut self, count: u32, frame_dt_ms: u64) {
        for _ in 0..count {
            for listener in &mut self.listeners {
                listener.on_frame(frame_dt_ms);
            }
        }
    }
}

impl EngineEventSource for SimulatedEngine {
    fn subscribe(&mut self, listener: Box<dyn InterceptionListener>) {
        self.listeners.push(listener);
    }
}
