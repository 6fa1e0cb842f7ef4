//! Capabilities the host process provides. Everything here is implemented by
//! the interception layer in a real client and by [`crate::sim`] in tests.

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;
use tracing::warn;

use crate::screen::{TitleScreenExpansion, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LobbyType {
    None,
    Title,
    CharaSelect,
    Movie,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmbientError {
    #[error("{0} is not available")]
    Unavailable(&'static str),
    #[error("failed to write {target}: {message}")]
    Write {
        target: &'static str,
        message: String,
    },
}

/// Typed access to the host's ambient values. Called from the main event
/// stream and from forcing threads, so implementations must be shareable.
pub trait AmbientStateAccessor: Send + Sync {
    fn weather(&self) -> Result<u8, AmbientError>;
    fn set_weather(&self, weather_id: u8) -> Result<(), AmbientError>;
    fn set_time_offset(&self, time_offset: u16) -> Result<(), AmbientError>;
    fn lobby_type(&self) -> LobbyType;
    /// `None` when the host holds a raw value outside the known title types.
    fn title_screen_type(&self) -> Option<TitleScreenExpansion>;
    fn set_title_screen_type(&self, title: TitleScreenExpansion);
    fn title_cinematic_playing(&self) -> bool;
    fn stop_title_cinematic(&self);
}

/// Camera primitives. `fix_on` calls the unhooked framing function on the
/// lobby camera.
pub trait CameraDevice {
    fn lobby_camera_present(&self) -> bool;
    fn fix_on(&mut self, camera: Vec3, focus: Vec3, fov_y: f32);
    fn set_active_camera(&mut self, index: i32);
    fn lobby_look_at(&self) -> Option<Vec3>;
    fn set_lobby_look_at(&mut self, look_at: Vec3);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiState {
    Missing,
    Hidden,
    Visible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineJump {
    LoopForever,
}

pub const TITLE_LOGO_ADDON: &str = "_TitleLogo";
pub const TITLE_MENU_ADDON: &str = "_TitleMenu";

/// UI element access. Node indices address the title logo's node list.
pub trait UiSurface {
    fn addon_state(&self, addon: &str) -> UiState;
    /// Number of nodes in the title logo element, zero when it does not exist.
    fn logo_node_count(&self) -> usize;
    fn set_logo_node_alpha(&mut self, node: usize, alpha: u8);
    fn set_logo_node_visible(&mut self, node: usize, visible: bool);
    fn play_logo_node_animation(&mut self, node: usize, jump: TimelineJump, label: u16);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub content: String,
}

pub trait Notifier {
    fn notify(&mut self, notification: Notification);
}

/// Read-only view of the host's game data files.
pub trait AssetCatalog: Send + Sync {
    fn file_exists(&self, path: &str) -> bool;
}

/// Receiver for intercepted engine calls.
///
/// Each interception method is handed the original function as `original`
/// and must call it exactly once; listeners only change arguments or act
/// around the call.
pub trait InterceptionListener {
    fn on_lobby_load(&mut self, lobby: LobbyType, original: &mut dyn FnMut(LobbyType));
    fn on_scene_create(&mut self, zone_path: &str, original: &mut dyn FnMut(&str) -> i32) -> i32;
    fn on_play_music(&mut self, file: &str, original: &mut dyn FnMut(&str) -> u64) -> u64;
    fn on_load_logo_resource(
        &mut self,
        resource: &str,
        original: &mut dyn FnMut(&str) -> u64,
    ) -> u64;
    fn on_fix_on(
        &mut self,
        camera: Vec3,
        focus: Vec3,
        fov_y: f32,
        original: &mut dyn FnMut(Vec3, Vec3, f32),
    );
    fn on_play_movie(&mut self, movie_id: i32, original: &mut dyn FnMut(i32) -> u64) -> u64;
    fn on_title_logo_ready(&mut self);
    fn on_frame(&mut self, frame_dt_ms: u64);
}

/// Anything that can emit the intercepted calls and the frame tick.
pub trait EngineEventSource {
    fn subscribe(&mut self, listener: Box<dyn InterceptionListener>);
}

/// Shared listeners. A call that arrives while the listener is already
/// handling one (an `original` that re-enters the engine) goes straight to the
/// original function.
impl<L: InterceptionListener> InterceptionListener for Rc<RefCell<L>> {
    fn on_lobby_load(&mut self, lobby: LobbyType, original: &mut dyn FnMut(LobbyType)) {
        match self.try_borrow_mut() {
            Ok(mut listener) => listener.on_lobby_load(lobby, original),
            Err(_) => {
                warn!(event = "lobby_load", "nested_interception_passed_through");
                original(lobby)
            }
        }
    }

    fn on_scene_create(&mut self, zone_path: &str, original: &mut dyn FnMut(&str) -> i32) -> i32 {
        match self.try_borrow_mut() {
            Ok(mut listener) => listener.on_scene_create(zone_path, original),
            Err(_) => {
                warn!(event = "scene_create", "nested_interception_passed_through");
                original(zone_path)
            }
        }
    }

    fn on_play_music(&mut self, file: &str, original: &mut dyn FnMut(&str) -> u64) -> u64 {
        match self.try_borrow_mut() {
            Ok(mut listener) => listener.on_play_music(file, original),
            Err(_) => {
                warn!(event = "play_music", "nested_interception_passed_through");
                original(file)
            }
        }
    }

    fn on_load_logo_resource(
        &mut self,
        resource: &str,
        original: &mut dyn FnMut(&str) -> u64,
    ) -> u64 {
        match self.try_borrow_mut() {
            Ok(mut listener) => listener.on_load_logo_resource(resource, original),
            Err(_) => {
                warn!(event = "load_logo_resource", "nested_interception_passed_through");
                original(resource)
            }
        }
    }

    fn on_fix_on(
        &mut self,
        camera: Vec3,
        focus: Vec3,
        fov_y: f32,
        original: &mut dyn FnMut(Vec3, Vec3, f32),
    ) {
        match self.try_borrow_mut() {
            Ok(mut listener) => listener.on_fix_on(camera, focus, fov_y, original),
            Err(_) => {
                warn!(event = "fix_on", "nested_interception_passed_through");
                original(camera, focus, fov_y)
            }
        }
    }

    fn on_play_movie(&mut self, movie_id: i32, original: &mut dyn FnMut(i32) -> u64) -> u64 {
        match self.try_borrow_mut() {
            Ok(mut listener) => listener.on_play_movie(movie_id, original),
            Err(_) => {
                warn!(event = "play_movie", "nested_interception_passed_through");
                original(movie_id)
            }
        }
    }

    fn on_title_logo_ready(&mut self) {
        match self.try_borrow_mut() {
            Ok(mut listener) => listener.on_title_logo_ready(),
            Err(_) => warn!(event = "title_logo_ready", "nested_interception_dropped"),
        }
    }

    fn on_frame(&mut self, frame_dt_ms: u64) {
        match self.try_borrow_mut() {
            Ok(mut listener) => listener.on_frame(frame_dt_ms),
            Err(_) => warn!(event = "frame", "nested_interception_dropped"),
        }
    }
}
