use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use title_edit::{LobbyType, Vec3};

const DEFAULT_FRAME_DT_MS: u64 = 16;

#[derive(Debug, Error)]
pub(crate) enum ReplayError {
    #[error("failed to read replay script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse replay script {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum LobbyName {
    None,
    Title,
    CharaSelect,
    Movie,
}

impl From<LobbyName> for LobbyType {
    fn from(value: LobbyName) -> Self {
        match value {
            LobbyName::None => LobbyType::None,
            LobbyName::Title => LobbyType::Title,
            LobbyName::CharaSelect => LobbyType::CharaSelect,
            LobbyName::Movie => LobbyType::Movie,
        }
    }
}

/// One step of a recorded client session, in the order the client raised it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub(crate) enum ReplayEvent {
    LobbyLoad {
        lobby: LobbyName,
    },
    SceneCreate {
        zone: String,
    },
    PlayMusic {
        file: String,
    },
    LoadLogo {
        resource: String,
    },
    FixOn {
        camera: Vec3,
        focus: Vec3,
        fov_y: f32,
    },
    TitleLogoReady,
    PlayMovie {
        movie_id: i32,
    },
    Frames {
        count: u32,
        #[serde(default = "default_frame_dt_ms")]
        dt_ms: u64,
    },
    ShowTitleMenu {
        visible: bool,
    },
    Cinematic {
        playing: bool,
    },
}

fn default_frame_dt_ms() -> u64 {
    DEFAULT_FRAME_DT_MS
}

pub(crate) fn load_script(path: &Path) -> Result<Vec<ReplayEvent>, ReplayError> {
    let raw = fs::read_to_string(path).map_err(|source| ReplayError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script(&raw).map_err(|message| ReplayError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn parse_script(raw: &str) -> Result<Vec<ReplayEvent>, String> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, Vec<ReplayEvent>>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        if path.is_empty() || path == "." {
            source.to_string()
        } else {
            format!("at {path}: {source}")
        }
    })
}
