use std::fmt;

use serde::{Deserialize, Serialize};

pub const FALLBACK_SCREEN_NAME: &str = "A Realm Reborn";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    #[serde(alias = "X")]
    pub x: f32,
    #[serde(alias = "Y")]
    pub y: f32,
    #[serde(alias = "Z")]
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Built-in title sequences the host knows how to play on its own.
///
/// The discriminants are the raw values the host stores as its "current
/// title screen type".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TitleTypeRepr")]
#[repr(i32)]
pub enum TitleScreenExpansion {
    ARealmReborn = 0,
    Heavensward = 1,
    Stormblood = 2,
    Shadowbringers = 3,
    Endwalker = 4,
    Dawntrail = 5,
}

impl TitleScreenExpansion {
    pub const ALL: [TitleScreenExpansion; 6] = [
        TitleScreenExpansion::ARealmReborn,
        TitleScreenExpansion::Heavensward,
        TitleScreenExpansion::Stormblood,
        TitleScreenExpansion::Shadowbringers,
        TitleScreenExpansion::Endwalker,
        TitleScreenExpansion::Dawntrail,
    ];

    pub fn from_raw(raw: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| *kind as i32 == raw)
    }

    pub fn label(self) -> &'static str {
        match self {
            TitleScreenExpansion::ARealmReborn => "ARealmReborn",
            TitleScreenExpansion::Heavensward => "Heavensward",
            TitleScreenExpansion::Stormblood => "Stormblood",
            TitleScreenExpansion::Shadowbringers => "Shadowbringers",
            TitleScreenExpansion::Endwalker => "Endwalker",
            TitleScreenExpansion::Dawntrail => "Dawntrail",
        }
    }
}

// Screen files written by older tooling store the override as its raw integer.
#[derive(Deserialize)]
#[serde(untagged)]
enum TitleTypeRepr {
    Raw(i32),
    Name(String),
}

impl TryFrom<TitleTypeRepr> for TitleScreenExpansion {
    type Error = String;

    fn try_from(repr: TitleTypeRepr) -> Result<Self, Self::Error> {
        match repr {
            TitleTypeRepr::Raw(raw) => {
                Self::from_raw(raw).ok_or_else(|| format!("unknown title screen type {raw}"))
            }
            TitleTypeRepr::Name(name) => Self::ALL
                .into_iter()
                .find(|kind| kind.label() == name)
                .ok_or_else(|| format!("unknown title screen type '{name}'")),
        }
    }
}

/// Logo selection as written in screen files and the user configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogoId {
    ARealmReborn,
    FfxivOnline,
    FfxivFreeTrial,
    Heavensward,
    Stormblood,
    Shadowbringers,
    Endwalker,
    Dawntrail,
    Unspecified,
    Other(String),
}

impl LogoId {
    pub fn display_name(&self) -> &str {
        match self {
            LogoId::ARealmReborn => "A Realm Reborn",
            LogoId::FfxivOnline => "FFXIV Online",
            LogoId::FfxivFreeTrial => "FFXIV Free Trial",
            LogoId::Heavensward => "Heavensward",
            LogoId::Stormblood => "Stormblood",
            LogoId::Shadowbringers => "Shadowbringers",
            LogoId::Endwalker => "Endwalker",
            LogoId::Dawntrail => "Dawntrail",
            LogoId::Unspecified => "Unspecified",
            LogoId::Other(name) => name,
        }
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, LogoId::Unspecified)
    }

    /// The built-in title sequence this logo belongs to, if any.
    pub fn title_type(&self) -> Option<TitleScreenExpansion> {
        match self {
            LogoId::ARealmReborn => Some(TitleScreenExpansion::ARealmReborn),
            LogoId::Heavensward => Some(TitleScreenExpansion::Heavensward),
            LogoId::Stormblood => Some(TitleScreenExpansion::Stormblood),
            LogoId::Shadowbringers => Some(TitleScreenExpansion::Shadowbringers),
            LogoId::Endwalker => Some(TitleScreenExpansion::Endwalker),
            LogoId::Dawntrail => Some(TitleScreenExpansion::Dawntrail),
            _ => None,
        }
    }
}

impl From<String> for LogoId {
    fn from(name: String) -> Self {
        match name.as_str() {
            "A Realm Reborn" => LogoId::ARealmReborn,
            "FFXIV Online" => LogoId::FfxivOnline,
            "FFXIV Free Trial" => LogoId::FfxivFreeTrial,
            "Heavensward" => LogoId::Heavensward,
            "Stormblood" => LogoId::Stormblood,
            "Shadowbringers" => LogoId::Shadowbringers,
            "Endwalker" => LogoId::Endwalker,
            "Dawntrail" => LogoId::Dawntrail,
            "Unspecified" => LogoId::Unspecified,
            _ => LogoId::Other(name),
        }
    }
}

impl From<&str> for LogoId {
    fn from(name: &str) -> Self {
        LogoId::from(name.to_string())
    }
}

impl From<LogoId> for String {
    fn from(logo: LogoId) -> Self {
        match logo {
            LogoId::Other(name) => name,
            known => known.display_name().to_string(),
        }
    }
}

impl fmt::Display for LogoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenDefinition {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "TerritoryPath")]
    pub territory_path: String,
    #[serde(alias = "Logo", default = "unspecified_logo")]
    pub logo: LogoId,
    #[serde(alias = "DisplayLogo", default = "default_true")]
    pub display_logo: bool,
    #[serde(alias = "CameraPos")]
    pub camera_pos: Vec3,
    #[serde(alias = "FixOnPos")]
    pub fix_on_pos: Vec3,
    #[serde(alias = "FovY")]
    pub fov_y: f32,
    #[serde(alias = "WeatherId", default)]
    pub weather_id: u8,
    #[serde(alias = "TimeOffset", default)]
    pub time_offset: u16,
    #[serde(alias = "BgmPath")]
    pub bgm_path: String,
    #[serde(alias = "TitleOverride", default)]
    pub title_override: Option<TitleScreenExpansion>,
}

impl ScreenDefinition {
    /// The hardcoded screen used whenever the selected definition cannot be
    /// loaded.
    pub fn fallback() -> Self {
        Self {
            name: FALLBACK_SCREEN_NAME.to_string(),
            territory_path: "ffxiv/zon_z1/chr/z1c1/level/z1c1".to_string(),
            logo: LogoId::ARealmReborn,
            display_logo: true,
            camera_pos: Vec3::new(0.0, 0.5, -1.3),
            fix_on_pos: Vec3::new(0.0, 1.0, 0.0),
            fov_y: 45.0,
            weather_id: 2,
            time_offset: 0,
            bgm_path: "music/ffxiv/BGM_System_Title.scd".to_string(),
            title_override: None,
        }
    }

    /// Level file the host needs for a custom zone.
    pub fn level_asset_path(&self) -> String {
        format!("bg/{}.lvb", self.territory_path)
    }
}

fn unspecified_logo() -> LogoId {
    LogoId::Unspecified
}

fn default_true() -> bool {
    true
}
