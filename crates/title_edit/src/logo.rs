use tracing::debug;

use crate::config::{Configuration, OverridePolicy};
use crate::host::{TimelineJump, UiSurface};
use crate::scheduler::{DeferredAction, DeferredScheduler};
use crate::screen::{LogoId, ScreenDefinition};

pub const LOGO_RESOURCE_MARKER: &str = "Title_Logo";
pub const DEFAULT_LOGO_ASSET: &str = "Title_Logo700";
const ANIMATED_NODE: usize = 0;
const VISUAL_NODE: usize = 1;
const IDLE_LOOP_LABEL: u16 = 0x65;
const FADE_THRESHOLD_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoResolution {
    pub logo: LogoId,
    pub display: bool,
    pub asset_name: &'static str,
}

/// Merges the user's logo preferences with the screen's own values.
///
/// Identity and visibility are merged independently; in both cases a screen
/// whose logo is `Unspecified` defers to the configuration.
pub fn resolve_logo(configuration: &Configuration, screen: &ScreenDefinition) -> LogoResolution {
    let screen_has_logo = !screen.logo.is_unspecified();

    let logo = match configuration.logo_override {
        OverridePolicy::UseScreenValueIfUnspecified if screen_has_logo => screen.logo.clone(),
        _ => configuration.selected_logo.clone(),
    };
    let display = match configuration.visibility_override {
        OverridePolicy::UseScreenValueIfUnspecified if screen_has_logo => screen.display_logo,
        _ => configuration.display_logo,
    };

    LogoResolution {
        asset_name: logo_asset_name(&logo),
        logo,
        display,
    }
}

pub fn logo_asset_name(logo: &LogoId) -> &'static str {
    match logo {
        LogoId::ARealmReborn => "Title_Logo",
        LogoId::FfxivOnline => "Title_LogoOnline",
        LogoId::FfxivFreeTrial => "Title_LogoFT",
        LogoId::Heavensward => "Title_Logo300",
        LogoId::Stormblood => "Title_Logo400",
        LogoId::Shadowbringers => "Title_Logo500",
        LogoId::Endwalker => "Title_Logo600",
        LogoId::Dawntrail => "Title_Logo700",
        LogoId::Unspecified | LogoId::Other(_) => DEFAULT_LOGO_ASSET,
    }
}

#[derive(Debug, Clone, Copy)]
struct Fade {
    started_ms: u64,
}

/// Visibility and animation of the title logo element.
pub struct LogoController {
    ui: Box<dyn UiSurface>,
    fade_ms: u64,
    fade: Option<Fade>,
}

impl LogoController {
    pub fn new(ui: Box<dyn UiSurface>, fade_ms: u64) -> Self {
        Self {
            ui,
            fade_ms: fade_ms.max(1),
            fade: None,
        }
    }

    pub fn ui(&self) -> &dyn UiSurface {
        self.ui.as_ref()
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    /// Queues the logo to be hidden after `delay_ms`. Short delays hide
    /// abruptly; longer ones fade out so the reveal is not cut off.
    pub fn hide(&self, scheduler: &mut DeferredScheduler, delay_ms: u64) {
        scheduler.schedule(delay_ms, DeferredAction::HideLogo { delay_ms });
    }

    pub fn show(&mut self) {
        self.fade = None;
        if !self.has_logo() {
            return;
        }
        self.ui.set_logo_node_alpha(VISUAL_NODE, u8::MAX);
        self.ui.set_logo_node_visible(VISUAL_NODE, true);
    }

    pub fn animate_idle_loop(&mut self) {
        if self.ui.logo_node_count() <= ANIMATED_NODE {
            return;
        }
        debug!("logo_idle_animation_started");
        self.ui
            .play_logo_node_animation(ANIMATED_NODE, TimelineJump::LoopForever, IDLE_LOOP_LABEL);
    }

    /// Runs a due [`DeferredAction::HideLogo`].
    pub(crate) fn begin_hide(&mut self, delay_ms: u64, now_ms: u64) {
        if !self.has_logo() {
            debug!(delay_ms, "logo_hide_skipped_missing_node");
            return;
        }
        if delay_ms > FADE_THRESHOLD_MS {
            self.fade = Some(Fade { started_ms: now_ms });
            self.ui.set_logo_node_alpha(VISUAL_NODE, u8::MAX);
        } else {
            self.ui.set_logo_node_visible(VISUAL_NODE, false);
        }
    }

    /// Advances a running fade to `now_ms`.
    pub(crate) fn step(&mut self, now_ms: u64) {
        let Some(fade) = self.fade else {
            return;
        };
        if !self.has_logo() {
            self.fade = None;
            return;
        }
        let elapsed = now_ms.saturating_sub(fade.started_ms);
        if elapsed >= self.fade_ms {
            self.ui.set_logo_node_visible(VISUAL_NODE, false);
            self.ui.set_logo_node_alpha(VISUAL_NODE, u8::MAX);
            self.fade = None;
            debug!("logo_hidden");
            return;
        }
        let remaining = self.fade_ms - elapsed;
        let alpha = (remaining * u64::from(u8::MAX) / self.fade_ms) as u8;
        self.ui.set_logo_node_alpha(VISUAL_NODE, alpha);
    }

    fn has_logo(&self) -> bool {
        self.ui.logo_node_count() > VISUAL_NODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimUi;

    fn screen_with_logo(logo: LogoId, display_logo: bool) -> ScreenDefinition {
        ScreenDefinition {
            logo,
            display_logo,
            ..ScreenDefinition::fallback()
        }
    }

    #[test]
    fn always_override_ignores_every_screen_value() {
        let configuration = Configuration {
            selected_logo: LogoId::Heavensward,
            display_logo: false,
            logo_override: OverridePolicy::AlwaysOverride,
            visibility_override: OverridePolicy::AlwaysOverride,
            ..Configuration::default()
        };
        for logo in [LogoId::Endwalker, LogoId::Unspecified, LogoId::from("Odd")] {
            for display in [true, false] {
                let screen = screen_with_logo(logo.clone(), display);
                let resolved = resolve_logo(&configuration, &screen);
                assert_eq!(resolved.logo, LogoId::Heavensward);
                assert!(!resolved.display);
                assert_eq!(resolved.asset_name, "Title_Logo300");
            }
        }
    }

    #[test]
    fn screen_values_win_unless_the_screen_is_unspecified() {
        let configuration = Configuration {
            selected_logo: LogoId::Stormblood,
            display_logo: true,
            ..Configuration::default()
        };

        let resolved = resolve_logo(&configuration, &screen_with_logo(LogoId::Endwalker, false));
        assert_eq!(resolved.logo, LogoId::Endwalker);
        assert!(!resolved.display);

        let resolved = resolve_logo(&configuration, &screen_with_logo(LogoId::Unspecified, false));
        assert_eq!(resolved.logo, LogoId::Stormblood);
        assert!(resolved.display);
    }

    #[test]
    fn policies_apply_independently() {
        let configuration = Configuration {
            selected_logo: LogoId::FfxivOnline,
            display_logo: true,
            logo_override: OverridePolicy::AlwaysOverride,
            visibility_override: OverridePolicy::UseScreenValueIfUnspecified,
            ..Configuration::default()
        };
        let resolved = resolve_logo(&configuration, &screen_with_logo(LogoId::Dawntrail, false));
        assert_eq!(resolved.logo, LogoId::FfxivOnline);
        assert!(!resolved.display);
    }

    #[test]
    fn unrecognized_logos_use_the_newest_asset() {
        assert_eq!(logo_asset_name(&LogoId::from("Something New")), DEFAULT_LOGO_ASSET);
        assert_eq!(logo_asset_name(&LogoId::FfxivFreeTrial), "Title_LogoFT");
        assert_eq!(logo_asset_name(&LogoId::ARealmReborn), "Title_Logo");
    }

    #[test]
    fn long_delay_fades_then_hides_with_alpha_restored() {
        let ui = SimUi::with_logo_nodes(2);
        let mut logo = LogoController::new(Box::new(ui.clone()), 500);

        logo.begin_hide(2_001, 1_000);
        logo.step(1_250);
        let mid = ui.logo_node(1).expect("node").alpha;
        assert!((120..=135).contains(&mid), "alpha {mid}");
        assert!(ui.logo_node(1).expect("node").visible);

        logo.step(1_500);
        let node = ui.logo_node(1).expect("node");
        assert!(!node.visible);
        assert_eq!(node.alpha, 255);
        assert!(!logo.is_fading());
    }

    #[test]
    fn short_delay_hides_immediately() {
        let ui = SimUi::with_logo_nodes(2);
        let mut logo = LogoController::new(Box::new(ui.clone()), 500);

        logo.begin_hide(100, 0);
        assert!(!ui.logo_node(1).expect("node").visible);
        assert!(!logo.is_fading());
    }

    #[test]
    fn missing_logo_element_is_a_no_op() {
        let ui = SimUi::with_logo_nodes(1);
        let mut logo = LogoController::new(Box::new(ui.clone()), 500);

        logo.begin_hide(2_001, 0);
        logo.show();
        logo.step(600);
        assert!(!logo.is_fading());
        assert!(ui.logo_node(0).expect("node").visible);
    }

    #[test]
    fn show_restores_visibility_and_cancels_fade() {
        let ui = SimUi::with_logo_nodes(2);
        let mut logo = LogoController::new(Box::new(ui.clone()), 500);

        logo.begin_hide(2_001, 0);
        logo.step(100);
        logo.show();
        logo.step(1_000);

        let node = ui.logo_node(1).expect("node");
        assert!(node.visible);
        assert_eq!(node.alpha, 255);
    }
}
