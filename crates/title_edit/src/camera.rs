use tracing::debug;

use crate::host::CameraDevice;
use crate::screen::{ScreenDefinition, Vec3};

pub struct CameraController {
    device: Box<dyn CameraDevice>,
    needs_reapply: bool,
}

impl CameraController {
    pub fn new(device: Box<dyn CameraDevice>) -> Self {
        Self {
            device,
            needs_reapply: false,
        }
    }

    pub fn needs_reapply(&self) -> bool {
        self.needs_reapply
    }

    /// Substitute the next intercepted fix-on with the active screen's framing.
    pub fn arm_reapply(&mut self) {
        self.needs_reapply = true;
    }

    pub fn disarm_reapply(&mut self) {
        self.needs_reapply = false;
    }

    /// Intercepted framing call. Passes the caller's values through unless a
    /// reapply is armed, in which case the screen's framing goes down once.
    pub fn on_fix_on(
        &mut self,
        camera: Vec3,
        focus: Vec3,
        fov_y: f32,
        screen: &ScreenDefinition,
        original: &mut dyn FnMut(Vec3, Vec3, f32),
    ) {
        if !self.needs_reapply {
            original(camera, focus, fov_y);
            return;
        }
        self.needs_reapply = false;
        debug!(
            screen = %screen.name,
            camera = ?screen.camera_pos,
            focus = ?screen.fix_on_pos,
            fov_y = screen.fov_y,
            "fix_on_substituted"
        );
        original(screen.camera_pos, screen.fix_on_pos, screen.fov_y);
    }

    pub fn fix_on(&mut self, camera: Vec3, focus: Vec3, fov_y: f32) {
        if self.device.lobby_camera_present() {
            self.device.fix_on(camera, focus, fov_y);
        }
    }

    pub fn apply_screen(&mut self, screen: &ScreenDefinition) {
        self.fix_on(screen.camera_pos, screen.fix_on_pos, screen.fov_y);
    }

    pub fn reset_active_camera(&mut self) {
        self.device.set_active_camera(0);
    }

    /// Keeps the lobby camera looking straight along its own height.
    pub fn relevel_lobby_look(&mut self) {
        if let Some(look_at) = self.device.lobby_look_at() {
            self.device.set_lobby_look_at(Vec3::new(0.0, look_at.y, 0.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{CameraCall, SimCamera};

    #[test]
    fn fix_on_passes_through_until_armed_then_substitutes_once() {
        let sim = SimCamera::default();
        let mut camera = CameraController::new(Box::new(sim.clone()));
        let screen = ScreenDefinition::fallback();
        let mut seen = Vec::new();
        let caller = (Vec3::new(9.0, 9.0, 9.0), Vec3::ZERO, 70.0);

        let mut original = |c: Vec3, f: Vec3, fov: f32| seen.push((c, f, fov));
        camera.on_fix_on(caller.0, caller.1, caller.2, &screen, &mut original);
        camera.arm_reapply();
        camera.on_fix_on(caller.0, caller.1, caller.2, &screen, &mut original);
        camera.on_fix_on(caller.0, caller.1, caller.2, &screen, &mut original);

        assert_eq!(
            seen,
            vec![
                caller,
                (screen.camera_pos, screen.fix_on_pos, screen.fov_y),
                caller
            ]
        );
        assert!(!camera.needs_reapply());
    }

    #[test]
    fn fix_on_is_skipped_without_a_lobby_camera() {
        let sim = SimCamera::default();
        sim.place_lobby_camera(false);
        let mut camera = CameraController::new(Box::new(sim.clone()));

        camera.apply_screen(&ScreenDefinition::fallback());
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn relevel_zeroes_horizontal_look_components() {
        let sim = SimCamera::default();
        sim.place_look_at(Some(Vec3::new(0.4, 1.2, -3.0)));
        let mut camera = CameraController::new(Box::new(sim.clone()));

        camera.relevel_lobby_look();
        camera.reset_active_camera();

        assert_eq!(sim.current_look_at(), Some(Vec3::new(0.0, 1.2, 0.0)));
        assert_eq!(sim.calls().last(), Some(&CameraCall::SetActiveCamera(0)));
    }
}
