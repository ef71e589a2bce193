use glam::Vec3;
use std::f32::consts::PI;
use tracing::trace;

use crate::config::ViewerConfig;
use crate::controller::input::{InputEvent, Modifiers, MouseButton};
use crate::model::PerspectiveCamera;

const EPS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragState {
    None,
    Rotate,
    Dolly,
    Pan,
}

/// Radius, polar angle from +Y, azimuth around +Y measured from +Z
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    pub phi: f32,
    pub theta: f32,
}

impl Spherical {
    pub fn from_offset(v: Vec3) -> Self {
        let radius = v.length();
        if radius == 0.0 {
            return Self { radius, phi: 0.0, theta: 0.0 };
        }
        Self {
            radius,
            theta: v.x.atan2(v.z),
            phi: (v.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    pub fn to_offset(self) -> Vec3 {
        let sin_phi_r = self.phi.sin() * self.radius;
        Vec3::new(
            sin_phi_r * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_r * self.theta.cos(),
        )
    }

    /// Keep phi off the poles so look-at stays well defined
    pub fn make_safe(&mut self) {
        self.phi = self.phi.clamp(EPS, PI - EPS);
    }
}

/// Orbits the camera around `target`: left drag rotates, right drag (or a
/// modified left drag) pans, middle drag and the wheel dolly.
pub struct OrbitControls {
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,

    state: DragState,
    last_pointer: (f32, f32),
    spherical_delta: Spherical,
    pan_offset: Vec3,
    scale: f32,
    last_eye: Vec3,
    last_target: Vec3,
}

impl OrbitControls {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            target: Vec3::ZERO,
            enable_damping: config.enable_damping,
            damping_factor: config.damping_factor,
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            pan_speed: config.pan_speed,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            state: DragState::None,
            last_pointer: (0.0, 0.0),
            spherical_delta: Spherical { radius: 0.0, phi: 0.0, theta: 0.0 },
            pan_offset: Vec3::ZERO,
            scale: 1.0,
            last_eye: Vec3::splat(f32::NAN),
            last_target: Vec3::splat(f32::NAN),
        }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    fn zoom_scale(&self) -> f32 {
        0.95f32.powf(self.zoom_speed)
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.spherical_delta.theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.spherical_delta.phi -= angle;
    }

    pub fn dolly_in(&mut self, scale: f32) {
        self.scale *= scale;
    }

    pub fn dolly_out(&mut self, scale: f32) {
        self.scale /= scale;
    }

    /// Screen-space pan; deltas in CSS pixels.
    pub fn pan(&mut self, camera: &PerspectiveCamera, dx: f32, dy: f32, viewport_height: f32) {
        let offset = camera.eye - self.target;
        // half the visible height at the target's depth
        let target_distance = offset.length() * (camera.fov_y.to_radians() / 2.0).tan();
        let view = camera.view_matrix().inverse();
        let right = view.x_axis.truncate();
        let up = view.y_axis.truncate();

        self.pan_offset -= right * (2.0 * dx * target_distance / viewport_height);
        self.pan_offset += up * (2.0 * dy * target_distance / viewport_height);
    }

    /// Feed one input event; returns whether the camera moved.
    pub fn handle_event(&mut self, event: &InputEvent, camera: &mut PerspectiveCamera, viewport_height: f32) -> bool {
        let viewport_height = viewport_height.max(1.0);
        match *event {
            InputEvent::PointerDown { button, x, y, modifiers } => {
                self.state = drag_state_for(button, modifiers);
                self.last_pointer = (x, y);
                false
            }
            InputEvent::PointerMove { x, y } => {
                let (dx, dy) = (x - self.last_pointer.0, y - self.last_pointer.1);
                self.last_pointer = (x, y);
                match self.state {
                    DragState::None => return false,
                    DragState::Rotate => {
                        self.rotate_left(2.0 * PI * dx * self.rotate_speed / viewport_height);
                        self.rotate_up(2.0 * PI * dy * self.rotate_speed / viewport_height);
                    }
                    DragState::Dolly => {
                        if dy > 0.0 {
                            self.dolly_out(self.zoom_scale());
                        } else if dy < 0.0 {
                            self.dolly_in(self.zoom_scale());
                        }
                    }
                    DragState::Pan => {
                        self.pan(camera, dx * self.pan_speed, dy * self.pan_speed, viewport_height);
                    }
                }
                self.update(camera)
            }
            InputEvent::PointerUp { .. } | InputEvent::FocusLost => {
                self.state = DragState::None;
                false
            }
            InputEvent::Wheel { delta_y } => {
                if delta_y < 0.0 {
                    self.dolly_in(self.zoom_scale());
                } else if delta_y > 0.0 {
                    self.dolly_out(self.zoom_scale());
                } else {
                    return false;
                }
                self.update(camera)
            }
        }
    }

    /// Apply accumulated rotation, dolly and pan to the camera.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.eye - self.target;
        let mut spherical = Spherical::from_offset(offset);

        if self.enable_damping {
            spherical.theta += self.spherical_delta.theta * self.damping_factor;
            spherical.phi += self.spherical_delta.phi * self.damping_factor;
        } else {
            spherical.theta += self.spherical_delta.theta;
            spherical.phi += self.spherical_delta.phi;
        }

        spherical.phi = spherical.phi.clamp(self.min_polar_angle, self.max_polar_angle);
        spherical.make_safe();
        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        if self.enable_damping {
            self.target += self.pan_offset * self.damping_factor;
        } else {
            self.target += self.pan_offset;
        }

        camera.eye = self.target + spherical.to_offset();
        camera.look_at(self.target);

        if self.enable_damping {
            self.spherical_delta.theta *= 1.0 - self.damping_factor;
            self.spherical_delta.phi *= 1.0 - self.damping_factor;
            self.pan_offset *= 1.0 - self.damping_factor;
        } else {
            self.spherical_delta.theta = 0.0;
            self.spherical_delta.phi = 0.0;
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        let changed = !(self.last_eye.distance_squared(camera.eye) <= EPS
            && self.last_target.distance_squared(self.target) <= EPS);
        if changed {
            trace!(eye = ?camera.eye, target = ?self.target, "orbit update");
            self.last_eye = camera.eye;
            self.last_target = self.target;
        }
        changed
    }
}

fn drag_state_for(button: MouseButton, modifiers: Modifiers) -> DragState {
    match button {
        MouseButton::Left if modifiers.any() => DragState::Pan,
        MouseButton::Left => DragState::Rotate,
        MouseButton::Middle => DragState::Dolly,
        MouseButton::Right => DragState::Pan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (OrbitControls, PerspectiveCamera) {
        let mut cam = PerspectiveCamera::new(45.0, 1.0, 1.0, 1000.0);
        cam.eye = Vec3::new(0.0, 300.0, 300.0);
        cam.look_at(Vec3::ZERO);
        (OrbitControls::new(&ViewerConfig::default()), cam)
    }

    fn down(button: MouseButton, x: f32, y: f32) -> InputEvent {
        InputEvent::PointerDown { button, x, y, modifiers: Modifiers::default() }
    }

    #[test]
    fn test_spherical_round_trip_keeps_offset() {
        let v = Vec3::new(12.0, 300.0, -40.0);
        let back = Spherical::from_offset(v).to_offset();
        assert!((back - v).length() < 1e-3);
    }

    #[test]
    fn test_initial_update_keeps_camera_in_place() {
        let (mut controls, mut cam) = setup();
        assert!(controls.update(&mut cam));
        assert!((cam.eye - Vec3::new(0.0, 300.0, 300.0)).length() < 1e-3);
        assert_eq!(cam.target, Vec3::ZERO);
        // nothing pending, nothing moves
        assert!(!controls.update(&mut cam));
    }

    #[test]
    fn test_left_drag_rotates_at_constant_distance() {
        let (mut controls, mut cam) = setup();
        controls.update(&mut cam);
        let radius = cam.eye.length();

        controls.handle_event(&down(MouseButton::Left, 100.0, 100.0), &mut cam, 300.0);
        assert_eq!(controls.state(), DragState::Rotate);
        let moved = controls.handle_event(&InputEvent::PointerMove { x: 175.0, y: 100.0 }, &mut cam, 300.0);

        assert!(moved);
        assert!((cam.eye.length() - radius).abs() < 1e-2);
        // dragging right swings the camera towards -X
        assert!(cam.eye.x < -1.0);
        assert!((cam.eye.y - 300.0).abs() < 1e-2);
    }

    #[test]
    fn test_vertical_rotation_stops_short_of_pole() {
        let (mut controls, mut cam) = setup();
        controls.handle_event(&down(MouseButton::Left, 0.0, 0.0), &mut cam, 300.0);
        controls.handle_event(&InputEvent::PointerMove { x: 0.0, y: 5000.0 }, &mut cam, 300.0);
        let phi = Spherical::from_offset(cam.eye).phi;
        assert!(phi < 1e-3);
        assert!(cam.eye.y > 0.0);
        assert!(cam.forward().is_finite());
    }

    #[test]
    fn test_wheel_dollies() {
        let (mut controls, mut cam) = setup();
        let radius = cam.eye.length();
        controls.handle_event(&InputEvent::Wheel { delta_y: -100.0 }, &mut cam, 300.0);
        assert!((cam.eye.length() - radius * 0.95).abs() < 1e-2);
        controls.handle_event(&InputEvent::Wheel { delta_y: 100.0 }, &mut cam, 300.0);
        assert!((cam.eye.length() - radius).abs() < 1e-2);
    }

    #[test]
    fn test_right_drag_pans_target() {
        let (mut controls, mut cam) = setup();
        controls.update(&mut cam);
        controls.handle_event(&down(MouseButton::Right, 50.0, 50.0), &mut cam, 300.0);
        assert_eq!(controls.state(), DragState::Pan);
        controls.handle_event(&InputEvent::PointerMove { x: 80.0, y: 50.0 }, &mut cam, 300.0);

        // grabbing the scene and dragging right moves the target left
        assert!(controls.target.x < 0.0);
        assert!((cam.eye - controls.target - Vec3::new(0.0, 300.0, 300.0)).length() < 1e-2);
    }

    #[test]
    fn test_release_ends_drag() {
        let (mut controls, mut cam) = setup();
        controls.handle_event(&down(MouseButton::Left, 0.0, 0.0), &mut cam, 300.0);
        controls.handle_event(&InputEvent::PointerUp { button: MouseButton::Left }, &mut cam, 300.0);
        assert_eq!(controls.state(), DragState::None);
        assert!(!controls.handle_event(&InputEvent::PointerMove { x: 90.0, y: 0.0 }, &mut cam, 300.0));
    }

    #[test]
    fn test_damping_spreads_motion_over_updates() {
        let config = ViewerConfig { enable_damping: true, damping_factor: 0.5, ..Default::default() };
        let mut controls = OrbitControls::new(&config);
        let mut cam = PerspectiveCamera::new(45.0, 1.0, 1.0, 1000.0);
        cam.eye = Vec3::new(0.0, 0.0, 100.0);

        controls.rotate_left(1.0);
        controls.update(&mut cam);
        let first = Spherical::from_offset(cam.eye).theta;
        controls.update(&mut cam);
        let second = Spherical::from_offset(cam.eye).theta;

        assert!((first + 0.5).abs() < 1e-4);
        assert!((second + 0.75).abs() < 1e-4);
    }
}
