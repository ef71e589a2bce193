use glam::Vec3;
use tracing::{debug, info, trace};

use crate::config::ViewerConfig;
use crate::controller::{InputEvent, OrbitControls};
use crate::error::{Result, ViewerError};
use crate::frame_loop::FrameClock;
use crate::model::{aspect_ratio, PerspectiveCamera, Populate, Scene};
use crate::view::RenderTarget;

/// One scene, one camera and the orbit controls driving it. The renderer is
/// owned by the caller and handed in for each operation that needs it.
pub struct Viewer {
    pub config: ViewerConfig,
    pub scene: Scene,
    pub camera: PerspectiveCamera,
    pub controls: Option<OrbitControls>,
    pub clock: FrameClock,
    disposed: bool,
}

impl Viewer {
    /// Build the scene and camera for a surface currently displayed at `display_size`.
    pub fn initialize(config: ViewerConfig, display_size: (u32, u32), populator: &dyn Populate) -> Result<Self> {
        config.validate()?;
        let (width, height) = display_size;
        if width == 0 || height == 0 {
            return Err(ViewerError::ZeroSizedSurface { width, height });
        }

        let mut scene = Scene::new(config.background);
        scene.add_floor_and_lights();
        populator.populate(&mut scene, &config)?;

        let mut camera = PerspectiveCamera::new(
            config.field_of_view,
            aspect_ratio(width, height),
            config.near_clipping_plane,
            config.far_clipping_plane,
        );
        camera.eye = Vec3::new(0.0, config.camera_y, config.camera_z);
        camera.look_at(Vec3::ZERO);

        info!(
            width,
            height,
            fov = config.field_of_view,
            nodes = scene.nodes().len(),
            "viewer initialized"
        );

        Ok(Self {
            config,
            scene,
            camera,
            controls: None,
            clock: FrameClock::new(),
            disposed: false,
        })
    }

    /// Bind to a renderer: size its buffer, create the orbit controls and start
    /// the clock. The host then calls `frame` once per display refresh.
    pub fn attach<R: RenderTarget>(&mut self, renderer: &mut R, pixel_ratio: f64, now_ms: f64) {
        renderer.set_pixel_ratio(pixel_ratio);
        let (width, height) = renderer.display_size();
        renderer.set_size(width, height, true);

        let mut controls = OrbitControls::new(&self.config);
        controls.update(&mut self.camera);
        self.controls = Some(controls);

        self.clock.start(now_ms);
        debug!(pixel_ratio, width, height, "viewer attached");
    }

    /// Resize the render buffer when the displayed size changed. Returns
    /// whether a resize happened; leaves everything untouched otherwise.
    pub fn resize_renderer_to_display_size<R: RenderTarget>(renderer: &mut R) -> bool {
        let (width, height) = renderer.display_size();
        if width == 0 || height == 0 {
            return false;
        }
        if renderer.buffer_size() == renderer.buffer_target() {
            return false;
        }
        renderer.set_size(width, height, false);
        true
    }

    /// One iteration of the render loop. Returns whether the surface was resized.
    pub fn frame<R: RenderTarget>(&mut self, renderer: &mut R, now_ms: f64) -> Result<bool> {
        if self.disposed {
            return Ok(false);
        }
        let dt = self.clock.tick(now_ms);

        let resized = Self::resize_renderer_to_display_size(renderer);
        if resized {
            let (width, height) = renderer.display_size();
            self.camera.set_aspect(width, height);
            self.camera.update_projection_matrix();
            info!(width, height, aspect = self.camera.aspect, "surface resized");
        }

        if let Some(controls) = self.controls.as_mut() {
            if controls.enable_damping {
                controls.update(&mut self.camera);
            }
        }

        renderer.render(&self.scene, &self.camera)?;
        trace!(frame = self.clock.frames(), dt, "frame drawn");
        Ok(resized)
    }

    /// Route pointer input to the orbit controls; returns whether the camera moved.
    pub fn handle_input<R: RenderTarget>(&mut self, event: &InputEvent, renderer: &R) -> bool {
        if self.disposed {
            return false;
        }
        let viewport_height = renderer.display_size().1 as f32;
        match self.controls.as_mut() {
            Some(controls) => controls.handle_event(event, &mut self.camera, viewport_height),
            None => false,
        }
    }

    pub fn add_content(&mut self, populator: &dyn Populate) -> Result<()> {
        populator.populate(&mut self.scene, &self.config)
    }

    /// Release the renderer's GPU resources and stop accepting frames.
    pub fn dispose<R: RenderTarget>(&mut self, renderer: &mut R) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.controls = None;
        self.clock.stop();
        renderer.dispose();
        info!(frames = self.clock.frames(), "viewer disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Modifiers, MouseButton};
    use crate::model::{EmptyPopulator, Material, SceneNode, MeshNode, Transform};
    use crate::model::scene::GROUND_NAME;
    use crate::utils::Geometry;
    use crate::view::scaled_size;

    /// Renderer stand-in that records what the viewer asks of it
    struct FakeTarget {
        display: (u32, u32),
        buffer: (u32, u32),
        ratio: f64,
        style_updates: Vec<(u32, u32)>,
        set_size_calls: usize,
        renders: usize,
        last_view_proj: Option<glam::Mat4>,
        disposed: bool,
        /// Physical size reported by a native window, if any
        physical: Option<(u32, u32)>,
    }

    impl FakeTarget {
        fn new(display: (u32, u32)) -> Self {
            Self {
                display,
                buffer: (300, 150),
                ratio: 1.0,
                style_updates: Vec::new(),
                set_size_calls: 0,
                renders: 0,
                last_view_proj: None,
                disposed: false,
                physical: None,
            }
        }
    }

    impl RenderTarget for FakeTarget {
        fn display_size(&self) -> (u32, u32) {
            self.display
        }
        fn buffer_size(&self) -> (u32, u32) {
            self.buffer
        }
        fn pixel_ratio(&self) -> f64 {
            self.ratio
        }
        fn set_pixel_ratio(&mut self, ratio: f64) {
            self.ratio = ratio;
        }
        fn buffer_target(&self) -> (u32, u32) {
            self.physical.unwrap_or_else(|| scaled_size(self.display.0, self.display.1, self.ratio))
        }
        fn set_size(&mut self, width: u32, height: u32, update_style: bool) {
            self.set_size_calls += 1;
            self.buffer = match self.physical {
                Some(physical) if (width, height) == self.display => physical,
                _ => scaled_size(width, height, self.ratio),
            };
            if update_style {
                self.style_updates.push((width, height));
            }
        }
        fn render(&mut self, _scene: &Scene, camera: &PerspectiveCamera) -> Result<()> {
            self.renders += 1;
            self.last_view_proj = Some(camera.view_proj());
            Ok(())
        }
        fn dispose(&mut self) {
            self.disposed = true;
        }
    }

    struct AddCube;

    impl Populate for AddCube {
        fn populate(&self, scene: &mut Scene, _config: &ViewerConfig) -> Result<()> {
            scene.add(SceneNode::Mesh(MeshNode {
                name: "extra".into(),
                geometry: Geometry::plane(1.0, 1.0),
                material: Material::Lambert { color: 0xFF0000 },
                transform: Transform::default(),
            }));
            Ok(())
        }
    }

    fn viewer(display: (u32, u32)) -> Viewer {
        Viewer::initialize(ViewerConfig::default(), display, &EmptyPopulator).unwrap()
    }

    fn ground_and_light_counts(scene: &Scene) -> (usize, usize) {
        (
            scene.meshes().filter(|m| m.name == GROUND_NAME).count(),
            scene.ambient_lights().count(),
        )
    }

    #[test]
    fn test_default_camera() {
        let v = viewer((300, 300));
        assert_eq!(v.camera.eye, Vec3::new(0.0, 300.0, 300.0));
        assert_eq!(v.camera.fov_y, 45.0);
        assert_eq!(v.camera.z_near, 1.0);
        assert_eq!(v.camera.z_far, 1000.0);
        assert_eq!(v.camera.aspect, 1.0);
        assert_eq!(v.camera.target, Vec3::ZERO);
    }

    #[test]
    fn test_camera_position_follows_config_exactly() {
        let config = ViewerConfig { camera_y: 12.5, camera_z: -7.25, ..Default::default() };
        let v = Viewer::initialize(config, (640, 480), &EmptyPopulator).unwrap();
        assert_eq!(v.camera.eye.y, 12.5);
        assert_eq!(v.camera.eye.z, -7.25);
        assert_eq!(v.camera.aspect, 640.0 / 480.0);
    }

    #[test]
    fn test_scene_has_one_ground_and_one_light_for_any_config() {
        let configs = [
            ViewerConfig::default(),
            ViewerConfig { field_of_view: 10.0, camera_y: 0.0, camera_z: 1.0, ..Default::default() },
            ViewerConfig { near_clipping_plane: 0.01, far_clipping_plane: 1e6, background: 0x336699, ..Default::default() },
        ];
        for config in configs {
            let v = Viewer::initialize(config, (800, 600), &EmptyPopulator).unwrap();
            assert_eq!(ground_and_light_counts(&v.scene), (1, 1));
        }

        let v = Viewer::initialize(ViewerConfig::default(), (800, 600), &AddCube).unwrap();
        assert_eq!(ground_and_light_counts(&v.scene), (1, 1));
        assert_eq!(v.scene.meshes().count(), 2);
    }

    #[test]
    fn test_initialize_rejects_bad_input() {
        assert!(matches!(
            Viewer::initialize(ViewerConfig::default(), (0, 300), &EmptyPopulator),
            Err(ViewerError::ZeroSizedSurface { width: 0, height: 300 })
        ));
        let config = ViewerConfig { far_clipping_plane: 0.5, ..Default::default() };
        assert!(matches!(
            Viewer::initialize(config, (300, 300), &EmptyPopulator),
            Err(ViewerError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_initial_view_is_finite_or_rejected() {
        let above = ViewerConfig { camera_y: 300.0, camera_z: 0.0, ..Default::default() };
        assert!(matches!(
            Viewer::initialize(above, (300, 300), &EmptyPopulator),
            Err(ViewerError::InvalidConfig { field: "cameraZ", .. })
        ));

        for (camera_y, camera_z) in [(300.0, 300.0), (0.0, 10.0), (-50.0, 0.5), (1e-3, -300.0)] {
            let config = ViewerConfig { camera_y, camera_z, ..Default::default() };
            let v = Viewer::initialize(config, (300, 300), &EmptyPopulator).unwrap();
            assert!(v.camera.view_proj().is_finite(), "y={camera_y} z={camera_z}");
            assert_eq!(v.camera.eye, Vec3::new(0.0, camera_y, camera_z));
        }
    }

    #[test]
    fn test_attach_sizes_buffer_and_style() {
        let mut v = viewer((300, 300));
        let mut target = FakeTarget::new((300, 300));
        v.attach(&mut target, 2.0, 0.0);

        assert_eq!(target.ratio, 2.0);
        assert_eq!(target.buffer, (600, 600));
        assert_eq!(target.style_updates, vec![(300, 300)]);
        assert!(v.controls.is_some());
        assert!(v.clock.is_running());
        // the initial controls update leaves the configured pose alone
        assert!((v.camera.eye - Vec3::new(0.0, 300.0, 300.0)).length() < 1e-2);
    }

    #[test]
    fn test_resize_detection_is_idempotent() {
        let mut target = FakeTarget::new((300, 300));
        target.buffer = (300, 300);
        assert!(!Viewer::resize_renderer_to_display_size(&mut target));
        assert_eq!(target.set_size_calls, 0);

        target.display = (600, 300);
        assert!(Viewer::resize_renderer_to_display_size(&mut target));
        assert_eq!(target.buffer, (600, 300));
        assert!(target.style_updates.is_empty());

        assert!(!Viewer::resize_renderer_to_display_size(&mut target));
        assert_eq!(target.set_size_calls, 1);
    }

    #[test]
    fn test_resize_detection_accounts_for_pixel_ratio() {
        let mut target = FakeTarget::new((300, 300));
        target.ratio = 2.0;
        target.buffer = (600, 600);
        assert!(!Viewer::resize_renderer_to_display_size(&mut target));
    }

    #[test]
    fn test_resize_detection_uses_physical_size_at_fractional_scale() {
        // 1001x601 physical at 1.5 is displayed as 667x401 logical
        let mut target = FakeTarget::new((667, 401));
        target.ratio = 1.5;
        target.physical = Some((1001, 601));
        target.buffer = scaled_size(667, 401, 1.5);
        assert_eq!(target.buffer, (1000, 601));

        assert!(Viewer::resize_renderer_to_display_size(&mut target));
        assert_eq!(target.buffer, (1001, 601));
        assert!(!Viewer::resize_renderer_to_display_size(&mut target));
        assert_eq!(target.set_size_calls, 1);
    }

    #[test]
    fn test_zero_sized_display_is_not_a_resize() {
        let mut target = FakeTarget::new((0, 0));
        assert!(!Viewer::resize_renderer_to_display_size(&mut target));
        assert_eq!(target.buffer, (300, 150));
    }

    #[test]
    fn test_frame_updates_aspect_and_projection_on_resize() {
        let mut v = viewer((300, 300));
        let mut target = FakeTarget::new((300, 300));
        v.attach(&mut target, 1.0, 0.0);

        assert!(!v.frame(&mut target, 16.0).unwrap());
        let before = v.camera.projection_matrix();
        assert_eq!(v.camera.aspect, 1.0);

        target.display = (600, 300);
        assert!(v.frame(&mut target, 32.0).unwrap());
        assert_eq!(v.camera.aspect, 2.0);
        assert_ne!(v.camera.projection_matrix(), before);
        assert_eq!(target.buffer, (600, 300));
        assert_eq!(target.renders, 2);
        assert_eq!(target.last_view_proj, Some(v.camera.view_proj()));
    }

    #[test]
    fn test_drag_orbits_camera_through_viewer() {
        let mut v = viewer((300, 300));
        let mut target = FakeTarget::new((300, 300));
        v.attach(&mut target, 1.0, 0.0);

        let down = InputEvent::PointerDown { button: MouseButton::Left, x: 10.0, y: 10.0, modifiers: Modifiers::default() };
        assert!(!v.handle_input(&down, &target));
        assert!(v.handle_input(&InputEvent::PointerMove { x: 40.0, y: 10.0 }, &target));
        assert!(v.camera.eye.x.abs() > 1.0);
        assert_eq!(v.camera.target, Vec3::ZERO);
    }

    #[test]
    fn test_input_before_attach_is_ignored() {
        let mut v = viewer((300, 300));
        let target = FakeTarget::new((300, 300));
        assert!(!v.handle_input(&InputEvent::Wheel { delta_y: 1.0 }, &target));
        assert_eq!(v.camera.eye, Vec3::new(0.0, 300.0, 300.0));
    }

    #[test]
    fn test_dispose_releases_renderer_and_stops_frames() {
        let mut v = viewer((300, 300));
        let mut target = FakeTarget::new((300, 300));
        v.attach(&mut target, 1.0, 0.0);
        v.frame(&mut target, 16.0).unwrap();

        v.dispose(&mut target);
        assert!(target.disposed);
        assert!(v.is_disposed());
        assert!(v.controls.is_none());

        assert!(!v.frame(&mut target, 32.0).unwrap());
        assert_eq!(target.renders, 1);
    }
}
