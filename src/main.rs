use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};
use winit::{
    event::{Event, WindowEvent},
    event_loop::EventLoop,
    keyboard::ModifiersState,
    window::Window,
};

use orbit_viewer::{logging, model, view, controller};
use orbit_viewer::{Viewer, ViewerConfig};

use controller::input::native;
use controller::InputEvent;
use model::ModelPopulator;
use view::{DrawableSurface, GpuContext, RenderTarget, WgpuRenderer, WindowSurface};

struct App {
    window: Arc<Window>,
    viewer: Viewer,
    renderer: WgpuRenderer<WindowSurface>,

    // Input handling
    modifiers: ModifiersState,
    cursor: (f32, f32),

    // Frame timing
    started: Instant,
}

impl App {
    async fn new(window: Arc<Window>, config: ViewerConfig) -> orbit_viewer::Result<Self> {
        let surface = WindowSurface::new(window.clone());
        let mut viewer = Viewer::initialize(config, surface.display_size(), &ModelPopulator::from_config())?;

        let gpu = GpuContext::for_window(window.clone()).await?;
        let mut renderer = WgpuRenderer::new(surface, gpu);
        viewer.attach(&mut renderer, window.scale_factor(), 0.0);

        Ok(Self {
            window,
            viewer,
            renderer,
            modifiers: ModifiersState::empty(),
            cursor: (0.0, 0.0),
            started: Instant::now(),
        })
    }

    fn now_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns true when the event was consumed as pointer input.
    fn input(&mut self, event: &WindowEvent) -> bool {
        let input = match event {
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = modifiers.state();
                return true;
            }
            WindowEvent::CursorMoved { position, .. } => {
                // Controls work in logical pixels, like CSS pixels on the web
                let logical = position.to_logical::<f32>(self.window.scale_factor());
                self.cursor = (logical.x, logical.y);
                InputEvent::PointerMove { x: logical.x, y: logical.y }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                match native::mouse_input_to_input(*state, *button, self.cursor, self.modifiers) {
                    Some(input) => input,
                    None => return false,
                }
            }
            WindowEvent::MouseWheel { delta, .. } => native::scroll_to_input(*delta),
            WindowEvent::Focused(false) => InputEvent::FocusLost,
            _ => return false,
        };
        self.viewer.handle_input(&input, &self.renderer);
        true
    }

    fn shutdown(&mut self) {
        self.viewer.dispose(&mut self.renderer);
    }
}

fn load_config() -> orbit_viewer::Result<ViewerConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            info!(%path, "loading viewer config");
            ViewerConfig::from_json_file(path)
        }
        None => Ok(ViewerConfig::default()),
    }
}

#[allow(deprecated)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config = load_config()?;

    let event_loop = EventLoop::new()?;
    let window_attributes = Window::default_attributes()
        .with_title("Orbit Viewer")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let mut app = pollster::block_on(App::new(window.clone(), config))?;

    event_loop.run(move |event, elwt| {
        match event {
            Event::WindowEvent {
                ref event,
                window_id,
            } if window_id == app.window.id() => {
                if !app.input(event) {
                    match event {
                        WindowEvent::CloseRequested => {
                            app.shutdown();
                            elwt.exit();
                        }
                        WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                            // picked up by the next frame's resize check
                            app.renderer.set_pixel_ratio(*scale_factor);
                        }
                        WindowEvent::RedrawRequested => {
                            let now = app.now_ms();
                            if let Err(e) = app.viewer.frame(&mut app.renderer, now) {
                                error!(error = %e, "frame failed, exiting");
                                app.shutdown();
                                elwt.exit();
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::AboutToWait => {
                app.window.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
