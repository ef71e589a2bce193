// Re-export all public modules so they can be used from main.rs
pub mod logging;
pub mod config;
pub mod error;
pub mod utils;
pub mod frame_loop;
pub mod viewer;

// MVC Architecture
pub mod model;
pub mod view;
pub mod controller;

pub use config::ViewerConfig;
pub use error::{Result, ViewerError};
pub use viewer::Viewer;

#[cfg(target_arch = "wasm32")]
pub use web::{mount, ViewerHandle};

#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::RefCell;
    use std::rc::Rc;

    use tracing::{error, info};
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{prelude::wasm_bindgen, JsCast, JsValue};
    use web_sys::{AddEventListenerOptions, Event, EventTarget, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

    use crate::controller::input::wasm as web_input;
    use crate::controller::InputEvent;
    use crate::frame_loop::AnimationLoop;
    use crate::model::ModelPopulator;
    use crate::view::{scaled_size, CanvasSurface, DrawableSurface, GpuContext, WgpuRenderer};
    use crate::{logging, Viewer, ViewerConfig, ViewerError};

    struct ViewerState {
        viewer: Viewer,
        renderer: WgpuRenderer<CanvasSurface>,
    }

    type SharedState = Rc<RefCell<ViewerState>>;

    /// DOM listener that unregisters itself when dropped
    struct EventListener {
        target: EventTarget,
        kind: &'static str,
        closure: Closure<dyn FnMut(Event)>,
    }

    impl EventListener {
        fn new<E: JsCast + 'static>(
            target: &EventTarget,
            kind: &'static str,
            mut handler: impl FnMut(E) + 'static,
        ) -> Result<Self, JsValue> {
            let closure = Closure::wrap(Box::new(move |e: Event| {
                if let Ok(e) = e.dyn_into::<E>() {
                    handler(e);
                }
            }) as Box<dyn FnMut(Event)>);

            // non-passive so wheel and contextmenu can be cancelled
            let options = AddEventListenerOptions::new();
            options.set_passive(false);
            target.add_event_listener_with_callback_and_add_event_listener_options(
                kind,
                closure.as_ref().unchecked_ref(),
                &options,
            )?;

            Ok(Self { target: target.clone(), kind, closure })
        }
    }

    impl Drop for EventListener {
        fn drop(&mut self) {
            let _ = self
                .target
                .remove_event_listener_with_callback(self.kind, self.closure.as_ref().unchecked_ref());
        }
    }

    #[wasm_bindgen(start)]
    pub fn start() {
        logging::init();
    }

    /// Mount a viewer on the canvas with id `canvas_id`. `config` is a plain
    /// object with the camelCase `ViewerConfig` fields, or undefined for defaults.
    #[wasm_bindgen]
    pub async fn mount(canvas_id: String, config: JsValue) -> Result<ViewerHandle, JsValue> {
        let config = parse_config(&config)?;

        let window = web_sys::window().ok_or_else(|| ViewerError::Dom("no global `window`".into()))?;
        let document = window
            .document()
            .ok_or_else(|| ViewerError::Dom("no document on window".into()))?;
        let canvas = document
            .get_element_by_id(&canvas_id)
            .ok_or_else(|| ViewerError::Dom(format!("no element with id `{canvas_id}`")))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| ViewerError::Dom(format!("element `{canvas_id}` is not a canvas")))?;

        let surface = CanvasSurface::new(canvas.clone(), window.clone());
        let display = surface.display_size();
        let pixel_ratio = surface.device_pixel_ratio();
        let mut viewer = Viewer::initialize(config, display, &ModelPopulator::from_config())?;

        let (width, height) = scaled_size(display.0, display.1, pixel_ratio);
        let gpu = GpuContext::for_canvas(&canvas, width, height).await?;
        let mut renderer = WgpuRenderer::new(surface, gpu);
        viewer.attach(&mut renderer, pixel_ratio, now_ms(&window));

        let state: SharedState = Rc::new(RefCell::new(ViewerState { viewer, renderer }));
        let listeners = install_listeners(&window, &canvas, &state)?;
        let animation = start_frame_loop(&window, &state)?;

        info!(canvas = %canvas_id, "viewer mounted");
        Ok(ViewerHandle { mounted: Some(Mounted { state, listeners, animation }) })
    }

    fn parse_config(value: &JsValue) -> Result<ViewerConfig, JsValue> {
        if value.is_undefined() || value.is_null() {
            return Ok(ViewerConfig::default());
        }
        let json: String = js_sys::JSON::stringify(value)?.into();
        Ok(ViewerConfig::from_json(&json)?)
    }

    fn now_ms(window: &Window) -> f64 {
        window.performance().map(|p| p.now()).unwrap_or(0.0)
    }

    fn dispatch(state: &SharedState, event: InputEvent) {
        let mut guard = state.borrow_mut();
        let ViewerState { viewer, renderer } = &mut *guard;
        viewer.handle_input(&event, &*renderer);
    }

    fn install_listeners(window: &Window, canvas: &HtmlCanvasElement, state: &SharedState) -> Result<Vec<EventListener>, JsValue> {
        let canvas_target: &EventTarget = canvas.as_ref();
        let window_target: &EventTarget = window.as_ref();
        let mut listeners = Vec::with_capacity(6);

        // Drags start on the canvas but are tracked on the window so they
        // survive the pointer leaving it.
        let s = state.clone();
        listeners.push(EventListener::new(canvas_target, "mousedown", move |e: MouseEvent| {
            if let Some(event) = web_input::mouse_down_to_input(&e) {
                e.prevent_default();
                dispatch(&s, event);
            }
        })?);

        let s = state.clone();
        listeners.push(EventListener::new(window_target, "mousemove", move |e: MouseEvent| {
            dispatch(&s, web_input::mouse_move_to_input(&e));
        })?);

        let s = state.clone();
        listeners.push(EventListener::new(window_target, "mouseup", move |e: MouseEvent| {
            if let Some(event) = web_input::mouse_up_to_input(&e) {
                dispatch(&s, event);
            }
        })?);

        let s = state.clone();
        listeners.push(EventListener::new(canvas_target, "wheel", move |e: WheelEvent| {
            e.prevent_default();
            dispatch(&s, web_input::wheel_to_input(&e));
        })?);

        listeners.push(EventListener::new(canvas_target, "contextmenu", |e: MouseEvent| {
            e.prevent_default();
        })?);

        let s = state.clone();
        listeners.push(EventListener::new(window_target, "blur", move |_e: Event| {
            dispatch(&s, InputEvent::FocusLost);
        })?);

        Ok(listeners)
    }

    fn start_frame_loop(window: &Window, state: &SharedState) -> Result<AnimationLoop, JsValue> {
        let state = state.clone();
        let animation = AnimationLoop::start(window.clone(), move |timestamp| {
            let mut guard = state.borrow_mut();
            let ViewerState { viewer, renderer } = &mut *guard;
            match viewer.frame(renderer, timestamp) {
                Ok(_) => !viewer.is_disposed(),
                Err(e) => {
                    error!(error = %e, "frame failed, stopping render loop");
                    false
                }
            }
        })?;
        Ok(animation)
    }

    struct Mounted {
        state: SharedState,
        listeners: Vec<EventListener>,
        animation: AnimationLoop,
    }

    impl Mounted {
        fn teardown(self) {
            self.animation.stop();
            drop(self.listeners);
            let mut guard = self.state.borrow_mut();
            let ViewerState { viewer, renderer } = &mut *guard;
            viewer.dispose(renderer);
        }
    }

    /// Handle to a mounted viewer. Dropping it from JS (`free()`) also tears it down.
    #[wasm_bindgen]
    pub struct ViewerHandle {
        mounted: Option<Mounted>,
    }

    #[wasm_bindgen]
    impl ViewerHandle {
        /// Stop the frame loop, remove listeners and release GPU resources.
        /// Calling it again is a no-op.
        pub fn destroy(&mut self) {
            if let Some(mounted) = self.mounted.take() {
                mounted.teardown();
            }
        }

        /// Add the meshes of a glTF/GLB file to the scene.
        #[wasm_bindgen(js_name = loadModel)]
        pub fn load_model(&mut self, bytes: Vec<u8>) -> Result<(), JsValue> {
            let mounted = self
                .mounted
                .as_ref()
                .ok_or_else(|| ViewerError::Dom("viewer has been destroyed".into()))?;
            let populator = ModelPopulator::from_bytes(bytes);
            mounted.state.borrow_mut().viewer.add_content(&populator)?;
            Ok(())
        }
    }

    impl Drop for ViewerHandle {
        fn drop(&mut self) {
            self.destroy();
        }
    }
}
