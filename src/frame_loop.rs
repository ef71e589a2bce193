/// Frame timing, fed with millisecond timestamps from the host
/// (`requestAnimationFrame` on the web, `Instant` natively).
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    running: bool,
    start: f64,
    last: f64,
    frames: u64,
}

impl FrameClock {
    /// Upper bound for one step so a backgrounded tab does not produce a huge jump
    pub const MAX_DELTA: f32 = 0.1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, now_ms: f64) {
        self.running = true;
        self.start = now_ms;
        self.last = now_ms;
        self.frames = 0;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Seconds since the previous tick, clamped to `[0, MAX_DELTA]`
    pub fn tick(&mut self, now_ms: f64) -> f32 {
        if !self.running {
            return 0.0;
        }
        let dt = ((now_ms - self.last) / 1000.0).clamp(0.0, Self::MAX_DELTA as f64) as f32;
        self.last = now_ms;
        self.frames += 1;
        dt
    }

    pub fn elapsed(&self) -> f64 {
        (self.last - self.start) / 1000.0
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(target_arch = "wasm32")]
pub use animation::AnimationLoop;

#[cfg(target_arch = "wasm32")]
mod animation {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use tracing::{debug, error};
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::JsCast;
    use web_sys::Window;

    use crate::error::{Result, ViewerError};

    type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

    /// `requestAnimationFrame` callback that re-registers itself every frame
    /// until `stop` is called or the body returns false.
    pub struct AnimationLoop {
        window: Window,
        callback: FrameCallback,
        request_id: Rc<Cell<Option<i32>>>,
    }

    impl AnimationLoop {
        pub fn start(window: Window, mut body: impl FnMut(f64) -> bool + 'static) -> Result<Self> {
            let callback: FrameCallback = Rc::new(RefCell::new(None));
            let request_id = Rc::new(Cell::new(None));

            let next_callback = callback.clone();
            let next_id = request_id.clone();
            let frame_window = window.clone();
            *callback.borrow_mut() = Some(Closure::wrap(Box::new(move |timestamp: f64| {
                next_id.set(None);
                // schedule the next frame before drawing this one
                if let Some(next) = next_callback.borrow().as_ref() {
                    match frame_window.request_animation_frame(next.as_ref().unchecked_ref()) {
                        Ok(id) => next_id.set(Some(id)),
                        Err(e) => error!(error = ?e, "requestAnimationFrame failed"),
                    }
                }

                if !body(timestamp) {
                    if let Some(id) = next_id.take() {
                        let _ = frame_window.cancel_animation_frame(id);
                    }
                    debug!("frame loop halted");
                }
            }) as Box<dyn FnMut(f64)>));

            let first = callback
                .borrow()
                .as_ref()
                .map(|cb| window.request_animation_frame(cb.as_ref().unchecked_ref()))
                .transpose()
                .map_err(|e| ViewerError::Dom(format!("requestAnimationFrame failed: {e:?}")))?;
            request_id.set(first);

            Ok(Self { window, callback, request_id })
        }

        /// Cancel the pending frame and drop the callback, breaking its self-reference.
        pub fn stop(&self) {
            if let Some(id) = self.request_id.take() {
                let _ = self.window.cancel_animation_frame(id);
            }
            self.callback.borrow_mut().take();
        }
    }

    impl Drop for AnimationLoop {
        fn drop(&mut self) {
            self.stop();
        }
    }
}
