/// The on-screen area a renderer draws into.
///
/// Display size is what the host lays out (CSS pixels on the web, logical
/// pixels natively); the render buffer is that size times the pixel ratio.
pub trait DrawableSurface {
    fn display_size(&self) -> (u32, u32);
    fn device_pixel_ratio(&self) -> f64;
    /// Change the displayed size. Hosts that own their layout may ignore this.
    fn set_display_size(&self, width: u32, height: u32);
    /// Change the backing buffer size in physical pixels.
    fn set_buffer_size(&self, width: u32, height: u32);
    /// Physical buffer size for a `width`x`height` display size.
    fn buffer_size_for(&self, width: u32, height: u32, pixel_ratio: f64) -> (u32, u32) {
        scaled_size(width, height, pixel_ratio)
    }
}

/// Physical buffer size for a display size and pixel ratio
pub fn scaled_size(width: u32, height: u32, pixel_ratio: f64) -> (u32, u32) {
    (
        (width as f64 * pixel_ratio).floor() as u32,
        (height as f64 * pixel_ratio).floor() as u32,
    )
}

#[cfg(target_arch = "wasm32")]
pub use canvas::CanvasSurface;

#[cfg(target_arch = "wasm32")]
mod canvas {
    use super::DrawableSurface;
    use tracing::warn;
    use web_sys::{HtmlCanvasElement, Window};

    pub struct CanvasSurface {
        pub canvas: HtmlCanvasElement,
        window: Window,
    }

    impl CanvasSurface {
        pub fn new(canvas: HtmlCanvasElement, window: Window) -> Self {
            Self { canvas, window }
        }
    }

    impl DrawableSurface for CanvasSurface {
        fn display_size(&self) -> (u32, u32) {
            (
                self.canvas.client_width().max(0) as u32,
                self.canvas.client_height().max(0) as u32,
            )
        }

        fn device_pixel_ratio(&self) -> f64 {
            self.window.device_pixel_ratio()
        }

        fn set_display_size(&self, width: u32, height: u32) {
            let style = self.canvas.style();
            if style.set_property("width", &format!("{width}px")).is_err()
                || style.set_property("height", &format!("{height}px")).is_err()
            {
                warn!(width, height, "could not set canvas style size");
            }
        }

        fn set_buffer_size(&self, width: u32, height: u32) {
            self.canvas.set_width(width);
            self.canvas.set_height(height);
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use window::WindowSurface;

#[cfg(not(target_arch = "wasm32"))]
mod window {
    use super::DrawableSurface;
    use super::scaled_size;
    use std::sync::Arc;
    use winit::dpi::{LogicalSize, PhysicalSize};
    use winit::window::Window;

    pub struct WindowSurface {
        pub window: Arc<Window>,
    }

    impl WindowSurface {
        pub fn new(window: Arc<Window>) -> Self {
            Self { window }
        }
    }

    impl DrawableSurface for WindowSurface {
        fn display_size(&self) -> (u32, u32) {
            let logical: LogicalSize<u32> = self.window.inner_size().to_logical(self.window.scale_factor());
            (logical.width, logical.height)
        }

        fn device_pixel_ratio(&self) -> f64 {
            self.window.scale_factor()
        }

        fn set_display_size(&self, width: u32, height: u32) {
            if self.display_size() != (width, height) {
                let _ = self.window.request_inner_size(LogicalSize::new(width, height));
            }
        }

        // The swap chain is the buffer natively; configuring it is the renderer's job.
        fn set_buffer_size(&self, _width: u32, _height: u32) {}

        fn buffer_size_for(&self, width: u32, height: u32, pixel_ratio: f64) -> (u32, u32) {
            window_buffer_size(self.window.inner_size(), self.window.scale_factor(), (width, height), pixel_ratio)
        }
    }

    /// The window's own physical size when `display` is its current logical
    /// size. Rounding to logical pixels and scaling back can be off by one
    /// at fractional scale factors.
    pub(super) fn window_buffer_size(
        physical: PhysicalSize<u32>,
        scale_factor: f64,
        display: (u32, u32),
        pixel_ratio: f64,
    ) -> (u32, u32) {
        let logical: LogicalSize<u32> = physical.to_logical(scale_factor);
        if (logical.width, logical.height) == display && scale_factor == pixel_ratio {
            (physical.width, physical.height)
        } else {
            scaled_size(display.0, display.1, pixel_ratio)
        }
    }
}
