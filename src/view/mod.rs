// VIEW: Rendering and graphics
pub mod render;
pub mod gpu_init;
pub mod surface;

pub use render::{RenderTarget, WgpuRenderer, CameraUniform, ModelUniform};
pub use gpu_init::GpuContext;
pub use surface::{DrawableSurface, scaled_size};
