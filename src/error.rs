//! Error types for the viewer

use thiserror::Error;

/// Result type for viewer operations
pub type Result<T> = std::result::Result<T, ViewerError>;

/// Errors that can occur while building or running a viewer
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("drawable surface has no area ({width}x{height})")]
    ZeroSizedSurface { width: u32, height: u32 },

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("surface creation failed: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter: {0}")]
    Adapter(String),

    #[error("device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("model error: {0}")]
    Model(String),

    #[error("DOM error: {0}")]
    Dom(String),
}

impl ViewerError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ViewerError::InvalidConfig { field, reason: reason.into() }
    }
}

impl From<gltf::Error> for ViewerError {
    fn from(err: gltf::Error) -> Self {
        ViewerError::Model(err.to_string())
    }
}

#[cfg(target_arch = "wasm32")]
impl From<ViewerError> for wasm_bindgen::JsValue {
    fn from(err: ViewerError) -> Self {
        wasm_bindgen::JsValue::from_str(&err.to_string())
    }
}
