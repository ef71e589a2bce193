use serde::Deserialize;
use std::path::Path;

use crate::error::{Result, ViewerError};

/// Inputs supplied by the hosting view. Every field is optional on the wire;
/// missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    pub camera_z: f32,
    pub camera_y: f32,
    /// Vertical field of view in degrees
    pub field_of_view: f32,
    pub near_clipping_plane: f32,
    pub far_clipping_plane: f32,
    /// glTF / GLB asset added to the scene when present
    pub model_path: Option<String>,
    /// 0xRRGGBB
    pub background: u32,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            camera_z: 300.0,
            camera_y: 300.0,
            field_of_view: 45.0,
            near_clipping_plane: 1.0,
            far_clipping_plane: 1000.0,
            model_path: None,
            background: 0x000000,
            enable_damping: false,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
        }
    }
}

impl ViewerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ViewerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Reject inputs that would produce a degenerate projection or orbit.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("cameraZ", self.camera_z),
            ("cameraY", self.camera_y),
            ("fieldOfView", self.field_of_view),
            ("nearClippingPlane", self.near_clipping_plane),
            ("farClippingPlane", self.far_clipping_plane),
            ("dampingFactor", self.damping_factor),
            ("rotateSpeed", self.rotate_speed),
            ("zoomSpeed", self.zoom_speed),
            ("panSpeed", self.pan_speed),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(ViewerError::invalid(field, format!("must be finite, got {value}")));
            }
        }

        if self.field_of_view <= 0.0 || self.field_of_view >= 180.0 {
            return Err(ViewerError::invalid(
                "fieldOfView",
                format!("must be within (0, 180) degrees, got {}", self.field_of_view),
            ));
        }
        if self.near_clipping_plane <= 0.0 {
            return Err(ViewerError::invalid(
                "nearClippingPlane",
                format!("must be positive, got {}", self.near_clipping_plane),
            ));
        }
        if self.far_clipping_plane <= self.near_clipping_plane {
            return Err(ViewerError::invalid(
                "farClippingPlane",
                format!(
                    "must be greater than nearClippingPlane ({}), got {}",
                    self.near_clipping_plane, self.far_clipping_plane
                ),
            ));
        }
        // z == 0 puts the eye on the vertical axis through the target, where
        // the view direction is parallel to the camera's up vector
        if self.camera_z == 0.0 {
            return Err(ViewerError::invalid(
                "cameraZ",
                format!("must be non-zero so the camera is off the orbit axis, got {}", self.camera_z),
            ));
        }
        if self.damping_factor <= 0.0 || self.damping_factor > 1.0 {
            return Err(ViewerError::invalid(
                "dampingFactor",
                format!("must be within (0, 1], got {}", self.damping_factor),
            ));
        }
        if self.background > 0xFF_FF_FF {
            return Err(ViewerError::invalid("background", format!("not a 0xRRGGBB color: {:#x}", self.background)));
        }
        Ok(())
    }
}
