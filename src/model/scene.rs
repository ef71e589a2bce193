use glam::{Mat4, Quat, Vec3};

use crate::config::ViewerConfig;
use crate::error::Result;
use crate::utils::Geometry;

pub const GROUND_SIZE: f32 = 200.0;
pub const GROUND_NAME: &str = "ground";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Material {
    /// Flat colour, ignores lights
    Basic { color: u32 },
    /// Colour scaled by the scene's ambient light
    Lambert { color: u32 },
}

impl Material {
    pub fn color(&self) -> u32 {
        match self {
            Material::Basic { color } | Material::Lambert { color } => *color,
        }
    }

    pub fn is_lit(&self) -> bool {
        matches!(self, Material::Lambert { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn rotate_x(&mut self, radians: f32) {
        self.rotation *= Quat::from_rotation_x(radians);
    }
}

#[derive(Debug, Clone)]
pub struct MeshNode {
    pub name: String,
    pub geometry: Geometry,
    pub material: Material,
    pub transform: Transform,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmbientLight {
    pub color: u32,
    pub intensity: f32,
}

#[derive(Debug, Clone)]
pub enum SceneNode {
    Mesh(MeshNode),
    AmbientLight(AmbientLight),
}

/// Extension point for adding content once the base scene exists.
pub trait Populate {
    fn populate(&self, scene: &mut Scene, config: &ViewerConfig) -> Result<()>;
}

/// Adds nothing
pub struct EmptyPopulator;

impl Populate for EmptyPopulator {
    fn populate(&self, _scene: &mut Scene, _config: &ViewerConfig) -> Result<()> {
        Ok(())
    }
}

pub struct Scene {
    pub background: u32,
    nodes: Vec<SceneNode>,
    /// Bumped on every insertion so the renderer knows when to re-upload
    revision: u64,
}

impl Scene {
    pub fn new(background: u32) -> Self {
        Self {
            background,
            nodes: Vec::new(),
            revision: 0,
        }
    }

    pub fn add(&mut self, node: SceneNode) {
        self.nodes.push(node);
        self.revision += 1;
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn meshes(&self) -> impl Iterator<Item = &MeshNode> {
        self.nodes.iter().filter_map(|n| match n {
            SceneNode::Mesh(m) => Some(m),
            _ => None,
        })
    }

    pub fn ambient_lights(&self) -> impl Iterator<Item = &AmbientLight> {
        self.nodes.iter().filter_map(|n| match n {
            SceneNode::AmbientLight(l) => Some(l),
            _ => None,
        })
    }

    /// Summed ambient contribution as RGB
    pub fn ambient(&self) -> [f32; 3] {
        self.ambient_lights().fold([0.0; 3], |mut acc, light| {
            let c = crate::utils::hex_to_rgba(light.color);
            for i in 0..3 {
                acc[i] += c[i] * light.intensity;
            }
            acc
        })
    }

    /// Blank playground: a white unlit floor on the XZ plane and a white ambient light.
    pub fn add_floor_and_lights(&mut self) {
        let mut transform = Transform::default();
        transform.rotate_x(-std::f32::consts::FRAC_PI_2);

        self.add(SceneNode::Mesh(MeshNode {
            name: GROUND_NAME.to_string(),
            geometry: Geometry::plane(GROUND_SIZE, GROUND_SIZE),
            material: Material::Basic { color: 0xFFFFFF },
            transform,
        }));

        self.add(SceneNode::AmbientLight(AmbientLight {
            color: 0xFFFFFF,
            intensity: 1.0,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_lies_on_xz_plane() {
        let mut scene = Scene::new(0);
        scene.add_floor_and_lights();

        let ground = scene.meshes().next().unwrap();
        assert_eq!(ground.name, GROUND_NAME);
        let up = ground.transform.matrix().transform_vector3(Vec3::Z);
        assert!((up - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_revision_tracks_insertions() {
        let mut scene = Scene::new(0);
        assert_eq!(scene.revision(), 0);
        scene.add_floor_and_lights();
        assert_eq!(scene.revision(), 2);
        assert_eq!(scene.nodes().len(), 2);
    }

    #[test]
    fn test_ambient_sums_lights() {
        let mut scene = Scene::new(0);
        assert_eq!(scene.ambient(), [0.0; 3]);
        scene.add(SceneNode::AmbientLight(AmbientLight { color: 0xFF0000, intensity: 0.5 }));
        scene.add(SceneNode::AmbientLight(AmbientLight { color: 0xFFFFFF, intensity: 0.25 }));
        let a = scene.ambient();
        assert!((a[0] - 0.75).abs() < 1e-6);
        assert!((a[1] - 0.25).abs() < 1e-6);
    }
}
