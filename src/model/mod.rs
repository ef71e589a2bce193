// MODEL: Scene content and camera
pub mod camera;
pub mod scene;
pub mod gltf_loader;

pub use camera::{PerspectiveCamera, aspect_ratio};
pub use scene::{Scene, SceneNode, MeshNode, AmbientLight, Material, Transform, Populate, EmptyPopulator};
pub use gltf_loader::ModelPopulator;
