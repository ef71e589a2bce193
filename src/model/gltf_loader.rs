// glTF 2.0 / GLB import into scene mesh nodes.
// Every primitive of every mesh becomes one node; node transforms from the
// default scene hierarchy are baked into the vertices.

use glam::{Mat3, Mat4, Vec3};
use tracing::{debug, info};
#[cfg(target_arch = "wasm32")]
use tracing::warn;

use crate::config::ViewerConfig;
use crate::error::{Result, ViewerError};
use crate::model::scene::{Material, MeshNode, Populate, Scene, SceneNode, Transform};
use crate::utils::{Geometry, Vertex};

const DEFAULT_MODEL_COLOR: u32 = 0xCCCCCC;

/// Populator that loads a model into the scene
pub struct ModelPopulator {
    bytes: Option<Vec<u8>>,
}

impl ModelPopulator {
    /// Loads `model_path` from the config when set.
    pub fn from_config() -> Self {
        Self { bytes: None }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes: Some(bytes) }
    }
}

impl Populate for ModelPopulator {
    fn populate(&self, scene: &mut Scene, config: &ViewerConfig) -> Result<()> {
        let nodes = match (&self.bytes, &config.model_path) {
            (Some(bytes), _) => import_slice(bytes, "<bytes>")?,
            #[cfg(not(target_arch = "wasm32"))]
            (None, Some(path)) => import_path(path)?,
            #[cfg(target_arch = "wasm32")]
            (None, Some(path)) => {
                warn!(model = %path, "no filesystem on the web, hand model bytes to ViewerHandle::load_model");
                return Ok(());
            }
            (None, None) => return Ok(()),
        };
        for node in nodes {
            scene.add(SceneNode::Mesh(node));
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn import_path(path: &str) -> Result<Vec<MeshNode>> {
    let (doc, buffers, _images) = gltf::import(path)?;
    collect_meshes(&doc, &buffers, path)
}

pub fn import_slice(bytes: &[u8], label: &str) -> Result<Vec<MeshNode>> {
    let (doc, buffers, _images) = gltf::import_slice(bytes)?;
    collect_meshes(&doc, &buffers, label)
}

fn collect_meshes(doc: &gltf::Document, buffers: &[gltf::buffer::Data], label: &str) -> Result<Vec<MeshNode>> {
    let mut out = Vec::new();
    let roots: Vec<gltf::Node> = match doc.default_scene().or_else(|| doc.scenes().next()) {
        Some(scene) => scene.nodes().collect(),
        None => doc.nodes().collect(),
    };
    for node in roots {
        visit(&node, Mat4::IDENTITY, buffers, &mut out);
    }

    if out.is_empty() {
        return Err(ViewerError::Model(format!("{label} contains no mesh primitives")));
    }
    info!(model = label, meshes = out.len(), "model imported");
    Ok(out)
}

fn visit(node: &gltf::Node, parent: Mat4, buffers: &[gltf::buffer::Data], out: &mut Vec<MeshNode>) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for (i, prim) in mesh.primitives().enumerate() {
            if prim.mode() != gltf::mesh::Mode::Triangles {
                debug!(mesh = mesh.index(), primitive = i, "skipping non-triangle primitive");
                continue;
            }
            let Some(mut geometry) = read_primitive(&prim, buffers) else {
                continue;
            };
            bake_transform(&mut geometry, world);
            let color = base_color(&prim.material());
            out.push(MeshNode {
                name: mesh
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("mesh{}_{}", mesh.index(), i)),
                geometry,
                material: Material::Lambert { color },
                transform: Transform::default(),
            });
        }
    }

    for child in node.children() {
        visit(&child, world, buffers, out);
    }
}

/// Apply `world` to positions and normals. Shear survives, and mirrored
/// transforms get their winding flipped so back-face culling still holds.
fn bake_transform(geometry: &mut Geometry, world: Mat4) {
    let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
    for v in &mut geometry.vertices {
        v.pos = world.transform_point3(Vec3::from(v.pos)).to_array();
        v.normal = (normal_matrix * Vec3::from(v.normal)).normalize_or_zero().to_array();
    }
    if world.determinant() < 0.0 {
        for tri in geometry.indices.chunks_exact_mut(3) {
            tri.swap(1, 2);
        }
    }
}

fn read_primitive(prim: &gltf::Primitive, buffers: &[gltf::buffer::Data]) -> Option<Geometry> {
    let reader = prim.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));

    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let normals: Vec<[f32; 3]> = reader
        .read_normals()
        .map(|n| n.collect())
        .unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; positions.len()]);
    let uvs: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|t| t.into_f32().collect())
        .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None if positions.len() % 3 == 0 => (0..positions.len() as u32).collect(),
        None => return None,
    };

    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, pos)| Vertex {
            pos: *pos,
            normal: normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
            uv: uvs.get(i).copied().unwrap_or([0.0, 0.0]),
        })
        .collect();

    let geometry = Geometry { vertices, indices };
    (!geometry.is_empty()).then_some(geometry)
}

fn base_color(material: &gltf::Material) -> u32 {
    let [r, g, b, _] = material.pbr_metallic_roughness().base_color_factor();
    let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
    if material.index().is_none() {
        return DEFAULT_MODEL_COLOR;
    }
    (to_byte(r) << 16) | (to_byte(g) << 8) | to_byte(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(nodes: &[MeshNode]) -> Option<(Vec3, Vec3)> {
        let mut points = nodes.iter().flat_map(|n| {
            let m = n.transform.matrix();
            n.geometry.vertices.iter().map(move |v| m.transform_point3(Vec3::from(v.pos)))
        });
        let first = points.next()?;
        Some(points.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }

    // Single triangle, embedded base64 buffer: 3 positions then 3 u16 indices.
    const TRIANGLE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [ { "nodes": [0] } ],
        "nodes": [ { "mesh": 0, "translation": [0.0, 5.0, 0.0] } ],
        "meshes": [ { "name": "tri", "primitives": [ { "attributes": { "POSITION": 1 }, "indices": 0 } ] } ],
        "buffers": [ { "uri": "data:application/octet-stream;base64,AAABAAIAAAAAAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAAAAAAAAACAPwAAAAA=", "byteLength": 44 } ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 6, "target": 34963 },
            { "buffer": 0, "byteOffset": 8, "byteLength": 36, "target": 34962 }
        ],
        "accessors": [
            { "bufferView": 0, "byteOffset": 0, "componentType": 5123, "count": 3, "type": "SCALAR", "max": [2], "min": [0] },
            { "bufferView": 1, "byteOffset": 0, "componentType": 5126, "count": 3, "type": "VEC3", "max": [1.0, 1.0, 0.0], "min": [0.0, 0.0, 0.0] }
        ]
    }"#;

    #[test]
    fn test_import_embedded_triangle() {
        let nodes = import_slice(TRIANGLE_GLTF.as_bytes(), "triangle").unwrap();
        assert_eq!(nodes.len(), 1);
        let node = &nodes[0];
        assert_eq!(node.name, "tri");
        assert_eq!(node.geometry.indices, vec![0, 1, 2]);
        assert!((Vec3::from(node.geometry.vertices[1].pos) - Vec3::new(1.0, 5.0, 0.0)).length() < 1e-6);
        assert!(node.material.is_lit());
        assert_eq!(node.transform, Transform::default());

        let (lo, hi) = bounds(&nodes).unwrap();
        assert!((lo.y - 5.0).abs() < 1e-6);
        assert!((hi.y - 6.0).abs() < 1e-6);
    }

    fn with_node_transform(transform: &str) -> String {
        TRIANGLE_GLTF.replace(r#""translation": [0.0, 5.0, 0.0]"#, transform)
    }

    #[test]
    fn test_mirrored_node_flips_winding() {
        let gltf = with_node_transform(r#""scale": [-1.0, 1.0, 1.0]"#);
        let nodes = import_slice(gltf.as_bytes(), "mirrored").unwrap();
        let geometry = &nodes[0].geometry;
        assert_eq!(geometry.indices, vec![0, 2, 1]);
        assert!((Vec3::from(geometry.vertices[1].pos) - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_sheared_node_is_baked_exactly() {
        // column-major, x += y
        let gltf = with_node_transform(
            r#""matrix": [1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]"#,
        );
        let nodes = import_slice(gltf.as_bytes(), "sheared").unwrap();
        let geometry = &nodes[0].geometry;
        assert_eq!(geometry.indices, vec![0, 1, 2]);
        assert!((Vec3::from(geometry.vertices[2].pos) - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);
        assert!((Vec3::from(geometry.vertices[1].pos) - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_populator_adds_model_nodes() {
        let mut scene = Scene::new(0);
        scene.add_floor_and_lights();
        let populator = ModelPopulator::from_bytes(TRIANGLE_GLTF.as_bytes().to_vec());
        populator.populate(&mut scene, &ViewerConfig::default()).unwrap();
        assert_eq!(scene.meshes().count(), 2);
    }

    #[test]
    fn test_no_model_path_is_noop() {
        let mut scene = Scene::new(0);
        ModelPopulator::from_config().populate(&mut scene, &ViewerConfig::default()).unwrap();
        assert!(scene.nodes().is_empty());
    }

    #[test]
    fn test_garbage_bytes_are_model_error() {
        assert!(matches!(import_slice(b"not a model", "junk"), Err(ViewerError::Model(_))));
    }
}
