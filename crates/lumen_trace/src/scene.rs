//! Scene snapshot consumed by the tracing core.
//!
//! The host flattens its scene graph into a [`SceneSnapshot`]: shared
//! triangle meshes placed by world transforms, a material table addressed by
//! [`MaterialId`], and light descriptors. [`SceneGeometry::build`] turns it
//! into the read-only structures the integrator traces against. Any geometry
//! change means building a new snapshot and a new `SceneGeometry`.

use std::sync::Arc;

use lumen_math::{Aabb, Mat4, Vec3};

use crate::bvh::Bvh;
use crate::error::{TraceError, TraceResult};
use crate::light::LightSampler;
use crate::material::{Color, Material};
use crate::primitive::{Primitive, TRIANGLES_PER_PRIMITIVE};

/// Index into the snapshot's material table, assigned by
/// [`SceneSnapshot::add_material`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

impl MaterialId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of an object in the snapshot, assigned by [`SceneSnapshot::add_object`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

/// An indexed triangle list in object space.
#[derive(Clone, Debug)]
pub struct TriangleMesh {
    positions: Vec<Vec3>,
    indices: Vec<u32>,
    bounds: Aabb,
}

impl TriangleMesh {
    /// Create a mesh. Every 3 indices form a triangle and must reference an
    /// existing position.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> TraceResult<Self> {
        if indices.len() % 3 != 0 {
            return Err(TraceError::MalformedMesh(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(TraceError::MalformedMesh(format!(
                "index {} out of range for {} positions",
                bad,
                positions.len()
            )));
        }
        let bounds = Aabb::enclosing(positions.iter().copied());
        Ok(Self {
            positions,
            indices,
            bounds,
        })
    }

    /// Parallelogram spanned by `edge_u` and `edge_v` from `corner`, as two
    /// triangles. The face normal is `edge_u x edge_v`.
    pub fn quad(corner: Vec3, edge_u: Vec3, edge_v: Vec3) -> Self {
        let positions = vec![corner, corner + edge_u, corner + edge_u + edge_v, corner + edge_v];
        let bounds = Aabb::enclosing(positions.iter().copied());
        Self {
            positions,
            indices: vec![0, 1, 2, 0, 2, 3],
            bounds,
        }
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Corner positions of triangle `index`.
    #[inline]
    pub fn triangle(&self, index: usize) -> [Vec3; 3] {
        let i = &self.indices[index * 3..index * 3 + 3];
        [
            self.positions[i[0] as usize],
            self.positions[i[1] as usize],
            self.positions[i[2] as usize],
        ]
    }

    /// Object-space bounds of triangles `first..first + count`.
    pub fn triangle_bounds(&self, first: usize, count: usize) -> Aabb {
        (first..first + count)
            .flat_map(|t| self.triangle(t))
            .fold(Aabb::EMPTY, |acc, p| acc.grow(p))
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Object-space bounds of all positions.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }
}

/// A mesh placed in the world with a material.
#[derive(Clone, Debug)]
pub struct SceneObject {
    pub mesh: Arc<TriangleMesh>,
    pub transform: Mat4,
    pub material: MaterialId,
}

/// Shape of a light descriptor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightShape {
    /// Emits from `position` in every direction.
    Point,
    /// One-sided parallelogram with a corner at `position`, emitting toward
    /// `edge_u x edge_v`.
    Quad { edge_u: Vec3, edge_v: Vec3 },
}

/// A light the integrator samples with next-event estimation.
///
/// Light descriptors are not geometry: camera and continuation rays never
/// hit them. Visible emitters are modelled as emissive materials instead.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightDescriptor {
    pub position: Vec3,
    pub color: Color,
    pub intensity: f32,
    pub shape: LightShape,
}

impl LightDescriptor {
    /// A point light.
    pub fn point(position: Vec3, color: Color, intensity: f32) -> Self {
        Self {
            position,
            color,
            intensity,
            shape: LightShape::Point,
        }
    }

    /// A one-sided quad area light.
    pub fn quad(corner: Vec3, edge_u: Vec3, edge_v: Vec3, color: Color, intensity: f32) -> Self {
        Self {
            position: corner,
            color,
            intensity,
            shape: LightShape::Quad { edge_u, edge_v },
        }
    }

    /// Emitted radiance (area lights) or intensity (point lights).
    pub fn emission(&self) -> Color {
        self.color * self.intensity
    }
}

/// Flattened scene handed to the renderer.
#[derive(Clone, Debug, Default)]
pub struct SceneSnapshot {
    materials: Vec<Material>,
    objects: Vec<SceneObject>,
    lights: Vec<LightDescriptor>,
}

impl SceneSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a material and return its id. Parameters are clamped to
    /// their valid ranges here; the stored material never changes afterward.
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.materials.len() as u32);
        self.materials.push(material.sanitized());
        id
    }

    /// Place a mesh in the world.
    pub fn add_object(
        &mut self,
        mesh: Arc<TriangleMesh>,
        transform: Mat4,
        material: MaterialId,
    ) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(SceneObject {
            mesh,
            transform,
            material,
        });
        id
    }

    /// Add a light descriptor.
    pub fn add_light(&mut self, light: LightDescriptor) {
        self.lights.push(light);
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn lights(&self) -> &[LightDescriptor] {
        &self.lights
    }
}

/// Read-only scene data shared by every trace of a frame.
pub struct SceneGeometry {
    bvh: Bvh,
    materials: Vec<Material>,
    lights: LightSampler,
}

impl SceneGeometry {
    /// Build the BVH and light table from a snapshot.
    ///
    /// Objects with a non-invertible transform and empty meshes are skipped;
    /// a material id that does not exist is an error.
    pub fn build(snapshot: &SceneSnapshot) -> TraceResult<Self> {
        let mut primitives = Vec::new();

        for (index, object) in snapshot.objects.iter().enumerate() {
            let object_id = ObjectId(index as u32);
            if object.material.index() >= snapshot.materials.len() {
                return Err(TraceError::UnknownMaterial {
                    object: object_id,
                    material: object.material,
                });
            }

            let triangle_count = object.mesh.triangle_count();
            let before = primitives.len();
            for first in (0..triangle_count).step_by(TRIANGLES_PER_PRIMITIVE) {
                let count = TRIANGLES_PER_PRIMITIVE.min(triangle_count - first);
                if let Some(primitive) = Primitive::new(
                    Arc::clone(&object.mesh),
                    first..first + count,
                    object.transform,
                    object.material,
                    object_id,
                ) {
                    primitives.push(primitive);
                }
            }
            if primitives.len() == before && triangle_count > 0 {
                log::debug!(
                    "Skipping object {:?}: degenerate transform or bounds",
                    object_id
                );
            }
        }

        Ok(Self {
            bvh: Bvh::build(primitives),
            materials: snapshot.materials.clone(),
            lights: LightSampler::new(&snapshot.lights),
        })
    }

    /// A scene with no geometry and no lights.
    pub fn empty() -> Self {
        Self {
            bvh: Bvh::build(Vec::new()),
            materials: Vec::new(),
            lights: LightSampler::new(&[]),
        }
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    pub fn lights(&self) -> &LightSampler {
        &self.lights
    }

    /// Material by id. Ids come from the snapshot this geometry was built
    /// from, so lookups of hit materials always succeed.
    #[inline]
    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_rejects_bad_indices() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y];

        assert!(matches!(
            TriangleMesh::new(positions.clone(), vec![0, 1]),
            Err(TraceError::MalformedMesh(_))
        ));
        assert!(matches!(
            TriangleMesh::new(positions.clone(), vec![0, 1, 3]),
            Err(TraceError::MalformedMesh(_))
        ));
        assert_eq!(TriangleMesh::new(positions, vec![0, 1, 2]).unwrap().triangle_count(), 1);
    }

    #[test]
    fn test_quad_normal_follows_edges() {
        let quad = TriangleMesh::quad(Vec3::ZERO, Vec3::X, Vec3::Z);
        let expected = Vec3::X.cross(Vec3::Z);

        assert_eq!(quad.triangle_count(), 2);
        for t in 0..2 {
            let [a, b, c] = quad.triangle(t);
            let n = (b - a).cross(c - a).normalize();
            assert!((n - expected).length() < 1e-6);
        }
    }

    #[test]
    fn test_material_ids_are_sequential() {
        let mut snapshot = SceneSnapshot::new();
        let a = snapshot.add_material(Material::diffuse(Color::ONE));
        let b = snapshot.add_material(Material::metal(Color::ONE, 0.2));

        assert_eq!(a, MaterialId(0));
        assert_eq!(b, MaterialId(1));
        assert_eq!(snapshot.materials().len(), 2);
    }

    #[test]
    fn test_build_rejects_unknown_material() {
        let mut snapshot = SceneSnapshot::new();
        let mesh = Arc::new(TriangleMesh::quad(Vec3::ZERO, Vec3::X, Vec3::Y));
        snapshot.add_object(mesh, Mat4::IDENTITY, MaterialId(3));

        assert!(matches!(
            SceneGeometry::build(&snapshot),
            Err(TraceError::UnknownMaterial { .. })
        ));
    }

    #[test]
    fn test_build_splits_meshes_and_skips_singular_transforms() {
        let mut snapshot = SceneSnapshot::new();
        let grey = snapshot.add_material(Material::diffuse(Color::splat(0.5)));

        // 10 triangles -> 3 primitives of at most 4 triangles
        let positions: Vec<Vec3> = (0..30).map(|i| Vec3::new(i as f32, (i % 3) as f32, 0.0)).collect();
        let indices: Vec<u32> = (0..30).collect();
        let strip = Arc::new(TriangleMesh::new(positions, indices).unwrap());
        snapshot.add_object(Arc::clone(&strip), Mat4::IDENTITY, grey);
        snapshot.add_object(strip, Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0)), grey);

        let geometry = SceneGeometry::build(&snapshot).unwrap();
        assert_eq!(geometry.bvh().primitive_count(), 3);
    }

    #[test]
    fn test_empty_scene_builds() {
        let geometry = SceneGeometry::build(&SceneSnapshot::new()).unwrap();
        assert!(geometry.bvh().is_empty());
        assert!(geometry.lights().is_empty());
    }
}
