//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! Binary tree over [`Primitive`]s, built by median split with the split
//! axis cycling x, y, z by depth. The primitive list is reordered during the
//! build so every leaf refers to a contiguous range of it.

use std::ops::Range;
use std::time::Instant;

use lumen_math::{Aabb, Interval, Ray};

use crate::hittable::{Hit, Hittable};
use crate::primitive::Primitive;

/// Nodes deeper than this become leaves regardless of their size.
pub const MAX_DEPTH: usize = 32;

/// BVH node - either an internal node with two children or a leaf.
#[derive(Debug)]
pub enum BvhNode {
    Internal {
        bounds: Aabb,
        axis: usize,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
    /// Primitives `primitives` of the owning [`Bvh`]. Holds a single
    /// primitive unless the depth limit was reached.
    Leaf { bounds: Aabb, primitives: Range<usize> },
}

impl BvhNode {
    pub fn bounds(&self) -> Aabb {
        match self {
            BvhNode::Internal { bounds, .. } | BvhNode::Leaf { bounds, .. } => *bounds,
        }
    }
}

#[derive(Default)]
struct BuildStats {
    nodes: usize,
    leaves: usize,
    max_depth: usize,
}

/// A built hierarchy and the primitives it indexes.
pub struct Bvh {
    root: Option<BvhNode>,
    primitives: Vec<Primitive>,
    node_count: usize,
    depth: usize,
}

impl Bvh {
    /// Build a BVH. An empty primitive list yields an empty hierarchy that
    /// every ray misses.
    pub fn build(mut primitives: Vec<Primitive>) -> Self {
        if primitives.is_empty() {
            return Self {
                root: None,
                primitives,
                node_count: 0,
                depth: 0,
            };
        }

        let start = Instant::now();
        let mut stats = BuildStats::default();
        let root = Self::build_node(&mut primitives, 0, 0, &mut stats);

        log::info!(
            "Built BVH: {} primitives, {} nodes, {} leaves, depth {} in {:.2?}",
            primitives.len(),
            stats.nodes,
            stats.leaves,
            stats.max_depth,
            start.elapsed()
        );

        Self {
            root: Some(root),
            primitives,
            node_count: stats.nodes,
            depth: stats.max_depth,
        }
    }

    fn build_node(
        primitives: &mut [Primitive],
        offset: usize,
        depth: usize,
        stats: &mut BuildStats,
    ) -> BvhNode {
        stats.nodes += 1;
        stats.max_depth = stats.max_depth.max(depth);

        let bounds = primitives
            .iter()
            .fold(Aabb::EMPTY, |acc, p| acc.union(&p.bounds()));

        if primitives.len() == 1 || depth > MAX_DEPTH {
            if primitives.len() > 1 {
                log::debug!(
                    "BVH depth limit reached, leaf holds {} primitives",
                    primitives.len()
                );
            }
            stats.leaves += 1;
            return BvhNode::Leaf {
                bounds,
                primitives: offset..offset + primitives.len(),
            };
        }

        let axis = depth % 3;
        primitives.sort_unstable_by(|a, b| a.centroid()[axis].total_cmp(&b.centroid()[axis]));

        let mid = primitives.len() / 2;
        let (left, right) = primitives.split_at_mut(mid);
        let left = Self::build_node(left, offset, depth + 1, stats);
        let right = Self::build_node(right, offset + mid, depth + 1, stats);

        BvhNode::Internal {
            bounds,
            axis,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn root(&self) -> Option<&BvhNode> {
        self.root.as_ref()
    }

    /// Primitives in leaf order.
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Depth of the deepest node; the root is depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// True if anything blocks `ray` within `ray_t`. Stops at the first hit.
    pub fn occluded(&self, ray: &Ray, ray_t: Interval) -> bool {
        match &self.root {
            Some(root) => self.occluded_node(root, ray, ray_t),
            None => false,
        }
    }

    fn occluded_node(&self, node: &BvhNode, ray: &Ray, ray_t: Interval) -> bool {
        if node.bounds().hit(ray, ray_t).is_none() {
            return false;
        }
        match node {
            BvhNode::Leaf { primitives, .. } => self.primitives[primitives.clone()]
                .iter()
                .any(|p| p.intersect(ray, ray_t).is_some()),
            BvhNode::Internal { left, right, .. } => {
                self.occluded_node(left, ray, ray_t) || self.occluded_node(right, ray, ray_t)
            }
        }
    }

    fn intersect_node(
        &self,
        node: &BvhNode,
        ray: &Ray,
        ray_t: &mut Interval,
        closest: &mut Option<Hit>,
    ) {
        // Rejects nodes that start beyond the best hit so far.
        if node.bounds().hit(ray, *ray_t).is_none() {
            return;
        }
        match node {
            BvhNode::Leaf { primitives, .. } => {
                for primitive in &self.primitives[primitives.clone()] {
                    if let Some(hit) = primitive.intersect(ray, *ray_t) {
                        *ray_t = ray_t.with_max(hit.t);
                        *closest = Some(hit);
                    }
                }
            }
            BvhNode::Internal {
                axis, left, right, ..
            } => {
                // Near child first along the split axis.
                let (near, far) = if ray.sign()[*axis] == 0 {
                    (left, right)
                } else {
                    (right, left)
                };
                self.intersect_node(near, ray, ray_t, closest);
                self.intersect_node(far, ray, ray_t, closest);
            }
        }
    }
}

impl Hittable for Bvh {
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Hit> {
        let root = self.root.as_ref()?;
        let mut ray_t = ray_t;
        let mut closest = None;
        self.intersect_node(root, ray, &mut ray_t, &mut closest);
        closest
    }

    fn bounds(&self) -> Aabb {
        self.root.as_ref().map_or(Aabb::EMPTY, BvhNode::bounds)
    }
}
