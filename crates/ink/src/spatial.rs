//! Spatial index over committed strokes.
//!
//! A bounded-depth quadtree keyed by stroke bbox. It answers viewport and
//! lasso candidate queries without scanning every stroke on the page.
//!
//! A stroke whose bbox straddles a split line is stored in every child it
//! overlaps. [`SpatialIndex::query`] removes the resulting duplicates;
//! [`SpatialIndex::query_raw`] returns the leaf hits as they are.

use ink_config::IndexConfig;
use tracing::{debug, warn};

use crate::bbox::BoundingBox;
use crate::store::StrokeKey;

/// Depth and fan-out limits for the quadtree.
#[derive(Debug, Clone, Copy)]
pub struct QuadtreeConfig {
    /// Maximum depth of the tree (root is depth 0).
    pub max_depth: u32,
    /// A leaf holding more than this many items splits, depth permitting.
    pub max_objects_per_node: usize,
}

impl Default for QuadtreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_objects_per_node: 16,
        }
    }
}

/// An item stored in the tree: stroke key and its bbox.
#[derive(Debug, Clone, Copy)]
struct IndexItem {
    key: StrokeKey,
    bbox: BoundingBox,
}

/// A node in the quadtree (either internal or leaf).
#[derive(Debug)]
enum QuadNode {
    Leaf {
        bounds: BoundingBox,
        depth: u32,
        items: Vec<IndexItem>,
    },
    Internal {
        bounds: BoundingBox,
        depth: u32,
        children: Box<[QuadNode; 4]>,
    },
}

impl QuadNode {
    fn leaf(bounds: BoundingBox, depth: u32) -> Self {
        Self::Leaf {
            bounds,
            depth,
            items: Vec::new(),
        }
    }

    fn bounds(&self) -> &BoundingBox {
        match self {
            Self::Leaf { bounds, .. } | Self::Internal { bounds, .. } => bounds,
        }
    }
}

/// Quadtree over stroke bboxes.
#[derive(Debug)]
pub struct SpatialIndex {
    root: QuadNode,
    config: QuadtreeConfig,
}

impl SpatialIndex {
    /// Create an empty index covering `world`.
    pub fn new(world: BoundingBox) -> Self {
        Self::with_config(world, QuadtreeConfig::default())
    }

    pub fn with_config(world: BoundingBox, config: QuadtreeConfig) -> Self {
        Self {
            root: QuadNode::leaf(world, 0),
            config,
        }
    }

    pub fn from_index_config(config: &IndexConfig) -> Self {
        let world = BoundingBox::new(
            config.world_min_x,
            config.world_min_y,
            config.world_max_x,
            config.world_max_y,
        );
        Self::with_config(
            world,
            QuadtreeConfig {
                max_depth: config.max_depth,
                max_objects_per_node: config.max_objects_per_node,
            },
        )
    }

    pub fn world_bounds(&self) -> BoundingBox {
        *self.root.bounds()
    }

    /// Index a stroke.
    ///
    /// Returns false when the bbox lies entirely outside the world bounds;
    /// such a stroke can never be found by a query.
    pub fn insert(&mut self, key: StrokeKey, bbox: BoundingBox) -> bool {
        if !self.root.bounds().overlaps(&bbox) {
            warn!(
                "Stroke {:?} at {:?} lies outside index bounds {:?}, not indexed",
                key,
                bbox,
                self.root.bounds()
            );
            return false;
        }
        Self::insert_into_node(&mut self.root, IndexItem { key, bbox }, &self.config);
        true
    }

    fn insert_into_node(node: &mut QuadNode, item: IndexItem, config: &QuadtreeConfig) {
        match node {
            QuadNode::Internal { children, .. } => {
                for child in children.iter_mut() {
                    if child.bounds().overlaps(&item.bbox) {
                        Self::insert_into_node(child, item, config);
                    }
                }
            }
            QuadNode::Leaf {
                bounds,
                depth,
                items,
            } => {
                items.push(item);

                if items.len() > config.max_objects_per_node && *depth < config.max_depth {
                    let old_items = std::mem::take(items);
                    let (bounds, depth) = (*bounds, *depth);
                    let mut children: Box<[QuadNode; 4]> =
                        Box::new(std::array::from_fn(|i| QuadNode::leaf(bounds.quadrant(i), depth + 1)));

                    // Redistribute without splitting the new children further
                    for old in old_items {
                        for child in children.iter_mut() {
                            if let QuadNode::Leaf {
                                bounds: child_bounds,
                                items: child_items,
                                ..
                            } = child
                            {
                                if child_bounds.overlaps(&old.bbox) {
                                    child_items.push(old);
                                }
                            }
                        }
                    }

                    debug!("Quadtree node at depth {} split ({:?})", depth, bounds);
                    *node = QuadNode::Internal {
                        bounds,
                        depth,
                        children,
                    };
                }
            }
        }
    }

    /// Keys of strokes whose bbox overlaps `viewport`, deduplicated and in
    /// ascending key order.
    pub fn query(&self, viewport: &BoundingBox) -> Vec<StrokeKey> {
        let mut results = self.query_raw(viewport);
        results.sort_unstable();
        results.dedup();
        results
    }

    /// Every leaf hit for `viewport`, including repeats of strokes that
    /// span several leaves.
    pub fn query_raw(&self, viewport: &BoundingBox) -> Vec<StrokeKey> {
        let mut results = Vec::new();
        Self::query_node(&self.root, viewport, &mut results);
        results
    }

    fn query_node(node: &QuadNode, viewport: &BoundingBox, results: &mut Vec<StrokeKey>) {
        if !node.bounds().overlaps(viewport) {
            return;
        }
        match node {
            QuadNode::Leaf { items, .. } => {
                results.extend(
                    items
                        .iter()
                        .filter(|item| item.bbox.overlaps(viewport))
                        .map(|item| item.key),
                );
            }
            QuadNode::Internal { children, .. } => {
                for child in children.iter() {
                    Self::query_node(child, viewport, results);
                }
            }
        }
    }

    /// Remove a stroke from every leaf that holds it.
    ///
    /// `bbox` must be the bbox the stroke was inserted with; it limits the
    /// search to the leaves the stroke could be in.
    pub fn remove(&mut self, key: StrokeKey, bbox: &BoundingBox) -> bool {
        Self::remove_from_node(&mut self.root, key, bbox)
    }

    fn remove_from_node(node: &mut QuadNode, key: StrokeKey, bbox: &BoundingBox) -> bool {
        if !node.bounds().overlaps(bbox) {
            return false;
        }
        match node {
            QuadNode::Leaf { items, .. } => {
                let before = items.len();
                items.retain(|item| item.key != key);
                items.len() != before
            }
            QuadNode::Internal { children, .. } => {
                let mut removed = false;
                for child in children.iter_mut() {
                    removed |= Self::remove_from_node(child, key, bbox);
                }
                removed
            }
        }
    }

    /// Drop all items and children.
    pub fn clear(&mut self) {
        let bounds = *self.root.bounds();
        self.root = QuadNode::leaf(bounds, 0);
    }

    /// Number of stored references, counting a spanning stroke once per leaf.
    pub fn reference_count(&self) -> usize {
        Self::count_items(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.reference_count() == 0
    }

    fn count_items(node: &QuadNode) -> usize {
        match node {
            QuadNode::Leaf { items, .. } => items.len(),
            QuadNode::Internal { children, .. } => children.iter().map(Self::count_items).sum(),
        }
    }

    /// Deepest node depth currently in the tree.
    pub fn depth(&self) -> u32 {
        Self::node_depth(&self.root)
    }

    fn node_depth(node: &QuadNode) -> u32 {
        match node {
            QuadNode::Leaf { depth, .. } => *depth,
            QuadNode::Internal { children, depth, .. } => children
                .iter()
                .map(Self::node_depth)
                .max()
                .unwrap_or(*depth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StrokeArena;
    use crate::types::{Stroke, StrokeId, StrokePoint, StrokeStyle};
    use glam::DVec2;
    use std::sync::Arc;

    fn world() -> BoundingBox {
        BoundingBox::new(0.0, 0.0, 1024.0, 1024.0)
    }

    /// Issue real keys through an arena
    fn keys(n: usize) -> Vec<StrokeKey> {
        let mut arena = StrokeArena::new();
        (0..n)
            .map(|i| {
                let first = StrokePoint::new(DVec2::ZERO, 0.5, 0.0, 0);
                arena.insert(Arc::new(Stroke::begin(
                    StrokeId::new(format!("s{i}")),
                    StrokeStyle::default(),
                    first,
                )))
            })
            .collect()
    }

    fn small_box(x: f64, y: f64) -> BoundingBox {
        BoundingBox::new(x, y, x + 4.0, y + 4.0)
    }

    #[test]
    fn test_insert_and_query() {
        let mut index = SpatialIndex::new(world());
        let k = keys(2);
        assert!(index.insert(k[0], small_box(10.0, 10.0)));
        assert!(index.insert(k[1], small_box(900.0, 900.0)));

        assert_eq!(index.query(&BoundingBox::new(0.0, 0.0, 100.0, 100.0)), vec![k[0]]);
        assert_eq!(index.query(&world()).len(), 2);
        assert!(index.query(&BoundingBox::new(400.0, 400.0, 500.0, 500.0)).is_empty());
    }

    #[test]
    fn test_out_of_bounds_dropped() {
        let mut index = SpatialIndex::new(world());
        let k = keys(1);
        assert!(!index.insert(k[0], small_box(5000.0, 5000.0)));
        assert!(index.is_empty());
    }

    #[test]
    fn test_split_keeps_everything_findable() {
        let config = QuadtreeConfig {
            max_depth: 6,
            max_objects_per_node: 4,
        };
        let mut index = SpatialIndex::with_config(world(), config);
        let k = keys(200);
        for (i, key) in k.iter().enumerate() {
            let x = (i % 20) as f64 * 50.0;
            let y = (i / 20) as f64 * 100.0;
            index.insert(*key, small_box(x, y));
        }

        assert!(index.depth() > 0);
        assert!(index.depth() <= config.max_depth);
        assert_eq!(index.query(&world()), k);
    }

    #[test]
    fn test_spanning_stroke_referenced_from_several_leaves() {
        let config = QuadtreeConfig {
            max_depth: 4,
            max_objects_per_node: 1,
        };
        let mut index = SpatialIndex::with_config(world(), config);
        let k = keys(3);
        index.insert(k[0], small_box(10.0, 10.0));
        index.insert(k[1], small_box(1000.0, 1000.0));
        // Crosses the root's center lines
        index.insert(k[2], BoundingBox::new(500.0, 500.0, 530.0, 530.0));

        let raw = index.query_raw(&world());
        assert!(raw.iter().filter(|key| **key == k[2]).count() > 1);
        assert_eq!(index.query(&world()), k);
    }

    #[test]
    fn test_remove_is_exhaustive() {
        let config = QuadtreeConfig {
            max_depth: 4,
            max_objects_per_node: 1,
        };
        let mut index = SpatialIndex::with_config(world(), config);
        let k = keys(3);
        let spanning = BoundingBox::new(500.0, 500.0, 530.0, 530.0);
        index.insert(k[0], small_box(10.0, 10.0));
        index.insert(k[1], small_box(1000.0, 1000.0));
        index.insert(k[2], spanning);

        assert!(index.remove(k[2], &spanning));
        assert!(!index.query_raw(&world()).contains(&k[2]));
        assert!(!index.remove(k[2], &spanning));
        assert_eq!(index.query(&world()), vec![k[0], k[1]]);
    }

    #[test]
    fn test_max_depth_bounds_splitting() {
        let config = QuadtreeConfig {
            max_depth: 2,
            max_objects_per_node: 1,
        };
        let mut index = SpatialIndex::with_config(world(), config);
        // All in the same spot: splitting cannot separate them
        for key in keys(10) {
            index.insert(key, small_box(1.0, 1.0));
        }
        assert_eq!(index.depth(), 2);
        assert_eq!(index.query(&small_box(1.0, 1.0)).len(), 10);
    }

    #[test]
    fn test_clear() {
        let mut index = SpatialIndex::new(world());
        for key in keys(40) {
            index.insert(key, small_box(3.0, 3.0));
        }
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.depth(), 0);
        assert_eq!(index.world_bounds(), world());
    }
}
