//! Quadtree broad phase
//!
//! Rebuilt from scratch every tick: objects move every frame, so the tree
//! only supports insert, query and clear. Items live in the smallest node
//! whose region fully contains their bounds; items straddling a split line
//! (or lying outside the world) stay in the parent.

use super::geom::BoundingBox;
use crate::consts::{QUADTREE_CAPACITY, QUADTREE_MAX_DEPTH};

#[derive(Debug, Clone, Copy)]
struct Entry<T> {
    item: T,
    bounds: BoundingBox,
}

#[derive(Debug, Clone)]
struct Node<T> {
    bounds: BoundingBox,
    depth: u32,
    items: Vec<Entry<T>>,
    children: Option<Box<[Node<T>; 4]>>,
}

impl<T: Copy> Node<T> {
    fn new(bounds: BoundingBox, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            items: Vec::new(),
            children: None,
        }
    }

    fn insert(&mut self, entry: Entry<T>, capacity: usize, max_depth: u32) {
        if let Some(children) = self.children.as_mut() {
            if let Some(child) = children.iter_mut().find(|c| c.bounds.contains(&entry.bounds)) {
                child.insert(entry, capacity, max_depth);
            } else {
                self.items.push(entry);
            }
            return;
        }

        self.items.push(entry);
        if self.items.len() > capacity && self.depth < max_depth {
            self.split(capacity, max_depth);
        }
    }

    fn split(&mut self, capacity: usize, max_depth: u32) {
        let depth = self.depth + 1;
        let [a, b, c, d] = self.bounds.quadrants();
        self.children = Some(Box::new([
            Node::new(a, depth),
            Node::new(b, depth),
            Node::new(c, depth),
            Node::new(d, depth),
        ]));

        // Redistribute; straddlers stay here
        for entry in std::mem::take(&mut self.items) {
            self.insert(entry, capacity, max_depth);
        }
    }

    fn query(&self, region: &BoundingBox, out: &mut Vec<T>) {
        out.extend(
            self.items
                .iter()
                .filter(|e| e.bounds.intersects(region))
                .map(|e| e.item),
        );
        if let Some(children) = &self.children {
            for child in children.iter() {
                if child.bounds.intersects(region) {
                    child.query(region, out);
                }
            }
        }
    }

    fn node_count(&self) -> usize {
        1 + self
            .children
            .as_ref()
            .map_or(0, |c| c.iter().map(Node::node_count).sum())
    }
}

/// Region quadtree over items with bounding boxes
#[derive(Debug, Clone)]
pub struct QuadTree<T> {
    root: Node<T>,
    capacity: usize,
    max_depth: u32,
    len: usize,
}

impl<T: Copy> QuadTree<T> {
    pub fn new(bounds: BoundingBox) -> Self {
        Self::with_capacity(bounds, QUADTREE_CAPACITY, QUADTREE_MAX_DEPTH)
    }

    pub fn with_capacity(bounds: BoundingBox, capacity: usize, max_depth: u32) -> Self {
        Self {
            root: Node::new(bounds, 0),
            capacity: capacity.max(1),
            max_depth,
            len: 0,
        }
    }

    /// World region covered by the root
    pub fn bounds(&self) -> BoundingBox {
        self.root.bounds
    }

    pub fn insert(&mut self, item: T, bounds: BoundingBox) {
        self.root
            .insert(Entry { item, bounds }, self.capacity, self.max_depth);
        self.len += 1;
    }

    /// Items whose bounds intersect `region`
    pub fn query(&self, region: &BoundingBox) -> Vec<T> {
        let mut out = Vec::new();
        self.root.query(region, &mut out);
        out
    }

    /// Drop every node except the root
    pub fn clear(&mut self) {
        self.root.items.clear();
        self.root.children = None;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total nodes including the root
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }
}
