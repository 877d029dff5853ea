//! [BSP](https://en.wikipedia.org/wiki/Binary_space_partitioning) tree node structure and
//! operations
//!
//! Every operation walks the tree with an explicit work stack, so a tree as
//! deep as its polygon count (coplanar-heavy or adversarially ordered input)
//! cannot exhaust the call stack.

use crate::float_types::{EPSILON, Real};
use crate::plane::Plane;
use crate::polygon::Polygon;
use crate::vertex::{CsgVertex, Vertex};

/// A BSP tree node, containing polygons plus optional front/back subtrees
#[derive(Debug)]
pub struct Node<S: Clone, V: CsgVertex = Vertex> {
    /// Splitting plane for this node *or* **None** for an empty node.
    pub plane: Option<Plane>,

    /// Subtree for the *front* half-space.
    pub front: Option<Box<Node<S, V>>>,

    /// Subtree for the *back* half-space.
    pub back: Option<Box<Node<S, V>>>,

    /// Polygons that lie on `plane`, in either orientation.
    pub polygons: Vec<Polygon<S, V>>,

    /// Classification tolerance, inherited by child nodes.
    pub epsilon: Real,
}

impl<S: Clone, V: CsgVertex> Default for Node<S, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone, V: CsgVertex> Node<S, V> {
    /// Create a new empty BSP node with the default tolerance.
    pub const fn new() -> Self {
        Self::with_epsilon(EPSILON)
    }

    pub const fn with_epsilon(epsilon: Real) -> Self {
        Self {
            plane: None,
            front: None,
            back: None,
            polygons: Vec::new(),
            epsilon,
        }
    }

    /// Build a tree from clones of `polygons`.
    pub fn from_polygons(polygons: &[Polygon<S, V>], epsilon: Real) -> Self {
        let mut node = Self::with_epsilon(epsilon);
        node.build_owned(polygons.to_vec());
        node
    }

    /// Convert solid space to empty space and vice versa.
    pub fn invert(&mut self) {
        let mut nodes = 0usize;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            nodes += 1;
            for p in &mut node.polygons {
                p.flip();
            }
            if let Some(plane) = node.plane.as_mut() {
                plane.flip();
            }
            std::mem::swap(&mut node.front, &mut node.back);

            if let Some(front) = node.front.as_deref_mut() {
                stack.push(front);
            }
            if let Some(back) = node.back.as_deref_mut() {
                stack.push(back);
            }
        }
        log::trace!("bsp invert: {nodes} nodes");
    }

    /// Return the parts of `polygons` that lie outside the solid this tree
    /// bounds.
    pub fn clip_polygons(&self, polygons: &[Polygon<S, V>]) -> Vec<Polygon<S, V>> {
        self.clip_owned(polygons.to_vec())
    }

    fn clip_owned(&self, polygons: Vec<Polygon<S, V>>) -> Vec<Polygon<S, V>> {
        let input = polygons.len();
        let mut result = Vec::with_capacity(polygons.len());
        let mut stack = vec![(self, polygons)];

        while let Some((node, polygons)) = stack.pop() {
            // nothing is inside an empty tree
            let Some(plane) = node.plane.as_ref() else {
                result.extend(polygons);
                continue;
            };

            let mut front = Vec::new();
            let mut back = Vec::new();
            for polygon in polygons {
                let (coplanar_front, coplanar_back, f, b) =
                    plane.split_polygon(polygon, node.epsilon);
                front.extend(coplanar_front);
                front.extend(f);
                back.extend(coplanar_back);
                back.extend(b);
            }

            // Back is pushed first so the front subtree is finished, and
            // emitted, before it. Without a back child the fragments are
            // inside the solid and dropped.
            if let Some(b) = node.back.as_deref() {
                stack.push((b, back));
            }
            match node.front.as_deref() {
                Some(f) => stack.push((f, front)),
                None => result.extend(front),
            }
        }

        log::trace!("bsp clip: {input} polygons in, {} out", result.len());
        result
    }

    /// Remove all polygons in this tree that are inside the other tree `bsp`.
    pub fn clip_to(&mut self, bsp: &Node<S, V>) {
        let mut nodes = 0usize;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            nodes += 1;
            let polygons = std::mem::take(&mut node.polygons);
            node.polygons = bsp.clip_owned(polygons);

            if let Some(front) = node.front.as_deref_mut() {
                stack.push(front);
            }
            if let Some(back) = node.back.as_deref_mut() {
                stack.push(back);
            }
        }
        log::trace!("bsp clip_to: {nodes} nodes");
    }

    /// Return all polygons in this tree, node first, then front, then back.
    pub fn all_polygons(&self) -> Vec<Polygon<S, V>> {
        let mut result = Vec::new();
        let mut stack = vec![self];

        while let Some(node) = stack.pop() {
            result.extend_from_slice(&node.polygons);

            if let Some(back) = node.back.as_deref() {
                stack.push(back);
            }
            if let Some(front) = node.front.as_deref() {
                stack.push(front);
            }
        }

        log::trace!("bsp all_polygons: {}", result.len());
        result
    }

    /// Build a BSP tree out of `polygons`. On an existing tree the new
    /// polygons are filtered down and become new nodes at the bottom. Each set
    /// is partitioned by the plane of its first polygon.
    pub fn build(&mut self, polygons: &[Polygon<S, V>]) {
        self.build_owned(polygons.to_vec());
    }

    fn build_owned(&mut self, polygons: Vec<Polygon<S, V>>) {
        log::trace!("bsp build: {} polygons", polygons.len());
        let mut stack = vec![(self, polygons)];

        while let Some((node, polygons)) = stack.pop() {
            if polygons.is_empty() {
                continue;
            }
            let plane = node
                .plane
                .get_or_insert_with(|| polygons[0].plane.clone())
                .clone();

            let mut front = Vec::new();
            let mut back = Vec::new();
            for polygon in polygons {
                let (coplanar_front, coplanar_back, f, b) =
                    plane.split_polygon(polygon, node.epsilon);
                node.polygons.extend(coplanar_front);
                node.polygons.extend(coplanar_back);
                front.extend(f);
                back.extend(b);
            }

            let Node {
                front: front_child,
                back: back_child,
                epsilon,
                ..
            } = node;
            let epsilon = *epsilon;

            if !front.is_empty() {
                let child =
                    front_child.get_or_insert_with(|| Box::new(Node::with_epsilon(epsilon)));
                stack.push((child.as_mut(), front));
            }
            if !back.is_empty() {
                let child =
                    back_child.get_or_insert_with(|| Box::new(Node::with_epsilon(epsilon)));
                stack.push((child.as_mut(), back));
            }
        }
    }

    /// Number of nodes along the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, d)) = stack.pop() {
            deepest = deepest.max(d);
            stack.extend(node.front.as_deref().map(|n| (n, d + 1)));
            stack.extend(node.back.as_deref().map(|n| (n, d + 1)));
        }
        deepest
    }
}

impl<S: Clone, V: CsgVertex> Drop for Node<S, V> {
    // Unlink children onto a stack so dropping a deep tree does not recurse.
    fn drop(&mut self) {
        let mut stack: Vec<Box<Node<S, V>>> = Vec::new();
        stack.extend(self.front.take());
        stack.extend(self.back.take());
        while let Some(mut node) = stack.pop() {
            stack.extend(node.front.take());
            stack.extend(node.back.take());
        }
    }
}
