//! Frame graph: the live forest of `child → parent` edges.
//!
//! Every child frame has at most one edge; a newer update for the same child
//! replaces the old one. Queries walk each frame up to its root, meet at the
//! lowest common ancestor and compose the two partial chains.
//!
//! # Example
//!
//! ```rust
//! use tfboard_perception::frame_graph::{EdgeUpdate, FrameGraph};
//! use tfboard_perception::transform::{Quaternion, Transform3D, Vec3};
//!
//! let mut graph = FrameGraph::new();
//! graph.update(
//!     [
//!         EdgeUpdate::new("base_link", "map",
//!             Transform3D::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity())),
//!         EdgeUpdate::new("sensor", "base_link",
//!             Transform3D::new(Vec3::new(0.0, 1.0, 0.0), Quaternion::identity())),
//!     ],
//!     false,
//! );
//!
//! let t = graph.get_transform("sensor", "map").unwrap();
//! assert!((t.translation.x - 1.0).abs() < 1e-9);
//! assert!((t.translation.y - 1.0).abs() < 1e-9);
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};

use thiserror::Error;
use tfboard_types::TfMessage;
use tracing::{debug, warn};

use crate::transform::{Quaternion, Transform3D};

/// Default bound on the number of hops a single upward walk may take.
pub const MAX_FRAME_DEPTH: usize = 256;

/// Two edges are considered unchanged when every component differs by at
/// most this much.
const CHANGE_EPSILON: f64 = 1e-6;

/// Wire quaternions shorter than this are replaced by the identity.
const MIN_QUATERNION_NORM: f64 = 1e-3;

/// Strip one leading `/` and surrounding whitespace from a frame name.
pub fn normalize_frame(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name).trim()
}

/// The recorded relationship of one child frame to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge<'a> {
    pub parent: &'a str,
    /// Maps child coordinates into parent coordinates.
    pub transform: Transform3D,
    /// Learned from a latched (`/tf_static`) update.
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct StoredEdge {
    parent: String,
    transform: Transform3D,
    is_static: bool,
}

impl StoredEdge {
    fn differs_from(&self, parent: &str, t: &Transform3D) -> bool {
        if self.parent != parent {
            return true;
        }
        let a = &self.transform;
        let deltas = [
            a.translation.x - t.translation.x,
            a.translation.y - t.translation.y,
            a.translation.z - t.translation.z,
            a.rotation.x - t.rotation.x,
            a.rotation.y - t.rotation.y,
            a.rotation.z - t.rotation.z,
            a.rotation.w - t.rotation.w,
        ];
        deltas.iter().any(|d| d.abs() > CHANGE_EPSILON)
    }
}

/// One incoming `child → parent` record.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeUpdate {
    pub child: String,
    pub parent: String,
    pub transform: Transform3D,
}

impl EdgeUpdate {
    pub fn new(child: impl Into<String>, parent: impl Into<String>, transform: Transform3D) -> Self {
        Self {
            child: child.into(),
            parent: parent.into(),
            transform,
        }
    }
}

/// Why two frames cannot be related.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("frames lie in disjoint trees (roots '{source_root}' and '{target_root}')")]
    DisjointTrees {
        source_root: String,
        target_root: String,
    },

    #[error("cycle detected at frame '{frame}'")]
    Cycle { frame: String },

    #[error("chain from '{frame}' exceeds {max_depth} hops")]
    DepthExceeded { frame: String, max_depth: usize },
}

/// Upward walk from one frame: `frames[0]` is the start, `frames.last()` the
/// root, and `hops[i]` is the edge from `frames[i]` to `frames[i + 1]`.
struct Ancestry<'a> {
    frames: Vec<&'a str>,
    hops: Vec<Transform3D>,
}

impl<'a> Ancestry<'a> {
    fn root(&self) -> &'a str {
        self.frames[self.frames.len() - 1]
    }

    /// Transform from `frames[0]` to `frames[upto]`, ascending one hop at a
    /// time with the child side composed on the right.
    fn compose_to(&self, upto: usize) -> Transform3D {
        self.hops[..upto]
            .iter()
            .fold(Transform3D::identity(), |acc, hop| hop.compose(acc))
    }
}

/// A forest of named reference frames.
///
/// Frames exist implicitly: a name is a frame as soon as it appears as a
/// child or a parent. The graph never shrinks.
#[derive(Debug)]
pub struct FrameGraph {
    /// `edges[child] = edge to its parent`
    edges: HashMap<String, StoredEdge>,
    version: u64,
    max_depth: usize,
}

impl Default for FrameGraph {
    fn default() -> Self {
        Self::with_max_depth(MAX_FRAME_DEPTH)
    }
}

impl FrameGraph {
    /// Create an empty graph with the default traversal bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty graph whose upward walks stop after `max_depth` hops.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            edges: HashMap::new(),
            version: 0,
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Incremented every time an update actually changes an edge.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of recorded edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// The edge recorded for `child`, if any.
    pub fn edge(&self, child: &str) -> Option<Edge<'_>> {
        self.edges.get(normalize_frame(child)).map(|e| Edge {
            parent: &e.parent,
            transform: e.transform,
            is_static: e.is_static,
        })
    }

    /// Record a batch of edges. Last write wins per child.
    ///
    /// Records with an empty name or with `child == parent` are skipped.
    /// Returns `true` (and bumps [`version`](Self::version)) when any edge
    /// was added or changed.
    pub fn update(&mut self, edges: impl IntoIterator<Item = EdgeUpdate>, is_static: bool) -> bool {
        let mut changed = false;
        for update in edges {
            let child = normalize_frame(&update.child);
            let parent = normalize_frame(&update.parent);
            if child.is_empty() || parent.is_empty() {
                debug!(child = %update.child, parent = %update.parent, "skipping edge with empty frame name");
                continue;
            }
            if child == parent {
                debug!(frame = child, "skipping self-edge");
                continue;
            }

            let is_new = self
                .edges
                .get(child)
                .is_none_or(|existing| existing.differs_from(parent, &update.transform));
            changed |= is_new;

            self.edges.insert(
                child.to_string(),
                StoredEdge {
                    parent: parent.to_string(),
                    transform: update.transform,
                    is_static,
                },
            );
        }
        if changed {
            self.version += 1;
        }
        changed
    }

    /// Feed a `tf2_msgs/TFMessage` into the graph.
    ///
    /// Wire rotations are normalized here; a near-zero quaternion is replaced
    /// by the identity rotation.
    pub fn ingest(&mut self, msg: &TfMessage, is_static: bool) -> bool {
        let updates = msg.transforms.iter().map(|stamped| {
            let mut transform = Transform3D::from(&stamped.transform);
            transform.rotation = transform
                .rotation
                .normalized(MIN_QUATERNION_NORM)
                .unwrap_or_else(|| {
                    warn!(
                        child = %stamped.child_frame_id,
                        "degenerate rotation in transform; using identity"
                    );
                    Quaternion::identity()
                });
            EdgeUpdate::new(
                stamped.child_frame_id.as_str(),
                stamped.header.frame_id.as_str(),
                transform,
            )
        });
        self.update(updates, is_static)
    }

    /// Sorted, de-duplicated names of every frame appearing as a child or a
    /// parent.
    pub fn frames(&self) -> Vec<String> {
        let mut set = BTreeSet::new();
        for (child, edge) in &self.edges {
            set.insert(child.as_str());
            set.insert(edge.parent.as_str());
        }
        set.into_iter().map(str::to_string).collect()
    }

    /// The transform mapping coordinates in `source` into coordinates in
    /// `target`, or `None` when the two frames cannot be related.
    pub fn get_transform(&self, source: &str, target: &str) -> Option<Transform3D> {
        match self.try_get_transform(source, target) {
            Ok(t) => Some(t),
            Err(e) => {
                debug!(source_frame = source, target_frame = target, error = %e, "transform unavailable");
                None
            }
        }
    }

    /// Like [`get_transform`](Self::get_transform) but reports why a lookup
    /// failed.
    pub fn try_get_transform(&self, source: &str, target: &str) -> Result<Transform3D, LookupError> {
        let source = normalize_frame(source);
        let target = normalize_frame(target);
        if source.is_empty() || target.is_empty() || source == target {
            return Ok(Transform3D::identity());
        }

        let up_source = self.ancestry(source)?;
        let up_target = self.ancestry(target)?;
        if up_source.root() != up_target.root() {
            return Err(LookupError::DisjointTrees {
                source_root: up_source.root().to_string(),
                target_root: up_target.root().to_string(),
            });
        }

        // Shared roots guarantee a hit; the root itself is in both walks.
        let marked: HashSet<&str> = up_source.frames.iter().copied().collect();
        let target_idx = up_target
            .frames
            .iter()
            .position(|f| marked.contains(f))
            .unwrap_or(up_target.frames.len() - 1);
        let lca = up_target.frames[target_idx];
        let source_idx = up_source
            .frames
            .iter()
            .position(|f| *f == lca)
            .unwrap_or(up_source.frames.len() - 1);

        let source_to_lca = up_source.compose_to(source_idx);
        let target_to_lca = up_target.compose_to(target_idx);
        Ok(target_to_lca.invert().compose(source_to_lca))
    }

    /// Whether [`get_transform`](Self::get_transform) would succeed between
    /// two non-empty frame names.
    pub fn can_transform(&self, source: &str, target: &str) -> bool {
        let source = normalize_frame(source);
        let target = normalize_frame(target);
        !source.is_empty() && !target.is_empty() && self.try_get_transform(source, target).is_ok()
    }

    fn ancestry<'a>(&'a self, start: &'a str) -> Result<Ancestry<'a>, LookupError> {
        let mut frames = vec![start];
        let mut hops = Vec::new();
        let mut visited: HashSet<&str> = HashSet::from([start]);
        let mut current = start;

        while let Some(edge) = self.edges.get(current) {
            if hops.len() >= self.max_depth {
                return Err(LookupError::DepthExceeded {
                    frame: start.to_string(),
                    max_depth: self.max_depth,
                });
            }
            let parent = edge.parent.as_str();
            if !visited.insert(parent) {
                return Err(LookupError::Cycle {
                    frame: parent.to_string(),
                });
            }
            hops.push(edge.transform);
            frames.push(parent);
            current = parent;
        }

        Ok(Ancestry { frames, hops })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
