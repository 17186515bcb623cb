//! Shapes: the linked segment sequence a rule operates on.
//!
//! A [`Shape`] is a doubly linked list stored as an arena. Nodes are addressed
//! by stable [`NodeId`]s, so match results can hold plain ids instead of live
//! references, and cloning a shape keeps every id valid in the clone.
//!
//! ```text
//!  id:    0          5      2      7          1
//!        [<] <----> [k] <-> [a] <-> [t] <--> [>]
//!        left                                right
//!        margin                              margin
//! ```
//!
//! Slot order is allocation order, not sequence order: `prev`/`next` links
//! (always left-to-right) define the sequence. Removed nodes stay in the arena
//! but are unlinked.

use crate::feature::FeatureStruct;

/// Stable index of a node inside one [`Shape`] (and its clones).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub const LEFT_MARGIN: NodeId = NodeId(0);
    pub const RIGHT_MARGIN: NodeId = NodeId(1);

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    LeftToRight,
    RightToLeft,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::LeftToRight => Direction::RightToLeft,
            Direction::RightToLeft => Direction::LeftToRight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// One of the two word-edge sentinels.
    Margin,
    Segment,
    /// A morpheme or word boundary marker.
    Boundary,
}

bitflags::bitflags! {
    /// Per-node markers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u8 {
        /// The node may be skipped when matching (reconstructed, uncertain).
        const OPTIONAL = 1 << 0;
        /// Already unapplied in this analysis pass.
        const SEARCHED = 1 << 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Annotation {
    pub fs: FeatureStruct,
    pub flags: NodeFlags,
    /// Index of the affix application that introduced this node
    /// (into `WordSynthesis::allomorphs`).
    pub morph: Option<usize>,
}

impl Annotation {
    pub fn new(fs: FeatureStruct) -> Self {
        Self { fs, flags: NodeFlags::empty(), morph: None }
    }

    pub fn optional(mut self) -> Self {
        self.flags |= NodeFlags::OPTIONAL;
        self
    }

    pub fn is_optional(&self) -> bool {
        self.flags.contains(NodeFlags::OPTIONAL)
    }

    pub fn is_searched(&self) -> bool {
        self.flags.contains(NodeFlags::SEARCHED)
    }
}

#[derive(Debug, Clone)]
pub struct ShapeNode {
    kind: NodeKind,
    annotation: Annotation,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

impl ShapeNode {
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn annotation(&self) -> &Annotation {
        &self.annotation
    }

    pub fn fs(&self) -> &FeatureStruct {
        &self.annotation.fs
    }
}

#[derive(Debug, Clone)]
pub struct Shape {
    nodes: Vec<ShapeNode>,
}

impl Default for Shape {
    fn default() -> Self {
        Self::new()
    }
}

impl Shape {
    /// An empty shape: just the two margins.
    pub fn new() -> Self {
        let margin = |prev, next| ShapeNode { kind: NodeKind::Margin, annotation: Annotation::default(), prev, next };
        Shape { nodes: vec![margin(None, Some(NodeId::RIGHT_MARGIN)), margin(Some(NodeId::LEFT_MARGIN), None)] }
    }

    /// A shape of plain segments, in order.
    pub fn from_segments(segments: impl IntoIterator<Item = FeatureStruct>) -> Self {
        let mut shape = Shape::new();
        for fs in segments {
            shape.push(NodeKind::Segment, Annotation::new(fs));
        }
        shape
    }

    /// The margin a traversal in `dir` starts from.
    pub fn begin(&self, dir: Direction) -> NodeId {
        match dir {
            Direction::LeftToRight => NodeId::LEFT_MARGIN,
            Direction::RightToLeft => NodeId::RIGHT_MARGIN,
        }
    }

    /// The margin a traversal in `dir` ends at.
    pub fn end(&self, dir: Direction) -> NodeId {
        self.begin(dir.opposite())
    }

    pub fn node(&self, id: NodeId) -> &ShapeNode {
        &self.nodes[id.index()]
    }

    pub fn annotation_mut(&mut self, id: NodeId) -> &mut Annotation {
        &mut self.nodes[id.index()].annotation
    }

    pub fn next(&self, id: NodeId, dir: Direction) -> Option<NodeId> {
        let node = &self.nodes[id.index()];
        match dir {
            Direction::LeftToRight => node.next,
            Direction::RightToLeft => node.prev,
        }
    }

    /// Append a node before the right margin.
    pub fn push(&mut self, kind: NodeKind, annotation: Annotation) -> NodeId {
        let last = self.nodes[NodeId::RIGHT_MARGIN.index()].prev.unwrap_or(NodeId::LEFT_MARGIN);
        self.add_after(last, kind, annotation)
    }

    /// Insert a node directly to the right of `after`.
    pub fn add_after(&mut self, after: NodeId, kind: NodeKind, annotation: Annotation) -> NodeId {
        debug_assert!(after != NodeId::RIGHT_MARGIN, "cannot insert after the right margin");
        let id = NodeId(self.nodes.len() as u32);
        let next = self.nodes[after.index()].next;
        self.nodes.push(ShapeNode { kind, annotation, prev: Some(after), next });
        self.nodes[after.index()].next = Some(id);
        if let Some(next) = next {
            self.nodes[next.index()].prev = Some(id);
        }
        id
    }

    /// Unlink a node. Margins cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if self.nodes[id.index()].kind == NodeKind::Margin {
            return false;
        }
        let (prev, next) = (self.nodes[id.index()].prev.take(), self.nodes[id.index()].next.take());
        if let Some(prev) = prev {
            self.nodes[prev.index()].next = next;
        }
        if let Some(next) = next {
            self.nodes[next.index()].prev = prev;
        }
        true
    }

    /// Non-margin nodes in `dir` order.
    pub fn iter(&self, dir: Direction) -> Nodes<'_> {
        Nodes { shape: self, cursor: self.next(self.begin(dir), dir), dir }
    }

    /// Number of linked non-margin nodes.
    pub fn len(&self) -> usize {
        self.iter(Direction::LeftToRight).count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter(Direction::LeftToRight).next().is_none()
    }

    /// Nodes from `start` to `end` inclusive, left to right.
    pub fn span_nodes(&self, start: NodeId, end: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            out.push(id);
            if id == end {
                break;
            }
            cursor = self.next(id, Direction::LeftToRight);
        }
        out
    }

    /// Re-link `order` (nodes currently sitting between `left` and `right`)
    /// so that they appear in exactly that sequence.
    pub fn relink(&mut self, left: NodeId, order: &[NodeId], right: NodeId) {
        let mut prev = left;
        for &id in order {
            self.nodes[prev.index()].next = Some(id);
            self.nodes[id.index()].prev = Some(prev);
            prev = id;
        }
        self.nodes[prev.index()].next = Some(right);
        self.nodes[right.index()].prev = Some(prev);
    }

    /// Mark every node from `start` to `end` (left to right) as searched.
    pub fn mark_searched(&mut self, start: NodeId, end: NodeId) {
        for id in self.span_nodes(start, end) {
            self.nodes[id.index()].annotation.flags |= NodeFlags::SEARCHED;
        }
    }

    pub fn clear_searched(&mut self) {
        for node in &mut self.nodes {
            node.annotation.flags.remove(NodeFlags::SEARCHED);
        }
    }

    /// Structural duplicate test: the same sequence of non-optional nodes.
    pub fn duplicates(&self, other: &Shape) -> bool {
        let mine = self.iter(Direction::LeftToRight).map(|id| self.node(id)).filter(|n| !n.annotation.is_optional());
        let theirs = other.iter(Direction::LeftToRight).map(|id| other.node(id)).filter(|n| !n.annotation.is_optional());
        mine.map(|n| (n.kind, &n.annotation.fs)).eq(theirs.map(|n| (n.kind, &n.annotation.fs)))
    }

    /// Feature structures of the linked non-margin nodes, left to right.
    pub fn feature_structs(&self) -> Vec<&FeatureStruct> {
        self.iter(Direction::LeftToRight).map(|id| self.node(id).fs()).collect()
    }
}

/// Iterator over a shape's non-margin nodes.
pub struct Nodes<'a> {
    shape: &'a Shape,
    cursor: Option<NodeId>,
    dir: Direction,
}

impl Iterator for Nodes<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.cursor?;
        if self.shape.node(id).kind == NodeKind::Margin {
            self.cursor = None;
            return None;
        }
        self.cursor = self.shape.next(id, self.dir);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fs, system};

    fn seq(shape: &Shape, dir: Direction) -> Vec<String> {
        shape.iter(dir).map(|id| shape.node(id).fs().to_string()).collect()
    }

    #[test]
    fn empty_shape_has_linked_margins() {
        let shape = Shape::new();
        assert!(shape.is_empty());
        assert_eq!(shape.next(NodeId::LEFT_MARGIN, Direction::LeftToRight), Some(NodeId::RIGHT_MARGIN));
        assert_eq!(shape.next(NodeId::RIGHT_MARGIN, Direction::RightToLeft), Some(NodeId::LEFT_MARGIN));
        assert_eq!(shape.next(NodeId::RIGHT_MARGIN, Direction::LeftToRight), None);
    }

    #[test]
    fn traversal_in_both_directions() {
        let sys = system();
        let shape = Shape::from_segments([fs(&sys, "[place:dorsal]"), fs(&sys, "[height:low]"), fs(&sys, "[place:coronal]")]);
        assert_eq!(shape.len(), 3);
        assert_eq!(seq(&shape, Direction::LeftToRight), ["[place:dorsal]", "[height:low]", "[place:coronal]"]);
        assert_eq!(seq(&shape, Direction::RightToLeft), ["[place:coronal]", "[height:low]", "[place:dorsal]"]);
    }

    #[test]
    fn add_after_and_remove_keep_links_consistent() {
        let sys = system();
        let mut shape = Shape::new();
        let a = shape.push(NodeKind::Segment, Annotation::new(fs(&sys, "[height:low]")));
        let c = shape.push(NodeKind::Segment, Annotation::new(fs(&sys, "[height:high]")));
        let b = shape.add_after(a, NodeKind::Boundary, Annotation::default());
        assert_eq!(shape.iter(Direction::LeftToRight).collect::<Vec<_>>(), vec![a, b, c]);
        assert!(shape.remove(b));
        assert_eq!(shape.iter(Direction::RightToLeft).collect::<Vec<_>>(), vec![c, a]);
        assert!(!shape.remove(NodeId::LEFT_MARGIN));
    }

    #[test]
    fn relink_reorders_a_span() {
        let sys = system();
        let shape0 = Shape::from_segments([fs(&sys, "[place:labial]"), fs(&sys, "[place:coronal]"), fs(&sys, "[place:dorsal]")]);
        let mut shape = shape0.clone();
        let ids: Vec<_> = shape.iter(Direction::LeftToRight).collect();
        shape.relink(NodeId::LEFT_MARGIN, &[ids[2], ids[0], ids[1]], NodeId::RIGHT_MARGIN);
        assert_eq!(seq(&shape, Direction::LeftToRight), ["[place:dorsal]", "[place:labial]", "[place:coronal]"]);
        assert_eq!(seq(&shape, Direction::RightToLeft), ["[place:coronal]", "[place:labial]", "[place:dorsal]"]);
        // The clone taken before relinking is unaffected.
        assert_eq!(seq(&shape0, Direction::LeftToRight), ["[place:labial]", "[place:coronal]", "[place:dorsal]"]);
    }

    #[test]
    fn searched_markers_cover_a_span_and_clear() {
        let sys = system();
        let mut shape = Shape::from_segments([fs(&sys, "[voice:+]"), fs(&sys, "[voice:-]"), fs(&sys, "[voice:+]")]);
        let ids: Vec<_> = shape.iter(Direction::LeftToRight).collect();
        shape.mark_searched(ids[0], ids[1]);
        let searched: Vec<bool> = ids.iter().map(|&id| shape.node(id).annotation().is_searched()).collect();
        assert_eq!(searched, [true, true, false]);
        shape.clear_searched();
        assert!(ids.iter().all(|&id| !shape.node(id).annotation().is_searched()));
    }

    #[test]
    fn duplicates_ignore_optional_nodes() {
        let sys = system();
        let segments = [fs(&sys, "[place:dorsal]"), fs(&sys, "[height:low]"), fs(&sys, "[place:coronal]"), fs(&sys, "[voice:-]")];
        let short = Shape::from_segments(segments.clone());
        let mut long = Shape::from_segments(segments);
        long.push(NodeKind::Segment, Annotation::new(fs(&sys, "[height:mid]")).optional());
        long.push(NodeKind::Segment, Annotation::new(fs(&sys, "[place:labial]")).optional());
        assert_eq!(short.len(), 4);
        assert_eq!(long.len(), 6);
        assert!(short.duplicates(&long));
        assert!(long.duplicates(&short));

        let other = Shape::from_segments([fs(&sys, "[place:dorsal]")]);
        assert!(!short.duplicates(&other));
    }
}
