//! The node/process/device tree shown in the track sidebar.
//!
//! Modeled as a flat arena addressed by id, with a side `HashMap<u64, usize>`
//! index from node id to arena slot — replacing the C++ implementation's
//! pointer-owning tree (§9 "Replacing pointer-graph ownership"). Parent/child
//! links are plain ids, so the arena never needs `Rc`/`RefCell` cycles.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Host,
    Process,
    Device,
    InstrumentedThread,
    SampledThread,
    Queue,
    Stream,
    Counter,
    /// None of `track_{queue,stream,instrumented_thread,sampled_thread,counter}`
    /// returned a non-nil object for this track's topology binding (spec §4.2.1).
    /// Callers are expected to log this at the load call site; it is never
    /// silently treated as one of the other kinds.
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: u64,
    pub kind: NodeKind,
    pub name: String,
    pub parent: Option<u64>,
    pub children: Vec<u64>,
    /// Set on leaf nodes only: the timeline track carrying this node's data.
    pub track_id: Option<u64>,
}

#[derive(Debug, Default)]
pub struct Topology {
    nodes: Vec<Node>,
    index: HashMap<u64, usize>,
    roots: Vec<u64>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node, linking it under its declared parent (if any).
    /// Panics if `node.parent` names an id not already present — callers are
    /// expected to insert a topology top-down.
    pub fn insert(&mut self, node: Node) {
        let id = node.id;
        let parent = node.parent;
        self.index.insert(id, self.nodes.len());
        self.nodes.push(node);
        match parent {
            Some(parent_id) => {
                let parent_idx = *self
                    .index
                    .get(&parent_id)
                    .unwrap_or_else(|| panic!("parent {parent_id} inserted after child {id}"));
                self.nodes[parent_idx].children.push(id);
            }
            None => self.roots.push(id),
        }
    }

    pub fn get(&self, id: u64) -> Option<&Node> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn children(&self, id: u64) -> &[u64] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn roots(&self) -> &[u64] {
        &self.roots
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.children.is_empty())
    }

    pub fn track_id_for(&self, id: u64) -> Option<u64> {
        self.get(id).and_then(|n| n.track_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64, parent: Option<u64>, kind: NodeKind) -> Node {
        Node {
            id,
            kind,
            name: format!("n{id}"),
            parent,
            children: Vec::new(),
            track_id: None,
        }
    }

    #[test]
    fn roots_and_children_are_tracked_on_insert() {
        let mut topo = Topology::new();
        topo.insert(node(1, None, NodeKind::Host));
        topo.insert(node(2, Some(1), NodeKind::Process));
        topo.insert(node(3, Some(1), NodeKind::Process));
        assert_eq!(topo.roots(), &[1]);
        assert_eq!(topo.children(1), &[2, 3]);
        assert!(topo.children(2).is_empty());
    }

    #[test]
    fn leaves_excludes_nodes_with_children() {
        let mut topo = Topology::new();
        topo.insert(node(1, None, NodeKind::Host));
        topo.insert(node(2, Some(1), NodeKind::Process));
        let leaf_ids: Vec<u64> = topo.leaves().map(|n| n.id).collect();
        assert_eq!(leaf_ids, vec![2]);
    }

    #[test]
    fn track_id_for_resolves_leaf_track() {
        let mut topo = Topology::new();
        let mut leaf = node(2, None, NodeKind::Queue);
        leaf.track_id = Some(42);
        topo.insert(leaf);
        assert_eq!(topo.track_id_for(2), Some(42));
        assert_eq!(topo.track_id_for(999), None);
    }
}
