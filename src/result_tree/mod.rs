//! The chunked, pointer-stable result tree.
//!
//! Field-execution tasks write into this tree concurrently and out of
//! order: a list element three levels deep can finish before its parent
//! object has finished collecting siblings. Two properties make that safe
//! without a lock per node:
//!
//! - **Pointer stability.** Every node lives in a [`chunked_list::ChunkedList`]
//!   slot that is never moved once allocated, so a task may hold a raw
//!   pointer to its node (and to its parent) across `.await` points.
//! - **Single-writer-per-node, with one exception.** Only the task that owns
//!   a node writes its resolved value, so a plain [`UnsafeCell`] suffices —
//!   except for null propagation, which can race: a child's failure and a
//!   sibling's failure can both try to null the same non-null ancestor at
//!   once. That race is resolved by a single [`AtomicBool`] CAS per node,
//!   the only synchronization primitive this module needs.

mod chunked_list;

use std::{
    cell::UnsafeCell,
    sync::atomic::{AtomicBool, Ordering},
};

use arcstr::ArcStr;
use compact_str::CompactString;
use indexmap::IndexMap;

use crate::value::Value;
pub use chunked_list::{ChunkedList, DEFAULT_CHUNK_SIZE};

/// A node's resolved content, once it stops being [`Pending`](NodeState::Pending).
enum NodeState {
    /// Not yet resolved (or overwritten by another in-flight task).
    Pending,
    /// Resolved to `null`, either explicitly or by propagation from a failed
    /// non-null descendant.
    Nil,
    /// A resolved leaf (scalar/enum) value.
    Leaf(Value),
    /// A resolved list; each element is a child slot in its own right.
    List(ResultNodeList),
    /// A resolved object; `keys` maps response key to a child slot index in
    /// `children`, fixed at collection time.
    Object { keys: IndexMap<CompactString, usize>, children: ResultNodeList },
}

/// One position in the result tree.
///
/// `parent` and `state` are [`UnsafeCell`]s because a raw pointer to this
/// node may be held across await points by the task that owns it; the
/// `unsafe impl Send + Sync` below is sound only because of the
/// single-writer invariant described in the module docs.
pub struct ResultNode {
    parent: UnsafeCell<Option<*const ResultNode>>,
    /// Whether this node's declared type is non-null: a `null` written here
    /// must keep propagating to the parent rather than being absorbed.
    reject_null: AtomicBool,
    /// CAS-guarded: flips to `true` exactly once, by whichever null
    /// propagation reaches this node first. Every later propagation through
    /// this node is a no-op, which is what makes "at most one null write per
    /// node" hold under concurrent sibling failures.
    nulled: AtomicBool,
    state: UnsafeCell<NodeState>,
}

// Safety: `state` and `parent` are written at most once per node along any
// single propagation path, and every write is guarded either by this being
// the node's sole owning task (initial resolution) or by winning the
// `nulled` CAS (null propagation). No two threads ever write the same cell
// concurrently.
unsafe impl Send for ResultNode {}
unsafe impl Sync for ResultNode {}

impl Default for ResultNode {
    fn default() -> Self {
        Self {
            parent: UnsafeCell::new(None),
            reject_null: AtomicBool::new(false),
            nulled: AtomicBool::new(false),
            state: UnsafeCell::new(NodeState::Pending),
        }
    }
}

impl ResultNode {
    /// Marks this node's declared type as non-null, so a `null` written here
    /// (explicitly or by propagation) continues propagating to the parent.
    pub fn set_reject_null(&self, reject: bool) {
        self.reject_null.store(reject, Ordering::Relaxed);
    }

    /// Links this node to its parent, for null propagation.
    ///
    /// # Safety
    /// `parent` must point into the same (or an ancestor) [`ResultNodeList`]
    /// tree and must outlive `self`.
    pub unsafe fn set_parent(&self, parent: *const ResultNode) {
        unsafe { *self.parent.get() = Some(parent) };
    }

    /// Writes a leaf value. Must be called at most once per node by the
    /// node's owning task.
    pub fn resolve_leaf(&self, value: Value) {
        unsafe { *self.state.get() = NodeState::Leaf(value) };
    }

    /// Writes this node's resolved list shape, returning the (empty, newly
    /// allocated) child list for the caller to populate.
    pub fn resolve_list(&self, chunk_size: usize) -> &ResultNodeList {
        unsafe { *self.state.get() = NodeState::List(ResultNodeList::new(chunk_size)) };
        match unsafe { &*self.state.get() } {
            NodeState::List(list) => list,
            _ => unreachable!(),
        }
    }

    /// Writes this node's resolved object shape with a fixed set of
    /// response keys (field collection determines the key set before any
    /// field task is spawned), returning the child list for the caller to
    /// populate by index.
    pub fn resolve_object(
        &self,
        keys: IndexMap<CompactString, usize>,
        chunk_size: usize,
    ) -> &ResultNodeList {
        unsafe { *self.state.get() = NodeState::Object { keys, children: ResultNodeList::new(chunk_size) } };
        match unsafe { &*self.state.get() } {
            NodeState::Object { children, .. } => children,
            _ => unreachable!(),
        }
    }

    /// Resolves this node to `null` and, if its type is non-null, keeps
    /// propagating the null to the nearest nullable ancestor.
    ///
    /// Safe under concurrent calls from sibling failures: only the first
    /// caller to win the `nulled` CAS at a given node actually writes it or
    /// continues upward: every later caller through that node is a no-op.
    pub fn propagate_null(node: *const ResultNode) {
        let mut current = node;
        loop {
            // Safety: caller-provided pointers are into a live result tree
            // for the duration of execution (§ module docs).
            let this = unsafe { &*current };
            if this.nulled.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
                return;
            }
            unsafe { *this.state.get() = NodeState::Nil };
            if !this.reject_null.load(Ordering::Relaxed) {
                return;
            }
            let Some(parent) = (unsafe { *this.parent.get() }) else { return };
            current = parent;
        }
    }

    /// Whether this node has been resolved to `null` (explicitly, or by
    /// propagation).
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(unsafe { &*self.state.get() }, NodeState::Nil)
    }

    /// Converts this node (and its subtree) into a JSON value. Called only
    /// after execution has finished, so no concurrent writers remain.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match unsafe { &*self.state.get() } {
            NodeState::Pending => serde_json::Value::Null,
            NodeState::Nil => serde_json::Value::Null,
            NodeState::Leaf(v) => serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
            NodeState::List(list) => {
                serde_json::Value::Array(list.iter().map(ResultNode::to_json).collect())
            }
            NodeState::Object { keys, children } => {
                let mut map = serde_json::Map::with_capacity(keys.len());
                for (key, &index) in keys {
                    let child = children.get(index);
                    map.insert(key.to_string(), unsafe { &*child }.to_json());
                }
                serde_json::Value::Object(map)
            }
        }
    }
}

/// A pointer-stable list of [`ResultNode`] children, used for both list
/// elements (indexed positionally) and object fields (indexed by the
/// parent's `keys` map).
pub struct ResultNodeList {
    chunks: ChunkedList<ResultNode>,
}

impl ResultNodeList {
    /// Creates an empty child list using the given chunk size.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self { chunks: ChunkedList::new(chunk_size) }
    }

    /// Reserves a new child slot, returning its index.
    pub fn push(&self) -> usize {
        self.chunks.push()
    }

    /// Returns a raw, stable pointer to the child at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> *const ResultNode {
        self.chunks.get(index)
    }

    /// The number of child slots reserved.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no child slots have been reserved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Iterates over the reserved children in index order.
    pub fn iter(&self) -> impl Iterator<Item = &ResultNode> {
        (0..self.len()).map(move |i| unsafe { &*self.get(i) })
    }
}

/// The root of a result tree: an arena of exactly one node, kept separate
/// from [`ResultNodeList`] since the root has no parent and no response
/// key of its own.
pub struct ResultTree {
    root: Box<ResultNode>,
}

impl ResultTree {
    /// Creates a fresh, empty result tree.
    #[must_use]
    pub fn new() -> Self {
        Self { root: Box::new(ResultNode::default()) }
    }

    /// A stable pointer to the root node.
    #[must_use]
    pub fn root(&self) -> *const ResultNode {
        std::ptr::addr_of!(*self.root)
    }

    /// Serializes the whole tree to a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        self.root.to_json()
    }
}

impl Default for ResultTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Name kept for symmetry with [`ResultNodeList`] even though the type
/// itself carries no response-key-specific data.
pub type ResponseKey = ArcStr;

/// A raw pointer into the result tree, wrapped so it can cross `.await`
/// points and `tokio::spawn` boundaries.
///
/// Sound for the same reason [`ResultNode`]'s own `unsafe impl Send` is: the
/// pointee is never moved (chunk storage is append-only) and never written
/// by two tasks at once.
#[derive(Clone, Copy)]
pub struct NodeRef(pub *const ResultNode);

unsafe impl Send for NodeRef {}
unsafe impl Sync for NodeRef {}

impl NodeRef {
    /// Dereferences the pointer.
    ///
    /// # Safety
    /// The referenced node must still be alive (the owning [`ResultTree`]
    /// must not have been dropped).
    #[must_use]
    pub unsafe fn get(self) -> &'static ResultNode {
        unsafe { &*self.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_round_trips_through_json() {
        let node = ResultNode::default();
        node.resolve_leaf(Value::Int(42));
        assert_eq!(node.to_json(), serde_json::json!(42));
    }

    #[test]
    fn null_propagates_through_non_null_wrappers_only() {
        let root = ResultNode::default();
        let children = root.resolve_object(IndexMap::from([("a".into(), 0)]), 4);
        let a_index = children.push();
        assert_eq!(a_index, 0);
        let a = children.get(0);
        unsafe { (*a).set_parent(std::ptr::addr_of!(root)) };
        unsafe { (*a).set_reject_null(true) };
        root.set_reject_null(false);

        ResultNode::propagate_null(a);

        assert!(unsafe { &*a }.is_null());
        assert!(root.is_null(), "non-null child failure must null the parent");
    }

    #[test]
    fn null_stops_at_nearest_nullable_ancestor() {
        let root = ResultNode::default();
        let children = root.resolve_object(IndexMap::from([("a".into(), 0)]), 4);
        children.push();
        let a = children.get(0);
        unsafe { (*a).set_parent(std::ptr::addr_of!(root)) };
        unsafe { (*a).set_reject_null(false) };

        ResultNode::propagate_null(a);

        assert!(unsafe { &*a }.is_null());
        assert!(!root.is_null(), "a nullable field absorbs the null instead of propagating");
    }

    #[test]
    fn concurrent_propagation_from_two_children_nulls_parent_once() {
        let root = ResultNode::default();
        let children = root.resolve_object(IndexMap::from([("a".into(), 0), ("b".into(), 1)]), 4);
        children.push();
        children.push();
        let a = children.get(0);
        let b = children.get(1);
        unsafe {
            (*a).set_parent(std::ptr::addr_of!(root));
            (*a).set_reject_null(true);
            (*b).set_parent(std::ptr::addr_of!(root));
            (*b).set_reject_null(true);
        }
        root.set_reject_null(false);

        struct SendPtr(*const ResultNode);
        unsafe impl Send for SendPtr {}

        let sa = SendPtr(a);
        let sb = SendPtr(b);
        let handle_a = std::thread::spawn(move || {
            let sa = sa;
            ResultNode::propagate_null(sa.0)
        });
        let handle_b = std::thread::spawn(move || {
            let sb = sb;
            ResultNode::propagate_null(sb.0)
        });
        handle_a.join().unwrap();
        handle_b.join().unwrap();

        assert!(root.is_null());
    }
}
