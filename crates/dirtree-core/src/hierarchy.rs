//! Generic n-ary hierarchy
//!
//! An arena-backed tree: every node lives in one `Vec` owned by the
//! hierarchy, children are owning edges (indices held by the parent), and the
//! parent link is a plain back-reference index used only for traversal.
//! Nodes are appended, never removed.

use std::cmp::Ordering;
use std::fmt;

use serde::ser::{SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};
use tracing::debug;

/// Handle to a node inside one [`Hierarchy`].
///
/// A `NodeId` is only meaningful for the hierarchy that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    value: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A rooted tree holding one value per node.
#[derive(Debug, Clone)]
pub struct Hierarchy<T> {
    slots: Vec<Slot<T>>,
}

const ROOT: NodeId = NodeId(0);

impl<T> Hierarchy<T> {
    /// Create a hierarchy made of a single root node.
    pub fn new(value: T) -> Self {
        Self {
            slots: vec![Slot {
                value,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Link a flat collection into hierarchies.
    ///
    /// Every item is wrapped in its own node, then for each ordered pair
    /// `(a, b)` with `a != b`, `b` is attached under `a` when
    /// `is_parent(a, b)` holds. A node is attached under the first item that
    /// claims it. Every node left without a parent becomes the root of one
    /// returned hierarchy, in input order. Nodes caught in a parent cycle have
    /// no root and are dropped.
    ///
    /// Costs O(n²) predicate evaluations.
    pub fn link_by_predicate<I, F>(items: I, is_parent: F) -> Vec<Hierarchy<T>>
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T, &T) -> bool,
    {
        let values: Vec<T> = items.into_iter().collect();
        let n = values.len();
        let mut parents: Vec<Option<usize>> = vec![None; n];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];

        for a in 0..n {
            for b in 0..n {
                if a == b || parents[b].is_some() {
                    continue;
                }
                if is_parent(&values[a], &values[b]) {
                    parents[b] = Some(a);
                    children[a].push(b);
                }
            }
        }

        let mut pending: Vec<Option<T>> = values.into_iter().map(Some).collect();
        let mut result = Vec::new();

        for root in 0..n {
            if parents[root].is_some() {
                continue;
            }
            let Some(root_value) = pending[root].take() else {
                continue;
            };

            let mut tree = Hierarchy::new(root_value);
            let mut stack = vec![(root, tree.root())];
            while let Some((source, target)) = stack.pop() {
                for &child in &children[source] {
                    if let Some(value) = pending[child].take() {
                        let id = tree.add_child(target, value);
                        stack.push((child, id));
                    }
                }
            }
            result.push(tree);
        }

        debug!(items = n, roots = result.len(), "Linked flat items into hierarchies");
        result
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        ROOT
    }

    /// The value held by the root node.
    pub fn root_value(&self) -> &T {
        &self.slots[ROOT.0].value
    }

    /// Append a new child holding `value` under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` does not belong to this hierarchy.
    pub fn add_child(&mut self, parent: NodeId, value: T) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots[parent.0].children.push(id);
        self.slots.push(Slot {
            value,
            parent: Some(parent),
            children: Vec::new(),
        });
        id
    }

    /// Value of the given node.
    pub fn value(&self, id: NodeId) -> Option<&T> {
        self.slots.get(id.0).map(|slot| &slot.value)
    }

    /// Parent of the given node, `None` for the root.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots.get(id.0).and_then(|slot| slot.parent)
    }

    /// Walk parent links up to the topmost node.
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Direct children of a node, in their current order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.slots
            .get(id.0)
            .map(|slot| slot.children.as_slice())
            .unwrap_or(&[])
    }

    /// The `index`-th child of a node.
    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).get(index).copied()
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    /// Values of the direct children of a node.
    pub fn child_values(&self, id: NodeId) -> Vec<&T> {
        self.children(id)
            .iter()
            .map(|child| &self.slots[child.0].value)
            .collect()
    }

    /// Position of the first direct child whose value equals `value`.
    pub fn index_of_child(&self, id: NodeId, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.children(id)
            .iter()
            .position(|child| self.slots[child.0].value == *value)
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.children(id).is_empty()
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        self.parent(id).is_none()
    }

    /// Number of nodes in the whole hierarchy.
    pub fn size(&self) -> usize {
        self.subtree_size(ROOT)
    }

    /// 1 plus the subtree sizes of all children, computed on demand.
    pub fn subtree_size(&self, id: NodeId) -> usize {
        1 + self
            .children(id)
            .iter()
            .map(|&child| self.subtree_size(child))
            .sum::<usize>()
    }

    /// Sort the direct children of one node.
    pub fn sort_children_by<F>(&mut self, id: NodeId, mut compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let mut children = std::mem::take(&mut self.slots[id.0].children);
        children.sort_by(|a, b| compare(&self.slots[a.0].value, &self.slots[b.0].value));
        self.slots[id.0].children = children;
    }

    /// Sort the children of every node. This is a per-level ordering, not a
    /// global one.
    pub fn sort_recursive_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        for index in 0..self.slots.len() {
            self.sort_children_by(NodeId(index), &mut compare);
        }
    }

    /// [`Hierarchy::sort_recursive_by`] with a key extractor.
    pub fn sort_recursive_by_key<K, F>(&mut self, mut key: F)
    where
        K: Ord,
        F: FnMut(&T) -> K,
    {
        self.sort_recursive_by(|a, b| key(a).cmp(&key(b)));
    }

    /// Pre-order traversal: node first, then children in their current order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            tree: self,
            stack: vec![ROOT],
        }
    }

    /// Values in pre-order.
    pub fn to_vec(&self) -> Vec<&T> {
        self.iter().collect()
    }

    /// Consume the hierarchy, returning values in pre-order.
    pub fn into_vec(self) -> Vec<T> {
        let order: Vec<usize> = self.node_ids().map(|id| id.0).collect();
        let mut slots: Vec<Option<T>> = self.slots.into_iter().map(|s| Some(s.value)).collect();
        order
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect()
    }

    /// Node ids in pre-order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![ROOT];
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(self.children(id).iter().rev());
            Some(id)
        })
    }

    fn write_subtree(&self, f: &mut fmt::Formatter<'_>, id: NodeId, depth: usize) -> fmt::Result
    where
        T: fmt::Display,
    {
        for &child in self.children(id) {
            writeln!(
                f,
                "{}- {}",
                "\t".repeat(depth),
                self.slots[child.0].value
            )?;
            self.write_subtree(f, child, depth + 1)?;
        }
        Ok(())
    }
}

/// Pre-order iterator over the values of a [`Hierarchy`].
pub struct Iter<'a, T> {
    tree: &'a Hierarchy<T>,
    stack: Vec<NodeId>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.stack.extend(self.tree.children(id).iter().rev());
        self.tree.value(id)
    }
}

impl<'a, T> IntoIterator for &'a Hierarchy<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: fmt::Display> fmt::Display for Hierarchy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.root_value())?;
        self.write_subtree(f, ROOT, 1)
    }
}

/// Serialized as nested `{ "value": ..., "children": [...] }` objects.
impl<T: Serialize> Serialize for Hierarchy<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Subtree { tree: self, id: ROOT }.serialize(serializer)
    }
}

struct Subtree<'a, T> {
    tree: &'a Hierarchy<T>,
    id: NodeId,
}

struct Children<'a, T> {
    tree: &'a Hierarchy<T>,
    id: NodeId,
}

impl<T: Serialize> Serialize for Subtree<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Hierarchy", 2)?;
        state.serialize_field("value", &self.tree.slots[self.id.0].value)?;
        state.serialize_field(
            "children",
            &Children {
                tree: self.tree,
                id: self.id,
            },
        )?;
        state.end()
    }
}

impl<T: Serialize> Serialize for Children<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let children = self.tree.children(self.id);
        let mut seq = serializer.serialize_seq(Some(children.len()))?;
        for &child in children {
            seq.serialize_element(&Subtree {
                tree: self.tree,
                id: child,
            })?;
        }
        seq.end()
    }
}
