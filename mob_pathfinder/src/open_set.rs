// Open set for the search driver: a binary min-heap over `NodeId`s.
//
// Unlike `std::collections::BinaryHeap`, this heap supports changing the key
// of an element already inside it. Each node records its own heap position
// in `Node::heap_idx`, so `change_cost` can re-heapify from that position
// in O(log n) without a search. The heap stores only ids; `f` is read from
// the `NodeGraph`.
//
// Ordering is by `f` alone. Sift-up moves only on strictly smaller `f`, and
// sift-down stops as soon as the smaller child is not strictly smaller, so
// equal-cost nodes keep their relative heap order.
//
// See also: `node.rs` for `Node::heap_idx`, `pathfinding.rs` for the driver.
//
// **Critical constraint: uniqueness.** A node may be in the heap at most
// once. The node graph hands out one id per coordinate; `insert` asserts the
// node is not already present.

use crate::node::{NodeGraph, NodeId};

#[derive(Clone, Debug, Default)]
pub struct OpenSet {
    heap: Vec<NodeId>,
}

impl OpenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` with its current `f`.
    pub fn insert(&mut self, graph: &mut NodeGraph, id: NodeId) {
        debug_assert!(
            !graph.node(id).in_open_set(),
            "node {:?} inserted twice",
            graph.node(id).coord
        );
        self.heap.push(id);
        let last = self.heap.len() - 1;
        graph.node_mut(id).heap_idx = Some(last);
        self.sift_up(graph, last);
    }

    /// Remove and return the node with the lowest `f`.
    pub fn pop(&mut self, graph: &mut NodeGraph) -> Option<NodeId> {
        if self.heap.is_empty() {
            return None;
        }
        let top = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            graph.node_mut(self.heap[0]).heap_idx = Some(0);
            self.sift_down(graph, 0);
        }
        graph.node_mut(top).heap_idx = None;
        Some(top)
    }

    /// Set `id`'s `f` and restore heap order around it. A node outside the
    /// open set only has its `f` updated.
    pub fn change_cost(&mut self, graph: &mut NodeGraph, id: NodeId, f: f32) {
        let node = graph.node_mut(id);
        let old = node.f;
        node.f = f;
        let Some(idx) = node.heap_idx else {
            return;
        };
        if f < old {
            self.sift_up(graph, idx);
        } else {
            self.sift_down(graph, idx);
        }
    }

    pub fn peek(&self) -> Option<NodeId> {
        self.heap.first().copied()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Empty the heap, resetting every member's `heap_idx`.
    pub fn clear(&mut self, graph: &mut NodeGraph) {
        for id in self.heap.drain(..) {
            graph.node_mut(id).heap_idx = None;
        }
    }

    fn sift_up(&mut self, graph: &mut NodeGraph, mut idx: usize) {
        let id = self.heap[idx];
        let f = graph.node(id).f;
        while idx > 0 {
            let parent_idx = (idx - 1) >> 1;
            let parent = self.heap[parent_idx];
            if f >= graph.node(parent).f {
                break;
            }
            self.heap[idx] = parent;
            graph.node_mut(parent).heap_idx = Some(idx);
            idx = parent_idx;
        }
        self.heap[idx] = id;
        graph.node_mut(id).heap_idx = Some(idx);
    }

    fn sift_down(&mut self, graph: &mut NodeGraph, mut idx: usize) {
        let id = self.heap[idx];
        let f = graph.node(id).f;
        let len = self.heap.len();
        loop {
            let left = 1 + (idx << 1);
            let right = left + 1;
            if left >= len {
                break;
            }
            let left_f = graph.node(self.heap[left]).f;
            let right_f = if right < len {
                graph.node(self.heap[right]).f
            } else {
                f32::INFINITY
            };
            let child = if left_f < right_f {
                if left_f >= f {
                    break;
                }
                left
            } else {
                if right_f >= f {
                    break;
                }
                right
            };
            let child_id = self.heap[child];
            self.heap[idx] = child_id;
            graph.node_mut(child_id).heap_idx = Some(idx);
            idx = child;
        }
        self.heap[idx] = id;
        graph.node_mut(id).heap_idx = Some(idx);
    }
}
