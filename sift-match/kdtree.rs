//! k-d tree over descriptor rows with best-bin-first top-2 search.

use sift_core::DescriptorSet;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Rows per leaf bucket
const LEAF_SIZE: usize = 8;

#[derive(Debug, Clone)]
enum KdNode {
    Split { dim: usize, value: f32, left: usize, right: usize },
    Leaf { start: usize, end: usize },
}

/// Static k-d tree over the rows of a descriptor set.
///
/// Splits on the dimension of highest variance at its median, like the
/// randomized-tree matchers of common vision libraries but with a single
/// deterministic tree.
#[derive(Debug)]
pub struct DescriptorTree<'a> {
    set: &'a DescriptorSet,
    nodes: Vec<KdNode>,
    /// Row indices, leaves own contiguous ranges
    order: Vec<usize>,
}

/// Two closest rows found so far as `(squared distance, row)`, ordered
/// by distance and then row index
#[derive(Debug, Clone, Copy, Default)]
pub struct TopTwo {
    pub best: Option<(f32, usize)>,
    pub second: Option<(f32, usize)>,
}

impl TopTwo {
    pub fn insert(&mut self, dist_sq: f32, row: usize) {
        let before = |a: (f32, usize), b: Option<(f32, usize)>| match b {
            None => true,
            Some(b) => a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)) == Ordering::Less,
        };
        let cand = (dist_sq, row);
        if before(cand, self.best) {
            self.second = self.best;
            self.best = Some(cand);
        } else if before(cand, self.second) {
            self.second = Some(cand);
        }
    }

    /// Distance a candidate must beat to change the result
    fn bound(&self) -> f32 {
        self.second.map_or(f32::INFINITY, |s| s.0)
    }
}

/// Unexplored subtree with a lower bound on its squared distance
#[derive(Debug, PartialEq)]
struct Branch {
    bound: f32,
    node: usize,
}

impl Eq for Branch {}

impl Ord for Branch {
    // reversed: BinaryHeap pops the closest branch first
    fn cmp(&self, other: &Self) -> Ordering {
        other.bound.total_cmp(&self.bound).then(other.node.cmp(&self.node))
    }
}

impl PartialOrd for Branch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a> DescriptorTree<'a> {
    /// Build a tree over all rows of `set`
    pub fn build(set: &'a DescriptorSet) -> Self {
        let mut order: Vec<usize> = (0..set.len()).collect();
        let mut nodes = Vec::new();
        if !order.is_empty() {
            let len = order.len();
            Self::build_recursive(set, &mut order, 0, len, &mut nodes);
        }
        Self { set, nodes, order }
    }

    fn build_recursive(
        set: &DescriptorSet,
        order: &mut [usize],
        start: usize,
        end: usize,
        nodes: &mut Vec<KdNode>,
    ) -> usize {
        let node_idx = nodes.len();
        if end - start <= LEAF_SIZE {
            nodes.push(KdNode::Leaf { start, end });
            return node_idx;
        }

        let rows = &mut order[start..end];
        let dim = highest_variance_dim(set, rows);
        rows.sort_by(|&a, &b| set.row(a)[dim].total_cmp(&set.row(b)[dim]).then(a.cmp(&b)));
        let mid = rows.len() / 2;
        let value = set.row(rows[mid])[dim];

        // placeholder, children are pushed after this node
        nodes.push(KdNode::Leaf { start, end });
        let left = Self::build_recursive(set, order, start, start + mid, nodes);
        let right = Self::build_recursive(set, order, start + mid, end, nodes);
        nodes[node_idx] = KdNode::Split { dim, value, left, right };
        node_idx
    }

    /// Nearest and second nearest rows to `query`.
    ///
    /// At most `leaf_checks` rows are compared once two candidates are
    /// known; `0` searches until the result is exact.
    pub fn top_two(&self, query: &[f32], leaf_checks: usize) -> TopTwo {
        let mut top = TopTwo::default();
        if self.nodes.is_empty() {
            return top;
        }

        let mut heap = BinaryHeap::new();
        heap.push(Branch { bound: 0.0, node: 0 });
        let mut checks = 0usize;

        while let Some(Branch { bound, node }) = heap.pop() {
            if bound > top.bound() {
                break;
            }
            if leaf_checks > 0 && checks >= leaf_checks && top.second.is_some() {
                break;
            }

            // descend to a leaf, queueing the far side of every split
            let mut current = node;
            loop {
                match self.nodes[current] {
                    KdNode::Split { dim, value, left, right } => {
                        let diff = query[dim] - value;
                        let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                        let far_bound = bound.max(diff * diff);
                        if far_bound <= top.bound() {
                            heap.push(Branch { bound: far_bound, node: far });
                        }
                        current = near;
                    }
                    KdNode::Leaf { start, end } => {
                        for &row in &self.order[start..end] {
                            top.insert(squared_distance(query, self.set.row(row)), row);
                        }
                        checks += end - start;
                        break;
                    }
                }
            }
        }
        top
    }
}

fn highest_variance_dim(set: &DescriptorSet, rows: &[usize]) -> usize {
    let width = set.width();
    let n = rows.len() as f32;
    let mut mean = vec![0f32; width];
    for &r in rows {
        for (m, v) in mean.iter_mut().zip(set.row(r)) {
            *m += v;
        }
    }
    mean.iter_mut().for_each(|m| *m /= n);

    let mut var = vec![0f32; width];
    for &r in rows {
        for ((acc, v), m) in var.iter_mut().zip(set.row(r)).zip(&mean) {
            *acc += (v - m) * (v - m);
        }
    }
    var.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

#[inline]
pub fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
