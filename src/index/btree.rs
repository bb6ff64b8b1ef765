//! Multi-value B-tree
//!
//! Keys are `(value, RID)` pairs ordered lexicographically, so rows sharing a
//! value coexist as distinct keys. Insertion follows the classic top-down
//! scheme: a full node is split before the search descends into it, so a
//! single pass from the root suffices.
//!
//! ```text
//!                 [(20,r4) (50,r2)]
//!                /        |        \
//!   [(10,r1) (20,r3)]  [(30,r5)]  [(50,r6) (70,r7)]
//! ```
//!
//! Equal values may straddle levels (`20` above lives in the root and in a
//! leaf), so lookups walk every subtree that can hold the value instead of
//! stopping at the first match.

use std::ops::Bound;

use crate::rid::Rid;

/// Key stored in the tree
pub type IndexKey = (i64, Rid);

struct Node {
    keys: Vec<IndexKey>,
    children: Vec<Node>,
}

impl Node {
    fn new() -> Self {
        Self {
            keys: Vec::new(),
            children: Vec::new(),
        }
    }

    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Split the full child `i` around its median, lifting the median here
    fn split_child(&mut self, i: usize, degree: usize) {
        let child = &mut self.children[i];

        let mut right = Node::new();
        right.keys = child.keys.split_off(degree);
        if !child.is_leaf() {
            right.children = child.children.split_off(degree);
        }
        let median = child.keys.remove(degree - 1);

        self.keys.insert(i, median);
        self.children.insert(i + 1, right);
    }

    fn insert_non_full(&mut self, key: IndexKey, degree: usize) {
        let mut i = self.keys.partition_point(|k| *k < key);
        if self.is_leaf() {
            self.keys.insert(i, key);
            return;
        }

        if self.children[i].keys.len() == 2 * degree - 1 {
            self.split_child(i, degree);
            if self.keys[i] < key {
                i += 1;
            }
        }
        self.children[i].insert_non_full(key, degree);
    }

    fn contains(&self, key: &IndexKey) -> bool {
        let i = self.keys.partition_point(|k| k < key);
        if self.keys.get(i) == Some(key) {
            return true;
        }
        !self.is_leaf() && self.children[i].contains(key)
    }

    /// In-order walk of every key whose value lies within `(lo, hi)`
    fn collect(&self, lo: Bound<i64>, hi: Bound<i64>, out: &mut Vec<Rid>) {
        let start = match lo {
            Bound::Included(v) => self.keys.partition_point(|k| k.0 < v),
            Bound::Excluded(v) => self.keys.partition_point(|k| k.0 <= v),
            Bound::Unbounded => 0,
        };

        for i in start..self.keys.len() {
            if !self.is_leaf() {
                self.children[i].collect(lo, hi, out);
            }
            if !within_upper(self.keys[i].0, hi) {
                return;
            }
            out.push(self.keys[i].1);
        }

        if !self.is_leaf() {
            self.children[self.keys.len()].collect(lo, hi, out);
        }
    }

    fn walk(&self, out: &mut Vec<IndexKey>) {
        for (i, key) in self.keys.iter().enumerate() {
            if !self.is_leaf() {
                self.children[i].walk(out);
            }
            out.push(*key);
        }
        if !self.is_leaf() {
            self.children[self.keys.len()].walk(out);
        }
    }

    fn height(&self) -> usize {
        match self.children.first() {
            Some(child) => 1 + child.height(),
            None => 1,
        }
    }
}

fn within_upper(value: i64, hi: Bound<i64>) -> bool {
    match hi {
        Bound::Included(v) => value <= v,
        Bound::Excluded(v) => value < v,
        Bound::Unbounded => true,
    }
}

/// Balanced multi-way search tree over `(value, RID)` keys
pub struct BTree {
    root: Node,
    degree: usize,
    len: usize,
}

impl BTree {
    /// Create an empty tree with minimum degree `degree` (clamped to 2)
    pub fn new(degree: usize) -> Self {
        Self {
            root: Node::new(),
            degree: degree.max(2),
            len: 0,
        }
    }

    /// Insert `(value, rid)`; returns false if that exact pair is present
    pub fn insert(&mut self, value: i64, rid: Rid) -> bool {
        let key = (value, rid);
        if self.root.contains(&key) {
            return false;
        }

        if self.root.keys.len() == 2 * self.degree - 1 {
            let old_root = std::mem::replace(&mut self.root, Node::new());
            self.root.children.push(old_root);
            self.root.split_child(0, self.degree);
        }
        self.root.insert_non_full(key, self.degree);
        self.len += 1;
        true
    }

    /// Check for an exact `(value, rid)` pair
    pub fn contains(&self, value: i64, rid: Rid) -> bool {
        self.root.contains(&(value, rid))
    }

    /// Every RID stored under `value`
    pub fn locate(&self, value: i64) -> Vec<Rid> {
        self.range(Bound::Included(value), Bound::Included(value))
    }

    /// Every RID whose value lies in `[begin, end)`
    pub fn locate_range(&self, begin: i64, end: i64) -> Vec<Rid> {
        if begin >= end {
            return Vec::new();
        }
        self.range(Bound::Included(begin), Bound::Excluded(end))
    }

    /// Every RID whose value lies within the given bounds, in key order
    pub fn range(&self, lo: Bound<i64>, hi: Bound<i64>) -> Vec<Rid> {
        let mut out = Vec::new();
        self.root.collect(lo, hi, &mut out);
        out
    }

    /// Keep only the keys matching `keep`, rebuilding the tree
    ///
    /// Returns the number of keys removed.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(i64, Rid) -> bool,
    {
        let before = self.len;
        let survivors: Vec<IndexKey> = self
            .keys()
            .into_iter()
            .filter(|&(value, rid)| keep(value, rid))
            .collect();

        let mut rebuilt = BTree::new(self.degree);
        for (value, rid) in survivors {
            rebuilt.insert(value, rid);
        }
        *self = rebuilt;
        before - self.len
    }

    /// All keys in order
    pub fn keys(&self) -> Vec<IndexKey> {
        let mut out = Vec::with_capacity(self.len);
        self.root.walk(&mut out);
        out
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of levels (1 for a lone leaf root)
    pub fn height(&self) -> usize {
        self.root.height()
    }
}
