//! Dual-Indexed Sorted Set
//!
//! A sorted set maps unique members to f64 scores and answers rank and
//! range queries in ascending `(score, member)` order. Two coordinated
//! indices back it:
//!
//! - `by_member`: member -> score hash map, for O(1) score lookups
//! - `by_rank`: a rank-augmented skip list over `(score, member)`, for
//!   O(log n) point operations and O(log n + k) range scans
//!
//! Both indices always hold exactly the same pairs. Neither is exposed
//! outside this type, so the coordination invariant cannot be broken by
//! callers.
//!
//! Every skip-list link carries a `span`: the number of elements crossed
//! by following it. Summing spans while descending gives an element's
//! rank without walking the list, and the same walk lands on the node at
//! a given rank, so index-based ranges start in logarithmic time instead
//! of skipping from the front.
//!
//! Scores are compared through `OrderedFloat`; non-finite scores are
//! rejected before they reach this module, so the NaN ordering arm is
//! never exercised.

use bytes::Bytes;
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Tallest tower a node can get. 1/4 promotion odds make levels above
/// this unreachable in practice long before the list outgrows memory.
const MAX_LEVEL: usize = 32;

/// Sentinel index meaning "no next node".
const NIL: usize = usize::MAX;

/// Arena index of the head sentinel.
const HEAD: usize = 0;

/// One forward link of a node tower.
#[derive(Debug, Clone, Copy)]
struct Link {
    /// Arena index of the next node at this level, or `NIL`
    next: usize,
    /// Elements crossed by following `next` from this node
    span: usize,
}

#[derive(Debug, Clone)]
struct Node {
    member: Bytes,
    score: f64,
    /// Forward links, one per level of this node's tower
    links: Vec<Link>,
}

/// Rank-augmented skip list keyed on `(score, member)`.
///
/// Nodes live in an index arena (`nodes`), with freed slots recycled
/// through `free`, so links are plain `usize` indices.
#[derive(Debug, Clone)]
struct SkipList {
    nodes: Vec<Node>,
    free: Vec<usize>,
    /// Levels currently in use (highest populated tower)
    level: usize,
    len: usize,
    /// xorshift64 state for tower heights
    rng: u64,
}

impl SkipList {
    fn new() -> Self {
        let head = Node {
            member: Bytes::new(),
            score: 0.0,
            links: vec![Link { next: NIL, span: 0 }; MAX_LEVEL],
        };
        Self {
            nodes: vec![head],
            free: Vec::new(),
            level: 1,
            len: 0,
            rng: 0x2545f4914f6cdd1d,
        }
    }

    fn len(&self) -> usize {
        self.len
    }

    /// Tower height for a new node: keep promoting with probability 1/4.
    fn random_level(&mut self) -> usize {
        let mut lvl = 1;
        while lvl < MAX_LEVEL {
            self.rng ^= self.rng << 13;
            self.rng ^= self.rng >> 7;
            self.rng ^= self.rng << 17;
            if (self.rng & 0xffff) >= 0x4000 {
                break;
            }
            lvl += 1;
        }
        lvl
    }

    fn alloc(&mut self, member: Bytes, score: f64, lvl: usize) -> usize {
        let node = Node {
            member,
            score,
            links: vec![Link { next: NIL, span: 0 }; lvl],
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn dealloc(&mut self, idx: usize) {
        self.nodes[idx] = Node {
            member: Bytes::new(),
            score: 0.0,
            links: Vec::new(),
        };
        self.free.push(idx);
    }

    /// True if the node at `idx` orders strictly before `(score, member)`.
    fn precedes(&self, idx: usize, score: f64, member: &Bytes) -> bool {
        let node = &self.nodes[idx];
        match OrderedFloat(node.score).cmp(&OrderedFloat(score)) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => node.member < *member,
        }
    }

    /// Inserts a pair. The caller guarantees the member is not already
    /// present (updates remove the old pair first).
    fn insert(&mut self, member: Bytes, score: f64) {
        let mut update = [HEAD; MAX_LEVEL];
        let mut rank = [0usize; MAX_LEVEL];

        // Walk down the towers noting, per level, the last node before
        // the insertion point and its rank.
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };
            loop {
                let link = self.nodes[x].links[i];
                if link.next != NIL && self.precedes(link.next, score, &member) {
                    rank[i] += link.span;
                    x = link.next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let lvl = self.random_level();
        if lvl > self.level {
            for i in self.level..lvl {
                rank[i] = 0;
                update[i] = HEAD;
                self.nodes[HEAD].links[i].span = self.len;
            }
            self.level = lvl;
        }

        let new = self.alloc(member, score, lvl);
        for i in 0..lvl {
            let prev = update[i];
            let prev_link = self.nodes[prev].links[i];
            self.nodes[new].links[i] = Link {
                next: prev_link.next,
                span: prev_link.span - (rank[0] - rank[i]),
            };
            self.nodes[prev].links[i] = Link {
                next: new,
                span: rank[0] - rank[i] + 1,
            };
        }
        // Towers the new node does not reach now cross one more element.
        for i in lvl..self.level {
            self.nodes[update[i]].links[i].span += 1;
        }
        self.len += 1;
    }

    /// Removes the pair if present. Returns true when a node came out.
    fn remove(&mut self, member: &Bytes, score: f64) -> bool {
        let mut update = [HEAD; MAX_LEVEL];

        let mut x = HEAD;
        for i in (0..self.level).rev() {
            loop {
                let link = self.nodes[x].links[i];
                if link.next != NIL && self.precedes(link.next, score, member) {
                    x = link.next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let target = self.nodes[x].links[0].next;
        if target == NIL || self.nodes[target].member != *member {
            return false;
        }

        for i in 0..self.level {
            let upd = update[i];
            let link = self.nodes[upd].links[i];
            if link.next == target {
                let tlink = self.nodes[target].links[i];
                self.nodes[upd].links[i] = Link {
                    next: tlink.next,
                    span: link.span + tlink.span - 1,
                };
            } else {
                self.nodes[upd].links[i].span -= 1;
            }
        }

        while self.level > 1 && self.nodes[HEAD].links[self.level - 1].next == NIL {
            self.level -= 1;
        }

        self.dealloc(target);
        self.len -= 1;
        true
    }

    /// 0-based rank of `(score, member)`, accumulated from link spans
    /// while descending. Logarithmic: no level-0 walk.
    fn rank(&self, member: &Bytes, score: f64) -> Option<usize> {
        let mut rank = 0usize;
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            loop {
                let link = self.nodes[x].links[i];
                if link.next == NIL {
                    break;
                }
                let next = &self.nodes[link.next];
                let advance = match OrderedFloat(next.score).cmp(&OrderedFloat(score)) {
                    Ordering::Less => true,
                    Ordering::Greater => false,
                    Ordering::Equal => next.member <= *member,
                };
                if advance {
                    rank += link.span;
                    x = link.next;
                } else {
                    break;
                }
            }
            if x != HEAD && self.nodes[x].member == *member {
                // `rank` counted the node itself, so it is 1-based here.
                return Some(rank - 1);
            }
        }
        None
    }

    /// Arena index of the node at the given 0-based rank.
    fn node_at_rank(&self, rank: usize) -> Option<usize> {
        let target = rank + 1;
        let mut traversed = 0usize;
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            loop {
                let link = self.nodes[x].links[i];
                if link.next != NIL && traversed + link.span <= target {
                    traversed += link.span;
                    x = link.next;
                } else {
                    break;
                }
            }
            if traversed == target {
                return Some(x);
            }
        }
        None
    }

    /// `count` consecutive pairs starting at the given 0-based rank.
    fn slice(&self, start: usize, count: usize) -> Vec<(Bytes, f64)> {
        let mut out = Vec::with_capacity(count);
        let mut x = match self.node_at_rank(start) {
            Some(idx) => idx,
            None => return out,
        };
        while out.len() < count {
            let node = &self.nodes[x];
            out.push((node.member.clone(), node.score));
            x = node.links[0].next;
            if x == NIL {
                break;
            }
        }
        out
    }

    /// All pairs with `min <= score <= max`, found by descending to the
    /// first node at or above `min` and walking level 0 from there.
    fn score_range(&self, min: f64, max: f64) -> Vec<(Bytes, f64)> {
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            loop {
                let link = self.nodes[x].links[i];
                if link.next != NIL
                    && OrderedFloat(self.nodes[link.next].score) < OrderedFloat(min)
                {
                    x = link.next;
                } else {
                    break;
                }
            }
        }

        let mut out = Vec::new();
        let mut x = self.nodes[x].links[0].next;
        while x != NIL {
            let node = &self.nodes[x];
            if OrderedFloat(node.score) > OrderedFloat(max) {
                break;
            }
            out.push((node.member.clone(), node.score));
            x = node.links[0].next;
        }
        out
    }
}

/// A collection of (member, score) pairs ordered by `(score, member)`.
#[derive(Debug, Clone)]
pub struct SortedSet {
    /// member -> score
    by_member: HashMap<Bytes, f64>,
    /// (score, member), ascending, with rank information
    by_rank: SkipList,
}

impl Default for SortedSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SortedSet {
    /// Creates an empty sorted set.
    pub fn new() -> Self {
        Self {
            by_member: HashMap::new(),
            by_rank: SkipList::new(),
        }
    }

    /// Upserts a member.
    ///
    /// Returns `true` if the member was newly inserted, `false` if an
    /// existing member's score was updated (or left unchanged).
    pub fn insert(&mut self, member: Bytes, score: f64) -> bool {
        let inserted = match self.by_member.get(&member) {
            Some(&old) => {
                if old != score {
                    self.by_rank.remove(&member, old);
                    self.by_rank.insert(member.clone(), score);
                    self.by_member.insert(member, score);
                }
                false
            }
            None => {
                self.by_rank.insert(member.clone(), score);
                self.by_member.insert(member, score);
                true
            }
        };
        debug_assert_eq!(self.by_member.len(), self.by_rank.len());
        inserted
    }

    /// Removes a member. Returns `true` if it was present.
    pub fn remove(&mut self, member: &Bytes) -> bool {
        let removed = match self.by_member.remove(member) {
            Some(score) => self.by_rank.remove(member, score),
            None => false,
        };
        debug_assert_eq!(self.by_member.len(), self.by_rank.len());
        removed
    }

    /// The score of a member, if present.
    pub fn score(&self, member: &Bytes) -> Option<f64> {
        self.by_member.get(member).copied()
    }

    /// Number of members in the set.
    pub fn len(&self) -> usize {
        self.by_member.len()
    }

    /// Returns true if the set holds no members.
    pub fn is_empty(&self) -> bool {
        self.by_member.is_empty()
    }

    /// The 0-based position of a member in `(score, member)` order.
    pub fn rank(&self, member: &Bytes) -> Option<usize> {
        let score = self.by_member.get(member)?;
        self.by_rank.rank(member, *score)
    }

    /// Index-based range in ascending order, both endpoints inclusive.
    ///
    /// Negative indices count from the end (`-1` is the last element).
    /// After normalization, a start past the end or beyond the stop yields
    /// an empty result; a stop past the end is clamped to the last index.
    pub fn range_by_rank(&self, start: i64, stop: i64) -> Vec<(Bytes, f64)> {
        let len = self.by_rank.len() as i64;
        let mut start = if start < 0 { len + start } else { start };
        let mut stop = if stop < 0 { len + stop } else { stop };

        if start < 0 {
            start = 0;
        }
        if start > stop || start >= len {
            return Vec::new();
        }
        if stop >= len {
            stop = len - 1;
        }

        self.by_rank
            .slice(start as usize, (stop - start + 1) as usize)
    }

    /// Score-based range, inclusive on both bounds, in ascending
    /// `(score, member)` order. `min > max` yields an empty result.
    pub fn range_by_score(&self, min: f64, max: f64) -> Vec<(Bytes, f64)> {
        if min > max {
            return Vec::new();
        }
        self.by_rank.score_range(min, max)
    }
}
