/*!
# Edge Partition

An [`EdgePartition`] is the shard of a graph owned by one worker: the
edges of the partition stored as a [`K2Tree`](crate::tree::K2Tree) over the
local adjacency matrix, an attribute array in tree order, a vertex
attribute map, occupancy bitsets for the local rows and columns, and an
optional active vertex set.

Partitions are **immutable values**: every transformation returns a new
partition, structurally sharing the tree and the attribute array with its
predecessor where possible (both live behind `Arc`s). A single partition
is single-threaded; concurrent readers are safe, concurrent mutation does
not exist.

Global vertex ids translate to local matrix coordinates through the
partition's `src_offset` / `dst_offset`: the edge at local `(line, col)`
connects `line + src_offset` to `col + dst_offset`.
*/

mod context;
mod scan;

pub use context::AggregatingEdgeContext;

use std::sync::Arc;

use fxhash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::{
    attrs::sort_by_tree_order,
    bitset::BitSet,
    edge::{Edge, EdgeTriplet},
    error::{Error, Result},
    tree::{smallest_power_at_least, K2Tree, K2TreeBuilder, TreeIndex},
    vertex::{NumEdges, VertexId},
};

/// One graph partition: a compressed edge set with tree-ordered edge
/// attributes and a local vertex attribute map.
pub struct EdgePartition<V, E> {
    vertex_attrs: Arc<FxHashMap<VertexId, V>>,
    edge_attrs: Arc<[E]>,
    tree: Arc<K2Tree>,
    src_offset: VertexId,
    dst_offset: VertexId,
    /// Occupied local rows: `src_index[line]` iff some edge starts there.
    src_index: BitSet,
    /// Occupied local columns: `dst_index[col]` iff some edge ends there.
    dst_index: BitSet,
    /// Active vertices, indexed by `vid - min(src_offset, dst_offset)`.
    active_set: Option<BitSet>,
}

impl<V, E> Clone for EdgePartition<V, E> {
    fn clone(&self) -> Self {
        EdgePartition {
            vertex_attrs: Arc::clone(&self.vertex_attrs),
            edge_attrs: Arc::clone(&self.edge_attrs),
            tree: Arc::clone(&self.tree),
            src_offset: self.src_offset,
            dst_offset: self.dst_offset,
            src_index: self.src_index.clone(),
            dst_index: self.dst_index.clone(),
            active_set: self.active_set.clone(),
        }
    }
}

impl<V, E> std::fmt::Debug for EdgePartition<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgePartition")
            .field("edges", &self.number_of_edges())
            .field("size", &self.tree.size())
            .field("src_offset", &self.src_offset)
            .field("dst_offset", &self.dst_offset)
            .field("actives", &self.num_actives())
            .finish()
    }
}

impl<V, E> EdgePartition<V, E> {
    /// Builds a partition for parameter `k` from an unordered edge stream.
    ///
    /// Duplicate src/dst pairs collapse to one edge; the **last** streamed
    /// attribute wins. The local origin becomes the componentwise minimum
    /// of all ids, the matrix side the smallest power of `k` covering the
    /// id spread.
    ///
    /// Fails for `k < 2` or an id spread no `u64` power of `k` covers.
    pub fn build<I>(k: u64, edges: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Edge<E>>,
    {
        if k < 2 {
            return Err(Error::InvalidArgument(format!(
                "subdivision parameter k must be at least 2, got {k}"
            )));
        }

        let edges: Vec<Edge<E>> = edges.into_iter().map(Into::into).collect();

        let src_offset = edges.iter().map(|e| e.src).min().unwrap_or(0);
        let dst_offset = edges.iter().map(|e| e.dst).min().unwrap_or(0);
        let bound = edges
            .iter()
            .map(|e| (e.src - src_offset).max(e.dst - dst_offset) + 1)
            .max()
            .unwrap_or(0);
        let (size, height) = smallest_power_at_least(k, bound)?;

        debug!(k, size, edges = edges.len(), "building edge partition");

        Ok(Self::assemble(
            k,
            size,
            height,
            src_offset,
            dst_offset,
            Arc::new(FxHashMap::default()),
            None,
            edges
                .into_iter()
                .map(|e| (e.src - src_offset, e.dst - dst_offset, e.attr)),
        ))
    }

    /// Rebuilds tree, index bitsets, and attribute array from local edges.
    ///
    /// The workhorse behind every structural transformation: edges may
    /// arrive in any order and may repeat (last attribute wins).
    #[allow(clippy::too_many_arguments)]
    fn assemble<E2>(
        k: u64,
        size: u64,
        height: u32,
        src_offset: VertexId,
        dst_offset: VertexId,
        vertex_attrs: Arc<FxHashMap<VertexId, V>>,
        active_set: Option<BitSet>,
        local_edges: impl IntoIterator<Item = (u64, u64, E2)>,
    ) -> EdgePartition<V, E2> {
        let mut builder = K2TreeBuilder::for_matrix_size(k, size, height)
            .expect("dense builder exceeds addressable memory");
        let mut src_index = BitSet::new(size);
        let mut dst_index = BitSet::new(size);

        let mut keyed = Vec::new();
        for (line, col, attr) in local_edges {
            src_index.set_bit(line);
            dst_index.set_bit(col);
            keyed.push((builder.add_edge(line, col), attr));
        }

        let tree = builder.build();
        let edge_attrs: Arc<[E2]> = sort_by_tree_order(keyed).into();
        debug_assert_eq!(edge_attrs.len() as u64, tree.edge_count());

        EdgePartition {
            vertex_attrs,
            edge_attrs,
            tree: Arc::new(tree),
            src_offset,
            dst_offset,
            src_index,
            dst_index,
            active_set,
        }
    }

    /// Translates an active set into a new window after an origin change.
    fn rewindow_active(
        active: &Option<BitSet>,
        old_base: VertexId,
        new_base: VertexId,
        new_window: u64,
    ) -> Option<BitSet> {
        active.as_ref().map(|set| {
            let mut out = BitSet::new(new_window);
            for i in set.iter_set_bits() {
                let vid = old_base + i;
                if vid >= new_base && vid - new_base < new_window {
                    out.set_bit(vid - new_base);
                }
            }
            out
        })
    }

    /// The bitset length covering both id ranges relative to the smaller
    /// offset.
    fn active_window(src_offset: VertexId, dst_offset: VertexId, size: u64) -> u64 {
        src_offset.max(dst_offset) - src_offset.min(dst_offset) + size
    }

    /// Maps a global id onto a local coordinate.
    fn local(&self, id: VertexId, offset: VertexId) -> Result<u64> {
        match id.checked_sub(offset) {
            Some(local) if local < self.tree.size() => Ok(local),
            _ => Err(Error::Index {
                index: id,
                len: self.tree.size(),
            }),
        }
    }

    // ---------- Accessors ----------

    /// The subdivision parameter `k`.
    #[inline(always)]
    pub fn k(&self) -> u64 {
        self.tree.k()
    }

    /// The underlying compressed tree.
    #[inline(always)]
    pub fn tree(&self) -> &K2Tree {
        &self.tree
    }

    /// The local adjacency matrix side length.
    #[inline(always)]
    pub fn matrix_size(&self) -> u64 {
        self.tree.size()
    }

    /// The global id of local row 0.
    #[inline(always)]
    pub fn src_offset(&self) -> VertexId {
        self.src_offset
    }

    /// The global id of local column 0.
    #[inline(always)]
    pub fn dst_offset(&self) -> VertexId {
        self.dst_offset
    }

    /// The number of (distinct) edges in the partition.
    #[inline(always)]
    pub fn number_of_edges(&self) -> NumEdges {
        self.edge_attrs.len() as NumEdges
    }

    /// The number of edges as a `usize`.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.edge_attrs.len()
    }

    /// Returns `true` if the partition holds no edges.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.edge_attrs.is_empty()
    }

    /// The number of distinct local source vertices.
    pub fn src_index_size(&self) -> u64 {
        self.src_index.cardinality()
    }

    /// The number of distinct local destination vertices.
    pub fn dst_index_size(&self) -> u64 {
        self.dst_index.cardinality()
    }

    /// The number of vertices in the active set, `0` if none was installed.
    pub fn num_actives(&self) -> u64 {
        self.active_set.as_ref().map_or(0, BitSet::cardinality)
    }

    /// Whether `id` is active. Without an installed active set every vertex
    /// counts as active.
    pub fn is_active(&self, id: VertexId) -> bool {
        match &self.active_set {
            None => true,
            Some(set) => {
                let base = self.src_offset.min(self.dst_offset);
                id >= base && id - base < set.number_of_bits() && set.get_bit(id - base)
            }
        }
    }

    /// Tests whether the partition contains the edge `(src, dst)`.
    ///
    /// Ids outside the partition window simply yield `false`.
    pub fn has_edge(&self, src: VertexId, dst: VertexId) -> bool {
        match (
            self.local(src, self.src_offset),
            self.local(dst, self.dst_offset),
        ) {
            (Ok(line), Ok(col)) => self.tree.has_edge(line, col),
            _ => false,
        }
    }

    /// Looks up the attribute of edge `(src, dst)`.
    ///
    /// Returns `Ok(None)` for an absent edge and [`Error::Index`] for ids
    /// outside the partition window.
    pub fn edge_attr(&self, src: VertexId, dst: VertexId) -> Result<Option<&E>> {
        let line = self.local(src, self.src_offset)?;
        let col = self.local(dst, self.dst_offset)?;

        Ok(self
            .tree
            .row_iter(line)
            .find(|&(c, _)| c == col)
            .map(|(_, slot)| &self.edge_attrs[slot as usize]))
    }

    // ---------- Iteration ----------

    /// Returns an iterator over all edges in tree order, with global ids.
    pub fn iter(&self) -> impl Iterator<Item = Edge<E>> + '_
    where
        E: Clone,
    {
        self.tree
            .iter()
            .zip(self.edge_attrs.iter())
            .map(move |((line, col), attr)| {
                Edge::new(line + self.src_offset, col + self.dst_offset, attr.clone())
            })
    }

    /// Returns the stable [`TreeIndex`] keys of all edges in tree order —
    /// the keys the attribute array is sorted by.
    pub fn tree_indices(&self) -> impl Iterator<Item = TreeIndex> + '_ {
        let (k, height) = (self.tree.k(), self.tree.height());
        self.tree
            .iter()
            .map(move |(line, col)| TreeIndex::from_coords(k, height, line, col))
    }

    /// Returns an iterator over all edges joined with the vertex attributes
    /// of their endpoints.
    ///
    /// `include_src` / `include_dst` suppress the respective lookups;
    /// suppressed or missing attributes yield `None`.
    pub fn triplet_iter(
        &self,
        include_src: bool,
        include_dst: bool,
    ) -> impl Iterator<Item = EdgeTriplet<V, E>> + '_
    where
        V: Clone,
        E: Clone,
    {
        self.iter().map(move |edge| EdgeTriplet {
            src_attr: include_src
                .then(|| self.vertex_attrs.get(&edge.src).cloned())
                .flatten(),
            dst_attr: include_dst
                .then(|| self.vertex_attrs.get(&edge.dst).cloned())
                .flatten(),
            src: edge.src,
            dst: edge.dst,
            attr: edge.attr,
        })
    }

    // ---------- Vertex state ----------

    /// Returns a partition with the given vertices flagged active.
    ///
    /// Ids outside the partition's id window are ignored; they can never
    /// satisfy an activeness test here.
    pub fn with_active_set<I>(&self, actives: I) -> Self
    where
        I: IntoIterator<Item = VertexId>,
    {
        let base = self.src_offset.min(self.dst_offset);
        let window = Self::active_window(self.src_offset, self.dst_offset, self.tree.size());

        let mut set = BitSet::new(window);
        for id in actives {
            if id >= base && id - base < window {
                set.set_bit(id - base);
            }
        }

        let mut partition = self.clone();
        partition.active_set = Some(set);
        partition
    }

    /// Returns a partition sharing this one's edges but carrying no vertex
    /// attributes.
    pub fn without_vertex_attributes<V2>(&self) -> EdgePartition<V2, E> {
        EdgePartition {
            vertex_attrs: Arc::new(FxHashMap::default()),
            edge_attrs: Arc::clone(&self.edge_attrs),
            tree: Arc::clone(&self.tree),
            src_offset: self.src_offset,
            dst_offset: self.dst_offset,
            src_index: self.src_index.clone(),
            dst_index: self.dst_index.clone(),
            active_set: self.active_set.clone(),
        }
    }

    /// Returns a partition with the given vertex attributes overlaid onto
    /// the existing mapping. Tree and edge attributes are shared.
    pub fn update_vertices<I>(&self, updates: I) -> Self
    where
        I: IntoIterator<Item = (VertexId, V)>,
        V: Clone,
    {
        let mut map = (*self.vertex_attrs).clone();
        map.extend(updates);

        let mut partition = self.clone();
        partition.vertex_attrs = Arc::new(map);
        partition
    }

    // ---------- Edge transformations ----------

    /// Returns a partition with every attribute replaced by
    /// `f(src, dst, attr)`, sharing the tree.
    pub fn map<E2, F>(&self, mut f: F) -> EdgePartition<V, E2>
    where
        F: FnMut(VertexId, VertexId, &E) -> E2,
    {
        let attrs: Vec<E2> = self
            .tree
            .iter()
            .zip(self.edge_attrs.iter())
            .map(|((line, col), attr)| {
                f(line + self.src_offset, col + self.dst_offset, attr)
            })
            .collect();

        EdgePartition {
            vertex_attrs: Arc::clone(&self.vertex_attrs),
            edge_attrs: attrs.into(),
            tree: Arc::clone(&self.tree),
            src_offset: self.src_offset,
            dst_offset: self.dst_offset,
            src_index: self.src_index.clone(),
            dst_index: self.dst_index.clone(),
            active_set: self.active_set.clone(),
        }
    }

    /// Returns a partition whose attributes are consumed from an iterator
    /// in tree order, sharing the tree.
    ///
    /// Fails with [`Error::Shape`] unless the iterator yields exactly one
    /// attribute per edge.
    pub fn map_attrs<E2, I>(&self, attrs: I) -> Result<EdgePartition<V, E2>>
    where
        I: IntoIterator<Item = E2>,
    {
        let mut iter = attrs.into_iter();
        let mut collected = Vec::with_capacity(self.len());
        for _ in 0..self.len() {
            match iter.next() {
                Some(attr) => collected.push(attr),
                None => {
                    return Err(Error::Shape {
                        expected: self.number_of_edges(),
                        got: collected.len() as u64,
                    })
                }
            }
        }
        let surplus = iter.count();
        if surplus > 0 {
            return Err(Error::Shape {
                expected: self.number_of_edges(),
                got: self.number_of_edges() + surplus as u64,
            });
        }

        Ok(EdgePartition {
            vertex_attrs: Arc::clone(&self.vertex_attrs),
            edge_attrs: collected.into(),
            tree: Arc::clone(&self.tree),
            src_offset: self.src_offset,
            dst_offset: self.dst_offset,
            src_index: self.src_index.clone(),
            dst_index: self.dst_index.clone(),
            active_set: self.active_set.clone(),
        })
    }

    /// Returns a partition restricted to the triplets satisfying both the
    /// vertex predicate (on both endpoints) and the edge predicate.
    ///
    /// # Panics
    /// Panics if an endpoint of any edge has no vertex attribute; the
    /// vertex layer must route attributes before filtering.
    pub fn filter<EP, VP>(&self, mut epred: EP, mut vpred: VP) -> Self
    where
        EP: FnMut(&EdgeTriplet<V, E>) -> bool,
        VP: FnMut(VertexId, &V) -> bool,
        V: Clone,
        E: Clone,
    {
        let attr_of = |id: VertexId| {
            self.vertex_attrs
                .get(&id)
                .unwrap_or_else(|| panic!("vertex attribute missing for {id}"))
        };

        let kept = self
            .tree
            .iter()
            .zip(self.edge_attrs.iter())
            .filter_map(|((line, col), attr)| {
                let (src, dst) = (line + self.src_offset, col + self.dst_offset);
                let (src_attr, dst_attr) = (attr_of(src), attr_of(dst));

                if !vpred(src, src_attr) || !vpred(dst, dst_attr) {
                    return None;
                }

                let triplet = EdgeTriplet {
                    src,
                    dst,
                    src_attr: Some(src_attr.clone()),
                    dst_attr: Some(dst_attr.clone()),
                    attr: attr.clone(),
                };
                epred(&triplet).then(|| (line, col, attr.clone()))
            });

        Self::assemble(
            self.k(),
            self.tree.size(),
            self.tree.height(),
            self.src_offset,
            self.dst_offset,
            Arc::clone(&self.vertex_attrs),
            self.active_set.clone(),
            kept,
        )
    }

    /// Returns the transposed partition: every edge `(src, dst, attr)`
    /// becomes `(dst, src, attr)`, offsets swap, and the attribute array is
    /// re-paired with the transposed tree order.
    pub fn reverse(&self) -> Self
    where
        E: Clone,
    {
        let transposed = self
            .tree
            .iter()
            .zip(self.edge_attrs.iter())
            .map(|((line, col), attr)| (col, line, attr.clone()));

        Self::assemble(
            self.k(),
            self.tree.size(),
            self.tree.height(),
            self.dst_offset,
            self.src_offset,
            Arc::clone(&self.vertex_attrs),
            self.active_set.clone(),
            transposed,
        )
    }

    /// Returns a partition containing this one's edges plus `new_edges`.
    ///
    /// Re-adding an existing src/dst pair replaces its attribute. The
    /// matrix grows (and the origin moves) as needed to cover the combined
    /// id spread; existing edges keep their global coordinates throughout.
    ///
    /// Fails if the combined spread exceeds what a `u64` power of `k` can
    /// cover.
    pub fn add_edges<I>(&self, new_edges: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Edge<E>>,
        E: Clone,
    {
        let new_edges: Vec<Edge<E>> = new_edges.into_iter().map(Into::into).collect();
        if new_edges.is_empty() {
            return Ok(self.clone());
        }

        if self.is_empty() {
            // No established origin yet: place it at the new edges
            let mut partition = Self::build(self.k(), new_edges)?;
            partition.vertex_attrs = Arc::clone(&self.vertex_attrs);
            partition.active_set = Self::rewindow_active(
                &self.active_set,
                self.src_offset.min(self.dst_offset),
                partition.src_offset.min(partition.dst_offset),
                Self::active_window(
                    partition.src_offset,
                    partition.dst_offset,
                    partition.tree.size(),
                ),
            );
            return Ok(partition);
        }

        let src_offset = self
            .src_offset
            .min(new_edges.iter().map(|e| e.src).min().unwrap());
        let dst_offset = self
            .dst_offset
            .min(new_edges.iter().map(|e| e.dst).min().unwrap());
        let (shift_line, shift_col) = (self.src_offset - src_offset, self.dst_offset - dst_offset);

        // Extent of both edge sets in the moved coordinate system
        let old_max_line = self.src_index.iter_set_bits().last().unwrap() + shift_line;
        let old_max_col = self.dst_index.iter_set_bits().last().unwrap() + shift_col;
        let new_max_line = new_edges.iter().map(|e| e.src - src_offset).max().unwrap();
        let new_max_col = new_edges.iter().map(|e| e.dst - dst_offset).max().unwrap();
        let bound = old_max_line
            .max(old_max_col)
            .max(new_max_line)
            .max(new_max_col)
            + 1;
        let (size, height) = smallest_power_at_least(self.k(), bound)?;

        debug!(
            added = new_edges.len(),
            size,
            shift_line,
            shift_col,
            "adding edges to partition"
        );

        let active = Self::rewindow_active(
            &self.active_set,
            self.src_offset.min(self.dst_offset),
            src_offset.min(dst_offset),
            Self::active_window(src_offset, dst_offset, size),
        );

        let existing = self
            .tree
            .iter()
            .zip(self.edge_attrs.iter())
            .map(|((line, col), attr)| (line + shift_line, col + shift_col, attr.clone()));
        let added = new_edges
            .into_iter()
            .map(|e| (e.src - src_offset, e.dst - dst_offset, e.attr));

        Ok(Self::assemble(
            self.k(),
            size,
            height,
            src_offset,
            dst_offset,
            Arc::clone(&self.vertex_attrs),
            active,
            existing.chain(added),
        ))
    }

    /// Returns a partition without the given src/dst pairs.
    ///
    /// Pairs outside the partition window or not present are ignored. The
    /// index bitsets are recomputed from the surviving edges, keeping the
    /// "set leaf implies set index bit" invariant intact for rows and
    /// columns that still hold other edges.
    pub fn remove_edges<I>(&self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (VertexId, VertexId)>,
        E: Clone,
    {
        let (k, height, size) = (self.k(), self.tree.height(), self.tree.size());

        let mut builder = self.tree.to_builder();
        let mut removed: FxHashSet<TreeIndex> = FxHashSet::default();
        for (src, dst) in pairs {
            let (line, col) = match (
                self.local(src, self.src_offset),
                self.local(dst, self.dst_offset),
            ) {
                (Ok(line), Ok(col)) => (line, col),
                _ => continue,
            };
            if builder.remove_edge(line, col) {
                removed.insert(TreeIndex::from_coords(k, height, line, col));
            }
        }

        debug!(removed = removed.len(), "removing edges from partition");

        // Surviving attributes keep their relative order, which is exactly
        // the rebuilt tree's order
        let edge_attrs: Vec<E> = self
            .tree
            .iter()
            .zip(self.edge_attrs.iter())
            .filter(|&((line, col), _)| {
                !removed.contains(&TreeIndex::from_coords(k, height, line, col))
            })
            .map(|(_, attr)| attr.clone())
            .collect();

        let tree = builder.build();
        debug_assert_eq!(edge_attrs.len() as u64, tree.edge_count());

        let mut src_index = BitSet::new(size);
        let mut dst_index = BitSet::new(size);
        for (line, col) in tree.iter() {
            src_index.set_bit(line);
            dst_index.set_bit(col);
        }

        EdgePartition {
            vertex_attrs: Arc::clone(&self.vertex_attrs),
            edge_attrs: edge_attrs.into(),
            tree: Arc::new(tree),
            src_offset: self.src_offset,
            dst_offset: self.dst_offset,
            src_index,
            dst_index,
            active_set: self.active_set.clone(),
        }
    }

    /// Joins this partition with another on global src/dst pairs, emitting
    /// `f(src, dst, attr_a, attr_b)` per common edge.
    ///
    /// Both trees iterate in Morton order, so the join is a single merge
    /// walk over both streams. Morton order is only consistent between the
    /// operands when they share an origin; partitions with different
    /// offsets or a different `k` are rejected.
    pub fn inner_join<V2, E2, E3, F>(
        &self,
        other: &EdgePartition<V2, E2>,
        mut f: F,
    ) -> Result<EdgePartition<V, E3>>
    where
        F: FnMut(VertexId, VertexId, &E, &E2) -> E3,
    {
        if self.k() != other.k() {
            return Err(Error::InvalidArgument(format!(
                "inner join requires matching subdivision parameters, got {} and {}",
                self.k(),
                other.k()
            )));
        }
        if self.src_offset != other.src_offset || self.dst_offset != other.dst_offset {
            return Err(Error::InvalidArgument(format!(
                "inner join requires a common origin, got ({}, {}) and ({}, {})",
                self.src_offset, other.src_offset, self.dst_offset, other.dst_offset
            )));
        }

        let k = self.k();
        let (height_a, height_b) = (self.tree.height(), other.tree.height());

        // Tree-index keys are invariant under height padding, so the two
        // streams are mutually comparable even for different matrix sizes
        let mut a = self
            .tree
            .iter()
            .zip(self.edge_attrs.iter())
            .map(|((line, col), attr)| {
                (TreeIndex::from_coords(k, height_a, line, col), line, col, attr)
            })
            .peekable();
        let mut b = other
            .tree
            .iter()
            .zip(other.edge_attrs.iter())
            .map(|((line, col), attr)| (TreeIndex::from_coords(k, height_b, line, col), attr))
            .peekable();

        let mut joined: Vec<(u64, u64, E3)> = Vec::new();
        while let (Some((key_a, ..)), Some((key_b, _))) = (a.peek(), b.peek()) {
            match key_a.cmp(key_b) {
                std::cmp::Ordering::Less => {
                    a.next();
                }
                std::cmp::Ordering::Greater => {
                    b.next();
                }
                std::cmp::Ordering::Equal => {
                    let (_, line, col, attr_a) = a.next().unwrap();
                    let (_, attr_b) = b.next().unwrap();
                    joined.push((
                        line,
                        col,
                        f(
                            line + self.src_offset,
                            col + self.dst_offset,
                            attr_a,
                            attr_b,
                        ),
                    ));
                }
            }
        }

        Ok(Self::assemble(
            k,
            self.tree.size(),
            self.tree.height(),
            self.src_offset,
            self.dst_offset,
            Arc::clone(&self.vertex_attrs),
            self.active_set.clone(),
            joined,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use itertools::Itertools;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64Mcg;

    fn diagonal() -> EdgePartition<(), u64> {
        EdgePartition::build(2, (0..10).map(|i| (i, i, i))).unwrap()
    }

    #[test]
    fn tiny_identity() {
        let partition = diagonal();

        assert_eq!(partition.number_of_edges(), 10);
        assert_eq!(
            partition.iter().collect_vec(),
            (0..10).map(|i| Edge::new(i, i, i)).collect_vec()
        );
        assert_eq!(partition.src_index_size(), 10);
        assert_eq!(partition.dst_index_size(), 10);
        assert!(partition.has_edge(4, 4));
        assert!(!partition.has_edge(4, 5));
        assert_eq!(partition.edge_attr(4, 4).unwrap(), Some(&4));
        assert_eq!(partition.edge_attr(4, 5).unwrap(), None);
        assert!(partition.edge_attr(40, 5).is_err());
    }

    #[test]
    fn empty_partition() {
        let partition: EdgePartition<(), u64> =
            EdgePartition::build(2, Vec::<(u64, u64, u64)>::new()).unwrap();
        assert!(partition.is_empty());
        assert_eq!(partition.iter().count(), 0);
        assert_eq!(partition.src_index_size(), 0);
        assert!(!partition.has_edge(0, 0));
    }

    #[test]
    fn rejects_invalid_k() {
        assert!(EdgePartition::<(), u64>::build(1, vec![(0, 0, 0)]).is_err());
    }

    #[test]
    fn duplicate_pairs_collapse_last_wins() {
        let partition: EdgePartition<(), u64> =
            EdgePartition::build(2, vec![(3, 4, 1), (5, 6, 2), (3, 4, 7)]).unwrap();

        assert_eq!(partition.number_of_edges(), 2);
        assert_eq!(partition.edge_attr(3, 4).unwrap(), Some(&7));
        assert_eq!(partition.edge_attr(5, 6).unwrap(), Some(&2));
    }

    #[test]
    fn build_is_order_independent() {
        let rng = &mut Pcg64Mcg::seed_from_u64(21);

        for k in [2u64, 3, 4] {
            let mut edges = (0..200)
                .map(|_| {
                    (
                        rng.random_range(100..160u64),
                        rng.random_range(0..60u64),
                        rng.random_range(0..1000u64),
                    )
                })
                .collect_vec();
            // Keep one attribute per pair so shuffling cannot change winners
            edges.sort_unstable_by_key(|&(s, d, _)| (s, d));
            edges.dedup_by_key(|&mut (s, d, _)| (s, d));

            let partition: EdgePartition<(), u64> =
                EdgePartition::build(k, edges.clone()).unwrap();
            edges.shuffle(rng);
            let again: EdgePartition<(), u64> = EdgePartition::build(k, edges.clone()).unwrap();

            assert_eq!(
                partition.iter().collect_vec(),
                again.iter().collect_vec()
            );

            // Round trip: the yielded set is the input set
            assert_eq!(
                partition
                    .iter()
                    .map(|e| (e.src, e.dst, e.attr))
                    .sorted_unstable()
                    .collect_vec(),
                edges.iter().copied().sorted_unstable().collect_vec()
            );

            // Tree-index keys come out strictly increasing
            assert!(partition
                .tree_indices()
                .tuple_windows()
                .all(|(a, b)| a < b));
        }
    }

    #[test]
    fn map_aligns_attributes_with_edges() {
        let rng = &mut Pcg64Mcg::seed_from_u64(22);

        let edges = (0..150)
            .map(|_| {
                (
                    rng.random_range(0..50u64),
                    rng.random_range(0..50u64),
                    rng.random_range(0..100u64),
                )
            })
            .collect_vec();
        let partition: EdgePartition<(), u64> = EdgePartition::build(2, edges).unwrap();

        let mapped = partition.map(|src, dst, attr| src * 10_000 + dst * 100 + attr);
        for edge in mapped.iter() {
            let original = partition.edge_attr(edge.src, edge.dst).unwrap().unwrap();
            assert_eq!(edge.attr, edge.src * 10_000 + edge.dst * 100 + original);
        }

        // map with an iterator must match the edge count exactly
        let n = partition.len();
        assert!(partition.map_attrs(0..n as u64).is_ok());
        assert!(matches!(
            partition.map_attrs(0..n as u64 - 1),
            Err(Error::Shape { .. })
        ));
        assert!(matches!(
            partition.map_attrs(0..n as u64 + 3),
            Err(Error::Shape { .. })
        ));
    }

    #[test]
    fn add_edges_behind_the_origin() {
        let existing = vec![(4u64, 4u64, 16u64), (4, 5, 20), (5, 4, 20), (6, 6, 36)];
        let partition: EdgePartition<(), u64> = EdgePartition::build(2, existing).unwrap();
        assert_eq!(partition.src_offset(), 4);

        let grown = partition
            .add_edges(vec![(1u64, 1u64, 1u64), (1, 2, 2), (2, 1, 2)])
            .unwrap();

        assert_eq!(grown.number_of_edges(), 7);
        assert_eq!(grown.src_offset(), 1);
        assert_eq!(grown.dst_offset(), 1);
        for edge in grown.iter() {
            assert_eq!(edge.attr, edge.src * edge.dst);
        }
    }

    #[test]
    fn add_edges_past_the_extent() {
        let partition = diagonal();
        let grown = partition
            .add_edges(vec![(100u64, 100u64, 100u64)])
            .unwrap();

        assert_eq!(grown.number_of_edges(), 11);
        assert!(grown.matrix_size() >= 101);
        assert!(grown.has_edge(100, 100));
        for i in 0..10 {
            assert!(grown.has_edge(i, i));
        }
    }

    #[test]
    fn add_edges_replaces_existing_attributes() {
        let partition = diagonal();
        let updated = partition.add_edges(vec![(3u64, 3u64, 99u64)]).unwrap();

        assert_eq!(updated.number_of_edges(), 10);
        assert_eq!(updated.edge_attr(3, 3).unwrap(), Some(&99));
    }

    #[test]
    fn remove_edges_from_the_diagonal() {
        let partition = diagonal();
        let removed = partition.remove_edges(vec![(0, 0), (1, 1), (2, 2)]);

        assert_eq!(removed.number_of_edges(), 7);
        assert_eq!(
            removed.iter().collect_vec(),
            (3..10).map(|i| Edge::new(i, i, i)).collect_vec()
        );
        // Absent pairs and out-of-window pairs are ignored
        let unchanged = removed.remove_edges(vec![(0, 0), (500, 500)]);
        assert_eq!(unchanged.number_of_edges(), 7);
    }

    #[test]
    fn remove_keeps_shared_rows_indexed() {
        let partition: EdgePartition<(), u64> =
            EdgePartition::build(2, vec![(0u64, 0u64, 0u64), (0, 3, 1), (2, 3, 2)]).unwrap();
        let removed = partition.remove_edges(vec![(0, 0)]);

        // Row 0 and column 3 still hold edges
        assert_eq!(removed.src_index_size(), 2);
        assert_eq!(removed.dst_index_size(), 1);
    }

    #[test]
    fn add_remove_round_trip() {
        let rng = &mut Pcg64Mcg::seed_from_u64(23);

        for k in [2u64, 3, 4] {
            let base = (0..120)
                .map(|_| {
                    (
                        rng.random_range(20..70u64),
                        rng.random_range(20..70u64),
                        rng.random_range(0..100u64),
                    )
                })
                .unique_by(|&(s, d, _)| (s, d))
                .collect_vec();
            let extra = (0..40)
                .map(|_| {
                    (
                        rng.random_range(0..120u64),
                        rng.random_range(0..120u64),
                        rng.random_range(0..100u64),
                    )
                })
                .unique_by(|&(s, d, _)| (s, d))
                .filter(|&(s, d, _)| !base.iter().any(|&(bs, bd, _)| (bs, bd) == (s, d)))
                .collect_vec();

            let partition: EdgePartition<(), u64> = EdgePartition::build(k, base.clone()).unwrap();
            let round_tripped = partition
                .add_edges(extra.clone())
                .unwrap()
                .remove_edges(extra.iter().map(|&(s, d, _)| (s, d)));

            assert_eq!(
                round_tripped
                    .iter()
                    .map(|e| (e.src, e.dst, e.attr))
                    .sorted_unstable()
                    .collect_vec(),
                base.iter().copied().sorted_unstable().collect_vec()
            );
        }
    }

    #[test]
    fn reverse_swaps_endpoints_and_keeps_attributes() {
        let partition: EdgePartition<(), u64> =
            EdgePartition::build(2, (0..10).map(|i| (i, i + 1, i))).unwrap();
        let reversed = partition.reverse();

        assert_eq!(reversed.number_of_edges(), 10);
        assert_eq!(reversed.src_offset(), partition.dst_offset());
        for i in 0..10 {
            assert_eq!(reversed.edge_attr(i + 1, i).unwrap(), Some(&i));
        }
        assert_eq!(
            reversed
                .iter()
                .map(|e| (e.src, e.dst, e.attr))
                .sorted_unstable()
                .collect_vec(),
            (0..10).map(|i| (i + 1, i, i)).collect_vec()
        );

        // An involution up to shared structure
        let back = reversed.reverse();
        assert_eq!(back.iter().collect_vec(), partition.iter().collect_vec());
    }

    #[test]
    fn inner_join_on_common_edges() {
        let p1 = EdgePartition::<(), i64>::build(2, (0..10i64).map(|i| (i as u64, i as u64, i)))
            .unwrap();
        let p2 = p1.map(|_, _, attr| -attr);

        let joined = p1.inner_join(&p2, |_, _, a, b| a + b).unwrap();
        assert_eq!(joined.number_of_edges(), 10);
        assert!(joined.iter().all(|e| e.attr == 0));
    }

    #[test]
    fn inner_join_intersects() {
        let rng = &mut Pcg64Mcg::seed_from_u64(24);

        let all = (0..40u64)
            .flat_map(|line| (0..40u64).map(move |col| (line, col)))
            .collect_vec();
        let left = all
            .iter()
            .filter(|_| rng.random_bool(0.2))
            .map(|&(s, d)| (s, d, 1u64))
            .collect_vec();
        let right = all
            .iter()
            .filter(|_| rng.random_bool(0.2))
            .map(|&(s, d)| (s, d, 2u64))
            .collect_vec();

        // Anchor both partitions to the same origin and spread
        let anchor = [(0u64, 0u64), (39, 39)];
        let with_anchor = |edges: &[(u64, u64, u64)], attr: u64| {
            anchor
                .iter()
                .map(|&(s, d)| (s, d, attr))
                .chain(edges.iter().copied())
                .unique_by(|&(s, d, _)| (s, d))
                .collect_vec()
        };

        let p1: EdgePartition<(), u64> =
            EdgePartition::build(2, with_anchor(&left, 1)).unwrap();
        let p2: EdgePartition<(), u64> =
            EdgePartition::build(2, with_anchor(&right, 2)).unwrap();

        let joined = p1.inner_join(&p2, |_, _, a, b| a + b).unwrap();

        let expected = with_anchor(&left, 1)
            .iter()
            .map(|&(s, d, _)| (s, d))
            .filter(|&(s, d)| with_anchor(&right, 2).iter().any(|&(rs, rd, _)| (rs, rd) == (s, d)))
            .sorted_unstable()
            .collect_vec();

        assert_eq!(
            joined.iter().map(|e| (e.src, e.dst)).sorted_unstable().collect_vec(),
            expected
        );
        assert!(joined.iter().all(|e| e.attr == 3));
    }

    #[test]
    fn inner_join_rejects_mismatched_operands() {
        let p1 = diagonal();
        let shifted: EdgePartition<(), u64> =
            EdgePartition::build(2, (1..11).map(|i| (i, i, i))).unwrap();
        assert!(p1.inner_join(&shifted, |_, _, a, b| a + b).is_err());

        let other_k: EdgePartition<(), u64> =
            EdgePartition::build(4, (0..10).map(|i| (i, i, i))).unwrap();
        assert!(p1.inner_join(&other_k, |_, _, a, b| a + b).is_err());
    }

    #[test]
    fn vertex_attributes_and_triplets() {
        let partition = diagonal()
            .without_vertex_attributes::<char>()
            .update_vertices((0..10).map(|i| (i, if i % 2 == 0 { 'e' } else { 'o' })));

        for triplet in partition.triplet_iter(true, true) {
            let expected = if triplet.src % 2 == 0 { 'e' } else { 'o' };
            assert_eq!(triplet.src_attr, Some(expected));
            assert_eq!(triplet.dst_attr, Some(expected));
            assert_eq!(triplet.src, triplet.dst);
        }

        // Suppressed lookups yield None
        assert!(partition
            .triplet_iter(false, true)
            .all(|t| t.src_attr.is_none() && t.dst_attr.is_some()));
    }

    #[test]
    fn filter_by_vertex_and_edge_predicates() {
        let partition = diagonal()
            .without_vertex_attributes::<u64>()
            .update_vertices((0..10).map(|i| (i, i)));

        let filtered = partition.filter(|t| t.attr % 2 == 0, |_, &attr| attr < 8);

        assert_eq!(
            filtered.iter().map(|e| e.src).collect_vec(),
            vec![0, 2, 4, 6]
        );
        // Vertex attributes survive the rebuild
        assert_eq!(filtered.triplet_iter(true, false).count(), 4);
    }

    #[test]
    fn active_set_membership() {
        let partition = diagonal().with_active_set(vec![0, 2, 4, 400]);

        assert_eq!(partition.num_actives(), 3);
        assert!(partition.is_active(0));
        assert!(!partition.is_active(1));
        assert!(!partition.is_active(400));

        // Without an active set everything is active
        assert!(diagonal().is_active(7));
        assert_eq!(diagonal().num_actives(), 0);
    }

    #[test]
    fn active_set_survives_growth() {
        let partition = diagonal().with_active_set(vec![0, 5, 9]);
        let grown = partition.add_edges(vec![(63u64, 63u64, 0u64)]).unwrap();

        assert_eq!(grown.num_actives(), 3);
        assert!(grown.is_active(5));
        assert!(!grown.is_active(6));
    }
}
