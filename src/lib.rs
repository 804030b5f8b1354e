/*!
`k2part` is the compressed edge-partition core of a distributed
graph-processing engine: it stores the edges of one graph partition as a
**K²-tree** — a recursive quadtree-like bitmap over the local adjacency
matrix — together with per-edge attributes kept in tree order, and exposes
the operations a bulk-synchronous (Pregel-style) computation needs.

# Representation

A partition covers a window of the global id space. Global vertex ids are
`u64`; subtracting the partition's source/destination offsets yields local
matrix coordinates. The matrix itself is a [`K2Tree`](tree::K2Tree): two
packed bit sequences (internal subquadrants and cells) in which all-zero
subquadrants are skipped, giving `O(edges · log N)` bits for sparse
partitions.

Edge attributes live in a parallel array sorted by each edge's
[`TreeIndex`](tree::TreeIndex) — its Morton path through the tree — so the
`i`-th attribute belongs to the `i`-th edge the tree enumerates. Every
operation on a partition preserves this pairing.

# Design

Partitions are **immutable values**: transformations like
[`map`](partition::EdgePartition::map),
[`filter`](partition::EdgePartition::filter),
[`add_edges`](partition::EdgePartition::add_edges), or
[`reverse`](partition::EdgePartition::reverse) return new partitions that
structurally share the tree and attribute array with their predecessor
where possible. A partition is single-threaded; concurrent readers are
safe.

Message aggregation comes in three strategies (whole-edge scan, row-indexed
scan, column-indexed scan) sharing one accumulator type; see the
[`partition`] module.

# Usage

```
use k2part::prelude::*;

let partition: EdgePartition<(), u64> =
    EdgePartition::build(2, vec![(0u64, 1u64, 10u64), (1, 2, 20), (2, 0, 30)]).unwrap();

assert_eq!(partition.number_of_edges(), 3);
assert!(partition.has_edge(1, 2));

let ranks = partition.aggregate_messages_edge_scan(
    |ctx| ctx.send_to_dst(1u64),
    |a, b| a + b,
    TripletFields::NONE,
    EdgeActiveness::Neither,
);
assert_eq!(ranks.len(), 3);
```

# When to use

The crate implements the partition-local core only: the distributed
dataset layer, vertex attribute routing, drivers, and graph algorithms are
external collaborators that compose partitions through the operations
exposed here.
*/

pub mod attrs;
pub mod bitset;
pub mod edge;
pub mod error;
pub mod partition;
pub mod tree;
pub mod vertex;

/// `k2part::prelude` includes the partition type and everything needed to
/// build and scan one.
pub mod prelude {
    pub use super::{
        edge::{Edge, EdgeActiveness, EdgeTriplet, TripletFields},
        error::{Error, Result},
        partition::{AggregatingEdgeContext, EdgePartition},
        tree::{K2Tree, K2TreeBuilder, TreeIndex},
        vertex::{NumEdges, VertexId},
    };
}
