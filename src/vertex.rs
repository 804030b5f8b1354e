/*!
# Vertex Representation

This module defines the identifier types used for vertices and edge counts.

- A [`VertexId`] is a global, unsigned 64-bit vertex identifier. Partitions
  translate between global ids and local matrix coordinates via their
  source/destination offsets.
- A [`NumEdges`] counts edges within one partition.
*/

/// Global vertex identifier.
///
/// We use `u64` as distributed graphs routinely exceed `2^32` vertices; the
/// per-partition coordinate range is the spread of ids inside the partition,
/// not the global id space, so the matrix side stays small regardless.
pub type VertexId = u64;

/// Type alias representing the number of edges in a partition.
pub type NumEdges = u64;
