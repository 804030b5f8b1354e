/*!
# Edge Representation

This module defines the representation of edges and edge triplets.

- An [`Edge<E>`] consists of a global source id, a global destination id, and
  an attribute of type `E`.
- An [`EdgeTriplet<V, E>`] additionally carries the vertex attributes of both
  endpoints (where requested).
- [`TripletFields`] selects which vertex attributes a scan materializes.
- [`EdgeActiveness`] selects which edges participate in an aggregation pass
  with respect to the partition's active vertex set.
*/

use std::fmt::{Debug, Display};

use crate::vertex::VertexId;

/// A directed edge between two global vertex ids, carrying an attribute.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge<E> {
    pub src: VertexId,
    pub dst: VertexId,
    pub attr: E,
}

impl<E> Edge<E> {
    /// Creates a new edge.
    #[inline(always)]
    pub fn new(src: VertexId, dst: VertexId, attr: E) -> Self {
        Edge { src, dst, attr }
    }

    /// Returns the edge with endpoints swapped (`dst -> src`).
    #[inline(always)]
    pub fn reverse(self) -> Self {
        Edge {
            src: self.dst,
            dst: self.src,
            attr: self.attr,
        }
    }

    /// Returns `true` if the edge is a self-loop (`src == dst`).
    #[inline(always)]
    pub fn is_loop(&self) -> bool {
        self.src == self.dst
    }
}

impl<E: Display> Display for Edge<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{})", self.src, self.dst, self.attr)
    }
}

impl<E: Display> Debug for Edge<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as Display>::fmt(self, f)
    }
}

impl<E> From<(VertexId, VertexId, E)> for Edge<E> {
    fn from(value: (VertexId, VertexId, E)) -> Self {
        Edge::new(value.0, value.1, value.2)
    }
}

impl<E> From<Edge<E>> for (VertexId, VertexId, E) {
    fn from(value: Edge<E>) -> Self {
        (value.src, value.dst, value.attr)
    }
}

/// An edge joined with the vertex attributes of its endpoints.
///
/// `src_attr` / `dst_attr` are `None` when the producing scan was asked to
/// skip them (see [`TripletFields`]) or when the partition carries no
/// attribute for the endpoint.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EdgeTriplet<V, E> {
    pub src: VertexId,
    pub dst: VertexId,
    pub src_attr: Option<V>,
    pub dst_attr: Option<V>,
    pub attr: E,
}

/// Selects which vertex attributes a triplet-producing scan looks up.
///
/// Skipping an unused side avoids one hash lookup per edge.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TripletFields {
    pub use_src: bool,
    pub use_dst: bool,
}

impl TripletFields {
    /// Look up neither vertex attribute.
    pub const NONE: Self = TripletFields {
        use_src: false,
        use_dst: false,
    };

    /// Look up the source attribute only.
    pub const SRC: Self = TripletFields {
        use_src: true,
        use_dst: false,
    };

    /// Look up the destination attribute only.
    pub const DST: Self = TripletFields {
        use_src: false,
        use_dst: true,
    };

    /// Look up both vertex attributes.
    pub const ALL: Self = TripletFields {
        use_src: true,
        use_dst: true,
    };
}

impl Default for TripletFields {
    fn default() -> Self {
        Self::ALL
    }
}

/// Which edges participate in an aggregation pass, relative to the
/// partition's active vertex set.
///
/// Without an active set, every edge participates in every mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EdgeActiveness {
    /// Every edge participates.
    Neither,
    /// Only edges whose source is active.
    SrcOnly,
    /// Only edges whose destination is active.
    DstOnly,
    /// Only edges with both endpoints active.
    Both,
    /// Only edges with at least one active endpoint.
    Either,
}
