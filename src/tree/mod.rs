/*!
# K²-Tree

A K²-tree stores an `N×N` boolean matrix as a recursive decomposition into
`k×k` subquadrants, encoded as one packed bit sequence per section:

- the **internal** section holds one bit per subquadrant of every level
  above the cells, `1` iff the subquadrant contains any set cell;
- the **leaves** section holds the cells of every non-empty bottom-level
  block.

All-zero subquadrants are skipped entirely, which is what compresses sparse
matrices to `O(cells · log N)` bits. Navigation uses *rank*: the children
of the set internal bit at position `p` start at `rank(p) · k²`, where
`rank(p)` counts the set bits in `[0, p]`.

## Types

- [`K2Tree`]: the immutable compressed tree.
- [`K2TreeBuilder`]: the dense mutable intermediate used for construction
  and incremental mutation.
- [`TreeIndex`]: the Morton-path key ordering edges in tree order.
- [`Direction`]: forward or transposed read of the same bits.
*/

mod builder;
mod index;
mod iter;
mod k2;

pub use builder::K2TreeBuilder;
pub use index::TreeIndex;
pub use iter::{RestrictedAxisIter, TreeEdgeIter};
pub use k2::K2Tree;

use crate::error::{Error, Result};

/// Whether a tree's bits are read as stored or transposed.
///
/// A reversed tree is a pure view: iteration walks children in transposed
/// Morton order and swaps the coordinates it yields, with no structural
/// change to the bits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reversed,
}

impl Direction {
    /// Returns the opposite direction.
    #[inline(always)]
    pub fn flipped(self) -> Self {
        match self {
            Direction::Forward => Direction::Reversed,
            Direction::Reversed => Direction::Forward,
        }
    }
}

/// Computes the smallest power `k^h >= n` with `h >= 1`.
///
/// Returns `(k^h, h)` or an error if the power exceeds `u64`.
pub(crate) fn smallest_power_at_least(k: u64, n: u64) -> Result<(u64, u32)> {
    debug_assert!(k >= 2);
    let mut size = k;
    let mut height = 1u32;
    while size < n {
        size = size.checked_mul(k).ok_or_else(|| {
            Error::InvalidArgument(format!("no power of {k} covering {n} fits into 64 bits"))
        })?;
        height += 1;
    }
    Ok((size, height))
}

/// Returns `h` such that `x == k^h`, or `None` if `x` is no power of `k`.
pub(crate) fn exact_power_of(k: u64, x: u64) -> Option<u32> {
    debug_assert!(k >= 2);
    let mut p = 1u64;
    let mut h = 0u32;
    while p < x {
        p = p.checked_mul(k)?;
        h += 1;
    }
    (p == x).then_some(h)
}
