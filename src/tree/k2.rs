/*!
# Compressed K²-Tree

The immutable, compressed form of the tree. See the [module docs](super)
for the encoding and the [`K2TreeBuilder`](super::K2TreeBuilder) for the
dense mutable form every mutation goes through.
*/

use tracing::trace;

use crate::{
    bitset::BitSet,
    error::{Error, Result},
    tree::{
        exact_power_of, iter::{RestrictedAxisIter, TreeEdgeIter}, Direction, K2TreeBuilder,
        TreeIndex,
    },
};

/// An immutable compressed K²-tree over an `size × size` boolean matrix.
///
/// The first `internal_count` bits describe the internal levels in Morton
/// order, level by level; the remaining `leaves_count` bits describe the
/// cells of all surviving bottom-level blocks. The root is virtual and not
/// stored.
///
/// ### Invariants
///
/// 1. `size == k^height` and `k >= 2`
/// 2. an internal bit is set iff its subquadrant contains a set cell
/// 3. `leaves_count` is a multiple of `k²`; an empty tree has no bits at all
///
/// These invariants are asserted on construction, allowing navigation to
/// proceed unchecked.
#[derive(Clone, PartialEq, Eq)]
pub struct K2Tree {
    k: u64,
    size: u64,
    height: u32,
    internal_count: u64,
    leaves_count: u64,
    bits: BitSet,
    direction: Direction,
}

impl std::fmt::Debug for K2Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("K2Tree")
            .field("k", &self.k)
            .field("size", &self.size)
            .field("internal_count", &self.internal_count)
            .field("leaves_count", &self.leaves_count)
            .field("direction", &self.direction)
            .finish()
    }
}

impl K2Tree {
    /// Assembles a tree from its parts, checking the structural invariants.
    pub(crate) fn from_parts(
        k: u64,
        size: u64,
        internal_count: u64,
        leaves_count: u64,
        bits: BitSet,
    ) -> Self {
        assert!(k >= 2);
        let height = exact_power_of(k, size).expect("matrix side must be a power of k");
        assert!(height >= 1);
        assert_eq!(
            bits.number_of_bits(),
            internal_count + leaves_count,
            "bit sequence does not match section counts"
        );
        assert_eq!(
            leaves_count % (k * k),
            0,
            "leaf section is not a whole number of k² blocks"
        );

        K2Tree {
            k,
            size,
            height,
            internal_count,
            leaves_count,
            bits,
            direction: Direction::Forward,
        }
    }

    /// Builds a tree for parameter `k` from an iterator of `(line, col)`
    /// cells. The matrix side is the smallest power of `k` covering the
    /// largest coordinate.
    ///
    /// Fails for `k < 2` or a coordinate range no `u64` power of `k` covers.
    pub fn from_edges<I>(k: u64, edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u64, u64)>,
    {
        let edges: Vec<(u64, u64)> = edges.into_iter().collect();
        let bound = edges
            .iter()
            .map(|&(line, col)| line.max(col) + 1)
            .max()
            .unwrap_or(0);

        let mut builder = K2TreeBuilder::new(k, bound)?;
        for (line, col) in edges {
            builder.add_edge(line, col);
        }
        Ok(builder.build())
    }

    /// The subdivision parameter `k`.
    #[inline(always)]
    pub fn k(&self) -> u64 {
        self.k
    }

    /// The matrix side length, a power of `k`.
    #[inline(always)]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The number of levels below the virtual root.
    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The number of bits in the internal section.
    #[inline(always)]
    pub fn internal_count(&self) -> u64 {
        self.internal_count
    }

    /// The number of bits in the leaves section.
    #[inline(always)]
    pub fn leaves_count(&self) -> u64 {
        self.leaves_count
    }

    /// Whether this tree is read forward or transposed.
    #[inline(always)]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns `true` if the matrix contains no set cell.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.leaves_count == 0
    }

    /// The number of set cells (edges).
    pub fn edge_count(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.bits
                .count(self.internal_count, self.internal_count + self.leaves_count - 1)
        }
    }

    #[inline(always)]
    pub(crate) fn bits(&self) -> &BitSet {
        &self.bits
    }

    /// The number of set bits in `[0, p]` of the compressed sequence.
    ///
    /// The child block of the set internal bit at `p` starts at
    /// `rank(p) · k²`; the virtual root's block starts at 0.
    #[inline(always)]
    pub(crate) fn rank(&self, p: u64) -> u64 {
        self.bits.count(0, p)
    }

    /// Returns an iterator over all set cells in Morton (tree) order,
    /// honoring the tree's [`Direction`].
    pub fn iter(&self) -> TreeEdgeIter<'_> {
        TreeEdgeIter::new(self)
    }

    /// Returns an iterator over the set cells of row `line` (of the viewed
    /// matrix), yielding `(col, attribute_slot)` in ascending column order.
    ///
    /// # Panics
    /// Panics if `line >= size`.
    pub fn row_iter(&self, line: u64) -> RestrictedAxisIter<'_> {
        // A viewed row of a reversed tree is a stored column
        RestrictedAxisIter::new(self, self.direction == Direction::Reversed, line)
    }

    /// Returns an iterator over the set cells of column `col` (of the viewed
    /// matrix), yielding `(line, attribute_slot)` in ascending line order.
    ///
    /// # Panics
    /// Panics if `col >= size`.
    pub fn col_iter(&self, col: u64) -> RestrictedAxisIter<'_> {
        RestrictedAxisIter::new(self, self.direction == Direction::Forward, col)
    }

    /// Tests whether cell `(line, col)` of the viewed matrix is set.
    ///
    /// Descends one block per level, so the cost is `height` ranks.
    ///
    /// # Panics
    /// Panics if `line >= size` or `col >= size`.
    pub fn has_edge(&self, line: u64, col: u64) -> bool {
        assert!(
            line < self.size && col < self.size,
            "cell ({line},{col}) out of range for matrix side {}",
            self.size
        );

        if self.is_empty() {
            return false;
        }

        let (line, col) = match self.direction {
            Direction::Forward => (line, col),
            Direction::Reversed => (col, line),
        };

        let index = TreeIndex::from_coords(self.k, self.height, line, col);
        let mut base = 0;
        for level in 1..=self.height {
            let pos = base + index.digit_at(self.k, self.height, level);
            if !self.bits.get_bit(pos) {
                return false;
            }
            if level == self.height {
                return true;
            }
            base = self.rank(pos) * self.k * self.k;
        }
        unreachable!("descent always terminates at the leaf level")
    }

    /// Returns a transposed view of this tree: same bits, flipped
    /// [`Direction`]. Iteration yields swapped coordinates in the Morton
    /// order of the transposed matrix.
    pub fn reverse(&self) -> K2Tree {
        let mut tree = self.clone();
        tree.direction = tree.direction.flipped();
        tree
    }

    /// Grows the matrix to `new_size`, placing the current tree in the
    /// top-left subquadrant.
    ///
    /// Prepends one internal block per added level with only the top-left
    /// child set; `leaves_count` is unchanged. An empty tree just adopts the
    /// new size. Fails if `new_size` is smaller than the current size or not
    /// a power of `k`.
    pub fn grow(&self, new_size: u64) -> Result<K2Tree> {
        let new_height = exact_power_of(self.k, new_size).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "grow target {new_size} is not a power of {}",
                self.k
            ))
        })?;
        if new_size < self.size {
            return Err(Error::InvalidArgument(format!(
                "grow target {new_size} is smaller than current size {}",
                self.size
            )));
        }
        if new_size == self.size {
            return Ok(self.clone());
        }

        let mut tree = self.clone();
        tree.size = new_size;
        tree.height = new_height;
        if self.is_empty() {
            return Ok(tree);
        }

        let k2 = self.k * self.k;
        let delta_levels = (new_height - self.height) as u64;
        trace!(
            old_size = self.size,
            new_size,
            delta_levels,
            "growing K²-tree"
        );

        let mut bits = BitSet::new(0);
        for _ in 0..delta_levels {
            bits.push_bit(true);
            for _ in 1..k2 {
                bits.push_bit(false);
            }
        }
        for i in 0..self.bits.number_of_bits() {
            bits.push_bit(self.bits.get_bit(i));
        }

        tree.internal_count = self.internal_count + delta_levels * k2;
        tree.bits = bits;
        Ok(tree)
    }

    /// Shrinks the matrix as long as every cell lives in the top-left child
    /// quadrant of the root, dropping one level per step. Stops at
    /// `size == k`. Idempotent.
    pub fn trim(&self) -> K2Tree {
        let k2 = self.k * self.k;

        if self.is_empty() {
            let mut tree = self.clone();
            tree.size = self.k;
            tree.height = 1;
            return tree;
        }

        let mut tree = self.clone();
        while tree.size > self.k {
            // Every child of the root except the top-left one must be empty
            if tree.bits.count(1, k2 - 1) != 0 {
                break;
            }

            trace!(size = tree.size, "trimming K²-tree by one level");

            // The dropped block held a single set bit, so the remaining
            // ranks shift down by exactly one child block
            let mut bits = BitSet::new(0);
            for i in k2..tree.bits.number_of_bits() {
                bits.push_bit(tree.bits.get_bit(i));
            }

            tree.bits = bits;
            tree.size /= self.k;
            tree.height -= 1;
            tree.internal_count -= k2;
        }

        tree
    }

    /// Rehydrates the compressed tree into a dense [`K2TreeBuilder`] of the
    /// same matrix size, with every cell of the viewed matrix re-inserted.
    ///
    /// # Panics
    /// Panics if the dense bitmap would exceed addressable memory.
    pub fn to_builder(&self) -> K2TreeBuilder {
        let mut builder = K2TreeBuilder::for_matrix_size(self.k, self.size, self.height)
            .expect("dense builder exceeds addressable memory");
        for (line, col) in self.iter() {
            builder.add_edge(line, col);
        }
        builder
    }
}
