/*!
# K²-Tree Builder

The dense, uncompressed form of a K²-tree: one bit for **every**
subquadrant of every level, whether occupied or not. All mutation happens
here; [`K2TreeBuilder::build`] compresses back into a [`K2Tree`] by
dropping the all-zero blocks.

The dense bitmap has length `Σ_{l=1..h} k^{2l}` — dominated by the cell
level `k^{2h}` — which is acceptable because the matrix side is bounded by
the partition's vertex-id spread, not the global id space. Buffers are
word-packed and owned exclusively by a single transformation call.
*/

use crate::{
    bitset::BitSet,
    error::{Error, Result},
    tree::{smallest_power_at_least, K2Tree, TreeIndex},
};

/// A mutable, uncompressed K²-tree.
///
/// Maintains the ancestor invariant at all times: every ancestor bit of a
/// set cell is set, and an internal bit is cleared as soon as its child
/// block becomes all-zero.
pub struct K2TreeBuilder {
    k: u64,
    size: u64,
    height: u32,
    /// `level_offsets[l]` is the bitmap offset of level `l` (1-based);
    /// index 0 is unused.
    level_offsets: Vec<u64>,
    bits: BitSet,
}

impl K2TreeBuilder {
    /// Creates a builder whose matrix covers coordinates `0..n`, i.e. with
    /// side length the smallest power of `k` that is at least `n` (and at
    /// least `k`).
    ///
    /// Fails for `k < 2` and for coordinate ranges whose dense bitmap would
    /// not be addressable.
    pub fn new(k: u64, n: u64) -> Result<Self> {
        if k < 2 {
            return Err(Error::InvalidArgument(format!(
                "subdivision parameter k must be at least 2, got {k}"
            )));
        }

        let (size, height) = smallest_power_at_least(k, n)?;
        Self::for_matrix_size(k, size, height)
    }

    /// Creates a builder for an exact matrix side `size = k^height`.
    pub(crate) fn for_matrix_size(k: u64, size: u64, height: u32) -> Result<Self> {
        debug_assert!(k >= 2 && height >= 1);
        debug_assert_eq!(k.checked_pow(height), Some(size));

        let overflow = || {
            Error::InvalidArgument(format!(
                "dense bitmap for a {size} sided matrix with k = {k} exceeds 64-bit addressing"
            ))
        };

        // level_offsets[l] = Σ_{j=1..l-1} k^(2j)
        let k2 = k.checked_mul(k).ok_or_else(overflow)?;
        let mut level_offsets = vec![0u64; height as usize + 1];
        let mut level_bits = k2;
        for l in 2..=height as usize {
            level_offsets[l] = level_offsets[l - 1]
                .checked_add(level_bits)
                .ok_or_else(overflow)?;
            level_bits = level_bits.checked_mul(k2).ok_or_else(overflow)?;
        }
        let total = level_offsets[height as usize]
            .checked_add(level_bits)
            .ok_or_else(overflow)?;
        if total > u64::MAX / 2 || usize::try_from(total.div_ceil(8)).is_err() {
            return Err(overflow());
        }

        Ok(K2TreeBuilder {
            k,
            size,
            height,
            level_offsets,
            bits: BitSet::new(total),
        })
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

    /// Sets cell `(line, col)` and returns its stable [`TreeIndex`].
    ///
    /// Walks from the cell level upwards, stopping as soon as an ancestor
    /// is already set. Re-adding a present cell is a no-op yielding the
    /// same index.
    ///
    /// # Panics
    /// Panics if `line >= size` or `col >= size`.
    pub fn add_edge(&mut self, line: u64, col: u64) -> TreeIndex {
        assert!(
            line < self.size && col < self.size,
            "cell ({line},{col}) out of range for matrix side {}",
            self.size
        );

        let index = TreeIndex::from_coords(self.k, self.height, line, col);
        for level in (1..=self.height).rev() {
            let pos = self.level_offsets[level as usize] + index.prefix_at(self.k, self.height, level);
            if self.bits.set_bit(pos) {
                // All further ancestors are set as well
                break;
            }
        }
        index
    }

    /// Clears cell `(line, col)`, unsetting every ancestor whose child
    /// block becomes all-zero. Returns whether the cell was present.
    ///
    /// # Panics
    /// Panics if `line >= size` or `col >= size`.
    pub fn remove_edge(&mut self, line: u64, col: u64) -> bool {
        assert!(
            line < self.size && col < self.size,
            "cell ({line},{col}) out of range for matrix side {}",
            self.size
        );

        let index = TreeIndex::from_coords(self.k, self.height, line, col);
        if !self
            .bits
            .clear_bit(self.level_offsets[self.height as usize] + index.0)
        {
            return false;
        }

        let k2 = self.k * self.k;
        for level in (1..self.height).rev() {
            let prefix = index.prefix_at(self.k, self.height, level);
            let child_block = self.level_offsets[level as usize + 1] + prefix * k2;
            if self.bits.count(child_block, child_block + k2 - 1) != 0 {
                break;
            }
            self.bits
                .clear_bit(self.level_offsets[level as usize] + prefix);
        }

        true
    }

    /// Tests whether cell `(line, col)` is set.
    ///
    /// # Panics
    /// Panics if `line >= size` or `col >= size`.
    pub fn has_edge(&self, line: u64, col: u64) -> bool {
        assert!(
            line < self.size && col < self.size,
            "cell ({line},{col}) out of range for matrix side {}",
            self.size
        );

        let index = TreeIndex::from_coords(self.k, self.height, line, col);
        self.bits
            .get_bit(self.level_offsets[self.height as usize] + index.0)
    }

    /// Compresses into an immutable [`K2Tree`] by dropping every all-zero
    /// `k²` block.
    ///
    /// Walks the occupied blocks level by level: a block exists in the
    /// output iff its parent bit is set, which by the ancestor invariant is
    /// exactly the non-zero blocks. The walk therefore touches only live
    /// parts of the dense bitmap.
    pub fn build(self) -> K2Tree {
        let k2 = self.k * self.k;

        if self.bits.count(0, k2 - 1) == 0 {
            return K2Tree::from_parts(self.k, self.size, 0, 0, BitSet::new(0));
        }

        let mut out = BitSet::new(0);
        let mut internal_count = 0;

        // Starts of the surviving blocks of the current level
        let mut current: Vec<u64> = vec![self.level_offsets[1]];
        for level in 1..=self.height {
            let mut next = Vec::new();
            for &start in &current {
                for i in 0..k2 {
                    let set = self.bits.get_bit(start + i);
                    out.push_bit(set);
                    if set && level < self.height {
                        let prefix = start - self.level_offsets[level as usize] + i;
                        next.push(self.level_offsets[level as usize + 1] + prefix * k2);
                    }
                }
            }
            if level < self.height {
                internal_count += current.len() as u64 * k2;
            }
            current = next;
        }

        let leaves_count = out.number_of_bits() - internal_count;
        K2Tree::from_parts(self.k, self.size, internal_count, leaves_count, out)
    }
}
