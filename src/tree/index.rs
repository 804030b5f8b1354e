/*!
# Tree Index

A [`TreeIndex`] is the stable per-edge key of a cell in the K²-tree: the
Morton-code path from the root to the cell, read as a base-`k²` integer.

Sorting edges by their tree index yields exactly the order in which the
built tree enumerates its leaves, **before** the tree exists. This is what
lets the partition builder collect `(index, attribute)` pairs from an
unordered edge stream and lay the attribute array out in tree order.

The value is invariant under height padding: embedding a matrix into a
larger power-of-`k` matrix only prepends zero digits, so indices computed
against different heights of the same `k` remain mutually comparable.
*/

use std::fmt::{Debug, Display};

/// Morton-code path of a matrix cell, read as a base-`k²` integer.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreeIndex(pub u64);

impl TreeIndex {
    /// Computes the tree index of cell `(line, col)` in a `k^height` sided
    /// matrix.
    ///
    /// Per level, the digit is `(line_l % k) * k + (col_l % k)` where
    /// `line_l`/`col_l` are the quadrant coordinates at that level; digits
    /// are accumulated most-significant (root) first.
    ///
    /// # Panics
    /// Panics if `line` or `col` do not fit into `height` base-`k` digits,
    /// or if the path has more than 64 bits (`k^{2·height} > 2^64`).
    pub fn from_coords(k: u64, height: u32, line: u64, col: u64) -> Self {
        debug_assert!(k >= 2);
        assert!(height >= 1, "a K²-tree has at least one level");

        // Side length of a root child quadrant
        let mut quadrant = k.pow(height - 1);
        assert!(
            line / quadrant < k && col / quadrant < k,
            "cell ({line},{col}) outside a {k}^{height} sided matrix"
        );

        let mut index = 0u64;
        for _ in 0..height {
            let digit = (line / quadrant) % k * k + (col / quadrant) % k;
            index = index
                .checked_mul(k * k)
                .and_then(|i| i.checked_add(digit))
                .expect("Morton path does not fit into 64 bits");
            quadrant /= k;
        }
        TreeIndex(index)
    }

    /// Recovers `(line, col)` from the index.
    pub fn to_coords(self, k: u64, height: u32) -> (u64, u64) {
        let k2 = k * k;
        let (mut line, mut col) = (0, 0);
        let mut rest = self.0;
        let mut weight = 1u64;
        for _ in 0..height {
            let digit = rest % k2;
            line += digit / k * weight;
            col += digit % k * weight;
            rest /= k2;
            // Wraps only after the last level, where `weight` is dead
            weight = weight.wrapping_mul(k);
        }
        (line, col)
    }

    /// The digit addressing this cell within level `level` (1-based from the
    /// root), i.e. its position inside the parent's `k²` block.
    #[inline]
    pub fn digit_at(self, k: u64, height: u32, level: u32) -> u64 {
        debug_assert!(1 <= level && level <= height);
        let k2 = k * k;
        (self.0 / k2.pow(height - level)) % k2
    }

    /// The Morton position of this cell's ancestor **within** level `level`,
    /// i.e. the index truncated to its first `level` digits.
    #[inline]
    pub fn prefix_at(self, k: u64, height: u32, level: u32) -> u64 {
        debug_assert!(1 <= level && level <= height);
        self.0 / (k * k).pow(height - level)
    }
}

impl Display for TreeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for TreeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as Display>::fmt(self, f)
    }
}
