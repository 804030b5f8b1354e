/*!
# Tree Iterators

Depth-first traversals over the compressed bit sequence of a [`K2Tree`].

As of now `#![feature(impl_trait_in_assoc_type)]` is not stable yet which is
why we rely on explicit iterator structs with their own stacks instead of
closure-based chains.
*/

use smallvec::SmallVec;

use super::{Direction, K2Tree};

/// A pending subquadrant during depth-first traversal.
#[derive(Debug, Copy, Clone)]
struct Frame {
    /// Bit position in the compressed sequence.
    pos: u64,
    /// Side length of the subquadrant in cells.
    side: u64,
    /// Cell coordinates of the subquadrant's top-left corner.
    line: u64,
    col: u64,
}

/// Iterator over all set cells of a [`K2Tree`] in Morton (tree) order.
///
/// For a [`Direction::Reversed`] tree the traversal walks children in
/// transposed order and yields swapped coordinates, so the sequence is the
/// Morton order of the transposed matrix.
///
/// Returned by [`K2Tree::iter`].
pub struct TreeEdgeIter<'a> {
    tree: &'a K2Tree,
    stack: SmallVec<[Frame; 64]>,
}

impl<'a> TreeEdgeIter<'a> {
    pub(super) fn new(tree: &'a K2Tree) -> Self {
        let mut it = TreeEdgeIter {
            tree,
            stack: SmallVec::new(),
        };
        if !tree.is_empty() {
            // The virtual root is always set; its child block starts at 0
            it.push_children(0, tree.size(), 0, 0);
        }
        it
    }

    /// Pushes the `k²` children of a subquadrant in reverse visit order.
    fn push_children(&mut self, base: u64, side: u64, line: u64, col: u64) {
        let k = self.tree.k();
        let sub = side / k;

        for j in (0..k * k).rev() {
            // In a reversed tree, the j-th visited child is the one whose
            // transposed Morton digit is j
            let i = match self.tree.direction() {
                Direction::Forward => j,
                Direction::Reversed => (j % k) * k + j / k,
            };
            self.stack.push(Frame {
                pos: base + i,
                side: sub,
                line: line + i / k * sub,
                col: col + i % k * sub,
            });
        }
    }
}

impl Iterator for TreeEdgeIter<'_> {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(Frame { pos, side, line, col }) = self.stack.pop() {
            if pos >= self.tree.internal_count() {
                // Leaf bit: a single cell
                if self.tree.bits().get_bit(pos) {
                    debug_assert_eq!(side, 1);
                    return Some(match self.tree.direction() {
                        Direction::Forward => (line, col),
                        Direction::Reversed => (col, line),
                    });
                }
            } else if self.tree.bits().get_bit(pos) {
                let base = self.tree.rank(pos) * self.tree.k() * self.tree.k();
                self.push_children(base, side, line, col);
            }
        }

        None
    }
}

/// A pending subquadrant during row/column-restricted traversal.
#[derive(Debug, Copy, Clone)]
struct RestrictedFrame {
    /// Bit position in the compressed sequence.
    pos: u64,
    /// Side length of the subquadrant in cells.
    side: u64,
    /// The fixed coordinate, relative to this subquadrant.
    fixed_rem: u64,
    /// Cell coordinate of the subquadrant's origin on the open axis.
    open0: u64,
}

/// Iterator over the set cells of a single row or column of a [`K2Tree`].
///
/// Yields `(open_coordinate, attribute_slot)` pairs in ascending coordinate
/// order. The attribute slot is the cell's position among the set leaves in
/// **storage** order, i.e. its index into an attribute array laid out by the
/// forward tree order.
///
/// Per level only the `k` children intersecting the fixed row (column) are
/// visited, so a scan touches `O(k · height)` blocks plus the hits.
///
/// Returned by [`K2Tree::row_iter`] / [`K2Tree::col_iter`].
pub struct RestrictedAxisIter<'a> {
    tree: &'a K2Tree,
    /// `true` if the fixed coordinate addresses a stored column.
    by_col: bool,
    stack: SmallVec<[RestrictedFrame; 64]>,
}

impl<'a> RestrictedAxisIter<'a> {
    pub(super) fn new(tree: &'a K2Tree, by_col: bool, fixed: u64) -> Self {
        assert!(
            fixed < tree.size(),
            "coordinate {fixed} out of range for matrix side {}",
            tree.size()
        );

        let mut it = RestrictedAxisIter {
            tree,
            by_col,
            stack: SmallVec::new(),
        };
        if !tree.is_empty() {
            it.push_children(0, tree.size(), fixed, 0);
        }
        it
    }

    /// Pushes the `k` children intersecting the fixed coordinate, in reverse
    /// open-axis order.
    fn push_children(&mut self, base: u64, side: u64, fixed_rem: u64, open0: u64) {
        let k = self.tree.k();
        let sub = side / k;
        let f = fixed_rem / sub;

        for j in (0..k).rev() {
            let i = if self.by_col { j * k + f } else { f * k + j };
            self.stack.push(RestrictedFrame {
                pos: base + i,
                side: sub,
                fixed_rem: fixed_rem % sub,
                open0: open0 + j * sub,
            });
        }
    }
}

impl Iterator for RestrictedAxisIter<'_> {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(frame) = self.stack.pop() {
            if frame.pos >= self.tree.internal_count() {
                if self.tree.bits().get_bit(frame.pos) {
                    let slot = self
                        .tree
                        .bits()
                        .count(self.tree.internal_count(), frame.pos)
                        - 1;
                    return Some((frame.open0, slot));
                }
            } else if self.tree.bits().get_bit(frame.pos) {
                let base = self.tree.rank(frame.pos) * self.tree.k() * self.tree.k();
                self.push_children(base, frame.side, frame.fixed_rem, frame.open0);
            }
        }

        None
    }
}
