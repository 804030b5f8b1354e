/*!
# Tree-Ordered Attribute Pairing

The K²-tree stores no payloads; edge attributes live in a parallel array
whose `i`-th entry belongs to the `i`-th edge of the tree's iteration. This
module produces that array from the unordered `(TreeIndex, attribute)`
pairs a builder run collects.

Duplicate indices (the same src/dst pair inserted more than once) collapse
to a single entry; the **last** inserted attribute wins.
*/

use itertools::Itertools;

use crate::tree::TreeIndex;

/// Sorts `(index, attribute)` pairs into tree order and collapses
/// duplicate indices, keeping the most recently inserted attribute.
///
/// The sort is stable, so pairs with equal indices retain insertion order
/// and the last element of each run is the latest insertion.
///
/// # Example
/// ```
/// use k2part::attrs::sort_by_tree_order;
/// use k2part::tree::TreeIndex;
///
/// let keyed = vec![
///     (TreeIndex(9), 'c'),
///     (TreeIndex(2), 'a'),
///     (TreeIndex(9), 'd'),
///     (TreeIndex(4), 'b'),
/// ];
/// assert_eq!(sort_by_tree_order(keyed), vec!['a', 'b', 'd']);
/// ```
pub fn sort_by_tree_order<E>(mut keyed: Vec<(TreeIndex, E)>) -> Vec<E> {
    keyed.sort_by_key(|(index, _)| *index);
    let runs = keyed.into_iter().chunk_by(|(index, _)| *index);
    runs.into_iter()
        .map(|(_, run)| run.last().unwrap().1)
        .collect()
}
