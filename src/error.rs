/*!
# Error Types

All fallible operations in `k2part` return [`Result<T>`].

Input-validation failures surface as [`Error`] values to the caller.
Internal inconsistencies (a leaf section whose length is not a multiple of
`k²`, an attribute array out of sync with the tree) are bugs, not inputs,
and abort via `panic!`/`assert!` instead.
*/

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by partition and tree operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A bit position or local matrix coordinate outside `[0, len)`.
    #[error("index {index} out of range for length {len}")]
    Index { index: u64, len: u64 },

    /// An attribute sequence whose length does not match the edge count.
    #[error("attribute iterator yielded {got} values for {expected} edges")]
    Shape { expected: u64, got: u64 },

    /// A structurally invalid request, e.g. `k < 2` or a `grow` target that
    /// is not a power of `k`.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
