//! Storage sizing constants
//!
//! Width figures feed the row-size accounting that backs `LimitException`
//! checks. Adapters may override per-attribute widths, but the defaults here
//! match a conventional row-oriented layout: fixed-width scalars inline,
//! large strings and arrays charged a pointer into out-of-row storage.

/// Hard ceiling on vector attribute dimensionality
pub const MAX_VECTOR_DIMENSIONS: usize = 16000;

/// Strings at most this many bytes are stored inline in the row
pub const STRING_INLINE_MAX: u64 = 16384;

/// Row-width charge for values stored out of row (long text, arrays)
pub const OUT_OF_ROW_WIDTH: u64 = 12;

/// Row-width charge for a relationship id column
pub const RELATIONSHIP_WIDTH: u64 = 38;

/// Upper bound on a string attribute's declared byte size
pub const STRING_SIZE_MAX: u64 = 1_073_741_824;
