//! Page primitives for TarnDB storage.

/// Page size in bytes (1 KB).
pub const PAGE_SIZE: usize = 1024;

/// Index of a fixed-size page within a page file.
///
/// Page ids are dense starting at 0. The value `-1` denotes "none"
/// (end of a leaf chain, or a tree without a root).
pub type PageId = i32;

/// Sentinel page id meaning "no page".
pub const INVALID_PAGE_ID: PageId = -1;
