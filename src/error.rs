/*!
Configuration-error taxon (see SPEC_FULL.md §7).

Every fallible setup call in this crate — installing a memory region, mirror,
or special overlay; adding a label — returns one of these instead of a bool
or sentinel, the way the original C glue returned `NULL`/`0` on bad
parameters. Runtime bus errors (out-of-range accesses, unhandled pages) are a
different taxon entirely: they never fail a call, they become events (see
`crate::event::EventKind::MemBounds`/`MemAccess`).
*/

use thiserror::Error;

/// Failure installing a memory region, empty range, mirror, or special overlay.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum MemoryConfigError {
    /// `num_pages == 0`.
    #[error("zero-page region is not allowed")]
    ZeroPages,
    /// `start_page + num_pages` exceeds the configured page count.
    #[error("page range {start_page}..{end_page} exceeds {num_pages} configured pages")]
    OutOfRange {
        start_page: u32,
        end_page: u32,
        num_pages: u32,
    },
    /// A mirror's `base_page..base_page+num_pages` exceeds the configured page count.
    #[error("mirror target range {base_page}..{end_page} exceeds {num_pages} configured pages")]
    TargetOutOfRange {
        base_page: u32,
        end_page: u32,
        num_pages: u32,
    },
    /// `add_mirror` called with `base_page == start_page`.
    #[error("a mirror page range may not target itself (page {page})")]
    SelfMirror { page: u32 },
}

/// Failure adding or querying a label.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum LabelError {
    /// `size == 0`.
    #[error("zero-size label is not allowed")]
    ZeroSize,
    /// `(addr + size - 1) >> page_shift` exceeds the configured page count.
    #[error("label end page {end_page} exceeds {num_pages} configured pages")]
    OutOfRange { end_page: u32, num_pages: u32 },
}
