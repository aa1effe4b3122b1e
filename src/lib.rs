//! Purpose: Shared library crate used by the `parsegate` binary and tests.
//! Exports: `core` (catalog, parser, errors) and `api` (public surface + peer client).
//! Role: Internal library backing the binary; not yet a stable public SDK.
//! Invariants: Treat the crate API as internal until a dedicated library release.

pub mod api;
pub mod core;
