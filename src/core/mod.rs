//! Purpose: Core modules for the parsegate gateway.
//! Exports: `catalog` (enumerations, paths), `error` (taxonomy), `parse` (Format Parser).
//! Role: Format decoding and shared types; no HTTP concerns.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.

pub mod catalog;
pub mod error;
pub mod parse;
