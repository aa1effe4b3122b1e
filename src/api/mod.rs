//! Purpose: Define the public API boundary for parsegate.
//! Exports: Catalog types, the Format Parser, the error taxonomy, and the peer client.
//! Role: The one import path used by the binary and integration tests.
//! Invariants: Internal module layout stays hidden behind these re-exports.

mod peer;

pub use crate::core::catalog::{Dataset, FileType, default_data_dir, record_path};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::parse::{ParsedRecord, parse_record};
pub use peer::PeerClient;
