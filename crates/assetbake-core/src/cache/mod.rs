//! Build cache: persisted per-asset records proving that a prior build's
//! inputs and configuration still match the current state.
//!
//! Records are plain JSON so external tooling can inspect them; validity
//! is structural equality after path normalization, never partial.

mod error;
mod record;
mod validator;

pub use error::{CacheError, Result};
pub use record::{CacheRecord, FileStamp};
pub use validator::is_build_required;

/// Working-state directory under the output root.
pub const WORKING_DIR_NAME: &str = ".working";

/// Cache records, task files and processor output, sharded by identifier.
pub const CACHE_DIR_NAME: &str = ".cache";

/// Per-asset scratch trees; not expected to persist between runs.
pub const TMP_DIR_NAME: &str = ".buildtmp";
