use std::path::Path;

use tracing::debug;

use super::CacheRecord;

/// Decide whether an asset must be rebuilt.
///
/// A missing record or missing prior processor output forces a rebuild
/// unconditionally; so does an unreadable record. Otherwise the persisted
/// record is compared structurally against `candidate` in normalized
/// form, so absolute-path differences across machines do not invalidate
/// the cache.
pub fn is_build_required(
    cache_file: &Path,
    output_file: &Path,
    candidate: &CacheRecord,
    asset_root: &Path,
) -> bool {
    if !cache_file.is_file() || !output_file.is_file() {
        return true;
    }

    match CacheRecord::load(cache_file) {
        Ok(previous) => previous != candidate.normalized(asset_root),
        Err(error) => {
            debug!("Unreadable cache record '{}': {error}", cache_file.display());
            true
        }
    }
}
