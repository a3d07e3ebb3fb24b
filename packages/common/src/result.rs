use crate::error::PatchError;

/// Result of applying patches
pub type PatchResult<T> = Result<T, PatchError>;
