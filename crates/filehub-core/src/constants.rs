//! Shared constants.

/// Bucket name recorded for files kept by the filesystem backend.
pub const FILESYSTEM_BUCKET: &str = "filesystem";

/// Page size used by listing endpoints when the client sends none.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Upper bound on a requested page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Content types accepted for upload unless overridden by `ALLOWED_CONTENT_TYPES`.
pub const DEFAULT_ALLOWED_CONTENT_TYPES: &str = "application/pdf,image/png,image/jpeg";
