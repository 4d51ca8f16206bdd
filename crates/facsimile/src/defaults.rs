//! Default constants for copy and encoding traversal.

/// Default maximum nesting of objects and containers a single duplication
/// may enter before failing with `DepthLimitExceeded`.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Whether duplications keep a visited map by default.
pub const DEFAULT_PRESERVE_IDENTITY: bool = false;

/// Key carrying the class name of an encoded object.
pub const CLASS_KEY: &str = "$class";

/// Key carrying the entries of an encoded dict.
pub const DICT_KEY: &str = "$dict";
