//! General constants used throughout `hyperlayer`.

//---------------------------------------------------------------------------------------------------- Import

//---------------------------------------------------------------------------------------------------- Constants
/// Byte length of a node identifier.
///
/// Every node is addressed by a 32-byte opaque identifier
/// supplied by the caller; the layer never inspects it.
pub const BUID_SIZE: usize = 32;

/// Maximum byte length of caller-supplied index bytes.
///
/// Index bytes longer than this are rejected with
/// [`RuntimeError::BadIndxValu`](crate::RuntimeError::BadIndxValu);
/// callers should narrow or hash the index instead.
pub const MAX_INDX_SIZE: usize = 256;

/// Maximum size of the per-transaction row cache, in buids.
pub const BUID_CACHE_SIZE: usize = 10_000;

/// Maximum number of named sub-databases the environment may hold.
pub const MAX_DBS: u32 = 128;

/// Default size of the environment's memory map, in bytes (1 GiB).
pub const DEFAULT_MAP_SIZE: usize = 1024 * 1024 * 1024;

/// Name of the primary row sub-database: `buid || prop` -> `(valu, indx)`.
pub const DB_BYBUID: &str = "bybuid";

/// Name of the property index sub-database: `form || prop || indx` -> `(buid,)`.
pub const DB_BYPROP: &str = "byprop";

/// Name of the universal property index sub-database: `prop || indx` -> `(buid,)`.
pub const DB_BYUNIV: &str = "byuniv";

/// Name of the consumer offset sub-database: `iden` -> `u64`.
pub const DB_OFFSETS: &str = "offsets";

/// Name of the splice log sub-database: `u64` (big-endian) -> splice bytes.
pub const DB_SPLICES: &str = "splices";
