//! Per-iden consumer offsets.

//---------------------------------------------------------------------------------------------------- Import
use heed::byteorder::BE;
use heed::types::{Bytes, U64};
use heed::{Database, RoTxn, RwTxn};

use crate::error::RuntimeError;

//---------------------------------------------------------------------------------------------------- OffsetStore
/// Monotonically advancing offsets, one per consumer iden.
///
/// Tracks how far a named consumer has processed some external
/// stream. Backed by the `offsets` sub-database; both operations
/// take an externally opened transaction so writers can coalesce
/// the offset update with the work it tracks.
#[derive(Clone, Copy)]
pub(crate) struct OffsetStore {
    db: Database<Bytes, U64<BE>>,
}

impl OffsetStore {
    pub(crate) const fn new(db: Database<Bytes, U64<BE>>) -> Self {
        Self { db }
    }

    /// Return the offset for `iden`, 0 if never set.
    pub(crate) fn xget(&self, txn: &RoTxn, iden: &[u8]) -> Result<u64, RuntimeError> {
        Ok(self.db.get(txn, iden)?.unwrap_or(0))
    }

    /// Overwrite the offset for `iden`.
    pub(crate) fn xset(&self, txn: &mut RwTxn, iden: &[u8], offs: u64) -> Result<(), RuntimeError> {
        Ok(self.db.put(txn, iden, &offs)?)
    }
}
