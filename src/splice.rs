//! The append-only splice log.

//---------------------------------------------------------------------------------------------------- Import
use std::time::Duration;

use heed::byteorder::BE;
use heed::types::{Bytes, U64};
use heed::{Database, RoTxn, RwTxn};
use parking_lot::{Condvar, Mutex};

use crate::error::RuntimeError;

//---------------------------------------------------------------------------------------------------- SpliceLog
/// An append-only sequence of change records keyed by 64-bit offset.
///
/// Offsets are dense and strictly increasing from 0. Keys are stored
/// big-endian so engine cursor order equals numeric order. The next
/// offset is derived from the last stored key inside the supplied
/// write transaction, so an aborted transaction leaves no gap.
#[derive(Clone, Copy)]
pub(crate) struct SpliceLog {
    db: Database<U64<BE>, Bytes>,
}

impl SpliceLog {
    pub(crate) const fn new(db: Database<U64<BE>, Bytes>) -> Self {
        Self { db }
    }

    pub(crate) const fn db(&self) -> Database<U64<BE>, Bytes> {
        self.db
    }

    /// Append already-encoded splice messages at consecutive offsets.
    pub(crate) fn save(&self, txn: &mut RwTxn, mesgs: &[Vec<u8>]) -> Result<(), RuntimeError> {
        let mut offs = self.db.last(txn)?.map_or(0, |(last, _)| last + 1);

        for mesg in mesgs {
            self.db.put(txn, &offs, mesg)?;
            offs += 1;
        }

        Ok(())
    }

    /// Lazily yield up to `size` `(offs, mesg)` pairs starting at `offs`.
    ///
    /// The sequence is finite and not restartable; callers re-slice
    /// to restart.
    pub(crate) fn slice<'txn>(
        &self,
        txn: &'txn RoTxn,
        offs: u64,
        size: usize,
    ) -> Result<impl Iterator<Item = Result<(u64, Vec<u8>), RuntimeError>> + 'txn, RuntimeError>
    {
        let iter = self.db.range(txn, &(offs..))?;
        Ok(iter.take(size).map(|res| {
            res.map(|(offs, mesg)| (offs, mesg.to_vec()))
                .map_err(Into::into)
        }))
    }
}

//---------------------------------------------------------------------------------------------------- Splices
/// An owning splice-log reader, returned by
/// [`Layer::splices`](crate::Layer::splices).
///
/// Holds its own read transaction and advances by point lookups on
/// consecutive offsets (valid because offsets are dense), ending at
/// the first absent offset or after `size` records.
pub struct Splices<'layr> {
    pub(crate) db: Database<U64<BE>, Bytes>,
    pub(crate) txn: RoTxn<'layr>,
    pub(crate) offs: u64,
    pub(crate) remaining: usize,
}

impl Iterator for Splices<'_> {
    type Item = Result<(u64, Vec<u8>), RuntimeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        match self.db.get(&self.txn, &self.offs) {
            Ok(Some(mesg)) => {
                let offs = self.offs;
                self.offs += 1;
                self.remaining -= 1;
                Some(Ok((offs, mesg.to_vec())))
            }
            Ok(None) => {
                self.remaining = 0;
                None
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e.into()))
            }
        }
    }
}

//---------------------------------------------------------------------------------------------------- SpliceEvent
/// An edge-triggered signal set once per committed write
/// transaction that appended at least one splice.
///
/// Consumers block on [`SpliceEvent::wait_timeout`] to tail the log
/// live; observing the signal resets it.
#[derive(Debug, Default)]
pub struct SpliceEvent {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl SpliceEvent {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Set the signal, waking all waiters.
    pub fn set(&self) {
        *self.flag.lock() = true;
        self.cond.notify_all();
    }

    /// Clear the signal without waiting.
    pub fn clear(&self) {
        *self.flag.lock() = false;
    }

    /// Wait until the signal is set or `timeout` elapses.
    ///
    /// Returns whether the signal was observed; observing it
    /// clears it.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut flag = self.flag.lock();
        if !*flag {
            let _ = self.cond.wait_for(&mut flag, timeout);
        }

        std::mem::take(&mut *flag)
    }
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod test {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use crate::tests::tmp_layer;

    use super::*;

    /// Splice offsets across commits form a dense sequence from 0.
    #[test]
    fn offsets_are_dense_across_commits() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(true).unwrap();
        xact.splice(&("node:add", 0_u64)).unwrap();
        xact.splice(&("node:add", 1_u64)).unwrap();
        xact.commit().unwrap();

        let mut xact = layr.xact(true).unwrap();
        xact.splice(&("node:del", 2_u64)).unwrap();
        xact.commit().unwrap();

        let offsets: Vec<u64> = layr
            .splices(0, 10)
            .unwrap()
            .map(|res| res.unwrap().0)
            .collect();
        assert_eq!(offsets, vec![0, 1, 2]);
    }

    #[test]
    fn slice_respects_offset_and_size() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(true).unwrap();
        for i in 0..5_u64 {
            xact.splice(&i).unwrap();
        }
        xact.commit().unwrap();

        let mesgs: Vec<(u64, Vec<u8>)> = layr
            .splices(2, 2)
            .unwrap()
            .map(|res| res.unwrap())
            .collect();

        assert_eq!(mesgs.len(), 2);
        assert_eq!(mesgs[0].0, 2);
        assert_eq!(mesgs[1].0, 3);
        assert_eq!(rmp_serde::from_slice::<u64>(&mesgs[0].1).unwrap(), 2);
    }

    #[test]
    fn aborted_splices_leave_no_gap() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(true).unwrap();
        xact.splice(&0_u64).unwrap();
        xact.commit().unwrap();

        let mut xact = layr.xact(true).unwrap();
        xact.splice(&1_u64).unwrap();
        xact.abort().unwrap();

        let mut xact = layr.xact(true).unwrap();
        xact.splice(&2_u64).unwrap();
        xact.commit().unwrap();

        let offsets: Vec<u64> = layr
            .splices(0, 10)
            .unwrap()
            .map(|res| res.unwrap().0)
            .collect();
        assert_eq!(offsets, vec![0, 1]);
    }

    #[test]
    fn xact_slice_within_snapshot() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(true).unwrap();
        for i in 0..3_u64 {
            xact.splice(&i).unwrap();
        }
        xact.commit().unwrap();

        let xact = layr.xact(false).unwrap();
        let offsets: Vec<u64> = xact
            .splices(1, 10)
            .unwrap()
            .map(|res| res.unwrap().0)
            .collect();
        assert_eq!(offsets, vec![1, 2]);
    }

    #[test]
    fn commit_signals_waiters() {
        let (layr, _tmp) = tmp_layer();

        assert!(!layr.spliced().wait_timeout(Duration::from_millis(1)));

        let mut xact = layr.xact(true).unwrap();
        xact.splice(&0_u64).unwrap();
        xact.commit().unwrap();

        // Edge triggered: observed once, then reset.
        assert!(layr.spliced().wait_timeout(Duration::from_millis(1)));
        assert!(!layr.spliced().wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn spliceless_commit_does_not_signal() {
        let (layr, _tmp) = tmp_layer();

        let xact = layr.xact(true).unwrap();
        xact.commit().unwrap();

        assert!(!layr.spliced().wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn event_set_and_clear() {
        let event = SpliceEvent::new();
        event.set();
        event.clear();
        assert!(!event.wait_timeout(Duration::from_millis(1)));
    }
}
