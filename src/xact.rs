//! Layer transactions; `Xact`.

//---------------------------------------------------------------------------------------------------- Import
use std::cell::RefCell;
use std::collections::HashMap;
use std::iter;
use std::ops::Bound;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use heed::types::Bytes;
use heed::{Database, RoTxn, RwTxn};
use serde::Serialize;

use crate::cache::FixedCache;
use crate::constants::{BUID_CACHE_SIZE, BUID_SIZE, MAX_INDX_SIZE};
use crate::error::RuntimeError;
use crate::layer::Layer;
use crate::serial;
use crate::types::{Buid, IndxOp, LiftOp, OpInfo, StorOp};

//---------------------------------------------------------------------------------------------------- Txn
/// The underlying engine transaction, read or read-write.
enum Txn<'layr> {
    Ro(RoTxn<'layr>),
    Rw(RwTxn<'layr>),
}

impl<'layr> Txn<'layr> {
    /// Read view of the transaction; write transactions read
    /// through their own uncommitted state.
    fn ro(&self) -> &RoTxn<'layr> {
        match self {
            Self::Ro(txn) => txn,
            Self::Rw(txn) => txn,
        }
    }
}

//---------------------------------------------------------------------------------------------------- Helpers
/// Concatenate key parts into a fresh key buffer.
fn keycat(parts: &[&[u8]]) -> Vec<u8> {
    let mut key = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
    for part in parts {
        key.extend_from_slice(part);
    }
    key
}

/// Fail with [`RuntimeError::BadThread`] unless called on `owner`.
fn check_owner(owner: ThreadId) -> Result<(), RuntimeError> {
    if thread::current().id() == owner {
        Ok(())
    } else {
        Err(RuntimeError::BadThread)
    }
}

/// A boxed lazy row stream, bounded by the transaction lifetime.
type BuidIter<'txn> = Box<dyn Iterator<Item = Result<Buid, RuntimeError>> + 'txn>;

/// Decode the buid out of a secondary index `(key, value)` item.
fn decode_item(res: Result<(&[u8], &[u8]), heed::Error>) -> Result<Buid, RuntimeError> {
    match res {
        Ok((_lkey, byts)) => serial::decode_buid(byts),
        Err(e) => Err(e.into()),
    }
}

//---------------------------------------------------------------------------------------------------- Xact
/// A transaction scoping reads and writes against a
/// [`Layer`](crate::Layer).
///
/// Constructed by [`Layer::xact`]. Lives on exactly one thread: the
/// identity of the creating thread is captured and every mutating or
/// terminal call fails with [`RuntimeError::BadThread`] from any
/// other thread. Must end in [`Xact::commit`] or [`Xact::abort`];
/// read transactions also abort on drop.
///
/// Row iterators borrow the transaction, so consumers cannot
/// outlive commit/abort.
pub struct Xact<'layr> {
    /// The owning layer.
    layr: &'layr Layer,
    /// The engine transaction.
    txn: Txn<'layr>,
    /// Change records pending for the splice log on commit.
    splices: Vec<Vec<u8>>,
    /// Bounded row cache, keyed by buid.
    cache: RefCell<FixedCache<Buid, HashMap<String, Vec<u8>>>>,
    /// Identity of the creating thread.
    tid: ThreadId,
}

impl<'layr> Xact<'layr> {
    pub(crate) fn new(layr: &'layr Layer, write: bool) -> Result<Self, RuntimeError> {
        let txn = if write {
            Txn::Rw(layr.env.write_txn()?)
        } else {
            Txn::Ro(layr.env.read_txn()?)
        };

        Ok(Self {
            layr,
            txn,
            splices: Vec::new(),
            cache: RefCell::new(FixedCache::new(BUID_CACHE_SIZE)),
            tid: thread::current().id(),
        })
    }

    //------------------------------------------------ Storage operations
    /// Execute a series of storage operations.
    ///
    /// Operations already applied before an error stay in the
    /// engine transaction buffer; callers should [`Xact::abort`]
    /// on any error they do not explicitly handle.
    pub fn stor(&mut self, opers: &[StorOp]) -> Result<(), RuntimeError> {
        check_owner(self.tid)?;

        // Reject the whole batch before any cache mutation.
        if !matches!(self.txn, Txn::Rw(_)) {
            return Err(RuntimeError::ReadOnly);
        }

        for oper in opers {
            match oper {
                StorOp::PropSet {
                    buid,
                    form,
                    prop,
                    valu,
                    indx,
                    info,
                } => self.prop_set(buid, form, prop, valu, indx, *info)?,
                StorOp::PropDel {
                    buid,
                    form,
                    prop,
                    info,
                } => self.prop_del(buid, form, prop, *info)?,
            }
        }

        Ok(())
    }

    fn prop_set(
        &mut self,
        buid: &Buid,
        form: &str,
        prop: &str,
        valu: &[u8],
        indx: &[u8],
        info: OpInfo,
    ) -> Result<(), RuntimeError> {
        if indx.len() > MAX_INDX_SIZE {
            return Err(RuntimeError::BadIndxValu(indx.len()));
        }

        let layr = self.layr;
        let fenc = layr.encoder.get(form);
        let penc = layr.encoder.get(prop);

        // Empty prop addresses the form's primary property.
        let prop = if prop.is_empty() {
            format!("*{form}")
        } else {
            prop.to_owned()
        };

        let bpkey = keycat(&[buid, &layr.utf8.get(&prop)]);

        // Keep reads in this transaction coherent with the write.
        if let Some(props) = self.cache.borrow_mut().get_mut(buid) {
            props.insert(prop, valu.to_vec());
        }

        let bpval = serial::encode_row(valu, indx)?;
        let pvval = serial::encode_buid(buid)?;

        let Txn::Rw(wtxn) = &mut self.txn else {
            return Err(RuntimeError::ReadOnly);
        };

        let prior = layr.bybuid.get(wtxn, &bpkey)?.map(<[u8]>::to_vec);
        layr.bybuid.put(wtxn, &bpkey, &bpval)?;

        // Overwrite: drop the stale secondary entries first.
        if let Some(byts) = prior {
            let (_oldv, oldi) = serial::decode_row(&byts)?;

            layr.byprop
                .delete_one_duplicate(wtxn, &keycat(&[&fenc, &penc, &oldi]), &pvval)?;

            if info.univ {
                layr.byuniv
                    .delete_one_duplicate(wtxn, &keycat(&[&penc, &oldi]), &pvval)?;
            }
        }

        layr.byprop
            .put(wtxn, &keycat(&[&fenc, &penc, indx]), &pvval)?;

        if info.univ {
            layr.byuniv.put(wtxn, &keycat(&[&penc, indx]), &pvval)?;
        }

        Ok(())
    }

    fn prop_del(
        &mut self,
        buid: &Buid,
        form: &str,
        prop: &str,
        info: OpInfo,
    ) -> Result<(), RuntimeError> {
        self.cache.borrow_mut().pop(buid);

        let layr = self.layr;
        let fenc = layr.encoder.get(form);
        let penc = layr.encoder.get(prop);

        let bpkey = if prop.is_empty() {
            keycat(&[buid, b"*", &layr.utf8.get(form)])
        } else {
            keycat(&[buid, &layr.utf8.get(prop)])
        };

        let Txn::Rw(wtxn) = &mut self.txn else {
            return Err(RuntimeError::ReadOnly);
        };

        // Idempotent: deleting an absent prop is a no-op.
        let Some(byts) = layr.bybuid.get(wtxn, &bpkey)?.map(<[u8]>::to_vec) else {
            return Ok(());
        };
        layr.bybuid.delete(wtxn, &bpkey)?;

        let (_oldv, oldi) = serial::decode_row(&byts)?;
        let pvval = serial::encode_buid(buid)?;

        layr.byprop
            .delete_one_duplicate(wtxn, &keycat(&[&fenc, &penc, &oldi]), &pvval)?;

        if info.univ {
            layr.byuniv
                .delete_one_duplicate(wtxn, &keycat(&[&penc, &oldi]), &pvval)?;
        }

        Ok(())
    }

    //------------------------------------------------ Lifts
    /// Execute a row lifting operation.
    ///
    /// Rows are yielded lazily in engine key order per operator;
    /// operators concatenate in input order. An unknown sub-database
    /// name fails with [`RuntimeError::NoSuchName`] before any row
    /// is yielded.
    pub fn lift<'x>(&'x self, oper: &'x LiftOp) -> Result<BuidIter<'x>, RuntimeError> {
        match oper {
            LiftOp::Indx { db, prefix, ops } => self.lift_by_indx(db, prefix, ops),

            LiftOp::PropRe {
                form,
                prop,
                pattern,
            } => {
                let re = regex::bytes::Regex::new(pattern)?;
                Ok(re_filter(self.iter_prop_rows(form, prop)?, re))
            }

            LiftOp::UnivRe { prop, pattern } => {
                let re = regex::bytes::Regex::new(pattern)?;
                Ok(re_filter(self.iter_univ_rows(prop)?, re))
            }

            LiftOp::FormRe { form, pattern } => {
                let re = regex::bytes::Regex::new(pattern)?;
                Ok(re_filter(self.iter_form_rows(form)?, re))
            }
        }
    }

    fn lift_by_indx<'x>(
        &'x self,
        name: &str,
        pref: &'x [u8],
        iops: &'x [IndxOp],
    ) -> Result<BuidIter<'x>, RuntimeError> {
        let Some(db) = self.layr.db(name) else {
            return Err(RuntimeError::NoSuchName(name.to_owned()));
        };

        let txn = self.txn.ro();

        Ok(Box::new(iops.iter().flat_map(move |iop| match iop {
            IndxOp::Eq(valu) => rows_by_eq(db, txn, pref, valu),
            IndxOp::Pref(valu) => rows_by_pref(db, txn, pref, valu),
            IndxOp::Range(lo, hi) => rows_by_range(db, txn, pref, lo, hi),
        })))
    }

    //------------------------------------------------ Row iteration
    /// Lazily iterate `(buid, valu)` for every node of `form`
    /// in this layer.
    pub fn iter_form_rows<'x>(
        &'x self,
        form: &str,
    ) -> Result<impl Iterator<Item = Result<(Buid, Vec<u8>), RuntimeError>> + 'x, RuntimeError>
    {
        // <form> 00 00 (no prop) scopes the walk to primary rows.
        let pref = keycat(&[&self.layr.encoder.get(form), b"\x00"]);
        let join = self.layr.utf8.get(&format!("*{form}"));

        self.join_rows(self.layr.byprop, pref, join)
    }

    /// Lazily iterate `(buid, valu)` for every node of `form`
    /// having `prop` set.
    pub fn iter_prop_rows<'x>(
        &'x self,
        form: &str,
        prop: &str,
    ) -> Result<impl Iterator<Item = Result<(Buid, Vec<u8>), RuntimeError>> + 'x, RuntimeError>
    {
        let pref = keycat(&[&self.layr.encoder.get(form), &self.layr.encoder.get(prop)]);
        let join = self.layr.utf8.get(prop);

        self.join_rows(self.layr.byprop, pref, join)
    }

    /// Lazily iterate `(buid, valu)` across all forms for a
    /// universal property.
    pub fn iter_univ_rows<'x>(
        &'x self,
        prop: &str,
    ) -> Result<impl Iterator<Item = Result<(Buid, Vec<u8>), RuntimeError>> + 'x, RuntimeError>
    {
        let pref = self.layr.encoder.get(prop).to_vec();
        let join = self.layr.utf8.get(prop);

        self.join_rows(self.layr.byuniv, pref, join)
    }

    /// Walk a secondary index by prefix and join each buid back to
    /// its primary row. A missing join target means the row was
    /// deleted by a concurrent writer after the walk began; those
    /// are skipped silently.
    fn join_rows<'x>(
        &'x self,
        db: Database<Bytes, Bytes>,
        pref: Vec<u8>,
        join: Arc<[u8]>,
    ) -> Result<impl Iterator<Item = Result<(Buid, Vec<u8>), RuntimeError>> + 'x, RuntimeError>
    {
        let txn = self.txn.ro();
        let iter = db.prefix_iter(txn, &pref)?;

        Ok(iter.filter_map(move |res| {
            let byts = match res {
                Ok((_lkey, byts)) => byts,
                Err(e) => return Some(Err(e.into())),
            };

            let buid = match serial::decode_buid(byts) {
                Ok(buid) => buid,
                Err(e) => return Some(Err(e)),
            };

            let bpkey = keycat(&[&buid, &join]);
            match self.layr.bybuid.get(txn, &bpkey) {
                Ok(Some(byts)) => match serial::decode_row(byts) {
                    Ok((valu, _indx)) => Some(Ok((buid, valu))),
                    Err(e) => Some(Err(e)),
                },
                Ok(None) => None,
                Err(e) => Some(Err(e.into())),
            }
        }))
    }

    //------------------------------------------------ Rows by buid
    /// Return all properties of `buid` as a `prop -> valu` map.
    ///
    /// Backed by a bounded per-transaction cache; writes to the
    /// buid in this transaction update or evict its entry.
    pub fn get_buid_props(&self, buid: &Buid) -> Result<HashMap<String, Vec<u8>>, RuntimeError> {
        if let Some(props) = self.cache.borrow().get(buid) {
            return Ok(props.clone());
        }

        let txn = self.txn.ro();
        let mut props = HashMap::new();

        for res in self.layr.bybuid.prefix_iter(txn, &buid[..])? {
            let (lkey, lval) = res?;

            let prop = String::from_utf8_lossy(&lkey[BUID_SIZE..]).into_owned();
            let (valu, _indx) = serial::decode_row(lval)?;
            props.insert(prop, valu);
        }

        self.cache.borrow_mut().put(*buid, props.clone());
        Ok(props)
    }

    //------------------------------------------------ Offsets
    /// Return the offset for `iden` within this transaction.
    pub fn get_offset(&self, iden: &[u8]) -> Result<u64, RuntimeError> {
        self.layr.offs.xget(self.txn.ro(), iden)
    }

    /// Set the offset for `iden` within this transaction.
    pub fn set_offset(&mut self, iden: &[u8], offs: u64) -> Result<(), RuntimeError> {
        check_owner(self.tid)?;

        let Txn::Rw(wtxn) = &mut self.txn else {
            return Err(RuntimeError::ReadOnly);
        };

        self.layr.offs.xset(wtxn, iden, offs)
    }

    //------------------------------------------------ Splices
    /// Lazily yield up to `size` splice log records starting at
    /// `offs`, within this transaction's snapshot.
    pub fn splices<'x>(
        &'x self,
        offs: u64,
        size: usize,
    ) -> Result<impl Iterator<Item = Result<(u64, Vec<u8>), RuntimeError>> + 'x, RuntimeError>
    {
        self.layr.splicelog.slice(self.txn.ro(), offs, size)
    }

    /// Buffer a change record for the splice log.
    ///
    /// The message is opaque to the layer; it is msgpack-encoded
    /// here and appended on [`Xact::commit`].
    pub fn splice<M: Serialize>(&mut self, mesg: &M) -> Result<(), RuntimeError> {
        check_owner(self.tid)?;

        if !matches!(self.txn, Txn::Rw(_)) {
            return Err(RuntimeError::ReadOnly);
        }

        self.splices.push(rmp_serde::to_vec(mesg)?);
        Ok(())
    }

    //------------------------------------------------ Commit/abort
    /// Flush pending splices, commit the engine transaction and
    /// wake splice waiters.
    pub fn commit(self) -> Result<(), RuntimeError> {
        check_owner(self.tid)?;

        let Self {
            layr, txn, splices, ..
        } = self;

        match txn {
            Txn::Ro(txn) => txn.commit()?,
            Txn::Rw(mut txn) => {
                if !splices.is_empty() {
                    layr.splicelog.save(&mut txn, &splices)?;
                }

                txn.commit()?;

                if !splices.is_empty() {
                    tracing::trace!(count = splices.len(), "committed splices");
                    layr.spliced.set();
                }
            }
        }

        Ok(())
    }

    /// Discard all work done in this transaction.
    pub fn abort(self) -> Result<(), RuntimeError> {
        check_owner(self.tid)?;

        match self.txn {
            Txn::Ro(txn) => drop(txn),
            Txn::Rw(txn) => txn.abort(),
        }

        Ok(())
    }
}

//---------------------------------------------------------------------------------------------------- Row operators
/// Rows whose key is exactly `pref || valu`, walking duplicates.
///
/// Duplicates of the exact key sort before any longer key sharing
/// it as a prefix, so the walk ends at the first longer key.
fn rows_by_eq<'txn>(
    db: Database<Bytes, Bytes>,
    txn: &'txn RoTxn,
    pref: &[u8],
    valu: &[u8],
) -> BuidIter<'txn> {
    let lkey = keycat(&[pref, valu]);

    match db.prefix_iter(txn, &lkey) {
        Ok(iter) => Box::new(
            iter.take_while(move |res| match res {
                Ok((lkey2, _)) => *lkey2 == &lkey[..],
                Err(_) => true,
            })
            .map(decode_item),
        ),
        Err(e) => Box::new(iter::once(Err(e.into()))),
    }
}

/// Rows whose key starts with `pref || valu`.
fn rows_by_pref<'txn>(
    db: Database<Bytes, Bytes>,
    txn: &'txn RoTxn,
    pref: &[u8],
    valu: &[u8],
) -> BuidIter<'txn> {
    let pref = keycat(&[pref, valu]);

    match db.prefix_iter(txn, &pref) {
        Ok(iter) => Box::new(iter.map(decode_item)),
        Err(e) => Box::new(iter::once(Err(e.into()))),
    }
}

/// Rows from `pref || lo` while the key's leading bytes
/// stay `<= pref || hi`.
fn rows_by_range<'txn>(
    db: Database<Bytes, Bytes>,
    txn: &'txn RoTxn,
    pref: &[u8],
    lo: &[u8],
    hi: &[u8],
) -> BuidIter<'txn> {
    let lmin = keycat(&[pref, lo]);
    let lmax = keycat(&[pref, hi]);

    let range = (Bound::Included(&lmin[..]), Bound::Unbounded);
    match db.range(txn, &range) {
        Ok(iter) => Box::new(
            iter.take_while(move |res| match res {
                Ok((lkey, _)) => {
                    let head = &lkey[..lkey.len().min(lmax.len())];
                    head <= &lmax[..]
                }
                // Pass errors through; the map below yields them.
                Err(_) => true,
            })
            .map(decode_item),
        ),
        Err(e) => Box::new(iter::once(Err(e.into()))),
    }
}

/// Filter joined rows down to the buids whose value bytes match.
fn re_filter<'x>(
    iter: impl Iterator<Item = Result<(Buid, Vec<u8>), RuntimeError>> + 'x,
    re: regex::bytes::Regex,
) -> BuidIter<'x> {
    Box::new(iter.filter_map(move |res| match res {
        Ok((buid, valu)) => re.is_match(&valu).then_some(Ok(buid)),
        Err(e) => Some(Err(e)),
    }))
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::tests::tmp_layer;

    use super::*;

    const B0: Buid = [0x00; BUID_SIZE];
    const B1: Buid = [0x11; BUID_SIZE];

    fn prop_set(buid: Buid, form: &str, prop: &str, valu: &[u8], indx: &[u8]) -> StorOp {
        StorOp::PropSet {
            buid,
            form: form.to_owned(),
            prop: prop.to_owned(),
            valu: valu.to_vec(),
            indx: indx.to_vec(),
            info: OpInfo::default(),
        }
    }

    fn univ_set(buid: Buid, form: &str, prop: &str, valu: &[u8], indx: &[u8]) -> StorOp {
        StorOp::PropSet {
            buid,
            form: form.to_owned(),
            prop: prop.to_owned(),
            valu: valu.to_vec(),
            indx: indx.to_vec(),
            info: OpInfo { univ: true },
        }
    }

    fn prop_del(buid: Buid, form: &str, prop: &str, univ: bool) -> StorOp {
        StorOp::PropDel {
            buid,
            form: form.to_owned(),
            prop: prop.to_owned(),
            info: OpInfo { univ },
        }
    }

    /// Lift buids by equality over a `form:prop` index.
    fn lift_eq(xact: &Xact, form: &str, prop: &str, indx: &[u8]) -> Vec<Buid> {
        let prefix = keycat(&[
            &xact.layr.encoder.get(form),
            &xact.layr.encoder.get(prop),
        ]);
        let oper = LiftOp::Indx {
            db: "byprop".to_owned(),
            prefix,
            ops: vec![IndxOp::Eq(indx.to_vec())],
        };
        xact.lift(&oper).unwrap().map(Result::unwrap).collect()
    }

    /// Set a prop then read it back through every surface.
    #[test]
    fn prop_set_then_read() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(true).unwrap();
        xact.stor(&[prop_set(B0, "f", "p", b"visi", b"\x10")])
            .unwrap();
        xact.commit().unwrap();

        let xact = layr.xact(false).unwrap();
        let props = xact.get_buid_props(&B0).unwrap();
        assert_eq!(props.get("p").map(Vec::as_slice), Some(&b"visi"[..]));

        assert_eq!(lift_eq(&xact, "f", "p", b"\x10"), vec![B0]);

        let rows: Vec<(Buid, Vec<u8>)> = xact
            .iter_prop_rows("f", "p")
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(rows, vec![(B0, b"visi".to_vec())]);
    }

    /// Scenario: primary value set via the empty prop.
    #[test]
    fn primary_prop_set() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(true).unwrap();
        xact.stor(&[prop_set(B0, "f", "", b"A", b"\x01")]).unwrap();
        xact.commit().unwrap();

        let xact = layr.xact(false).unwrap();

        let rows: Vec<(Buid, Vec<u8>)> = xact
            .iter_form_rows("f")
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(rows, vec![(B0, b"A".to_vec())]);

        let props = xact.get_buid_props(&B0).unwrap();
        assert_eq!(props.get("*f").map(Vec::as_slice), Some(&b"A"[..]));
    }

    /// Empty prop and explicit `"*" + form` address the same row.
    #[test]
    fn primary_prop_sentinel_equivalence() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(true).unwrap();
        xact.stor(&[prop_set(B0, "f", "", b"A", b"\x01")]).unwrap();
        // Delete through the empty prop spelling.
        xact.stor(&[prop_del(B0, "f", "", false)]).unwrap();
        xact.commit().unwrap();

        let xact = layr.xact(false).unwrap();
        assert!(xact.get_buid_props(&B0).unwrap().is_empty());
        let rows: Vec<_> = xact
            .iter_form_rows("f")
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert!(rows.is_empty());
    }

    /// Scenario: overwrite rewrites the secondary index.
    #[test]
    fn prop_overwrite_leaves_no_stale_index() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(true).unwrap();
        xact.stor(&[prop_set(B0, "f", "p", b"old", b"\x10")])
            .unwrap();
        xact.stor(&[prop_set(B0, "f", "p", b"new", b"\x20")])
            .unwrap();
        xact.commit().unwrap();

        let xact = layr.xact(false).unwrap();
        assert_eq!(lift_eq(&xact, "f", "p", b"\x10"), Vec::<Buid>::new());
        assert_eq!(lift_eq(&xact, "f", "p", b"\x20"), vec![B0]);
    }

    /// Every primary row has exactly one matching byprop entry.
    #[test]
    fn secondary_index_consistency() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(true).unwrap();
        xact.stor(&[
            prop_set(B0, "f", "", b"A", b"\x01"),
            prop_set(B0, "f", "p", b"B", b"\x02"),
            prop_set(B1, "f", "", b"C", b"\x01"),
            univ_set(B1, "f", ".seen", b"D", b"\x03"),
            prop_set(B0, "f", "p", b"E", b"\x04"),
            prop_del(B1, "f", "", false),
        ])
        .unwrap();
        xact.commit().unwrap();

        let txn = layr.env.read_txn().unwrap();
        let nrows = layr.bybuid.iter(&txn).unwrap().count();
        let nindx = layr.byprop.iter(&txn).unwrap().count();
        assert_eq!(nrows, 3);
        assert_eq!(nindx, 3);

        // The universal prop also has exactly one byuniv entry.
        assert_eq!(layr.byuniv.iter(&txn).unwrap().count(), 1);
    }

    /// Scenario: a universal prop is lifted across forms.
    #[test]
    fn univ_rows_across_buids() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(true).unwrap();
        xact.stor(&[
            univ_set(B0, "f", ".seen", b"x", b"\x55"),
            univ_set(B1, "g", ".seen", b"y", b"\x55"),
        ])
        .unwrap();
        xact.commit().unwrap();

        let xact = layr.xact(false).unwrap();
        let rows: Vec<(Buid, Vec<u8>)> = xact
            .iter_univ_rows(".seen")
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(rows.len(), 2);

        let prefix = xact.layr.encoder.get(".seen").to_vec();
        let oper = LiftOp::Indx {
            db: "byuniv".to_owned(),
            prefix,
            ops: vec![IndxOp::Eq(b"\x55".to_vec())],
        };
        assert_eq!(xact.lift(&oper).unwrap().count(), 2);
    }

    /// Scenario: deleting an absent prop is a silent no-op.
    #[test]
    fn prop_del_is_idempotent() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(true).unwrap();
        xact.stor(&[prop_del(B0, "f", "p", false)]).unwrap();
        xact.commit().unwrap();

        let mut xact = layr.xact(true).unwrap();
        xact.stor(&[
            univ_set(B0, "f", ".seen", b"x", b"\x55"),
            prop_del(B0, "f", ".seen", true),
            prop_del(B0, "f", ".seen", true),
        ])
        .unwrap();
        xact.commit().unwrap();

        // No orphan entries anywhere.
        let txn = layr.env.read_txn().unwrap();
        assert_eq!(layr.bybuid.iter(&txn).unwrap().count(), 0);
        assert_eq!(layr.byprop.iter(&txn).unwrap().count(), 0);
        assert_eq!(layr.byuniv.iter(&txn).unwrap().count(), 0);

        // And the splice log was not touched by storage itself.
        assert_eq!(layr.splices(0, 10).unwrap().count(), 0);
    }

    /// Index bytes boundary: 256 is fine, 257 is not.
    #[test]
    fn indx_size_boundary() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(true).unwrap();
        xact.stor(&[prop_set(B0, "f", "p", b"v", &[0x7f; 256])])
            .unwrap();

        let err = xact
            .stor(&[prop_set(B0, "f", "q", b"v", &[0x7f; 257])])
            .unwrap_err();
        assert!(matches!(err, RuntimeError::BadIndxValu(257)));
        xact.abort().unwrap();
    }

    /// `Range(lo, lo)` behaves as `Eq(lo)`.
    #[test]
    fn range_and_eq_agree() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(true).unwrap();
        xact.stor(&[
            prop_set(B0, "f", "p", b"a", b"\x10"),
            prop_set(B1, "f", "p", b"b", b"\x20"),
        ])
        .unwrap();
        xact.commit().unwrap();

        let xact = layr.xact(false).unwrap();
        let prefix = keycat(&[&layr.encoder.get("f"), &layr.encoder.get("p")]);

        let range = LiftOp::Indx {
            db: "byprop".to_owned(),
            prefix: prefix.clone(),
            ops: vec![IndxOp::Range(b"\x10".to_vec(), b"\x10".to_vec())],
        };
        let buids: Vec<Buid> = xact.lift(&range).unwrap().map(Result::unwrap).collect();
        assert_eq!(buids, lift_eq(&xact, "f", "p", b"\x10"));

        // And the full range spans both rows, in key order.
        let range = LiftOp::Indx {
            db: "byprop".to_owned(),
            prefix,
            ops: vec![IndxOp::Range(b"\x10".to_vec(), b"\x20".to_vec())],
        };
        let buids: Vec<Buid> = xact.lift(&range).unwrap().map(Result::unwrap).collect();
        assert_eq!(buids, vec![B0, B1]);
    }

    #[test]
    fn pref_lift() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(true).unwrap();
        xact.stor(&[
            prop_set(B0, "f", "p", b"a", b"\x10\x01"),
            prop_set(B1, "f", "p", b"b", b"\x10\x02"),
        ])
        .unwrap();
        xact.commit().unwrap();

        let xact = layr.xact(false).unwrap();
        let oper = LiftOp::Indx {
            db: "byprop".to_owned(),
            prefix: keycat(&[&layr.encoder.get("f"), &layr.encoder.get("p")]),
            ops: vec![IndxOp::Pref(b"\x10".to_vec())],
        };
        assert_eq!(xact.lift(&oper).unwrap().count(), 2);
    }

    #[test]
    fn lift_unknown_db_fails() {
        let (layr, _tmp) = tmp_layer();

        let xact = layr.xact(false).unwrap();
        let oper = LiftOp::Indx {
            db: "bynewp".to_owned(),
            prefix: Vec::new(),
            ops: Vec::new(),
        };
        assert!(matches!(
            xact.lift(&oper),
            Err(RuntimeError::NoSuchName(_))
        ));
    }

    #[test]
    fn regex_lifts() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(true).unwrap();
        xact.stor(&[
            prop_set(B0, "f", "", b"woot.com", b"\x01"),
            prop_set(B1, "f", "", b"vertex.link", b"\x02"),
            prop_set(B0, "f", "p", b"woot.com", b"\x01"),
            univ_set(B1, "f", ".seen", b"woot.com", b"\x01"),
        ])
        .unwrap();
        xact.commit().unwrap();

        let xact = layr.xact(false).unwrap();

        let oper = LiftOp::FormRe {
            form: "f".to_owned(),
            pattern: "woot".to_owned(),
        };
        let buids: Vec<Buid> = xact.lift(&oper).unwrap().map(Result::unwrap).collect();
        assert_eq!(buids, vec![B0]);

        let oper = LiftOp::PropRe {
            form: "f".to_owned(),
            prop: "p".to_owned(),
            pattern: "^woot".to_owned(),
        };
        assert_eq!(xact.lift(&oper).unwrap().count(), 1);

        let oper = LiftOp::UnivRe {
            prop: ".seen".to_owned(),
            pattern: "com$".to_owned(),
        };
        assert_eq!(xact.lift(&oper).unwrap().count(), 1);

        let oper = LiftOp::FormRe {
            form: "f".to_owned(),
            pattern: "(".to_owned(),
        };
        assert!(matches!(xact.lift(&oper), Err(RuntimeError::Regex(_))));
    }

    /// Writes in this transaction are visible to its own reads.
    #[test]
    fn cache_sees_own_writes() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(true).unwrap();
        xact.stor(&[prop_set(B0, "f", "p", b"one", b"\x01")])
            .unwrap();

        // Prime the cache, then overwrite and delete.
        assert_eq!(
            xact.get_buid_props(&B0).unwrap().get("p").map(Vec::as_slice),
            Some(&b"one"[..]),
        );

        xact.stor(&[prop_set(B0, "f", "p", b"two", b"\x02")])
            .unwrap();
        assert_eq!(
            xact.get_buid_props(&B0).unwrap().get("p").map(Vec::as_slice),
            Some(&b"two"[..]),
        );

        xact.stor(&[prop_del(B0, "f", "p", false)]).unwrap();
        assert!(xact.get_buid_props(&B0).unwrap().is_empty());

        xact.abort().unwrap();
    }

    /// A reader opened before a commit keeps its snapshot.
    #[test]
    fn readers_see_stable_snapshots() {
        let (layr, _tmp) = tmp_layer();

        let reader = layr.xact(false).unwrap();

        let mut writer = layr.xact(true).unwrap();
        writer
            .stor(&[prop_set(B0, "f", "p", b"visi", b"\x10")])
            .unwrap();
        writer.commit().unwrap();

        assert!(reader.get_buid_props(&B0).unwrap().is_empty());
        reader.abort().unwrap();

        let fresh = layr.xact(false).unwrap();
        assert_eq!(
            fresh.get_buid_props(&B0).unwrap().get("p").map(Vec::as_slice),
            Some(&b"visi"[..]),
        );
    }

    /// Write operations through a read transaction are rejected.
    #[test]
    fn read_xact_rejects_writes() {
        let (layr, _tmp) = tmp_layer();

        let mut xact = layr.xact(false).unwrap();
        let err = xact
            .stor(&[prop_set(B0, "f", "p", b"v", b"\x01")])
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ReadOnly));

        assert!(matches!(
            xact.splice(&0_u64),
            Err(RuntimeError::ReadOnly)
        ));
    }

    /// The owner check rejects a foreign thread identity.
    #[test]
    fn foreign_thread_is_rejected() {
        let other = thread::spawn(|| thread::current().id()).join().unwrap();

        assert!(check_owner(thread::current().id()).is_ok());
        assert!(matches!(
            check_owner(other),
            Err(RuntimeError::BadThread)
        ));
    }
}
