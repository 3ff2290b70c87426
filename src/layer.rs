//! The layer; owner of the environment and all derived handles.

//---------------------------------------------------------------------------------------------------- Import
use std::collections::HashMap;

use heed::byteorder::BE;
use heed::types::{Bytes, U64};
use heed::{Database, DatabaseFlags, Env, EnvFlags, EnvOpenOptions};

use crate::config::Config;
use crate::constants::{DB_BYBUID, DB_BYPROP, DB_BYUNIV, DB_OFFSETS, DB_SPLICES, MAX_DBS};
use crate::error::{InitError, RuntimeError};
use crate::names::NameCache;
use crate::offs::OffsetStore;
use crate::splice::{SpliceEvent, SpliceLog, Splices};
use crate::xact::Xact;

//---------------------------------------------------------------------------------------------------- Layer
/// A layer implements btree indexed row storage for a hypergraph.
///
/// One directory per layer holds the environment files. The layer
/// owns the environment, the five sub-databases, the name interner
/// tables, the offset store and the splice log; transactions borrow
/// from it via [`Layer::xact`] and must end before [`Layer::fini`].
///
/// The layer itself is thread-safe; share it with `&`/`Arc` and
/// issue one [`Xact`] per thread.
pub struct Layer {
    /// The memory-mapped environment.
    pub(crate) env: Env,
    /// The configuration the environment was opened with.
    config: Config,

    /// `buid || prop` -> `(valu, indx)`.
    pub(crate) bybuid: Database<Bytes, Bytes>,
    /// `form || prop || indx` -> `(buid,)`.
    pub(crate) byprop: Database<Bytes, Bytes>,
    /// `prop || indx` -> `(buid,)`.
    pub(crate) byuniv: Database<Bytes, Bytes>,

    /// Sub-database handles by name, for named lifts.
    dbs: HashMap<&'static str, Database<Bytes, Bytes>>,

    /// Interned UTF-8 name bytes.
    pub(crate) utf8: NameCache,
    /// Interned NUL-framed encoder tokens.
    pub(crate) encoder: NameCache,

    /// Per-iden consumer offsets.
    pub(crate) offs: OffsetStore,
    /// The append-only change log.
    pub(crate) splicelog: SpliceLog,
    /// Signaled once per commit that appended splices.
    pub(crate) spliced: SpliceEvent,
}

impl Layer {
    //------------------------------------------------ Init
    /// Open (or create) the layer at [`Config::dir`](crate::Config).
    #[cold]
    #[inline(never)] // called once per layer.
    pub fn open(config: Config) -> Result<Self, InitError> {
        std::fs::create_dir_all(&config.dir)?;

        let mut options = EnvOpenOptions::new();
        options.map_size(config.map_size).max_dbs(MAX_DBS);

        let mut flags = EnvFlags::WRITE_MAP;
        if !config.readahead {
            flags |= EnvFlags::NO_READ_AHEAD;
        }

        // SAFETY: the flags used here only tune the memory map;
        // none of them break LMDB's aliasing or durability rules
        // for a single-process environment.
        unsafe {
            options.flags(flags);
        }

        // SAFETY: the environment directory is not opened twice
        // within this process; the `Layer` is the sole owner.
        let env = unsafe { options.open(&config.dir)? };

        let mut wtxn = env.write_txn()?;

        let bybuid = env
            .database_options()
            .types::<Bytes, Bytes>()
            .name(DB_BYBUID)
            .create(&mut wtxn)?;

        // Many buids may share one index value for a property,
        // so the secondary indexes keep duplicate keys.
        let byprop = env
            .database_options()
            .types::<Bytes, Bytes>()
            .name(DB_BYPROP)
            .flags(DatabaseFlags::DUP_SORT)
            .create(&mut wtxn)?;

        let byuniv = env
            .database_options()
            .types::<Bytes, Bytes>()
            .name(DB_BYUNIV)
            .flags(DatabaseFlags::DUP_SORT)
            .create(&mut wtxn)?;

        let offsets = env
            .database_options()
            .types::<Bytes, U64<BE>>()
            .name(DB_OFFSETS)
            .create(&mut wtxn)?;

        let splices = env
            .database_options()
            .types::<U64<BE>, Bytes>()
            .name(DB_SPLICES)
            .create(&mut wtxn)?;

        wtxn.commit()?;

        let dbs = HashMap::from([
            (DB_BYBUID, bybuid),
            (DB_BYPROP, byprop),
            (DB_BYUNIV, byuniv),
            (DB_OFFSETS, offsets.remap_types::<Bytes, Bytes>()),
            (DB_SPLICES, splices.remap_types::<Bytes, Bytes>()),
        ]);

        tracing::debug!(
            dir = %config.dir.display(),
            map_size = config.map_size,
            "opened layer environment",
        );

        Ok(Self {
            env,
            config,
            bybuid,
            byprop,
            byuniv,
            dbs,
            utf8: NameCache::utf8(),
            encoder: NameCache::encoder(),
            offs: OffsetStore::new(offsets),
            splicelog: SpliceLog::new(splices),
            spliced: SpliceEvent::new(),
        })
    }

    /// Return the [`Config`] this layer was opened with.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    //------------------------------------------------ Transactions
    /// Return a transaction object for the layer.
    ///
    /// At most one write transaction is active at a time; a second
    /// writer blocks until the first ends. Readers run in parallel
    /// against stable snapshots.
    pub fn xact(&self, write: bool) -> Result<Xact<'_>, RuntimeError> {
        Xact::new(self, write)
    }

    //------------------------------------------------ Offsets
    /// Return the offset for `iden`, 0 if never set.
    pub fn get_offset(&self, iden: &[u8]) -> Result<u64, RuntimeError> {
        let txn = self.env.read_txn()?;
        self.offs.xget(&txn, iden)
    }

    /// Overwrite the offset for `iden`.
    pub fn set_offset(&self, iden: &[u8], offs: u64) -> Result<(), RuntimeError> {
        let mut txn = self.env.write_txn()?;
        self.offs.xset(&mut txn, iden, offs)?;
        Ok(txn.commit()?)
    }

    //------------------------------------------------ Splices
    /// Stream up to `size` splice log records starting at `offs`.
    ///
    /// The iterator holds its own read transaction and yields
    /// `(offs, mesg)` pairs in offset order.
    pub fn splices(&self, offs: u64, size: usize) -> Result<Splices<'_>, RuntimeError> {
        Ok(Splices {
            db: self.splicelog.db(),
            txn: self.env.read_txn()?,
            offs,
            remaining: size,
        })
    }

    /// The signal set once per commit that appended splices.
    ///
    /// Consumers wait on it to tail the log live.
    pub const fn spliced(&self) -> &SpliceEvent {
        &self.spliced
    }

    //------------------------------------------------ Sub-databases
    /// Look up a sub-database handle by name.
    pub fn db(&self, name: &str) -> Option<Database<Bytes, Bytes>> {
        self.dbs.get(name).copied()
    }

    //------------------------------------------------ Fini
    /// Sync and close the environment.
    ///
    /// All transactions borrow the layer, so outstanding ones must
    /// have ended before this can be called.
    pub fn fini(self) -> Result<(), RuntimeError> {
        tracing::debug!("syncing and closing layer environment");

        self.env.force_sync()?;
        self.env.prepare_for_closing().wait();
        Ok(())
    }
}
