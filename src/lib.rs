//! Transactional LMDB storage layer for a hypergraph datastore.
//!
//! This crate implements the storage layer underneath a hypergraph
//! query engine: a transactional, append-evolving store mapping
//! `(buid, prop)` keys to values, with secondary indexes over forms,
//! properties and universal properties so rows can be lifted by
//! equality, prefix, or range over caller-supplied index bytes, and
//! an append-only change log ("splices") for downstream replication.
//!
//! # Layers
//! A [`Layer`] owns one memory-mapped environment directory holding
//! five sub-databases:
//!
//! | Name      | Key                       | Value            |
//! |-----------|---------------------------|------------------|
//! | `bybuid`  | `buid \|\| prop`          | `(valu, indx)`   |
//! | `byprop`  | `form \|\| prop \|\| indx`| `(buid,)`        |
//! | `byuniv`  | `prop \|\| indx`          | `(buid,)`        |
//! | `offsets` | `iden`                    | `u64`            |
//! | `splices` | `u64` (big-endian)        | splice bytes     |
//!
//! Values are msgpack with explicit binary payloads; keys are raw
//! concatenated bytes, with form/prop names interned to NUL-framed
//! tokens so concatenation stays prefix-unambiguous.
//!
//! # Transactions
//! All reads and writes go through an [`Xact`], created with
//! [`Layer::xact`]. One writer runs at a time; readers run in
//! parallel against stable snapshots. A transaction is pinned to
//! the thread that created it and ends in [`Xact::commit`] or
//! [`Xact::abort`].
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use hyperlayer::{Config, Layer, OpInfo, StorOp};
//!
//! # let dir = tempfile::tempdir()?;
//! let layr = Layer::open(Config::new(dir.path()).map_size(64 * 1024 * 1024))?;
//!
//! let mut xact = layr.xact(true)?;
//! xact.stor(&[StorOp::PropSet {
//!     buid: [0x00; 32],
//!     form: "inet:ipv4".into(),
//!     prop: "asn".into(),
//!     valu: b"\xcd\x02\x9b".to_vec(),
//!     indx: b"\x00\x02\x9b".to_vec(),
//!     info: OpInfo::default(),
//! }])?;
//! xact.commit()?;
//! # Ok(()) }
//! ```

//---------------------------------------------------------------------------------------------------- Lints
#![deny(unused_attributes)]
#![deny(clippy::missing_safety_doc, clippy::undocumented_unsafe_blocks)]
#![warn(missing_docs, clippy::todo, clippy::unimplemented)]
#![allow(clippy::module_name_repetitions)]

//---------------------------------------------------------------------------------------------------- Public API
pub mod config;
pub mod constants;
pub mod error;
pub mod types;

mod cache;
mod layer;
mod names;
mod offs;
mod serial;
mod splice;
mod xact;

pub use config::Config;
pub use error::{InitError, RuntimeError};
pub use layer::Layer;
pub use splice::{SpliceEvent, Splices};
pub use types::{Buid, IndxOp, LiftOp, OpInfo, StorOp};
pub use xact::Xact;
