//! Storage operation types.

//---------------------------------------------------------------------------------------------------- Import
use crate::constants::BUID_SIZE;

//---------------------------------------------------------------------------------------------------- Buid
/// A 32-byte opaque node identifier.
///
/// Supplied by the caller and never inspected by the layer;
/// uniquely identifies a node across all layers.
pub type Buid = [u8; BUID_SIZE];

//---------------------------------------------------------------------------------------------------- StorOp
/// Per-operation options for [`StorOp`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct OpInfo {
    /// Is the property universal?
    ///
    /// Universal properties are additionally indexed across
    /// all forms in the `byuniv` sub-database.
    pub univ: bool,
}

/// A single storage operation executed by
/// [`Xact::stor`](crate::Xact::stor).
///
/// An empty `prop` addresses the form's primary property,
/// stored under the sentinel name `"*" + form`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorOp {
    /// Set a property on a node, overwriting any prior value
    /// and rewriting its secondary index entries.
    PropSet {
        /// Node identifier.
        buid: Buid,
        /// Form (type) name of the node.
        form: String,
        /// Property name; empty for the primary property.
        prop: String,
        /// Opaque serialized value.
        valu: Vec<u8>,
        /// Sort-stable index bytes derived from the value.
        indx: Vec<u8>,
        /// Operation options.
        info: OpInfo,
    },

    /// Delete a property from a node. Idempotent.
    PropDel {
        /// Node identifier.
        buid: Buid,
        /// Form (type) name of the node.
        form: String,
        /// Property name; empty for the primary property.
        prop: String,
        /// Operation options.
        info: OpInfo,
    },
}

//---------------------------------------------------------------------------------------------------- LiftOp
/// A single index operator inside a [`LiftOp::Indx`] lift.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndxOp {
    /// Rows whose index bytes equal these bytes.
    Eq(Vec<u8>),
    /// Rows whose index bytes start with these bytes.
    Pref(Vec<u8>),
    /// Rows whose index bytes fall in `[lo, hi]` (lexicographic).
    Range(Vec<u8>, Vec<u8>),
}

/// A row lifting operation executed by
/// [`Xact::lift`](crate::Xact::lift).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LiftOp {
    /// Walk a secondary index by raw bytes.
    ///
    /// Each [`IndxOp`] runs against `db` under `prefix` and rows
    /// come out in engine key order, operators concatenated in
    /// input order.
    Indx {
        /// Sub-database name, e.g. `"byprop"`.
        db: String,
        /// Key prefix the operators are scoped under
        /// (typically encoder tokens).
        prefix: Vec<u8>,
        /// Index operators, run in order.
        ops: Vec<IndxOp>,
    },

    /// Rows of `form:prop` whose value bytes match a regex.
    PropRe {
        /// Form name.
        form: String,
        /// Property name.
        prop: String,
        /// Regex applied to the raw value bytes.
        pattern: String,
    },

    /// Rows of a universal property whose value bytes match a regex.
    UnivRe {
        /// Universal property name.
        prop: String,
        /// Regex applied to the raw value bytes.
        pattern: String,
    },

    /// Primary rows of a form whose value bytes match a regex.
    FormRe {
        /// Form name.
        form: String,
        /// Regex applied to the raw value bytes.
        pattern: String,
    },
}
