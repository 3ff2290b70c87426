//! Layer error types; `InitError` & `RuntimeError`.

//---------------------------------------------------------------------------------------------------- Constants
/// The message shown in panic messages if we
/// think the underlying database is corrupted.
const CORRUPTION_ERROR_MSG: &str =
    "hyperlayer has encountered a fatal storage engine error. The layer database may be corrupted.";

//---------------------------------------------------------------------------------------------------- InitError
/// Errors that can occur when opening a [`Layer`](crate::Layer).
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The environment files are in an invalid state.
    #[error("layer database is in an invalid state")]
    Invalid,

    /// The environment was created by an incompatible engine version.
    #[error("layer database version is incompatible")]
    InvalidVersion,

    /// The environment files appear corrupt.
    #[error("layer database is corrupt")]
    Corrupt,

    /// The environment is in the process of shutting down.
    #[error("layer database is shutting down")]
    ShuttingDown,

    /// An unknown error occurred.
    #[error("unknown error: {0}")]
    Unknown(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl From<heed::Error> for InitError {
    fn from(error: heed::Error) -> Self {
        use heed::Error as E1;
        use heed::MdbError as E2;

        match error {
            E1::Io(io_error) => Self::Io(io_error),
            E1::DatabaseClosing => Self::ShuttingDown,

            // LMDB errors.
            E1::Mdb(mdb_error) => match mdb_error {
                E2::Invalid => Self::Invalid,
                E2::VersionMismatch => Self::InvalidVersion,
                E2::Corrupted | E2::PageNotFound => Self::Corrupt,
                other => Self::Unknown(Box::new(other)),
            },

            error => Self::Unknown(Box::new(error)),
        }
    }
}

//---------------------------------------------------------------------------------------------------- RuntimeError
/// Errors that can occur on storage operations after a
/// [`Layer`](crate::Layer) has been successfully opened.
#[derive(thiserror::Error, Debug)]
pub enum RuntimeError {
    /// Index bytes longer than
    /// [`MAX_INDX_SIZE`](crate::constants::MAX_INDX_SIZE) were supplied.
    #[error("index bytes are too large ({0} bytes)")]
    BadIndxValu(usize),

    /// A lift named a sub-database this layer does not have.
    #[error("no such sub-database: {0}")]
    NoSuchName(String),

    /// A transaction was used from a thread
    /// other than the one that created it.
    #[error("transaction used from a foreign thread")]
    BadThread,

    /// A write operation was attempted through a read-only transaction.
    #[error("transaction is read-only")]
    ReadOnly,

    /// A key did not exist in a sub-database.
    #[error("key does not exist")]
    KeyNotFound,

    /// A key already existed in a sub-database.
    #[error("key already exists")]
    KeyExists,

    /// The memory map is full.
    ///
    /// Surfaced unchanged so callers can grow
    /// [`Config::map_size`](crate::Config) and reopen.
    #[error("memory map is full")]
    MapFull,

    /// The environment is in the process of shutting down.
    #[error("layer database is shutting down")]
    ShuttingDown,

    /// A value failed to encode.
    #[error("encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Stored bytes failed to decode.
    #[error("decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// A regex lift was given an invalid pattern.
    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[allow(clippy::fallible_impl_from)] // We need to panic sometimes.
impl From<heed::Error> for RuntimeError {
    /// # Panics
    /// This will panic on unrecoverable errors for safety.
    fn from(error: heed::Error) -> Self {
        use heed::Error as E1;
        use heed::MdbError as E2;

        match error {
            E1::Io(io_error) => Self::Io(io_error),
            E1::DatabaseClosing => Self::ShuttingDown,

            // LMDB errors.
            E1::Mdb(mdb_error) => match mdb_error {
                E2::KeyExist => Self::KeyExists,
                E2::NotFound => Self::KeyNotFound,
                E2::MapFull => Self::MapFull,

                // Corruption errors get a special panic message.
                E2::Corrupted | E2::PageNotFound => {
                    panic!("{mdb_error:?}\n{CORRUPTION_ERROR_MSG}")
                }

                // Remaining engine errors only happen on
                // incorrect layer code; fail loudly.
                mdb_error => panic!("fix the layer code! {mdb_error:?}"),
            },

            // Encoding/decoding never goes through heed codecs
            // that can fail, and the remaining variants only
            // happen on incorrect layer code.
            error => panic!("fix the layer code! {error:?}"),
        }
    }
}
