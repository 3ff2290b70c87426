//! Layer [`Env`](heed::Env) configuration.
//!
//! This module contains the [`Config`]uration struct passed to
//! [`Layer::open`](crate::Layer::open). The values are consumed
//! already parsed; loading them from a config file or similar is
//! the caller's concern.

//---------------------------------------------------------------------------------------------------- Import
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MAP_SIZE;

//---------------------------------------------------------------------------------------------------- Config
/// Layer environment configuration.
///
/// ```rust
/// # use hyperlayer::Config;
/// let config = Config::new("/tmp/layer")
///     .map_size(64 * 1024 * 1024)
///     .readahead(false);
/// assert_eq!(config.dir(), std::path::Path::new("/tmp/layer"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// The directory holding all environment files.
    ///
    /// Created on [`Layer::open`](crate::Layer::open) if absent.
    pub(crate) dir: PathBuf,

    /// Size of the memory map, in bytes.
    ///
    /// The environment cannot grow past this without a reopen;
    /// writers that hit the ceiling see
    /// [`RuntimeError::MapFull`](crate::RuntimeError::MapFull).
    pub(crate) map_size: usize,

    /// Whether the OS should read ahead on the memory map.
    ///
    /// Disabling helps when the data set is much larger than RAM
    /// and access is random.
    pub(crate) readahead: bool,
}

impl Config {
    /// Create a new [`Config`] with default settings for `dir`.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            map_size: DEFAULT_MAP_SIZE,
            readahead: true,
        }
    }

    /// Set the memory map size, in bytes.
    #[must_use]
    pub const fn map_size(mut self, map_size: usize) -> Self {
        self.map_size = map_size;
        self
    }

    /// Set whether the OS should read ahead on the memory map.
    #[must_use]
    pub const fn readahead(mut self, readahead: bool) -> Self {
        self.readahead = readahead;
        self
    }

    /// Return the directory holding all environment files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
