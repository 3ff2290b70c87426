//! Interned form/property name tables.

//---------------------------------------------------------------------------------------------------- Import
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

//---------------------------------------------------------------------------------------------------- NameCache
/// A read-mostly table interning names to stable byte tokens.
///
/// Two instances live on the [`Layer`](crate::Layer): one caching the
/// plain UTF-8 bytes of each name, one caching the NUL-framed encoder
/// token used inside secondary index keys. The NUL terminator keeps
/// concatenated tokens prefix-unambiguous.
///
/// Tokens are a pure function of the name, so the table is never
/// persisted and an existing database reopens with identical keys.
/// First access for a name mints and caches its token; the cached
/// token never changes for the life of the layer.
#[derive(Debug)]
pub(crate) struct NameCache {
    /// name -> token.
    names: RwLock<HashMap<String, Arc<[u8]>>>,
    /// Append a NUL terminator when minting?
    framed: bool,
}

impl NameCache {
    /// Table of plain UTF-8 name bytes.
    pub(crate) fn utf8() -> Self {
        Self {
            names: RwLock::new(HashMap::new()),
            framed: false,
        }
    }

    /// Table of NUL-framed encoder tokens.
    pub(crate) fn encoder() -> Self {
        Self {
            names: RwLock::new(HashMap::new()),
            framed: true,
        }
    }

    /// Return the token for `name`, minting it on first access.
    pub(crate) fn get(&self, name: &str) -> Arc<[u8]> {
        if let Some(token) = self.names.read().get(name) {
            return Arc::clone(token);
        }

        let mut bytes = name.as_bytes().to_vec();
        if self.framed {
            bytes.push(0);
        }

        // Racing minters agree on the bytes; keep whichever landed first.
        Arc::clone(
            self.names
                .write()
                .entry(name.to_owned())
                .or_insert_with(|| Arc::from(bytes)),
        )
    }
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn utf8_tokens() {
        let utf8 = NameCache::utf8();
        assert_eq!(&*utf8.get("inet:ipv4"), b"inet:ipv4");
        assert_eq!(&*utf8.get(""), b"");
    }

    #[test]
    fn encoder_tokens_are_framed() {
        let enc = NameCache::encoder();
        assert_eq!(&*enc.get("f"), b"f\x00");
        assert_eq!(&*enc.get(""), b"\x00");
    }

    #[test]
    fn tokens_are_stable() {
        let enc = NameCache::encoder();
        let first = enc.get("asn");
        let again = enc.get("asn");
        assert!(Arc::ptr_eq(&first, &again));
    }
}
