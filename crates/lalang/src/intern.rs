//! The process string pool.
//!
//! Names and short strings are stored once and referenced by [`StrId`].
//! Bytecode carries pool indices, not pointers; the pool is append-only, so
//! an interned string's index is stable for the lifetime of the VM.

use ahash::AHashMap;

/// Index into the string pool.
///
/// `u32` keeps `Value` small; four billion distinct strings is plenty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrId(u32);

impl StrId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).expect("string pool index out of u32 range"))
    }
}

/// Strings at least this long are not cached when built at runtime.
///
/// Literals and names are always interned regardless of length; this bound
/// only affects strings produced by evaluation (`+`, `.replace`, file
/// reads), which get their own heap cell instead.
pub const MAX_CACHED_STR_LEN: usize = 16;

/// Append-only interner mapping byte strings to stable ids.
#[derive(Debug, Default)]
pub struct Interns {
    map: AHashMap<Box<[u8]>, StrId>,
    strings: Vec<Box<[u8]>>,
}

impl Interns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `bytes`, returning the existing id when already pooled.
    pub fn intern(&mut self, bytes: &[u8]) -> StrId {
        if let Some(&id) = self.map.get(bytes) {
            return id;
        }
        let id = StrId::from_index(self.strings.len());
        let owned: Box<[u8]> = bytes.into();
        self.strings.push(owned.clone());
        self.map.insert(owned, id);
        id
    }

    /// Looks up an already-pooled string without interning it.
    #[must_use]
    pub fn lookup(&self, bytes: &[u8]) -> Option<StrId> {
        self.map.get(bytes).copied()
    }

    /// Returns the bytes of a pooled string.
    #[must_use]
    pub fn get(&self, id: StrId) -> &[u8] {
        &self.strings[id.index()]
    }

    /// Returns a pooled string lossily decoded for diagnostics.
    #[must_use]
    pub fn display(&self, id: StrId) -> String {
        String::from_utf8_lossy(self.get(id)).into_owned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Builds the 256-entry single-byte-string cache.
///
/// Entry 0 is the empty string; every other entry `b` is the pooled 1-byte
/// string containing `b`. Single-byte strings are therefore singletons.
pub fn build_char_cache(interns: &mut Interns) -> [StrId; 256] {
    let empty = interns.intern(b"");
    let mut cache = [empty; 256];
    for (b, slot) in cache.iter_mut().enumerate().skip(1) {
        *slot = interns.intern(&[b as u8]);
    }
    cache
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_and_deduplicated() {
        let mut interns = Interns::new();
        let a = interns.intern(b"square");
        let b = interns.intern(b"x");
        let a2 = interns.intern(b"square");
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(interns.get(a), b"square");
        assert_eq!(interns.lookup(b"x"), Some(b));
        assert_eq!(interns.lookup(b"y"), None);
    }

    #[test]
    fn char_cache_covers_all_bytes() {
        let mut interns = Interns::new();
        let cache = build_char_cache(&mut interns);
        assert_eq!(interns.get(cache[0]), b"");
        assert_eq!(interns.get(cache[b'a' as usize]), b"a");
        assert_eq!(interns.get(cache[255]), &[255u8][..]);
    }
}
