use std::collections::HashMap;
use std::sync::Mutex;

use log::debug;

/// Registry of noise symbols.
///
/// Noise symbols are the formal deviation variables `ei` in `[-1, 1]` shared
/// between affine forms to preserve correlation. The registry hands out
/// unique small integer ids and keeps an optional name per id so that two
/// lookups by the same name return the same symbol. Ids start at 1 and are
/// never reused; `clear` is the only reset.
#[derive(Debug, Default)]
pub struct NoiseSymbols {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    max_index: u32,
    names: HashMap<u32, String>,
}

impl NoiseSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh anonymous symbol. Never deduplicates.
    pub fn fresh(&self) -> u32 {
        let mut inner = self.inner.lock().unwrap();
        inner.max_index += 1;
        debug!("fresh noise symbol {}", inner.max_index);
        inner.max_index
    }

    /// Return the symbol with the given name, allocating it on first use.
    pub fn named(&self, name: &str) -> u32 {
        let mut inner = self.inner.lock().unwrap();
        for (index, n) in inner.names.iter() {
            if n == name {
                return *index;
            }
        }
        inner.max_index += 1;
        let index = inner.max_index;
        inner.names.insert(index, name.to_string());
        debug!("noise symbol {} named {:?}", index, name);
        index
    }

    pub fn name_of(&self, index: u32) -> Option<String> {
        self.inner.lock().unwrap().names.get(&index).cloned()
    }

    /// Number of ids handed out so far.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().max_index as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Explicit reset. Ids are never reused otherwise.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.max_index = 0;
        inner.names.clear();
    }

    pub(crate) fn export(&self) -> HashMap<u32, String> {
        self.inner.lock().unwrap().names.clone()
    }

    pub(crate) fn import(&self, names: HashMap<u32, String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.max_index = names.keys().copied().max().unwrap_or(0);
        inner.names = names;
    }
}
