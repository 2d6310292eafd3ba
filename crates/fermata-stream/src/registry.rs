//! Process-wide table of open streams.

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::shared::StreamShared;

/// Identifier of an open stream. Ids are reused after close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(NonZeroU32);

impl StreamId {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Id-keyed table handing out the lowest free id, starting at 1.
///
/// The lock is held only for map updates, never across a call into
/// caller code other than the `build` closure of
/// [`allocate_with`](Self::allocate_with).
pub struct StreamRegistry<T> {
    entries: Mutex<BTreeMap<u32, T>>,
}

impl<T: Clone> StreamRegistry<T> {
    pub const fn new() -> Self {
        Self {
            entries: parking_lot::const_mutex(BTreeMap::new()),
        }
    }

    /// Reserve the lowest free id and store the entry `build` makes for it.
    pub fn allocate_with<F>(&self, build: F) -> Result<(StreamId, T)>
    where
        F: FnOnce(StreamId) -> T,
    {
        let mut entries = self.entries.lock();
        let mut candidate = 1u32;
        for &used in entries.keys() {
            if used != candidate {
                break;
            }
            candidate = candidate
                .checked_add(1)
                .ok_or_else(|| Error::OutOfMemory("stream ids exhausted".to_string()))?;
        }
        let id = StreamId::new(candidate)
            .ok_or_else(|| Error::OutOfMemory("stream ids exhausted".to_string()))?;
        let entry = build(id);
        entries.insert(candidate, entry.clone());
        Ok((id, entry))
    }

    pub fn lookup(&self, id: StreamId) -> Option<T> {
        self.entries.lock().get(&id.get()).cloned()
    }

    pub fn release(&self, id: StreamId) -> Option<T> {
        self.entries.lock().remove(&id.get())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<StreamId> {
        self.entries
            .lock()
            .keys()
            .filter_map(|&raw| StreamId::new(raw))
            .collect()
    }
}

impl<T: Clone> Default for StreamRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

static STREAMS: StreamRegistry<Arc<StreamShared>> = StreamRegistry::new();

pub(crate) fn streams() -> &'static StreamRegistry<Arc<StreamShared>> {
    &STREAMS
}

/// Shared state of an open stream; streams being closed are not found.
pub(crate) fn resolve(id: StreamId) -> Result<Arc<StreamShared>> {
    STREAMS
        .lookup(id)
        .filter(|shared| !shared.is_closing())
        .ok_or(Error::InvalidHandle)
}

/// Ids of every stream currently open in this process.
pub fn open_streams() -> Vec<StreamId> {
    STREAMS.ids()
}
