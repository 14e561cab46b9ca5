//! Memoized command lists of Form XObjects.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use super::commands::CommandList;
use crate::model::objects::{ObjectId, PdfStream};

/// Identity of a form: its object id, or the address of a direct stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormKey {
    Object(ObjectId),
    Stream(usize),
}

impl FormKey {
    pub fn for_stream(stream: &Arc<PdfStream>) -> Self {
        Self::Stream(Arc::as_ptr(stream) as usize)
    }
}

struct Entry {
    // Holds direct streams alive so their address stays unique.
    _stream: Option<Arc<PdfStream>>,
    commands: Arc<CommandList>,
}

/// Shared between the interpreters of one document; a form used on many
/// pages is parsed once.
#[derive(Default)]
pub struct FormCache {
    entries: Mutex<FxHashMap<FormKey, Entry>>,
    parsed: AtomicUsize,
}

impl FormCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: FormKey) -> Option<Arc<CommandList>> {
        let entries = self.entries.lock().ok()?;
        entries.get(&key).map(|e| Arc::clone(&e.commands))
    }

    pub fn insert(&self, key: FormKey, stream: &Arc<PdfStream>, commands: CommandList) -> Arc<CommandList> {
        let commands = Arc::new(commands);
        self.parsed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut entries) = self.entries.lock() {
            let keep = matches!(key, FormKey::Stream(_)).then(|| Arc::clone(stream));
            entries.insert(
                key,
                Entry {
                    _stream: keep,
                    commands: Arc::clone(&commands),
                },
            );
        }
        commands
    }

    /// Number of forms interpreted so far (cache misses).
    pub fn parsed_count(&self) -> usize {
        self.parsed.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl std::fmt::Debug for FormCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormCache")
            .field("len", &self.len())
            .field("parsed", &self.parsed_count())
            .finish()
    }
}
