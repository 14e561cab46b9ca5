//! Bounded LRU cache of parsed indirect objects.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::model::objects::{ObjectId, PdfObject};

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Least recently used entries sit at the front of the map.
#[derive(Debug)]
pub struct ObjectCache {
    capacity: usize,
    map: IndexMap<ObjectId, Arc<PdfObject>>,
}

impl ObjectCache {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: IndexMap::new(),
        }
    }

    pub fn get(&mut self, id: ObjectId) -> Option<Arc<PdfObject>> {
        if self.capacity == 0 {
            return None;
        }
        let index = self.map.get_index_of(&id)?;
        let value = Arc::clone(self.map.get_index(index)?.1);
        if index + 1 != self.map.len() {
            self.map.move_index(index, self.map.len() - 1);
        }
        Some(value)
    }

    pub fn insert(&mut self, id: ObjectId, value: Arc<PdfObject>) {
        if self.capacity == 0 {
            return;
        }
        self.map.shift_remove(&id);
        self.map.insert(id, value);
        if self.map.len() > self.capacity {
            self.map.shift_remove_index(0);
        }
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> ObjectId {
        ObjectId::new(n, 0)
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = ObjectCache::new(2);
        cache.insert(id(1), Arc::new(PdfObject::Int(1)));
        cache.insert(id(2), Arc::new(PdfObject::Int(2)));
        assert!(cache.get(id(1)).is_some());
        cache.insert(id(3), Arc::new(PdfObject::Int(3)));
        assert!(cache.get(id(2)).is_none());
        assert_eq!(*cache.get(id(1)).unwrap(), PdfObject::Int(1));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_disables() {
        let mut cache = ObjectCache::new(0);
        cache.insert(id(1), Arc::new(PdfObject::Null));
        assert!(cache.get(id(1)).is_none());
        assert!(cache.is_empty());
    }
}
