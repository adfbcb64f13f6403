use std::collections::HashMap;
use std::hash::Hash;

use crate::common::{KilnError, Result};

/// Handle of the head sentinel (most recently used side)
const HEAD: usize = 0;

/// Handle of the tail sentinel (least recently used side)
const TAIL: usize = 1;

/// A node of the recency list. Sentinels carry no entry.
#[derive(Debug)]
struct Node<K, V> {
    entry: Option<(K, V)>,
    prev: usize,
    next: usize,
}

/// Bounded LRU map with O(1) `get`, `put` and eviction.
///
/// Recency is a doubly linked list threaded through an arena of nodes, with
/// sentinel head and tail nodes at fixed handles. The hash index maps each
/// resident key to the handle of its node, so no operation walks the list.
/// Freed handles are recycled, so the arena never grows past capacity + 2.
///
/// The index and the list always hold exactly the same key set.
///
/// The cache performs no I/O: when `put` evicts an entry it hands the victim
/// back so the owner can write it out before it is dropped.
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    nodes: Vec<Node<K, V>>,
    free: Vec<usize>,
    index: HashMap<K, usize>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(KilnError::InvalidCapacity(capacity));
        }

        let mut nodes = Vec::with_capacity(capacity + 2);
        nodes.push(Node {
            entry: None,
            prev: HEAD,
            next: TAIL,
        });
        nodes.push(Node {
            entry: None,
            prev: HEAD,
            next: TAIL,
        });

        Ok(Self {
            capacity,
            nodes,
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let handle = *self.index.get(key)?;
        self.move_to_front(handle);
        self.nodes[handle].entry.as_ref().map(|(_, v)| v)
    }

    /// Returns a mutable reference to the value for `key` and marks it most recently used.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let handle = *self.index.get(key)?;
        self.move_to_front(handle);
        self.nodes[handle].entry.as_mut().map(|(_, v)| v)
    }

    /// Returns the value for `key` without touching recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let handle = *self.index.get(key)?;
        self.nodes[handle].entry.as_ref().map(|(_, v)| v)
    }

    /// Returns the entry the next eviction would pick, without touching recency.
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        let handle = self.nodes[TAIL].prev;
        self.nodes[handle].entry.as_ref().map(|(k, v)| (k, v))
    }

    /// Returns the least recently used entry accepted by `pred`, walking
    /// from the LRU end. Recency is not touched.
    pub fn peek_lru_where<F>(&self, mut pred: F) -> Option<(&K, &V)>
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut handle = self.nodes[TAIL].prev;
        while handle != HEAD {
            let node = &self.nodes[handle];
            if let Some((k, v)) = node.entry.as_ref() {
                if pred(k, v) {
                    return Some((k, v));
                }
            }
            handle = node.prev;
        }
        None
    }

    /// Inserts or overwrites `key` and marks it most recently used.
    ///
    /// If the cache is full and `key` is new, the least recently used entry
    /// is evicted first and returned. Overwriting never evicts.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&handle) = self.index.get(&key) {
            self.nodes[handle].entry = Some((key, value));
            self.move_to_front(handle);
            return None;
        }

        let evicted = if self.index.len() >= self.capacity {
            self.pop_lru()
        } else {
            None
        };

        let handle = self.alloc(key.clone(), value);
        self.link_front(handle);
        self.index.insert(key, handle);

        evicted
    }

    /// Removes `key` and returns its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let handle = self.index.remove(key)?;
        self.unlink(handle);
        self.release(handle).map(|(_, v)| v)
    }

    /// Removes and returns the least recently used entry.
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let handle = self.nodes[TAIL].prev;
        if handle == HEAD {
            return None;
        }
        self.unlink(handle);
        let entry = self.release(handle)?;
        self.index.remove(&entry.0);
        Some(entry)
    }

    /// Iterates resident entries from most to least recently used.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            cache: self,
            cursor: self.nodes[HEAD].next,
        }
    }

    /// Iterates resident values from most to least recently used.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    fn alloc(&mut self, key: K, value: V) -> usize {
        let node = Node {
            entry: Some((key, value)),
            prev: HEAD,
            next: TAIL,
        };
        match self.free.pop() {
            Some(handle) => {
                self.nodes[handle] = node;
                handle
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, handle: usize) -> Option<(K, V)> {
        self.free.push(handle);
        self.nodes[handle].entry.take()
    }

    fn unlink(&mut self, handle: usize) {
        let (prev, next) = (self.nodes[handle].prev, self.nodes[handle].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    fn link_front(&mut self, handle: usize) {
        let first = self.nodes[HEAD].next;
        self.nodes[handle].prev = HEAD;
        self.nodes[handle].next = first;
        self.nodes[first].prev = handle;
        self.nodes[HEAD].next = handle;
    }

    fn move_to_front(&mut self, handle: usize) {
        if self.nodes[HEAD].next != handle {
            self.unlink(handle);
            self.link_front(handle);
        }
    }
}

/// Iterator over cache entries in recency order (most recent first).
pub struct Iter<'a, K, V> {
    cache: &'a LruCache<K, V>,
    cursor: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == TAIL {
            return None;
        }
        let node = &self.cache.nodes[self.cursor];
        self.cursor = node.next;
        node.entry.as_ref().map(|(k, v)| (k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(cache: &LruCache<u32, &'static str>) -> Vec<u32> {
        cache.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_lru_cache_new() {
        let cache: LruCache<u32, u32> = LruCache::new(3).unwrap();
        assert_eq!(cache.capacity(), 3);
        assert!(cache.is_empty());
        assert!(cache.peek_lru().is_none());
    }

    #[test]
    fn test_lru_cache_zero_capacity() {
        assert!(matches!(
            LruCache::<u32, u32>::new(0),
            Err(KilnError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn test_lru_cache_get_promotes() {
        let mut cache = LruCache::new(3).unwrap();
        cache.put(1, "a");
        cache.put(2, "b");
        cache.put(3, "c");
        assert_eq!(keys(&cache), vec![3, 2, 1]);

        assert_eq!(cache.get(&1), Some(&"a"));
        assert_eq!(keys(&cache), vec![1, 3, 2]);
        assert_eq!(cache.peek_lru(), Some((&2, &"b")));
    }

    #[test]
    fn test_lru_cache_peek_does_not_promote() {
        let mut cache = LruCache::new(2).unwrap();
        cache.put(1, "a");
        cache.put(2, "b");
        assert_eq!(cache.peek(&1), Some(&"a"));
        assert_eq!(cache.put(3, "c"), Some((1, "a")));
    }

    #[test]
    fn test_lru_cache_peek_lru_where_skips_rejected() {
        let mut cache = LruCache::new(4).unwrap();
        for k in 1..=4u32 {
            cache.put(k, k * 10);
        }
        assert_eq!(cache.peek_lru_where(|k, _| *k != 1), Some((&2, &20)));
        assert_eq!(cache.peek_lru_where(|_, v| *v > 30), Some((&4, &40)));
        assert_eq!(cache.peek_lru_where(|_, _| false), None);
        let order: Vec<u32> = cache.iter().map(|(k, _)| *k).collect();
        assert_eq!(order, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_lru_cache_overwrite_does_not_evict() {
        let mut cache = LruCache::new(2).unwrap();
        cache.put(1, "a");
        cache.put(2, "b");
        assert_eq!(cache.put(1, "z"), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(keys(&cache), vec![1, 2]);
        assert_eq!(cache.peek(&1), Some(&"z"));
    }

    #[test]
    fn test_lru_cache_remove_recycles_handles() {
        let mut cache = LruCache::new(2).unwrap();
        for round in 0..10u32 {
            cache.put(round, "x");
            assert_eq!(cache.remove(&round), Some("x"));
        }
        assert!(cache.is_empty());
        assert_eq!(cache.nodes.len(), 3);
        assert_eq!(cache.remove(&99), None);
    }

    #[test]
    fn test_lru_cache_index_and_list_agree() {
        let mut cache = LruCache::new(4).unwrap();
        for i in 0..20u32 {
            cache.put(i % 7, "v");
            if i % 3 == 0 {
                cache.get(&(i % 5));
            }
            if i % 4 == 0 {
                cache.remove(&(i % 6));
            }
            let listed = keys(&cache);
            assert_eq!(listed.len(), cache.len());
            assert!(listed.iter().all(|k| cache.contains_key(k)));
        }
    }
}
