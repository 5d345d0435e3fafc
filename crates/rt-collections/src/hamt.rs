//! `Hamt<K, V>` — a persistent, copy-on-write hash-array-mapped trie.
//!
//! Grounded on `tclHAMT.c`'s two-tier node design: interior nodes branch on
//! 6 bits of the key's hash at a time (64-way fanout), and once all but the
//! last 4 bits of a 64-bit hash have been consumed the trie bottoms out in
//! a leaf node (16-way fanout) whose occupied slots hold a collision chain
//! for keys that hash identically. Every modification walks root-to-leaf,
//! allocating new nodes along that one path and sharing every untouched
//! sibling by `Arc` — concurrent readers holding an older root never
//! observe the edit, and that older root stays valid indefinitely.
//!
//! This implementation fixes the branch/leaf split at a constant depth
//! (ten 6-bit branch levels, one 4-bit leaf level) rather than compressing
//! single-child runs with a stored prefix/mask; every key's path is the
//! same length, which keeps fetch/insert/remove O(1) in practice while
//! still satisfying the trie's sharing and persistence contract.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

const BRANCH_SHIFT: u32 = 6;
const BRANCH_WIDTH: u64 = 1 << BRANCH_SHIFT;
const LEAF_SHIFT: u32 = 4;
const LEAF_DEPTH: u32 = (64 - LEAF_SHIFT) / BRANCH_SHIFT; // 10

fn hash_of<K: Hash>(key: &K) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

fn branch_chunk(hash: u64, depth: u32) -> u32 {
    ((hash >> (depth * BRANCH_SHIFT)) & (BRANCH_WIDTH - 1)) as u32
}

fn leaf_chunk(hash: u64) -> u32 {
    (hash >> (LEAF_DEPTH * BRANCH_SHIFT)) as u32 & 0xF
}

struct Chain<K, V> {
    hash: u64,
    key: K,
    value: V,
    next: Option<Arc<Chain<K, V>>>,
}

enum Node<K, V> {
    Branch {
        bitmap: u64,
        children: Vec<Arc<Node<K, V>>>,
    },
    Leaf {
        bitmap: u16,
        chains: Vec<Arc<Chain<K, V>>>,
    },
}

fn make_chain<K: Clone, V: Clone>(depth: u32, hash: u64, key: K, value: V) -> Arc<Node<K, V>> {
    if depth < LEAF_DEPTH {
        let bit = 1u64 << branch_chunk(hash, depth);
        Arc::new(Node::Branch {
            bitmap: bit,
            children: vec![make_chain(depth + 1, hash, key, value)],
        })
    } else {
        let bit = 1u16 << leaf_chunk(hash);
        Arc::new(Node::Leaf {
            bitmap: bit,
            chains: vec![Arc::new(Chain {
                hash,
                key,
                value,
                next: None,
            })],
        })
    }
}

fn fetch_node<'a, K: Eq, V>(node: &'a Node<K, V>, depth: u32, hash: u64, key: &K) -> Option<&'a V> {
    match node {
        Node::Branch { bitmap, children } => {
            let bit = 1u64 << branch_chunk(hash, depth);
            if bitmap & bit == 0 {
                return None;
            }
            let pos = (bitmap & (bit - 1)).count_ones() as usize;
            fetch_node(&children[pos], depth + 1, hash, key)
        }
        Node::Leaf { bitmap, chains } => {
            let bit = 1u16 << leaf_chunk(hash);
            if bitmap & bit == 0 {
                return None;
            }
            let pos = (bitmap & (bit - 1)).count_ones() as usize;
            let mut cursor = Some(&chains[pos]);
            while let Some(chain) = cursor {
                if chain.hash == hash && &chain.key == key {
                    return Some(&chain.value);
                }
                cursor = chain.next.as_ref();
            }
            None
        }
    }
}

fn chain_insert<K: Eq + Clone, V: Clone>(chain: &Arc<Chain<K, V>>, hash: u64, key: &K, value: &V) -> Arc<Chain<K, V>> {
    if chain.hash == hash && &chain.key == key {
        Arc::new(Chain {
            hash,
            key: key.clone(),
            value: value.clone(),
            next: chain.next.clone(),
        })
    } else {
        let next = match &chain.next {
            Some(n) => chain_insert(n, hash, key, value),
            None => Arc::new(Chain {
                hash,
                key: key.clone(),
                value: value.clone(),
                next: None,
            }),
        };
        Arc::new(Chain {
            hash: chain.hash,
            key: chain.key.clone(),
            value: chain.value.clone(),
            next: Some(next),
        })
    }
}

fn insert_node<K: Hash + Eq + Clone, V: Clone>(
    node: &Arc<Node<K, V>>,
    depth: u32,
    hash: u64,
    key: &K,
    value: &V,
) -> Arc<Node<K, V>> {
    match node.as_ref() {
        Node::Branch { bitmap, children } => {
            let bit = 1u64 << branch_chunk(hash, depth);
            let pos = (bitmap & (bit - 1)).count_ones() as usize;
            let mut new_children = children.clone();
            if bitmap & bit != 0 {
                new_children[pos] = insert_node(&children[pos], depth + 1, hash, key, value);
                Arc::new(Node::Branch {
                    bitmap: *bitmap,
                    children: new_children,
                })
            } else {
                new_children.insert(pos, make_chain(depth + 1, hash, key.clone(), value.clone()));
                Arc::new(Node::Branch {
                    bitmap: bitmap | bit,
                    children: new_children,
                })
            }
        }
        Node::Leaf { bitmap, chains } => {
            let bit = 1u16 << leaf_chunk(hash);
            let pos = (bitmap & (bit - 1)).count_ones() as usize;
            let mut new_chains = chains.clone();
            if bitmap & bit != 0 {
                new_chains[pos] = chain_insert(&chains[pos], hash, key, value);
                Arc::new(Node::Leaf {
                    bitmap: *bitmap,
                    chains: new_chains,
                })
            } else {
                new_chains.insert(
                    pos,
                    Arc::new(Chain {
                        hash,
                        key: key.clone(),
                        value: value.clone(),
                        next: None,
                    }),
                );
                Arc::new(Node::Leaf {
                    bitmap: bitmap | bit,
                    chains: new_chains,
                })
            }
        }
    }
}

fn chain_remove<K: Eq + Clone, V: Clone>(chain: &Arc<Chain<K, V>>, hash: u64, key: &K) -> Option<Arc<Chain<K, V>>> {
    if chain.hash == hash && &chain.key == key {
        chain.next.clone()
    } else {
        match &chain.next {
            None => Some(chain.clone()),
            Some(next) => {
                let new_next = chain_remove(next, hash, key);
                Some(Arc::new(Chain {
                    hash: chain.hash,
                    key: chain.key.clone(),
                    value: chain.value.clone(),
                    next: new_next,
                }))
            }
        }
    }
}

fn remove_node<K: Eq + Clone, V: Clone>(
    node: &Arc<Node<K, V>>,
    depth: u32,
    hash: u64,
    key: &K,
) -> Option<Arc<Node<K, V>>> {
    match node.as_ref() {
        Node::Branch { bitmap, children } => {
            let bit = 1u64 << branch_chunk(hash, depth);
            if bitmap & bit == 0 {
                return Some(node.clone());
            }
            let pos = (bitmap & (bit - 1)).count_ones() as usize;
            let mut new_children = children.clone();
            match remove_node(&children[pos], depth + 1, hash, key) {
                Some(child) => {
                    new_children[pos] = child;
                    Some(Arc::new(Node::Branch {
                        bitmap: *bitmap,
                        children: new_children,
                    }))
                }
                None => {
                    new_children.remove(pos);
                    let new_bitmap = bitmap & !bit;
                    if new_bitmap == 0 {
                        None
                    } else {
                        Some(Arc::new(Node::Branch {
                            bitmap: new_bitmap,
                            children: new_children,
                        }))
                    }
                }
            }
        }
        Node::Leaf { bitmap, chains } => {
            let bit = 1u16 << leaf_chunk(hash);
            if bitmap & bit == 0 {
                return Some(node.clone());
            }
            let pos = (bitmap & (bit - 1)).count_ones() as usize;
            let mut new_chains = chains.clone();
            match chain_remove(&chains[pos], hash, key) {
                Some(chain) => {
                    new_chains[pos] = chain;
                    Some(Arc::new(Node::Leaf {
                        bitmap: *bitmap,
                        chains: new_chains,
                    }))
                }
                None => {
                    new_chains.remove(pos);
                    let new_bitmap = bitmap & !bit;
                    if new_bitmap == 0 {
                        None
                    } else {
                        Some(Arc::new(Node::Leaf {
                            bitmap: new_bitmap,
                            chains: new_chains,
                        }))
                    }
                }
            }
        }
    }
}

fn for_each_node<K, V>(node: &Node<K, V>, f: &mut impl FnMut(&K, &V)) {
    match node {
        Node::Branch { children, .. } => {
            for c in children {
                for_each_node(c, f);
            }
        }
        Node::Leaf { chains, .. } => {
            for chain in chains {
                let mut cursor = Some(chain);
                while let Some(c) = cursor {
                    f(&c.key, &c.value);
                    cursor = c.next.as_ref();
                }
            }
        }
    }
}

/// A persistent map. Cloning a `Hamt` is O(1): it shares the same root.
///
/// ```
/// use rt_collections::Hamt;
///
/// let h0: Hamt<i64, &str> = Hamt::new();
/// let h1 = h0.insert(1, "a");
/// let h2 = h1.insert(17, "d");
/// assert_eq!(h2.fetch(&1), Some(&"a"));
/// assert_eq!(h0.fetch(&1), None); // h0 is untouched
/// ```
#[derive(Clone)]
pub struct Hamt<K, V> {
    root: Option<Arc<Node<K, V>>>,
    size: usize,
}

impl<K, V> Default for Hamt<K, V> {
    fn default() -> Self {
        Hamt { root: None, size: 0 }
    }
}

impl<K: Hash + Eq + Clone, V: Clone> Hamt<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn fetch(&self, key: &K) -> Option<&V> {
        let hash = hash_of(key);
        self.root.as_ref().and_then(|root| fetch_node(root, 0, hash, key))
    }

    /// Returns a new trie with `key` mapped to `value`; `self` is left
    /// untouched and remains a valid, independently usable map.
    pub fn insert(&self, key: K, value: V) -> Self {
        let hash = hash_of(&key);
        let is_new = self.fetch(&key).is_none();
        let new_root = match &self.root {
            Some(root) => insert_node(root, 0, hash, &key, &value),
            None => make_chain(0, hash, key, value),
        };
        Hamt {
            root: Some(new_root),
            size: if is_new { self.size + 1 } else { self.size },
        }
    }

    /// Returns a new trie without `key`. If `key` was absent, returns a map
    /// that shares the same root `Arc` as `self` (identity-equal, not just
    /// value-equal).
    pub fn remove(&self, key: &K) -> Self {
        if self.fetch(key).is_none() {
            return self.clone();
        }
        let hash = hash_of(key);
        let new_root = self
            .root
            .as_ref()
            .and_then(|root| remove_node(root, 0, hash, key));
        Hamt {
            root: new_root,
            size: self.size - 1,
        }
    }

    /// `true` if `self` and `other` share the exact same root allocation.
    pub fn is_identical(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        if let Some(root) = &self.root {
            for_each_node(root, &mut f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_remove_cycle_matches_scenario() {
        let h0: Hamt<i64, &str> = Hamt::new();
        let h1 = h0.insert(1, "a").insert(17, "b").insert(65, "c").insert(17, "d");

        assert_eq!(h1.fetch(&1), Some(&"a"));
        assert_eq!(h1.fetch(&17), Some(&"d"));
        assert_eq!(h1.fetch(&65), Some(&"c"));
        assert_eq!(h1.len(), 3);

        let h2 = h1.remove(&17);
        assert_eq!(h2.fetch(&17), None);
        assert_eq!(h2.len(), 2);

        // h1 persists unchanged.
        assert_eq!(h1.fetch(&17), Some(&"d"));
    }

    #[test]
    fn remove_of_absent_key_is_identity_shared() {
        let h0: Hamt<i64, i64> = Hamt::new().insert(1, 1).insert(2, 2);
        let h1 = h0.remove(&999);
        assert!(h0.is_identical(&h1));
        assert_eq!(h1.len(), 2);
    }

    #[test]
    fn large_insert_then_fetch_all() {
        let mut h: Hamt<i64, i64> = Hamt::new();
        for i in 0..5000i64 {
            h = h.insert(i, i * 3);
        }
        assert_eq!(h.len(), 5000);
        for i in 0..5000i64 {
            assert_eq!(h.fetch(&i), Some(&(i * 3)));
        }
    }

    #[test]
    fn overwrite_does_not_change_size() {
        let h0: Hamt<&str, i32> = Hamt::new().insert("k", 1);
        let h1 = h0.insert("k", 2);
        assert_eq!(h1.len(), 1);
        assert_eq!(h1.fetch(&"k"), Some(&2));
    }

    #[quickcheck_macros::quickcheck]
    fn matches_a_reference_map(ops: Vec<(u8, i32)>) -> bool {
        use std::collections::HashMap;
        let mut h: Hamt<u8, i32> = Hamt::new();
        let mut model: HashMap<u8, i32> = HashMap::new();
        for (k, v) in ops {
            if v % 2 == 0 {
                h = h.insert(k, v);
                model.insert(k, v);
            } else {
                h = h.remove(&k);
                model.remove(&k);
            }
        }
        if h.len() != model.len() {
            return false;
        }
        model.iter().all(|(k, v)| h.fetch(k) == Some(v))
    }
}
