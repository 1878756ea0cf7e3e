// SPDX-License-Identifier: MPL-2.0

/// A map that keeps its first couple of entries inline and preserves
/// insertion order, so that iteration (and therefore everything derived
/// from it, like reports) is deterministic. Lookups are linear scans,
/// which is fine: incompatibilities rarely hold more than two terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmallMap<K, V> {
    Empty,
    One([(K, V); 1]),
    Two([(K, V); 2]),
    Flexible(Vec<(K, V)>),
}

impl<K: PartialEq, V> SmallMap<K, V> {
    pub fn get(&self, key: &K) -> Option<&V> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn insert(&mut self, key: K, value: V) {
        for (k, v) in self.as_mut_slice() {
            if k == &key {
                *v = value;
                return;
            }
        }
        *self = match std::mem::replace(self, Self::Empty) {
            Self::Empty => Self::One([(key, value)]),
            Self::One([e1]) => Self::Two([e1, (key, value)]),
            Self::Two([e1, e2]) => Self::Flexible(vec![e1, e2, (key, value)]),
            Self::Flexible(mut v) => {
                v.push((key, value));
                Self::Flexible(v)
            }
        };
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let index = self.iter().position(|(k, _)| k == key)?;
        let out = match std::mem::replace(self, Self::Empty) {
            Self::Empty => unreachable!(),
            Self::One([(_, v)]) => v,
            Self::Two([e1, e2]) => {
                let (kept, (_, v)) = if index == 0 { (e2, e1) } else { (e1, e2) };
                *self = Self::One([kept]);
                v
            }
            Self::Flexible(mut entries) => {
                let (_, v) = entries.remove(index);
                *self = Self::Flexible(entries);
                v
            }
        };
        Some(out)
    }

    /// Merge the other entries into this map: keys missing here are
    /// inserted, keys present in both are fused with `f`, and entries
    /// for which `f` returns `None` are removed.
    pub fn merge<'a>(
        &'a mut self,
        other: impl Iterator<Item = (&'a K, &'a V)>,
        f: impl Fn(&V, &V) -> Option<V>,
    ) where
        K: Clone,
        V: Clone,
    {
        for (key, other_value) in other {
            let fused = match self.get(key) {
                None => Some(other_value.clone()),
                Some(value) => f(value, other_value),
            };
            match fused {
                Some(value) => self.insert(key.clone(), value),
                None => {
                    self.remove(key);
                }
            }
        }
    }
}

impl<K, V> SmallMap<K, V> {
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn as_slice(&self) -> &[(K, V)] {
        match self {
            Self::Empty => &[],
            Self::One(e) => e,
            Self::Two(e) => e,
            Self::Flexible(e) => e,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [(K, V)] {
        match self {
            Self::Empty => &mut [],
            Self::One(e) => e,
            Self::Two(e) => e,
            Self::Flexible(e) => e,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.as_slice().iter().map(|(k, v)| (k, v))
    }

    /// Entries in insertion order, cloned.
    pub fn as_vec(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.as_slice().to_vec()
    }
}

// TESTS #######################################################################
