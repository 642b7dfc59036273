//! Arena with stable integer keys.
//!
//! Keys are handed out to the multiplexer (per-socket slot, per-transfer
//! private data) and to the poller (event payload), so a key must stay valid
//! until its entry is removed and may be reused afterwards.

pub(crate) struct Slab<T> {
    items: Vec<Option<T>>,
    free: Vec<usize>,
    len: usize,
}

impl<T> Slab<T> {
    pub(crate) fn new(size: usize) -> Self {
        let items = (0..size).map(|_| None).collect();
        let free = (0..size).rev().collect();

        Self {
            items,
            free,
            len: 0,
        }
    }

    pub(crate) fn insert(&mut self, item: T) -> usize {
        let index = if let Some(i) = self.free.pop() {
            i
        } else {
            let len = self.items.len();
            let new_len = if len == 0 { 1 } else { 2 * len };

            self.items.extend((len..new_len).map(|_| None));
            self.free.extend(((len + 1)..new_len).rev());

            len
        };

        self.items[index] = Some(item);
        self.len += 1;

        index
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<T> {
        let item = self.items.get_mut(index)?.take()?;

        self.free.push(index);
        self.len -= 1;

        Some(item)
    }

    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)?.as_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|item| (i, item)))
    }

    /// Removes every entry, yielding them in key order.
    pub(crate) fn drain(&mut self) -> Vec<(usize, T)> {
        let mut drained = Vec::with_capacity(self.len);

        for (i, slot) in self.items.iter_mut().enumerate() {
            if let Some(item) = slot.take() {
                drained.push((i, item));
                self.free.push(i);
            }
        }

        self.len = 0;
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::Slab;

    #[test]
    fn insert_and_remove_reuses_keys() {
        let mut slab = Slab::new(2);

        let a = slab.insert("a");
        let b = slab.insert("b");
        assert_ne!(a, b);
        assert_eq!(slab.len(), 2);

        assert_eq!(slab.remove(a), Some("a"));
        assert_eq!(slab.remove(a), None);

        let c = slab.insert("c");
        assert_eq!(c, a);
        assert_eq!(slab.get(c), Some(&"c"));
        assert_eq!(slab.get(b), Some(&"b"));
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut slab = Slab::new(0);
        let keys: Vec<usize> = (0..10).map(|i| slab.insert(i)).collect();

        assert_eq!(slab.len(), 10);
        for (value, key) in keys.iter().enumerate() {
            assert_eq!(slab.get(*key), Some(&value));
        }
    }

    #[test]
    fn drain_empties_and_frees_everything() {
        let mut slab = Slab::new(4);
        slab.insert(1);
        let middle = slab.insert(2);
        slab.insert(3);
        slab.remove(middle);

        let drained: Vec<i32> = slab.drain().into_iter().map(|(_, v)| v).collect();
        assert_eq!(drained, vec![1, 3]);
        assert!(slab.is_empty());
        assert_eq!(slab.iter().count(), 0);

        slab.insert(4);
        assert_eq!(slab.len(), 1);
    }

    #[test]
    fn lookups_out_of_range_are_none() {
        let mut slab: Slab<u8> = Slab::new(1);
        assert!(slab.get(7).is_none());
        assert!(slab.get_mut(7).is_none());
        assert!(slab.remove(7).is_none());
    }
}
