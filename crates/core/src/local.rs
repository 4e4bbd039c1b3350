//! Local mirrors of remote record lists.
//!
//! A screen loads a slice of remote records once, then patches its local copy
//! with the authoritative record each successful mutation returns. Nothing
//! here talks to the data store; callers only patch after the remote call
//! succeeded, so a failed call leaves the list untouched.

/// A record with a stable identifier.
pub trait Record {
    /// Identifier type.
    type Id: Copy + Eq;

    /// The record's identifier.
    fn id(&self) -> Self::Id;
}

/// An ordered list of records, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalList<T> {
    items: Vec<T>,
}

impl<T> Default for LocalList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Record> LocalList<T> {
    /// Wrap records as loaded from the store.
    #[must_use]
    pub const fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    /// All records in display order.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up a record by ID.
    #[must_use]
    pub fn get(&self, id: T::Id) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Insert a freshly created record at the top.
    pub fn prepend(&mut self, item: T) {
        self.items.insert(0, item);
    }

    /// Replace a record wholesale. Returns `false` if no record had that ID.
    pub fn replace(&mut self, item: T) -> bool {
        match self.items.iter_mut().find(|existing| existing.id() == item.id()) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }

    /// Remove a record by ID.
    pub fn remove(&mut self, id: T::Id) -> Option<T> {
        let index = self.items.iter().position(|item| item.id() == id)?;
        Some(self.items.remove(index))
    }

    /// Remove every record matching `predicate`, returning the removed ones.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<T>
    where
        F: FnMut(&T) -> bool,
    {
        let (removed, kept): (Vec<T>, Vec<T>) =
            std::mem::take(&mut self.items).into_iter().partition(|item| predicate(item));
        self.items = kept;
        removed
    }

    /// Iterate over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<'a, T: Record> IntoIterator for &'a LocalList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item {
        id: u32,
        label: &'static str,
    }

    impl Record for Item {
        type Id = u32;

        fn id(&self) -> u32 {
            self.id
        }
    }

    fn list() -> LocalList<Item> {
        LocalList::new(vec![
            Item { id: 1, label: "a" },
            Item { id: 2, label: "b" },
        ])
    }

    #[test]
    fn test_prepend_puts_newest_first() {
        let mut list = list();
        list.prepend(Item { id: 3, label: "c" });
        assert_eq!(list.items().first().map(|i| i.id), Some(3));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_replace_existing_and_missing() {
        let mut list = list();
        assert!(list.replace(Item { id: 2, label: "B" }));
        assert_eq!(list.get(2).map(|i| i.label), Some("B"));
        assert!(!list.replace(Item { id: 9, label: "x" }));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_remove_and_remove_where() {
        let mut list = list();
        assert_eq!(list.remove(1).map(|i| i.label), Some("a"));
        assert!(list.remove(1).is_none());

        list.prepend(Item { id: 5, label: "b" });
        let removed = list.remove_where(|i| i.label == "b");
        assert_eq!(removed.len(), 2);
        assert!(list.is_empty());
    }
}
