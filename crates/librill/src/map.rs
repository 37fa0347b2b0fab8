//! Ordered map with source location tracking for the rill compiler.
//!
//! `OrderedMap` wraps `IndexMap` to keep insertion order and remember the
//! source span each value was defined at, so duplicate definitions can be
//! reported with both positions.

use std::{hash::Hash, marker::PhantomData};

use indexmap::{Equivalent, IndexMap};

use crate::{compile::error::CompileError, nom_tools::{Span, ToRange}};

/// An insertion-ordered map whose values remember where they were defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedMap<'base, K: Hash + Eq, V: ValueTrait<'base>> {
    map: IndexMap<K, Value<'base, V>>,
}

impl<'base, K, V> Default for OrderedMap<'base, K, V>
where
    K: Hash + Eq,
    V: ValueTrait<'base>
{
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for values that can report the span they were defined at.
pub trait ValueTrait<'base> {
    /// Returns the source span where this value was defined
    fn get_span(&self) -> Span<'base>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Value<'base, V: ValueTrait<'base>> {
    value: V,
    position: std::ops::Range<usize>,
    marker: std::marker::PhantomData<&'base ()>,
}

impl<'base, K, V> OrderedMap<'base, K, V>
where
    K: Hash + Eq,
    V: ValueTrait<'base>
{
    /// Creates a new empty `OrderedMap`
    pub fn new() -> Self {
        Self {
            map: IndexMap::new(),
        }
    }

    /// Inserts a key-value pair without validation, returning the previous value if any
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let position = value.get_span().to_range();
        self.map.insert(key, Value { value, position, marker: PhantomData }).map(|item| item.value)
    }

    /// Inserts a key-value pair, rejecting duplicates.
    ///
    /// Returns a scope error carrying both the new and the existing
    /// definition position if the key already exists.
    pub fn validate_insert(&mut self, key: K, value: V) -> Result<(), CompileError> {
        let span = value.get_span();

        match self.map.insert(key, Value { value, position: span.to_range(), marker: PhantomData }) {
            Some(old) => Err(CompileError::already_defined(span.to_range(), old.position, span.state.file.clone())),
            None => Ok(())
        }
    }

    /// Gets a reference to the value corresponding to the key
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
        K: std::hash::Hash + Eq,
    {
        self.map.get(key).map(|item| &item.value)
    }

    /// Returns the position the key's value was defined at
    pub fn position_of<Q>(&self, key: &Q) -> Option<std::ops::Range<usize>>
    where
        Q: ?Sized + Hash + Equivalent<K>,
        K: std::hash::Hash + Eq,
    {
        self.map.get(key).map(|item| item.position.clone())
    }

    /// Returns true if the map contains a value for the specified key
    pub fn contains_key(&self, key: &K) -> bool
    where
        K: std::hash::Hash + Eq,
    {
        self.map.contains_key(key)
    }

    /// Returns an iterator over the keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &K> + use<'_, 'base, K, V> {
        self.map.keys()
    }

    /// Returns an iterator over the values in insertion order
    pub fn values(&self) -> impl Iterator<Item = &V> + use<'_, 'base, K, V> {
        self.map.values().map(|item| &item.value)
    }

    /// Returns an iterator over key-value pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + use<'_, 'base, K, V> {
        self.map.iter().map(|item| (item.0, &item.1.value))
    }

    /// Returns the number of elements in the map
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if the map contains no elements
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{file::SourceFile, nom_tools::State};

    #[derive(Debug, Clone, PartialEq)]
    struct Entry<'base> {
        span: Span<'base>,
    }

    impl<'base> ValueTrait<'base> for Entry<'base> {
        fn get_span(&self) -> Span<'base> {
            self.span.clone()
        }
    }

    fn entry(state: &State, text: &'static str, start: usize) -> Entry<'static> {
        Entry {
            span: Span {
                text,
                position: start..start + text.len(),
                state: state.clone(),
            },
        }
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let state = State::new(SourceFile::new(vec!["<memory>".into()], "a a".to_string()));
        let mut map: OrderedMap<&str, Entry> = OrderedMap::new();

        map.validate_insert("a", entry(&state, "a", 0)).unwrap();
        let result = map.validate_insert("a", entry(&state, "a", 2));
        assert!(result.is_err());
    }

    #[test]
    fn insertion_order_is_kept() {
        let state = State::new(SourceFile::new(vec!["<memory>".into()], "c b a".to_string()));
        let mut map: OrderedMap<&str, Entry> = OrderedMap::new();

        map.validate_insert("c", entry(&state, "c", 0)).unwrap();
        map.validate_insert("b", entry(&state, "b", 2)).unwrap();
        map.validate_insert("a", entry(&state, "a", 4)).unwrap();

        let keys = map.keys().copied().collect::<Vec<_>>();
        assert_eq!(keys, vec!["c", "b", "a"]);
    }
}
