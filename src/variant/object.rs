//! Capability traits for reference payloads.
//!
//! A variant holding any list-like payload is indexable through
//! [`Collection`], and any map-like payload through [`Dictionary`]. The
//! built-in [`VariantList`]/[`VariantMap`] payloads implement them
//! directly; user reference types plugged in as `Variant::Object`
//! advertise their capabilities through [`VariantObject`].

use std::fmt;
use std::sync::{Condvar, Mutex, PoisonError};

use crate::map::OrdMap;
use crate::sync::SharedWeak;
use crate::variant::{Json, Variant, VariantList, VariantMap};

/// Array-like access: a length and indexed elements.
pub trait Collection: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Null` when the index is out of range.
    fn element(&self, index: usize) -> Variant;

    /// `false` when the index is out of range.
    fn set_element(&self, index: usize, value: Variant) -> bool;

    /// Appends; `false` when the collection rejects growth.
    fn add_element(&self, value: Variant) -> bool;
}

/// Map-like access: keyed items plus entry enumeration for the
/// serializers.
pub trait Dictionary: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Null` when the key is absent.
    fn item(&self, key: &str) -> Variant;

    fn put_item(&self, key: &str, value: Variant) -> bool;

    /// `false` when the key was absent.
    fn remove_item(&self, key: &str) -> bool;

    /// A snapshot of all entries, in the dictionary's own order.
    fn entries(&self) -> Vec<(String, Variant)>;
}

/// A user reference type held as `Variant::Object`.
///
/// The default implementation advertises no capabilities; override the
/// accessors for payloads that are list-like, map-like, or serializable.
pub trait VariantObject: Send + Sync + 'static {
    fn as_collection(&self) -> Option<&dyn Collection> {
        None
    }

    fn as_dictionary(&self) -> Option<&dyn Dictionary> {
        None
    }

    /// The JSON rendition used by both codecs; `None` opts out, making
    /// the object serialize as `null`.
    fn to_json(&self) -> Option<Json> {
        None
    }
}

impl Collection for VariantList {
    fn len(&self) -> usize {
        self.with(|items| items.len())
    }

    fn element(&self, index: usize) -> Variant {
        self.with(|items| items.get(index).cloned())
            .unwrap_or(Variant::Null)
    }

    fn set_element(&self, index: usize, value: Variant) -> bool {
        self.with(|items| match items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        })
    }

    fn add_element(&self, value: Variant) -> bool {
        self.with(|items| items.push(value));
        true
    }
}

impl Dictionary for VariantMap {
    fn len(&self) -> usize {
        self.with(|map| map.len())
    }

    fn item(&self, key: &str) -> Variant {
        self.with(|map| map.get(key).cloned())
            .unwrap_or(Variant::Null)
    }

    fn put_item(&self, key: &str, value: Variant) -> bool {
        self.with(|map| {
            map.put(key.to_string(), value);
        });
        true
    }

    fn remove_item(&self, key: &str) -> bool {
        self.with(|map| map.remove(key).is_some())
    }

    fn entries(&self) -> Vec<(String, Variant)> {
        self.with(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

/// One-shot resolvable value cell; the first `resolve` wins and wakes
/// every waiter.
pub struct Promise {
    cell: Mutex<Option<Variant>>,
    ready: Condvar,
}

impl Promise {
    pub fn new() -> Self {
        Promise {
            cell: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Returns whether this call supplied the value.
    pub fn resolve(&self, value: Variant) -> bool {
        let mut cell = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
        if cell.is_some() {
            return false;
        }
        *cell = Some(value);
        self.ready.notify_all();
        true
    }

    /// The resolved value, without blocking.
    pub fn peek(&self) -> Option<Variant> {
        self.cell
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Blocks until resolved.
    pub fn wait(&self) -> Variant {
        let mut cell = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(value) = cell.as_ref() {
                return value.clone();
            }
            cell = self
                .ready
                .wait(cell)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Default for Promise {
    fn default() -> Self {
        Promise::new()
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.peek().is_some() {
            f.write_str("<promise (resolved)>")
        } else {
            f.write_str("<promise>")
        }
    }
}

/// Weak handle to a list or map payload.
#[derive(Clone)]
pub enum WeakRef {
    List(SharedWeak<Vec<Variant>>),
    Map(SharedWeak<OrdMap<String, Variant>>),
}

impl WeakRef {
    /// A strong variant while the payload is alive.
    pub fn upgrade(&self) -> Option<Variant> {
        match self {
            WeakRef::List(w) => w.upgrade().map(Variant::List),
            WeakRef::Map(w) => w.upgrade().map(Variant::Map),
        }
    }
}

impl PartialEq for WeakRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (WeakRef::List(a), WeakRef::List(b)) => a.ptr_eq(b),
            (WeakRef::Map(a), WeakRef::Map(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for WeakRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeakRef::List(_) => f.write_str("<weak list>"),
            WeakRef::Map(_) => f.write_str("<weak map>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn promise_resolves_once() {
        let p = Promise::new();
        assert_eq!(p.peek(), None);
        assert!(p.resolve(Variant::from(1)));
        assert!(!p.resolve(Variant::from(2)));
        assert_eq!(p.peek(), Some(Variant::from(1)));
        assert_eq!(p.wait(), Variant::from(1));
    }

    #[test]
    fn promise_wakes_waiters() {
        let p = Arc::new(Promise::new());
        let waiter = {
            let p = Arc::clone(&p);
            thread::spawn(move || p.wait())
        };
        p.resolve(Variant::from("done"));
        assert_eq!(waiter.join().unwrap(), Variant::from("done"));
    }

    /// A fixed-size user object exposing the collection capability.
    struct Pair(Variant, Variant);

    impl Collection for Pair {
        fn len(&self) -> usize {
            2
        }

        fn element(&self, index: usize) -> Variant {
            match index {
                0 => self.0.clone(),
                1 => self.1.clone(),
                _ => Variant::Null,
            }
        }

        fn set_element(&self, _index: usize, _value: Variant) -> bool {
            false
        }

        fn add_element(&self, _value: Variant) -> bool {
            false
        }
    }

    impl VariantObject for Pair {
        fn as_collection(&self) -> Option<&dyn Collection> {
            Some(self)
        }
    }

    #[test]
    fn user_object_is_indexable() {
        let v = Variant::object(Pair(Variant::from(1), Variant::from(2)));
        assert_eq!(v.element_count(), 2);
        assert_eq!(v.element(1).get_i32(0), 2);
        assert!(v.element(2).is_null());
        assert!(!v.add_element(Variant::Null));
        assert!(v.item("x").is_null());
    }
}
