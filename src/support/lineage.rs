//-
// Copyright (c) 2026, The Mapistream Authors
//
// This file is part of Mapistream.
//
// Mapistream is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mapistream is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Mapistream. If not, see <http://www.gnu.org/licenses/>.

//! Registries of child objects owned elsewhere.
//!
//! A `Children` registry only holds weak references. Each child carries a
//! `Membership`, and when the child is dropped the membership removes the
//! entry under the registry's lock. Since the registry's weak reference can
//! no longer be upgraded once the child has started dropping, lookups never
//! observe a half-destroyed child.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

pub struct Children<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    next_id: u64,
    members: BTreeMap<u64, Weak<T>>,
}

/// A child's link back to the registry it belongs to.
pub struct Membership<T> {
    parent: Weak<Children<T>>,
    id: u64,
}

impl<T> Children<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Children {
            inner: Mutex::new(Inner {
                next_id: 0,
                members: BTreeMap::new(),
            }),
        })
    }

    /// Create a new child with `make` and register it.
    ///
    /// `make` receives the membership the child must keep for as long as it
    /// lives.
    pub fn adopt(
        self: &Arc<Self>,
        make: impl FnOnce(Membership<T>) -> T,
    ) -> Arc<T> {
        let id = {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.next_id;
            inner.next_id += 1;
            id
        };

        let child = Arc::new(make(Membership {
            parent: Arc::downgrade(self),
            id,
        }));
        self.inner
            .lock()
            .unwrap()
            .members
            .insert(id, Arc::downgrade(&child));
        child
    }

    /// Returns strong references to every child still alive, oldest first.
    pub fn live(&self) -> Vec<Arc<T>> {
        self.inner
            .lock()
            .unwrap()
            .members
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub fn contains(&self, child: &Arc<T>) -> bool {
        self.inner
            .lock()
            .unwrap()
            .members
            .values()
            .any(|w| w.as_ptr() == Arc::as_ptr(child))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().members.len()
    }

    pub fn is_empty(&self) -> bool {
        0 == self.len()
    }
}

impl<T> Membership<T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The registry, if it still exists.
    pub fn parent(&self) -> Option<Arc<Children<T>>> {
        self.parent.upgrade()
    }
}

impl<T> Drop for Membership<T> {
    fn drop(&mut self) {
        if let Some(parent) = self.parent.upgrade() {
            parent.inner.lock().unwrap().members.remove(&self.id);
        }
    }
}

impl<T> fmt::Debug for Membership<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Membership").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Node {
        name: &'static str,
        membership: Membership<Node>,
    }

    fn node(
        parent: &Arc<Children<Node>>,
        name: &'static str,
    ) -> Arc<Node> {
        parent.adopt(|membership| Node { name, membership })
    }

    #[test]
    fn children_detach_on_drop() {
        let parent = Children::new();
        let a = node(&parent, "a");
        let b = node(&parent, "b");
        assert_eq!(2, parent.len());
        assert!(parent.contains(&a));
        assert_eq!(0, a.membership.id());
        assert_eq!(1, b.membership.id());

        drop(a);
        assert_eq!(1, parent.len());
        let live = parent.live();
        assert_eq!(1, live.len());
        assert_eq!("b", live[0].name);

        drop(live);
        drop(b);
        assert!(parent.is_empty());
    }

    #[test]
    fn shared_child_stays_until_last_reference() {
        let parent = Children::new();
        let a = node(&parent, "a");
        let a2 = Arc::clone(&a);
        drop(a);
        assert_eq!(1, parent.len());
        drop(a2);
        assert_eq!(0, parent.len());
    }

    #[test]
    fn child_outlives_parent() {
        let parent = Children::new();
        let a = node(&parent, "a");
        assert!(a.membership.parent().is_some());
        drop(parent);
        assert!(a.membership.parent().is_none());
        drop(a);
    }

    #[test]
    fn foreign_child_is_not_contained() {
        let p1 = Children::new();
        let p2 = Children::new();
        let a = node(&p1, "a");
        assert!(p1.contains(&a));
        assert!(!p2.contains(&a));
    }
}
