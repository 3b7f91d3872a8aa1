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

//! Advisory single-owner locks on objects.
//!
//! A lock associates an object id with the session that holds it. Nothing
//! here ever waits: a conflicting request is rejected immediately with
//! `Error::NoAccess` and any retry policy is up to the caller.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use log::{debug, warn};

use crate::support::error::Error;

pub type ObjectId = u32;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        SessionId(s.to_owned())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        SessionId(s)
    }
}

impl From<u64> for SessionId {
    fn from(id: u64) -> Self {
        SessionId(format!("{:016x}", id))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
pub struct ObjectLockTable {
    locks: RwLock<HashMap<ObjectId, SessionId>>,
}

impl ObjectLockTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Lock `object` on behalf of `session`.
    ///
    /// Locking an object the session already holds succeeds without creating
    /// a second entry. If another session holds it, fails with
    /// `Error::NoAccess` and leaves that lock alone.
    pub fn lock_object(
        &self,
        object: ObjectId,
        session: &SessionId,
    ) -> Result<(), Error> {
        let mut locks = self.locks.write().unwrap();
        match locks.get(&object) {
            Some(owner) if owner != session => {
                debug!(
                    "object {} is locked by {}, rejecting {}",
                    object, owner, session
                );
                Err(Error::NoAccess)
            }
            Some(_) => Ok(()),
            None => {
                locks.insert(object, session.clone());
                Ok(())
            }
        }
    }

    /// Like `lock_object`, but return a handle that releases the lock when
    /// dropped.
    ///
    /// Note that if the session already held the lock, dropping the handle
    /// still releases it.
    pub fn lock_object_scoped(
        self: &Arc<Self>,
        object: ObjectId,
        session: SessionId,
    ) -> Result<ObjectLock, Error> {
        self.lock_object(object, &session)?;
        Ok(ObjectLock {
            table: Arc::downgrade(self),
            object,
            session,
        })
    }

    /// Release the lock `session` holds on `object`.
    ///
    /// Fails with `Error::NotFound` if the object is not locked at all and
    /// `Error::NoAccess` if it is locked by another session.
    pub fn unlock_object(
        &self,
        object: ObjectId,
        session: &SessionId,
    ) -> Result<(), Error> {
        let mut locks = self.locks.write().unwrap();
        match locks.get(&object) {
            None => Err(Error::NotFound),
            Some(owner) if owner != session => Err(Error::NoAccess),
            Some(_) => {
                locks.remove(&object);
                Ok(())
            }
        }
    }

    /// Returns the session holding `object`, if any.
    pub fn is_locked(&self, object: ObjectId) -> Option<SessionId> {
        self.locks.read().unwrap().get(&object).cloned()
    }

    /// The number of objects currently locked.
    pub fn len(&self) -> usize {
        self.locks.read().unwrap().len()
    }
}

/// A lock on an object that is released when dropped.
///
/// The handle only holds a weak reference to its table. If the table has
/// already been torn down, releasing the lock does nothing.
#[derive(Debug)]
pub struct ObjectLock {
    table: Weak<ObjectLockTable>,
    object: ObjectId,
    session: SessionId,
}

impl ObjectLock {
    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Release the lock now.
    ///
    /// Calling this again after it succeeded does nothing. On failure, the
    /// handle stays armed and the release is retried on drop.
    pub fn unlock(&mut self) -> Result<(), Error> {
        if let Some(table) = self.table.upgrade() {
            table.unlock_object(self.object, &self.session)?;
        }

        self.table = Weak::new();
        Ok(())
    }
}

impl Drop for ObjectLock {
    fn drop(&mut self) {
        match self.unlock() {
            Ok(()) | Err(Error::NotFound) => (),
            Err(e) => warn!(
                "failed to release lock on object {} for {}: {}",
                self.object, self.session, e
            ),
        }
    }
}
