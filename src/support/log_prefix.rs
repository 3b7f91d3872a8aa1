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

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex};

use crate::lock::{ObjectId, SessionId};

/// Tracks text that should be included in at the start of every log statement
/// about a stream session.
///
/// Clones of a `LogPrefix` share the same underlying data.
#[derive(Clone)]
pub struct LogPrefix {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Clone)]
struct Inner {
    component: String,
    object: Option<ObjectId>,
    session: Option<String>,
}

impl LogPrefix {
    pub fn new(component: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                component,
                object: None,
                session: None,
            })),
        }
    }

    pub fn deep_clone(&self) -> Self {
        let inner = self.inner.lock().unwrap();
        Self {
            inner: Arc::new(Mutex::new(Inner::clone(&inner))),
        }
    }

    pub fn set_object(&self, object: ObjectId) {
        self.inner.lock().unwrap().object = Some(object);
    }

    pub fn set_session(&self, session: &SessionId) {
        self.inner.lock().unwrap().session =
            Some(sanitise(session.as_str().to_owned()));
    }
}

impl fmt::Display for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        write!(f, "{}", inner.component)?;
        if inner.object.is_some() || inner.session.is_some() {
            write!(f, "[")?;
            let mut first = true;
            if let Some(object) = inner.object {
                write!(f, "object={object}")?;
                first = false;
            }

            if let Some(ref session) = inner.session {
                if !mem::take(&mut first) {
                    write!(f, " ")?;
                }
                write!(f, "session={session}")?;
            }
            write!(f, "]")?;
        }

        Ok(())
    }
}

fn sanitise(mut s: String) -> String {
    s.retain(|c| !c.is_control());
    if let Some((truncate_len, _)) = s.char_indices().nth(64) {
        s.truncate(truncate_len);
    }

    s
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formatting() {
        let prefix = LogPrefix::new("stream".to_owned());
        assert_eq!("stream", prefix.to_string());

        prefix.set_session(&SessionId::from("abc\n"));
        assert_eq!("stream[session=abc]", prefix.to_string());

        let detached = prefix.deep_clone();
        prefix.set_object(42);
        assert_eq!("stream[object=42 session=abc]", prefix.to_string());
        assert_eq!("stream[session=abc]", detached.to_string());
    }

    #[test]
    fn long_sessions_are_truncated() {
        let prefix = LogPrefix::new("x".to_owned());
        prefix.set_session(&SessionId::from("s".repeat(100)));
        assert_eq!(
            format!("x[session={}]", "s".repeat(64)),
            prefix.to_string()
        );
    }
}
