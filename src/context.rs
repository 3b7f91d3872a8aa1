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

//! The process-wide context.
//!
//! Exactly one `Context` is created at startup and handed to everything that
//! needs the shared lock table or configuration. It is torn down explicitly
//! with `shutdown()`; lock handles still alive at that point become no-ops.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{info, warn};

use crate::fifo::stream::{create_pair, FifoReader, FifoWriter};
use crate::lock::{ObjectId, ObjectLock, ObjectLockTable, SessionId};
use crate::support::error::Error;
use crate::support::lineage::{Children, Membership};
use crate::support::log_prefix::LogPrefix;
use crate::support::system_config::SystemConfig;

pub struct Context {
    config: SystemConfig,
    locks: Mutex<Option<Arc<ObjectLockTable>>>,
    streams: Arc<Children<ActiveStream>>,
}

/// Registry entry for a stream session that has not yet finished.
#[derive(Debug)]
pub struct ActiveStream {
    pub object: ObjectId,
    pub session: SessionId,
    pub started: Instant,
    membership: Membership<ActiveStream>,
}

/// One streaming session over an object.
///
/// The object stays locked for the session until this is dropped. The reader
/// and writer can be taken out and moved to the producer and consumer
/// threads; they are independent of the lock's lifetime.
pub struct StreamSession {
    entry: Arc<ActiveStream>,
    lock: ObjectLock,
    reader: Option<FifoReader>,
    writer: Option<FifoWriter>,
    log_prefix: LogPrefix,
}

impl Context {
    pub fn new(config: SystemConfig) -> Arc<Self> {
        Arc::new(Context {
            config,
            locks: Mutex::new(Some(ObjectLockTable::new())),
            streams: Children::new(),
        })
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// The shared lock table, or `Error::Closed` after shutdown.
    pub fn lock_table(&self) -> Result<Arc<ObjectLockTable>, Error> {
        self.locks.lock().unwrap().clone().ok_or(Error::Closed)
    }

    /// Lock `object` for `session` and set up a FIFO pair to stream it
    /// through.
    ///
    /// Fails with `Error::NoAccess` if another session is already streaming
    /// the object.
    pub fn open_stream(
        &self,
        object: ObjectId,
        session: SessionId,
    ) -> Result<StreamSession, Error> {
        let log_prefix = LogPrefix::new("stream".to_owned());
        log_prefix.set_object(object);
        log_prefix.set_session(&session);

        let lock = match self
            .lock_table()?
            .lock_object_scoped(object, session.clone())
        {
            Ok(lock) => lock,
            Err(e) => {
                warn!("{} Unable to lock object: {}", log_prefix, e);
                return Err(e);
            }
        };

        let (reader, writer) = create_pair(
            self.config.fifo.capacity,
            self.config.fifo.timeout(),
        )?;
        let entry = self.streams.adopt(|membership| ActiveStream {
            object,
            session,
            started: Instant::now(),
            membership,
        });

        info!("{} Stream opened", log_prefix);
        Ok(StreamSession {
            entry,
            lock,
            reader: Some(reader),
            writer: Some(writer),
            log_prefix,
        })
    }

    /// Every stream session currently open, oldest first.
    pub fn active_streams(&self) -> Vec<Arc<ActiveStream>> {
        self.streams.live()
    }

    /// Release the shared state.
    ///
    /// New streams cannot be opened afterwards. Calling this more than once
    /// does nothing.
    pub fn shutdown(&self) {
        if self.locks.lock().unwrap().take().is_some() {
            let active = self.streams.len();
            if active > 0 {
                warn!("Shutting down with {} stream(s) still open", active);
            } else {
                info!("Shut down");
            }
        }
    }
}

impl ActiveStream {
    /// The registry id of this stream.
    pub fn id(&self) -> u64 {
        self.membership.id()
    }
}

impl StreamSession {
    pub fn object(&self) -> ObjectId {
        self.entry.object
    }

    pub fn session(&self) -> &SessionId {
        &self.entry.session
    }

    pub fn log_prefix(&self) -> &LogPrefix {
        &self.log_prefix
    }

    /// Take the reading end. Returns `None` if it was already taken.
    pub fn take_reader(&mut self) -> Option<FifoReader> {
        self.reader.take()
    }

    /// Take the writing end. Returns `None` if it was already taken.
    pub fn take_writer(&mut self) -> Option<FifoWriter> {
        self.writer.take()
    }

    /// End the session, releasing the object lock.
    pub fn close(mut self) -> Result<(), Error> {
        self.lock.unlock()
    }
}

impl fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("object", &self.entry.object)
            .field("session", &self.entry.session)
            .finish()
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        info!(
            "{} Stream closed after {:?}",
            self.log_prefix,
            self.entry.started.elapsed()
        );
    }
}
