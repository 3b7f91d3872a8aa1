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

//! The stream contract and the FIFO reader/writer pair.
//!
//! `Stream` declares the whole surface a MAPI-style stream can offer. Every
//! operation defaults to `Error::NoSupport`; implementations override what
//! they actually support and advertise it through `capabilities()`, so
//! callers can ask before they try.
//!
//! `create_pair()` works much like `pipe()`: the reader blocks until the
//! writer has sent enough data, and once every clone of the writer is gone
//! the reader gets end-of-stream after draining what is left. Conversely,
//! once every clone of the reader is gone, writes fail.

use std::io::{self, SeekFrom};
use std::sync::Arc;
use std::time::Duration;

use bitflags::bitflags;

use super::buffer::{CloseFlags, FifoBuffer};
use crate::support::error::Error;

/// How long a FIFO stream handle waits for its peer by default.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

bitflags! {
    pub struct Capabilities: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const SEEK = 1 << 2;
        const SET_SIZE = 1 << 3;
        const COMMIT = 1 << 4;
        const REVERT = 1 << 5;
        const LOCK_REGION = 1 << 6;
        const STAT = 1 << 7;
        const CLONE = 1 << 8;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStat {
    pub size: u64,
}

pub trait Stream: Send {
    fn capabilities(&self) -> Capabilities;

    fn read(&mut self, _dst: &mut [u8]) -> Result<usize, Error> {
        Err(Error::NoSupport)
    }

    fn write(&mut self, _src: &[u8]) -> Result<usize, Error> {
        Err(Error::NoSupport)
    }

    fn seek(&mut self, _pos: SeekFrom) -> Result<u64, Error> {
        Err(Error::NoSupport)
    }

    fn set_size(&mut self, _size: u64) -> Result<(), Error> {
        Err(Error::NoSupport)
    }

    fn commit(&mut self) -> Result<(), Error> {
        Err(Error::NoSupport)
    }

    fn revert(&mut self) -> Result<(), Error> {
        Err(Error::NoSupport)
    }

    fn lock_region(&mut self, _offset: u64, _len: u64) -> Result<(), Error> {
        Err(Error::NoSupport)
    }

    fn unlock_region(&mut self, _offset: u64, _len: u64) -> Result<(), Error> {
        Err(Error::NoSupport)
    }

    fn stat(&self) -> Result<StreamStat, Error> {
        Err(Error::NoSupport)
    }

    /// Create an independent stream over the same data.
    fn try_clone(&self) -> Result<Box<dyn Stream>, Error> {
        Err(Error::NoSupport)
    }
}

impl<S: Stream + ?Sized> Stream for Box<S> {
    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn read(&mut self, dst: &mut [u8]) -> Result<usize, Error> {
        (**self).read(dst)
    }

    fn write(&mut self, src: &[u8]) -> Result<usize, Error> {
        (**self).write(src)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, Error> {
        (**self).seek(pos)
    }

    fn set_size(&mut self, size: u64) -> Result<(), Error> {
        (**self).set_size(size)
    }

    fn commit(&mut self) -> Result<(), Error> {
        (**self).commit()
    }

    fn revert(&mut self) -> Result<(), Error> {
        (**self).revert()
    }

    fn lock_region(&mut self, offset: u64, len: u64) -> Result<(), Error> {
        (**self).lock_region(offset, len)
    }

    fn unlock_region(&mut self, offset: u64, len: u64) -> Result<(), Error> {
        (**self).unlock_region(offset, len)
    }

    fn stat(&self) -> Result<StreamStat, Error> {
        (**self).stat()
    }

    fn try_clone(&self) -> Result<Box<dyn Stream>, Error> {
        (**self).try_clone()
    }
}

/// Closes the read side of the buffer once the last reader clone is dropped.
#[derive(Debug)]
struct ReadEnd(Arc<FifoBuffer>);

impl Drop for ReadEnd {
    fn drop(&mut self) {
        self.0.close(CloseFlags::READ);
    }
}

/// Closes the write side of the buffer once the last writer clone is dropped.
#[derive(Debug)]
struct WriteEnd(Arc<FifoBuffer>);

impl Drop for WriteEnd {
    fn drop(&mut self) {
        self.0.close(CloseFlags::WRITE);
    }
}

/// The reading half of a FIFO stream pair.
///
/// Clones share the same read side, which is closed when the last clone is
/// dropped.
#[derive(Clone, Debug)]
pub struct FifoReader {
    end: Arc<ReadEnd>,
    timeout: Option<Duration>,
}

/// The writing half of a FIFO stream pair.
///
/// Clones share the same write side, which is closed when the last clone is
/// dropped.
#[derive(Clone, Debug)]
pub struct FifoWriter {
    end: Arc<WriteEnd>,
    timeout: Option<Duration>,
}

/// Create a connected reader/writer pair over a fresh buffer of the given
/// capacity.
///
/// `timeout` bounds how long either handle blocks waiting for its peer;
/// `None` waits forever. A zero `capacity` is `Error::InvalidParameter`.
pub fn create_pair(
    capacity: usize,
    timeout: Option<Duration>,
) -> Result<(FifoReader, FifoWriter), Error> {
    let fifo = Arc::new(FifoBuffer::try_new(capacity)?);
    Ok((
        FifoReader {
            end: Arc::new(ReadEnd(Arc::clone(&fifo))),
            timeout,
        },
        FifoWriter {
            end: Arc::new(WriteEnd(fifo)),
            timeout,
        },
    ))
}

impl FifoReader {
    /// The buffer shared with the paired writer.
    pub fn buffer(&self) -> &Arc<FifoBuffer> {
        &self.end.0
    }
}

impl FifoWriter {
    /// The buffer shared with the paired reader.
    pub fn buffer(&self) -> &Arc<FifoBuffer> {
        &self.end.0
    }
}

impl Stream for FifoReader {
    fn capabilities(&self) -> Capabilities {
        Capabilities::READ
    }

    fn read(&mut self, dst: &mut [u8]) -> Result<usize, Error> {
        self.end.0.read(dst, self.timeout)
    }
}

impl Stream for FifoWriter {
    fn capabilities(&self) -> Capabilities {
        Capabilities::WRITE | Capabilities::COMMIT
    }

    fn write(&mut self, src: &[u8]) -> Result<usize, Error> {
        self.end.0.write(src, self.timeout)
    }

    /// Wait until the reader has consumed everything written so far.
    fn commit(&mut self) -> Result<(), Error> {
        self.end.0.flush(self.timeout)
    }
}

/// Bytes moved before a timeout are reported as a short transfer.
fn partial_transfer(result: Result<usize, Error>) -> io::Result<usize> {
    match result {
        Err(Error::Timeout(n)) if n > 0 => Ok(n),
        result => Ok(result?),
    }
}

impl io::Read for FifoReader {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        partial_transfer(Stream::read(self, dst))
    }
}

impl io::Write for FifoWriter {
    fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        partial_transfer(Stream::write(self, src))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.commit()?)
    }
}
