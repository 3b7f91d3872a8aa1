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

//! Typed (de)serialization of fixed-width integers over a byte transport.
//!
//! Elements are 1, 2, 4 or 8 bytes wide. Wider elements travel in network
//! byte order; single bytes pass through untouched, which is how opaque
//! payloads are moved in bulk.
//!
//! There are two backends sharing the `Serializer` contract:
//!
//! - `StreamSerializer` works over any `Stream` and can go both ways.
//!
//! - `FifoSerializer` works directly on a `FifoBuffer` and is fixed at
//!   construction to either produce or consume. Dropping it closes its side
//!   of the buffer so that the peer finishes deterministically.
//!
//! The serializer has no framing of its own. A short read fails the
//! operation with `Error::CallFailed` and it is up to the caller to decide
//! whether the stream can still be used.

use std::sync::Arc;
use std::time::Duration;

use byteorder::{ByteOrder, NativeEndian};

use super::buffer::{CloseFlags, FifoBuffer};
use super::stream::{Stream, DEFAULT_TIMEOUT};
use crate::support::byte_order::{check_element_size, to_host, to_network};
use crate::support::error::Error;

const SKIP_BLOCK: usize = 4096;
const FLUSH_BLOCK: usize = 16384;

/// Byte counters kept by every serializer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SerializerStat {
    pub read: u64,
    pub written: u64,
}

pub trait Serializer {
    /// Write `data`, which holds elements of `element_size` bytes each in
    /// host byte order.
    ///
    /// The write counter advances by `data.len()` even if the transport
    /// fails part way through.
    fn write(&mut self, data: &[u8], element_size: usize) -> Result<(), Error>;

    /// Fill `data` with elements of `element_size` bytes each, converted to
    /// host byte order.
    fn read(&mut self, data: &mut [u8], element_size: usize)
        -> Result<(), Error>;

    /// Discard `element_size * count` bytes.
    fn skip(&mut self, element_size: usize, count: usize) -> Result<(), Error>;

    /// Bring both ends back in step after a record boundary.
    fn flush(&mut self) -> Result<(), Error>;

    fn stat(&self) -> SerializerStat;
}

/// Typed convenience methods over any `Serializer`.
pub trait SerializerExt: Serializer {
    fn write_u8(&mut self, v: u8) -> Result<(), Error> {
        self.write(&[v], 1)
    }

    fn write_u16(&mut self, v: u16) -> Result<(), Error> {
        self.write(&v.to_ne_bytes(), 2)
    }

    fn write_u32(&mut self, v: u32) -> Result<(), Error> {
        self.write(&v.to_ne_bytes(), 4)
    }

    fn write_u64(&mut self, v: u64) -> Result<(), Error> {
        self.write(&v.to_ne_bytes(), 8)
    }

    fn write_i32(&mut self, v: i32) -> Result<(), Error> {
        self.write_u32(v as u32)
    }

    fn write_i64(&mut self, v: i64) -> Result<(), Error> {
        self.write_u64(v as u64)
    }

    fn write_bytes(&mut self, v: &[u8]) -> Result<(), Error> {
        self.write(v, 1)
    }

    fn write_u16s(&mut self, v: &[u16]) -> Result<(), Error> {
        let mut buf = vec![0u8; v.len() * 2];
        NativeEndian::write_u16_into(v, &mut buf);
        self.write(&buf, 2)
    }

    fn write_u32s(&mut self, v: &[u32]) -> Result<(), Error> {
        let mut buf = vec![0u8; v.len() * 4];
        NativeEndian::write_u32_into(v, &mut buf);
        self.write(&buf, 4)
    }

    fn write_u64s(&mut self, v: &[u64]) -> Result<(), Error> {
        let mut buf = vec![0u8; v.len() * 8];
        NativeEndian::write_u64_into(v, &mut buf);
        self.write(&buf, 8)
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        self.read(&mut buf, 1)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self) -> Result<u16, Error> {
        let mut buf = [0u8; 2];
        self.read(&mut buf, 2)?;
        Ok(u16::from_ne_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        let mut buf = [0u8; 4];
        self.read(&mut buf, 4)?;
        Ok(u32::from_ne_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64, Error> {
        let mut buf = [0u8; 8];
        self.read(&mut buf, 8)?;
        Ok(u64::from_ne_bytes(buf))
    }

    fn read_i32(&mut self) -> Result<i32, Error> {
        self.read_u32().map(|v| v as i32)
    }

    fn read_i64(&mut self) -> Result<i64, Error> {
        self.read_u64().map(|v| v as i64)
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; len];
        self.read(&mut buf, 1)?;
        Ok(buf)
    }

    fn read_u16s(&mut self, dst: &mut [u16]) -> Result<(), Error> {
        let mut buf = vec![0u8; dst.len() * 2];
        self.read(&mut buf, 2)?;
        NativeEndian::read_u16_into(&buf, dst);
        Ok(())
    }

    fn read_u32s(&mut self, dst: &mut [u32]) -> Result<(), Error> {
        let mut buf = vec![0u8; dst.len() * 4];
        self.read(&mut buf, 4)?;
        NativeEndian::read_u32_into(&buf, dst);
        Ok(())
    }

    fn read_u64s(&mut self, dst: &mut [u64]) -> Result<(), Error> {
        let mut buf = vec![0u8; dst.len() * 8];
        self.read(&mut buf, 8)?;
        NativeEndian::read_u64_into(&buf, dst);
        Ok(())
    }
}

impl<S: Serializer + ?Sized> SerializerExt for S {}

/// Writes each element of `data` separately after converting it to network
/// byte order, handing each one to `sink`.
fn for_each_network_element(
    data: &[u8],
    element_size: usize,
    mut sink: impl FnMut(&[u8]) -> Result<(), Error>,
) -> Result<(), Error> {
    if 1 == element_size {
        return sink(data);
    }

    let mut tmp = [0u8; 8];
    let tmp = &mut tmp[..element_size];
    for element in data.chunks_exact(element_size) {
        tmp.copy_from_slice(element);
        to_network(tmp, element_size);
        sink(tmp)?;
    }

    Ok(())
}

/// A serializer over an arbitrary `Stream`.
#[derive(Debug)]
pub struct StreamSerializer<S> {
    stream: S,
    stat: SerializerStat,
}

impl<S: Stream> StreamSerializer<S> {
    pub fn new(stream: S) -> Self {
        StreamSerializer {
            stream,
            stat: SerializerStat::default(),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

fn write_all(stream: &mut impl Stream, mut src: &[u8]) -> Result<(), Error> {
    while !src.is_empty() {
        match stream.write(src)? {
            0 => return Err(Error::CallFailed),
            n => src = &src[n..],
        }
    }

    Ok(())
}

impl<S: Stream> Serializer for StreamSerializer<S> {
    fn write(&mut self, data: &[u8], element_size: usize) -> Result<(), Error> {
        check_element_size(element_size, data.len())?;

        let stream = &mut self.stream;
        let result = for_each_network_element(data, element_size, |element| {
            write_all(&mut *stream, element)
        });

        self.stat.written += data.len() as u64;
        result
    }

    fn read(
        &mut self,
        data: &mut [u8],
        element_size: usize,
    ) -> Result<(), Error> {
        check_element_size(element_size, data.len())?;

        let nread = self.stream.read(data)?;
        self.stat.read += nread as u64;
        if nread != data.len() {
            return Err(Error::CallFailed);
        }

        to_host(data, element_size);
        Ok(())
    }

    fn skip(&mut self, element_size: usize, count: usize) -> Result<(), Error> {
        let total = element_size
            .checked_mul(count)
            .ok_or(Error::InvalidParameter)?;
        let mut scratch = [0u8; SKIP_BLOCK];
        let mut skipped = 0;

        while skipped < total {
            let want = SKIP_BLOCK.min(total - skipped);
            let nread = self.stream.read(&mut scratch[..want])?;
            if 0 == nread {
                return Err(Error::CallFailed);
            }

            skipped += nread;
            self.stat.read += nread as u64;
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        let mut buf = vec![0u8; FLUSH_BLOCK];
        loop {
            let nread = self.stream.read(&mut buf)?;
            self.stat.read += nread as u64;
            if nread < buf.len() {
                return Ok(());
            }
        }
    }

    fn stat(&self) -> SerializerStat {
        self.stat
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Only `write` is allowed.
    Serialize,
    /// Only `read` is allowed.
    Deserialize,
}

/// A serializer bound to one side of a `FifoBuffer`.
#[derive(Debug)]
pub struct FifoSerializer {
    fifo: Arc<FifoBuffer>,
    mode: Mode,
    timeout: Option<Duration>,
    stat: SerializerStat,
}

impl FifoSerializer {
    pub fn new(fifo: Arc<FifoBuffer>, mode: Mode) -> Self {
        FifoSerializer {
            fifo,
            mode,
            timeout: Some(DEFAULT_TIMEOUT),
            stat: SerializerStat::default(),
        }
    }

    /// Override how long each transfer may block; `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }
}

impl Drop for FifoSerializer {
    fn drop(&mut self) {
        self.fifo.close(match self.mode {
            Mode::Serialize => CloseFlags::WRITE,
            Mode::Deserialize => CloseFlags::READ,
        });
    }
}

impl Serializer for FifoSerializer {
    fn write(&mut self, data: &[u8], element_size: usize) -> Result<(), Error> {
        if Mode::Serialize != self.mode {
            return Err(Error::NoSupport);
        }
        check_element_size(element_size, data.len())?;

        let fifo = &self.fifo;
        let timeout = self.timeout;
        let result = for_each_network_element(data, element_size, |element| {
            fifo.write(element, timeout).map(|_| ())
        });

        self.stat.written += data.len() as u64;
        result
    }

    fn read(
        &mut self,
        data: &mut [u8],
        element_size: usize,
    ) -> Result<(), Error> {
        if Mode::Deserialize != self.mode {
            return Err(Error::NoSupport);
        }
        check_element_size(element_size, data.len())?;

        let nread = self.fifo.read(data, self.timeout)?;
        self.stat.read += nread as u64;
        if nread != data.len() {
            return Err(Error::CallFailed);
        }

        to_host(data, element_size);
        Ok(())
    }

    fn skip(&mut self, element_size: usize, count: usize) -> Result<(), Error> {
        if Mode::Deserialize != self.mode {
            return Err(Error::NoSupport);
        }

        let total = element_size
            .checked_mul(count)
            .ok_or(Error::InvalidParameter)?;
        let mut buf = Vec::<u8>::new();
        buf.try_reserve_exact(total)
            .map_err(|_| Error::NotEnoughMemory)?;
        buf.resize(total, 0);

        self.read(&mut buf, 1)
    }

    fn flush(&mut self) -> Result<(), Error> {
        match self.mode {
            // Draining our own output would throw away the record the peer is
            // waiting for, so wait for the peer to consume it instead.
            Mode::Serialize => self.fifo.flush(self.timeout),
            Mode::Deserialize => {
                let mut buf = vec![0u8; FLUSH_BLOCK];
                loop {
                    let nread = self.fifo.read(&mut buf, self.timeout)?;
                    self.stat.read += nread as u64;
                    if nread < buf.len() {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn stat(&self) -> SerializerStat {
        self.stat
    }
}
