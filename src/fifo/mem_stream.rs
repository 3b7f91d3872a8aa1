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

//! A seekable in-memory stream, the loopback backend for serializer tests.
//!
//! Clones made through `try_clone()` share the data but keep their own
//! position, like `IStream::Clone`.

use std::convert::TryFrom;
use std::io::SeekFrom;
use std::sync::{Arc, Mutex};

use super::stream::{Capabilities, Stream, StreamStat};
use crate::support::error::Error;

#[derive(Debug, Default)]
pub struct MemStream {
    data: Arc<Mutex<Vec<u8>>>,
    pos: u64,
}

impl MemStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stream positioned at the start of `data`.
    pub fn with_data(data: Vec<u8>) -> Self {
        MemStream {
            data: Arc::new(Mutex::new(data)),
            pos: 0,
        }
    }

    /// Returns a copy of the full content, regardless of position.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }

    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl Stream for MemStream {
    fn capabilities(&self) -> Capabilities {
        Capabilities::READ
            | Capabilities::WRITE
            | Capabilities::SEEK
            | Capabilities::SET_SIZE
            | Capabilities::COMMIT
            | Capabilities::STAT
            | Capabilities::CLONE
    }

    fn read(&mut self, dst: &mut [u8]) -> Result<usize, Error> {
        let data = self.data.lock().unwrap();
        let start = (self.pos as usize).min(data.len());
        let len = dst.len().min(data.len() - start);
        dst[..len].copy_from_slice(&data[start..start + len]);
        self.pos += len as u64;
        Ok(len)
    }

    fn write(&mut self, src: &[u8]) -> Result<usize, Error> {
        let mut data = self.data.lock().unwrap();
        let start = self.pos as usize;
        let end = start + src.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(src);
        self.pos = end as u64;
        Ok(src.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, Error> {
        let len = self.data.lock().unwrap().len() as u64;
        let (base, off) = match pos {
            SeekFrom::Start(off) => (off, 0),
            SeekFrom::Current(off) => (self.pos, off),
            SeekFrom::End(off) => (len, off),
        };

        self.pos = u64::try_from(i128::from(base) + i128::from(off))
            .map_err(|_| Error::InvalidParameter)?;
        Ok(self.pos)
    }

    fn set_size(&mut self, size: u64) -> Result<(), Error> {
        self.data.lock().unwrap().resize(size as usize, 0);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn stat(&self) -> Result<StreamStat, Error> {
        Ok(StreamStat {
            size: self.data.lock().unwrap().len() as u64,
        })
    }

    fn try_clone(&self) -> Result<Box<dyn Stream>, Error> {
        Ok(Box::new(MemStream {
            data: Arc::clone(&self.data),
            pos: self.pos,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn write_seek_read() {
        let mut stream = MemStream::new();
        assert_eq!(5, stream.write(b"hello").unwrap());
        assert_eq!(0, stream.seek(SeekFrom::Start(0)).unwrap());

        let mut buf = [0u8; 8];
        assert_eq!(5, stream.read(&mut buf).unwrap());
        assert_eq!(b"hello", &buf[..5]);
        assert_eq!(0, stream.read(&mut buf).unwrap());
    }

    #[test]
    fn write_past_end_extends() {
        let mut stream = MemStream::with_data(b"ab".to_vec());
        stream.seek(SeekFrom::End(2)).unwrap();
        stream.write(b"z").unwrap();
        assert_eq!(b"ab\0\0z".to_vec(), stream.to_vec());
        assert_eq!(5, stream.stat().unwrap().size);

        stream.set_size(1).unwrap();
        assert_eq!(b"a".to_vec(), stream.to_vec());
        assert_matches!(
            Err(Error::InvalidParameter),
            stream.seek(SeekFrom::Current(-10))
        );
        assert_eq!(u64::MAX, stream.seek(SeekFrom::Start(u64::MAX)).unwrap());
        assert_matches!(
            Err(Error::InvalidParameter),
            stream.seek(SeekFrom::Current(1))
        );
    }

    #[test]
    fn clones_share_data() {
        let mut stream = MemStream::with_data(b"xyz".to_vec());
        let mut clone = stream.try_clone().unwrap();
        clone.seek(SeekFrom::End(0)).unwrap();
        clone.write(b"!").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(4, stream.read(&mut buf).unwrap());
        assert_eq!(b"xyz!", &buf);
    }
}
