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

//! The framed record stream moved through the pipeline.
//!
//! The format is:
//! - u32: magic, `MAGIC`
//! - u16: format version, currently 1
//! - u32: the id of the object the records belong to
//! - Zero or more records, each a u32 length followed by that many bytes
//! - A u32 zero terminating the stream
//!
//! All integers are in network byte order, as produced by the serializers.

use std::convert::TryFrom;

use log::debug;

use super::serializer::{Serializer, SerializerExt};
use crate::lock::ObjectId;
use crate::support::error::Error;

pub const MAGIC: u32 = 0x4d53_4652;
pub const VERSION: u16 = 1;
/// Records longer than this are rejected on read rather than allocated.
pub const MAX_RECORD: u32 = 16 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub object: ObjectId,
}

#[derive(Debug)]
pub struct RecordWriter<S> {
    ser: S,
    records: u64,
}

impl<S: Serializer> RecordWriter<S> {
    /// Write the stream header and return a writer for the records.
    pub fn new(mut ser: S, header: Header) -> Result<Self, Error> {
        ser.write_u32(MAGIC)?;
        ser.write_u16(VERSION)?;
        ser.write_u32(header.object)?;
        Ok(RecordWriter { ser, records: 0 })
    }

    /// Append one record. Empty records cannot be represented since a zero
    /// length ends the stream.
    pub fn write_record(&mut self, data: &[u8]) -> Result<(), Error> {
        if data.is_empty() {
            return Err(Error::InvalidParameter);
        }

        let len = u32::try_from(data.len())
            .ok()
            .filter(|&len| len <= MAX_RECORD)
            .ok_or(Error::InvalidParameter)?;
        self.ser.write_u32(len)?;
        self.ser.write_bytes(data)?;
        self.records += 1;
        Ok(())
    }

    /// Write the terminator and hand back the serializer.
    pub fn finish(mut self) -> Result<S, Error> {
        self.ser.write_u32(0)?;
        debug!("finished record stream with {} records", self.records);
        Ok(self.ser)
    }

    pub fn records(&self) -> u64 {
        self.records
    }
}

#[derive(Debug)]
pub struct RecordReader<S> {
    ser: S,
    header: Header,
    done: bool,
}

impl<S: Serializer> RecordReader<S> {
    /// Read and validate the stream header.
    pub fn new(mut ser: S) -> Result<Self, Error> {
        if MAGIC != ser.read_u32()? {
            return Err(Error::BadRecord);
        }

        let version = ser.read_u16()?;
        if VERSION != version {
            debug!("unsupported record stream version {}", version);
            return Err(Error::BadRecord);
        }

        let object = ser.read_u32()?;
        Ok(RecordReader {
            ser,
            header: Header { object },
            done: false,
        })
    }

    pub fn header(&self) -> Header {
        self.header
    }

    fn next_len(&mut self) -> Result<Option<u32>, Error> {
        if self.done {
            return Ok(None);
        }

        match self.ser.read_u32()? {
            0 => {
                self.done = true;
                Ok(None)
            }
            len if len > MAX_RECORD => Err(Error::BadRecord),
            len => Ok(Some(len)),
        }
    }

    /// Read the next record, or `None` once the terminator has been seen.
    pub fn next_record(&mut self) -> Result<Option<Vec<u8>>, Error> {
        match self.next_len()? {
            None => Ok(None),
            Some(len) => self.ser.read_bytes(len as usize).map(Some),
        }
    }

    pub fn into_inner(self) -> S {
        self.ser
    }
}

#[cfg(test)]
mod test {
    use std::io::SeekFrom;
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::fifo::buffer::FifoBuffer;
    use crate::fifo::mem_stream::MemStream;
    use crate::fifo::serializer::{FifoSerializer, Mode, StreamSerializer};
    use crate::fifo::stream::Stream;

    #[test]
    fn write_and_read_back() {
        let mut writer = RecordWriter::new(
            StreamSerializer::new(MemStream::new()),
            Header { object: 42 },
        )
        .unwrap();
        writer.write_record(b"first").unwrap();
        writer.write_record(b"second").unwrap();
        writer.write_record(b"third").unwrap();
        assert_eq!(3, writer.records());
        let mut ser = writer.finish().unwrap();
        ser.get_mut().seek(SeekFrom::Start(0)).unwrap();

        let mut reader = RecordReader::new(ser).unwrap();
        assert_eq!(Header { object: 42 }, reader.header());
        assert_eq!(Some(b"first".to_vec()), reader.next_record().unwrap());
        assert_eq!(Some(b"second".to_vec()), reader.next_record().unwrap());
        assert_eq!(Some(b"third".to_vec()), reader.next_record().unwrap());
        assert_eq!(None, reader.next_record().unwrap());
        assert_eq!(None, reader.next_record().unwrap());
    }

    #[test]
    fn rejects_bad_input() {
        let ser = StreamSerializer::new(MemStream::with_data(vec![0; 10]));
        assert_matches!(Err(Error::BadRecord), RecordReader::new(ser));

        let mut writer = RecordWriter::new(
            StreamSerializer::new(MemStream::new()),
            Header { object: 1 },
        )
        .unwrap();
        assert_matches!(Err(Error::InvalidParameter), writer.write_record(b""));
    }

    #[test]
    fn truncated_stream_is_a_short_read() {
        let mut writer = RecordWriter::new(
            StreamSerializer::new(MemStream::new()),
            Header { object: 7 },
        )
        .unwrap();
        writer.write_record(b"abcdef").unwrap();
        let mut data = writer.finish().unwrap().into_inner().to_vec();
        data.truncate(data.len() - 7);

        let mut reader =
            RecordReader::new(StreamSerializer::new(MemStream::with_data(data)))
                .unwrap();
        assert_matches!(Err(Error::CallFailed), reader.next_record());
    }

    #[test]
    fn through_fifo() {
        let fifo = Arc::new(FifoBuffer::new(16));
        let producer = FifoSerializer::new(Arc::clone(&fifo), Mode::Serialize);
        let consumer = FifoSerializer::new(fifo, Mode::Deserialize);

        let handle = thread::spawn(move || {
            let mut writer =
                RecordWriter::new(producer, Header { object: 9 }).unwrap();
            for i in 0..50u8 {
                writer.write_record(&vec![i; usize::from(i) + 1]).unwrap();
            }
            writer.finish().unwrap();
        });

        let mut reader = RecordReader::new(consumer).unwrap();
        assert_eq!(9, reader.header().object);
        let mut count = 0u8;
        while let Some(record) = reader.next_record().unwrap() {
            assert_eq!(vec![count; usize::from(count) + 1], record);
            count += 1;
        }
        assert_eq!(50, count);
        handle.join().unwrap();
    }
}
