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

//! The `encode` and `decode` pipelines.
//!
//! Both run a producer thread and a consumer thread joined by the FIFO pair
//! of a stream session, so reading the input overlaps with processing it
//! and the whole stream is never held in memory.

use std::io::{self, Read, Write};
use std::sync::Arc;

use log::{error, info};

use super::main::PipeOptions;
use crate::context::Context;
use crate::fifo::record::{Header, RecordReader, RecordWriter};
use crate::fifo::serializer::{
    FifoSerializer, Mode, Serializer, StreamSerializer,
};
use crate::fifo::stream::FifoWriter;
use crate::lock::SessionId;
use crate::support::error::Error;

fn session_id() -> SessionId {
    SessionId::from(format!("pid-{}", std::process::id()))
}

pub(super) fn encode(
    ctx: &Context,
    options: &PipeOptions,
) -> Result<(), Error> {
    let stdout = io::stdout();
    encode_stream(ctx, options.object, &mut io::stdin(), &mut stdout.lock())
}

pub(super) fn decode(
    ctx: &Context,
    options: &PipeOptions,
) -> Result<(), Error> {
    let stdout = io::stdout();
    decode_stream(ctx, options.object, &mut io::stdin(), &mut stdout.lock())
}

/// Fill `buf` as far as possible, returning less only at end of input.
fn read_chunk(src: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut len = 0;
    while len < buf.len() {
        match src.read(&mut buf[len..]) {
            Ok(0) => break,
            Ok(n) => len += n,
            Err(e) if io::ErrorKind::Interrupted == e.kind() => (),
            Err(e) => return Err(e),
        }
    }

    Ok(len)
}

/// Run `producer` on its own thread while `consumer` runs on this one.
///
/// When both sides fail, the side whose peer merely went away reports the
/// other side's error.
fn run_pipeline<P, C>(producer: P, consumer: C) -> Result<(), Error>
where
    P: FnOnce() -> Result<(), Error> + Send,
    C: FnOnce() -> Result<(), Error>,
{
    crossbeam::scope(|s| {
        let producer = s.spawn(move |_| producer());
        let consumed = consumer();
        let produced = producer.join().unwrap_or_else(|_| {
            error!("Producer thread panicked");
            Err(Error::CallFailed)
        });

        match (produced, consumed) {
            (Err(e), Err(other)) if is_peer_gone(&e) => Err(other),
            (Err(e), _) => Err(e),
            (Ok(()), consumed) => consumed,
        }
    })
    .unwrap_or(Err(Error::CallFailed))
}

fn is_peer_gone(e: &Error) -> bool {
    match *e {
        Error::Closed => true,
        Error::Io(ref e) => io::ErrorKind::BrokenPipe == e.kind(),
        _ => false,
    }
}

pub(super) fn encode_stream<R, W>(
    ctx: &Context,
    object: u32,
    input: &mut R,
    output: &mut W,
) -> Result<(), Error>
where
    R: Read + Send,
    W: Write,
{
    let mut session = ctx.open_stream(object, session_id())?;
    let writer = session.take_writer().ok_or(Error::Closed)?;
    let reader = session.take_reader().ok_or(Error::Closed)?;
    let chunk_size = ctx.config().pipe.chunk_size;
    let prefix = session.log_prefix().clone();

    run_pipeline(
        move || {
            let mut records = RecordWriter::new(
                StreamSerializer::new(writer),
                Header { object },
            )?;
            let mut buf = vec![0u8; chunk_size];
            loop {
                let len = read_chunk(input, &mut buf)?;
                if 0 == len {
                    break;
                }

                records.write_record(&buf[..len])?;
            }

            let count = records.records();
            let stat = records.finish()?.stat();
            info!(
                "{} Encoded {} records, {} bytes",
                prefix, count, stat.written
            );
            Ok(())
        },
        || {
            // Dropping the reader on failure closes the read side, which
            // stops the producer at once
            let mut reader = reader;
            io::copy(&mut reader, output)?;
            output.flush()?;
            Ok(())
        },
    )?;

    session.close()
}

pub(super) fn decode_stream<R, W>(
    ctx: &Context,
    object: u32,
    input: &mut R,
    output: &mut W,
) -> Result<(), Error>
where
    R: Read + Send,
    W: Write,
{
    let mut session = ctx.open_stream(object, session_id())?;
    // The reading end stays with the session; the serializer reads the
    // buffer directly and closes the read side when dropped.
    let writer: FifoWriter = session.take_writer().ok_or(Error::Closed)?;
    let consumer =
        FifoSerializer::new(Arc::clone(writer.buffer()), Mode::Deserialize)
            .with_timeout(ctx.config().fifo.timeout());
    let prefix = session.log_prefix().clone();

    run_pipeline(
        move || {
            let mut writer = writer;
            io::copy(input, &mut writer)?;
            Ok(())
        },
        || {
            let mut records = RecordReader::new(consumer)?;
            if records.header().object != object {
                error!(
                    "{} Stream belongs to object {}",
                    prefix,
                    records.header().object
                );
                return Err(Error::BadRecord);
            }

            let mut count = 0u64;
            while let Some(record) = records.next_record()? {
                output.write_all(&record)?;
                count += 1;
            }
            output.flush()?;

            info!(
                "{} Decoded {} records, {} bytes",
                prefix,
                count,
                records.into_inner().stat().read
            );
            Ok(())
        },
    )?;

    session.close()
}
