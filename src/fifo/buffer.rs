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

//! A bounded, thread-safe byte FIFO.
//!
//! One side writes, the other reads, and each may be closed independently.
//! Closing the write side lets the reader drain what is left and then see
//! end-of-stream; closing the read side makes any further write fail since
//! nothing will ever consume the data.
//!
//! Every blocking call takes a timeout; `None` waits forever. Any blocked
//! call is woken by `close()` from another thread.

use std::cmp;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use bitflags::bitflags;

use crate::support::error::Error;

pub const DEFAULT_CAPACITY: usize = 131072;

bitflags! {
    pub struct CloseFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
    }
}

#[derive(Debug)]
pub struct FifoBuffer {
    capacity: usize,
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
    flushed: Condvar,
}

#[derive(Debug)]
struct State {
    storage: VecDeque<u8>,
    read_closed: bool,
    write_closed: bool,
}

impl Default for FifoBuffer {
    fn default() -> Self {
        FifoBuffer::new(DEFAULT_CAPACITY)
    }
}

impl FifoBuffer {
    /// Create a new, open buffer holding at most `capacity` bytes.
    ///
    /// Panics if `capacity` is 0, since no write could ever make progress.
    /// Use `try_new` when the capacity comes from outside.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "FifoBuffer capacity must be non-zero");
        Self::with_capacity(capacity)
    }

    /// Like `new`, but fails with `Error::InvalidParameter` on a zero
    /// capacity.
    pub fn try_new(capacity: usize) -> Result<Self, Error> {
        if 0 == capacity {
            return Err(Error::InvalidParameter);
        }

        Ok(Self::with_capacity(capacity))
    }

    fn with_capacity(capacity: usize) -> Self {
        FifoBuffer {
            capacity,
            state: Mutex::new(State {
                storage: VecDeque::with_capacity(capacity.min(65536)),
                read_closed: false,
                write_closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            flushed: Condvar::new(),
        }
    }

    /// Append all of `src` to the buffer, blocking while it is full.
    ///
    /// Returns the number of bytes written, which is always `src.len()` on
    /// success. If `timeout` elapses first, `Error::Timeout` carries the
    /// number of bytes that did make it in. Fails with `Error::Closed` if
    /// either side is closed, since then nobody will consume the data.
    pub fn write(
        &self,
        src: &[u8],
        timeout: Option<Duration>,
    ) -> Result<usize, Error> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock().unwrap();
        let mut written = 0;

        loop {
            if state.read_closed || state.write_closed {
                return Err(Error::Closed);
            }

            if written == src.len() {
                return Ok(written);
            }

            while state.storage.len() >= self.capacity {
                if state.read_closed || state.write_closed {
                    return Err(Error::Closed);
                }

                let (s, timed_out) =
                    wait_on(&self.not_full, state, deadline);
                state = s;
                if timed_out && state.storage.len() >= self.capacity {
                    return Err(Error::Timeout(written));
                }
            }

            let now = cmp::min(
                src.len() - written,
                self.capacity - state.storage.len(),
            );
            state
                .storage
                .extend(src[written..written + now].iter().copied());
            written += now;
            self.not_empty.notify_all();
        }
    }

    /// Fill `dst` from the buffer, blocking while it is empty.
    ///
    /// Returns fewer than `dst.len()` bytes only once the write side has been
    /// closed and everything before the close has been consumed; `Ok(0)` for
    /// a non-empty `dst` is end-of-stream. If `timeout` elapses first,
    /// `Error::Timeout` carries the number of bytes already copied into
    /// `dst`.
    pub fn read(
        &self,
        dst: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, Error> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock().unwrap();
        let mut nread = 0;

        if state.read_closed {
            return Err(Error::Closed);
        }

        while nread < dst.len() {
            while state.storage.is_empty() {
                if state.read_closed {
                    return Err(Error::Closed);
                }

                if state.write_closed {
                    return Ok(nread);
                }

                let (s, timed_out) =
                    wait_on(&self.not_empty, state, deadline);
                state = s;
                if timed_out && state.storage.is_empty() {
                    return Err(Error::Timeout(nread));
                }
            }

            let now = cmp::min(dst.len() - nread, state.storage.len());
            for (d, s) in dst[nread..nread + now]
                .iter_mut()
                .zip(state.storage.drain(..now))
            {
                *d = s;
            }
            nread += now;

            self.not_full.notify_all();
            if state.storage.is_empty() {
                self.flushed.notify_all();
            }
        }

        Ok(nread)
    }

    /// Close one or both sides of the buffer and wake every waiter.
    ///
    /// Closing an already closed side has no effect.
    pub fn close(&self, flags: CloseFlags) {
        let mut state = self.state.lock().unwrap();
        if flags.contains(CloseFlags::READ) {
            state.read_closed = true;
        }
        if flags.contains(CloseFlags::WRITE) {
            state.write_closed = true;
        }

        self.not_empty.notify_all();
        self.not_full.notify_all();
        self.flushed.notify_all();
    }

    /// Block until the reader has consumed everything in the buffer.
    ///
    /// Fails with `Error::Closed` if the read side closes while data is still
    /// queued, and with `Error::Timeout(0)` if data is still queued when
    /// `timeout` elapses.
    pub fn flush(&self, timeout: Option<Duration>) -> Result<(), Error> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock().unwrap();
        while !state.storage.is_empty() {
            if state.read_closed {
                return Err(Error::Closed);
            }

            let (s, timed_out) = wait_on(&self.flushed, state, deadline);
            state = s;
            if timed_out && !state.storage.is_empty() {
                return Err(Error::Timeout(0));
            }
        }

        Ok(())
    }

    /// Returns whether the given sides are closed.
    ///
    /// With both flags, this is true only if both sides are closed.
    pub fn is_closed(&self, flags: CloseFlags) -> bool {
        let state = self.state.lock().unwrap();
        (!flags.contains(CloseFlags::READ) || state.read_closed)
            && (!flags.contains(CloseFlags::WRITE) || state.write_closed)
            && !flags.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().storage.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.state.lock().unwrap().storage.len() >= self.capacity
    }

    /// The number of bytes currently buffered.
    pub fn size(&self) -> usize {
        self.state.lock().unwrap().storage.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Wait on `cond` until notified or `deadline` passes.
///
/// The boolean is true if the deadline has passed; the caller must still
/// re-check its own condition, since a notification may have raced the
/// deadline.
fn wait_on<'a>(
    cond: &Condvar,
    guard: MutexGuard<'a, State>,
    deadline: Option<Instant>,
) -> (MutexGuard<'a, State>, bool) {
    match deadline {
        None => (cond.wait(guard).unwrap(), false),
        Some(deadline) => {
            let now = Instant::now();
            if now >= deadline {
                return (guard, true);
            }

            let (guard, _) = cond.wait_timeout(guard, deadline - now).unwrap();
            (guard, Instant::now() >= deadline)
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::thread;

    use proptest::prelude::*;

    use super::*;

    const SHORT: Option<Duration> = Some(Duration::from_millis(50));

    #[test]
    fn streamed_transfer() {
        let fifo = Arc::new(FifoBuffer::new(16));

        let writer = {
            let fifo = Arc::clone(&fifo);
            thread::spawn(move || {
                assert_eq!(5, fifo.write(b"HELLO", None).unwrap());
                assert_eq!(6, fifo.write(b"WORLD!", None).unwrap());
                fifo.close(CloseFlags::WRITE);
            })
        };

        let mut received = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            let n = fifo.read(&mut buf, None).unwrap();
            if 0 == n {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }

        writer.join().unwrap();
        assert_eq!(b"HELLOWORLD!", &received[..]);
        assert_matches!(Ok(0), fifo.read(&mut buf, None));
    }

    #[test]
    fn write_times_out_when_full() {
        let fifo = FifoBuffer::new(4);
        assert_eq!(4, fifo.write(b"abcd", None).unwrap());
        assert!(fifo.is_full());

        let start = Instant::now();
        assert_matches!(Err(Error::Timeout(0)), fifo.write(b"e", SHORT));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_secs(5));
        assert_eq!(4, fifo.size());
    }

    #[test]
    fn partial_write_reports_progress_on_timeout() {
        let fifo = FifoBuffer::new(4);
        assert_matches!(Err(Error::Timeout(4)), fifo.write(b"abcdef", SHORT));
        assert_eq!(4, fifo.size());
    }

    #[test]
    fn read_times_out_when_empty() {
        let fifo = FifoBuffer::new(4);
        let mut buf = [0u8; 2];
        assert_matches!(Err(Error::Timeout(0)), fifo.read(&mut buf, SHORT));

        fifo.write(b"x", None).unwrap();
        assert_matches!(Err(Error::Timeout(1)), fifo.read(&mut buf, SHORT));
        assert_eq!(b'x', buf[0]);
    }

    #[test]
    fn half_close_eof() {
        let fifo = FifoBuffer::new(8);
        fifo.write(b"abc", None).unwrap();
        fifo.close(CloseFlags::WRITE);

        let mut buf = [0u8; 8];
        assert_matches!(Ok(3), fifo.read(&mut buf, None));
        assert_eq!(b"abc", &buf[..3]);
        assert_matches!(Ok(0), fifo.read(&mut buf, None));
        assert_matches!(Ok(0), fifo.read(&mut buf, None));
    }

    #[test]
    fn write_after_close_fails() {
        let fifo = FifoBuffer::new(8);
        fifo.close(CloseFlags::WRITE);
        assert_matches!(Err(Error::Closed), fifo.write(b"a", None));

        let fifo = FifoBuffer::new(8);
        fifo.close(CloseFlags::READ);
        assert_matches!(Err(Error::Closed), fifo.write(b"a", None));
        let mut buf = [0u8; 1];
        assert_matches!(Err(Error::Closed), fifo.read(&mut buf, None));
    }

    #[test]
    fn fully_closed_is_dead() {
        let fifo = FifoBuffer::new(8);
        fifo.write(b"abc", None).unwrap();
        fifo.close(CloseFlags::READ | CloseFlags::WRITE);
        fifo.close(CloseFlags::READ | CloseFlags::WRITE);

        let mut buf = [0u8; 1];
        assert_matches!(Err(Error::Closed), fifo.read(&mut buf, None));
        assert_matches!(Err(Error::Closed), fifo.write(b"a", None));
        assert_matches!(Err(Error::Closed), fifo.flush(None));
    }

    #[test]
    fn close_flags_observers() {
        let fifo = FifoBuffer::new(8);
        assert!(!fifo.is_closed(CloseFlags::READ));
        assert!(!fifo.is_closed(CloseFlags::WRITE));

        fifo.close(CloseFlags::WRITE);
        assert!(!fifo.is_closed(CloseFlags::READ));
        assert!(fifo.is_closed(CloseFlags::WRITE));
        assert!(!fifo.is_closed(CloseFlags::READ | CloseFlags::WRITE));

        fifo.close(CloseFlags::READ);
        assert!(fifo.is_closed(CloseFlags::READ | CloseFlags::WRITE));
        assert!(!fifo.is_closed(CloseFlags::empty()));
    }

    #[test]
    fn blocked_reader_wakes_on_close() {
        for &flags in &[CloseFlags::WRITE, CloseFlags::READ | CloseFlags::WRITE]
        {
            let fifo = Arc::new(FifoBuffer::new(8));
            let reader = {
                let fifo = Arc::clone(&fifo);
                thread::spawn(move || {
                    let mut buf = [0u8; 4];
                    fifo.read(&mut buf, Some(Duration::from_secs(30)))
                })
            };

            thread::sleep(Duration::from_millis(20));
            let start = Instant::now();
            fifo.close(flags);
            let result = reader.join().unwrap();
            assert!(start.elapsed() < Duration::from_secs(5));

            if flags.contains(CloseFlags::READ) {
                assert_matches!(Err(Error::Closed), result);
            } else {
                assert_matches!(Ok(0), result);
            }
        }
    }

    #[test]
    fn blocked_writer_wakes_on_reader_close() {
        let fifo = Arc::new(FifoBuffer::new(2));
        let writer = {
            let fifo = Arc::clone(&fifo);
            thread::spawn(move || fifo.write(b"abcdef", None))
        };

        thread::sleep(Duration::from_millis(20));
        fifo.close(CloseFlags::READ);
        assert_matches!(Err(Error::Closed), writer.join().unwrap());
    }

    #[test]
    fn flush_waits_for_reader() {
        let fifo = Arc::new(FifoBuffer::new(8));
        fifo.write(b"abcd", None).unwrap();

        let reader = {
            let fifo = Arc::clone(&fifo);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                let mut buf = [0u8; 4];
                fifo.read(&mut buf, None).unwrap();
                buf
            })
        };

        fifo.flush(None).unwrap();
        assert!(fifo.is_empty());
        assert_eq!(b"abcd", &reader.join().unwrap());
    }

    #[test]
    fn flush_fails_if_reader_goes_away() {
        let fifo = Arc::new(FifoBuffer::new(8));
        fifo.write(b"abcd", None).unwrap();

        let closer = {
            let fifo = Arc::clone(&fifo);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                fifo.close(CloseFlags::READ);
            })
        };

        assert_matches!(Err(Error::Closed), fifo.flush(None));
        closer.join().unwrap();
    }

    #[test]
    fn flush_times_out_while_reader_stalls() {
        let fifo = FifoBuffer::new(8);
        fifo.write(b"abcd", None).unwrap();

        let start = Instant::now();
        assert_matches!(Err(Error::Timeout(0)), fifo.flush(SHORT));
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(4, fifo.size());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_matches!(Err(Error::InvalidParameter), FifoBuffer::try_new(0));
        assert_eq!(1, FifoBuffer::try_new(1).unwrap().capacity());
    }

    #[test]
    fn empty_requests() {
        let fifo = FifoBuffer::new(1);
        assert_matches!(Ok(0), fifo.write(b"", SHORT));
        assert_matches!(Ok(0), fifo.read(&mut [], SHORT));
        fifo.flush(None).unwrap();
    }

    fn chunks() -> impl Strategy<Value = Vec<Vec<u8>>> {
        prop::collection::vec(prop::collection::vec(any::<u8>(), 0..40), 0..20)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn fifo_order_and_capacity(
            writes in chunks(),
            capacity in 1usize..32,
            read_size in 1usize..48,
        ) {
            let fifo = Arc::new(FifoBuffer::new(capacity));
            let expected = writes.concat();

            let writer = {
                let fifo = Arc::clone(&fifo);
                thread::spawn(move || {
                    for chunk in &writes {
                        fifo.write(chunk, None).unwrap();
                        assert!(fifo.size() <= capacity);
                    }
                    fifo.close(CloseFlags::WRITE);
                })
            };

            let mut received = Vec::new();
            let mut buf = vec![0u8; read_size];
            loop {
                prop_assert!(fifo.size() <= capacity);
                let n = fifo.read(&mut buf, None).unwrap();
                if 0 == n {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }

            writer.join().unwrap();
            prop_assert_eq!(expected, received);
        }
    }
}
