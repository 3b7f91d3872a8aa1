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

use std::io;

use thiserror::Error;

/// The result codes shared by the FIFO pipeline, the serializers and the
/// object lock table.
///
/// End-of-stream is not an error: a read that returns `Ok(0)` for a
/// non-empty request is the terminal signal.
#[derive(Error, Debug)]
pub enum Error {
    /// A blocking operation gave up. The value is the number of bytes that
    /// had already been transferred when the deadline passed.
    #[error("Timed out after transferring {0} bytes")]
    Timeout(usize),
    #[error("Stream closed")]
    Closed,
    #[error("Object not found")]
    NotFound,
    #[error("Object locked by another session")]
    NoAccess,
    #[error("Invalid parameter")]
    InvalidParameter,
    #[error("Not enough memory")]
    NotEnoughMemory,
    #[error("Short read")]
    CallFailed,
    #[error("Operation not supported")]
    NoSupport,
    #[error("Malformed record stream")]
    BadRecord,
    #[error("Invalid configuration: {0}")]
    Config(&'static str),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether the caller may simply retry the operation.
    pub fn is_transient(&self) -> bool {
        matches!(*self, Error::Timeout(..))
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            Error::Timeout(..) => io::Error::new(io::ErrorKind::TimedOut, e),
            Error::Closed => io::Error::new(io::ErrorKind::BrokenPipe, e),
            Error::NotFound => io::Error::new(io::ErrorKind::NotFound, e),
            Error::NoAccess => {
                io::Error::new(io::ErrorKind::PermissionDenied, e)
            }
            Error::InvalidParameter => {
                io::Error::new(io::ErrorKind::InvalidInput, e)
            }
            Error::CallFailed => {
                io::Error::new(io::ErrorKind::UnexpectedEof, e)
            }
            e => io::Error::new(io::ErrorKind::Other, e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn io_conversion_keeps_kind() {
        let e: io::Error = Error::Timeout(3).into();
        assert_eq!(io::ErrorKind::TimedOut, e.kind());
        let e: io::Error = Error::Closed.into();
        assert_eq!(io::ErrorKind::BrokenPipe, e.kind());

        let inner = io::Error::new(io::ErrorKind::AddrInUse, "x");
        let e: io::Error = Error::Io(inner).into();
        assert_eq!(io::ErrorKind::AddrInUse, e.kind());
    }

    #[test]
    fn only_timeout_is_transient() {
        assert!(Error::Timeout(0).is_transient());
        assert!(!Error::Closed.is_transient());
        assert!(!Error::CallFailed.is_transient());
    }
}
