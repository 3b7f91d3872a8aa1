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

//! Constants from `sysexits.h`, and the mapping from our errors onto them.

use super::error::Error;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Sysexit(pub i32);

pub const EX_OK: Sysexit = Sysexit(0);
pub const EX_USAGE: Sysexit = Sysexit(64);
pub const EX_DATAERR: Sysexit = Sysexit(65);
pub const EX_NOINPUT: Sysexit = Sysexit(66);
pub const EX_UNAVAILABLE: Sysexit = Sysexit(69);
pub const EX_SOFTWARE: Sysexit = Sysexit(70);
pub const EX_OSERR: Sysexit = Sysexit(71);
pub const EX_CANTCREAT: Sysexit = Sysexit(73);
pub const EX_IOERR: Sysexit = Sysexit(74);
pub const EX_TEMPFAIL: Sysexit = Sysexit(75);
pub const EX_PROTOCOL: Sysexit = Sysexit(76);
pub const EX_NOPERM: Sysexit = Sysexit(77);
pub const EX_CONFIG: Sysexit = Sysexit(78);

impl Sysexit {
    pub fn exit(self) -> ! {
        std::process::exit(self.0)
    }
}

impl From<&Error> for Sysexit {
    fn from(e: &Error) -> Self {
        match *e {
            Error::Timeout(..) => EX_TEMPFAIL,
            Error::Closed => EX_IOERR,
            Error::NotFound => EX_NOINPUT,
            Error::NoAccess => EX_NOPERM,
            Error::InvalidParameter => EX_USAGE,
            Error::NotEnoughMemory => EX_OSERR,
            Error::CallFailed | Error::BadRecord => EX_DATAERR,
            Error::NoSupport => EX_SOFTWARE,
            Error::Io(..) => EX_IOERR,
            Error::Toml(..) | Error::Config(..) => EX_CONFIG,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_mapping() {
        assert_eq!(EX_TEMPFAIL, Sysexit::from(&Error::Timeout(1)));
        assert_eq!(EX_NOPERM, Sysexit::from(&Error::NoAccess));
        assert_eq!(EX_DATAERR, Sysexit::from(&Error::BadRecord));
        assert_eq!(EX_CONFIG, Sysexit::from(&Error::Config("x")));
    }
}
