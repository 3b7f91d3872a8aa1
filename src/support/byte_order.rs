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

//! Conversion between host and network byte order.
//!
//! The serializers never look at the value of an element, only at its width,
//! so the in-place converters below work on raw byte slices holding a whole
//! number of elements.

use byteorder::{BigEndian, ByteOrder, NativeEndian};

use super::error::Error;

pub fn host_to_network16(v: u16) -> u16 {
    v.to_be()
}

pub fn host_to_network32(v: u32) -> u32 {
    v.to_be()
}

pub fn host_to_network64(v: u64) -> u64 {
    v.to_be()
}

pub fn network_to_host16(v: u16) -> u16 {
    u16::from_be(v)
}

pub fn network_to_host32(v: u32) -> u32 {
    u32::from_be(v)
}

pub fn network_to_host64(v: u64) -> u64 {
    u64::from_be(v)
}

/// Checks that `element_size` is a width the serializers understand and that
/// `len` bytes hold a whole number of such elements.
pub fn check_element_size(
    element_size: usize,
    len: usize,
) -> Result<(), Error> {
    match element_size {
        1 | 2 | 4 | 8 if 0 == len % element_size => Ok(()),
        _ => Err(Error::InvalidParameter),
    }
}

/// Rewrites every `element_size`-wide element of `data`, which is in host
/// byte order, into network byte order.
pub fn to_network(data: &mut [u8], element_size: usize) {
    match element_size {
        2 => {
            for chunk in data.chunks_exact_mut(2) {
                let v = NativeEndian::read_u16(chunk);
                BigEndian::write_u16(chunk, v);
            }
        }
        4 => {
            for chunk in data.chunks_exact_mut(4) {
                let v = NativeEndian::read_u32(chunk);
                BigEndian::write_u32(chunk, v);
            }
        }
        8 => {
            for chunk in data.chunks_exact_mut(8) {
                let v = NativeEndian::read_u64(chunk);
                BigEndian::write_u64(chunk, v);
            }
        }
        _ => (),
    }
}

/// The inverse of `to_network`.
pub fn to_host(data: &mut [u8], element_size: usize) {
    match element_size {
        2 => {
            for chunk in data.chunks_exact_mut(2) {
                let v = BigEndian::read_u16(chunk);
                NativeEndian::write_u16(chunk, v);
            }
        }
        4 => {
            for chunk in data.chunks_exact_mut(4) {
                let v = BigEndian::read_u32(chunk);
                NativeEndian::write_u32(chunk, v);
            }
        }
        8 => {
            for chunk in data.chunks_exact_mut(8) {
                let v = BigEndian::read_u64(chunk);
                NativeEndian::write_u64(chunk, v);
            }
        }
        _ => (),
    }
}
