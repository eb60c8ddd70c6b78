//! Binary codec helpers
//!
//! Fixed-layout firmware structures are decoded and encoded through
//! short-lived physical windows; UTF-8 strings are transcoded to the
//! NUL-terminated little-endian UTF-16 firmware expects.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use zerocopy::{FromBytes, Immutable, IntoBytes};

use oxboot_mem::PhysWindow;

use crate::error::Error;

const ALIGN: usize = 8;

/// Decode a fixed-layout structure from a published physical address.
///
/// The window is held only for the duration of the copy.
pub fn decode<T: FromBytes>(addr: u64) -> Result<T, Error> {
    let n = core::mem::size_of::<T>();
    let window = PhysWindow::map(addr, n.next_multiple_of(ALIGN))?;

    let mut buf = vec![0u8; n];
    window.read(0, &mut buf)?;

    T::read_from_bytes(&buf).map_err(|_| Error::Protocol("structure layout"))
}

/// Encode a fixed-layout structure at a physical address.
pub fn encode<T: IntoBytes + Immutable>(value: &T, addr: u64) -> Result<(), Error> {
    let buf = value.as_bytes();
    let mut window = PhysWindow::map_mut(addr, buf.len().next_multiple_of(ALIGN))?;
    window.write(0, buf)?;
    Ok(())
}

/// Encode a UTF-8 string as NUL-terminated little-endian UTF-16.
#[must_use]
pub fn utf16_encode(s: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(s.len() * 2 + 2);

    for unit in s.encode_utf16() {
        buf.push((unit & 0xff) as u8);
        buf.push((unit >> 8) as u8);
    }

    buf.push(0x00);
    buf.push(0x00);
    buf
}

/// Decode NUL-terminated little-endian UTF-16 into a UTF-8 string.
///
/// An odd-length buffer is invalid UTF-16 and yields an empty string.
#[must_use]
pub fn utf16_decode(buf: &[u8]) -> String {
    if buf.len() % 2 != 0 {
        return String::new();
    }

    let units = buf
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0);

    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::KnownLayout;

    #[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, PartialEq, Clone, Copy)]
    #[repr(C)]
    struct Sample {
        a: u32,
        b: u32,
        c: u64,
    }

    #[test]
    fn test_decode_from_local_buffer() {
        let value = Sample {
            a: 0x11223344,
            b: 0x55667788,
            c: 0xdeadbeefcafe0123,
        };

        let decoded: Sample = decode(&value as *const Sample as u64).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_encode_round_trip() {
        let value = Sample {
            a: 1,
            b: 2,
            c: 3,
        };
        let mut target = Sample {
            a: 0,
            b: 0,
            c: 0,
        };

        encode(&value, &mut target as *mut Sample as u64).unwrap();
        assert_eq!(target, value);
    }

    #[test]
    fn test_decode_null_address() {
        assert!(decode::<Sample>(0).is_err());
    }

    #[test]
    fn test_utf16_round_trip() {
        for s in ["", "a", "boot", "loader\\entries\\arch.conf", "käse π"] {
            let encoded = utf16_encode(s);
            assert_eq!(encoded.len() % 2, 0);
            assert_eq!(&encoded[encoded.len() - 2..], &[0, 0]);
            assert_eq!(utf16_decode(&encoded), s);
        }
    }

    #[test]
    fn test_utf16_decode_stops_at_nul() {
        let mut buf = utf16_encode("ab");
        buf.extend_from_slice(&[b'x', 0]);
        assert_eq!(utf16_decode(&buf), "ab");
    }

    #[test]
    fn test_utf16_decode_odd_length() {
        assert_eq!(utf16_decode(&[0x41]), "");
    }
}
