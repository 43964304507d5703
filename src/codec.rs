//! The binary stream codec.
//!
//! Everything we store or send, the context state snapshot, command packets,
//! control messages, goes through the `Serialize` and `Deserialize` traits
//! defined here. They work over any `io::Write` or `io::Read`, so the same
//! code writes trace files, fills in-memory buffers, and talks to the
//! instrumented process over a socket.
//!
//! Simple numeric values are written in their in-memory form, which makes the
//! data specific to the host's byte order; trace files carry a marker so that
//! a mismatch is caught at load time. `usize` and `isize` always travel as
//! 64-bit values.
//!
//! Lengths of sequences, strings, byte blocks, and maps are written as
//! unsigned LEB128 numbers, followed by the elements. `Option<T>` is a
//! presence flag followed by the value, if any, which gives maps with optional
//! values a per-entry flag distinguishing a null entry from a missing one.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::mem;

use crate::error::{Error, Result};
use crate::raw;

/// A type that can be written to a byte stream.
pub trait Serialize {
    fn serialize<W: Write>(&self, stream: &mut W) -> Result<()>;

    /// Serialize a `[Self]` slice, without its length.
    ///
    /// The default definition of this function simply uses a loop to write out
    /// each element. Implementations for types that can be written as a single
    /// block should override this to do so.
    fn serialize_elements<W: Write>(seq: &[Self], stream: &mut W) -> Result<()>
    where
        Self: Sized,
    {
        for elt in seq {
            elt.serialize(stream)?;
        }
        Ok(())
    }
}

/// A type that can be read back from a byte stream.
pub trait Deserialize: Sized {
    fn deserialize<R: Read>(stream: &mut R) -> Result<Self>;

    /// Read `len` consecutive elements.
    fn deserialize_elements<R: Read>(len: usize, stream: &mut R) -> Result<Vec<Self>> {
        // Don't trust `len` for preallocation; it came from the stream.
        let mut vec = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            vec.push(Self::deserialize(stream)?);
        }
        Ok(vec)
    }
}

/// Write a length prefix.
pub fn write_len<W: Write>(stream: &mut W, len: usize) -> Result<()> {
    leb128::write::unsigned(stream, len as u64)?;
    Ok(())
}

/// Read a length prefix.
pub fn read_len<R: Read>(stream: &mut R) -> Result<usize> {
    Ok(leb128::read::unsigned(stream)? as usize)
}

/// Read exactly `len` bytes into a fresh vector.
///
/// The vector grows as data actually arrives, so a corrupt length can't make
/// us allocate more than the stream holds.
pub fn read_bytes<R: Read>(stream: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    stream.take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(Error::corruption(format!(
            "byte block truncated: expected {} bytes, found {}",
            len,
            bytes.len()
        )));
    }
    Ok(bytes)
}

macro_rules! implement_serialize_for_simple {
    ( $( $type:ty ),* ) => {
        $(
            /// Simple types are serialized as their in-memory form.
            impl Serialize for $type {
                fn serialize<W: Write>(&self, stream: &mut W) -> Result<()> {
                    stream.write_all(raw::as_bytes(self))?;
                    Ok(())
                }

                /// Slices of simple types can be handled with a single write.
                fn serialize_elements<W: Write>(seq: &[Self], stream: &mut W) -> Result<()> {
                    stream.write_all(raw::slice_as_bytes(seq))?;
                    Ok(())
                }
            }

            impl Deserialize for $type {
                fn deserialize<R: Read>(stream: &mut R) -> Result<$type> {
                    let mut bytes = [0_u8; mem::size_of::<$type>()];
                    stream.read_exact(&mut bytes)?;
                    Ok(<$type>::from_ne_bytes(bytes))
                }

                fn deserialize_elements<R: Read>(len: usize, stream: &mut R) -> Result<Vec<$type>> {
                    const SIZE: usize = mem::size_of::<$type>();
                    let byte_len = len.checked_mul(SIZE)
                        .ok_or_else(|| Error::corruption("sequence length overflows"))?;
                    let bytes = read_bytes(stream, byte_len)?;
                    Ok(bytes.chunks_exact(SIZE)
                       .map(|chunk| {
                           let mut elt = [0_u8; SIZE];
                           elt.copy_from_slice(chunk);
                           <$type>::from_ne_bytes(elt)
                       })
                       .collect())
                }
            }
        )*
    }
}

implement_serialize_for_simple!(u8, u16, u32, u64,
                                i8, i16, i32, i64,
                                f32, f64);

impl Serialize for usize {
    fn serialize<W: Write>(&self, stream: &mut W) -> Result<()> {
        (*self as u64).serialize(stream)
    }
}

impl Deserialize for usize {
    fn deserialize<R: Read>(stream: &mut R) -> Result<usize> {
        Ok(u64::deserialize(stream)? as usize)
    }
}

impl Serialize for isize {
    fn serialize<W: Write>(&self, stream: &mut W) -> Result<()> {
        (*self as i64).serialize(stream)
    }
}

impl Deserialize for isize {
    fn deserialize<R: Read>(stream: &mut R) -> Result<isize> {
        Ok(i64::deserialize(stream)? as isize)
    }
}

impl Serialize for bool {
    fn serialize<W: Write>(&self, stream: &mut W) -> Result<()> {
        (*self as u8).serialize(stream)
    }
}

impl Deserialize for bool {
    fn deserialize<R: Read>(stream: &mut R) -> Result<bool> {
        match u8::deserialize(stream)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::corruption(format!("invalid boolean byte {}", other))),
        }
    }
}

/// References are transparent to serialization: `&T` is serialized just like `T`.
impl<T: Serialize + ?Sized> Serialize for &T {
    fn serialize<W: Write>(&self, stream: &mut W) -> Result<()> {
        (**self).serialize(stream)
    }
}

/// Slices are written as a length followed by the elements.
impl<T: Serialize> Serialize for [T] {
    fn serialize<W: Write>(&self, stream: &mut W) -> Result<()> {
        write_len(stream, self.len())?;
        // Let the element type choose how to write the slice.
        T::serialize_elements(self, stream)
    }
}

impl<T: Serialize> Serialize for Vec<T> {
    fn serialize<W: Write>(&self, stream: &mut W) -> Result<()> {
        self[..].serialize(stream)
    }
}

impl<T: Deserialize> Deserialize for Vec<T> {
    fn deserialize<R: Read>(stream: &mut R) -> Result<Vec<T>> {
        let len = read_len(stream)?;
        T::deserialize_elements(len, stream)
    }
}

impl<T: Serialize + Copy, const N: usize> Serialize for [T; N] {
    fn serialize<W: Write>(&self, stream: &mut W) -> Result<()> {
        // Fixed-size arrays need no length.
        T::serialize_elements(&self[..], stream)
    }
}

impl<T: Deserialize + Copy + Default, const N: usize> Deserialize for [T; N] {
    fn deserialize<R: Read>(stream: &mut R) -> Result<[T; N]> {
        let mut array = [T::default(); N];
        for elt in array.iter_mut() {
            *elt = T::deserialize(stream)?;
        }
        Ok(array)
    }
}

impl Serialize for str {
    fn serialize<W: Write>(&self, stream: &mut W) -> Result<()> {
        self.as_bytes().serialize(stream)
    }
}

impl Serialize for String {
    fn serialize<W: Write>(&self, stream: &mut W) -> Result<()> {
        self.as_str().serialize(stream)
    }
}

impl Deserialize for String {
    fn deserialize<R: Read>(stream: &mut R) -> Result<String> {
        let bytes = Vec::<u8>::deserialize(stream)?;
        String::from_utf8(bytes).map_err(|_| Error::corruption("string is not valid UTF-8"))
    }
}

/// `Option<T>` is a presence flag, followed by the value if present.
impl<T: Serialize> Serialize for Option<T> {
    fn serialize<W: Write>(&self, stream: &mut W) -> Result<()> {
        match self {
            None => false.serialize(stream),
            Some(value) => {
                true.serialize(stream)?;
                value.serialize(stream)
            }
        }
    }
}

impl<T: Deserialize> Deserialize for Option<T> {
    fn deserialize<R: Read>(stream: &mut R) -> Result<Option<T>> {
        if bool::deserialize(stream)? {
            Ok(Some(T::deserialize(stream)?))
        } else {
            Ok(None)
        }
    }
}

impl<A: Serialize, B: Serialize> Serialize for (A, B) {
    fn serialize<W: Write>(&self, stream: &mut W) -> Result<()> {
        self.0.serialize(stream)?;
        self.1.serialize(stream)
    }
}

impl<A: Deserialize, B: Deserialize> Deserialize for (A, B) {
    fn deserialize<R: Read>(stream: &mut R) -> Result<(A, B)> {
        let a = A::deserialize(stream)?;
        let b = B::deserialize(stream)?;
        Ok((a, b))
    }
}

/// Maps are written as a length followed by key/value pairs.
impl<K: Serialize, V: Serialize> Serialize for BTreeMap<K, V> {
    fn serialize<W: Write>(&self, stream: &mut W) -> Result<()> {
        write_len(stream, self.len())?;
        for (key, value) in self {
            key.serialize(stream)?;
            value.serialize(stream)?;
        }
        Ok(())
    }
}

impl<K: Deserialize + Ord, V: Deserialize> Deserialize for BTreeMap<K, V> {
    fn deserialize<R: Read>(stream: &mut R) -> Result<BTreeMap<K, V>> {
        let len = read_len(stream)?;
        let mut map = BTreeMap::new();
        for _ in 0..len {
            let key = K::deserialize(stream)?;
            let value = V::deserialize(stream)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

/// A named marker written at structural boundaries of a stream.
///
/// If reading a checkpoint finds anything other than the expected tag, the
/// reader has lost its place in the stream, and nothing after that point can
/// be trusted.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Checkpoint(pub &'static str);

impl Checkpoint {
    /// Write the tag, as a length-prefixed block including a trailing NUL.
    pub fn write<W: Write>(&self, stream: &mut W) -> Result<()> {
        write_len(stream, self.0.len() + 1)?;
        stream.write_all(self.0.as_bytes())?;
        stream.write_all(&[0])?;
        Ok(())
    }

    /// Read a tag from `stream` and check that it is this checkpoint.
    pub fn read<R: Read>(&self, stream: &mut R) -> Result<()> {
        let expected_len = self.0.len() + 1;
        let len = read_len(stream)?;
        if len != expected_len {
            return Err(Error::corruption(format!(
                "expected checkpoint {:?}, found a {}-byte token",
                self.0, len
            )));
        }

        let token = read_bytes(stream, len)?;
        if &token[..len - 1] != self.0.as_bytes() || token[len - 1] != 0 {
            return Err(Error::corruption(format!(
                "expected checkpoint {:?}, found {:?}",
                self.0,
                String::from_utf8_lossy(&token[..len - 1])
            )));
        }
        Ok(())
    }
}

/// Serialize `value` into a fresh byte vector.
pub fn to_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    value.serialize(&mut bytes)?;
    Ok(bytes)
}

/// Deserialize a `T` from the front of `bytes`, requiring that all of it be consumed.
pub fn from_bytes<T: Deserialize>(mut bytes: &[u8]) -> Result<T> {
    let value = T::deserialize(&mut bytes)?;
    if !bytes.is_empty() {
        return Err(Error::corruption(format!("{} trailing bytes", bytes.len())));
    }
    Ok(value)
}

impl From<leb128::read::Error> for Error {
    fn from(err: leb128::read::Error) -> Error {
        match err {
            leb128::read::Error::IoError(err) => Error::from(err),
            leb128::read::Error::Overflow => Error::corruption("LEB128 value overflows"),
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Io(err) => err,
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: Serialize + Deserialize + PartialEq + std::fmt::Debug>(value: T) {
        let bytes = to_bytes(&value).unwrap();
        let back: T = from_bytes(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_primitives() {
        round_trip(0x12345678_u32);
        round_trip(-7_i32);
        round_trip(1.5_f32);
        round_trip(-0.25_f64);
        round_trip(true);
        round_trip(usize::max_value());
        round_trip(-3_isize);
        round_trip([1.0_f64, 2.0, 3.0, 4.0]);
        round_trip(String::from("It's a trap!"));
    }

    #[test]
    fn test_containers() {
        round_trip(Vec::<u8>::new());
        round_trip(vec![1_u8, 2, 3, 250]);
        round_trip(vec![String::from("a"), String::new()]);

        let mut map = BTreeMap::new();
        map.insert(3_u32, Some(vec![1_u8, 2]));
        map.insert(5_u32, None);
        map.insert(9_u32, Some(vec![]));
        round_trip(map);

        let mut pairs = BTreeMap::new();
        pairs.insert((gleam::gl::TEXTURE0, gleam::gl::TEXTURE_2D), 7_u32);
        round_trip(pairs);
    }

    #[test]
    fn test_lengths_are_leb128() {
        let bytes = to_bytes(&vec![0_u8; 200]).unwrap();
        assert_eq!(&bytes[..2], &[0xc8, 0x01]);
        assert_eq!(bytes.len(), 202);
    }

    #[test]
    fn test_truncated_block() {
        let mut bytes = to_bytes(&vec![7_u8; 10]).unwrap();
        bytes.truncate(6);
        let result: Result<Vec<u8>> = from_bytes(&bytes);
        assert!(matches!(result, Err(Error::StreamCorruption(_))));
    }

    #[test]
    fn test_bad_bool() {
        let result: Result<bool> = from_bytes(&[2]);
        assert!(matches!(result, Err(Error::StreamCorruption(_))));
    }

    #[test]
    fn test_checkpoint() {
        let mut bytes = Vec::new();
        Checkpoint("TexturesBegin").write(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 1 + "TexturesBegin".len() + 1);
        assert!(Checkpoint("TexturesBegin").read(&mut &bytes[..]).is_ok());

        // Same length, different text.
        let mut bytes = Vec::new();
        Checkpoint("A").write(&mut bytes).unwrap();
        assert!(matches!(Checkpoint("B").read(&mut &bytes[..]),
                         Err(Error::StreamCorruption(_))));

        // Different length.
        assert!(matches!(Checkpoint("BuffersEnd").read(&mut &bytes[..]),
                         Err(Error::StreamCorruption(_))));
    }

    #[test]
    fn test_checkpoint_then_value() {
        let mut bytes = Vec::new();
        Checkpoint("GLTrace").write(&mut bytes).unwrap();
        42_u32.serialize(&mut bytes).unwrap();

        let mut stream = &bytes[..];
        Checkpoint("GLTrace").read(&mut stream).unwrap();
        assert_eq!(u32::deserialize(&mut stream).unwrap(), 42);
        assert!(stream.is_empty());
    }
}
