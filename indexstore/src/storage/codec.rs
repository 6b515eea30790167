//! Binary encoding of keys and values in log records.
//!
//! Integers are fixed-width big-endian. Variable-length data (strings, byte
//! vectors) carries a `u32` big-endian length prefix. Decoding advances the
//! input slice past what it consumed, so composite types decode field by field.
//!
//! ```text
//! i64 42        -> 00 00 00 00 00 00 00 2a
//! String "ab"   -> 00 00 00 02 61 62
//! Option None   -> 00
//! Option Some 7 -> 01 <7>
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Errors from decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The input ended before the value did.
    Truncated { needed: usize, available: usize },
    /// A string was not valid UTF-8.
    InvalidUtf8,
    /// An enum discriminant byte was not recognized.
    InvalidTag(u8),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated { needed, available } => {
                write!(f, "truncated input: need {needed} bytes, have {available}")
            }
            Self::InvalidUtf8 => write!(f, "string is not valid UTF-8"),
            Self::InvalidTag(tag) => write!(f, "invalid tag byte: 0x{tag:02x}"),
        }
    }
}

impl std::error::Error for CodecError {}

/// A type that can be written to and read back from a log.
pub trait Codec: Sized {
    /// Append the encoding of `self` to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Decode a value from the front of `input`, advancing it.
    fn decode(input: &mut &[u8]) -> Result<Self, CodecError>;

    /// Encode into a fresh buffer.
    #[must_use]
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

/// Split `len` bytes off the front of `input`.
pub fn take<'a>(input: &mut &'a [u8], len: usize) -> Result<&'a [u8], CodecError> {
    if input.len() < len {
        return Err(CodecError::Truncated {
            needed: len,
            available: input.len(),
        });
    }
    let (head, tail) = input.split_at(len);
    *input = tail;
    Ok(head)
}

fn take_array<const N: usize>(input: &mut &[u8]) -> Result<[u8; N], CodecError> {
    let mut array = [0u8; N];
    array.copy_from_slice(take(input, N)?);
    Ok(array)
}

macro_rules! impl_codec_for_int {
    ($($ty:ty),*) => {
        $(
            impl Codec for $ty {
                fn encode(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_be_bytes());
                }

                fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
                    take_array(input).map(<$ty>::from_be_bytes)
                }
            }
        )*
    };
}

impl_codec_for_int!(u8, i32, u32, i64, u64);

impl Codec for bool {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        match u8::decode(input)? {
            0 => Ok(false),
            1 => Ok(true),
            tag => Err(CodecError::InvalidTag(tag)),
        }
    }
}

// Lengths are u32 on disk; a single key or value over 4 GiB is not supported.
#[allow(clippy::cast_possible_truncation)]
fn encode_len(len: usize, out: &mut Vec<u8>) {
    (len as u32).encode(out);
}

#[allow(clippy::cast_possible_truncation)]
fn decode_len(input: &mut &[u8]) -> Result<usize, CodecError> {
    u32::decode(input).map(|len| len as usize)
}

impl Codec for Vec<u8> {
    fn encode(&self, out: &mut Vec<u8>) {
        encode_len(self.len(), out);
        out.extend_from_slice(self);
    }

    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        let len = decode_len(input)?;
        Ok(take(input, len)?.to_vec())
    }
}

impl Codec for String {
    fn encode(&self, out: &mut Vec<u8>) {
        encode_len(self.len(), out);
        out.extend_from_slice(self.as_bytes());
    }

    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        let len = decode_len(input)?;
        let bytes = take(input, len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }
}

impl<T: Codec> Codec for Option<T> {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            None => out.push(0),
            Some(value) => {
                out.push(1);
                value.encode(out);
            }
        }
    }

    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        match u8::decode(input)? {
            0 => Ok(None),
            1 => T::decode(input).map(Some),
            tag => Err(CodecError::InvalidTag(tag)),
        }
    }
}

impl<A: Codec, B: Codec> Codec for (A, B) {
    fn encode(&self, out: &mut Vec<u8>) {
        self.0.encode(out);
        self.1.encode(out);
    }

    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok((A::decode(input)?, B::decode(input)?))
    }
}

impl<A: Codec, B: Codec, C: Codec> Codec for (A, B, C) {
    fn encode(&self, out: &mut Vec<u8>) {
        self.0.encode(out);
        self.1.encode(out);
        self.2.encode(out);
    }

    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        Ok((A::decode(input)?, B::decode(input)?, C::decode(input)?))
    }
}

/// Milliseconds since the Unix epoch. Times before the epoch encode as 0.
impl Codec for SystemTime {
    // Millisecond counts past u64::MAX are hundreds of millions of years out.
    #[allow(clippy::cast_possible_truncation)]
    fn encode(&self, out: &mut Vec<u8>) {
        let millis = self
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64);
        millis.encode(out);
    }

    fn decode(input: &mut &[u8]) -> Result<Self, CodecError> {
        let millis = u64::decode(input)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}
