//! Resumable decoders and encoders for the length-prefixed wire format.
//!
//! Every field on the wire is either a fixed-width big-endian integer or a
//! string framed as `[i32 length][length bytes of UTF-8]`. Composite messages
//! are sequences of those fields.
//!
//! A [`Decoder`] consumes bytes from the front of a [`FrameBuffer`] and keeps
//! whatever partial field it has seen in its own storage, so input may arrive
//! in chunks of any size:
//!
//! ```text
//!   process(buf) ──▶ NeedMoreData   (buffer drained, call again later)
//!                ──▶ Complete       (value() is available, bytes after the
//!                                    frame are left in buf untouched)
//!                ──▶ Malformed(e)   (the stream is unusable)
//! ```
//!
//! Decoders compose: [`Then`] runs two decoders back to back and is itself a
//! decoder, [`Map`] transforms the decoded value.
//!
//! ```rust
//! use mill_frame::buffer::FrameBuffer;
//! use mill_frame::codec::{DecodeStatus, Decoder, Encode, FrameLimits, Framed, Message};
//!
//! let message = Message::new("alice", "hi");
//! let bytes = message.to_bytes();
//!
//! let mut decoder = Message::decoder(&FrameLimits::default());
//! let mut buffer = FrameBuffer::with_capacity(64);
//!
//! buffer.put_slice(&bytes[..3]);
//! assert_eq!(decoder.process(&mut buffer).unwrap(), DecodeStatus::NeedMoreData);
//!
//! buffer.put_slice(&bytes[3..]);
//! assert_eq!(decoder.process(&mut buffer).unwrap(), DecodeStatus::Complete);
//! assert_eq!(decoder.value().unwrap(), &message);
//! ```

mod int;
mod message;
mod seq;
mod string;

pub use int::{IntDecoder, WireInt};
pub use message::{Message, MessageDecoder};
pub use seq::{Map, Then};
pub use string::StringDecoder;

use crate::buffer::FrameBuffer;
use std::str::Utf8Error;

/// Largest string payload accepted by default.
pub const DEFAULT_MAX_STRING_LEN: usize = 1020;

/// Outcome of feeding bytes to a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    NeedMoreData,
    Complete,
    Malformed(FrameError),
}

/// Coarse state of a decoder's automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Waiting,
    Done,
    Error,
}

impl DecoderState {
    /// Fails unless the decoder may still accept input.
    pub(crate) fn ensure_waiting(self) -> Result<(), DecodeError> {
        match self {
            DecoderState::Waiting => Ok(()),
            state => Err(DecodeError::InvalidState(state)),
        }
    }

    pub(crate) fn ensure_done(self) -> Result<(), DecodeError> {
        match self {
            DecoderState::Done => Ok(()),
            state => Err(DecodeError::InvalidState(state)),
        }
    }
}

/// Misuse of the decoder API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("decoder called in state {0:?}; reset() is required first")]
    InvalidState(DecoderState),
}

/// Reasons a frame is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("negative string length {0}")]
    NegativeLength(i32),
    #[error("declared string length {declared} exceeds limit {limit}")]
    LengthExceedsLimit { declared: usize, limit: usize },
    #[error("string payload is not valid UTF-8: {0}")]
    InvalidUtf8(Utf8Error),
}

/// Bounds applied while decoding, so a peer cannot make us allocate
/// arbitrarily large buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    pub max_string_len: usize,
}

impl FrameLimits {
    pub fn new(max_string_len: usize) -> Self {
        Self { max_string_len }
    }
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_string_len: DEFAULT_MAX_STRING_LEN,
        }
    }
}

/// A resumable parser that rebuilds one value from an arbitrary chunking of
/// its serialized bytes.
pub trait Decoder {
    type Item;

    /// Consumes bytes from the front of `buffer`, never more than the current
    /// frame needs.
    ///
    /// Returns [`DecodeError::InvalidState`] when called after `Complete` or
    /// `Malformed` without an intervening [`reset`](Self::reset).
    fn process(&mut self, buffer: &mut FrameBuffer) -> Result<DecodeStatus, DecodeError>;

    /// The decoded value. Only available after `process` returned `Complete`.
    fn value(&self) -> Result<&Self::Item, DecodeError>;

    /// Returns the decoder to its initial state.
    fn reset(&mut self);

    fn state(&self) -> DecoderState;

    /// Sequences `next` after this decoder.
    fn then<B: Decoder>(self, next: B) -> Then<Self, B>
    where
        Self: Sized,
    {
        Then::new(self, next)
    }

    /// Transforms the decoded value with `f`.
    fn map<U, F>(self, f: F) -> Map<Self, F, U>
    where
        Self: Sized,
        F: Fn(&Self::Item) -> U,
    {
        Map::new(self, f)
    }
}

/// Serialization into the wire format.
pub trait Encode {
    /// Exact number of bytes [`encode`](Self::encode) appends.
    fn encoded_len(&self) -> usize;

    fn encode(&self, dst: &mut Vec<u8>);

    /// Upper bound on [`encoded_len`](Self::encoded_len) for any value that
    /// respects `limits`, `None` when the type has no such bound.
    fn max_encoded_len(limits: &FrameLimits) -> Option<usize>
    where
        Self: Sized,
    {
        let _ = limits;
        None
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        self.encode(&mut bytes);
        bytes
    }
}

/// A wire type together with the decoder that reads it back.
pub trait Framed: Encode + Sized {
    type Decoder: Decoder<Item = Self>;

    fn decoder(limits: &FrameLimits) -> Self::Decoder;
}

/// Strings longer than `i32::MAX` bytes cannot be framed. Encoding one
/// panics instead of emitting a prefix that disagrees with the payload.
impl Encode for str {
    fn encoded_len(&self) -> usize {
        i32::WIDTH + self.len()
    }

    fn encode(&self, dst: &mut Vec<u8>) {
        let Ok(len) = i32::try_from(self.len()) else {
            panic!("string of {} bytes exceeds the i32 length prefix", self.len());
        };
        len.encode(dst);
        dst.extend_from_slice(self.as_bytes());
    }
}

impl Encode for String {
    fn encoded_len(&self) -> usize {
        self.as_str().encoded_len()
    }

    fn encode(&self, dst: &mut Vec<u8>) {
        self.as_str().encode(dst)
    }

    fn max_encoded_len(limits: &FrameLimits) -> Option<usize> {
        i32::WIDTH.checked_add(limits.max_string_len)
    }
}

impl Framed for String {
    type Decoder = StringDecoder;

    fn decoder(limits: &FrameLimits) -> Self::Decoder {
        StringDecoder::new(limits.max_string_len)
    }
}

impl<A: Encode, B: Encode> Encode for (A, B) {
    fn encoded_len(&self) -> usize {
        self.0.encoded_len() + self.1.encoded_len()
    }

    fn encode(&self, dst: &mut Vec<u8>) {
        self.0.encode(dst);
        self.1.encode(dst);
    }

    fn max_encoded_len(limits: &FrameLimits) -> Option<usize> {
        A::max_encoded_len(limits)?.checked_add(B::max_encoded_len(limits)?)
    }
}

impl<A, B> Framed for (A, B)
where
    A: Framed + Clone,
    B: Framed + Clone,
{
    type Decoder = Then<A::Decoder, B::Decoder>;

    fn decoder(limits: &FrameLimits) -> Self::Decoder {
        Then::new(A::decoder(limits), B::decoder(limits))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Feeds `bytes` to `decoder` split at `cuts`, returning every status seen.
    pub fn feed_chunks<D: Decoder>(
        decoder: &mut D,
        bytes: &[u8],
        cuts: &[usize],
    ) -> Vec<DecodeStatus> {
        let mut buffer = FrameBuffer::with_capacity(bytes.len().max(1));
        let mut statuses = Vec::new();
        let mut start = 0;
        for &end in cuts.iter().chain(std::iter::once(&bytes.len())) {
            assert!(buffer.put_slice(&bytes[start..end]));
            statuses.push(decoder.process(&mut buffer).unwrap());
            start = end;
        }
        statuses
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::feed_chunks;
    use super::*;

    #[test]
    fn test_ten_byte_frame_split_three_two_five() {
        // [len = 6]["abcdef"]
        let frame = String::from("abcdef").to_bytes();
        assert_eq!(frame.len(), 10);

        let mut decoder = String::decoder(&FrameLimits::default());
        let statuses = feed_chunks(&mut decoder, &frame, &[3, 5]);
        assert_eq!(
            statuses,
            vec![
                DecodeStatus::NeedMoreData,
                DecodeStatus::NeedMoreData,
                DecodeStatus::Complete
            ]
        );
        assert_eq!(decoder.value().unwrap(), "abcdef");
    }

    #[test]
    fn test_tuple_frame_of_long_and_short() {
        let frame = (0x0102_0304_0506_0708_i64, -2_i16).to_bytes();
        assert_eq!(frame.len(), 10);

        let mut decoder = <(i64, i16)>::decoder(&FrameLimits::default());
        let statuses = feed_chunks(&mut decoder, &frame, &[3, 5]);
        assert_eq!(statuses.last(), Some(&DecodeStatus::Complete));
        assert_eq!(decoder.value().unwrap(), &(0x0102_0304_0506_0708, -2));
    }

    #[test]
    fn test_str_encoding_uses_byte_length() {
        let bytes = "é".to_bytes();
        assert_eq!(bytes, vec![0, 0, 0, 2, 0xC3, 0xA9]);
    }

    #[test]
    fn test_max_encoded_len_bounds_values_at_the_cap() {
        let limits = FrameLimits::new(16);
        assert_eq!(i32::max_encoded_len(&limits), Some(4));
        assert_eq!(String::max_encoded_len(&limits), Some(20));
        assert_eq!(<(i64, i16)>::max_encoded_len(&limits), Some(10));
        assert_eq!(Message::max_encoded_len(&limits), Some(40));

        let at_cap = Message::new("x".repeat(16), "y".repeat(16));
        assert_eq!(Some(at_cap.encoded_len()), Message::max_encoded_len(&limits));
    }
}
