use super::{DecodeError, DecodeStatus, Decoder, DecoderState, Encode, FrameLimits, Framed};
use crate::buffer::FrameBuffer;

/// Fixed-width integer with a big-endian wire representation.
pub trait WireInt: Copy {
    const WIDTH: usize;

    /// Builds the value from exactly `WIDTH` bytes.
    fn from_be_slice(bytes: &[u8]) -> Self;

    fn put_be(self, dst: &mut Vec<u8>);
}

macro_rules! wire_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WireInt for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn from_be_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_be_bytes(raw)
                }

                fn put_be(self, dst: &mut Vec<u8>) {
                    dst.extend_from_slice(&self.to_be_bytes());
                }
            }

            impl Encode for $ty {
                fn encoded_len(&self) -> usize {
                    <$ty as WireInt>::WIDTH
                }

                fn encode(&self, dst: &mut Vec<u8>) {
                    self.put_be(dst)
                }

                fn max_encoded_len(_limits: &FrameLimits) -> Option<usize> {
                    Some(<$ty as WireInt>::WIDTH)
                }
            }

            impl Framed for $ty {
                type Decoder = IntDecoder<$ty>;

                fn decoder(_limits: &FrameLimits) -> Self::Decoder {
                    IntDecoder::new()
                }
            }
        )*
    };
}

wire_int!(i8, i16, i32, i64, u8, u16, u32, u64);

/// Accumulates exactly `T::WIDTH` bytes, possibly across many calls.
#[derive(Debug)]
pub struct IntDecoder<T> {
    bytes: [u8; 8],
    filled: usize,
    state: DecoderState,
    value: Option<T>,
}

impl<T: WireInt> IntDecoder<T> {
    pub fn new() -> Self {
        debug_assert!(T::WIDTH <= 8);
        Self {
            bytes: [0; 8],
            filled: 0,
            state: DecoderState::Waiting,
            value: None,
        }
    }
}

impl<T: WireInt> Default for IntDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: WireInt> Decoder for IntDecoder<T> {
    type Item = T;

    fn process(&mut self, buffer: &mut FrameBuffer) -> Result<DecodeStatus, DecodeError> {
        self.state.ensure_waiting()?;

        let copied = buffer
            .readable()
            .copy_into(&mut self.bytes[self.filled..T::WIDTH]);
        self.filled += copied;
        if self.filled < T::WIDTH {
            return Ok(DecodeStatus::NeedMoreData);
        }

        self.value = Some(T::from_be_slice(&self.bytes[..T::WIDTH]));
        self.state = DecoderState::Done;
        Ok(DecodeStatus::Complete)
    }

    fn value(&self) -> Result<&T, DecodeError> {
        self.state.ensure_done()?;
        self.value
            .as_ref()
            .ok_or(DecodeError::InvalidState(self.state))
    }

    fn reset(&mut self) {
        self.filled = 0;
        self.value = None;
        self.state = DecoderState::Waiting;
    }

    fn state(&self) -> DecoderState {
        self.state
    }
}
