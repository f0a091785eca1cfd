use super::{DecodeError, DecodeStatus, Decoder, DecoderState, FrameError, IntDecoder};
use crate::buffer::FrameBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Length,
    Payload { len: usize },
}

/// Decodes `[i32 length][length bytes of UTF-8]`.
///
/// The declared length is checked against `max_len` before the payload
/// buffer is sized, so an oversized frame never causes an allocation.
#[derive(Debug)]
pub struct StringDecoder {
    length: IntDecoder<i32>,
    payload: Vec<u8>,
    field: Field,
    max_len: usize,
    state: DecoderState,
    value: Option<String>,
}

impl StringDecoder {
    pub fn new(max_len: usize) -> Self {
        Self {
            length: IntDecoder::new(),
            payload: Vec::new(),
            field: Field::Length,
            max_len,
            state: DecoderState::Waiting,
            value: None,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    fn fail(&mut self, error: FrameError) -> DecodeStatus {
        self.state = DecoderState::Error;
        DecodeStatus::Malformed(error)
    }

    fn check_length(&self, declared: i32) -> Result<usize, FrameError> {
        let declared = usize::try_from(declared).map_err(|_| FrameError::NegativeLength(declared))?;
        if declared > self.max_len {
            return Err(FrameError::LengthExceedsLimit {
                declared,
                limit: self.max_len,
            });
        }
        Ok(declared)
    }
}

impl Decoder for StringDecoder {
    type Item = String;

    fn process(&mut self, buffer: &mut FrameBuffer) -> Result<DecodeStatus, DecodeError> {
        self.state.ensure_waiting()?;

        let len = match self.field {
            Field::Payload { len } => len,
            Field::Length => {
                if self.length.process(buffer)? == DecodeStatus::NeedMoreData {
                    return Ok(DecodeStatus::NeedMoreData);
                }
                let len = match self.check_length(*self.length.value()?) {
                    Ok(len) => len,
                    Err(error) => return Ok(self.fail(error)),
                };
                self.payload.clear();
                self.payload.reserve(len);
                self.field = Field::Payload { len };
                len
            }
        };

        let missing = len - self.payload.len();
        if missing > 0 {
            let mut view = buffer.readable();
            let take = missing.min(view.remaining());
            self.payload.extend_from_slice(&view.as_slice()[..take]);
            view.consume(take);
        }
        if self.payload.len() < len {
            return Ok(DecodeStatus::NeedMoreData);
        }

        match String::from_utf8(std::mem::take(&mut self.payload)) {
            Ok(text) => {
                self.value = Some(text);
                self.state = DecoderState::Done;
                Ok(DecodeStatus::Complete)
            }
            Err(error) => Ok(self.fail(FrameError::InvalidUtf8(error.utf8_error()))),
        }
    }

    fn value(&self) -> Result<&String, DecodeError> {
        self.state.ensure_done()?;
        self.value
            .as_ref()
            .ok_or(DecodeError::InvalidState(self.state))
    }

    fn reset(&mut self) {
        self.length.reset();
        self.payload.clear();
        self.field = Field::Length;
        self.value = None;
        self.state = DecoderState::Waiting;
    }

    fn state(&self) -> DecoderState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::test_support::feed_chunks;
    use crate::codec::{Encode, DEFAULT_MAX_STRING_LEN};

    fn frame_with_length(len: i32, payload: &[u8]) -> Vec<u8> {
        let mut bytes = len.to_be_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_empty_string_completes_immediately() {
        let mut buffer = FrameBuffer::from_slice(&[0, 0, 0, 0]);
        let mut decoder = StringDecoder::new(DEFAULT_MAX_STRING_LEN);
        assert_eq!(decoder.process(&mut buffer).unwrap(), DecodeStatus::Complete);
        assert_eq!(decoder.value().unwrap(), "");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_length_at_limit_is_accepted() {
        let payload = vec![b'x'; 1020];
        let mut decoder = StringDecoder::new(1020);
        let statuses = feed_chunks(&mut decoder, &frame_with_length(1020, &payload), &[4]);
        assert_eq!(statuses.last(), Some(&DecodeStatus::Complete));
        assert_eq!(decoder.value().unwrap().len(), 1020);
    }

    #[test]
    fn test_length_over_limit_is_malformed() {
        let mut buffer = FrameBuffer::from_slice(&1021i32.to_be_bytes());
        let mut decoder = StringDecoder::new(1020);
        assert_eq!(
            decoder.process(&mut buffer).unwrap(),
            DecodeStatus::Malformed(FrameError::LengthExceedsLimit {
                declared: 1021,
                limit: 1020
            })
        );
        assert_eq!(decoder.state(), DecoderState::Error);
        assert_eq!(decoder.payload.capacity(), 0);
    }

    #[test]
    fn test_negative_length_is_malformed() {
        let mut buffer = FrameBuffer::from_slice(&(-1i32).to_be_bytes());
        let mut decoder = StringDecoder::new(1020);
        assert_eq!(
            decoder.process(&mut buffer).unwrap(),
            DecodeStatus::Malformed(FrameError::NegativeLength(-1))
        );
        assert_eq!(
            decoder.process(&mut buffer),
            Err(DecodeError::InvalidState(DecoderState::Error))
        );
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let mut buffer = FrameBuffer::from_slice(&frame_with_length(2, &[0xC3, 0x28]));
        let mut decoder = StringDecoder::new(16);
        assert!(matches!(
            decoder.process(&mut buffer).unwrap(),
            DecodeStatus::Malformed(FrameError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_reset_accepts_a_fresh_frame() {
        let mut decoder = StringDecoder::new(64);
        let mut buffer = FrameBuffer::from_slice(&String::from("first").to_bytes());
        assert_eq!(decoder.process(&mut buffer).unwrap(), DecodeStatus::Complete);

        decoder.reset();
        let statuses = feed_chunks(&mut decoder, &String::from("second").to_bytes(), &[2, 7]);
        assert_eq!(statuses.last(), Some(&DecodeStatus::Complete));
        assert_eq!(decoder.value().unwrap(), "second");
    }

    #[test]
    fn test_payload_stops_at_frame_boundary() {
        let mut bytes = String::from("ab").to_bytes();
        bytes.extend_from_slice(&[1, 2, 3]);
        let mut buffer = FrameBuffer::from_slice(&bytes);
        let mut decoder = StringDecoder::new(64);
        assert_eq!(decoder.process(&mut buffer).unwrap(), DecodeStatus::Complete);
        assert_eq!(buffer.pending(), &[1, 2, 3]);
    }
}
