use super::{
    DecodeError, DecodeStatus, Decoder, DecoderState, Encode, FrameLimits, Framed, StringDecoder,
    Then,
};
use crate::buffer::FrameBuffer;
use std::fmt;

/// A chat line: `[string login][string content]` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message {
    login: String,
    content: String,
}

impl Message {
    pub fn new(login: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            content: content.into(),
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.login, self.content)
    }
}

impl Encode for Message {
    fn encoded_len(&self) -> usize {
        self.login.encoded_len() + self.content.encoded_len()
    }

    fn encode(&self, dst: &mut Vec<u8>) {
        self.login.encode(dst);
        self.content.encode(dst);
    }

    fn max_encoded_len(limits: &FrameLimits) -> Option<usize> {
        <(String, String)>::max_encoded_len(limits)
    }
}

impl Framed for Message {
    type Decoder = MessageDecoder;

    fn decoder(limits: &FrameLimits) -> Self::Decoder {
        MessageDecoder::new(limits)
    }
}

/// Login decoder followed by content decoder.
pub struct MessageDecoder {
    fields: Then<StringDecoder, StringDecoder>,
    value: Option<Message>,
}

impl MessageDecoder {
    pub fn new(limits: &FrameLimits) -> Self {
        Self {
            fields: Then::new(
                StringDecoder::new(limits.max_string_len),
                StringDecoder::new(limits.max_string_len),
            ),
            value: None,
        }
    }
}

impl Decoder for MessageDecoder {
    type Item = Message;

    fn process(&mut self, buffer: &mut FrameBuffer) -> Result<DecodeStatus, DecodeError> {
        let status = self.fields.process(buffer)?;
        if status == DecodeStatus::Complete {
            let (login, content) = self.fields.value()?;
            self.value = Some(Message::new(login.as_str(), content.as_str()));
        }
        Ok(status)
    }

    fn value(&self) -> Result<&Message, DecodeError> {
        self.fields.state().ensure_done()?;
        self.value
            .as_ref()
            .ok_or(DecodeError::InvalidState(self.fields.state()))
    }

    fn reset(&mut self) {
        self.fields.reset();
        self.value = None;
    }

    fn state(&self) -> DecoderState {
        self.fields.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::test_support::feed_chunks;
    use crate::codec::FrameError;

    #[test]
    fn test_message_wire_layout() {
        let bytes = Message::new("bob", "yo").to_bytes();
        assert_eq!(bytes, vec![0, 0, 0, 3, b'b', b'o', b'b', 0, 0, 0, 2, b'y', b'o']);
    }

    #[test]
    fn test_message_split_on_every_byte() {
        let message = Message::new("alice", "hi");
        let bytes = message.to_bytes();
        let cuts: Vec<usize> = (1..bytes.len()).collect();

        let mut decoder = Message::decoder(&FrameLimits::default());
        let statuses = feed_chunks(&mut decoder, &bytes, &cuts);
        assert!(statuses[..statuses.len() - 1]
            .iter()
            .all(|status| *status == DecodeStatus::NeedMoreData));
        assert_eq!(statuses.last(), Some(&DecodeStatus::Complete));
        assert_eq!(decoder.value().unwrap(), &message);
    }

    #[test]
    fn test_two_messages_in_one_chunk() {
        let mut bytes = Message::new("a", "1").to_bytes();
        bytes.extend(Message::new("b", "2").to_bytes());
        let mut buffer = FrameBuffer::from_slice(&bytes);

        let mut decoder = Message::decoder(&FrameLimits::default());
        assert_eq!(decoder.process(&mut buffer).unwrap(), DecodeStatus::Complete);
        assert_eq!(decoder.value().unwrap().login(), "a");
        decoder.reset();
        assert_eq!(decoder.process(&mut buffer).unwrap(), DecodeStatus::Complete);
        assert_eq!(decoder.value().unwrap(), &Message::new("b", "2"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_oversized_content_is_malformed() {
        let mut bytes = String::from("alice").to_bytes();
        bytes.extend_from_slice(&2000i32.to_be_bytes());
        let mut buffer = FrameBuffer::from_slice(&bytes);

        let mut decoder = Message::decoder(&FrameLimits::new(1020));
        assert_eq!(
            decoder.process(&mut buffer).unwrap(),
            DecodeStatus::Malformed(FrameError::LengthExceedsLimit {
                declared: 2000,
                limit: 1020
            })
        );
        assert_eq!(decoder.state(), DecoderState::Error);
    }
}
