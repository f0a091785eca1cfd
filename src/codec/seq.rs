use super::{DecodeError, DecodeStatus, Decoder, DecoderState};
use crate::buffer::FrameBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    First,
    Second,
}

/// Runs `A` then `B` over the same byte stream.
///
/// `B` starts at the exact byte where `A` completed, within the same
/// `process` call when the input allows it.
pub struct Then<A: Decoder, B: Decoder> {
    first: A,
    second: B,
    stage: Stage,
    state: DecoderState,
    value: Option<(A::Item, B::Item)>,
}

impl<A: Decoder, B: Decoder> Then<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            stage: Stage::First,
            state: DecoderState::Waiting,
            value: None,
        }
    }

    fn fail(&mut self, status: DecodeStatus) -> DecodeStatus {
        self.state = DecoderState::Error;
        status
    }
}

impl<A, B> Decoder for Then<A, B>
where
    A: Decoder,
    B: Decoder,
    A::Item: Clone,
    B::Item: Clone,
{
    type Item = (A::Item, B::Item);

    fn process(&mut self, buffer: &mut FrameBuffer) -> Result<DecodeStatus, DecodeError> {
        self.state.ensure_waiting()?;

        if self.stage == Stage::First {
            match self.first.process(buffer)? {
                DecodeStatus::Complete => self.stage = Stage::Second,
                DecodeStatus::NeedMoreData => return Ok(DecodeStatus::NeedMoreData),
                malformed @ DecodeStatus::Malformed(_) => return Ok(self.fail(malformed)),
            }
        }

        match self.second.process(buffer)? {
            DecodeStatus::Complete => {
                let pair = (self.first.value()?.clone(), self.second.value()?.clone());
                self.value = Some(pair);
                self.state = DecoderState::Done;
                Ok(DecodeStatus::Complete)
            }
            DecodeStatus::NeedMoreData => Ok(DecodeStatus::NeedMoreData),
            malformed @ DecodeStatus::Malformed(_) => Ok(self.fail(malformed)),
        }
    }

    fn value(&self) -> Result<&Self::Item, DecodeError> {
        self.state.ensure_done()?;
        self.value
            .as_ref()
            .ok_or(DecodeError::InvalidState(self.state))
    }

    fn reset(&mut self) {
        self.first.reset();
        self.second.reset();
        self.stage = Stage::First;
        self.value = None;
        self.state = DecoderState::Waiting;
    }

    fn state(&self) -> DecoderState {
        self.state
    }
}

/// Applies `f` to the inner decoder's value once it completes.
pub struct Map<D, F, U> {
    inner: D,
    f: F,
    value: Option<U>,
}

impl<D, F, U> Map<D, F, U>
where
    D: Decoder,
    F: Fn(&D::Item) -> U,
{
    pub fn new(inner: D, f: F) -> Self {
        Self {
            inner,
            f,
            value: None,
        }
    }
}

impl<D, F, U> Decoder for Map<D, F, U>
where
    D: Decoder,
    F: Fn(&D::Item) -> U,
{
    type Item = U;

    fn process(&mut self, buffer: &mut FrameBuffer) -> Result<DecodeStatus, DecodeError> {
        let status = self.inner.process(buffer)?;
        if status == DecodeStatus::Complete {
            self.value = Some((self.f)(self.inner.value()?));
        }
        Ok(status)
    }

    fn value(&self) -> Result<&U, DecodeError> {
        self.inner.state().ensure_done()?;
        self.value
            .as_ref()
            .ok_or(DecodeError::InvalidState(self.inner.state()))
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.value = None;
    }

    fn state(&self) -> DecoderState {
        self.inner.state()
    }
}
