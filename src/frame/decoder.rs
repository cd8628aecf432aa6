//! Incremental validation of Dubbo response bytes.
//!
//! The decoder walks the response stream frame by frame:
//!
//! - `AwaitingHeader`: fewer than [`HEADER_SIZE`] bytes of the next frame are buffered.
//! - `HeaderValid`: the magic value matched; the declared body length is recorded.
//! - `Forwarding`: header and body bytes are released to the caller until the declared frame
//!   length has been consumed, after which the next header is awaited.
//!
//! In [`FramingMode::Streaming`] bytes are released as soon as they are known
//! to belong to a validated frame. [`FramingMode::WholeFrame`] holds them back
//! until the declared body is complete.

use bytes::{Bytes, BytesMut};
use log::trace;

use super::{
    error::{EofError, FramingError},
    header::{DecodeStatus, FrameHeader, HEADER_SIZE, decode_frame},
};
use crate::config::{DEFAULT_MAX_BUFFERED_BYTES, FramingMode};

#[derive(Clone, Copy, Debug)]
enum State {
    AwaitingHeader,
    Forwarding { header: FrameHeader, remaining: u64 },
}

/// Bytes released by a single [`ResponseDecoder::push`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    /// `Ok` when `data` holds validated bytes, `NeedMoreData` otherwise.
    pub status: DecodeStatus,
    /// Bytes ready to forward, in arrival order.
    pub data: Bytes,
    /// Headers validated while processing this chunk.
    pub headers_validated: u64,
}

/// Response accumulation buffer plus the frame validation state machine.
#[derive(Debug)]
pub struct ResponseDecoder {
    buffer: BytesMut,
    state: State,
    mode: FramingMode,
    max_buffered: usize,
    frames_validated: u64,
}

impl Default for ResponseDecoder {
    fn default() -> Self { Self::new(FramingMode::default(), DEFAULT_MAX_BUFFERED_BYTES) }
}

impl ResponseDecoder {
    /// Create a decoder.
    ///
    /// `max_buffered` is raised to at least [`HEADER_SIZE`] so a header can
    /// always be assembled.
    #[must_use]
    pub fn new(mode: FramingMode, max_buffered: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(HEADER_SIZE),
            state: State::AwaitingHeader,
            mode,
            max_buffered: max_buffered.max(HEADER_SIZE),
            frames_validated: 0,
        }
    }

    /// Append `chunk` and release every byte that can be forwarded.
    ///
    /// A chunk that contains an invalid header is rejected as a whole: no byte
    /// of it is released, even if it also completed an earlier valid frame.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::InvalidMagic`] when a header does not start
    /// with the Dubbo magic value and [`FramingError::BufferOverflow`] when
    /// the bytes held back would exceed the buffer budget.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Decoded, FramingError> {
        self.buffer.extend_from_slice(chunk);

        let mut released = BytesMut::new();
        let mut headers_validated = 0;
        loop {
            match self.state {
                State::AwaitingHeader => match decode_frame(&self.buffer) {
                    DecodeStatus::NeedMoreData => break,
                    DecodeStatus::InvalidHeader => {
                        let found = FrameHeader::parse(&self.buffer).map_or(0, |h| h.magic());
                        return Err(FramingError::InvalidMagic { found });
                    }
                    DecodeStatus::Ok => {
                        let Some(header) = FrameHeader::parse(&self.buffer) else {
                            break;
                        };
                        self.check_frame_budget(&header)?;
                        trace!(
                            "dubbo header validated: body_len={}, frame_len={}",
                            header.body_len(),
                            header.frame_len()
                        );
                        headers_validated += 1;
                        self.state = State::Forwarding {
                            header,
                            remaining: header.frame_len(),
                        };
                    }
                },
                State::Forwarding { header, remaining } => {
                    if self.buffer.is_empty() {
                        break;
                    }
                    let available = self.buffer.len() as u64;
                    match self.mode {
                        FramingMode::Streaming => {
                            let take = remaining.min(available);
                            released.extend_from_slice(&self.buffer.split_to(to_usize(take)));
                            self.advance(header, remaining - take);
                        }
                        FramingMode::WholeFrame => {
                            if available < remaining {
                                break;
                            }
                            released.extend_from_slice(&self.buffer.split_to(to_usize(remaining)));
                            self.advance(header, 0);
                        }
                    }
                }
            }
        }

        if self.buffer.len() > self.max_buffered {
            return Err(FramingError::BufferOverflow {
                size: self.buffer.len(),
                max: self.max_buffered,
            });
        }

        self.frames_validated += headers_validated;
        let status = if released.is_empty() {
            DecodeStatus::NeedMoreData
        } else {
            DecodeStatus::Ok
        };
        Ok(Decoded {
            status,
            data: released.freeze(),
            headers_validated,
        })
    }

    /// Classify the end of the response stream.
    ///
    /// # Errors
    ///
    /// Returns [`EofError::MidHeader`] or [`EofError::MidFrame`] when the
    /// stream stops inside a frame.
    pub fn finish(&self) -> Result<(), EofError> {
        match self.state {
            State::AwaitingHeader if self.buffer.is_empty() => Ok(()),
            State::AwaitingHeader => Err(EofError::mid_header(self.buffer.len())),
            State::Forwarding { header, remaining } => {
                let expected = header.frame_len();
                Err(EofError::MidFrame {
                    bytes_received: expected - remaining + self.buffer.len() as u64,
                    expected,
                })
            }
        }
    }

    /// Header of the frame currently being forwarded, if any.
    #[must_use]
    pub fn current_header(&self) -> Option<FrameHeader> {
        match self.state {
            State::AwaitingHeader => None,
            State::Forwarding { header, .. } => Some(header),
        }
    }

    /// Whether the decoder sits exactly between two frames.
    #[must_use]
    pub fn is_at_frame_boundary(&self) -> bool {
        matches!(self.state, State::AwaitingHeader) && self.buffer.is_empty()
    }

    /// Bytes currently held back.
    #[must_use]
    pub fn buffered_len(&self) -> usize { self.buffer.len() }

    /// Headers validated over the decoder's lifetime.
    #[must_use]
    pub fn frames_validated(&self) -> u64 { self.frames_validated }

    fn advance(&mut self, header: FrameHeader, remaining: u64) {
        self.state = if remaining == 0 {
            State::AwaitingHeader
        } else {
            State::Forwarding { header, remaining }
        };
    }

    fn check_frame_budget(&self, header: &FrameHeader) -> Result<(), FramingError> {
        if self.mode != FramingMode::WholeFrame {
            return Ok(());
        }
        let frame_len = header.frame_len();
        if frame_len > self.max_buffered as u64 {
            return Err(FramingError::BufferOverflow {
                size: usize::try_from(frame_len).unwrap_or(usize::MAX),
                max: self.max_buffered,
            });
        }
        Ok(())
    }
}

/// Narrow a length that is bounded by the buffer size.
fn to_usize(len: u64) -> usize { usize::try_from(len).unwrap_or(usize::MAX) }
