//! Dubbo response framing: header layout, decode outcomes and the
//! incremental validation state machine.

pub mod decoder;
pub mod error;
pub mod header;

pub use decoder::{Decoded, ResponseDecoder};
pub use error::{EofError, FramingError};
pub use header::{
    DecodeStatus,
    FrameHeader,
    HEADER_SIZE,
    LENGTH_OFFSET,
    MAGIC,
    MAGIC_SIZE,
    PROTOCOL_ERROR_MESSAGE,
    decode_frame,
};

#[cfg(test)]
mod tests;
