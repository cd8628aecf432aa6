//! Fixed Dubbo frame header layout.
//!
//! Every Dubbo frame starts with a 16-byte header. Only two fields matter to
//! the bridge: the magic value at offset 0 and the big-endian body length at
//! offset 12. The remaining bytes (flags, status, request id) are opaque.

use crate::byte_order::{read_network_u16, read_network_u32};

/// Size of the fixed frame header in bytes.
pub const HEADER_SIZE: usize = 16;
/// Width of the magic value in bytes.
pub const MAGIC_SIZE: usize = 2;
/// Magic value opening every Dubbo frame.
pub const MAGIC: u16 = 0xdabb;
/// Offset of the 4-byte body length field.
pub const LENGTH_OFFSET: usize = 12;
/// Diagnostic reported when the response is not Dubbo traffic.
pub const PROTOCOL_ERROR_MESSAGE: &str = "Not dubbo message";

/// Result of inspecting the bytes buffered so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeStatus {
    /// A structurally valid header is available.
    Ok,
    /// Fewer than [`HEADER_SIZE`] bytes are buffered.
    NeedMoreData,
    /// The magic value does not match [`MAGIC`].
    InvalidHeader,
}

/// Inspect the leading bytes of a response buffer.
///
/// Content is irrelevant until [`HEADER_SIZE`] bytes are available.
///
/// # Examples
///
/// ```
/// use dubbo_tcp_upstream::frame::{DecodeStatus, decode_frame};
///
/// assert_eq!(decode_frame(&[0xda, 0xbb]), DecodeStatus::NeedMoreData);
/// assert_eq!(decode_frame(&[0u8; 16]), DecodeStatus::InvalidHeader);
/// ```
#[must_use]
pub fn decode_frame(buf: &[u8]) -> DecodeStatus {
    match FrameHeader::parse(buf) {
        None => DecodeStatus::NeedMoreData,
        Some(header) if header.has_valid_magic() => DecodeStatus::Ok,
        Some(_) => DecodeStatus::InvalidHeader,
    }
}

/// Read-only view over a buffered frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    raw: [u8; HEADER_SIZE],
}

impl FrameHeader {
    /// Copy the header out of `buf`.
    ///
    /// Returns `None` while fewer than [`HEADER_SIZE`] bytes are available.
    #[must_use]
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let raw: [u8; HEADER_SIZE] = buf.get(..HEADER_SIZE)?.try_into().ok()?;
        Some(Self { raw })
    }

    /// Magic value stored in the first two bytes.
    #[must_use]
    pub fn magic(&self) -> u16 { read_network_u16([self.raw[0], self.raw[1]]) }

    /// Whether the magic value identifies a Dubbo frame.
    #[must_use]
    pub fn has_valid_magic(&self) -> bool { self.magic() == MAGIC }

    /// Declared size of the body following the header.
    #[must_use]
    pub fn body_len(&self) -> u32 {
        let mut field = [0u8; 4];
        field.copy_from_slice(&self.raw[LENGTH_OFFSET..HEADER_SIZE]);
        read_network_u32(field)
    }

    /// Total frame size, header included.
    #[must_use]
    pub fn frame_len(&self) -> u64 { HEADER_SIZE as u64 + u64::from(self.body_len()) }

    /// Raw header bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; HEADER_SIZE] { &self.raw }
}
