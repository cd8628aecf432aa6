//! Dubbo frame builders.

use bytes::{BufMut, BytesMut};
use dubbo_tcp_upstream::frame::{HEADER_SIZE, MAGIC};

/// Header fields a test may want to vary.
///
/// The bridge only inspects the magic and body length; the remaining fields
/// exist so fixtures look like real traffic.
#[derive(Clone, Copy, Debug)]
pub struct DubboHeader {
    pub magic: u16,
    pub flags: u8,
    pub status: u8,
    pub request_id: u64,
}

impl Default for DubboHeader {
    fn default() -> Self {
        Self {
            magic: MAGIC,
            // two-way response, hessian2
            flags: 0x02,
            status: 20,
            request_id: 1,
        }
    }
}

/// Encode a frame with `header` and `body`, deriving the length field from
/// the body.
///
/// # Panics
///
/// Panics if `body` is longer than `u32::MAX` bytes.
#[must_use]
pub fn frame_with_header(header: DubboHeader, body: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
    buf.put_u16(header.magic);
    buf.put_u8(header.flags);
    buf.put_u8(header.status);
    buf.put_u64(header.request_id);
    buf.put_u32(u32::try_from(body.len()).expect("body length fits in u32"));
    buf.put_slice(body);
    buf.to_vec()
}

/// Encode a well-formed response frame carrying `body`.
#[must_use]
pub fn dubbo_frame(body: &[u8]) -> Vec<u8> { frame_with_header(DubboHeader::default(), body) }

/// Cut `bytes` into chunks at the given offsets.
///
/// Offsets past the end are ignored; the final chunk holds the remainder.
#[must_use]
pub fn split_chunks(bytes: &[u8], offsets: &[usize]) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for &offset in offsets {
        if offset <= start || offset >= bytes.len() {
            continue;
        }
        chunks.push(bytes[start..offset].to_vec());
        start = offset;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}
