//! Unit tests for Dubbo header inspection and the response decoder.

use bytes::Bytes;
use dubbo_tcp_upstream_testing::dubbo_frame as frame;
use proptest::{
    collection::vec,
    prelude::any,
    prop_assert,
    prop_assert_eq,
    test_runner::{Config as ProptestConfig, RngAlgorithm, TestCaseError, TestRng, TestRunner},
};
use rstest::rstest;

use super::*;
use crate::config::FramingMode;

fn deterministic_runner(cases: u32) -> TestRunner {
    let config = ProptestConfig {
        cases,
        ..ProptestConfig::default()
    };
    let rng = TestRng::deterministic_rng(RngAlgorithm::ChaCha);
    TestRunner::new_with_rng(config, rng)
}

fn streaming() -> ResponseDecoder { ResponseDecoder::new(FramingMode::Streaming, 1024) }

fn drain(decoder: &mut ResponseDecoder, chunks: &[&[u8]]) -> Result<Vec<u8>, FramingError> {
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend_from_slice(&decoder.push(chunk)?.data);
    }
    Ok(out)
}

#[test]
fn header_fields_are_read_big_endian() {
    let bytes = frame(&[1, 2, 3, 4, 5]);
    let header = FrameHeader::parse(&bytes).expect("header available");
    assert_eq!(header.magic(), 0xdabb);
    assert!(header.has_valid_magic());
    assert_eq!(header.body_len(), 5);
    assert_eq!(header.frame_len(), 21);
    assert_eq!(&header.as_bytes()[..], &bytes[..HEADER_SIZE]);
}

#[test]
fn header_is_unavailable_below_sixteen_bytes() {
    assert!(FrameHeader::parse(&[0xda; 15]).is_none());
}

#[test]
fn short_sequences_always_need_more_data() {
    let mut runner = deterministic_runner(256);
    runner
        .run(&vec(any::<u8>(), 0..HEADER_SIZE), |bytes| {
            prop_assert_eq!(decode_frame(&bytes), DecodeStatus::NeedMoreData);
            let decoded = streaming()
                .push(&bytes)
                .map_err(|err| TestCaseError::fail(format!("short input rejected: {err}")))?;
            prop_assert!(decoded.data.is_empty());
            Ok(())
        })
        .expect("short inputs never decode");
}

#[test]
fn magic_prefix_decides_header_validity() {
    let mut runner = deterministic_runner(256);
    let strategy = (any::<[u8; 2]>(), vec(any::<u8>(), 14..64));
    runner
        .run(&strategy, |(magic, rest)| {
            let mut bytes = magic.to_vec();
            bytes.extend_from_slice(&rest);
            let expected = if magic == [0xda, 0xbb] {
                DecodeStatus::Ok
            } else {
                DecodeStatus::InvalidHeader
            };
            prop_assert_eq!(decode_frame(&bytes), expected);
            Ok(())
        })
        .expect("magic prefix classification holds");
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(5)]
#[case(12)]
#[case(15)]
fn split_header_matches_single_delivery(#[case] split: usize) {
    let bytes = frame(&[]);
    let mut decoder = streaming();

    let first = decoder.push(&bytes[..split]).expect("first part accepted");
    assert_eq!(first.status, DecodeStatus::NeedMoreData);
    assert!(first.data.is_empty());

    let second = decoder.push(&bytes[split..]).expect("second part accepted");
    assert_eq!(second.status, DecodeStatus::Ok);
    assert_eq!(second.data, Bytes::from(bytes));
    assert_eq!(second.headers_validated, 1);
}

#[test]
fn header_split_across_two_chunks_then_body_is_forwarded() {
    let bytes = frame(&[9, 8, 7, 6]);
    let mut decoder = streaming();

    let first = decoder.push(&bytes[..10]).expect("first chunk accepted");
    assert_eq!(first.status, DecodeStatus::NeedMoreData);
    assert!(first.data.is_empty());

    let second = decoder.push(&bytes[10..]).expect("second chunk accepted");
    assert_eq!(second.status, DecodeStatus::Ok);
    assert_eq!(second.data.len(), 20);
    assert_eq!(&second.data[HEADER_SIZE..], &[9, 8, 7, 6]);
    assert!(decoder.is_at_frame_boundary());
}

#[test]
fn body_bytes_stream_before_frame_completes() {
    let bytes = frame(&[1; 32]);
    let mut decoder = streaming();

    let first = decoder.push(&bytes[..20]).expect("header plus partial body");
    assert_eq!(first.data.len(), 20);
    assert_eq!(
        decoder.current_header().map(|h| h.body_len()),
        Some(32),
        "decoder should track the open frame"
    );

    // Body continuation carries no magic and must not be re-validated.
    let second = decoder.push(&bytes[20..]).expect("body continuation");
    assert_eq!(second.data.len(), 28);
    assert_eq!(second.headers_validated, 0);
    assert!(decoder.is_at_frame_boundary());
}

#[test]
fn coalesced_frames_are_each_validated() {
    let mut stream = frame(b"ab");
    stream.extend(frame(b"cde"));
    let mut decoder = streaming();

    let decoded = decoder.push(&stream).expect("two frames accepted");
    assert_eq!(decoded.headers_validated, 2);
    assert_eq!(decoded.data, Bytes::from(stream));
    assert_eq!(decoder.frames_validated(), 2);
}

#[test]
fn bad_second_frame_rejects_whole_chunk() {
    let mut stream = frame(b"ok");
    stream.extend_from_slice(&[0u8; HEADER_SIZE]);
    let mut decoder = streaming();

    let err = decoder.push(&stream).expect_err("second header is not dubbo");
    assert_eq!(err, FramingError::InvalidMagic { found: 0 });
    assert_eq!(err.to_string(), PROTOCOL_ERROR_MESSAGE);
}

#[test]
fn wrong_magic_is_reported_with_the_value_found() {
    let mut bytes = frame(b"x");
    bytes[0] = 0xca;
    bytes[1] = 0xfe;
    let err = streaming().push(&bytes).expect_err("magic mismatch");
    assert_eq!(err, FramingError::InvalidMagic { found: 0xcafe });
}

#[test]
fn chunking_is_transparent() {
    let mut runner = deterministic_runner(128);
    let strategy = (
        vec(vec(any::<u8>(), 0..48), 1..4),
        vec(1usize..24, 1..16),
    );
    runner
        .run(&strategy, |(bodies, cuts)| {
            let stream: Vec<u8> = bodies.iter().flat_map(|body| frame(body)).collect();

            let mut chunks = Vec::new();
            let mut rest = &stream[..];
            for cut in cuts.iter().cycle() {
                if rest.is_empty() {
                    break;
                }
                let (head, tail) = rest.split_at((*cut).min(rest.len()));
                chunks.push(head);
                rest = tail;
            }

            let mut decoder = streaming();
            let out = drain(&mut decoder, &chunks)
                .map_err(|err| TestCaseError::fail(format!("valid stream rejected: {err}")))?;
            prop_assert_eq!(out, stream);
            prop_assert_eq!(decoder.frames_validated(), bodies.len() as u64);
            prop_assert!(decoder.finish().is_ok());
            Ok(())
        })
        .expect("chunk boundaries do not change the output");
}

#[test]
fn whole_frame_mode_holds_partial_frames() {
    let bytes = frame(&[1, 2, 3, 4]);
    let mut decoder = ResponseDecoder::new(FramingMode::WholeFrame, 1024);

    let first = decoder.push(&bytes[..18]).expect("partial frame buffered");
    assert_eq!(first.status, DecodeStatus::NeedMoreData);
    assert_eq!(first.headers_validated, 1);
    assert_eq!(decoder.buffered_len(), 18);

    let second = decoder.push(&bytes[18..]).expect("frame completed");
    assert_eq!(second.status, DecodeStatus::Ok);
    assert_eq!(second.data, Bytes::from(bytes));
}

#[test]
fn whole_frame_mode_rejects_frames_over_budget() {
    let bytes = frame(&[0; 64]);
    let mut decoder = ResponseDecoder::new(FramingMode::WholeFrame, 32);
    let err = decoder.push(&bytes).expect_err("frame larger than budget");
    assert_eq!(err, FramingError::BufferOverflow { size: 80, max: 32 });
}

#[rstest]
#[case::clean(&[][..], Ok(()))]
#[case::mid_header(&[0xda, 0xbb, 0][..], Err(EofError::mid_header(3)))]
fn finish_classifies_header_boundaries(
    #[case] input: &[u8],
    #[case] expected: Result<(), EofError>,
) {
    let mut decoder = streaming();
    decoder.push(input).expect("input accepted");
    assert_eq!(decoder.finish(), expected);
}

#[test]
fn finish_reports_truncated_body() {
    let bytes = frame(&[0; 10]);
    let mut decoder = streaming();
    decoder.push(&bytes[..20]).expect("partial frame accepted");
    assert_eq!(
        decoder.finish(),
        Err(EofError::MidFrame {
            bytes_received: 20,
            expected: 26,
        })
    );
}
