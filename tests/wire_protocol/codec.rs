//! Byte-level checks of headers and responses

use byteorder::{BigEndian, ByteOrder};
use bytes::BytesMut;
use proptest::prelude::*;
use tidelog::wire::{
    write_header, BinaryHeader, BinaryResponse, Flags, Opcode, HEADER_SIZE, MESSAGE_VERSION,
};

#[test]
fn header_layout_is_fixed() {
    let mut sink = Vec::new();
    write_header(
        &mut sink,
        &BinaryHeader::new(0x0102, Opcode::Produce, Flags::WITH_TIMESTAMP, 0x0A0B0C0D),
    );

    assert_eq!(sink.len(), HEADER_SIZE);
    assert_eq!(sink[0], MESSAGE_VERSION);
    assert_eq!(sink[1], 0x01);
    assert_eq!(&sink[2..4], &[0x01, 0x02]);
    assert_eq!(sink[4], 4);
    assert_eq!(&sink[5..9], &[0x0A, 0x0B, 0x0C, 0x0D]);
    assert_eq!(BigEndian::read_u32(&sink[9..13]), crc32fast::hash(&sink[..9]));
}

#[test]
fn empty_response_is_thirteen_bytes() {
    let request = BinaryHeader::new(7, Opcode::Startup, Flags::empty(), 0);
    let mut sink = BytesMut::new();
    BinaryResponse::ready(&request).marshal(&mut sink);

    assert_eq!(sink.len(), 13);
    let header = BinaryHeader::decode(&sink).unwrap();
    assert_eq!(header.body_length, 0);
    assert_eq!(header.stream_id, 7);
}

#[test]
fn error_response_boom() {
    let request = BinaryHeader::new(21, Opcode::Produce, Flags::empty(), 0);
    let mut sink = Vec::new();
    BinaryResponse::error(&request, "boom").marshal(&mut sink);

    assert_eq!(sink.len(), HEADER_SIZE + 4);
    assert_eq!(BigEndian::read_u32(&sink[5..9]), 4);
    assert_eq!(sink[4], Opcode::Error.as_u8());
    assert_eq!(&sink[HEADER_SIZE..], &[b'b', b'o', b'o', b'm']);
}

proptest! {
    #[test]
    fn error_response_echoes_stream(stream_id in any::<u16>(), message in ".{0,64}") {
        let request = BinaryHeader::new(stream_id, Opcode::Produce, Flags::empty(), 0);
        let mut sink = Vec::new();
        BinaryResponse::error(&request, message.clone()).marshal(&mut sink);

        let header = BinaryHeader::decode(&sink).unwrap();
        prop_assert_eq!(header.stream_id, stream_id);
        prop_assert_eq!(header.body_length as usize, message.len());
        prop_assert_eq!(&sink[HEADER_SIZE..], message.as_bytes());
    }
}
