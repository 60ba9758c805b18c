use super::*;

#[test]
fn primitives_roundtrip() {
    let mut w = Writer::new();
    w.u8(7).bool(true).u32(0xDEAD_BEEF).i32(-5).u64(0x0102_0304_0506_0708);
    let bytes = w.into_bytes();

    let mut r = Reader::new(&bytes);
    assert_eq!(r.u8().unwrap(), 7);
    assert!(r.bool().unwrap());
    assert_eq!(r.u32().unwrap(), 0xDEAD_BEEF);
    assert_eq!(r.i32().unwrap(), -5);
    assert_eq!(r.u64().unwrap(), 0x0102_0304_0506_0708);
    r.finish().unwrap();
}

#[test]
fn u16_roundtrips_little_endian() {
    let mut w = Writer::new();
    w.u16(0x0102);
    let bytes = w.into_bytes();
    assert_eq!(bytes, vec![0x02, 0x01]);
    let mut r = Reader::new(&bytes);
    assert_eq!(r.u16().unwrap(), 0x0102);
}

#[test]
fn u32_is_little_endian_on_the_wire() {
    let mut w = Writer::new();
    w.u32(1);
    assert_eq!(w.into_bytes(), vec![1, 0, 0, 0]);
}

#[test]
fn buffer_roundtrips_and_is_length_prefixed() {
    let mut w = Writer::new();
    w.buffer(b"hello");
    let bytes = w.into_bytes();
    assert_eq!(&bytes[0..4], &5u32.to_le_bytes());

    let mut r = Reader::new(&bytes);
    assert_eq!(r.buffer("tx").unwrap(), b"hello".to_vec());
    r.finish().unwrap();
}

#[test]
fn buffer_over_jhi_max_is_rejected() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&((JHI_BUFFER_MAX as u32) + 1).to_le_bytes());
    let mut r = Reader::new(&bytes);
    let err = r.buffer("tx").unwrap_err();
    assert!(matches!(err, ProtocolError::BufferTooLarge { field: "tx", .. }));
}

#[test]
fn string_roundtrips_utf8() {
    let mut w = Writer::new();
    w.string("événement");
    let bytes = w.into_bytes();
    let mut r = Reader::new(&bytes);
    assert_eq!(r.string().unwrap(), "événement");
    r.finish().unwrap();
}

#[test]
fn truncated_buffer_is_an_error() {
    let mut r = Reader::new(&[1, 0, 0, 0]); // claims 1 byte follows but none do
    assert!(matches!(r.buffer("x"), Err(ProtocolError::Truncated { .. })));
}

#[test]
fn applet_uuid_and_session_id_roundtrip() {
    let valid = AppletUuid::parse("D1DE41D82B844FEAA7FA1E4322F15DEE").unwrap();
    let sid = SessionId::new();

    let mut w = Writer::new();
    w.applet_uuid(&valid).session_id(&sid);
    let bytes = w.into_bytes();

    let mut r = Reader::new(&bytes);
    assert_eq!(r.applet_uuid().unwrap(), valid);
    assert_eq!(r.session_id().unwrap(), sid);
    r.finish().unwrap();
}

#[test]
fn trailing_bytes_are_rejected() {
    let mut r = Reader::new(&[1, 2, 3]);
    r.u8().unwrap();
    assert!(matches!(r.finish(), Err(ProtocolError::TrailingBytes(2))));
}
