use super::*;
use dal_core::{AppletUuid, Owner, SessionId};

fn echo_uuid() -> AppletUuid {
    AppletUuid::parse("D1DE41D82B844FEAA7FA1E4322F15DEE").unwrap()
}

fn roundtrip(request: Request) {
    let encoded = encode_request(&request);
    let decoded = decode_request(&encoded).unwrap();
    assert_eq!(decoded, request);
}

#[test]
fn command_id_roundtrips_through_from_u32() {
    for id in 0..=17u32 {
        assert_eq!(CommandId::from_u32(id).unwrap() as u32, id);
    }
    assert!(matches!(CommandId::from_u32(18), Err(ProtocolError::UnknownCommand(18))));
}

#[test]
fn send_and_receive_skips_the_global_mutex() {
    assert!(CommandId::SendAndReceive.skips_global_mutex());
    assert!(!CommandId::Install.skips_global_mutex());
}

#[test]
fn sd_commands_are_bh_v2_only() {
    assert!(CommandId::CreateSdSession.is_bh_v2_only());
    assert!(CommandId::QueryTeeMetadata.is_bh_v2_only());
    assert!(!CommandId::CreateSession.is_bh_v2_only());
}

#[test]
fn init_roundtrips() {
    roundtrip(Request::Init);
}

#[test]
fn install_roundtrips() {
    roundtrip(Request::Install { uuid: echo_uuid(), path: "/var/dal/repo/echo.dalp".into() });
}

#[test]
fn create_session_roundtrips_with_owner_and_init_buf() {
    roundtrip(Request::CreateSession {
        uuid: echo_uuid(),
        flags: 1,
        init_buf: vec![9, 8, 7],
        owner: Owner::new(4242, 100),
    });
}

#[test]
fn close_session_roundtrips_without_owner() {
    roundtrip(Request::CloseSession { session_id: SessionId::new(), owner: None, force: true });
}

#[test]
fn close_session_roundtrips_with_owner() {
    roundtrip(Request::CloseSession {
        session_id: SessionId::new(),
        owner: Some(Owner::new(1, 2)),
        force: false,
    });
}

#[test]
fn send_and_receive_roundtrips() {
    roundtrip(Request::SendAndReceive {
        session_id: SessionId::new(),
        cmd_id: 10,
        tx: (0..255u16).map(|i| (i % 127) as u8).collect(),
        rx_len: 2048,
    });
}

#[test]
fn decode_rejects_trailing_bytes() {
    let mut encoded = encode_request(&Request::Init);
    encoded.push(0xFF);
    assert!(matches!(decode_request(&encoded), Err(ProtocolError::TrailingBytes(1))));
}
