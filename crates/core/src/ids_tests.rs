// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_uppercase_hex() {
    let id = AppletUuid::parse("D1DE41D82B844FEAA7FA1E4322F15DEE").unwrap();
    assert_eq!(id.as_str(), "D1DE41D82B844FEAA7FA1E4322F15DEE");
}

#[test]
fn lowercases_are_uppercased() {
    let id = AppletUuid::parse("d1de41d82b844feaa7fa1e4322f15dee").unwrap();
    assert_eq!(id.as_str(), "D1DE41D82B844FEAA7FA1E4322F15DEE");
}

#[test]
fn rejects_wrong_length() {
    assert!(AppletUuid::parse("ABCD").is_err());
}

#[test]
fn rejects_non_hex() {
    assert!(AppletUuid::parse("ZZZZ41D82B844FEAA7FA1E4322F15DEE").is_err());
}

#[test]
fn session_ids_are_unique() {
    let a = SessionId::new();
    let b = SessionId::new();
    assert_ne!(a, b);
}

#[test]
fn session_id_displays_as_hex() {
    let id = SessionId::from_bytes([0xAB; 16]);
    assert_eq!(id.to_string(), "ab".repeat(16));
}
