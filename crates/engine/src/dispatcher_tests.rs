use super::*;

#[test]
fn acp_extension_is_recognized_case_insensitively() {
    assert!(is_acp_path("/repo/APPLET.ACP"));
    assert!(is_acp_path("/repo/applet.acp"));
}

#[test]
fn non_acp_extension_is_not_acp() {
    assert!(!is_acp_path("/repo/applet.dalp"));
    assert!(!is_acp_path("/repo/applet"));
}
