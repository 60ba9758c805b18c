use base64::Engine;

use super::*;

fn b64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn applet_entry(platform: &str, fw: &str, av: &str, blob: &[u8]) -> String {
    format!(
        "<applet><platform>{platform}</platform><fwVersion>{fw}</fwVersion><appletVersion>{av}</appletVersion><appletBlob>{blob}</appletBlob></applet>",
        blob = b64(blob)
    )
}

#[test]
fn non_sign_once_picks_highest_major_not_exceeding_running_fw() {
    let xml = format!(
        "<package>{}{}{}</package>",
        applet_entry("ME", "10.0.0", "1.0", b"old"),
        applet_entry("ME", "12.1.0", "1.0", b"too-new"),
        applet_entry("ME", "11.2.0", "2.0", b"best"),
    );

    let blobs = select_blobs(xml.as_bytes(), Platform::Me, FwVersion::new(11, 5, 0), 0).unwrap();
    assert_eq!(blobs, vec![b"best".to_vec()]);
}

#[test]
fn non_sign_once_filters_by_platform() {
    let xml = format!("<package>{}</package>", applet_entry("SEC", "9.0.0", "1.0", b"sec-only"));
    let blobs = select_blobs(xml.as_bytes(), Platform::Me, FwVersion::new(9, 0, 0), 0).unwrap();
    assert!(blobs.is_empty());
}

#[test]
fn non_sign_once_orders_multiple_matches_descending() {
    let xml = format!(
        "<package>{}{}</package>",
        applet_entry("ME", "10.0.0", "1.0", b"first"),
        applet_entry("ME", "10.0.0", "2.0", b"second"),
    );
    let blobs = select_blobs(xml.as_bytes(), Platform::Me, FwVersion::new(10, 0, 0), 0).unwrap();
    assert_eq!(blobs, vec![b"second".to_vec(), b"first".to_vec()]);
}

#[test]
fn sign_once_filters_by_api_level_and_major_eleven() {
    let xml = format!(
        "<package>{}{}{}</package>",
        applet_entry("ME", "11.0.0", "1.0", b"api0"),
        applet_entry("ME", "11.3.0", "2.0", b"api3-too-new"),
        applet_entry("ME", "10.0.0", "9.0", b"wrong-major"),
    );
    let blobs = select_blobs(xml.as_bytes(), Platform::Me, FwVersion::new(11, 0, 0), 1).unwrap();
    assert_eq!(blobs, vec![b"api0".to_vec()]);
}

#[test]
fn oversized_blob_is_rejected() {
    let huge = vec![0u8; DALP_MAX_BLOB_SIZE + 1];
    let xml = format!("<package>{}</package>", applet_entry("ME", "10.0.0", "1.0", &huge));
    assert_eq!(select_blobs(xml.as_bytes(), Platform::Me, FwVersion::new(10, 0, 0), 0), Err(Status::FileInvalid));
}

#[test]
fn xml_depth_beyond_cap_is_rejected() {
    let mut xml = String::from("<a><b><c><d><e><f>too deep</f></e></d></c></b></a>");
    xml = format!("<package>{xml}</package>");
    assert_eq!(select_blobs(xml.as_bytes(), Platform::Me, FwVersion::new(10, 0, 0), 0), Err(Status::FileInvalid));
}

#[test]
fn malformed_xml_is_rejected() {
    assert_eq!(select_blobs(b"<package><applet>", Platform::Me, FwVersion::new(10, 0, 0), 0), Err(Status::FileInvalid));
}

#[yare::parameterized(
    me = { "ME", Some(Platform::Me) },
    sec = { "SEC", Some(Platform::Sec) },
    cse = { "CSE", Some(Platform::Cse) },
    unknown = { "EX", None },
)]
fn platform_tag_parses(tag: &str, expected: Option<Platform>) {
    assert_eq!(parse_platform(tag).ok(), expected);
}
