// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `.dalp` package reading (spec §4.3): an XML document listing candidate
//! applet blobs per platform and firmware version, and the selection rule
//! that narrows the list down to the ones worth trying on `download_applet`.

use dal_core::{AppletVersion, FwVersion, Platform, Status, DALP_MAX_BLOB_SIZE, DALP_MAX_PACKAGE_SIZE, DALP_MAX_XML_DEPTH};
use xml::reader::{EventReader, XmlEvent};

struct Entry {
    platform: Platform,
    fw_version: FwVersion,
    applet_version: AppletVersion,
    blob_b64: String,
}

/// Parse every `<applet>` entry out of a `.dalp` document, capping element
/// nesting at [`DALP_MAX_XML_DEPTH`].
fn parse_entries(xml: &[u8]) -> Result<Vec<Entry>, Status> {
    if xml.len() > DALP_MAX_PACKAGE_SIZE {
        return Err(Status::FileInvalid);
    }

    let parser = EventReader::new(xml);
    let mut depth: usize = 0;
    let mut entries = Vec::new();

    let mut cur_platform: Option<Platform> = None;
    let mut cur_fw: Option<FwVersion> = None;
    let mut cur_applet_ver: Option<AppletVersion> = None;
    let mut cur_blob: Option<String> = None;
    let mut text = String::new();
    let mut path: Vec<String> = Vec::new();

    for event in parser {
        let event = event.map_err(|_| Status::FileInvalid)?;
        match event {
            XmlEvent::StartElement { name, .. } => {
                depth += 1;
                if depth > DALP_MAX_XML_DEPTH {
                    return Err(Status::FileInvalid);
                }
                path.push(name.local_name.clone());
                text.clear();
                if name.local_name == "applet" {
                    cur_platform = None;
                    cur_fw = None;
                    cur_applet_ver = None;
                    cur_blob = None;
                }
            }
            XmlEvent::Characters(s) => text.push_str(&s),
            XmlEvent::CData(s) => text.push_str(&s),
            XmlEvent::EndElement { name } => {
                depth = depth.saturating_sub(1);
                path.pop();

                match name.local_name.as_str() {
                    "platform" => cur_platform = Some(parse_platform(text.trim())?),
                    "fwVersion" => cur_fw = Some(parse_triple(text.trim())?),
                    "appletVersion" => cur_applet_ver = Some(parse_pair(text.trim())?),
                    "appletBlob" => cur_blob = Some(text.trim().to_string()),
                    "applet" => {
                        let entry = Entry {
                            platform: cur_platform.take().ok_or(Status::FileInvalid)?,
                            fw_version: cur_fw.take().ok_or(Status::FileInvalid)?,
                            applet_version: cur_applet_ver.take().ok_or(Status::FileInvalid)?,
                            blob_b64: cur_blob.take().ok_or(Status::FileInvalid)?,
                        };
                        entries.push(entry);
                    }
                    _ => {}
                }
                text.clear();
            }
            _ => {}
        }
    }

    Ok(entries)
}

fn parse_platform(s: &str) -> Result<Platform, Status> {
    match s {
        "ME" => Ok(Platform::Me),
        "SEC" => Ok(Platform::Sec),
        "CSE" => Ok(Platform::Cse),
        _ => Err(Status::FileInvalid),
    }
}

fn parse_triple(s: &str) -> Result<FwVersion, Status> {
    let mut parts = s.split('.');
    let major = parts.next().and_then(|p| p.parse().ok()).ok_or(Status::FileInvalid)?;
    let minor = parts.next().and_then(|p| p.parse().ok()).ok_or(Status::FileInvalid)?;
    let hotfix = parts.next().and_then(|p| p.parse().ok()).ok_or(Status::FileInvalid)?;
    if parts.next().is_some() {
        return Err(Status::FileInvalid);
    }
    Ok(FwVersion::new(major, minor, hotfix))
}

fn parse_pair(s: &str) -> Result<AppletVersion, Status> {
    let mut parts = s.split('.');
    let major = parts.next().and_then(|p| p.parse().ok()).ok_or(Status::FileInvalid)?;
    let minor = parts.next().and_then(|p| p.parse().ok()).ok_or(Status::FileInvalid)?;
    if parts.next().is_some() {
        return Err(Status::FileInvalid);
    }
    Ok(AppletVersion { major, minor })
}

fn decode_blob(b64: &str) -> Result<Vec<u8>, Status> {
    use base64::Engine;
    let blob = base64::engine::general_purpose::STANDARD.decode(b64.as_bytes()).map_err(|_| Status::FileInvalid)?;
    if blob.len() > DALP_MAX_BLOB_SIZE {
        return Err(Status::FileInvalid);
    }
    Ok(blob)
}

/// Select and decode the ordered candidate blobs out of a `.dalp` document
/// (spec §4.3 steps 2-4).
///
/// `running_api_level` is the VM's declared API level (its `fwVersion.Minor`
/// equivalent), used only on the sign-once path.
pub fn select_blobs(
    xml: &[u8],
    running_platform: Platform,
    running_fw: FwVersion,
    running_api_level: u16,
) -> Result<Vec<Vec<u8>>, Status> {
    let mut entries = parse_entries(xml)?;

    let selected: Vec<Entry> = if running_fw.is_sign_once() {
        entries.retain(|e| e.fw_version.major == 11 && e.fw_version.minor <= running_api_level);
        entries.sort_by(|a, b| {
            (b.applet_version.major, b.applet_version.minor).cmp(&(a.applet_version.major, a.applet_version.minor))
        });
        entries
    } else {
        entries.retain(|e| e.platform == running_platform && e.fw_version.major <= running_fw.major);
        let Some(best_major) = entries.iter().map(|e| e.fw_version.major).max() else {
            return Ok(Vec::new());
        };
        entries.retain(|e| e.fw_version.major == best_major);
        entries.sort_by(|a, b| {
            let ka = (a.fw_version.major, a.fw_version.minor, a.fw_version.hotfix, a.applet_version.major, a.applet_version.minor);
            let kb = (b.fw_version.major, b.fw_version.minor, b.fw_version.hotfix, b.applet_version.major, b.applet_version.minor);
            kb.cmp(&ka)
        });
        entries
    };

    selected.iter().map(|e| decode_blob(&e.blob_b64)).collect()
}

#[cfg(test)]
#[path = "package_tests.rs"]
mod tests;
