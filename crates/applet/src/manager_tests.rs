use std::sync::Arc;

use base64::Engine;
use dal_core::{AppletUuid, FwVersion, Platform, VmFamily};
use dal_plugin::FakePlugin;
use parking_lot::Mutex;
use tempfile::tempdir;

use super::*;

#[derive(Default)]
struct StubHousekeeping {
    blocked: Mutex<Vec<AppletUuid>>,
    evictable: Mutex<Vec<AppletUuid>>,
}

impl SessionHousekeeping for StubHousekeeping {
    fn non_shared_sessions_exist(&self, uuid: &AppletUuid) -> bool {
        self.blocked.lock().contains(uuid)
    }

    fn evict_one_unused(&self) -> Option<AppletUuid> {
        self.evictable.lock().pop()
    }
}

fn manager(dir: &Path) -> AppletManager<FakePlugin> {
    AppletManager::new(
        dir.to_path_buf(),
        Arc::new(FakePlugin::new(VmFamily::Tl)),
        Arc::new(StubHousekeeping::default()),
        Platform::Me,
        FwVersion::new(12, 0, 0),
        0,
    )
}

fn test_uuid() -> AppletUuid {
    AppletUuid::parse("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA").unwrap()
}

#[tokio::test]
async fn install_from_buffer_acp_then_get_applet_state() {
    let dir = tempdir().unwrap();
    let mgr = manager(dir.path());
    let uuid = test_uuid();

    let status = mgr.install_from_buffer(&uuid, b"raw-acp-bytes").await;
    assert_eq!(status, Status::Success);
    assert_eq!(mgr.get_applet_state(&uuid), AppletStatus::Installed);

    let (path, is_acp) = mgr.applet_exists_in_repo(&uuid).unwrap();
    assert!(is_acp);
    assert_eq!(path.file_name().unwrap().to_str().unwrap(), format!("{}.acp", uuid.as_str()));
}

#[tokio::test]
async fn install_rejects_mismatched_extension() {
    let dir = tempdir().unwrap();
    let mgr = manager(dir.path());
    let uuid = test_uuid();
    let file_path = dir.path().join("candidate.dalp");
    std::fs::write(&file_path, b"whatever").unwrap();

    assert_eq!(mgr.install(&uuid, &file_path, true, true).await, Status::FileInvalid);
}

#[tokio::test]
async fn install_blocked_by_existing_non_shared_sessions() {
    let dir = tempdir().unwrap();
    let uuid = test_uuid();
    let housekeeping = Arc::new(StubHousekeeping::default());
    housekeeping.blocked.lock().push(uuid);
    let mgr = AppletManager::new(
        dir.path().to_path_buf(),
        Arc::new(FakePlugin::new(VmFamily::Tl)),
        housekeeping,
        Platform::Me,
        FwVersion::new(12, 0, 0),
        0,
    );

    let status = mgr.install_from_buffer(&uuid, b"bytes").await;
    assert_eq!(status, Status::InstallFailureSessionsExist);
}

#[tokio::test]
async fn installing_identical_blob_twice_in_a_row_reports_install_failed() {
    let dir = tempdir().unwrap();
    let mgr = manager(dir.path());
    let uuid = test_uuid();

    assert_eq!(mgr.install_from_buffer(&uuid, b"same-bytes").await, Status::Success);
    // FakePlugin's download_applet tracks the blob it last accepted; installing
    // the identical bytes again retries once (unload + redownload) but still
    // collides, so the second FILE_IDENTICAL is terminal and reported as
    // INSTALL_FAILED rather than looping forever.
    assert_eq!(mgr.install_from_buffer(&uuid, b"same-bytes").await, Status::InstallFailed);
}

#[tokio::test]
async fn uninstall_removes_the_record_and_file() {
    let dir = tempdir().unwrap();
    let mgr = manager(dir.path());
    let uuid = test_uuid();

    mgr.install_from_buffer(&uuid, b"bytes").await;
    assert_eq!(mgr.uninstall(&uuid).await, Status::Success);
    assert_eq!(mgr.get_applet_state(&uuid), AppletStatus::NotInstalled);
    assert!(mgr.applet_exists_in_repo(&uuid).is_none());
}

#[tokio::test]
async fn uninstall_unknown_applet_is_not_installed() {
    let dir = tempdir().unwrap();
    let mgr = manager(dir.path());
    assert_eq!(mgr.uninstall(&test_uuid()).await, Status::AppletNotInstalled);
}

#[tokio::test]
async fn scan_repository_discards_leftover_pending_files_and_picks_up_installed_ones() {
    let dir = tempdir().unwrap();
    let uuid = test_uuid();
    std::fs::write(dir.path().join(format!("PENDING-{}.acp", uuid.as_str())), b"stale").unwrap();
    std::fs::write(dir.path().join(format!("{}.dalp", uuid.as_str())), b"<package/>").unwrap();

    let mgr = manager(dir.path());
    mgr.scan_repository().unwrap();

    assert_eq!(mgr.get_applet_state(&uuid), AppletStatus::Installed);
    assert!(!dir.path().join(format!("PENDING-{}.acp", uuid.as_str())).exists());
}

#[tokio::test]
async fn install_spooler_bypasses_the_reserved_uuid_check_and_stays_hidden() {
    let dir = tempdir().unwrap();
    let mgr = manager(dir.path());
    let spooler = AppletUuid::parse(dal_core::SPOOLER_APPLET_UUID).unwrap();

    // install_from_buffer rejects the reserved UUID outright...
    assert_eq!(mgr.install_from_buffer(&spooler, b"bytes").await, Status::InvalidAppletGuid);
    // ...but install_spooler is how the engine bootstraps it at init.
    assert_eq!(mgr.install_spooler(&spooler, b"bytes").await, Status::Success);
    assert_eq!(mgr.get_applet_state(&spooler), AppletStatus::Installed);
    assert!(mgr.installed_uuids(false).is_empty());
    assert_eq!(mgr.installed_uuids(true), vec![spooler]);
}

#[tokio::test]
async fn dalp_install_selects_the_matching_candidate_blob() {
    let dir = tempdir().unwrap();
    let mgr = manager(dir.path());
    let uuid = test_uuid();

    let blob = base64::engine::general_purpose::STANDARD.encode(b"selected-blob");
    let xml = format!(
        "<package><applet><platform>ME</platform><fwVersion>12.0.0</fwVersion><appletVersion>1.0</appletVersion><appletBlob>{blob}</appletBlob></applet></package>"
    );
    let file_path = dir.path().join("pkg.dalp");
    std::fs::write(&file_path, xml).unwrap();

    assert_eq!(mgr.install(&uuid, &file_path, true, false).await, Status::Success);
}
