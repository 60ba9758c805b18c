use serial_test::serial;

use super::*;

#[test]
#[serial]
fn state_dir_env_override_wins() {
    std::env::set_var("DAL_STATE_DIR", "/tmp/dal-test-state");
    std::env::remove_var("XDG_STATE_HOME");

    let config = Config::load().unwrap();
    assert_eq!(config.state_dir, PathBuf::from("/tmp/dal-test-state"));
    assert_eq!(config.repository_dir, PathBuf::from("/tmp/dal-test-state/applets"));

    std::env::remove_var("DAL_STATE_DIR");
}

#[test]
#[serial]
fn socket_path_env_override_wins() {
    std::env::set_var("DAL_STATE_DIR", "/tmp/dal-test-state");
    std::env::set_var("DAL_SOCKET_PATH", "/tmp/dal-test-state/custom.sock");

    let config = Config::load().unwrap();
    assert_eq!(config.socket_path, PathBuf::from("/tmp/dal-test-state/custom.sock"));

    std::env::remove_var("DAL_STATE_DIR");
    std::env::remove_var("DAL_SOCKET_PATH");
}

#[test]
#[serial]
fn vm_family_and_platform_default_when_unset() {
    std::env::remove_var("DAL_VM_FAMILY");
    std::env::remove_var("DAL_PLATFORM");
    std::env::set_var("DAL_STATE_DIR", "/tmp/dal-test-state");

    let config = Config::load().unwrap();
    assert_eq!(config.vm_family, VmFamily::BhV2);
    assert_eq!(config.platform, Platform::Me);

    std::env::remove_var("DAL_STATE_DIR");
}

#[test]
#[serial]
fn vm_family_and_platform_env_overrides() {
    std::env::set_var("DAL_STATE_DIR", "/tmp/dal-test-state");
    std::env::set_var("DAL_VM_FAMILY", "bh_v1");
    std::env::set_var("DAL_PLATFORM", "sec");

    let config = Config::load().unwrap();
    assert_eq!(config.vm_family, VmFamily::BhV1);
    assert_eq!(config.platform, Platform::Sec);

    std::env::remove_var("DAL_STATE_DIR");
    std::env::remove_var("DAL_VM_FAMILY");
    std::env::remove_var("DAL_PLATFORM");
}
