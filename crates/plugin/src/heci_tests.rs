use super::*;

#[tokio::test]
async fn missing_devnode_reports_no_connection_to_firmware() {
    // No MEI device exists in a CI/dev sandbox, so `open` must not panic,
    // and every call must fail clean rather than block forever.
    let plugin = HeciPlugin::open(VmFamily::Tl);
    assert_eq!(plugin.vm_family(), VmFamily::Tl);
    assert_eq!(plugin.get_plugin_type().await, Err(Status::NoConnectionToFirmware));
    assert_eq!(
        plugin.download_applet(&AppletUuid::parse("D1DE41D82B844FEAA7FA1E4322F15DEE").unwrap(), &[]).await,
        Err(Status::NoConnectionToFirmware)
    );
}
