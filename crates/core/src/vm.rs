// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! VM family and transport kind: the generation of in-firmware VM a plugin
//! talks to, and how the daemon reaches the coprocessor.

/// The generation of the in-firmware VM (spec GLOSSARY "VM family").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum VmFamily {
    /// Legacy TL VM.
    Tl,
    /// First-generation Beihai VM.
    BhV1,
    /// Current-generation Beihai VM.
    BhV2,
}

impl VmFamily {
    /// BH_V2 is the only family with Security Domain sessions, signed
    /// command packages, and package-level shared-session support baked
    /// into the VM itself (spec §4.4: `if vm_family != BH_V2 and not
    /// applet_supports_shared: fail`).
    pub fn is_bh_v2(self) -> bool {
        matches!(self, VmFamily::BhV2)
    }
}

crate::simple_display! {
    VmFamily {
        Tl => "TL",
        BhV1 => "BH_V1",
        BhV2 => "BH_V2",
    }
}

/// How the daemon reaches the coprocessor (spec §4.7, §9 "Windows/Linux/
/// Android transport variants").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TransportKind {
    /// HECI character device / MEI driver.
    Heci,
    /// Local loopback socket emulating the coprocessor (dev/test rigs).
    Emulation,
}

/// The coprocessor execution environment a `.dalp` applet entry targets
/// (spec §4.3: `<platform>` is `ME`/`SEC`/`CSE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Platform {
    Me,
    Sec,
    Cse,
}

crate::simple_display! {
    Platform {
        Me => "ME",
        Sec => "SEC",
        Cse => "CSE",
    }
}

/// Firmware version, used by the package reader to select compatible
/// applet blobs (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct FwVersion {
    pub major: u16,
    pub minor: u16,
    pub hotfix: u16,
}

impl FwVersion {
    pub const fn new(major: u16, minor: u16, hotfix: u16) -> Self {
        Self { major, minor, hotfix }
    }

    /// FW major 11 is "sign-once": package selection follows a different
    /// rule (spec §4.3).
    pub fn is_sign_once(self) -> bool {
        self.major == 11
    }
}

impl std::fmt::Display for FwVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.hotfix)
    }
}

/// An applet's own version, as embedded in a `.dalp` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct AppletVersion {
    pub major: u16,
    pub minor: u16,
}

impl AppletVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl std::fmt::Display for AppletVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
