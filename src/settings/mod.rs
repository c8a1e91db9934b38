//! The built-in macOS checklist.
//!
//! Order matters: a setting's position here is the index users pass on the
//! command line. Append new settings at the end.

pub mod accounts;
pub mod defaults;
pub mod network;
pub mod probe;

use crate::registry::{Requirement, SettingEntry};
use accounts::StandardUser;
use defaults::{Defaults, Pref};
use network::Ipv6Off;
use probe::{ExitsZero, Probe, RunSteps, SwitchIs};

const SOCKETFILTERFW: &str = "/usr/libexec/ApplicationFirewall/socketfilterfw";

const GATEKEEPER_ON: &[Probe] = &[Probe::root("spctl", &["--global-enable"])];
const FIREWALL_ON: &[Probe] = &[Probe::root(SOCKETFILTERFW, &["--setglobalstate", "on"])];
const STEALTH_ON: &[Probe] = &[Probe::root(SOCKETFILTERFW, &["--setstealthmode", "on"])];
const REMOTE_LOGIN_OFF: &[Probe] = &[Probe::root("systemsetup", &["-f", "-setremotelogin", "off"])];
const REMOTE_APPLE_EVENTS_OFF: &[Probe] =
    &[Probe::root("systemsetup", &["-setremoteappleevents", "off"])];

const SYSTEM_UPDATES: Defaults = Defaults::system(
    "/Library/Preferences/com.apple.SoftwareUpdate",
    &[
        "AutomaticCheckEnabled",
        "AutomaticDownload",
        "CriticalUpdateInstall",
        "ConfigDataInstall",
    ],
    Pref::Bool(true),
);

const APP_STORE_UPDATES: Defaults = Defaults::system(
    "/Library/Preferences/com.apple.commerce",
    &["AutoUpdate"],
    Pref::Bool(true),
);

const GUEST_USER: Defaults = Defaults::system(
    "/Library/Preferences/com.apple.loginwindow",
    &["GuestEnabled"],
    Pref::Bool(false),
);

const MAIL_REMOTE_CONTENT: Defaults = Defaults::user(
    "com.apple.mail-shared",
    &["DisableURLLoading"],
    Pref::Bool(true),
);

const SAFARI_SAFE_DOWNLOADS: Defaults = Defaults::user(
    "com.apple.Safari",
    &["AutoOpenSafeDownloads"],
    Pref::Bool(false),
);

const AIRDROP_CONTACTS_ONLY: Defaults = Defaults::user(
    "com.apple.sharingd",
    &["DiscoverableMode"],
    Pref::Str("Contacts Only"),
);

/// Every setting lockdown knows about, in index order.
pub fn builtin() -> Vec<SettingEntry> {
    vec![
        SettingEntry::new(
            "enable_automatic_system_updates",
            "Enable automatic system updates",
            SYSTEM_UPDATES,
        )
        .with_fix(SYSTEM_UPDATES),
        SettingEntry::new(
            "enable_automatic_app_store_updates",
            "Enable automatic App Store updates",
            APP_STORE_UPDATES,
        )
        .with_fix(APP_STORE_UPDATES),
        SettingEntry::new(
            "enable_gatekeeper",
            "Enable Gatekeeper",
            SwitchIs::on(Probe::new("spctl", &["--status"])),
        )
        .with_fix(RunSteps(GATEKEEPER_ON)),
        SettingEntry::new(
            "enable_firewall",
            "Enable application firewall",
            SwitchIs::on(Probe::new(SOCKETFILTERFW, &["--getglobalstate"])),
        )
        .with_fix(RunSteps(FIREWALL_ON)),
        SettingEntry::new(
            "enable_stealth_mode",
            "Enable firewall stealth mode",
            SwitchIs::on(Probe::new(SOCKETFILTERFW, &["--getstealthmode"])),
        )
        .with_fix(RunSteps(STEALTH_ON)),
        // Turning FileVault on needs the user's password and prints a
        // recovery key, so there is no automatic fix
        SettingEntry::new(
            "enable_filevault",
            "Enable FileVault disk encryption",
            SwitchIs::on(Probe::new("fdesetup", &["status"])),
        ),
        SettingEntry::new("disable_guest_user", "Disable guest user", GUEST_USER)
            .with_fix(GUEST_USER),
        SettingEntry::new(
            "disable_remote_login",
            "Disable remote login (SSH)",
            SwitchIs::off(Probe::root("systemsetup", &["-getremotelogin"])),
        )
        .with_fix(RunSteps(REMOTE_LOGIN_OFF)),
        SettingEntry::new(
            "disable_remote_apple_events",
            "Disable remote Apple events",
            SwitchIs::off(Probe::root("systemsetup", &["-getremoteappleevents"])),
        )
        .with_fix(RunSteps(REMOTE_APPLE_EVENTS_OFF)),
        SettingEntry::new("disable_ipv6", "Disable IPv6 on all network services", Ipv6Off)
            .with_fix(Ipv6Off),
        SettingEntry::new(
            "disable_mail_remote_content",
            "Disable remote content in Mail",
            MAIL_REMOTE_CONTENT,
        )
        .with_fix(MAIL_REMOTE_CONTENT),
        SettingEntry::new(
            "disable_auto_open_safe_downloads",
            "Disable Safari auto-open of \"safe\" downloads",
            SAFARI_SAFE_DOWNLOADS,
        )
        .with_fix(SAFARI_SAFE_DOWNLOADS),
        SettingEntry::new(
            "set_airdrop_contacts_only",
            "Limit AirDrop to contacts only",
            AIRDROP_CONTACTS_ONLY,
        )
        .with_fix(AIRDROP_CONTACTS_ONLY),
        // SIP can only be changed from recoveryOS
        SettingEntry::new(
            "check_sip",
            "Check System Integrity Protection",
            SwitchIs::on(Probe::new("csrutil", &["status"])),
        ),
        SettingEntry::new(
            "check_efi_integrity",
            "Check EFI firmware integrity",
            ExitsZero(Probe::new(
                "/usr/libexec/firmwarecheckers/eficheck/eficheck",
                &["--integrity-check"],
            )),
        )
        .requires(Requirement::IntelWithoutT2),
        SettingEntry::new(
            "check_if_standard_user",
            "Check current user is not an admin",
            StandardUser,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let entries = builtin();
        let names: HashSet<_> = entries.iter().map(|e| e.name).collect();
        assert_eq!(names.len(), entries.len());
    }

    #[test]
    fn test_names_are_snake_case() {
        for entry in builtin() {
            assert!(
                entry
                    .name
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
                "{} is not snake_case",
                entry.name
            );
        }
    }

    #[test]
    fn test_index_order_is_stable() {
        let entries = builtin();
        assert_eq!(entries[0].name, "enable_automatic_system_updates");
        assert_eq!(entries[3].name, "enable_firewall");
        assert_eq!(entries.last().unwrap().name, "check_if_standard_user");
    }

    #[test]
    fn test_integrity_checks_have_no_fix() {
        for entry in builtin() {
            if entry.name.starts_with("check_") || entry.name == "enable_filevault" {
                assert!(!entry.is_fixable(), "{} should not be fixable", entry.name);
            }
        }
    }

    #[test]
    fn test_only_efi_has_a_hardware_requirement() {
        let restricted: Vec<_> = builtin()
            .into_iter()
            .filter(|e| e.requirement != Requirement::Any)
            .map(|e| e.name)
            .collect();
        assert_eq!(restricted, vec!["check_efi_integrity"]);
    }

    #[test]
    fn test_privilege_flags() {
        let entries = builtin();
        let by_name = |name: &str| entries.iter().find(|e| e.name == name).unwrap();

        assert!(by_name("disable_remote_login").needs_privilege(false));
        assert!(!by_name("enable_firewall").needs_privilege(false));
        assert!(by_name("enable_firewall").needs_privilege(true));
        assert!(!by_name("disable_mail_remote_content").needs_privilege(true));
    }
}
