//! Daemon lifecycle specs
//!
//! Verify what nfv-vimd leaves behind while running.

use crate::prelude::*;

#[test]
fn daemon_writes_pid_version_and_log() {
    let mut site = Site::with_lab(PATCH_LAB);
    site.start_daemon();

    assert!(site.path().join("vimd.pid").exists());
    assert_eq!(site.read("vimd.version"), env!("CARGO_PKG_VERSION"));
    assert!(wait_for(SPEC_WAIT_MAX_MS, || site
        .read("vimd.log")
        .contains("--- nfv-vimd: starting (pid: ")));
}

#[test]
fn daemon_starts_without_lab() {
    let mut site = Site::empty();
    site.start_daemon();

    site.sw_manager()
        .args(&["patch-strategy", "show"])
        .passes()
        .stdout_eq("No strategy available\n");
}

#[test]
fn strategy_survives_restart() {
    let mut site = Site::with_lab(PATCH_LAB);
    site.start_daemon();
    site.sw_manager().args(&["patch-strategy", "create"]).passes();
    site.stop_daemon();

    site.start_daemon();

    site.sw_manager()
        .args(&["patch-strategy", "show"])
        .passes()
        .stdout_has("Strategy Patch Strategy:")
        .stdout_has("ready-to-apply");
}
