//! Upgrade strategy specs

use crate::prelude::*;

#[test]
fn upgrade_without_upgrade_in_progress_fails_build() {
    let mut site = Site::with_lab(PATCH_LAB);
    site.start_daemon();

    site.sw_manager()
        .args(&["upgrade-strategy", "create"])
        .passes()
        .stdout_has("Strategy Upgrade Strategy:")
        .stdout_has("migrate");

    site.sw_manager()
        .args(&["upgrade-strategy", "show"])
        .passes()
        .stdout_has("build-failed")
        .stdout_has("build-reason:");

    site.sw_manager()
        .args(&["upgrade-strategy", "apply"])
        .fails()
        .stdout_eq("Strategy apply failed\n");
}

#[test]
fn kinds_do_not_mix() {
    let mut site = Site::with_lab(PATCH_LAB);
    site.start_daemon();
    site.sw_manager().args(&["upgrade-strategy", "create"]).passes();

    site.sw_manager()
        .args(&["patch-strategy", "show"])
        .passes()
        .stdout_eq("No strategy available\n");

    site.sw_manager()
        .args(&["patch-strategy", "create"])
        .fails()
        .stdout_eq("Strategy creation failed\n");
}
