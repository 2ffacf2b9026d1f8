//! Patch strategy specs

use crate::prelude::*;

fn site() -> Site {
    let mut site = Site::with_lab(PATCH_LAB);
    site.start_daemon();
    site
}

#[test]
fn show_without_strategy() {
    let site = site();

    site.sw_manager()
        .args(&["patch-strategy", "show"])
        .passes()
        .stdout_eq("No strategy available\n");
}

#[test]
fn create_shows_building_strategy() {
    let site = site();

    site.sw_manager()
        .args(&["patch-strategy", "create", "--compute-apply-type", "parallel", "--max-parallel-compute-hosts", "4"])
        .passes()
        .stdout_has("Strategy Patch Strategy:")
        .stdout_has("building")
        .stdout_has("max-parallel-compute-hosts:")
        .stdout_has("stop-start");
}

#[test]
fn second_create_fails() {
    let site = site();
    site.sw_manager().args(&["patch-strategy", "create"]).passes();

    site.sw_manager()
        .args(&["patch-strategy", "create"])
        .fails()
        .code(1)
        .stdout_eq("Strategy creation failed\n");
}

#[test]
fn build_completes_before_show() {
    let site = site();
    site.sw_manager().args(&["patch-strategy", "create"]).passes();

    site.sw_manager()
        .args(&["patch-strategy", "show"])
        .passes()
        .stdout_has("ready-to-apply")
        .stdout_has("build-result:");

    site.sw_manager()
        .args(&["patch-strategy", "show", "--details"])
        .passes()
        .stdout_has("  build-phase:")
        .stdout_has("  apply-phase:")
        .stdout_has("sw-patch-hosts");
}

#[test]
fn apply_then_abort_then_delete() {
    let site = site();
    site.sw_manager().args(&["patch-strategy", "create"]).passes();

    site.sw_manager()
        .args(&["patch-strategy", "apply", "--stage-id", "5"])
        .fails()
        .stdout_eq("Strategy stage 5 apply failed\n");

    site.sw_manager()
        .args(&["patch-strategy", "apply"])
        .passes()
        .stdout_has("applying");

    site.sw_manager()
        .args(&["patch-strategy", "apply"])
        .fails()
        .stdout_eq("Strategy apply failed\n");

    site.sw_manager()
        .args(&["patch-strategy", "delete"])
        .fails()
        .stdout_eq("Strategy delete failed\n");

    site.sw_manager()
        .args(&["patch-strategy", "abort"])
        .passes()
        .stdout_has("abort-result:");

    site.sw_manager()
        .args(&["patch-strategy", "delete", "--force"])
        .passes()
        .stdout_eq("Strategy deleted\n");

    site.sw_manager()
        .args(&["patch-strategy", "show"])
        .passes()
        .stdout_eq("No strategy available\n");
}

#[test]
fn delete_without_strategy_fails() {
    let site = site();

    site.sw_manager()
        .args(&["patch-strategy", "delete"])
        .fails()
        .stdout_eq("Strategy delete failed\n");
}

#[test]
fn abort_before_apply_fails() {
    let site = site();
    site.sw_manager().args(&["patch-strategy", "create"]).passes();

    site.sw_manager()
        .args(&["patch-strategy", "abort", "--stage-id", "0"])
        .fails()
        .stdout_eq("Strategy stage 0 abort failed\n");
}
