//! CLI error specs

use crate::prelude::*;

#[test]
fn no_daemon_fails_with_error() {
    let site = Site::empty();

    site.sw_manager()
        .args(&["patch-strategy", "show"])
        .fails()
        .stderr_has("Daemon not running");
}

#[test]
fn unknown_apply_type_is_rejected() {
    let site = Site::empty();

    site.sw_manager()
        .args(&["patch-strategy", "create", "--controller-apply-type", "parallel"])
        .fails()
        .stderr_has("invalid value 'parallel'");
}

#[test]
fn parallel_limit_is_enforced() {
    let site = Site::empty();

    site.sw_manager()
        .args(&["upgrade-strategy", "create", "--max-parallel-compute-hosts", "11"])
        .fails()
        .stderr_has("11");
}
