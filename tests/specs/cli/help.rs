//! Help output specs

use crate::prelude::*;

#[test]
fn help_lists_strategy_commands() {
    let site = Site::empty();

    site.sw_manager()
        .args(&["--help"])
        .passes()
        .stdout_has("patch-strategy")
        .stdout_has("upgrade-strategy");
}

#[test]
fn strategy_help_lists_actions() {
    let site = Site::empty();

    site.sw_manager()
        .args(&["patch-strategy", "--help"])
        .passes()
        .stdout_has("create")
        .stdout_has("delete")
        .stdout_has("apply")
        .stdout_has("abort")
        .stdout_has("show");
}

#[test]
fn force_is_hidden() {
    let site = Site::empty();

    site.sw_manager()
        .args(&["patch-strategy", "delete", "--help"])
        .passes()
        .stdout_lacks("--force");
}
