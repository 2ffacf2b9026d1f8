//! Credential specs
//!
//! Credentials are checked in order before the daemon is contacted.

use crate::prelude::*;

#[test]
fn missing_auth_url_is_reported_first() {
    let site = Site::empty();

    site.sw_manager_without_auth()
        .args(&["patch-strategy", "show"])
        .passes()
        .stdout_eq("Authentication URI not given\n");
}

#[test]
fn credentials_are_checked_in_order() {
    let site = Site::empty();
    let expected = [
        "Project name not given",
        "Project domain name not given",
        "Username not given",
        "User password not given",
        "User domain name not given",
        "Openstack region name not given",
        "Openstack interface not given",
    ];

    for (given, message) in expected.iter().enumerate() {
        let mut cli = site.sw_manager_without_auth();
        for (key, value) in CREDENTIALS.iter().take(given + 1) {
            cli = cli.env(key, value);
        }
        cli.args(&["upgrade-strategy", "show"])
            .passes()
            .stdout_eq(&format!("{}\n", message));
    }
}

#[test]
fn options_stand_in_for_environment() {
    let site = Site::empty();

    site.sw_manager_without_auth()
        .args(&[
            "--os-auth-url",
            "http://keystone:5000/v3",
            "--os-project-name",
            "admin",
            "patch-strategy",
            "show",
        ])
        .passes()
        .stdout_eq("Project domain name not given\n");
}
