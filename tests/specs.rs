//! Behavioral specifications for sw-manager and nfv-vimd.
//!
//! These tests are black-box: they invoke the binaries and verify
//! stdout, stderr, and exit codes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// cli/
#[path = "specs/cli/auth.rs"]
mod cli_auth;
#[path = "specs/cli/errors.rs"]
mod cli_errors;
#[path = "specs/cli/help.rs"]
mod cli_help;

// daemon/
#[path = "specs/daemon/lifecycle.rs"]
mod daemon_lifecycle;

// strategy/
#[path = "specs/strategy/patch.rs"]
mod strategy_patch;
#[path = "specs/strategy/upgrade.rs"]
mod strategy_upgrade;
