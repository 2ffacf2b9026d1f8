// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenStack credentials
//!
//! Every option falls back to its `OS_*` environment variable. The values
//! are only checked for presence.

use clap::Args;

#[derive(Args, Debug, Default)]
pub struct AuthArgs {
    #[arg(long, env = "OS_AUTH_URL", global = true)]
    pub os_auth_url: Option<String>,

    #[arg(long, env = "OS_PROJECT_NAME", global = true)]
    pub os_project_name: Option<String>,

    #[arg(long, env = "OS_PROJECT_DOMAIN_NAME", global = true)]
    pub os_project_domain_name: Option<String>,

    #[arg(long, env = "OS_USERNAME", global = true)]
    pub os_username: Option<String>,

    #[arg(long, env = "OS_PASSWORD", global = true, hide_env_values = true)]
    pub os_password: Option<String>,

    #[arg(long, env = "OS_USER_DOMAIN_NAME", global = true)]
    pub os_user_domain_name: Option<String>,

    #[arg(long, env = "OS_REGION_NAME", global = true)]
    pub os_region_name: Option<String>,

    #[arg(long, env = "OS_INTERFACE", global = true)]
    pub os_interface: Option<String>,
}

impl AuthArgs {
    /// Message for the first credential not given, in checking order
    pub fn missing(&self) -> Option<&'static str> {
        [
            (&self.os_auth_url, "Authentication URI not given"),
            (&self.os_project_name, "Project name not given"),
            (&self.os_project_domain_name, "Project domain name not given"),
            (&self.os_username, "Username not given"),
            (&self.os_password, "User password not given"),
            (&self.os_user_domain_name, "User domain name not given"),
            (&self.os_region_name, "Openstack region name not given"),
            (&self.os_interface, "Openstack interface not given"),
        ]
        .into_iter()
        .find(|(value, _)| value.is_none())
        .map(|(_, message)| message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> AuthArgs {
        let given = || Some("x".to_string());
        AuthArgs {
            os_auth_url: given(),
            os_project_name: given(),
            os_project_domain_name: given(),
            os_username: given(),
            os_password: given(),
            os_user_domain_name: given(),
            os_region_name: given(),
            os_interface: given(),
        }
    }

    #[test]
    fn nothing_missing() {
        assert_eq!(complete().missing(), None);
    }

    #[test]
    fn first_missing_wins() {
        let auth = AuthArgs {
            os_username: None,
            os_interface: None,
            ..complete()
        };
        assert_eq!(auth.missing(), Some("Username not given"));

        assert_eq!(AuthArgs::default().missing(), Some("Authentication URI not given"));
    }

    #[test]
    fn interface_checked_last() {
        let auth = AuthArgs {
            os_interface: None,
            ..complete()
        };
        assert_eq!(auth.missing(), Some("Openstack interface not given"));
    }
}
