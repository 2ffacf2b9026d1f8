//! Shared helpers for specs
//!
//! A `Site` is an isolated state directory with an optional lab
//! inventory. `site.sw_manager()` builds a CLI invocation with every
//! credential set; assertions chain off `passes()` / `fails()`.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::cargo::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Longest a spec waits for the daemon to settle
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

/// Two controllers and one worker with a patch waiting to go on the worker
pub const PATCH_LAB: &str = r#"
[[hosts]]
uuid = "c0"
name = "controller-0"
personality = ["controller"]
admin_state = "unlocked"
oper_state = "enabled"
avail_status = "available"

[[hosts]]
uuid = "c1"
name = "controller-1"
personality = ["controller"]
admin_state = "unlocked"
oper_state = "enabled"
avail_status = "available"

[[hosts]]
uuid = "w0"
name = "compute-0"
personality = ["worker"]
admin_state = "unlocked"
oper_state = "enabled"
avail_status = "available"

[[sw_patches]]
name = "PATCH_0001"
sw_version = "1.0"
repo_state = "Applied"
patch_state = "Partial-Apply"

[[sw_patch_hosts]]
name = "compute-0"
personality = ["worker"]
"#;

/// Poll `check` until it holds or `max_ms` passes
pub fn wait_for(max_ms: u64, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    check()
}

pub struct Site {
    dir: TempDir,
    daemon: Option<Child>,
}

impl Site {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            daemon: None,
        }
    }

    /// A site whose daemon simulates `lab`
    pub fn with_lab(lab: &str) -> Self {
        let site = Self::empty();
        site.file("lab.toml", lab);
        site.file(
            "vimd.toml",
            &format!(
                "[nfvi]\ninventory = {:?}\n\n[daemon]\ntimer_tick = \"100ms\"\n",
                site.path().join("lab.toml").display().to_string()
            ),
        );
        site
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn socket_path(&self) -> PathBuf {
        self.path().join("vimd.sock")
    }

    pub fn file(&self, name: &str, content: &str) {
        std::fs::write(self.path().join(name), content).unwrap();
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.path().join(name)).unwrap_or_default()
    }

    /// Start nfv-vimd and wait for its socket
    pub fn start_daemon(&mut self) {
        let child = Command::new(cargo_bin("nfv-vimd"))
            .env("NFV_STATE_DIR", self.path())
            .env_remove("NFV_SOCKET_DIR")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        self.daemon = Some(child);

        let socket = self.socket_path();
        assert!(
            wait_for(SPEC_WAIT_MAX_MS, || socket.exists()),
            "daemon did not start:\n{}",
            self.read("vimd.log")
        );
    }

    /// Kill the daemon without a clean shutdown, as a crash would
    pub fn stop_daemon(&mut self) {
        if let Some(mut child) = self.daemon.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = std::fs::remove_file(self.socket_path());
    }

    /// sw-manager with credentials and the site's socket
    pub fn sw_manager(&self) -> CliBuilder {
        let mut cmd = Self::bare_sw_manager();
        cmd.env("NFV_SOCKET", self.socket_path());
        for (key, value) in CREDENTIALS {
            cmd.env(key, value);
        }
        CliBuilder { cmd }
    }

    /// sw-manager without credentials or a socket
    pub fn sw_manager_without_auth(&self) -> CliBuilder {
        let mut cmd = Self::bare_sw_manager();
        cmd.env("NFV_SOCKET", self.socket_path());
        CliBuilder { cmd }
    }

    fn bare_sw_manager() -> Command {
        let mut cmd = Command::new(cargo_bin("sw-manager"));
        for (key, _) in CREDENTIALS {
            cmd.env_remove(key);
        }
        cmd
    }
}

impl Drop for Site {
    fn drop(&mut self) {
        self.stop_daemon();
    }
}

pub const CREDENTIALS: [(&str, &str); 8] = [
    ("OS_AUTH_URL", "http://keystone:5000/v3"),
    ("OS_PROJECT_NAME", "admin"),
    ("OS_PROJECT_DOMAIN_NAME", "Default"),
    ("OS_USERNAME", "admin"),
    ("OS_PASSWORD", "secret"),
    ("OS_USER_DOMAIN_NAME", "Default"),
    ("OS_REGION_NAME", "RegionOne"),
    ("OS_INTERFACE", "internal"),
];

pub struct CliBuilder {
    cmd: Command,
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.cmd.env(key, value);
        self
    }

    pub fn passes(mut self) -> RunAssert {
        RunAssert {
            assert: self.cmd.assert().success(),
        }
    }

    pub fn fails(mut self) -> RunAssert {
        RunAssert {
            assert: self.cmd.assert().failure(),
        }
    }
}

pub struct RunAssert {
    assert: assert_cmd::assert::Assert,
}

impl RunAssert {
    pub fn stdout_has(self, expected: &str) -> Self {
        Self {
            assert: self.assert.stdout(predicate::str::contains(expected)),
        }
    }

    pub fn stdout_lacks(self, unexpected: &str) -> Self {
        Self {
            assert: self.assert.stdout(predicate::str::contains(unexpected).not()),
        }
    }

    pub fn stdout_eq(self, expected: &str) -> Self {
        let actual = String::from_utf8_lossy(&self.assert.get_output().stdout).to_string();
        similar_asserts::assert_eq!(actual, expected);
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        Self {
            assert: self.assert.stderr(predicate::str::contains(expected)),
        }
    }

    pub fn code(self, code: i32) -> Self {
        Self {
            assert: self.assert.code(code),
        }
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.assert.get_output().stdout).to_string()
    }
}
