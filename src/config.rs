// Copyright 2026 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Driver configuration.
//!
//! Configuration can be built in code, read from environment variables
//! (`OCB_URL`, `OCB_USER`, `OCB_PASSWORD`) or loaded from a YAML file.
//! Every field is optional in the file.
//!
//! ```yaml
//! url: http://192.168.124.10:3000
//! user: crowbar
//! target_pool: docker-machines
//! poll:
//!   interval_secs: 10
//!   error_budget: 3
//! ```

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::{Error, ErrorKind, Result};

/// Environment variable with the API URL.
pub const ENV_URL: &str = "OCB_URL";
/// Environment variable with the user name.
pub const ENV_USER: &str = "OCB_USER";
/// Environment variable with the password.
pub const ENV_PASSWORD: &str = "OCB_PASSWORD";

/// What to do when the node has not been confirmed ready in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutPolicy {
    /// Fail with `ProvisioningTimeout`.
    #[default]
    Fail,
    /// Log a warning and report `PollOutcome::TimedOut`.
    Accept,
}

/// Polling budgets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay between two observations, in seconds.
    pub interval_secs: u64,
    /// Maximum number of observations.
    pub max_ticks: u32,
    /// Number of remote-reported errors tolerated (each followed by a retry).
    pub error_budget: u32,
    /// Number of consecutive "running" observations required.
    pub confirm_budget: u32,
    /// Outcome when `max_ticks` is exhausted.
    pub on_timeout: TimeoutPolicy,
}

/// Configuration of the driver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// API URL (including the port).
    pub url: String,
    /// User name.
    pub user: String,
    /// Password.
    ///
    /// When missing, a well-known default password is used.
    pub password: Option<String>,
    /// Pool with free nodes.
    pub source_pool: String,
    /// Pool with provisioned nodes.
    pub target_pool: String,
    /// Operating system to install.
    pub target_os: String,
    /// Role installing the operating system.
    pub os_install_role: String,
    /// Role whose success means the node is ready.
    pub ready_role: String,
    /// Network to take the node address from.
    pub admin_network: String,
    /// Slot for the access key.
    pub key_slot: u32,
    /// Whether to remove the node address from `~/.ssh/known_hosts` after a claim.
    pub purge_known_hosts: bool,
    /// Polling budgets.
    pub poll: PollConfig,
}

impl Default for PollConfig {
    fn default() -> PollConfig {
        PollConfig {
            interval_secs: 10,
            max_ticks: 90,
            error_budget: 3,
            confirm_budget: 2,
            on_timeout: TimeoutPolicy::Fail,
        }
    }
}

impl PollConfig {
    /// Delay between two observations.
    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.max_ticks == 0 || self.error_budget == 0 || self.confirm_budget == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "Polling budgets must be positive, got max_ticks={}, error_budget={}, confirm_budget={}",
                    self.max_ticks, self.error_budget, self.confirm_budget
                ),
            ));
        }
        Ok(())
    }
}

impl Default for DriverConfig {
    fn default() -> DriverConfig {
        DriverConfig {
            url: "http://192.168.124.10:3000".into(),
            user: "crowbar".into(),
            password: None,
            source_pool: "system".into(),
            target_pool: "docker-machines".into(),
            target_os: "ubuntu-14.04".into(),
            os_install_role: "crowbar-installed-node".into(),
            ready_role: "docker-ready".into(),
            admin_network: "admin".into(),
            key_slot: 1,
            purge_known_hosts: true,
            poll: PollConfig::default(),
        }
    }
}

impl DriverConfig {
    /// Default configuration with values from the environment applied.
    pub fn from_env() -> Result<DriverConfig> {
        let mut result = DriverConfig::default();
        result.apply_env(|name| env::var(name).ok());
        result.validate()?;
        Ok(result)
    }

    /// Load the configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<DriverConfig> {
        let path = path.as_ref();
        debug!("Loading driver configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("Cannot read {}: {}", path.display(), e),
            )
        })?;
        DriverConfig::from_yaml(&content)
    }

    /// Parse the configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<DriverConfig> {
        let result: DriverConfig = serde_yaml::from_str(content).map_err(|e| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("Invalid driver configuration: {}", e),
            )
        })?;
        result.validate()?;
        Ok(result)
    }

    /// Set the API URL.
    pub fn with_url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = url.into();
        self
    }

    /// Set the user name and password.
    pub fn with_credentials<S: Into<String>>(mut self, user: S, password: Option<String>) -> Self {
        self.user = user.into();
        self.password = password;
        self
    }

    /// Set the polling budgets.
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        self.poll.validate()?;
        for (name, value) in [
            ("source_pool", &self.source_pool),
            ("target_pool", &self.target_pool),
            ("os_install_role", &self.os_install_role),
            ("ready_role", &self.ready_role),
        ] {
            if value.is_empty() {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    format!("{} must not be empty", name),
                ));
            }
        }
        if self.source_pool == self.target_pool {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Source and target pools are both {}", self.source_pool),
            ));
        }
        Ok(())
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL) {
            self.url = url;
        }
        if let Some(user) = lookup(ENV_USER) {
            self.user = user;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.password = Some(password);
        }
    }
}
