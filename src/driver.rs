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

//! Host lifecycle driver.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::config::DriverConfig;
use super::crowbar::{CrowbarApi, Node, PowerAction};
use super::keys::{AccessKeySource, PublicKeyFile};
use super::lifecycle::{self, Context, NodeState, PoolKind, PollOutcome};
use super::utils::first_ipv4;
use super::{Error, ErrorKind, Result};

const DOCKER_PORT: u16 = 2376;
const SSH_PORT: u16 = 22;
const SSH_USER: &str = "root";
const SSH_KEY_FILE: &str = "id_rsa";

/// A machine backed by a node.
///
/// The driver remembers the name of the claimed node; persist it with
/// [node_name](#method.node_name) and restore it with
/// [with_node](#method.with_node).
pub struct Driver {
    context: Context,
    machine_name: String,
    store_path: PathBuf,
    keys: Box<dyn AccessKeySource>,
    node_name: Option<String>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("machine_name", &self.machine_name)
            .field("store_path", &self.store_path)
            .field("node_name", &self.node_name)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl Driver {
    /// Create a driver talking to the REST API.
    ///
    /// The public key is read from `<store_path>/id_rsa.pub`.
    pub fn new<S, P>(machine_name: S, store_path: P, config: DriverConfig) -> Result<Driver>
    where
        S: Into<String>,
        P: Into<PathBuf>,
    {
        let context = Context::from_config(config)?;
        Ok(Driver::from_context(context, machine_name, store_path))
    }

    /// Create a driver over any API implementation.
    pub fn with_api<S, P>(
        api: Arc<dyn CrowbarApi>,
        machine_name: S,
        store_path: P,
        config: DriverConfig,
    ) -> Driver
    where
        S: Into<String>,
        P: Into<PathBuf>,
    {
        Driver::from_context(Context::new(api, config), machine_name, store_path)
    }

    fn from_context<S, P>(context: Context, machine_name: S, store_path: P) -> Driver
    where
        S: Into<String>,
        P: Into<PathBuf>,
    {
        let store_path = store_path.into();
        let keys = PublicKeyFile::for_private_key(store_path.join(SSH_KEY_FILE));
        Driver {
            context,
            machine_name: machine_name.into(),
            store_path,
            keys: Box::new(keys),
            node_name: None,
        }
    }

    /// Use a different source of the access key.
    pub fn with_key_source<K: AccessKeySource + 'static>(mut self, keys: K) -> Driver {
        self.keys = Box::new(keys);
        self
    }

    /// Attach a node claimed earlier.
    pub fn with_node<S: Into<String>>(mut self, node_name: S) -> Driver {
        self.node_name = Some(node_name.into());
        self
    }

    /// Name of the machine.
    #[inline]
    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }

    /// Name of the claimed node, if any.
    #[inline]
    pub fn node_name(&self) -> Option<&str> {
        self.node_name.as_deref()
    }

    /// Provisioning context.
    #[inline]
    pub fn context(&self) -> &Context {
        &self.context
    }

    fn require_node_name(&self) -> Result<&str> {
        self.node_name.as_deref().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("Machine {} has no node assigned", self.machine_name),
            )
        })
    }

    async fn fetch_node(&self) -> Result<Node> {
        let name = self.require_node_name()?;
        self.context.api().get_node(name).await.map_err(|e| {
            if e.is_not_found() {
                warn!(
                    "Did not find node {} assigned to machine {}",
                    name, self.machine_name
                );
            }
            e
        })
    }

    /// Check that a machine can be created.
    ///
    /// Only fails when the source pool cannot be reached, an empty pool
    /// results in a warning.
    pub async fn pre_create_check(&self) -> Result<()> {
        let source = lifecycle::ensure_pool(&self.context, PoolKind::Source).await?;
        let candidates = self
            .context
            .api()
            .list_nodes(&source.name)
            .await
            .map_err(|e| {
                error!("Cannot list nodes of pool {}: {}", source.name, e);
                e
            })?;
        if candidates.is_empty() {
            warn!("No nodes in pool {}", source.name);
        } else {
            let eligible = candidates.iter().filter(|n| n.is_eligible()).count();
            debug!(
                "Found {} node(s) in pool {}, {} eligible",
                candidates.len(),
                source.name,
                eligible
            );
        }
        Ok(())
    }

    /// Claim a node and wait for it to become ready.
    ///
    /// The node stays attached to the driver as soon as it is claimed, even
    /// if provisioning or waiting fails, so that `remove` can release it.
    pub async fn create(&mut self, cancel: &CancellationToken) -> Result<PollOutcome> {
        if let Some(ref name) = self.node_name {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Machine {} already uses node {}", self.machine_name, name),
            ));
        }

        info!("Creating machine {}", self.machine_name);
        let claim =
            lifecycle::claim(&self.context, &self.machine_name, self.keys.as_ref()).await?;
        self.node_name = Some(claim.node.name.clone());
        let allocation = lifecycle::provision(&self.context, claim).await?;
        lifecycle::wait_until_ready(&self.context, &allocation.node, cancel).await
    }

    /// Release the node back to the source pool.
    pub async fn remove(&mut self) -> Result<()> {
        let name = self.require_node_name()?.to_string();
        info!("Removing machine {} (node {})", self.machine_name, name);
        lifecycle::release(&self.context, &name).await?;
        self.node_name = None;
        Ok(())
    }

    async fn power(&self, desired: PowerAction, fallback: PowerAction) -> Result<()> {
        let node = self.fetch_node().await?;
        debug!("Machine {}: power {} on node {}", self.machine_name, desired, node.name);
        lifecycle::set_power(self.context.api(), &node, desired, fallback).await
    }

    /// Power the node on.
    pub async fn start(&self) -> Result<()> {
        self.power(PowerAction::On, PowerAction::On).await
    }

    /// Power the node off.
    pub async fn stop(&self) -> Result<()> {
        self.power(PowerAction::Off, PowerAction::Reboot).await
    }

    /// Reboot the node.
    pub async fn restart(&self) -> Result<()> {
        self.power(PowerAction::Reboot, PowerAction::Reset).await
    }

    /// Halt the node immediately.
    pub async fn kill(&self) -> Result<()> {
        self.power(PowerAction::Halt, PowerAction::Reboot).await
    }

    /// Current state of the node, `NodeState::None` without a node.
    ///
    /// A node that no longer exists is reported as `NodeState::Error`. Other
    /// failures to fetch it are returned.
    pub async fn get_state(&self) -> Result<NodeState> {
        let name = match self.node_name {
            Some(ref name) => name,
            None => return Ok(NodeState::None),
        };
        match lifecycle::node_state(self.context.api(), name, &self.context.config().ready_role)
            .await
        {
            Err(err) if err.is_not_found() => {
                warn!(
                    "Node {} of machine {} is gone: {}",
                    name, self.machine_name, err
                );
                Ok(NodeState::Error)
            }
            other => other,
        }
    }

    /// IPv4 address of the node on the admin network.
    pub async fn get_ip(&self) -> Result<Ipv4Addr> {
        let node = self.fetch_node().await?;
        let network = &self.context.config().admin_network;
        let addresses = self.context.api().node_addresses(&node, network).await?;
        first_ipv4(&addresses).ok_or_else(|| {
            Error::new(
                ErrorKind::ResourceNotFound,
                format!(
                    "Node {} has no IPv4 address on network {} (got {:?})",
                    node.name, network, addresses
                ),
            )
        })
    }

    /// URL of the Docker daemon.
    pub async fn get_url(&self) -> Result<String> {
        let ip = self.get_ip().await?;
        Ok(format!("tcp://{}:{}", ip, DOCKER_PORT))
    }

    /// Host name to use for SSH.
    pub async fn ssh_hostname(&self) -> Result<String> {
        self.get_ip().await.map(|ip| ip.to_string())
    }

    /// Port to use for SSH.
    #[inline]
    pub fn ssh_port(&self) -> u16 {
        SSH_PORT
    }

    /// User to use for SSH.
    #[inline]
    pub fn ssh_username(&self) -> &'static str {
        SSH_USER
    }

    /// Private key to use for SSH.
    pub fn ssh_key_path(&self) -> PathBuf {
        self.store_path.join(SSH_KEY_FILE)
    }

    /// Directory with the machine files.
    #[inline]
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }
}
