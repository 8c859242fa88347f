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

//! Client abstraction used by the provisioning core.

use async_trait::async_trait;

use super::protocol::{Deployment, NewDeployment, NewNodeRole, Node, NodeRole, Role};
use super::types::PowerAction;
use super::api;
use crate::session::{Session, SessionCell};
use crate::Result;

/// Operations the provisioning core needs from the remote API.
///
/// Missing entities are reported with `ErrorKind::ResourceNotFound`.
#[async_trait]
pub trait CrowbarApi: Send + Sync {
    /// Fetch a node by name or ID.
    async fn get_node(&self, name: &str) -> Result<Node>;

    /// List nodes of a deployment in the order the server returns them.
    async fn list_nodes(&self, deployment: &str) -> Result<Vec<Node>>;

    /// Persist the owner, description and availability of a node.
    async fn update_node(&self, node: &Node) -> Result<Node>;

    /// Fetch a deployment by name or ID.
    async fn get_deployment(&self, name: &str) -> Result<Deployment>;

    /// Create a deployment.
    async fn create_deployment(&self, name: &str, description: &str) -> Result<Deployment>;

    /// Fetch a role by name or ID.
    async fn get_role(&self, name: &str) -> Result<Role>;

    /// Fetch the binding of the named role to a node.
    async fn get_node_role(&self, node: &Node, role: &str) -> Result<NodeRole>;

    /// Bind a role to a node within a deployment.
    async fn bind_role(&self, request: NewNodeRole) -> Result<NodeRole>;

    /// Remove a role binding.
    async fn unbind_role(&self, node_role: &NodeRole) -> Result<()>;

    /// Enter the proposed (batched edit) mode for a node.
    async fn propose_node(&self, node: &Node) -> Result<()>;

    /// Commit proposed changes of a node.
    async fn commit_node(&self, node: &Node) -> Result<()>;

    /// Commit proposed changes of a deployment.
    async fn commit_deployment(&self, deployment: &Deployment) -> Result<()>;

    /// Write an access key into a key slot of a node.
    async fn set_access_key(&self, node: &Node, slot: u32, key: &str) -> Result<()>;

    /// Set the operating system to install on a node.
    async fn set_node_os(&self, node: &Node, os: &str) -> Result<()>;

    /// Whether the operating system is registered in the catalog.
    async fn is_os_available(&self, os: &str) -> Result<bool>;

    /// Request a single power action.
    async fn set_node_power(&self, node: &Node, action: PowerAction) -> Result<()>;

    /// Retry failed roles of a node.
    async fn request_retry(&self, node: &Node) -> Result<()>;

    /// Redeploy a node, clearing its provisioning markers.
    async fn request_redeploy(&self, node: &Node) -> Result<()>;

    /// Addresses of a node on a network (`address/prefix` strings).
    async fn node_addresses(&self, node: &Node, network: &str) -> Result<Vec<String>>;
}

/// REST implementation of [CrowbarApi](trait.CrowbarApi.html).
///
/// The session is created lazily on the first request.
#[derive(Debug)]
pub struct HttpClient {
    session: SessionCell,
}

impl HttpClient {
    /// Create a client that authenticates on first use.
    pub fn new<U, S>(url: U, user: S, password: Option<String>) -> HttpClient
    where
        U: Into<String>,
        S: Into<String>,
    {
        HttpClient {
            session: SessionCell::new(url, user, password),
        }
    }

    /// Create a client from an existing session.
    pub fn from_session(session: Session) -> HttpClient {
        HttpClient {
            session: SessionCell::from_session(session),
        }
    }

    #[inline]
    async fn session(&self) -> Result<&Session> {
        self.session.ensure().await
    }
}

#[async_trait]
impl CrowbarApi for HttpClient {
    async fn get_node(&self, name: &str) -> Result<Node> {
        api::get_node(self.session().await?, name).await
    }

    async fn list_nodes(&self, deployment: &str) -> Result<Vec<Node>> {
        api::list_nodes(self.session().await?, deployment).await
    }

    async fn update_node(&self, node: &Node) -> Result<Node> {
        api::update_node(self.session().await?, node).await
    }

    async fn get_deployment(&self, name: &str) -> Result<Deployment> {
        api::get_deployment(self.session().await?, name).await
    }

    async fn create_deployment(&self, name: &str, description: &str) -> Result<Deployment> {
        let request = NewDeployment {
            name: name.into(),
            description: description.into(),
        };
        api::create_deployment(self.session().await?, request).await
    }

    async fn get_role(&self, name: &str) -> Result<Role> {
        api::get_role(self.session().await?, name).await
    }

    async fn get_node_role(&self, node: &Node, role: &str) -> Result<NodeRole> {
        api::get_node_role(self.session().await?, node, role).await
    }

    async fn bind_role(&self, request: NewNodeRole) -> Result<NodeRole> {
        api::create_node_role(self.session().await?, request).await
    }

    async fn unbind_role(&self, node_role: &NodeRole) -> Result<()> {
        api::delete_node_role(self.session().await?, node_role).await
    }

    async fn propose_node(&self, node: &Node) -> Result<()> {
        api::propose_node(self.session().await?, node).await
    }

    async fn commit_node(&self, node: &Node) -> Result<()> {
        api::commit_node(self.session().await?, node).await
    }

    async fn commit_deployment(&self, deployment: &Deployment) -> Result<()> {
        api::commit_deployment(self.session().await?, deployment).await
    }

    async fn set_access_key(&self, node: &Node, slot: u32, key: &str) -> Result<()> {
        api::set_access_key(self.session().await?, node, slot, key).await
    }

    async fn set_node_os(&self, node: &Node, os: &str) -> Result<()> {
        api::set_target_os(self.session().await?, node, os).await
    }

    async fn is_os_available(&self, os: &str) -> Result<bool> {
        let catalog = api::available_oses(self.session().await?).await?;
        Ok(catalog.contains(os))
    }

    async fn set_node_power(&self, node: &Node, action: PowerAction) -> Result<()> {
        api::power_node(self.session().await?, node, action).await
    }

    async fn request_retry(&self, node: &Node) -> Result<()> {
        api::retry_node(self.session().await?, node).await
    }

    async fn request_redeploy(&self, node: &Node) -> Result<()> {
        api::redeploy_node(self.session().await?, node).await
    }

    async fn node_addresses(&self, node: &Node, network: &str) -> Result<Vec<String>> {
        api::node_addresses(self.session().await?, node, network).await
    }
}
