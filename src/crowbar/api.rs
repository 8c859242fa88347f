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

//! Foundation bits exposing the REST API.

use serde_json::{json, Value};

use super::protocol::*;
use super::types::PowerAction;
use crate::session::{fetch, send, Session};
use crate::Result;

const ATTRIB_ACCESS_KEYS: &str = "crowbar-access_keys";
const ATTRIB_TARGET_OS: &str = "provisioner-target_os";
const ATTRIB_AVAILABLE_OSES: &str = "provisioner-available-oses";

/// Get a node.
pub async fn get_node<S: AsRef<str>>(session: &Session, id_or_name: S) -> Result<Node> {
    trace!("Fetching node {}", id_or_name.as_ref());
    let root: Node = fetch(session.get(&["nodes", id_or_name.as_ref()])?).await?;
    trace!("Received {:?}", root);
    Ok(root)
}

/// List nodes of a deployment.
pub async fn list_nodes<S: AsRef<str>>(session: &Session, deployment: S) -> Result<Vec<Node>> {
    trace!("Listing nodes of deployment {}", deployment.as_ref());
    let root: Vec<Node> =
        fetch(session.get(&["deployments", deployment.as_ref(), "nodes"])?).await?;
    trace!("Received nodes: {:?}", root);
    Ok(root)
}

/// Update node fields.
pub async fn update_node(session: &Session, node: &Node) -> Result<Node> {
    let id = node.id.to_string();
    let update = NodeUpdate::from(node);
    trace!("Updating node {} with {:?}", node.name, update);
    let root: Node = fetch(session.put(&["nodes", id.as_str()])?.json(&update)).await?;
    debug!("Updated node {}", root.name);
    Ok(root)
}

/// Get a deployment.
pub async fn get_deployment<S: AsRef<str>>(session: &Session, id_or_name: S) -> Result<Deployment> {
    trace!("Fetching deployment {}", id_or_name.as_ref());
    let root: Deployment = fetch(session.get(&["deployments", id_or_name.as_ref()])?).await?;
    trace!("Received {:?}", root);
    Ok(root)
}

/// Create a deployment.
pub async fn create_deployment(session: &Session, request: NewDeployment) -> Result<Deployment> {
    debug!("Creating deployment {:?}", request);
    let root: Deployment = fetch(session.post(&["deployments"])?.json(&request)).await?;
    debug!("Created deployment {} ({})", root.name, root.id);
    Ok(root)
}

/// Commit proposed changes of a deployment.
pub async fn commit_deployment(session: &Session, deployment: &Deployment) -> Result<()> {
    let id = deployment.id.to_string();
    trace!("Committing deployment {}", deployment.name);
    let _ = send(session.put(&["deployments", id.as_str(), "commit"])?).await?;
    Ok(())
}

/// Get a role.
pub async fn get_role<S: AsRef<str>>(session: &Session, id_or_name: S) -> Result<Role> {
    trace!("Fetching role {}", id_or_name.as_ref());
    let root: Role = fetch(session.get(&["roles", id_or_name.as_ref()])?).await?;
    trace!("Received {:?}", root);
    Ok(root)
}

/// Get the binding of a role to a node.
pub async fn get_node_role<S: AsRef<str>>(
    session: &Session,
    node: &Node,
    role: S,
) -> Result<NodeRole> {
    let id = node.id.to_string();
    trace!("Fetching role {} of node {}", role.as_ref(), node.name);
    let root: NodeRole = fetch(session.get(&["nodes", id.as_str(), "node_roles", role.as_ref()])?).await?;
    trace!("Received {:?}", root);
    Ok(root)
}

/// Bind a role to a node.
pub async fn create_node_role(session: &Session, request: NewNodeRole) -> Result<NodeRole> {
    debug!("Binding {:?}", request);
    let root: NodeRole = fetch(session.post(&["node_roles"])?.json(&request)).await?;
    trace!("Received {:?}", root);
    Ok(root)
}

/// Remove a role binding.
pub async fn delete_node_role(session: &Session, node_role: &NodeRole) -> Result<()> {
    let id = node_role.id.to_string();
    trace!("Deleting node role {}", id);
    let _ = send(session.delete(&["node_roles", id.as_str()])?).await?;
    debug!("Deleted node role {}", id);
    Ok(())
}

async fn node_action(session: &Session, node: &Node, action: &str) -> Result<()> {
    let id = node.id.to_string();
    trace!("Requesting {} on node {}", action, node.name);
    let _ = send(session.put(&["nodes", id.as_str(), action])?).await?;
    debug!("Requested {} on node {}", action, node.name);
    Ok(())
}

/// Enter the proposed (batched edit) mode for a node.
#[inline]
pub async fn propose_node(session: &Session, node: &Node) -> Result<()> {
    node_action(session, node, "propose").await
}

/// Commit proposed changes of a node.
#[inline]
pub async fn commit_node(session: &Session, node: &Node) -> Result<()> {
    node_action(session, node, "commit").await
}

/// Retry failed roles on a node.
#[inline]
pub async fn retry_node(session: &Session, node: &Node) -> Result<()> {
    node_action(session, node, "retry").await
}

/// Redeploy a node from scratch.
#[inline]
pub async fn redeploy_node(session: &Session, node: &Node) -> Result<()> {
    node_action(session, node, "redeploy").await
}

/// Request a power action.
pub async fn power_node(session: &Session, node: &Node, action: PowerAction) -> Result<()> {
    let id = node.id.to_string();
    trace!("Requesting power {} on node {}", action, node.name);
    let _ = send(
        session
            .put(&["nodes", id.as_str(), "power"])?
            .query(&[("poweraction", action.as_str())]),
    )
    .await?;
    debug!("Requested power {} on node {}", action, node.name);
    Ok(())
}

async fn set_node_attrib(
    session: &Session,
    node: &Node,
    attrib: &str,
    value: Value,
) -> Result<()> {
    let id = node.id.to_string();
    trace!("Setting attribute {} of node {}", attrib, node.name);
    let body = AttribValue { value };
    let _ = send(session.put(&["nodes", id.as_str(), "attribs", attrib])?.json(&body)).await?;
    Ok(())
}

/// Write an access key into a slot.
pub async fn set_access_key(session: &Session, node: &Node, slot: u32, key: &str) -> Result<()> {
    let mut keys = serde_json::Map::new();
    let _ = keys.insert(format!("machine-key-{}", slot), json!(key));
    set_node_attrib(session, node, ATTRIB_ACCESS_KEYS, Value::Object(keys)).await
}

/// Set the operating system to install.
pub async fn set_target_os(session: &Session, node: &Node, os: &str) -> Result<()> {
    set_node_attrib(session, node, ATTRIB_TARGET_OS, json!(os)).await
}

/// Get the operating system catalog.
pub async fn available_oses(session: &Session) -> Result<AvailableOses> {
    trace!("Fetching available operating systems");
    let root: AvailableOses = fetch(session.get(&["attribs", ATTRIB_AVAILABLE_OSES])?).await?;
    trace!("Received {:?}", root);
    Ok(root)
}

/// Get node addresses on a network.
pub async fn node_addresses<S: AsRef<str>>(
    session: &Session,
    node: &Node,
    network: S,
) -> Result<Vec<String>> {
    let id = node.id.to_string();
    trace!("Fetching {} addresses of node {}", network.as_ref(), node.name);
    let root: NodeAddresses = fetch(
        session
            .get(&["nodes", id.as_str(), "addresses"])?
            .query(&[("network", network.as_ref())]),
    )
    .await?;
    trace!("Received {:?}", root);
    Ok(root.addresses)
}
