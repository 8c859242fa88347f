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

//! In-memory API used by unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::client::CrowbarApi;
use super::protocol::{Deployment, NewNodeRole, Node, NodeRole, Role};
use super::types::{PowerAction, RunState};
use crate::{Error, ErrorKind, Result};

/// One scripted observation of a node.
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub alive: bool,
    pub state: RunState,
    pub node_error: bool,
}

impl Observation {
    pub fn running() -> Observation {
        Observation {
            alive: true,
            state: RunState::Active,
            node_error: false,
        }
    }

    pub fn starting() -> Observation {
        Observation {
            alive: true,
            state: RunState::Transition,
            node_error: false,
        }
    }

    pub fn error() -> Observation {
        Observation {
            alive: true,
            state: RunState::Error,
            node_error: true,
        }
    }

    pub fn dead() -> Observation {
        Observation {
            alive: false,
            state: RunState::Todo,
            node_error: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub nodes: Vec<Node>,
    pub deployments: Vec<Deployment>,
    pub roles: Vec<Role>,
    pub node_roles: Vec<NodeRole>,
    pub oses: HashSet<String>,
    pub node_os: HashMap<u64, String>,
    pub keys: HashMap<(u64, u32), String>,
    pub addresses: HashMap<u64, Vec<String>>,
    pub journal: Vec<String>,
    pub script: VecDeque<Observation>,
    pub scripted_role: String,
    pub failing: HashSet<String>,
    next_id: u64,
}

/// In-memory implementation of the API.
#[derive(Debug, Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

fn not_found(what: &str, name: impl std::fmt::Display) -> Error {
    Error::new(
        ErrorKind::ResourceNotFound,
        format!("{} {} not found", what, name),
    )
}

impl FakeState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&mut self, op: &str) -> Result<()> {
        if self.failing.contains(op) {
            Err(Error::new(
                ErrorKind::TransportFailure,
                format!("injected failure of {}", op),
            ))
        } else {
            Ok(())
        }
    }

    fn role_id(&self, name: &str) -> Option<u64> {
        self.roles.iter().find(|r| r.name == name).map(|r| r.id)
    }

    fn deployment_id(&self, name: &str) -> Option<u64> {
        self.deployments
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.id)
    }
}

impl FakeApi {
    pub fn new() -> FakeApi {
        FakeApi::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn add_deployment(&self, name: &str) -> u64 {
        let mut state = self.state();
        let id = state.next_id();
        state.deployments.push(Deployment {
            id,
            name: name.into(),
            description: None,
        });
        id
    }

    pub fn add_role(&self, name: &str) -> u64 {
        let mut state = self.state();
        let id = state.next_id();
        state.roles.push(Role {
            id,
            name: name.into(),
        });
        id
    }

    pub fn add_os(&self, name: &str) {
        let _ = self.state().oses.insert(name.into());
    }

    /// Add a node, eligible unless changed with the closure.
    pub fn add_node<F>(&self, name: &str, deployment: &str, tweak: F) -> u64
    where
        F: FnOnce(&mut Node),
    {
        let mut state = self.state();
        let id = state.next_id();
        let deployment_id = state.deployment_id(deployment).unwrap();
        let mut node = Node {
            id,
            name: name.into(),
            deployment_id,
            available: true,
            alive: false,
            admin: false,
            system: false,
            description: None,
            bootenv: None,
            updated_at: None,
        };
        tweak(&mut node);
        state.nodes.push(node);
        let _ = state
            .addresses
            .insert(id, vec!["fe80::1/64".into(), format!("192.168.124.{}/24", id)]);
        id
    }

    pub fn fail(&self, op: &str) {
        let _ = self.state().failing.insert(op.into());
    }

    pub fn recover(&self, op: &str) {
        let _ = self.state().failing.remove(op);
    }

    /// Script the observations returned by subsequent node fetches.
    ///
    /// Every `get_node` call consumes one observation, including the refresh
    /// at the end of provisioning. Once the script runs out, nodes keep their
    /// last observed state.
    pub fn script<I>(&self, role: &str, observations: I)
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut state = self.state();
        state.scripted_role = role.into();
        state.script.extend(observations);
    }

    pub fn node(&self, name: &str) -> Node {
        self.state()
            .nodes
            .iter()
            .find(|n| n.name == name)
            .cloned()
            .unwrap()
    }

    pub fn node_roles_of(&self, name: &str) -> Vec<NodeRole> {
        let state = self.state();
        let node = state.nodes.iter().find(|n| n.name == name).unwrap();
        state
            .node_roles
            .iter()
            .filter(|nr| nr.node_id == node.id)
            .cloned()
            .collect()
    }

    pub fn journal(&self) -> Vec<String> {
        self.state().journal.clone()
    }

    pub fn journal_contains(&self, entry: &str) -> bool {
        self.state().journal.iter().any(|e| e == entry)
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.state()
            .journal
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl CrowbarApi for FakeApi {
    async fn get_node(&self, name: &str) -> Result<Node> {
        let mut state = self.state();
        state.check("get_node")?;
        let idx = state
            .nodes
            .iter()
            .position(|n| n.name == name || n.id.to_string() == name)
            .ok_or_else(|| not_found("node", name))?;
        if let Some(obs) = state.script.pop_front() {
            let node_id = state.nodes[idx].id;
            state.nodes[idx].alive = obs.alive;
            if let Some(role_id) = state.role_id(&state.scripted_role.clone()) {
                for nr in state
                    .node_roles
                    .iter_mut()
                    .filter(|nr| nr.node_id == node_id && nr.role_id == role_id)
                {
                    nr.state = obs.state;
                    nr.node_error = obs.node_error;
                }
            }
        }
        Ok(state.nodes[idx].clone())
    }

    async fn list_nodes(&self, deployment: &str) -> Result<Vec<Node>> {
        let mut state = self.state();
        state.check("list_nodes")?;
        let id = state
            .deployment_id(deployment)
            .ok_or_else(|| not_found("deployment", deployment))?;
        Ok(state
            .nodes
            .iter()
            .filter(|n| n.deployment_id == id)
            .cloned()
            .collect())
    }

    async fn update_node(&self, node: &Node) -> Result<Node> {
        let mut state = self.state();
        state.check("update_node")?;
        state.journal.push(format!("update_node {}", node.name));
        let stored = state
            .nodes
            .iter_mut()
            .find(|n| n.id == node.id)
            .ok_or_else(|| not_found("node", &node.name))?;
        stored.description = node.description.clone();
        stored.deployment_id = node.deployment_id;
        stored.available = node.available;
        Ok(stored.clone())
    }

    async fn get_deployment(&self, name: &str) -> Result<Deployment> {
        let mut state = self.state();
        state.check("get_deployment")?;
        state
            .deployments
            .iter()
            .find(|d| d.name == name)
            .cloned()
            .ok_or_else(|| not_found("deployment", name))
    }

    async fn create_deployment(&self, name: &str, description: &str) -> Result<Deployment> {
        let mut state = self.state();
        state.check("create_deployment")?;
        state.journal.push(format!("create_deployment {}", name));
        let id = state.next_id();
        let deployment = Deployment {
            id,
            name: name.into(),
            description: Some(description.into()),
        };
        state.deployments.push(deployment.clone());
        Ok(deployment)
    }

    async fn get_role(&self, name: &str) -> Result<Role> {
        let mut state = self.state();
        state.check("get_role")?;
        state
            .roles
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .ok_or_else(|| not_found("role", name))
    }

    async fn get_node_role(&self, node: &Node, role: &str) -> Result<NodeRole> {
        let mut state = self.state();
        state.check("get_node_role")?;
        let role_id = state.role_id(role).ok_or_else(|| not_found("role", role))?;
        state
            .node_roles
            .iter()
            .rev()
            .find(|nr| nr.node_id == node.id && nr.role_id == role_id)
            .cloned()
            .ok_or_else(|| not_found("node role", format!("{}/{}", node.name, role)))
    }

    async fn bind_role(&self, request: NewNodeRole) -> Result<NodeRole> {
        let mut state = self.state();
        state.check("bind_role")?;
        state.journal.push(format!(
            "bind_role {} {} {} {}",
            request.deployment_id, request.node_id, request.role_id, request.order
        ));
        let id = state.next_id();
        let node_role = NodeRole {
            id,
            deployment_id: request.deployment_id,
            node_id: request.node_id,
            role_id: request.role_id,
            order: request.order,
            state: RunState::Proposed,
            node_error: false,
            status: None,
        };
        state.node_roles.push(node_role.clone());
        Ok(node_role)
    }

    async fn unbind_role(&self, node_role: &NodeRole) -> Result<()> {
        let mut state = self.state();
        state.check("unbind_role")?;
        state.journal.push(format!("unbind_role {}", node_role.id));
        let idx = state
            .node_roles
            .iter()
            .position(|nr| nr.id == node_role.id)
            .ok_or_else(|| not_found("node role", node_role.id))?;
        let _ = state.node_roles.remove(idx);
        Ok(())
    }

    async fn propose_node(&self, node: &Node) -> Result<()> {
        let mut state = self.state();
        state.check("propose_node")?;
        state.journal.push(format!("propose_node {}", node.name));
        Ok(())
    }

    async fn commit_node(&self, node: &Node) -> Result<()> {
        let mut state = self.state();
        state.check("commit_node")?;
        state.journal.push(format!("commit_node {}", node.name));
        Ok(())
    }

    async fn commit_deployment(&self, deployment: &Deployment) -> Result<()> {
        let mut state = self.state();
        state.check("commit_deployment")?;
        state
            .journal
            .push(format!("commit_deployment {}", deployment.name));
        Ok(())
    }

    async fn set_access_key(&self, node: &Node, slot: u32, key: &str) -> Result<()> {
        let mut state = self.state();
        state.check("set_access_key")?;
        state
            .journal
            .push(format!("set_access_key {} {}", node.name, slot));
        let _ = state.keys.insert((node.id, slot), key.into());
        Ok(())
    }

    async fn set_node_os(&self, node: &Node, os: &str) -> Result<()> {
        let mut state = self.state();
        state.check("set_node_os")?;
        if !state.oses.contains(os) {
            return Err(Error::new(ErrorKind::UnsupportedOs, os));
        }
        state.journal.push(format!("set_node_os {} {}", node.name, os));
        let _ = state.node_os.insert(node.id, os.into());
        Ok(())
    }

    async fn is_os_available(&self, os: &str) -> Result<bool> {
        let mut state = self.state();
        state.check("is_os_available")?;
        Ok(state.oses.contains(os))
    }

    async fn set_node_power(&self, node: &Node, action: PowerAction) -> Result<()> {
        let mut state = self.state();
        state.check(&format!("power {}", action))?;
        state.journal.push(format!("power {} {}", node.name, action));
        Ok(())
    }

    async fn request_retry(&self, node: &Node) -> Result<()> {
        let mut state = self.state();
        state.check("request_retry")?;
        state.journal.push(format!("retry {}", node.name));
        Ok(())
    }

    async fn request_redeploy(&self, node: &Node) -> Result<()> {
        let mut state = self.state();
        state.check("request_redeploy")?;
        state.journal.push(format!("redeploy {}", node.name));
        Ok(())
    }

    async fn node_addresses(&self, node: &Node, network: &str) -> Result<Vec<String>> {
        let mut state = self.state();
        state.check("node_addresses")?;
        if network != "admin" {
            return Err(not_found("network", network));
        }
        state
            .addresses
            .get(&node.id)
            .cloned()
            .ok_or_else(|| not_found("addresses of node", &node.name))
    }
}
