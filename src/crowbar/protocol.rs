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

//! JSON structures of the API.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::RunState;

/// A physical or virtual machine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Node {
    /// Unique ID.
    pub id: u64,
    /// Unique name (usually the host name).
    pub name: String,
    /// ID of the deployment (pool) owning the node.
    pub deployment_id: u64,
    /// Whether the node can be allocated.
    #[serde(default)]
    pub available: bool,
    /// Whether the node is powered and reachable.
    #[serde(default)]
    pub alive: bool,
    /// Whether this is an administrative node.
    #[serde(default)]
    pub admin: bool,
    /// Whether this is a system node.
    #[serde(default)]
    pub system: bool,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Current boot environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootenv: Option<String>,
    /// When the node was last updated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<FixedOffset>>,
}

impl Node {
    /// Whether the node can be claimed.
    ///
    /// Administrative and system nodes are never eligible.
    #[inline]
    pub fn is_eligible(&self) -> bool {
        !self.admin && !self.system && self.available
    }
}

/// Fields changed when claiming or releasing a node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeUpdate {
    pub description: Option<String>,
    pub deployment_id: u64,
    pub available: bool,
}

impl From<&Node> for NodeUpdate {
    fn from(node: &Node) -> NodeUpdate {
        NodeUpdate {
            description: node.description.clone(),
            deployment_id: node.deployment_id,
            available: node.available,
        }
    }
}

/// A pool of nodes sharing a provisioning context.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Deployment {
    /// Unique ID.
    pub id: u64,
    /// Unique name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

/// A request to create a deployment.
#[derive(Debug, Clone, Serialize)]
pub struct NewDeployment {
    pub name: String,
    pub description: String,
}

/// A named unit of provisioning work.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Role {
    /// Unique ID.
    pub id: u64,
    /// Unique name.
    pub name: String,
}

/// A role scheduled against a node within a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NodeRole {
    /// Unique ID.
    pub id: u64,
    /// Deployment the binding belongs to.
    pub deployment_id: u64,
    /// Node the role runs against.
    pub node_id: u64,
    /// Role to run.
    pub role_id: u64,
    /// Ordering index, lower runs first.
    #[serde(default)]
    pub order: i64,
    /// Current run state.
    pub state: RunState,
    /// Whether the node reported an error for this role.
    #[serde(default)]
    pub node_error: bool,
    /// Last status message (if any).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A request to bind a role to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewNodeRole {
    /// Deployment to schedule the role in.
    pub deployment_id: u64,
    /// Node to run the role against.
    pub node_id: u64,
    /// Role to run.
    pub role_id: u64,
    /// Ordering index, lower runs first.
    pub order: i64,
}

/// Value of an attribute.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttribValue {
    pub value: Value,
}

/// Addresses of a node on a network.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeAddresses {
    pub addresses: Vec<String>,
}

/// Operating systems known to the provisioner.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailableOses {
    #[serde(default)]
    pub value: HashMap<String, Value>,
}

impl AvailableOses {
    /// Whether the given operating system is registered and enabled.
    pub fn contains(&self, os: &str) -> bool {
        match self.value.get(os) {
            Some(Value::Bool(enabled)) => *enabled,
            Some(Value::Null) | None => false,
            Some(_) => true,
        }
    }
}
