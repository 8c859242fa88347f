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

//! Node allocation.

use std::net::IpAddr;

use super::super::crowbar::{Deployment, NewNodeRole, Node, NodeRole};
use super::super::keys::{known_hosts_path, purge_known_host, AccessKeySource};
use super::super::utils::{abbreviate, first_ipv4};
use super::super::{Error, ErrorKind, Result};
use super::{ensure_pools, escalate, Context};

/// Ordering index of the operating system installation role.
pub const OS_INSTALL_ORDER: i64 = 1000;

/// Ordering index of the ready role, always after the installation.
pub const READY_ORDER: i64 = 2000;

/// A claimed node with its provisioning roles.
#[derive(Debug, Clone)]
pub struct Allocation {
    /// The node as seen after committing the changes.
    pub node: Node,
    /// Binding of the operating system installation role.
    pub os_install: NodeRole,
    /// Binding of the ready role.
    pub ready: NodeRole,
}

/// First node that can be claimed, in the listed order.
pub fn select_candidate(nodes: &[Node]) -> Option<&Node> {
    nodes.iter().find(|node| node.is_eligible())
}

fn claim_description(owner: &str) -> String {
    format!("Docker-Machine {}", owner)
}

async fn bind(
    ctx: &Context,
    target: &Deployment,
    node: &Node,
    role_name: &str,
    order: i64,
) -> Result<NodeRole> {
    let context = || format!("Cannot bind role {} to node {}", role_name, node.name);
    let role = ctx
        .api()
        .get_role(role_name)
        .await
        .map_err(|e| escalate(e, ErrorKind::RoleBindFailure, context()))?;
    let node_role = ctx
        .api()
        .bind_role(NewNodeRole {
            deployment_id: target.id,
            node_id: node.id,
            role_id: role.id,
            order,
        })
        .await
        .map_err(|e| escalate(e, ErrorKind::RoleBindFailure, context()))?;
    debug!(
        "Bound role {} ({}) to node {} with order {}",
        role.name, role.id, node.name, order
    );
    Ok(node_role)
}

async fn purge_host_key(ctx: &Context, node: &Node) -> Result<()> {
    let addresses = ctx
        .api()
        .node_addresses(node, &ctx.config().admin_network)
        .await?;
    let ip = match first_ipv4(&addresses) {
        Some(ip) => ip,
        None => {
            debug!("Node {} has no IPv4 address, nothing to purge", node.name);
            return Ok(());
        }
    };
    let known_hosts = match known_hosts_path() {
        Some(path) if path.exists() => path,
        _ => {
            debug!("No known hosts file, not purging {}", ip);
            return Ok(());
        }
    };
    purge_known_host(&known_hosts, IpAddr::V4(ip))
        .await
        .map_err(|e| {
            Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "You may need to run \"ssh-keygen -f {} -R {}\": {}",
                    known_hosts.display(),
                    ip,
                    e
                ),
            )
        })
}

/// A node moved to the target pool, not yet provisioned.
#[derive(Debug, Clone)]
pub struct Claim {
    /// The node as returned by the ownership update.
    pub node: Node,
    /// Public key to inject during provisioning.
    pub public_key: String,
}

/// Claim a node from the source pool.
///
/// The owner (usually the machine name) is recorded in the node description.
/// The operating system and the access key are checked before claiming, so
/// these failures leave the source pool untouched.
pub async fn claim(ctx: &Context, owner: &str, keys: &dyn AccessKeySource) -> Result<Claim> {
    let config = ctx.config();
    let (source, target) = ensure_pools(ctx).await?;

    debug!("Allocating a node for {} from pool {}", owner, source.name);
    let candidates = ctx.api().list_nodes(&source.name).await?;
    let mut node = select_candidate(&candidates)
        .cloned()
        .ok_or_else(|| {
            Error::new(
                ErrorKind::NoEligibleNode,
                format!(
                    "No eligible node in pool {} ({} node(s) checked)",
                    source.name,
                    candidates.len()
                ),
            )
        })?;
    debug!("Picked node {} ({}) for {}", node.name, node.id, owner);

    if !ctx.api().is_os_available(&config.target_os).await? {
        return Err(Error::new(
            ErrorKind::UnsupportedOs,
            format!(
                "Operating system {} is not configured, node {} was not claimed",
                config.target_os, node.name
            ),
        ));
    }
    let public_key = keys.public_key().await?;

    node.description = Some(claim_description(owner));
    node.deployment_id = target.id;
    let node = ctx.api().update_node(&node).await.map_err(|e| {
        escalate(
            e,
            ErrorKind::UpdateFailure,
            format!("Cannot move node {} to pool {}", node.name, target.name),
        )
    })?;
    info!(
        "Claimed node {} for {}, moved from {} to {}",
        node.name, owner, source.name, target.name
    );
    Ok(Claim { node, public_key })
}

/// Schedule provisioning of a claimed node.
///
/// Failures leave the node claimed: use [release](fn.release.html) to
/// recover.
pub async fn provision(ctx: &Context, claim: Claim) -> Result<Allocation> {
    let config = ctx.config();
    let (_, target) = ensure_pools(ctx).await?;
    let Claim { node, public_key } = claim;

    let update_failure = |e: Error, what: &str| {
        escalate(
            e,
            ErrorKind::UpdateFailure,
            format!("Cannot {} for node {}", what, node.name),
        )
    };

    ctx.api()
        .propose_node(&node)
        .await
        .map_err(|e| update_failure(e, "propose changes"))?;

    let os_install = bind(ctx, target, &node, &config.os_install_role, OS_INSTALL_ORDER).await?;
    let ready = bind(ctx, target, &node, &config.ready_role, READY_ORDER).await?;

    ctx.api()
        .set_access_key(&node, config.key_slot, &public_key)
        .await
        .map_err(|e| update_failure(e, "inject the access key"))?;
    debug!(
        "Added public key [{}...] to node {}",
        abbreviate(&public_key, 25),
        node.name
    );

    ctx.api()
        .set_node_os(&node, &config.target_os)
        .await
        .map_err(|e| {
            if e.kind() == ErrorKind::UnsupportedOs {
                e
            } else {
                update_failure(e, "set the operating system")
            }
        })?;
    debug!("Set operating system of node {} to {}", node.name, config.target_os);

    ctx.api()
        .commit_node(&node)
        .await
        .map_err(|e| update_failure(e, "commit changes"))?;
    let node = ctx.api().get_node(&node.name).await?;

    if config.purge_known_hosts {
        if let Err(err) = purge_host_key(ctx, &node).await {
            warn!("Cannot purge the host key of node {}: {}", node.name, err);
        }
    }

    info!(
        "Preparing node {} with role {} (may take up to {} seconds)",
        node.name,
        config.ready_role,
        u64::from(config.poll.max_ticks).saturating_mul(config.poll.interval_secs)
    );
    Ok(Allocation {
        node,
        os_install,
        ready,
    })
}

/// Claim a node and schedule its provisioning.
///
/// Failures after the claim leave the node claimed. Callers that need to
/// release it should use [claim](fn.claim.html) and
/// [provision](fn.provision.html) to learn its name first.
pub async fn allocate(
    ctx: &Context,
    owner: &str,
    keys: &dyn AccessKeySource,
) -> Result<Allocation> {
    let claimed = claim(ctx, owner, keys).await?;
    provision(ctx, claimed).await
}

#[cfg(test)]
mod test {
    use super::super::test_support::{context, context_with, populated_fake, test_config};
    use super::{allocate, claim, provision, select_candidate, OS_INSTALL_ORDER, READY_ORDER};
    use crate::crowbar::fake::FakeApi;
    use crate::keys::StaticKey;
    use crate::ErrorKind;

    const KEY: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQ test@example.com";

    fn deployment_id(fake: &FakeApi, name: &str) -> u64 {
        fake.state()
            .deployments
            .iter()
            .find(|d| d.name == name)
            .unwrap()
            .id
    }

    #[test]
    fn test_select_candidate_skips_ineligible() {
        let fake = populated_fake();
        let _ = fake.add_node("admin", "system", |n| n.admin = true);
        let _ = fake.add_node("sys", "system", |n| n.system = true);
        let _ = fake.add_node("busy", "system", |n| n.available = false);
        let _ = fake.add_node("free1", "system", |_| {});
        let _ = fake.add_node("free2", "system", |_| {});
        let nodes = fake.state().nodes.clone();
        let chosen = select_candidate(&nodes).unwrap();
        assert_eq!(chosen.name, "free1");
        // The scan is stable for an unchanged pool.
        assert_eq!(select_candidate(&nodes).unwrap().name, "free1");
    }

    #[test]
    fn test_select_candidate_none() {
        assert!(select_candidate(&[]).is_none());
    }

    #[tokio::test]
    async fn test_allocate_single_eligible() {
        let fake = populated_fake();
        let _ = fake.add_node("admin", "system", |n| n.admin = true);
        let _ = fake.add_node("d52-54-00-01", "system", |_| {});
        let ctx = context(&fake);

        let result = allocate(&ctx, "m1", &StaticKey::new(KEY)).await.unwrap();
        let target = deployment_id(&fake, "docker-machines");
        assert_eq!(result.node.name, "d52-54-00-01");
        assert_eq!(result.node.deployment_id, target);
        assert_eq!(result.node.description.as_deref(), Some("Docker-Machine m1"));
        assert_eq!(result.os_install.order, OS_INSTALL_ORDER);
        assert_eq!(result.ready.order, READY_ORDER);

        let mut orders: Vec<i64> = fake
            .node_roles_of("d52-54-00-01")
            .iter()
            .map(|nr| {
                assert_eq!(nr.deployment_id, target);
                nr.order
            })
            .collect();
        orders.sort_unstable();
        assert_eq!(orders, vec![1000, 2000]);

        let state = fake.state();
        assert_eq!(state.keys.get(&(result.node.id, 1)).map(String::as_str), Some(KEY));
        assert_eq!(
            state.node_os.get(&result.node.id).map(String::as_str),
            Some("ubuntu-14.04")
        );
    }

    #[tokio::test]
    async fn test_allocate_call_order() {
        let fake = populated_fake();
        let _ = fake.add_node("n1", "system", |_| {});
        let ctx = context(&fake);
        let _ = allocate(&ctx, "m1", &StaticKey::new(KEY)).await.unwrap();

        let journal: Vec<String> = fake
            .journal()
            .into_iter()
            .filter(|e| !e.starts_with("commit_deployment"))
            .collect();
        let position = |prefix: &str| journal.iter().position(|e| e.starts_with(prefix)).unwrap();
        assert_eq!(position("update_node"), 0);
        assert!(position("propose_node") < position("bind_role"));
        assert!(position("set_node_os") < position("commit_node"));
        assert_eq!(journal.last().map(String::as_str), Some("commit_node n1"));
    }

    #[tokio::test]
    async fn test_allocate_no_eligible_node() {
        let fake = populated_fake();
        let _ = fake.add_node("admin", "system", |n| n.admin = true);
        let _ = fake.add_node("busy", "system", |n| n.available = false);
        let ctx = context(&fake);

        let err = allocate(&ctx, "m1", &StaticKey::new(KEY))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoEligibleNode);
        assert!(err.to_string().contains("system"));
        assert_eq!(fake.count("update_node"), 0);
    }

    #[tokio::test]
    async fn test_allocate_unsupported_os() {
        let fake = populated_fake();
        let _ = fake.add_node("n1", "system", |_| {});
        let mut config = test_config();
        config.target_os = "plan9".into();
        let ctx = context_with(&fake, config);

        let err = allocate(&ctx, "m1", &StaticKey::new(KEY))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOs);
        assert_eq!(fake.count("update_node"), 0);
        assert_eq!(fake.count("commit_node"), 0);
        assert_eq!(fake.node("n1").deployment_id, deployment_id(&fake, "system"));
        assert!(fake.node_roles_of("n1").is_empty());
    }

    #[tokio::test]
    async fn test_allocate_update_failure_leaves_node() {
        let fake = populated_fake();
        let _ = fake.add_node("n1", "system", |_| {});
        fake.fail("update_node");
        let ctx = context(&fake);

        let err = allocate(&ctx, "m1", &StaticKey::new(KEY))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpdateFailure);
        let node = fake.node("n1");
        assert!(node.available);
        assert_eq!(node.deployment_id, deployment_id(&fake, "system"));
    }

    #[tokio::test]
    async fn test_allocate_missing_role() {
        let fake = std::sync::Arc::new(FakeApi::new());
        let _ = fake.add_deployment("system");
        let _ = fake.add_deployment("docker-machines");
        let _ = fake.add_role("crowbar-installed-node");
        fake.add_os("ubuntu-14.04");
        let _ = fake.add_node("n1", "system", |_| {});
        let ctx = context(&fake);

        let err = allocate(&ctx, "m1", &StaticKey::new(KEY))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RoleBindFailure);
        assert!(err.to_string().contains("docker-ready"));
        // Left claimed for the caller to release.
        assert_eq!(
            fake.node("n1").deployment_id,
            deployment_id(&fake, "docker-machines")
        );
    }

    #[tokio::test]
    async fn test_allocate_list_failure() {
        let fake = populated_fake();
        fake.fail("list_nodes");
        let ctx = context(&fake);
        let err = allocate(&ctx, "m1", &StaticKey::new(KEY))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
    }

    #[tokio::test]
    async fn test_allocate_purge_failure_ignored() {
        let fake = populated_fake();
        let _ = fake.add_node("n1", "system", |_| {});
        fake.fail("node_addresses");
        let mut config = test_config();
        config.purge_known_hosts = true;
        let ctx = context_with(&fake, config);

        let result = allocate(&ctx, "m1", &StaticKey::new(KEY)).await.unwrap();
        assert_eq!(result.node.name, "n1");
    }

    #[tokio::test]
    async fn test_claim_then_provision() {
        let fake = populated_fake();
        let _ = fake.add_node("n1", "system", |_| {});
        let ctx = context(&fake);

        let claimed = claim(&ctx, "m1", &StaticKey::new(KEY)).await.unwrap();
        assert_eq!(claimed.node.name, "n1");
        assert_eq!(claimed.public_key, KEY);
        assert_eq!(claimed.node.deployment_id, deployment_id(&fake, "docker-machines"));
        assert_eq!(fake.count("propose_node"), 0);

        let result = provision(&ctx, claimed).await.unwrap();
        assert_eq!(result.node.name, "n1");
        assert_eq!(fake.count("commit_node"), 1);
    }

    #[tokio::test]
    async fn test_allocate_huge_poll_interval() {
        let fake = populated_fake();
        let _ = fake.add_node("n1", "system", |_| {});
        let mut config = test_config();
        config.poll.interval_secs = u64::MAX;
        let ctx = context_with(&fake, config);

        let result = allocate(&ctx, "m1", &StaticKey::new(KEY)).await.unwrap();
        assert_eq!(result.node.name, "n1");
    }
}
