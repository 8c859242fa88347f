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

//! Node release.

use super::super::crowbar::Node;
use super::super::{ErrorKind, Result};
use super::{ensure_pools, escalate, Context};

const RELEASED_DESCRIPTION: &str = "Released by Docker-Machine";
const REMOVED_KEY: &str = "key-removed";

async fn unbind(ctx: &Context, node: &Node, role: &str) {
    let node_role = match ctx.api().get_node_role(node, role).await {
        Ok(nr) => nr,
        Err(err) if err.is_not_found() => {
            debug!("Node {} has no {} role, nothing to remove", node.name, role);
            return;
        }
        Err(err) => {
            warn!("Cannot fetch role {} of node {}: {}", role, node.name, err);
            return;
        }
    };
    match ctx.api().unbind_role(&node_role).await {
        Ok(()) => debug!("Removed role {} from node {}", role, node.name),
        Err(err) if err.is_not_found() => {
            debug!("Role {} of node {} is already gone", role, node.name)
        }
        Err(err) => warn!("Cannot remove role {} from node {}: {}", role, node.name, err),
    }
}

/// Return a node to the source pool.
///
/// Safe to call on a partially allocated or already released node. Only
/// failing to move the node back is reported, other steps log a warning.
pub async fn release(ctx: &Context, node_name: &str) -> Result<()> {
    let config = ctx.config();
    let mut node = ctx.api().get_node(node_name).await.map_err(|e| {
        escalate(
            e,
            ErrorKind::ReleaseFailure,
            format!("Cannot find node {}", node_name),
        )
    })?;
    let (source, _) = ensure_pools(ctx).await.map_err(|e| {
        escalate(
            e,
            ErrorKind::ReleaseFailure,
            format!("Cannot release node {}", node_name),
        )
    })?;
    debug!("Releasing node {} back to pool {}", node.name, source.name);

    if let Err(err) = ctx.api().propose_node(&node).await {
        warn!("Cannot propose changes for node {}: {}", node.name, err);
    }

    node.available = true;
    node.description = Some(RELEASED_DESCRIPTION.into());
    node.deployment_id = source.id;
    let node = ctx.api().update_node(&node).await.map_err(|e| {
        escalate(
            e,
            ErrorKind::ReleaseFailure,
            format!("Cannot move node {} back to pool {}", node_name, source.name),
        )
    })?;

    if let Err(err) = ctx
        .api()
        .set_access_key(&node, config.key_slot, REMOVED_KEY)
        .await
    {
        warn!("Cannot remove the access key of node {}: {}", node.name, err);
    }

    unbind(ctx, &node, &config.ready_role).await;
    unbind(ctx, &node, &config.os_install_role).await;

    if let Err(err) = ctx.api().request_redeploy(&node).await {
        warn!("Cannot request redeploy of node {}: {}", node.name, err);
    }
    if let Err(err) = ctx.api().commit_node(&node).await {
        warn!("Cannot commit changes for node {}: {}", node.name, err);
    }

    info!("Released node {} to pool {}", node.name, source.name);
    Ok(())
}
