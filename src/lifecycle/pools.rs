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

//! Pool resolution.

use std::fmt;

use super::super::crowbar::Deployment;
use super::super::{ErrorKind, Result};
use super::{escalate, Context};

const POOL_DESCRIPTION: &str = "Added for Docker Machine";

/// Logical pool used by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// Pool with free nodes.
    Source,
    /// Pool with claimed nodes.
    Target,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PoolKind::Source => "source",
            PoolKind::Target => "target",
        })
    }
}

impl PoolKind {
    fn name(self, ctx: &Context) -> &str {
        match self {
            PoolKind::Source => &ctx.config().source_pool,
            PoolKind::Target => &ctx.config().target_pool,
        }
    }
}

async fn resolve(ctx: &Context, kind: PoolKind) -> Result<Deployment> {
    let name = kind.name(ctx);
    let deployment = match ctx.api().get_deployment(name).await {
        Ok(deployment) => deployment,
        Err(err) if err.is_not_found() => {
            warn!("Adding {} pool {}", kind, name);
            let _ = ctx
                .api()
                .create_deployment(name, POOL_DESCRIPTION)
                .await
                .map_err(|e| {
                    escalate(e, ErrorKind::PoolCreateFailure, format!("Cannot create pool {}", name))
                })?;
            ctx.api().get_deployment(name).await.map_err(|e| {
                escalate(e, ErrorKind::PoolCreateFailure, format!("Cannot fetch new pool {}", name))
            })?
        }
        Err(err) => {
            return Err(escalate(
                err,
                ErrorKind::PoolCreateFailure,
                format!("Cannot fetch pool {}", name),
            ))
        }
    };

    if kind == PoolKind::Target {
        if let Err(err) = ctx.api().commit_deployment(&deployment).await {
            warn!("Cannot commit {} pool {}: {}", kind, name, err);
        }
    }

    debug!("Resolved {} pool {} ({})", kind, deployment.name, deployment.id);
    Ok(deployment)
}

/// Resolve a pool, creating it if it does not exist.
///
/// The result is cached in the context, later calls make no requests.
pub async fn ensure_pool(ctx: &Context, kind: PoolKind) -> Result<&Deployment> {
    ctx.pool_cell(kind)
        .get_or_try_init(|| resolve(ctx, kind))
        .await
}

/// Resolve both pools, returning `(source, target)`.
pub async fn ensure_pools(ctx: &Context) -> Result<(&Deployment, &Deployment)> {
    let target = ensure_pool(ctx, PoolKind::Target).await?;
    let source = ensure_pool(ctx, PoolKind::Source).await?;
    Ok((source, target))
}
