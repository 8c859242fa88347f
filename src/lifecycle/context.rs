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

//! Provisioning context.

use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;

use super::super::config::DriverConfig;
use super::super::crowbar::{CrowbarApi, Deployment, HttpClient};
use super::super::Result;
use super::pools::PoolKind;

/// State shared by all provisioning operations.
///
/// Holds the API client, the configuration and the pools resolved so far.
/// Pools are resolved at most once per context.
pub struct Context {
    api: Arc<dyn CrowbarApi>,
    config: DriverConfig,
    source: OnceCell<Deployment>,
    target: OnceCell<Deployment>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("source", &self.source.get())
            .field("target", &self.target.get())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Create a context over any API implementation.
    pub fn new(api: Arc<dyn CrowbarApi>, config: DriverConfig) -> Context {
        Context {
            api,
            config,
            source: OnceCell::new(),
            target: OnceCell::new(),
        }
    }

    /// Create a context talking to the REST API from the configuration.
    ///
    /// No requests are made until the first operation.
    pub fn from_config(config: DriverConfig) -> Result<Context> {
        config.validate()?;
        let client = HttpClient::new(
            config.url.clone(),
            config.user.clone(),
            config.password.clone(),
        );
        Ok(Context::new(Arc::new(client), config))
    }

    /// API client.
    #[inline]
    pub fn api(&self) -> &dyn CrowbarApi {
        self.api.as_ref()
    }

    /// Driver configuration.
    #[inline]
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Pool of the given kind, if already resolved.
    #[inline]
    pub fn resolved_pool(&self, kind: PoolKind) -> Option<&Deployment> {
        self.pool_cell(kind).get()
    }

    pub(crate) fn pool_cell(&self, kind: PoolKind) -> &OnceCell<Deployment> {
        match kind {
            PoolKind::Source => &self.source,
            PoolKind::Target => &self.target,
        }
    }
}
