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

//! Node allocation and provisioning lifecycle.
//!
//! A node is claimed from the source pool by [claim](fn.claim.html) and
//! prepared by [provision](fn.provision.html) (or both at once by
//! [allocate](fn.allocate.html)),
//! watched by [wait_until_ready](fn.wait_until_ready.html) until the ready
//! role succeeds and returned by [release](fn.release.html).
//!
//! Operations on the same node are not serialized here: callers must not
//! run two of them concurrently for one node.

mod allocate;
mod context;
mod poller;
mod pools;
mod release;

pub use self::allocate::{
    allocate, claim, provision, select_candidate, Allocation, Claim, OS_INSTALL_ORDER, READY_ORDER,
};
pub use self::context::Context;
pub use self::poller::{
    classify, node_state, wait_until_ready, NodeState, PollOutcome, ReadinessTracker, Tick,
};
pub use self::pools::{ensure_pool, ensure_pools, PoolKind};
pub use self::release::release;

use std::fmt;

use super::crowbar::{CrowbarApi, Node, PowerAction};
use super::{Error, ErrorKind, Result};

/// Request a power action, falling back to another one on failure.
///
/// The error of the fallback action is returned if both fail.
pub async fn set_power(
    api: &dyn CrowbarApi,
    node: &Node,
    desired: PowerAction,
    fallback: PowerAction,
) -> Result<()> {
    match api.set_node_power(node, desired).await {
        Ok(()) => {
            debug!("Power {} requested for node {}", desired, node.name);
            Ok(())
        }
        Err(err) => {
            warn!(
                "Power {} failed for node {}, trying {}: {}",
                desired, node.name, fallback, err
            );
            api.set_node_power(node, fallback).await
        }
    }
}

/// Convert an error into a lifecycle failure unless it is an authentication one.
pub(crate) fn escalate<D: fmt::Display>(err: Error, kind: ErrorKind, context: D) -> Error {
    if err.kind() == ErrorKind::AuthenticationFailed {
        err
    } else {
        err.reclassify(kind, context)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Once};

    use super::super::config::{DriverConfig, PollConfig};
    use super::super::crowbar::fake::FakeApi;
    use super::Context;

    static LOGGER: Once = Once::new();

    pub fn init_logging() {
        LOGGER.call_once(|| {
            let _ = env_logger::builder().is_test(true).try_init();
        });
    }

    pub fn test_config() -> DriverConfig {
        DriverConfig {
            purge_known_hosts: false,
            poll: PollConfig {
                interval_secs: 10,
                ..PollConfig::default()
            },
            ..DriverConfig::default()
        }
    }

    /// A fake with both pools, both roles and the default OS registered.
    pub fn populated_fake() -> Arc<FakeApi> {
        init_logging();
        let fake = Arc::new(FakeApi::new());
        let config = test_config();
        let _ = fake.add_deployment(&config.source_pool);
        let _ = fake.add_deployment(&config.target_pool);
        let _ = fake.add_role(&config.os_install_role);
        let _ = fake.add_role(&config.ready_role);
        fake.add_os(&config.target_os);
        fake
    }

    pub fn context(fake: &Arc<FakeApi>) -> Context {
        Context::new(fake.clone(), test_config())
    }

    pub fn context_with(fake: &Arc<FakeApi>, config: DriverConfig) -> Context {
        Context::new(fake.clone(), config)
    }
}

#[cfg(test)]
mod test {
    use super::set_power;
    use super::test_support::populated_fake;
    use crate::crowbar::PowerAction;
    use crate::ErrorKind;

    #[tokio::test]
    async fn test_set_power_desired() {
        let fake = populated_fake();
        let _ = fake.add_node("n1", "system", |_| {});
        let node = fake.node("n1");
        set_power(&*fake, &node, PowerAction::Off, PowerAction::Reboot)
            .await
            .unwrap();
        assert_eq!(fake.journal(), vec!["power n1 off".to_string()]);
    }

    #[tokio::test]
    async fn test_set_power_fallback() {
        let fake = populated_fake();
        let _ = fake.add_node("n1", "system", |_| {});
        let node = fake.node("n1");
        fake.fail("power halt");
        set_power(&*fake, &node, PowerAction::Halt, PowerAction::Reboot)
            .await
            .unwrap();
        assert_eq!(fake.journal(), vec!["power n1 reboot".to_string()]);
    }

    #[tokio::test]
    async fn test_set_power_both_fail() {
        let fake = populated_fake();
        let _ = fake.add_node("n1", "system", |_| {});
        let node = fake.node("n1");
        fake.fail("power reboot");
        fake.fail("power reset");
        let err = set_power(&*fake, &node, PowerAction::Reboot, PowerAction::Reset)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert!(fake.journal().is_empty());
    }
}
