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

//! Waiting for a node to become ready.

use std::fmt;

use tokio_util::sync::CancellationToken;

use super::super::config::{PollConfig, TimeoutPolicy};
use super::super::crowbar::{CrowbarApi, Node, NodeRole};
use super::super::{Error, ErrorKind, Result};
use super::Context;

/// Coarse state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// No node is known.
    None,
    /// Provisioning is in progress.
    Starting,
    /// The ready role has succeeded.
    Running,
    /// The node is not alive.
    Stopped,
    /// The ready role has failed or is missing.
    Error,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeState::None => "none",
            NodeState::Starting => "starting",
            NodeState::Running => "running",
            NodeState::Stopped => "stopped",
            NodeState::Error => "error",
        })
    }
}

/// Classify a snapshot of a node and its ready role binding.
pub fn classify(node: &Node, ready: Option<&NodeRole>) -> NodeState {
    if !node.alive {
        return NodeState::Stopped;
    }
    match ready {
        None => NodeState::Error,
        Some(nr) if nr.node_error || nr.state.is_failure() => NodeState::Error,
        Some(nr) if nr.state.is_success() => NodeState::Running,
        Some(_) => NodeState::Starting,
    }
}

/// Fetch a fresh view of a node and classify it.
///
/// A missing ready role binding is reported as `NodeState::Error`, any other
/// failure is returned as is.
pub async fn node_state(
    api: &dyn CrowbarApi,
    node_name: &str,
    ready_role: &str,
) -> Result<NodeState> {
    let node = api.get_node(node_name).await?;
    if !node.alive {
        return Ok(classify(&node, None));
    }
    match api.get_node_role(&node, ready_role).await {
        Ok(nr) => Ok(classify(&node, Some(&nr))),
        Err(err) if err.is_not_found() => {
            debug!("Node {} has no {} role: {}", node_name, ready_role, err);
            Ok(classify(&node, None))
        }
        Err(err) => Err(err),
    }
}

/// Decision after one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Keep polling.
    Continue,
    /// An error was observed, keep polling.
    Retry,
    /// The node is confirmed ready.
    Ready,
    /// The error budget is exhausted.
    Failed,
    /// The tick budget is exhausted.
    TimedOut,
}

/// Budgets of a single wait.
///
/// Feed it one observation per tick, stop on `Ready`, `Failed` or `TimedOut`.
#[derive(Debug, Clone)]
pub struct ReadinessTracker {
    ticks_left: u32,
    errors_left: u32,
    confirms_left: u32,
    confirm_budget: u32,
    last_state: NodeState,
}

impl ReadinessTracker {
    /// Start with the configured budgets.
    pub fn new(config: &PollConfig) -> ReadinessTracker {
        ReadinessTracker {
            ticks_left: config.max_ticks,
            errors_left: config.error_budget,
            confirms_left: config.confirm_budget,
            confirm_budget: config.confirm_budget,
            last_state: NodeState::None,
        }
    }

    /// Account for an observation.
    pub fn observe(&mut self, state: NodeState) -> Tick {
        self.ticks_left = self.ticks_left.saturating_sub(1);
        self.last_state = state;

        let tick = match state {
            NodeState::Running => {
                self.confirms_left = self.confirms_left.saturating_sub(1);
                if self.confirms_left == 0 {
                    Tick::Ready
                } else {
                    Tick::Continue
                }
            }
            NodeState::Error => {
                self.confirms_left = self.confirm_budget;
                self.errors_left = self.errors_left.saturating_sub(1);
                if self.errors_left == 0 {
                    Tick::Failed
                } else {
                    Tick::Retry
                }
            }
            NodeState::None | NodeState::Starting | NodeState::Stopped => {
                self.confirms_left = self.confirm_budget;
                Tick::Continue
            }
        };

        match tick {
            Tick::Continue | Tick::Retry if self.ticks_left == 0 => Tick::TimedOut,
            other => other,
        }
    }

    /// Observations still allowed.
    #[inline]
    pub fn ticks_left(&self) -> u32 {
        self.ticks_left
    }

    /// Error observations still tolerated.
    #[inline]
    pub fn errors_left(&self) -> u32 {
        self.errors_left
    }

    /// Consecutive running observations still required.
    #[inline]
    pub fn confirms_left(&self) -> u32 {
        self.confirms_left
    }

    /// State of the last observation.
    #[inline]
    pub fn last_state(&self) -> NodeState {
        self.last_state
    }
}

fn with_progress(err: Error, node: &Node, tracker: &ReadinessTracker) -> Error {
    let kind = err.kind();
    err.reclassify(
        kind,
        format!(
            "Cannot poll node {} ({} tick(s), {} error(s), {} confirmation(s) left)",
            node.name,
            tracker.ticks_left(),
            tracker.errors_left(),
            tracker.confirms_left()
        ),
    )
}

/// How a successful wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The node was confirmed ready.
    Ready,
    /// The tick budget ran out and the timeout policy accepts it.
    TimedOut,
}

/// Poll a node until it is confirmed ready.
///
/// Each tick sleeps for the configured interval, then classifies a fresh
/// view of the node. Every error observation requests a retry of the failed
/// roles, including the one exhausting the error budget. Failures to fetch
/// the node abort the wait. The token is checked while sleeping, a request
/// in flight is never interrupted.
pub async fn wait_until_ready(
    ctx: &Context,
    node: &Node,
    cancel: &CancellationToken,
) -> Result<PollOutcome> {
    let config = ctx.config();
    let mut tracker = ReadinessTracker::new(&config.poll);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(Error::new(
                    ErrorKind::OperationCancelled,
                    format!(
                        "Waiting for node {} cancelled (last state {}, {} tick(s) left)",
                        node.name,
                        tracker.last_state(),
                        tracker.ticks_left()
                    ),
                ));
            }
            _ = tokio::time::sleep(config.poll.interval()) => {}
        }

        let state = node_state(ctx.api(), &node.name, &config.ready_role)
            .await
            .map_err(|e| with_progress(e, node, &tracker))?;
        let tick = tracker.observe(state);
        debug!(
            "Node {} is {} ({} tick(s), {} error(s), {} confirmation(s) left)",
            node.name,
            state,
            tracker.ticks_left(),
            tracker.errors_left(),
            tracker.confirms_left()
        );

        if state == NodeState::Error {
            debug!("Requesting retry of failed roles on node {}", node.name);
            if let Err(err) = ctx.api().request_retry(node).await {
                let err = with_progress(err, node, &tracker);
                if tick == Tick::Retry {
                    return Err(err);
                }
                // The wait is over anyway.
                warn!("{}", err);
            }
        }

        match tick {
            Tick::Continue | Tick::Retry => {}
            Tick::Ready => {
                info!("Node {} is ready", node.name);
                return Ok(PollOutcome::Ready);
            }
            Tick::Failed => {
                return Err(Error::new(
                    ErrorKind::ProvisioningFailed,
                    format!(
                        "Node {} reported errors {} time(s), giving up with {} tick(s) left",
                        node.name,
                        config.poll.error_budget,
                        tracker.ticks_left()
                    ),
                ));
            }
            Tick::TimedOut => {
                let message = format!(
                    "Node {} not confirmed ready after {} tick(s), last state {}, {} error(s) left",
                    node.name,
                    config.poll.max_ticks,
                    tracker.last_state(),
                    tracker.errors_left()
                );
                return match config.poll.on_timeout {
                    TimeoutPolicy::Fail => Err(Error::new(ErrorKind::ProvisioningTimeout, message)),
                    TimeoutPolicy::Accept => {
                        warn!("{}", message);
                        Ok(PollOutcome::TimedOut)
                    }
                };
            }
        }
    }
}
