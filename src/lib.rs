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

//! Node provisioning driver for OpenCrowbar.
//!
//! Machines are backed by nodes claimed from a pool of free hardware. A
//! claimed node is moved to a separate pool, gets an operating system
//! installation role and a ready role scheduled, and is watched until the
//! ready role succeeds. Removing the machine returns the node to the pool.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tokio_util::sync::CancellationToken;
//!
//! async fn create() -> crowbar_driver::Result<()> {
//!     let config = crowbar_driver::DriverConfig::from_env()?;
//!     let mut driver = crowbar_driver::Driver::new("machine-1", "/var/lib/machines/machine-1", config)?;
//!     driver.pre_create_check().await?;
//!     let _ = driver.create(&CancellationToken::new()).await?;
//!     println!("Docker is at {}", driver.get_url().await?);
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! * [Allocation and release](lifecycle/index.html) of nodes
//! * [Readiness polling](lifecycle/fn.wait_until_ready.html) with error,
//!   confirmation and tick budgets
//! * Power control through the [Driver](struct.Driver.html)
//! * A [REST client](crowbar/struct.HttpClient.html) behind the
//!   [CrowbarApi](crowbar/trait.CrowbarApi.html) trait

// NOTE: we do not use generic deny(warnings) to avoid breakages with new
// versions of the compiler. Add more warnings here as you discover them.
#![deny(unsafe_code)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    non_shorthand_field_patterns,
    path_statements,
    trivial_casts,
    unconditional_recursion,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_import_braces,
    unused_parens,
    unused_qualifications,
    unused_results,
    while_true
)]

#[macro_use]
extern crate log;

#[macro_use]
mod utils;

mod config;
pub mod crowbar;
mod driver;
mod error;
pub mod keys;
pub mod lifecycle;
mod session;

pub use crate::config::{DriverConfig, PollConfig, TimeoutPolicy, ENV_PASSWORD, ENV_URL, ENV_USER};
pub use crate::driver::Driver;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::lifecycle::{Context, NodeState, PollOutcome};
pub use crate::session::{Session, SessionCell, DEFAULT_PASSWORD};
pub use crate::utils::first_ipv4;
