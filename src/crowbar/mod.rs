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

//! OpenCrowbar API bits.
//!
//! The provisioning core only talks to the remote system through the
//! [CrowbarApi](trait.CrowbarApi.html) trait. [HttpClient](struct.HttpClient.html)
//! implements it on top of the REST API version 2.

mod api;
mod client;
#[cfg(test)]
pub(crate) mod fake;
mod protocol;
mod types;

pub use client::{CrowbarApi, HttpClient};
pub use protocol::{Deployment, NewNodeRole, Node, NodeRole, Role};
pub use types::{PowerAction, RunState};
