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

//! Access keys injected into claimed nodes.
//!
//! Generating key pairs is not handled here: a source only has to provide
//! the public part of an existing key.

use std::env;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use super::{Error, ErrorKind, Result};

/// Source of the public key injected into a node.
#[async_trait]
pub trait AccessKeySource: Send + Sync {
    /// Public key in the OpenSSH format.
    async fn public_key(&self) -> Result<String>;
}

/// A key known in advance.
#[derive(Debug, Clone)]
pub struct StaticKey(String);

/// A public key stored in a file.
#[derive(Debug, Clone)]
pub struct PublicKeyFile {
    path: PathBuf,
}

impl StaticKey {
    /// Wrap a public key.
    pub fn new<S: Into<String>>(key: S) -> StaticKey {
        StaticKey(key.into())
    }
}

#[async_trait]
impl AccessKeySource for StaticKey {
    async fn public_key(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

impl PublicKeyFile {
    /// Read the key from the given file.
    pub fn new<P: Into<PathBuf>>(path: P) -> PublicKeyFile {
        PublicKeyFile { path: path.into() }
    }

    /// Public counterpart of a private key path (`<path>.pub`).
    pub fn for_private_key<P: AsRef<Path>>(private_key: P) -> PublicKeyFile {
        let mut path = private_key.as_ref().as_os_str().to_owned();
        path.push(".pub");
        PublicKeyFile { path: path.into() }
    }

    /// Path to the key file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AccessKeySource for PublicKeyFile {
    async fn public_key(&self) -> Result<String> {
        debug!("Reading public key from {}", self.path.display());
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("Cannot read public key {}: {}", self.path.display(), e),
            )
        })?;
        let key = content.trim();
        if key.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Public key file {} is empty", self.path.display()),
            ));
        }
        Ok(key.to_string())
    }
}

/// Default location of the known hosts file.
pub fn known_hosts_path() -> Option<PathBuf> {
    env::var_os("HOME").map(|home| Path::new(&home).join(".ssh").join("known_hosts"))
}

/// Remove an address from the known hosts file.
///
/// Machines are reused, so a stale host key would make the next SSH
/// connection fail.
pub async fn purge_known_host(known_hosts: &Path, address: IpAddr) -> io::Result<()> {
    let address = address.to_string();
    trace!(
        "Removing {} from {} with ssh-keygen",
        address,
        known_hosts.display()
    );
    let output = Command::new("ssh-keygen")
        .arg("-f")
        .arg(known_hosts)
        .arg("-R")
        .arg(&address)
        .output()
        .await?;
    if output.status.success() {
        debug!("Removed {} from {}", address, known_hosts.display());
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!(
                "ssh-keygen exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ))
    }
}
