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

//! Error and Result implementations.

use std::fmt;

use reqwest::StatusCode;

/// Kind of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Authentication failure.
    ///
    /// Maps to HTTP 401 or to a session that cannot be established.
    AuthenticationFailed,

    /// Requested resource was not found.
    ///
    /// Maps to HTTP 404 and 410.
    ResourceNotFound,

    /// Invalid value passed to one of parameters.
    InvalidInput,

    /// Response received from the server is malformed.
    InvalidResponse,

    /// Any failure talking to the remote API.
    TransportFailure,

    /// A pool (deployment) could not be found nor created.
    PoolCreateFailure,

    /// The source pool has no node eligible for allocation.
    NoEligibleNode,

    /// Claiming a node (persisting its new owner) failed.
    UpdateFailure,

    /// Provisioning roles could not be bound to the node.
    RoleBindFailure,

    /// The requested operating system is not in the catalog.
    UnsupportedOs,

    /// The node kept reporting errors until the error budget ran out.
    ProvisioningFailed,

    /// The node did not become ready within the polling budget.
    ProvisioningTimeout,

    /// Returning the node to the source pool failed.
    ReleaseFailure,

    /// The operation was cancelled by the caller.
    OperationCancelled,
}

/// Error from a provisioning call.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    status: Option<StatusCode>,
    message: Option<String>,
}

/// Result of a provisioning call.
pub type Result<T> = ::std::result::Result<T, Error>;

impl Error {
    /// Create a new error of the given kind.
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Error {
        Error {
            kind,
            status: None,
            message: Some(message.into()),
        }
    }

    /// Create with providing all details.
    pub(crate) fn new_with_details(
        kind: ErrorKind,
        status: Option<StatusCode>,
        message: Option<String>,
    ) -> Error {
        Error {
            kind,
            status,
            message,
        }
    }

    /// Error kind.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// HTTP status code (if the error came from an HTTP response).
    #[inline]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Error message (if any).
    #[inline]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Whether the error means that the resource does not exist.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::ResourceNotFound
    }

    /// Turn this error into an error of a different kind, prefixing the message.
    ///
    /// The HTTP status and the original message are kept.
    pub(crate) fn reclassify<D: fmt::Display>(self, kind: ErrorKind, context: D) -> Error {
        let message = match self.message {
            Some(msg) => format!("{}: {}", context, msg),
            None => format!("{}: {}", context, self.kind),
        };
        Error::new_with_details(kind, self.status, Some(message))
    }
}

impl ErrorKind {
    /// Short description of the error kind.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::AuthenticationFailed => "Failed to authenticate",
            ErrorKind::ResourceNotFound => "Requested resource was not found",
            ErrorKind::InvalidInput => "Input value(s) are invalid or missing",
            ErrorKind::InvalidResponse => "Received invalid response",
            ErrorKind::TransportFailure => "Error when accessing the server",
            ErrorKind::PoolCreateFailure => "Failed to find or create a pool",
            ErrorKind::NoEligibleNode => "No node is available for allocation",
            ErrorKind::UpdateFailure => "Failed to update the node",
            ErrorKind::RoleBindFailure => "Failed to bind provisioning roles",
            ErrorKind::UnsupportedOs => "Requested operating system is not supported",
            ErrorKind::ProvisioningFailed => "Node provisioning has failed",
            ErrorKind::ProvisioningTimeout => {
                "Time out reached while waiting for the node to become ready"
            }
            ErrorKind::ReleaseFailure => "Failed to release the node",
            ErrorKind::OperationCancelled => "Operation was cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(ref msg) = self.message {
            write!(f, ": {}", msg)
        } else {
            Ok(())
        }
    }
}

impl ::std::error::Error for Error {}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Error {
        let msg = value.to_string();
        let kind = match value.status() {
            Some(StatusCode::UNAUTHORIZED) => ErrorKind::AuthenticationFailed,
            Some(StatusCode::NOT_FOUND) | Some(StatusCode::GONE) => ErrorKind::ResourceNotFound,
            Some(c) if c == StatusCode::BAD_REQUEST => ErrorKind::InvalidInput,
            Some(_) => ErrorKind::TransportFailure,
            None if value.is_decode() => ErrorKind::InvalidResponse,
            None if value.is_builder() => ErrorKind::InvalidInput,
            None => ErrorKind::TransportFailure,
        };

        Error::new_with_details(kind, value.status(), Some(msg))
    }
}
