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

//! Session structure definition.
//!
//! The Session object serves as a wrapper around an HTTP(s) client, holding
//! the API endpoint and the credentials used for every request.

use std::fmt;

use reqwest::{Client, IntoUrl, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;

use super::{Error, ErrorKind, Result};

/// Password used when none is configured.
pub const DEFAULT_PASSWORD: &str = "crowbar";

const API_PREFIX: [&str; 2] = ["api", "v2"];

/// An authenticated API session.
///
/// Immutable once created.
#[derive(Clone)]
pub struct Session {
    endpoint: Url,
    user: String,
    password: String,
    client: Client,
}

/// A lazily created session.
///
/// The session is created on the first call to [ensure](#method.ensure) and
/// reused afterwards.
pub struct SessionCell {
    url: String,
    user: String,
    password: Option<String>,
    inner: OnceCell<Session>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint.as_str())
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for SessionCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCell")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("session", &self.inner.get())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a new session against the given endpoint.
    ///
    /// Without a password the default one is used and a warning is logged.
    pub fn new<U, S>(endpoint: U, user: S, password: Option<String>) -> Result<Session>
    where
        U: IntoUrl,
        S: Into<String>,
    {
        let endpoint = endpoint
            .into_url()
            .map_err(|e| Error::from(e).reclassify(ErrorKind::AuthenticationFailed, "Invalid endpoint"))?;
        if endpoint.cannot_be_a_base() {
            return Err(Error::new(
                ErrorKind::AuthenticationFailed,
                format!("Endpoint {} cannot be used as a base URL", endpoint),
            ));
        }

        let password = match password {
            Some(value) if !value.is_empty() => value,
            _ => {
                warn!("Missing password for {}, assuming the default one", endpoint);
                DEFAULT_PASSWORD.to_string()
            }
        };

        let client = Client::builder().build().map_err(|e| {
            Error::from(e).reclassify(
                ErrorKind::AuthenticationFailed,
                format!("Could not start a session against {}", endpoint),
            )
        })?;

        let user = user.into();
        debug!("Started a session for {} against {}", user, endpoint);
        Ok(Session {
            endpoint,
            user,
            password,
            client,
        })
    }

    /// API endpoint.
    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// User name.
    #[inline]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Build a URL for the given API path.
    pub(crate) fn url(&self, path: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        let _ = url
            .path_segments_mut()
            .map_err(|_| {
                Error::new(
                    ErrorKind::InvalidInput,
                    format!("{} cannot be used as a base URL", self.endpoint),
                )
            })?
            .pop_if_empty()
            .extend(API_PREFIX.iter().chain(path.iter()).copied());
        Ok(url)
    }

    /// Start an authenticated request.
    pub(crate) fn request(&self, method: Method, path: &[&str]) -> Result<RequestBuilder> {
        let url = self.url(path)?;
        trace!("Sending {} {}", method, url);
        Ok(self
            .client
            .request(method, url)
            .basic_auth(&self.user, Some(&self.password)))
    }

    /// Start a GET request.
    #[inline]
    pub(crate) fn get(&self, path: &[&str]) -> Result<RequestBuilder> {
        self.request(Method::GET, path)
    }

    /// Start a POST request.
    #[inline]
    pub(crate) fn post(&self, path: &[&str]) -> Result<RequestBuilder> {
        self.request(Method::POST, path)
    }

    /// Start a PUT request.
    #[inline]
    pub(crate) fn put(&self, path: &[&str]) -> Result<RequestBuilder> {
        self.request(Method::PUT, path)
    }

    /// Start a DELETE request.
    #[inline]
    pub(crate) fn delete(&self, path: &[&str]) -> Result<RequestBuilder> {
        self.request(Method::DELETE, path)
    }
}

/// Send a request and fail on any non-success status.
pub(crate) async fn send(builder: RequestBuilder) -> Result<Response> {
    let resp = builder.send().await?;
    Ok(resp.error_for_status()?)
}

/// Send a request and parse a JSON response.
pub(crate) async fn fetch<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
    Ok(send(builder).await?.json().await?)
}

impl SessionCell {
    /// Remember how to create a session without creating it yet.
    pub fn new<U, S>(url: U, user: S, password: Option<String>) -> SessionCell
    where
        U: Into<String>,
        S: Into<String>,
    {
        SessionCell {
            url: url.into(),
            user: user.into(),
            password,
            inner: OnceCell::new(),
        }
    }

    /// Wrap an existing session.
    pub fn from_session(session: Session) -> SessionCell {
        SessionCell {
            url: session.endpoint.to_string(),
            user: session.user.clone(),
            password: Some(session.password.clone()),
            inner: OnceCell::new_with(Some(session)),
        }
    }

    /// Return the session, creating it on the first call.
    pub async fn ensure(&self) -> Result<&Session> {
        self.inner
            .get_or_try_init(|| async {
                Session::new(self.url.as_str(), self.user.clone(), self.password.clone())
            })
            .await
    }

    /// Whether the session has been created already.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized()
    }
}
