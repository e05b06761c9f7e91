//! Routes, controllers and the radix-tree route table.
//!
//! Controllers declare their routes once; the server composes a middleware
//! chain for each and stores it here. One tree per HTTP method, O(path-length)
//! lookup, immutable after startup.

use std::collections::HashMap;

use matchit::Router as MatchitRouter;

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::Chain;

/// One endpoint a controller exposes.
pub struct Route {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) handler: BoxedHandler,
    pub(crate) requires_auth: bool,
}

impl Route {
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    /// The path is relative to the service's API prefix.
    pub fn new(method: Method, path: &str, handler: impl Handler) -> Self {
        Self { method, path: path.to_owned(), handler: handler.into_boxed_handler(), requires_auth: false }
    }

    /// Runs the auth stage before this route's handler.
    pub fn authenticated(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn requires_auth(&self) -> bool { self.requires_auth }
}

/// A group of routes registered together.
///
/// ```rust
/// use keel::{BoxError, Controller, Method, Request, Response, Route};
///
/// struct Ping;
///
/// impl Controller for Ping {
///     fn routes(&self) -> Vec<Route> {
///         vec![Route::new(Method::Get, "/ping", ping)]
///     }
/// }
///
/// async fn ping(_req: Request) -> Result<Response, BoxError> {
///     Ok(Response::json(serde_json::json!({ "pong": true })))
/// }
/// ```
pub trait Controller: Send + Sync + 'static {
    fn routes(&self) -> Vec<Route>;
}

/// Method + path → composed chain.
pub(crate) struct Router {
    routes: HashMap<Method, MatchitRouter<Chain>>,
}

impl Router {
    pub(crate) fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Fails on malformed patterns and on a pattern already taken for `method`.
    pub(crate) fn insert(&mut self, method: Method, path: &str, chain: Chain) -> Result<(), Error> {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, chain)
            .map_err(|source| Error::Route { path: format!("{method} {path}"), source })
    }

    pub(crate) fn lookup(&self, method: Method, path: &str) -> Option<(&Chain, HashMap<String, String>)> {
        let tree = self.routes.get(&method)?;
        let matched = tree.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((matched.value, params))
    }
}
