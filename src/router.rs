//! Radix-tree request router.
//!
//! One tree per HTTP method, plus one for routes that accept any method.
//! O(path-length) lookup. The router knows nothing about security; it only
//! answers "which template and handler match this request", or why none does.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::fallback;
use crate::handler::{BoxedHandler, Handler};

/// A registered route: the template it was registered under and its handler.
#[derive(Clone)]
pub(crate) struct Route {
    pub(crate) template: Arc<str>,
    pub(crate) handler: BoxedHandler,
}

/// Outcome of [`Router::lookup`].
pub(crate) enum Lookup {
    Found {
        route: Route,
        params: HashMap<String, String>,
    },
    /// The path matches a template, but not for this method.
    MethodNotAllowed,
    NotFound,
}

/// The underlying path-template router.
///
/// Owns the built-in not-found and method-not-allowed handlers, which the
/// secure router delegates to whenever a request does not match a route.
pub(crate) struct Router {
    routes: HashMap<Method, MatchitRouter<Route>>,
    any: MatchitRouter<Route>,
    pub(crate) not_found: BoxedHandler,
    pub(crate) method_not_allowed: BoxedHandler,
}

impl Router {
    pub(crate) fn new() -> Self {
        Self {
            routes: HashMap::new(),
            any: MatchitRouter::new(),
            not_found: fallback::not_found.into_boxed_handler(),
            method_not_allowed: fallback::method_not_allowed.into_boxed_handler(),
        }
    }

    /// Registers `handler` for `method` (or every method when `None`).
    ///
    /// # Panics
    ///
    /// Panics if `template` is not a valid route or is already registered
    /// for the same method.
    pub(crate) fn add(&mut self, method: Option<Method>, template: &str, handler: BoxedHandler) {
        let route = Route { template: Arc::from(template), handler };
        let tree = match method {
            Some(method) => self.routes.entry(method).or_default(),
            None => &mut self.any,
        };
        tree.insert(template, route)
            .unwrap_or_else(|e| panic!("invalid route `{template}`: {e}"));
    }

    /// Method-specific routes win over any-method routes.
    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Lookup {
        let trees = self.routes.get(method).into_iter().chain(std::iter::once(&self.any));
        for tree in trees {
            if let Ok(matched) = tree.at(path) {
                let params = matched.params.iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect();
                return Lookup::Found { route: matched.value.clone(), params };
            }
        }

        let elsewhere = self.routes.iter()
            .filter(|(m, _)| *m != method)
            .any(|(_, tree)| tree.at(path).is_ok());
        if elsewhere { Lookup::MethodNotAllowed } else { Lookup::NotFound }
    }
}
