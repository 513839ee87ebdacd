//! Handler trait and type erasure.
//!
//! # How handlers and protocol middleware are stored
//!
//! The router holds handlers of *different* types in one table, and a
//! protocol middleware wraps whatever handler the route was registered with.
//! Both sides meet at the [`Endpoint`] trait object:
//!
//! ```text
//! async fn data(req: Request) -> Response { … }    ← user writes this
//!        ↓ builder.on(Method::GET, "/data", data)
//! data.into_boxed_handler()                        ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(data))                        ← stored as BoxedHandler
//!        ↓ at request time, when the route names a protocol
//! factory.build(handler, require_auth)             ← another BoxedHandler
//!        ↓
//! middleware.call(req) → handler.call(req)         ← one vtable call each
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future that resolves to a [`Response`].
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Anything that can answer a request.
///
/// Route handlers become endpoints through [`Handler`]. Authentication
/// middleware implements this directly so it can sit in front of the route's
/// handler; see [`JwtProtocol`](crate::middleware::jwt::JwtProtocol).
pub trait Endpoint {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A shared, type-erased endpoint.
pub type BoxedHandler = Arc<dyn Endpoint + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// Automatically satisfied for any function with the signature
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
///
/// The trait is sealed: only the blanket impl below satisfies it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Boxes any [`Handler`] into a [`BoxedHandler`].
///
/// Useful when writing a protocol factory by hand and the inner handler
/// has to be a plain function.
pub fn boxed(handler: impl Handler) -> BoxedHandler {
    handler.into_boxed_handler()
}

/// Bridges a concrete handler `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> Endpoint for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
