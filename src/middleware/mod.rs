//! Cross-cutting request handling.
//!
//! - [`jwt`]: the `jwt` authentication protocol (HMAC bearer tokens)
//! - [`trace`]: structured query/response events
//!
//! Further protocols plug in through
//! [`ProtocolFactory`](crate::ProtocolFactory) without touching the router.

pub mod jwt;
pub mod trace;
