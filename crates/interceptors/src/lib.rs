//! Interception pipeline for domain service calls.
//!
//! Every call made through an [`Interceptor`] is wrapped by global,
//! controller and method filters, and failures are escalated through
//! [`ExceptionHandler`]s before they reach the caller.

pub mod catalog;
pub mod context;
pub mod errors;
pub mod escalation;
pub mod filter;
pub mod filters;
pub mod flags;
pub mod interceptor;
pub mod lifetime;
pub mod prelude;
pub mod proxy;
pub mod state;

pub use interceptor::{CallFuture, Interceptor, Pipeline, PipelineBuilder};
pub use proxy::ServiceProxy;
