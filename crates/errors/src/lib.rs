//! Unified error domain shared by the session store and the interception pipeline.
//!
//! Every failure surfaced to the host layer is an [`model::ErrorObj`] built from a
//! registered [`code::ErrorCode`], so the host can map it to a transport status
//! without knowing which component raised it.

pub mod code;
pub mod kind;
pub mod labels;
pub mod model;
pub mod prelude;
pub mod render;
