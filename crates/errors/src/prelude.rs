pub use crate::{
    code::{codes, spec_of, CodeSpec, ErrorCode, REGISTRY},
    kind::{ErrorKind, Recovery},
    labels::labels,
    model::{CallSite, Cause, ErrorBuilder, ErrorObj},
    render::{AuditErrorView, PublicErrorView},
};
