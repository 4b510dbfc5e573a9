use async_trait::async_trait;
use tracing::debug;

use domainhost_core_types::Principal;

use crate::context::{InvocationContext, Scope};
use crate::errors::InterceptError;
use crate::filter::{Filter, FilterKind};

/// Role-based gate in front of a call.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthorizationFilter;

#[async_trait]
impl Filter for AuthorizationFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Authorization
    }

    fn can_run(&self, _scope: Scope, cx: &InvocationContext) -> bool {
        let method = cx.method_flags();
        let controller = cx.controller_flags();

        if method.disables_global_authorization() || controller.disables_global_authorization() {
            return false;
        }
        if method.allows_anonymous() {
            return false;
        }
        if method.requires_authorization() {
            return true;
        }
        !controller.allows_anonymous()
    }

    async fn pre_call(&self, _scope: Scope, cx: &mut InvocationContext) -> Result<(), InterceptError> {
        let caller = cx.caller();
        if !caller.is_authenticated() {
            return Err(InterceptError::authentication_required(
                cx.target_type(),
                cx.method(),
            ));
        }

        let groups = cx
            .method_flags()
            .role_requirements()
            .chain(cx.controller_flags().role_requirements());
        for group in groups {
            if !group.is_satisfied_by(caller) {
                return Err(InterceptError::authorization_denied(cx.caller_name(), group));
            }
        }
        Ok(())
    }

    async fn post_call(&self, scope: Scope, cx: &mut InvocationContext) -> Result<(), InterceptError> {
        debug!(
            caller = %cx.caller_name(),
            target_type = %cx.target_type(),
            method = %cx.method(),
            scope = scope.as_str(),
            "access granted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use domainhost_core_types::Identity;
    use domainhost_errors::prelude::codes;

    use super::*;
    use crate::catalog::{MethodDescriptor, ServiceCatalog, ServiceDescriptor};
    use crate::context::Invocation;
    use crate::flags::{Flag, RoleRequirement};

    fn context(catalog: &ServiceCatalog, method: &str, caller: Identity) -> InvocationContext {
        let resolved = catalog.lookup("svc", method).unwrap();
        InvocationContext::new(caller, Invocation::new("svc", method), resolved)
    }

    fn catalog() -> ServiceCatalog {
        ServiceCatalog::new().with(
            ServiceDescriptor::new("svc")
                .flag(Flag::AllowAnonymous)
                .method(MethodDescriptor::new("open"))
                .method(MethodDescriptor::new("admin").flag(Flag::Authorize))
                .method(
                    MethodDescriptor::new("raw")
                        .flag(Flag::DisableGlobalAuthorization)
                        .flag(Flag::Authorize),
                ),
        )
    }

    #[test]
    fn gating_follows_method_then_controller_precedence() {
        let catalog = catalog();
        let anon = Identity::anonymous();
        let filter = AuthorizationFilter;

        assert!(!filter.can_run(Scope::Global, &context(&catalog, "open", anon.clone())));
        assert!(filter.can_run(Scope::Global, &context(&catalog, "admin", anon.clone())));
        assert!(!filter.can_run(Scope::Global, &context(&catalog, "raw", anon)));
    }

    #[tokio::test]
    async fn role_groups_are_anded() {
        let catalog = ServiceCatalog::new().with(
            ServiceDescriptor::new("svc")
                .flag(Flag::RequireRoles(RoleRequirement::any(["staff"])))
                .method(
                    MethodDescriptor::new("pay")
                        .flag(Flag::RequireRoles(RoleRequirement::all(["finance", "approver"]))),
                ),
        );
        let filter = AuthorizationFilter;

        let mut ok = context(&catalog, "pay", Identity::user("f", ["finance", "approver", "staff"]));
        assert!(filter.pre_call(Scope::Global, &mut ok).await.is_ok());

        let mut missing_staff = context(&catalog, "pay", Identity::user("g", ["finance", "approver"]));
        let err = filter
            .pre_call(Scope::Global, &mut missing_staff)
            .await
            .unwrap_err();
        assert!(err.is(codes::AUTH_FORBIDDEN));
        assert_eq!(err.obj().detail_str("logic"), Some("any"));

        let mut guest = context(&catalog, "pay", Identity::guest("h"));
        let err = filter.pre_call(Scope::Global, &mut guest).await.unwrap_err();
        assert!(err.is(codes::AUTH_UNAUTHENTICATED));
    }

    #[test]
    fn filter_identity_is_stable() {
        let a: Arc<dyn Filter> = Arc::new(AuthorizationFilter);
        assert_eq!(a.id(), AuthorizationFilter.id());
        assert_eq!(a.kind(), FilterKind::Authorization);
    }
}
