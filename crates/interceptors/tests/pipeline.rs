use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use domainhost_core_types::Identity;
use domainhost_errors::prelude::codes;
use domainhost_interceptors::prelude::*;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

type Log = Arc<Mutex<Vec<String>>>;

struct Recorder {
    name: &'static str,
    log: Log,
}

#[async_trait::async_trait]
impl Filter for Recorder {
    fn id(&self) -> &'static str {
        self.name
    }

    async fn pre_call(&self, scope: Scope, _cx: &mut InvocationContext) -> Result<(), InterceptError> {
        self.log.lock().push(format!("{}.pre@{}", self.name, scope.as_str()));
        Ok(())
    }

    async fn post_call(&self, scope: Scope, _cx: &mut InvocationContext) -> Result<(), InterceptError> {
        self.log.lock().push(format!("{}.post@{}", self.name, scope.as_str()));
        Ok(())
    }
}

fn recorder(name: &'static str, log: &Log) -> Arc<dyn Filter> {
    Arc::new(Recorder {
        name,
        log: Arc::clone(log),
    })
}

/// Counts escalations, optionally continuing or failing.
#[derive(Default)]
struct CountingHandler {
    calls: AtomicUsize,
    continue_with: Option<Value>,
    fail: bool,
}

#[async_trait::async_trait]
impl ExceptionHandler for CountingHandler {
    async fn handle(&self, ex: &mut ExceptionContext<'_>) -> Result<(), InterceptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(InterceptError::internal("handler blew up"));
        }
        match &self.continue_with {
            Some(value) => ex.continue_with(value.clone()),
            None => ex.mark_handled(),
        }
        Ok(())
    }
}

#[derive(Default)]
struct CountingScopes {
    opened: AtomicUsize,
    released: Arc<AtomicUsize>,
}

struct CountedScope(Arc<AtomicUsize>);

impl LifetimeScope for CountedScope {
    fn id(&self) -> &str {
        "counted"
    }

    fn release(self: Box<Self>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl ScopeFactory for CountingScopes {
    fn open(&self) -> Box<dyn LifetimeScope> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Box::new(CountedScope(Arc::clone(&self.released)))
    }
}

fn ok_call(result: Value) -> impl for<'a> FnOnce(&'a mut Invocation) -> CallFuture<'a> + Send {
    move |_| async move { Ok(result) }.boxed()
}

fn failing_call() -> impl for<'a> FnOnce(&'a mut Invocation) -> CallFuture<'a> + Send {
    |_| async { Err(InterceptError::internal("ledger unavailable")) }.boxed()
}

fn interceptor(
    catalog: ServiceCatalog,
    global: Vec<Arc<dyn Filter>>,
    handlers: Vec<Arc<dyn ExceptionHandler>>,
    caller: Identity,
) -> Interceptor {
    let factory = Arc::new(CatalogContextFactory::new(Arc::new(catalog)));
    let mut builder = Pipeline::builder(factory);
    for filter in global {
        builder = builder.global_filter(filter);
    }
    for handler in handlers {
        builder = builder.handler(handler);
    }
    Interceptor::new(builder.build(), Some(caller), None)
}

/// Counts ERROR-level events emitted while installed.
#[derive(Clone, Default)]
struct ErrorEvents(Arc<AtomicUsize>);

impl ErrorEvents {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for ErrorEvents {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Same as `interceptor`, with the logging handler installed as terminal.
fn logged_interceptor(
    catalog: ServiceCatalog,
    handlers: Vec<Arc<dyn ExceptionHandler>>,
) -> Interceptor {
    let factory = Arc::new(CatalogContextFactory::new(Arc::new(catalog)));
    let mut builder =
        Pipeline::builder(factory).terminal_handler(Arc::new(LoggingExceptionHandler));
    for handler in handlers {
        builder = builder.handler(handler);
    }
    Interceptor::new(builder.build(), Some(Identity::user("amy", ["ops"])), None)
}

#[tokio::test]
async fn filters_wrap_the_call_like_an_onion() {
    let log: Log = Arc::default();
    let catalog = ServiceCatalog::new().with(
        ServiceDescriptor::new("accounts")
            .filter(recorder("B", &log))
            .method(MethodDescriptor::new("balance").filter(recorder("C", &log))),
    );
    let icpt = interceptor(catalog, vec![recorder("A", &log)], vec![], Identity::anonymous());

    let inner = Arc::clone(&log);
    let outcome = icpt
        .intercept(Invocation::new("accounts", "balance"), move |_| {
            async move {
                inner.lock().push("call".into());
                Ok(json!(10))
            }
            .boxed()
        })
        .await
        .unwrap();

    assert_eq!(outcome.value, json!(10));
    assert_eq!(outcome.state, InvocationState::Completed);
    assert_eq!(
        *log.lock(),
        vec![
            "A.pre@global",
            "B.pre@controller",
            "C.pre@method",
            "call",
            "C.post@method",
            "B.post@controller",
            "A.post@global",
        ]
    );
}

#[tokio::test]
async fn filter_declared_twice_runs_once_at_method_scope() {
    let log: Log = Arc::default();
    let catalog = ServiceCatalog::new().with(
        ServiceDescriptor::new("accounts")
            .filter(recorder("X", &log))
            .method(
                MethodDescriptor::new("close")
                    .filter(recorder("X", &log))
                    .filter(recorder("X", &log)),
            ),
    );
    let icpt = interceptor(catalog, vec![], vec![], Identity::anonymous());

    icpt.intercept(Invocation::new("accounts", "close"), ok_call(Value::Null))
        .await
        .unwrap();
    assert_eq!(*log.lock(), vec!["X.pre@method", "X.post@method"]);
}

#[tokio::test]
async fn role_logic_is_enforced_before_the_call() {
    let catalog = ServiceCatalog::new().with(
        ServiceDescriptor::new("payments")
            .method(
                MethodDescriptor::new("refund")
                    .flag(Flag::RequireRoles(RoleRequirement::any(["admin", "support"]))),
            )
            .method(
                MethodDescriptor::new("wire")
                    .flag(Flag::RequireRoles(RoleRequirement::all(["admin", "finance"]))),
            ),
    );
    let auth: Vec<Arc<dyn Filter>> = vec![Arc::new(AuthorizationFilter)];
    let support = interceptor(catalog, auth, vec![], Identity::user("sam", ["support"]));

    assert!(support
        .intercept(Invocation::new("payments", "refund"), ok_call(json!("ok")))
        .await
        .is_ok());

    let invoked = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&invoked);
    let err = support
        .intercept(Invocation::new("payments", "wire"), move |_| {
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(Value::Null)
            }
            .boxed()
        })
        .await
        .unwrap_err();
    assert!(err.is(codes::AUTH_FORBIDDEN));
    assert_eq!(err.obj().detail_str("logic"), Some("all"));
    assert!(!invoked.load(Ordering::SeqCst));
}

#[tokio::test]
async fn anonymous_caller_must_authenticate() {
    let catalog = ServiceCatalog::new().with(
        ServiceDescriptor::new("accounts")
            .method(MethodDescriptor::new("open").flag(Flag::AllowAnonymous)),
    );
    let auth: Vec<Arc<dyn Filter>> = vec![Arc::new(AuthorizationFilter)];
    let icpt = interceptor(catalog, auth, vec![], Identity::guest("visitor"));

    assert!(icpt
        .intercept(Invocation::new("accounts", "open"), ok_call(json!(true)))
        .await
        .is_ok());
    let err = icpt
        .intercept(Invocation::new("accounts", "close"), ok_call(json!(true)))
        .await
        .unwrap_err();
    assert!(err.is(codes::AUTH_UNAUTHENTICATED));
    assert_eq!(err.to_http_response().0, 401);
}

#[tokio::test]
async fn handled_failure_is_still_returned_after_one_handler() {
    let first = Arc::new(CountingHandler::default());
    let second = Arc::new(CountingHandler::default());
    let catalog = ServiceCatalog::new().with(ServiceDescriptor::new("ledger"));
    let icpt = interceptor(
        catalog,
        vec![],
        vec![first.clone() as Arc<dyn ExceptionHandler>, second.clone()],
        Identity::user("amy", ["ops"]),
    );

    let err = icpt
        .intercept(Invocation::new("ledger", "post"), failing_call())
        .await
        .unwrap_err();

    assert!(err.is(codes::UNKNOWN_INTERNAL));
    assert!(err.original().is_none());
    assert_eq!(first.calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn continue_turns_a_failure_into_success_without_post_hooks() {
    let log: Log = Arc::default();
    let handler = Arc::new(CountingHandler {
        continue_with: Some(json!({"fallback": true})),
        ..CountingHandler::default()
    });
    let catalog = ServiceCatalog::new().with(ServiceDescriptor::new("ledger"));
    let icpt = interceptor(
        catalog,
        vec![recorder("A", &log)],
        vec![handler as Arc<dyn ExceptionHandler>],
        Identity::anonymous(),
    );

    let outcome = icpt
        .intercept(Invocation::new("ledger", "post"), failing_call())
        .await
        .unwrap();

    assert!(outcome.was_suppressed());
    assert_eq!(outcome.value, json!({"fallback": true}));
    assert_eq!(*log.lock(), vec!["A.pre@global"]);
}

#[tokio::test]
async fn failing_handler_wraps_the_original_error() {
    let handler = Arc::new(CountingHandler {
        fail: true,
        ..CountingHandler::default()
    });
    let catalog = ServiceCatalog::new().with(ServiceDescriptor::new("ledger"));
    let icpt = interceptor(catalog, vec![], vec![handler as Arc<dyn ExceptionHandler>], Identity::anonymous());

    let err = icpt
        .intercept(
            Invocation::new("ledger", "post"),
            |_| async { Err(InterceptError::from_public(codes::SCHEMA_VALIDATION, "bad amount")) }.boxed(),
        )
        .await
        .unwrap_err();

    assert!(err.is(codes::INVOCATION_HANDLER_FAULT));
    assert!(err.original().unwrap().is(codes::SCHEMA_VALIDATION));
}

struct Rejecting;

#[async_trait::async_trait]
impl Filter for Rejecting {
    async fn pre_call(&self, _scope: Scope, _cx: &mut InvocationContext) -> Result<(), InterceptError> {
        Err(InterceptError::from_public(codes::SCHEMA_VALIDATION, "rejected"))
    }
}

#[tokio::test]
async fn pre_call_failure_skips_the_real_call_and_escalates() {
    let handler = Arc::new(CountingHandler::default());
    let catalog = ServiceCatalog::new().with(ServiceDescriptor::new("ledger").filter(Arc::new(Rejecting)));
    let icpt = interceptor(catalog, vec![], vec![handler.clone() as Arc<dyn ExceptionHandler>], Identity::anonymous());

    let invoked = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&invoked);
    let err = icpt
        .intercept(Invocation::new("ledger", "post"), move |_| {
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(Value::Null)
            }
            .boxed()
        })
        .await
        .unwrap_err();

    assert!(err.is(codes::SCHEMA_VALIDATION));
    assert!(!invoked.load(Ordering::SeqCst));
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
}

/// Rewrites the first argument and marks failures handled-and-continued.
struct Normalizer;

#[async_trait::async_trait]
impl Filter for Normalizer {
    async fn pre_call(&self, _scope: Scope, cx: &mut InvocationContext) -> Result<(), InterceptError> {
        let raw = cx.invocation().argument(0).and_then(Value::as_str).unwrap_or_default();
        let trimmed = json!(raw.trim().to_lowercase());
        cx.invocation_mut().set_argument(0, trimmed)
    }

    async fn on_exception(&self, _scope: Scope, ex: &mut ExceptionContext<'_>) -> Result<(), InterceptError> {
        ex.continue_with(json!("recovered"));
        Ok(())
    }
}

#[tokio::test]
async fn filters_can_rewrite_arguments_and_recover() {
    let handler = Arc::new(CountingHandler::default());
    let catalog = ServiceCatalog::new().with(
        ServiceDescriptor::new("users")
            .method(MethodDescriptor::new("lookup").filter(Arc::new(Normalizer))),
    );
    let icpt = interceptor(catalog, vec![], vec![handler.clone() as Arc<dyn ExceptionHandler>], Identity::anonymous());

    let outcome = icpt
        .intercept(
            Invocation::new("users", "lookup").with_argument(json!("  Alice ")),
            |inv| async move { Ok(inv.argument(0).cloned().unwrap_or_default()) }.boxed(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.value, json!("alice"));

    let outcome = icpt
        .intercept(
            Invocation::new("users", "lookup").with_argument(json!("bob")),
            failing_call(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.value, json!("recovered"));
    assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unresolved_context_fails_before_escalation() {
    let handler = Arc::new(CountingHandler::default());
    let icpt = interceptor(ServiceCatalog::new(), vec![], vec![handler.clone() as Arc<dyn ExceptionHandler>], Identity::anonymous());

    let err = icpt
        .intercept(Invocation::new("ghost", "run"), ok_call(Value::Null))
        .await
        .unwrap_err();
    assert!(err.is(codes::INVOCATION_CONTEXT_UNRESOLVED));
    assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cache_hint_is_attached_to_the_outcome() {
    let catalog = ServiceCatalog::new().with(
        ServiceDescriptor::new("catalog").method(MethodDescriptor::new("list").flag(Flag::CacheHint {
            ttl: Duration::from_secs(30),
            per_caller: true,
        })),
    );
    let global: Vec<Arc<dyn Filter>> = vec![Arc::new(CachingHintFilter), Arc::new(LoggingFilter)];
    let icpt = interceptor(catalog, global, vec![], Identity::user("kim", ["shopper"]));

    let listed = icpt
        .intercept(Invocation::new("catalog", "list"), ok_call(json!([1, 2])))
        .await
        .unwrap();
    let hint = listed.cache_hint.unwrap();
    assert_eq!(hint.ttl, Duration::from_secs(30));
    assert_eq!(hint.vary_by.as_deref(), Some("kim"));

    let other = icpt
        .intercept(Invocation::new("catalog", "count"), ok_call(json!(2)))
        .await
        .unwrap();
    assert!(other.cache_hint.is_none());
}

#[tokio::test]
async fn cancelled_call_surfaces_as_cancelled() {
    let catalog = ServiceCatalog::new().with(ServiceDescriptor::new("reports"));
    let icpt = interceptor(catalog, vec![], vec![], Identity::anonymous());
    icpt.cancellation_token().cancel();

    let err = icpt
        .intercept(
            Invocation::new("reports", "build"),
            |_| futures::future::pending::<Result<Value, InterceptError>>().boxed(),
        )
        .await
        .unwrap_err();
    assert!(err.is(codes::INVOCATION_CANCELLED));
}

#[tokio::test]
async fn lifetime_scope_is_released_exactly_once() {
    let scopes = Arc::new(CountingScopes::default());
    let factory = Arc::new(CatalogContextFactory::new(Arc::new(ServiceCatalog::new())));
    let pipeline = Pipeline::builder(factory)
        .scope_factory(scopes.clone())
        .build();

    let disposed = Interceptor::new(Arc::clone(&pipeline), Some(Identity::anonymous()), None);
    disposed.dispose();
    assert_eq!(scopes.released.load(Ordering::SeqCst), 1);

    {
        let proxy = ServiceProxy::new(Interceptor::new(pipeline, None, None));
        let clone = proxy.clone();
        drop(proxy);
        assert_eq!(scopes.released.load(Ordering::SeqCst), 1);
        drop(clone);
    }
    assert_eq!(scopes.opened.load(Ordering::SeqCst), 2);
    assert_eq!(scopes.released.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unhandled_failure_is_logged_once() {
    let errors = ErrorEvents::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(errors.clone()));
    let icpt = logged_interceptor(ServiceCatalog::new().with(ServiceDescriptor::new("ledger")), vec![]);

    let err = icpt
        .intercept(Invocation::new("ledger", "post"), failing_call())
        .await
        .unwrap_err();

    assert!(err.is(codes::UNKNOWN_INTERNAL));
    assert_eq!(errors.count(), 1);
}

#[tokio::test]
async fn failure_handled_by_a_handler_is_still_logged_once() {
    let errors = ErrorEvents::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(errors.clone()));
    let handler = Arc::new(CountingHandler::default());
    let icpt = logged_interceptor(
        ServiceCatalog::new().with(ServiceDescriptor::new("ledger")),
        vec![handler.clone() as Arc<dyn ExceptionHandler>],
    );

    let err = icpt
        .intercept(Invocation::new("ledger", "post"), failing_call())
        .await
        .unwrap_err();

    assert!(err.is(codes::UNKNOWN_INTERNAL));
    assert_eq!(err.obj().site.as_ref().unwrap().caller.as_deref(), Some("amy"));
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(errors.count(), 1);
}

/// Marks failures handled without letting the call continue.
struct Swallowing;

#[async_trait::async_trait]
impl Filter for Swallowing {
    async fn on_exception(&self, _scope: Scope, ex: &mut ExceptionContext<'_>) -> Result<(), InterceptError> {
        ex.mark_handled();
        Ok(())
    }
}

#[tokio::test]
async fn failure_handled_by_a_filter_is_still_logged_once() {
    let errors = ErrorEvents::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(errors.clone()));
    let handler = Arc::new(CountingHandler::default());
    let catalog = ServiceCatalog::new().with(ServiceDescriptor::new("ledger").filter(Arc::new(Swallowing)));
    let icpt = logged_interceptor(catalog, vec![handler.clone() as Arc<dyn ExceptionHandler>]);

    let err = icpt
        .intercept(Invocation::new("ledger", "post"), failing_call())
        .await
        .unwrap_err();

    assert!(err.is(codes::UNKNOWN_INTERNAL));
    assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    assert_eq!(errors.count(), 1);
}

#[tokio::test]
async fn continued_failure_is_not_logged() {
    let errors = ErrorEvents::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(errors.clone()));
    let handler = Arc::new(CountingHandler {
        continue_with: Some(json!(0)),
        ..CountingHandler::default()
    });
    let icpt = logged_interceptor(
        ServiceCatalog::new().with(ServiceDescriptor::new("ledger")),
        vec![handler as Arc<dyn ExceptionHandler>],
    );

    let outcome = icpt
        .intercept(Invocation::new("ledger", "post"), failing_call())
        .await
        .unwrap();

    assert!(outcome.was_suppressed());
    assert_eq!(errors.count(), 0);
}

#[tokio::test]
async fn handler_fault_is_logged_once() {
    let errors = ErrorEvents::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(errors.clone()));
    let handler = Arc::new(CountingHandler {
        fail: true,
        ..CountingHandler::default()
    });
    let icpt = logged_interceptor(
        ServiceCatalog::new().with(ServiceDescriptor::new("ledger")),
        vec![handler as Arc<dyn ExceptionHandler>],
    );

    let err = icpt
        .intercept(Invocation::new("ledger", "post"), failing_call())
        .await
        .unwrap_err();

    assert!(err.is(codes::INVOCATION_HANDLER_FAULT));
    assert_eq!(errors.count(), 1);
}
