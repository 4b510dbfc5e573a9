//! Sample account service wired through the pipeline.
//!
//! `AccountsProxy` is the hand-written typed decorator: each method forwards
//! to the real service inside a `ServiceProxy::call`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use serde::Serialize;
use serde_json::json;

use domainhost_core_types::Identity;
use domainhost_errors::prelude::codes;
use domainhost_interceptors::prelude::*;

use crate::host::DomainHost;

pub const SERVICE: &str = "accounts";

/// The real service. Knows nothing about sessions or roles.
#[derive(Debug, Default)]
pub struct AccountService {
    balances: DashMap<String, i64>,
}

impl AccountService {
    pub fn with_accounts<I>(accounts: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, i64)>,
    {
        let balances = DashMap::new();
        for (id, balance) in accounts {
            balances.insert(id.to_string(), balance);
        }
        Self { balances }
    }

    pub fn balance(&self, account: &str) -> Result<i64, InterceptError> {
        self.balances
            .get(account)
            .map(|entry| *entry.value())
            .ok_or_else(|| unknown_account(account))
    }

    pub fn deposit(&self, account: &str, amount: i64) -> Result<i64, InterceptError> {
        if amount <= 0 {
            return Err(InterceptError::from_public(
                codes::SCHEMA_VALIDATION,
                "Deposit amount must be positive.",
            ));
        }
        let mut entry = self
            .balances
            .get_mut(account)
            .ok_or_else(|| unknown_account(account))?;
        *entry += amount;
        Ok(*entry)
    }

    pub fn close(&self, account: &str) -> Result<i64, InterceptError> {
        self.balances
            .remove(account)
            .map(|(_, balance)| balance)
            .ok_or_else(|| unknown_account(account))
    }

    pub fn open_accounts(&self) -> usize {
        self.balances.len()
    }
}

fn unknown_account(account: &str) -> InterceptError {
    InterceptError::from_public(
        codes::SCHEMA_VALIDATION,
        &format!("Unknown account '{account}'."),
    )
}

/// Declarations for the account service.
pub fn descriptor() -> ServiceDescriptor {
    ServiceDescriptor::new(SERVICE)
        .flag(Flag::Authorize)
        .method(MethodDescriptor::new("status").flag(Flag::AllowAnonymous))
        .method(
            MethodDescriptor::new("balance")
                .flag(Flag::RequireRoles(RoleRequirement::any(["customer", "teller"])))
                .flag(Flag::CacheHint {
                    ttl: Duration::from_secs(30),
                    per_caller: true,
                }),
        )
        .method(MethodDescriptor::new("deposit").flag(Flag::RequireRoles(RoleRequirement::any([
            "customer", "teller",
        ]))))
        .method(
            MethodDescriptor::new("close")
                .flag(Flag::RequireRoles(RoleRequirement::all(["teller", "supervisor"]))),
        )
}

/// Typed decorator over `ServiceProxy` for the account service.
#[derive(Clone)]
pub struct AccountsProxy {
    proxy: ServiceProxy,
    service: Arc<AccountService>,
}

impl AccountsProxy {
    pub fn new(proxy: ServiceProxy, service: Arc<AccountService>) -> Self {
        Self { proxy, service }
    }

    pub async fn status(&self) -> Result<usize, InterceptError> {
        let service = Arc::clone(&self.service);
        self.proxy
            .call_as(SERVICE, "status", vec![], move |_| {
                async move { Ok(json!(service.open_accounts())) }.boxed()
            })
            .await
    }

    pub async fn balance(&self, account: &str) -> Result<i64, InterceptError> {
        let service = Arc::clone(&self.service);
        self.proxy
            .call_as(SERVICE, "balance", vec![json!(account)], move |inv| {
                async move {
                    let account = string_arg(inv, 0)?;
                    Ok(json!(service.balance(&account)?))
                }
                .boxed()
            })
            .await
    }

    pub async fn deposit(&self, account: &str, amount: i64) -> Result<i64, InterceptError> {
        let service = Arc::clone(&self.service);
        self.proxy
            .call_as(
                SERVICE,
                "deposit",
                vec![json!(account), json!(amount)],
                move |inv| {
                    async move {
                        let account = string_arg(inv, 0)?;
                        let amount = inv.argument(1).and_then(|v| v.as_i64()).unwrap_or_default();
                        Ok(json!(service.deposit(&account, amount)?))
                    }
                    .boxed()
                },
            )
            .await
    }

    pub async fn close(&self, account: &str) -> Result<i64, InterceptError> {
        let service = Arc::clone(&self.service);
        self.proxy
            .call_as(SERVICE, "close", vec![json!(account)], move |inv| {
                async move {
                    let account = string_arg(inv, 0)?;
                    Ok(json!(service.close(&account)?))
                }
                .boxed()
            })
            .await
    }
}

fn string_arg(inv: &Invocation, index: usize) -> Result<String, InterceptError> {
    inv.argument(index)
        .and_then(|value| value.as_str())
        .map(str::to_string)
        .ok_or_else(|| InterceptError::internal(&format!("argument {index} is not a string")))
}

/// One line of demo output.
#[derive(Debug, Serialize)]
pub struct DemoStep {
    pub caller: String,
    pub action: String,
    pub outcome: String,
}

impl DemoStep {
    fn new<T: std::fmt::Display>(
        caller: &Identity,
        action: &str,
        result: Result<T, InterceptError>,
    ) -> Self {
        let outcome = match result {
            Ok(value) => format!("ok: {value}"),
            Err(err) => format!("error {}: {}", err.code(), err.to_public().message),
        };
        Self {
            caller: caller.to_string(),
            action: action.to_string(),
            outcome,
        }
    }
}

/// Drives a few calls as different callers and reports what happened.
pub async fn run_demo(host: &DomainHost, service: Arc<AccountService>) -> Result<Vec<DemoStep>, InterceptError> {
    let mut steps = Vec::new();

    let anonymous = Identity::anonymous();
    let visitor = AccountsProxy::new(host.anonymous_proxy(), Arc::clone(&service));
    steps.push(DemoStep::new(&anonymous, "status", visitor.status().await));
    steps.push(DemoStep::new(&anonymous, "balance acc-1", visitor.balance("acc-1").await));

    let customer = Identity::user("carol", ["customer"]);
    let session = host.sign_in(customer.clone()).await?;
    let carol = AccountsProxy::new(host.proxy(session.key()).await?, Arc::clone(&service));
    steps.push(DemoStep::new(&customer, "balance acc-1", carol.balance("acc-1").await));
    steps.push(DemoStep::new(&customer, "deposit acc-1 50", carol.deposit("acc-1", 50).await));
    steps.push(DemoStep::new(&customer, "deposit acc-1 -5", carol.deposit("acc-1", -5).await));
    steps.push(DemoStep::new(&customer, "close acc-1", carol.close("acc-1").await));

    let teller = Identity::user("tom", ["teller", "supervisor"]);
    let session = host.sign_in(teller.clone()).await?;
    let tom = AccountsProxy::new(host.proxy(session.key()).await?, Arc::clone(&service));
    steps.push(DemoStep::new(&teller, "close acc-2", tom.close("acc-2").await));
    host.sign_out(session.key()).await?;
    let after = host.proxy(session.key()).await.map(|_| "proxy bound");
    steps.push(DemoStep::new(&teller, "proxy after sign-out", after));

    Ok(steps)
}
