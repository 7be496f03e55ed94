mod common;

use std::future::Future;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tokio::sync::oneshot;

use sdk_purchases_rust::bridge::DynBridge;
use sdk_purchases_rust::command::{Command, ProductType, ProrationMode};
use sdk_purchases_rust::error::ErrorCode;
use sdk_purchases_rust::model::{IntroEligibilityStatus, PackageType};
use sdk_purchases_rust::{
    CorrelationPolicy, OperationKind, PurchaseOptions, Purchases, PurchasesConfig, SdkError,
};

use common::MockBridge;

async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("operation timed out")
}

fn purchases_for(bridge: &std::sync::Arc<MockBridge>, config: PurchasesConfig) -> Purchases {
    let dyn_bridge: DynBridge = bridge.clone();
    Purchases::new(config, Some(dyn_bridge))
}

fn offerings_payload() -> serde_json::Value {
    json!({
        "offerings": {
            "current": "default",
            "all": {
                "default": {
                    "identifier": "default",
                    "packages": [{
                        "identifier": "monthly",
                        "packageType": "MONTHLY",
                        "product": {
                            "identifier": "com.app.monthly",
                            "price": 4.99,
                            "priceString": "$4.99",
                            "currencyCode": "USD"
                        }
                    }]
                }
            }
        }
    })
}

#[tokio::test]
async fn offerings_resolve_through_the_inbound_pump() {
    let bridge = MockBridge::with_responses([(OperationKind::Offerings, offerings_payload())]);
    let purchases = purchases_for(&bridge, PurchasesConfig::new("key"));
    purchases
        .start(bridge.clone())
        .expect("pump should start");

    let offerings = within(purchases.get_offerings())
        .await
        .expect("offerings should decode");

    let current = offerings.current().expect("current offering");
    let package = current.monthly().expect("monthly package");
    assert_eq!(package.identifier, "monthly");
    assert_eq!(package.package_type, PackageType::Monthly);
    assert_eq!(package.offering_identifier, "default");
    assert_eq!(package.product.identifier, "com.app.monthly");
    assert_eq!(package.product.price_string, "$4.99");
    assert!(!purchases.is_pending(OperationKind::Offerings));

    purchases.close();
}

#[tokio::test]
async fn cancelled_purchase_reports_user_cancelled() {
    let bridge = MockBridge::with_responses([(
        OperationKind::Purchase,
        json!({"error": {"code": 2, "message": "cancelled"}, "userCancelled": true}),
    )]);
    let purchases = purchases_for(&bridge, PurchasesConfig::new("key"));
    purchases.start(bridge.clone()).expect("pump should start");

    let failure = within(purchases.purchase_product(
        "com.app.monthly",
        PurchaseOptions::replacing("com.app.weekly", ProrationMode::Deferred),
    ))
    .await
    .expect_err("purchase should fail");

    assert!(failure.user_cancelled);
    match &failure.error {
        SdkError::Purchases(err) => {
            assert_eq!(err.code, 2);
            assert_eq!(err.message, "cancelled");
        }
        other => panic!("expected Purchases error, got {other:?}"),
    }

    assert_eq!(
        bridge.commands(),
        vec![Command::PurchaseProduct {
            product_identifier: "com.app.monthly".into(),
            product_type: ProductType::Subs,
            old_sku: Some("com.app.weekly".into()),
            proration_mode: ProrationMode::Deferred,
        }]
    );
    purchases.close();
}

#[tokio::test]
async fn successful_package_purchase_returns_purchaser_info() {
    let bridge = MockBridge::with_responses([
        (OperationKind::Offerings, offerings_payload()),
        (
            OperationKind::Purchase,
            json!({
                "productIdentifier": "com.app.monthly",
                "purchaserInfo": {
                    "activeSubscriptions": ["com.app.monthly"],
                    "entitlements": {"active": {"pro": {"identifier": "pro", "isActive": true}}}
                }
            }),
        ),
    ]);
    let purchases = purchases_for(&bridge, PurchasesConfig::new("key"));
    purchases.start(bridge.clone()).expect("pump should start");

    let offerings = within(purchases.get_offerings())
        .await
        .expect("offerings should decode");
    let package = offerings
        .current()
        .and_then(|offering| offering.monthly())
        .expect("monthly package")
        .clone();

    let result = within(purchases.purchase_package(&package, PurchaseOptions::default()))
        .await
        .expect("purchase should succeed");
    assert_eq!(result.product_identifier, "com.app.monthly");
    assert!(result.purchaser_info.is_entitlement_active("pro"));

    match bridge.commands().last() {
        Some(Command::PurchasePackage {
            package_identifier,
            offering_identifier,
            ..
        }) => {
            assert_eq!(package_identifier, "monthly");
            assert_eq!(offering_identifier, "default");
        }
        other => panic!("expected purchasePackage, got {other:?}"),
    }
    purchases.close();
}

#[tokio::test]
async fn eligibility_maps_every_product() {
    let bridge = MockBridge::with_responses([(
        OperationKind::TrialEligibility,
        json!({
            "com.app.monthly": {"status": 2, "description": "eligible"},
            "com.app.annual": {"status": 0}
        }),
    )]);
    let purchases = purchases_for(&bridge, PurchasesConfig::new("key"));
    purchases.start(bridge.clone()).expect("pump should start");

    let eligibility = within(
        purchases.check_trial_or_introductory_price_eligibility(["com.app.monthly", "com.app.annual"]),
    )
    .await
    .expect("eligibility should decode");

    assert_eq!(eligibility.len(), 2);
    assert!(eligibility["com.app.monthly"].is_eligible());
    assert_eq!(eligibility["com.app.monthly"].description, "eligible");
    assert_eq!(
        eligibility["com.app.annual"].status,
        IntroEligibilityStatus::Unknown
    );
    purchases.close();
}

#[tokio::test]
async fn backend_error_fails_the_pending_request() {
    let bridge = MockBridge::with_responses([(
        OperationKind::Restore,
        json!({"error": {"code": 10, "message": "Error performing request."}}),
    )]);
    let purchases = purchases_for(&bridge, PurchasesConfig::new("key"));
    purchases.start(bridge.clone()).expect("pump should start");

    let err = within(purchases.restore_transactions())
        .await
        .expect_err("restore should fail");
    assert_eq!(err.to_purchases_error().error_code(), ErrorCode::Network);
    purchases.close();
}

#[test]
fn second_registration_supersedes_the_first() {
    let bridge = MockBridge::new();
    let purchases = purchases_for(&bridge, PurchasesConfig::new("key"));
    let (tx, rx) = std_mpsc::channel();

    let first_tx = tx.clone();
    purchases
        .get_offerings_with(move |result| {
            first_tx.send(("first", result.is_ok())).unwrap();
        })
        .expect("dispatch should succeed");
    purchases
        .get_offerings_with(move |result| {
            tx.send(("second", result.is_ok())).unwrap();
        })
        .expect("dispatch should succeed");

    purchases.deliver(OperationKind::Offerings, &offerings_payload().to_string());
    purchases.deliver(OperationKind::Offerings, &offerings_payload().to_string());

    let calls: Vec<_> = rx.try_iter().collect();
    assert_eq!(calls, vec![("second", true)]);
}

#[tokio::test]
async fn superseded_async_request_fails_instead_of_hanging() {
    let bridge = MockBridge::new();
    let purchases = purchases_for(&bridge, PurchasesConfig::new("key"));

    let (tx, rx) = oneshot::channel();
    purchases
        .get_purchaser_info_with(move |result| {
            let _ = tx.send(result);
        })
        .expect("dispatch should succeed");
    purchases
        .get_purchaser_info_with(|_| {})
        .expect("dispatch should succeed");

    assert!(within(rx).await.is_err());
}

#[test]
fn stale_request_id_is_ignored() {
    let bridge = MockBridge::new();
    let purchases = purchases_for(&bridge, PurchasesConfig::new("key"));
    let (tx, rx) = std_mpsc::channel();

    let first = purchases
        .identify_with("user-1", |_| panic!("superseded callback must not run"))
        .expect("dispatch should succeed");
    purchases
        .identify_with("user-2", move |result| {
            tx.send(result.map(|info| info.original_app_user_id)).unwrap();
        })
        .expect("dispatch should succeed");

    let stale = json!({"purchaserInfo": {"originalAppUserId": "user-1"}, "requestId": first.get()});
    purchases.deliver(OperationKind::Identify, &stale.to_string());
    assert!(purchases.is_pending(OperationKind::Identify));
    assert!(rx.try_recv().is_err());

    let current = json!({
        "purchaserInfo": {"originalAppUserId": "user-2"},
        "requestId": bridge.last_request_id(OperationKind::Identify).expect("request id").get()
    });
    purchases.deliver(OperationKind::Identify, &current.to_string());
    assert_eq!(rx.try_recv().expect("callback should run").expect("decoded"), "user-2");
}

#[test]
fn per_request_policy_resolves_each_callback() {
    let bridge = MockBridge::new();
    let config = PurchasesConfig::new("key").with_correlation(CorrelationPolicy::PerRequest);
    let purchases = purchases_for(&bridge, config);
    let (tx, rx) = std_mpsc::channel();

    let first_tx = tx.clone();
    let first = purchases
        .get_products_with(["com.app.monthly"], ProductType::Subs, move |result| {
            first_tx.send(("first", result.map(|p| p.len()))).unwrap();
        })
        .expect("dispatch should succeed");
    let second = purchases
        .get_products_with(["com.app.coins"], ProductType::Inapp, move |result| {
            tx.send(("second", result.map(|p| p.len()))).unwrap();
        })
        .expect("dispatch should succeed");

    let reply = |id: u64, count: usize| {
        let products: Vec<_> = (0..count)
            .map(|n| json!({"identifier": format!("p{n}")}))
            .collect();
        json!({"products": products, "requestId": id}).to_string()
    };

    purchases.deliver(OperationKind::Products, &reply(second.get(), 2));
    purchases.deliver(OperationKind::Products, &reply(first.get(), 1));

    let calls: Vec<_> = rx
        .try_iter()
        .map(|(label, result)| (label, result.expect("products should decode")))
        .collect();
    assert_eq!(calls, vec![("second", 2), ("first", 1)]);
}

#[test]
fn completion_without_pending_callback_is_ignored() {
    let purchases = Purchases::new(PurchasesConfig::new("key"), None);
    purchases.deliver(OperationKind::Reset, r#"{"purchaserInfo": {}}"#);
    purchases.deliver(OperationKind::Reset, "not json at all");
    assert!(!purchases.is_pending(OperationKind::Reset));
}

#[test]
fn malformed_completion_reaches_the_callback_as_an_error() {
    let purchases = Purchases::new(PurchasesConfig::new("key"), None);
    let (tx, rx) = std_mpsc::channel();
    purchases
        .reset_with(move |result| tx.send(result).unwrap())
        .expect("dispatch should succeed");

    purchases.deliver(OperationKind::Reset, "{truncated");
    match rx.try_recv().expect("callback should run") {
        Err(SdkError::InboundJson(err)) => assert_eq!(err.payload(), "{truncated"),
        other => panic!("expected InboundJson error, got {other:?}"),
    }
}

#[test]
fn failed_send_leaves_nothing_pending() {
    let bridge = MockBridge::new();
    bridge.set_fail_sends(true);
    let purchases = purchases_for(&bridge, PurchasesConfig::new("key"));

    let err = purchases
        .get_offerings_with(|_| panic!("callback must not run"))
        .expect_err("send should fail");
    assert!(matches!(err, SdkError::Bridge(_)));
    assert!(!purchases.is_pending(OperationKind::Offerings));
}

#[test]
fn failed_send_keeps_earlier_request_pending() {
    let bridge = MockBridge::new();
    let purchases = purchases_for(&bridge, PurchasesConfig::new("key"));
    let (tx, rx) = std_mpsc::channel();

    let first = purchases
        .get_offerings_with(move |result| tx.send(result.map(|o| o.all.len())).unwrap())
        .expect("dispatch should succeed");

    bridge.set_fail_sends(true);
    let err = purchases
        .get_offerings_with(|_| panic!("rejected request must not run"))
        .expect_err("send should fail");
    assert!(matches!(err, SdkError::Bridge(_)));
    assert!(purchases.is_pending(OperationKind::Offerings));

    let mut payload = offerings_payload();
    payload["requestId"] = json!(first.get());
    purchases.deliver(OperationKind::Offerings, &payload.to_string());

    assert_eq!(
        rx.try_recv()
            .expect("earlier callback should run")
            .expect("offerings should decode"),
        1
    );
    assert!(!purchases.is_pending(OperationKind::Offerings));
}

#[tokio::test]
async fn dropping_every_handle_stops_the_pump() {
    let bridge = MockBridge::new();
    let purchases = purchases_for(&bridge, PurchasesConfig::new("key"));
    purchases.start(bridge.clone()).expect("pump should start");
    tokio::task::yield_now().await;
    assert_eq!(std::sync::Arc::strong_count(&bridge), 3);

    drop(purchases);

    within(async {
        while std::sync::Arc::strong_count(&bridge) > 1 {
            tokio::task::yield_now().await;
        }
    })
    .await;
}

#[test]
fn close_fails_pending_callbacks() {
    let bridge = MockBridge::new();
    let purchases = purchases_for(&bridge, PurchasesConfig::new("key"));
    let (tx, rx) = std_mpsc::channel();

    purchases
        .create_alias_with("alias", move |result| tx.send(result).unwrap())
        .expect("dispatch should succeed");
    purchases.close();
    purchases.close();

    assert!(matches!(rx.try_recv(), Ok(Err(SdkError::Closed))));
    assert!(purchases.is_closed());
    assert!(!purchases.is_pending(OperationKind::CreateAlias));
}

#[tokio::test]
async fn pushed_purchaser_info_reaches_subscribers() {
    let bridge = MockBridge::new();
    let purchases = purchases_for(&bridge, PurchasesConfig::new("key"));
    let mut updates = Box::pin(purchases.purchaser_info_updates());
    purchases.start(bridge.clone()).expect("pump should start");

    bridge.push_purchaser_info(r#"{"unrelated": true}"#);
    bridge.push_purchaser_info(
        json!({"purchaserInfo": {"originalAppUserId": "user-9", "activeSubscriptions": ["com.app.annual"]}})
            .to_string(),
    );

    let info = within(updates.next()).await.expect("update expected");
    assert_eq!(info.original_app_user_id, "user-9");
    assert!(info.active_subscriptions.contains("com.app.annual"));
    purchases.close();
}

#[test]
fn configure_orders_setup_commands() {
    let bridge = MockBridge::new();
    let mut config = PurchasesConfig::new("appl_key").with_app_user_id("user-1");
    config.observer_mode = true;
    config.proxy_url = Some("https://proxy.example.com".into());
    let purchases = purchases_for(&bridge, config);

    purchases.configure().expect("configure should succeed");

    let commands = bridge.commands();
    assert_eq!(commands.len(), 2);
    assert!(matches!(commands[0], Command::SetProxyUrl { .. }));
    match &commands[1] {
        Command::Setup {
            api_key,
            app_user_id,
            observer_mode,
            ..
        } => {
            assert_eq!(api_key, "appl_key");
            assert_eq!(app_user_id.as_deref(), Some("user-1"));
            assert!(*observer_mode);
        }
        other => panic!("expected setup, got {other:?}"),
    }
}

#[test]
fn identity_comes_from_the_bridge() {
    let bridge = MockBridge::new();
    let purchases = purchases_for(&bridge, PurchasesConfig::new("key"));
    assert!(purchases.is_anonymous());
    assert_eq!(purchases.app_user_id(), None);

    bridge.set_identity(Some("user-1"), false);
    assert!(!purchases.is_anonymous());
    assert_eq!(purchases.app_user_id().as_deref(), Some("user-1"));
}

#[test]
fn fire_and_forget_commands_carry_no_request_id() {
    let bridge = MockBridge::new();
    let purchases = purchases_for(&bridge, PurchasesConfig::new("key"));

    purchases.sync_purchases().expect("send should succeed");
    purchases.set_finish_transactions(false).expect("send should succeed");
    purchases.set_debug_logs_enabled(true).expect("send should succeed");
    purchases.invalidate_purchaser_info_cache().expect("send should succeed");

    let sent = bridge.sent();
    assert_eq!(sent.len(), 4);
    assert!(sent.iter().all(|envelope| envelope.request_id.is_none()));
    assert_eq!(
        sent[1].command,
        Command::SetFinishTransactions {
            finish_transactions: false
        }
    );
}
