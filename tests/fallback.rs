//! End-to-end failover, billing and lifecycle scenarios against mocked
//! vendor APIs.

use sms_broker::{
    AccountId, Catalog, CodeStatus, LedgerDirection, MemoryStore, OrderRequest, OrderStatus,
    OrderStore, PricingConfig, ProviderConfig, ProviderCredentials, ProviderId, ProviderSettings,
    ServiceError, SmsService, SmsServiceConfig,
};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider_config(id: ProviderId, server: &MockServer, priority: u8) -> ProviderConfig {
    ProviderConfig::new(
        id,
        Url::parse(&server.uri()).unwrap(),
        ProviderCredentials::api_key("test_key"),
    )
    .with_priority(priority)
}

fn pricing() -> PricingConfig {
    // 1 native unit = 1600 billing units, flat 700 surcharge.
    PricingConfig::default().with_fx_rate(1600.0).with_vat(700.0)
}

fn service(
    providers: Vec<ProviderConfig>,
    store: MemoryStore,
) -> SmsService<MemoryStore> {
    SmsService::new(
        providers,
        Arc::new(Catalog::empty()),
        store,
        SmsServiceConfig::default().with_pricing(pricing()),
    )
    .unwrap()
}

/// Tiger SMS is out of numbers.
async fn mount_tiger_no_numbers(server: &MockServer) {
    Mock::given(method("GET"))
        .and(query_param("action", "getNumber"))
        .respond_with(ResponseTemplate::new(200).set_body_string("NO_NUMBERS"))
        .mount(server)
        .await;
}

/// 5sim has no slug for the requested country.
async fn mount_five_sim_no_us(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/guest/countries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "england": {"iso": {"gb": 1}, "text_en": "England"}
        })))
        .mount(server)
        .await;
}

/// Dassy rents a number at 1.50 USD (priced via its listing).
async fn mount_dassy_success(server: &MockServer) {
    Mock::given(method("GET"))
        .and(query_param("action", "getNumber"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ACCESS_NUMBER:55:15559876543"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("action", "getPrices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "wa": {"187": {"cost": 1.50, "count": 320}}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn failover_skips_failed_providers_and_bills_the_winner() {
    let tiger = MockServer::start().await;
    let five_sim = MockServer::start().await;
    let dassy = MockServer::start().await;
    mount_tiger_no_numbers(&tiger).await;
    mount_five_sim_no_us(&five_sim).await;
    mount_dassy_success(&dassy).await;

    let store = MemoryStore::new();
    let account = AccountId::from("acct-1");
    store.deposit(&account, 5000.0);

    let service = service(
        vec![
            provider_config(ProviderId::TigerSms, &tiger, 1),
            provider_config(ProviderId::FiveSim, &five_sim, 2),
            provider_config(ProviderId::Dassy, &dassy, 3),
        ],
        store.clone(),
    );

    let order = service
        .create_order(
            &account,
            OrderRequest::auto("US".parse().unwrap(), "wa".parse().unwrap()),
        )
        .await
        .unwrap();

    // 1.50 USD * 1600 + 700, ceiling to whole billing units.
    assert_eq!(order.cost, 3100.0);
    assert_eq!(order.provider, ProviderId::Dassy);
    assert_eq!(order.status, OrderStatus::Active);
    assert_eq!(order.phone_number.as_str(), "15559876543");
    assert_eq!(store.balance(&account).await.unwrap(), 1900.0);
    assert_eq!(store.ledger().len(), 1);

    // The two failed candidates are counted against their stats.
    let health = service.provider_health();
    let by_id = |id: ProviderId| health.iter().find(|h| h.provider == id).unwrap();
    assert_eq!(by_id(ProviderId::TigerSms).total_orders, 1);
    assert_eq!(by_id(ProviderId::TigerSms).successful_orders, 0);
    assert_eq!(by_id(ProviderId::FiveSim).total_orders, 1);
    assert_eq!(by_id(ProviderId::FiveSim).successful_orders, 0);
    assert_eq!(by_id(ProviderId::Dassy).successful_orders, 1);
}

#[tokio::test]
async fn exhaustion_reports_all_providers_unavailable() {
    let tiger = MockServer::start().await;
    mount_tiger_no_numbers(&tiger).await;

    let store = MemoryStore::new();
    let account = AccountId::from("acct-1");
    store.deposit(&account, 5000.0);

    let service = service(
        vec![provider_config(ProviderId::TigerSms, &tiger, 1)],
        store,
    );
    let err = service
        .create_order(
            &account,
            OrderRequest::auto("US".parse().unwrap(), "wa".parse().unwrap()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AllProvidersExhausted));
}

#[tokio::test]
async fn manual_mode_never_touches_other_providers() {
    let tiger = MockServer::start().await;
    let dassy = MockServer::start().await;
    // Any request hitting Tiger fails the test.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("NO_NUMBERS"))
        .expect(0)
        .mount(&tiger)
        .await;
    mount_dassy_success(&dassy).await;

    let store = MemoryStore::new();
    let account = AccountId::from("acct-1");
    store.deposit(&account, 5000.0);

    let service = service(
        vec![
            provider_config(ProviderId::TigerSms, &tiger, 1),
            provider_config(ProviderId::Dassy, &dassy, 3),
        ],
        store,
    );
    let order = service
        .create_order(
            &account,
            OrderRequest::manual(
                "US".parse().unwrap(),
                "wa".parse().unwrap(),
                ProviderId::Dassy,
            ),
        )
        .await
        .unwrap();
    assert_eq!(order.provider, ProviderId::Dassy);
}

#[tokio::test]
async fn manual_mode_failure_names_the_pinned_provider() {
    let dassy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("action", "getNumber"))
        .respond_with(ResponseTemplate::new(200).set_body_string("NO_NUMBERS"))
        .mount(&dassy)
        .await;

    let store = MemoryStore::new();
    let account = AccountId::from("acct-1");
    store.deposit(&account, 5000.0);

    let service = service(vec![provider_config(ProviderId::Dassy, &dassy, 1)], store);
    let err = service
        .create_order(
            &account,
            OrderRequest::manual(
                "US".parse().unwrap(),
                "wa".parse().unwrap(),
                ProviderId::Dassy,
            ),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::PinnedProviderUnavailable(ProviderId::Dassy)
    ));
}

#[tokio::test]
async fn cancellation_refunds_the_full_billed_amount() {
    let dassy = MockServer::start().await;
    mount_dassy_success(&dassy).await;
    Mock::given(method("GET"))
        .and(query_param("action", "setStatus"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ACCESS_CANCEL"))
        .mount(&dassy)
        .await;

    let store = MemoryStore::new();
    let account = AccountId::from("acct-1");
    store.deposit(&account, 5000.0);

    let service = service(vec![provider_config(ProviderId::Dassy, &dassy, 1)], store.clone());
    let order = service
        .create_order(
            &account,
            OrderRequest::auto("US".parse().unwrap(), "wa".parse().unwrap()),
        )
        .await
        .unwrap();
    assert_eq!(store.balance(&account).await.unwrap(), 1900.0);

    let cancelled = service.cancel_order(&order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(store.balance(&account).await.unwrap(), 5000.0);
    assert_eq!(store.ledger().len(), 2);

    // A second cancellation is rejected, not double-refunded.
    let err = service.cancel_order(&order.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::OrderNotCancellable(_)));
    assert_eq!(store.balance(&account).await.unwrap(), 5000.0);
}

#[tokio::test]
async fn concurrent_cancellations_refund_exactly_once() {
    let dassy = MockServer::start().await;
    mount_dassy_success(&dassy).await;
    // A slow vendor confirmation widens the window in which both
    // requests have already read the order as Active.
    Mock::given(method("GET"))
        .and(query_param("action", "setStatus"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("ACCESS_CANCEL")
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&dassy)
        .await;

    let store = MemoryStore::new();
    let account = AccountId::from("acct-1");
    store.deposit(&account, 5000.0);

    let service = service(vec![provider_config(ProviderId::Dassy, &dassy, 1)], store.clone());
    let order = service
        .create_order(
            &account,
            OrderRequest::auto("US".parse().unwrap(), "wa".parse().unwrap()),
        )
        .await
        .unwrap();
    assert_eq!(store.balance(&account).await.unwrap(), 1900.0);

    let (first, second) = tokio::join!(
        service.cancel_order(&order.id),
        service.cancel_order(&order.id)
    );
    let wins = first.is_ok() as u8 + second.is_ok() as u8;
    assert_eq!(wins, 1);
    for lost in [first, second].into_iter().filter(Result::is_err) {
        assert!(matches!(
            lost.unwrap_err(),
            ServiceError::OrderNotCancellable(_)
        ));
    }

    // Exactly one credit, restoring exactly the original balance.
    assert_eq!(store.balance(&account).await.unwrap(), 5000.0);
    let credits = store
        .ledger()
        .iter()
        .filter(|entry| entry.direction == LedgerDirection::Credit)
        .count();
    assert_eq!(credits, 1);
    let stored = store.order(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn declined_cancellation_keeps_order_active_and_debit_in_place() {
    let dassy = MockServer::start().await;
    mount_dassy_success(&dassy).await;
    Mock::given(method("GET"))
        .and(query_param("action", "setStatus"))
        .respond_with(ResponseTemplate::new(200).set_body_string("BAD_STATUS"))
        .mount(&dassy)
        .await;

    let store = MemoryStore::new();
    let account = AccountId::from("acct-1");
    store.deposit(&account, 5000.0);

    let service = service(vec![provider_config(ProviderId::Dassy, &dassy, 1)], store.clone());
    let order = service
        .create_order(
            &account,
            OrderRequest::auto("US".parse().unwrap(), "wa".parse().unwrap()),
        )
        .await
        .unwrap();

    let err = service.cancel_order(&order.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::CancellationDeclined(_)));
    assert_eq!(store.balance(&account).await.unwrap(), 1900.0);
    let stored = store.order(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Active);
}

#[tokio::test]
async fn expired_order_settles_without_refund() {
    let dassy = MockServer::start().await;
    mount_dassy_success(&dassy).await;

    let store = MemoryStore::new();
    let account = AccountId::from("acct-1");
    store.deposit(&account, 5000.0);

    let mut config = provider_config(ProviderId::Dassy, &dassy, 1);
    config.settings = ProviderSettings {
        order_ttl: Some(Duration::from_millis(1)),
        ..ProviderSettings::default()
    };
    let service = service(vec![config], store.clone());
    let order = service
        .create_order(
            &account,
            OrderRequest::auto("US".parse().unwrap(), "wa".parse().unwrap()),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let CodeStatus { code, status } = service.get_code(&order.id).await.unwrap();
    assert!(code.is_none());
    assert_eq!(status, OrderStatus::Expired);
    // No refund on expiry.
    assert_eq!(store.balance(&account).await.unwrap(), 1900.0);

    // Expiry is sticky, and cancellation is now rejected.
    let CodeStatus { status, .. } = service.get_code(&order.id).await.unwrap();
    assert_eq!(status, OrderStatus::Expired);
    let err = service.cancel_order(&order.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::OrderNotCancellable(_)));
}

#[tokio::test]
async fn get_code_completes_on_vendor_reply() {
    let dassy = MockServer::start().await;
    mount_dassy_success(&dassy).await;
    Mock::given(method("GET"))
        .and(query_param("action", "getStatus"))
        .respond_with(ResponseTemplate::new(200).set_body_string("STATUS_OK:443556"))
        .mount(&dassy)
        .await;

    let store = MemoryStore::new();
    let account = AccountId::from("acct-1");
    store.deposit(&account, 5000.0);

    let service = service(vec![provider_config(ProviderId::Dassy, &dassy, 1)], store.clone());
    let order = service
        .create_order(
            &account,
            OrderRequest::auto("US".parse().unwrap(), "wa".parse().unwrap()),
        )
        .await
        .unwrap();

    let CodeStatus { code, status } = service.get_code(&order.id).await.unwrap();
    assert_eq!(status, OrderStatus::Completed);
    assert_eq!(code.unwrap().as_str(), "443556");

    // Completed is terminal; the stored result is replayed.
    let CodeStatus { code, status } = service.get_code(&order.id).await.unwrap();
    assert_eq!(status, OrderStatus::Completed);
    assert_eq!(code.unwrap().as_str(), "443556");
}

#[tokio::test]
async fn unfiltered_listing_aggregates_active_providers() {
    let tiger = MockServer::start().await;
    let dassy = MockServer::start().await;
    // Tiger's price feed is down.
    Mock::given(method("GET"))
        .and(query_param("action", "getPrices"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&tiger)
        .await;
    mount_dassy_success(&dassy).await;

    let service = service(
        vec![
            provider_config(ProviderId::TigerSms, &tiger, 1),
            provider_config(ProviderId::Dassy, &dassy, 2),
        ],
        MemoryStore::new(),
    );
    let country = "US".parse().unwrap();

    // The aggregate skips the broken provider instead of failing.
    let offers = service.list_services(None, &country).await.unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].provider, ProviderId::Dassy);
    assert_eq!(offers[0].service.as_str(), "wa");
    assert_eq!(offers[0].cost, 3100.0);

    let countries = service.list_countries(None).await.unwrap();
    assert_eq!(countries.len(), 1);
    assert_eq!(countries[0].code.as_str(), "US");

    // The filtered form still surfaces the broken provider's failure.
    let err = service
        .list_services(Some(ProviderId::TigerSms), &country)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Provider {
            provider: ProviderId::TigerSms,
            ..
        }
    ));
}

#[tokio::test]
async fn unknown_order_is_reported() {
    let store = MemoryStore::new();
    let service = service(vec![], store);
    let err = service
        .get_code(&sms_broker::OrderId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::OrderNotFound(_)));
}

#[tokio::test]
async fn unpriceable_rental_is_released_and_skipped() {
    let dassy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("action", "getNumber"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ACCESS_NUMBER:55:15559876543"))
        .mount(&dassy)
        .await;
    // No price for the requested service.
    Mock::given(method("GET"))
        .and(query_param("action", "getPrices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&dassy)
        .await;
    // The orphaned rental is released.
    Mock::given(method("GET"))
        .and(query_param("action", "setStatus"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ACCESS_CANCEL"))
        .expect(1)
        .mount(&dassy)
        .await;

    let store = MemoryStore::new();
    let account = AccountId::from("acct-1");
    store.deposit(&account, 5000.0);

    let service = service(vec![provider_config(ProviderId::Dassy, &dassy, 1)], store.clone());
    let err = service
        .create_order(
            &account,
            OrderRequest::auto("US".parse().unwrap(), "wa".parse().unwrap()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AllProvidersExhausted));
    // Nothing was billed.
    assert_eq!(store.balance(&account).await.unwrap(), 5000.0);
    assert!(store.ledger().is_empty());
}
