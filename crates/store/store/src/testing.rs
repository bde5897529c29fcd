//! Backend conformance suite shared by every store implementation.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use uuid::Uuid;

use hookwire_core::{
    DeliveryFilter, DeliveryId, DeliveryOutcome, DeliveryStatus, NewDelivery, NewEndpoint,
    RetryPolicy, TenantId, WebhookEndpoint, WebhookSecret,
};

use crate::claim::{CancelReason, ClaimOutcome};
use crate::error::StoreError;
use crate::store::WebhookStore;

/// Current time at the precision every backend can store.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn unique_tenant() -> TenantId {
    TenantId::new(format!("conformance-{}", Uuid::new_v4().simple()))
}

async fn register(
    store: &dyn WebhookStore,
    tenant: &TenantId,
    patterns: &[&str],
) -> Result<WebhookEndpoint, StoreError> {
    let endpoint = NewEndpoint::new(
        tenant.clone(),
        "https://hooks.example.com/receive",
        patterns.iter().copied(),
    )
    .into_endpoint(WebhookSecret::new("conformance-secret"), now())
    .map_err(|e| StoreError::Backend(e.to_string()))?;
    store.insert_endpoint(&endpoint).await?;
    Ok(endpoint)
}

fn new_delivery(endpoint: &WebhookEndpoint, event_type: &str) -> NewDelivery {
    NewDelivery {
        endpoint_id: endpoint.id,
        tenant_id: endpoint.tenant_id.clone(),
        event_type: event_type.to_owned(),
        payload: r#"{"id":42}"#.to_owned(),
    }
}

async fn create_one(
    store: &dyn WebhookStore,
    endpoint: &WebhookEndpoint,
    event_type: &str,
    at: DateTime<Utc>,
) -> Result<DeliveryId, StoreError> {
    let ids = store
        .create_deliveries(vec![new_delivery(endpoint, event_type)], at)
        .await?;
    assert_eq!(ids.len(), 1);
    Ok(ids[0])
}

async fn claim(
    store: &dyn WebhookStore,
    id: DeliveryId,
    at: DateTime<Utc>,
) -> Result<hookwire_core::WebhookDelivery, StoreError> {
    match store.claim_delivery(id, at).await? {
        ClaimOutcome::Claimed { delivery, .. } => Ok(delivery),
        other => panic!("expected delivery {id} to be claimed, got {other:?}"),
    }
}

/// Run the full delivery store and endpoint registry conformance suite.
///
/// Call this from your backend's test module with a fresh store instance.
///
/// # Errors
///
/// Returns an error if a store operation fails unexpectedly. Assertion
/// failures panic.
pub async fn run_store_conformance_tests(store: &dyn WebhookStore) -> Result<(), StoreError> {
    test_endpoint_lifecycle(store).await?;
    test_resolve_subscribers(store).await?;
    test_create_deliveries(store).await?;
    test_due_ordering(store).await?;
    test_claim_pending(store).await?;
    test_claim_not_due(store).await?;
    test_claim_cancels_inactive(store).await?;
    test_claim_cancels_unsubscribed(store).await?;
    test_record_outcome(store).await?;
    test_record_outcome_requires_current_claim(store).await?;
    test_list_and_stats(store).await?;
    test_stale_claims(store).await?;
    Ok(())
}

async fn test_endpoint_lifecycle(store: &dyn WebhookStore) -> Result<(), StoreError> {
    let tenant = unique_tenant();
    let ep = register(store, &tenant, &["bio.*", "order.paid"]).await?;

    let fetched = store
        .get_endpoint(ep.id)
        .await?
        .expect("registered endpoint should be readable");
    assert_eq!(fetched.url, ep.url);
    assert_eq!(fetched.secret.expose(), "conformance-secret");
    assert_eq!(fetched.event_patterns, ep.event_patterns);
    assert!(fetched.active);

    assert!(
        matches!(
            store.insert_endpoint(&ep).await,
            Err(StoreError::Conflict(_))
        ),
        "duplicate endpoint id should conflict"
    );

    let t1 = now();
    let revoked = store.deactivate_endpoint(ep.id, t1).await?;
    assert!(!revoked.active);
    assert_eq!(revoked.revoked_at, Some(t1));

    let again = store
        .deactivate_endpoint(ep.id, t1 + Duration::seconds(60))
        .await?;
    assert_eq!(again.revoked_at, Some(t1), "deactivation should be idempotent");

    let listed = store.list_endpoints(&tenant).await?;
    assert_eq!(listed.len(), 1);
    assert!(store.list_endpoints(&unique_tenant()).await?.is_empty());

    assert!(store.get_endpoint(hookwire_core::EndpointId::generate()).await?.is_none());
    assert!(matches!(
        store
            .deactivate_endpoint(hookwire_core::EndpointId::generate(), t1)
            .await,
        Err(StoreError::NotFound(_))
    ));
    Ok(())
}

async fn test_resolve_subscribers(store: &dyn WebhookStore) -> Result<(), StoreError> {
    let tenant = unique_tenant();
    let exact = register(store, &tenant, &["bio.created"]).await?;
    let prefix = register(store, &tenant, &["bio.*"]).await?;
    let any = register(store, &tenant, &["*"]).await?;
    let other = register(store, &tenant, &["order.*"]).await?;
    let inactive = register(store, &tenant, &["bio.*"]).await?;
    store.deactivate_endpoint(inactive.id, now()).await?;
    // Same pattern, different tenant.
    let foreign = register(store, &unique_tenant(), &["bio.*"]).await?;

    let ids: Vec<_> = store
        .resolve_subscribers(&tenant, "bio.created")
        .await?
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids.len(), 3, "exact, prefix and catch-all should match");
    for expected in [exact.id, prefix.id, any.id] {
        assert!(ids.contains(&expected));
    }
    for excluded in [other.id, inactive.id, foreign.id] {
        assert!(!ids.contains(&excluded));
    }

    let ids: Vec<_> = store
        .resolve_subscribers(&tenant, "bio.updated")
        .await?
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids.len(), 2);

    assert!(
        store
            .resolve_subscribers(&unique_tenant(), "bio.created")
            .await?
            .is_empty()
    );
    Ok(())
}

async fn test_create_deliveries(store: &dyn WebhookStore) -> Result<(), StoreError> {
    let tenant = unique_tenant();
    let a = register(store, &tenant, &["*"]).await?;
    let b = register(store, &tenant, &["*"]).await?;
    let t = now();

    let ids = store
        .create_deliveries(
            vec![new_delivery(&a, "bio.created"), new_delivery(&b, "bio.created")],
            t,
        )
        .await?;
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);

    let first = store.get_delivery(ids[0]).await?.expect("row should exist");
    assert_eq!(first.endpoint_id, a.id);
    assert_eq!(first.tenant_id, tenant);
    assert_eq!(first.status, DeliveryStatus::Pending);
    assert_eq!(first.attempts, 0);
    assert_eq!(first.next_attempt_at, Some(t));
    assert_eq!(first.created_at, t);
    assert_eq!(first.payload, r#"{"id":42}"#);
    assert!(first.claimed_at.is_none());
    assert!(first.processed_at.is_none());

    let second = store.get_delivery(ids[1]).await?.expect("row should exist");
    assert_eq!(second.endpoint_id, b.id);

    assert!(store.create_deliveries(Vec::new(), t).await?.is_empty());
    assert!(store.get_delivery(DeliveryId::generate()).await?.is_none());
    Ok(())
}

async fn test_due_ordering(store: &dyn WebhookStore) -> Result<(), StoreError> {
    let tenant = unique_tenant();
    let ep = register(store, &tenant, &["*"]).await?;
    let base = now();

    let older = create_one(store, &ep, "bio.created", base - Duration::seconds(2)).await?;
    let newer = create_one(store, &ep, "bio.created", base - Duration::seconds(1)).await?;
    let future = create_one(store, &ep, "bio.created", base + Duration::hours(1)).await?;

    let due = store.list_due_deliveries(base, 10_000).await?;
    let pos = |id| due.iter().position(|d| *d == id);
    let older_pos = pos(older).expect("older row should be due");
    let newer_pos = pos(newer).expect("newer row should be due");
    assert!(older_pos < newer_pos, "due rows should be ordered by next_attempt_at");
    assert!(pos(future).is_none(), "future rows should not be due");

    assert_eq!(store.list_due_deliveries(base, 1).await?.len(), 1);

    // Claimed rows leave the due list.
    claim(store, older, base).await?;
    let due = store.list_due_deliveries(base, 10_000).await?;
    assert!(!due.contains(&older));
    Ok(())
}

async fn test_claim_pending(store: &dyn WebhookStore) -> Result<(), StoreError> {
    let tenant = unique_tenant();
    let ep = register(store, &tenant, &["bio.*"]).await?;
    let t = now();
    let id = create_one(store, &ep, "bio.created", t).await?;

    match store.claim_delivery(id, t).await? {
        ClaimOutcome::Claimed { delivery, endpoint } => {
            assert_eq!(delivery.status, DeliveryStatus::Queued);
            assert_eq!(delivery.claimed_at, Some(t));
            assert_eq!(delivery.attempts, 0);
            assert_eq!(endpoint.id, ep.id);
            assert_eq!(endpoint.secret.expose(), "conformance-secret");
        }
        other => panic!("expected claim, got {other:?}"),
    }

    let stored = store.get_delivery(id).await?.expect("row should exist");
    assert_eq!(stored.status, DeliveryStatus::Queued);

    match store.claim_delivery(id, t).await? {
        ClaimOutcome::NotClaimable { status } => assert_eq!(status, DeliveryStatus::Queued),
        other => panic!("double claim must be refused, got {other:?}"),
    }

    assert!(matches!(
        store.claim_delivery(DeliveryId::generate(), t).await?,
        ClaimOutcome::NotFound
    ));
    Ok(())
}

async fn test_claim_not_due(store: &dyn WebhookStore) -> Result<(), StoreError> {
    let tenant = unique_tenant();
    let ep = register(store, &tenant, &["*"]).await?;
    let t = now();
    let id = create_one(store, &ep, "bio.created", t + Duration::minutes(5)).await?;

    match store.claim_delivery(id, t).await? {
        ClaimOutcome::NotClaimable { status } => assert_eq!(status, DeliveryStatus::Pending),
        other => panic!("rows not yet due must not be claimed, got {other:?}"),
    }
    let stored = store.get_delivery(id).await?.expect("row should exist");
    assert_eq!(stored.status, DeliveryStatus::Pending);
    Ok(())
}

async fn test_claim_cancels_inactive(store: &dyn WebhookStore) -> Result<(), StoreError> {
    let tenant = unique_tenant();
    let ep = register(store, &tenant, &["bio.*"]).await?;
    let t = now();
    let id = create_one(store, &ep, "bio.created", t).await?;
    store.deactivate_endpoint(ep.id, t).await?;

    match store.claim_delivery(id, t).await? {
        ClaimOutcome::Cancelled { delivery, reason } => {
            assert_eq!(reason, CancelReason::EndpointInactive);
            assert_eq!(delivery.status, DeliveryStatus::Cancelled);
        }
        other => panic!("expected cancellation, got {other:?}"),
    }

    let stored = store.get_delivery(id).await?.expect("row should exist");
    assert_eq!(stored.status, DeliveryStatus::Cancelled);
    assert_eq!(stored.attempts, 0);
    assert!(stored.next_attempt_at.is_none());
    assert_eq!(stored.processed_at, Some(t));
    assert_eq!(
        stored.last_error.as_deref(),
        Some(CancelReason::EndpointInactive.as_str())
    );
    assert!(!store.list_due_deliveries(t, 10_000).await?.contains(&id));
    Ok(())
}

async fn test_claim_cancels_unsubscribed(store: &dyn WebhookStore) -> Result<(), StoreError> {
    let tenant = unique_tenant();
    let ep = register(store, &tenant, &["bio.*"]).await?;
    let t = now();
    let id = create_one(store, &ep, "order.paid", t).await?;

    match store.claim_delivery(id, t).await? {
        ClaimOutcome::Cancelled { reason, .. } => {
            assert_eq!(reason, CancelReason::NotSubscribed);
        }
        other => panic!("expected cancellation, got {other:?}"),
    }
    Ok(())
}

async fn test_record_outcome(store: &dyn WebhookStore) -> Result<(), StoreError> {
    let tenant = unique_tenant();
    let ep = register(store, &tenant, &["bio.*"]).await?;
    let policy = RetryPolicy::default();
    let t = now();
    let id = create_one(store, &ep, "bio.created", t).await?;

    let claimed = claim(store, id, t).await?;
    let failed = DeliveryOutcome::Failed {
        status_code: Some(500),
        error: "HTTP 500".into(),
    };
    let update = claimed.resolve_outcome(&failed, &policy, t)?;
    store
        .record_outcome(id, claimed.claimed_at.unwrap_or(t), &update)
        .await?;

    let stored = store.get_delivery(id).await?.expect("row should exist");
    assert_eq!(stored.status, DeliveryStatus::Retrying);
    assert_eq!(stored.attempts, 1);
    assert_eq!(stored.next_attempt_at, Some(t + Duration::seconds(30)));
    assert_eq!(stored.last_status_code, Some(500));
    assert_eq!(stored.last_error.as_deref(), Some("HTTP 500"));

    // Recording twice is refused.
    assert!(matches!(
        store
            .record_outcome(id, claimed.claimed_at.unwrap_or(t), &update)
            .await,
        Err(StoreError::NotQueued { status: DeliveryStatus::Retrying, .. })
    ));

    // Not due until the backoff elapses.
    assert!(matches!(
        store.claim_delivery(id, t + Duration::seconds(29)).await?,
        ClaimOutcome::NotClaimable { .. }
    ));
    let retry_at = t + Duration::seconds(30);
    let reclaimed = claim(store, id, retry_at).await?;
    assert_eq!(reclaimed.attempts, 1);
    assert_eq!(reclaimed.payload, r#"{"id":42}"#);

    let update = reclaimed.resolve_outcome(
        &DeliveryOutcome::Delivered { status_code: 200 },
        &policy,
        retry_at,
    )?;
    store.record_outcome(id, retry_at, &update).await?;

    let stored = store.get_delivery(id).await?.expect("row should exist");
    assert_eq!(stored.status, DeliveryStatus::Success);
    assert_eq!(stored.attempts, 2);
    assert!(stored.next_attempt_at.is_none());
    assert!(stored.last_error.is_none());
    assert_eq!(stored.processed_at, Some(retry_at));

    assert!(matches!(
        store
            .record_outcome(DeliveryId::generate(), retry_at, &update)
            .await,
        Err(StoreError::NotFound(_))
    ));
    Ok(())
}

async fn test_record_outcome_requires_current_claim(
    store: &dyn WebhookStore,
) -> Result<(), StoreError> {
    let tenant = unique_tenant();
    let ep = register(store, &tenant, &["*"]).await?;
    let t = now();
    let id = create_one(store, &ep, "bio.created", t).await?;
    let claimed = claim(store, id, t).await?;
    let update = claimed.resolve_outcome(
        &DeliveryOutcome::Delivered { status_code: 200 },
        &RetryPolicy::default(),
        t,
    )?;

    let err = store
        .record_outcome(id, t - Duration::seconds(1), &update)
        .await
        .expect_err("an outdated claim must not record an outcome");
    assert!(matches!(err, StoreError::ClaimSuperseded { .. }));

    let stored = store.get_delivery(id).await?.expect("row should exist");
    assert_eq!(stored.status, DeliveryStatus::Queued);
    Ok(())
}

async fn test_list_and_stats(store: &dyn WebhookStore) -> Result<(), StoreError> {
    let tenant = unique_tenant();
    let ep = register(store, &tenant, &["*"]).await?;
    let other = register(store, &tenant, &["*"]).await?;
    let base = now();

    let first = create_one(store, &ep, "bio.created", base - Duration::seconds(3)).await?;
    let second = create_one(store, &ep, "bio.updated", base - Duration::seconds(2)).await?;
    let third = create_one(store, &ep, "bio.deleted", base - Duration::seconds(1)).await?;
    create_one(store, &other, "bio.created", base).await?;

    let claimed = claim(store, first, base).await?;
    let update = claimed.resolve_outcome(
        &DeliveryOutcome::Delivered { status_code: 200 },
        &RetryPolicy::default(),
        base,
    )?;
    store.record_outcome(first, base, &update).await?;

    let listed = store
        .list_deliveries(&DeliveryFilter::default().with_endpoint(ep.id))
        .await?;
    let ids: Vec<_> = listed.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![third, second, first], "newest first");

    let by_tenant = store
        .list_deliveries(&DeliveryFilter::default().with_tenant(tenant.clone()))
        .await?;
    assert_eq!(by_tenant.len(), 4);

    let succeeded = store
        .list_deliveries(
            &DeliveryFilter::default()
                .with_endpoint(ep.id)
                .with_status(DeliveryStatus::Success),
        )
        .await?;
    assert_eq!(succeeded.len(), 1);
    assert_eq!(succeeded[0].id, first);

    let page = store
        .list_deliveries(
            &DeliveryFilter::default()
                .with_endpoint(ep.id)
                .with_limit(1)
                .with_offset(1),
        )
        .await?;
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, second);

    let stats = store.delivery_stats(ep.id).await?;
    assert_eq!(stats.total, 3);
    assert_eq!(stats.success, 1);
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.outstanding(), 2);

    let empty = store
        .delivery_stats(hookwire_core::EndpointId::generate())
        .await?;
    assert_eq!(empty.total, 0);
    Ok(())
}

async fn test_stale_claims(store: &dyn WebhookStore) -> Result<(), StoreError> {
    let tenant = unique_tenant();
    let ep = register(store, &tenant, &["*"]).await?;
    let t = now() - Duration::hours(2);
    let id = create_one(store, &ep, "bio.created", t).await?;
    let claimed = claim(store, id, t).await?;

    let stale = store
        .list_stale_claims(t + Duration::seconds(1), 10_000)
        .await?;
    assert!(stale.iter().any(|d| d.id == id));
    assert!(
        !store
            .list_stale_claims(t - Duration::seconds(1), 10_000)
            .await?
            .iter()
            .any(|d| d.id == id)
    );

    let update = claimed.resolve_outcome(
        &DeliveryOutcome::failed("claim expired before outcome was recorded"),
        &RetryPolicy::default(),
        t,
    )?;
    store.record_outcome(id, t, &update).await?;
    assert!(
        !store
            .list_stale_claims(t + Duration::seconds(1), 10_000)
            .await?
            .iter()
            .any(|d| d.id == id)
    );
    Ok(())
}
