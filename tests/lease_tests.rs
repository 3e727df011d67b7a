//! Blob lease lifecycle tests.

mod common;

use azurite_core::lease::LeaseState;
use azurite_core::ErrorCode;
use bytes::Bytes;
use common::{at, t0, TestService};

const BLOB: &str = "leased.vhd";

async fn setup() -> TestService {
    let test = TestService::start("leases").await;
    test.create_page_blob(BLOB, 1024).await;
    test
}

fn upload_ctx(test: &TestService, seconds: i64) -> azurite_core::RequestContext {
    test.blob_ctx(BLOB, at(seconds))
        .with_header("x-ms-range", "bytes=0-511")
}

#[tokio::test]
async fn test_acquire_blocks_writes_without_lease_id() {
    let test = setup().await;
    let lease_id = test.acquire_blob_lease(BLOB, -1, t0()).await;

    let err = test
        .service
        .upload_pages(&upload_ctx(&test, 1), Bytes::from(vec![1u8; 512]))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::LeaseIdMissing);
    assert!(err.request_id.is_some());

    let err = test
        .service
        .upload_pages(
            &upload_ctx(&test, 1).with_header("x-ms-lease-id", "someone-else"),
            Bytes::from(vec![1u8; 512]),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::LeaseIdMismatchWithBlobOperation);

    test.service
        .upload_pages(
            &upload_ctx(&test, 1).with_header("x-ms-lease-id", &lease_id.to_uppercase()),
            Bytes::from(vec![1u8; 512]),
        )
        .await
        .unwrap();

    // Reads need no lease id.
    let props = test.service.get_blob_properties(&test.blob_ctx(BLOB, at(2))).await.unwrap();
    assert_eq!(props.properties.lease_state, Some(LeaseState::Leased));
    assert_eq!(props.properties.lease_id.as_deref(), Some(lease_id.as_str()));
}

#[tokio::test]
async fn test_acquire_twice_with_other_id_fails() {
    let test = setup().await;
    test.acquire_blob_lease(BLOB, 30, t0()).await;

    let ctx = test
        .blob_ctx(BLOB, at(5))
        .with_header("x-ms-lease-action", "acquire")
        .with_header("x-ms-lease-duration", "30")
        .with_header("x-ms-proposed-lease-id", "11111111-1111-1111-1111-111111111111");
    let err = test.service.blob_lease(&ctx).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::LeaseAlreadyPresent);
}

#[tokio::test]
async fn test_invalid_duration_is_rejected() {
    let test = setup().await;
    let ctx = test
        .blob_ctx(BLOB, t0())
        .with_header("x-ms-lease-action", "acquire")
        .with_header("x-ms-lease-duration", "10");
    let err = test.service.blob_lease(&ctx).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidLeaseDuration);
}

#[tokio::test]
async fn test_fixed_lease_expires() {
    let test = setup().await;
    let lease_id = test.acquire_blob_lease(BLOB, 15, t0()).await;

    let props = test.service.get_blob_properties(&test.blob_ctx(BLOB, at(15))).await.unwrap();
    assert_eq!(props.properties.lease_state, Some(LeaseState::Expired));

    // An expired lease no longer guards writes.
    test.service
        .upload_pages(&upload_ctx(&test, 16), Bytes::from(vec![2u8; 512]))
        .await
        .unwrap();

    // The write released the expired lease, so it cannot be renewed.
    let renew = test
        .blob_ctx(BLOB, at(17))
        .with_header("x-ms-lease-action", "renew")
        .with_header("x-ms-lease-id", &lease_id);
    let err = test.service.blob_lease(&renew).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::LeaseIdMismatchWithLeaseOperation);
}

#[tokio::test]
async fn test_renew_expired_lease() {
    let test = setup().await;
    let lease_id = test.acquire_blob_lease(BLOB, 20, t0()).await;

    let renew = test
        .blob_ctx(BLOB, at(25))
        .with_header("x-ms-lease-action", "renew")
        .with_header("x-ms-lease-id", &lease_id);
    let response = test.service.blob_lease(&renew).await.unwrap();
    assert_eq!(response.lease_id.as_deref(), Some(lease_id.as_str()));

    let props = test.service.get_blob_properties(&test.blob_ctx(BLOB, at(44))).await.unwrap();
    assert_eq!(props.properties.lease_state, Some(LeaseState::Leased));
    let props = test.service.get_blob_properties(&test.blob_ctx(BLOB, at(45))).await.unwrap();
    assert_eq!(props.properties.lease_state, Some(LeaseState::Expired));
}

#[tokio::test]
async fn test_change_lease_id() {
    let test = setup().await;
    let old_id = test.acquire_blob_lease(BLOB, -1, t0()).await;
    let new_id = "22222222-2222-2222-2222-222222222222";

    let change = test
        .blob_ctx(BLOB, at(1))
        .with_header("x-ms-lease-action", "change")
        .with_header("x-ms-lease-id", &old_id)
        .with_header("x-ms-proposed-lease-id", new_id);
    let response = test.service.blob_lease(&change).await.unwrap();
    assert_eq!(response.lease_id.as_deref(), Some(new_id));

    // Retrying the same change is accepted.
    test.service.blob_lease(&change).await.unwrap();

    let err = test
        .service
        .upload_pages(
            &upload_ctx(&test, 2).with_header("x-ms-lease-id", &old_id),
            Bytes::from(vec![1u8; 512]),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::LeaseIdMismatchWithBlobOperation);
}

#[tokio::test]
async fn test_break_with_period() {
    let test = setup().await;
    let lease_id = test.acquire_blob_lease(BLOB, -1, t0()).await;

    let brk = test
        .blob_ctx(BLOB, at(5))
        .with_header("x-ms-lease-action", "break")
        .with_header("x-ms-lease-break-period", "10");
    let response = test.service.blob_lease(&brk).await.unwrap();
    assert_eq!(response.lease_time, Some(10));
    assert_eq!(response.lease_id, None);

    let props = test.service.get_blob_properties(&test.blob_ctx(BLOB, at(10))).await.unwrap();
    assert_eq!(props.properties.lease_state, Some(LeaseState::Breaking));

    // Still locked while breaking.
    let err = test
        .service
        .upload_pages(&upload_ctx(&test, 10), Bytes::from(vec![1u8; 512]))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::LeaseIdMissing);

    let renew = test
        .blob_ctx(BLOB, at(11))
        .with_header("x-ms-lease-action", "renew")
        .with_header("x-ms-lease-id", &lease_id);
    let err = test.service.blob_lease(&renew).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::LeaseIsBrokenAndCannotBeRenewed);

    let props = test.service.get_blob_properties(&test.blob_ctx(BLOB, at(15))).await.unwrap();
    assert_eq!(props.properties.lease_state, Some(LeaseState::Broken));

    test.service
        .upload_pages(&upload_ctx(&test, 15), Bytes::from(vec![1u8; 512]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_break_infinite_lease_immediately() {
    let test = setup().await;
    test.acquire_blob_lease(BLOB, -1, t0()).await;

    let brk = test
        .blob_ctx(BLOB, at(1))
        .with_header("x-ms-lease-action", "break");
    let response = test.service.blob_lease(&brk).await.unwrap();
    assert_eq!(response.lease_time, Some(0));

    // A broken lease can be acquired again with a new id.
    let new_id = test.acquire_blob_lease(BLOB, 60, at(2)).await;
    assert!(!new_id.is_empty());
}

#[tokio::test]
async fn test_release_and_reacquire() {
    let test = setup().await;
    let lease_id = test.acquire_blob_lease(BLOB, 60, t0()).await;

    let release = test
        .blob_ctx(BLOB, at(1))
        .with_header("x-ms-lease-action", "release")
        .with_header("x-ms-lease-id", &lease_id);
    let response = test.service.blob_lease(&release).await.unwrap();
    assert_eq!(response.lease_id, None);

    let props = test.service.get_blob_properties(&test.blob_ctx(BLOB, at(2))).await.unwrap();
    assert_eq!(props.properties.lease_state, Some(LeaseState::Available));

    // Releasing again fails.
    let err = test.service.blob_lease(&release).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::LeaseIdMismatchWithLeaseOperation);

    test.acquire_blob_lease(BLOB, 60, at(3)).await;
}

#[tokio::test]
async fn test_lease_operations_keep_etag() {
    let test = TestService::start("leases").await;
    let blob = test.create_page_blob(BLOB, 1024).await;

    let acquire = test
        .blob_ctx(BLOB, at(1))
        .with_header("x-ms-lease-action", "acquire")
        .with_header("x-ms-lease-duration", "-1");
    let response = test.service.blob_lease(&acquire).await.unwrap();
    assert_eq!(response.etag, blob.properties.etag);
    assert_eq!(response.last_modified, blob.properties.last_modified);
}

#[tokio::test]
async fn test_lease_on_missing_blob() {
    let test = TestService::start("leases").await;
    let ctx = test
        .blob_ctx("missing", t0())
        .with_header("x-ms-lease-action", "acquire");
    let err = test.service.blob_lease(&ctx).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::BlobNotFound);
}

#[tokio::test]
async fn test_delete_leased_blob() {
    let test = setup().await;
    let lease_id = test.acquire_blob_lease(BLOB, -1, t0()).await;

    let err = test
        .service
        .delete_blob(&test.blob_ctx(BLOB, at(1)))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::LeaseIdMissing);

    test.service
        .delete_blob(&test.blob_ctx(BLOB, at(1)).with_header("x-ms-lease-id", &lease_id))
        .await
        .unwrap();

    let err = test
        .service
        .get_blob_properties(&test.blob_ctx(BLOB, at(2)))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::BlobNotFound);
}
