//! Container operation tests.

mod common;

use azurite_core::lease::{LeaseDuration, LeaseState, LeaseStatus};
use azurite_core::ErrorCode;
use common::{at, http_date, t0, TestService};

#[tokio::test]
async fn test_create_container() {
    let test = TestService::start("created").await;

    let container = test
        .service
        .get_container_properties(&test.container_ctx(t0()))
        .await
        .unwrap();
    assert_eq!(container.name, "created");
    assert!(container.properties.etag.starts_with("\"0x"));
    assert_eq!(container.properties.lease_state, Some(LeaseState::Available));
    assert_eq!(container.properties.lease_status, Some(LeaseStatus::Unlocked));
}

#[tokio::test]
async fn test_create_duplicate_container() {
    let test = TestService::start("dup").await;

    let err = test
        .service
        .create_container(&test.container_ctx(t0()))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ContainerAlreadyExists);
    assert_eq!(err.code.status_code(), http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_container_metadata() {
    let test = TestService::start("plain").await;
    let ctx = azurite_core::RequestContext::for_container(azurite_core::DEFAULT_ACCOUNT, "withmeta")
        .with_header("x-ms-meta-team", "storage");
    let container = test.service.create_container(&ctx).await.unwrap();
    assert_eq!(container.metadata.get("team").map(String::as_str), Some("storage"));
}

#[tokio::test]
async fn test_delete_container_removes_blobs() {
    let test = TestService::start("doomed").await;
    test.create_page_blob("disk.vhd", 512).await;

    test.service
        .delete_container(&test.container_ctx(t0()))
        .await
        .unwrap();

    let err = test
        .service
        .get_container_properties(&test.container_ctx(t0()))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ContainerNotFound);

    // Recreating the container does not bring the blob back.
    test.service.create_container(&test.container_ctx(at(1))).await.unwrap();
    let err = test
        .service
        .get_blob_properties(&test.blob_ctx("disk.vhd", at(1)))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::BlobNotFound);
}

#[tokio::test]
async fn test_container_lease_guards_delete() {
    let test = TestService::start("leased").await;

    let acquire = test
        .container_ctx(t0())
        .with_header("x-ms-lease-action", "acquire")
        .with_header("x-ms-lease-duration", "30");
    let lease_id = test.service.container_lease(&acquire).await.unwrap().lease_id.unwrap();

    let container = test
        .service
        .get_container_properties(&test.container_ctx(at(10)))
        .await
        .unwrap();
    assert_eq!(container.properties.lease_state, Some(LeaseState::Leased));
    assert_eq!(container.properties.lease_duration, Some(LeaseDuration::Fixed));

    let err = test
        .service
        .delete_container(&test.container_ctx(at(10)))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::LeaseIdMissing);

    let err = test
        .service
        .delete_container(&test.container_ctx(at(10)).with_header("x-ms-lease-id", "wrong"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::LeaseIdMismatchWithContainerOperation);

    // Reads with a wrong lease id fail too.
    let err = test
        .service
        .get_container_properties(&test.container_ctx(at(10)).with_header("x-ms-lease-id", "wrong"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::LeaseIdMismatchWithContainerOperation);

    test.service
        .delete_container(&test.container_ctx(at(10)).with_header("x-ms-lease-id", &lease_id))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_expired_container_lease() {
    let test = TestService::start("expiring").await;

    let acquire = test
        .container_ctx(t0())
        .with_header("x-ms-lease-action", "acquire")
        .with_header("x-ms-lease-duration", "15");
    test.service.container_lease(&acquire).await.unwrap();

    let container = test
        .service
        .get_container_properties(&test.container_ctx(at(20)))
        .await
        .unwrap();
    assert_eq!(container.properties.lease_state, Some(LeaseState::Expired));

    let err = test
        .service
        .get_container_properties(&test.container_ctx(at(20)).with_header("x-ms-lease-id", "any"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::LeaseNotPresentWithContainerOperation);

    test.service
        .delete_container(&test.container_ctx(at(20)))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_container_lease_uses_date_conditions_only() {
    let test = TestService::start("dated").await;

    // Etag conditions are ignored for container leases.
    let acquire = test
        .container_ctx(at(1))
        .with_header("x-ms-lease-action", "acquire")
        .with_header("if-match", "\"0xOTHER\"");
    let lease_id = test.service.container_lease(&acquire).await.unwrap().lease_id.unwrap();

    let release = test
        .container_ctx(at(2))
        .with_header("x-ms-lease-action", "release")
        .with_header("x-ms-lease-id", &lease_id)
        .with_header("if-unmodified-since", &http_date(at(-60)));
    let err = test.service.container_lease(&release).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ConditionNotMet);

    let release = test
        .container_ctx(at(2))
        .with_header("x-ms-lease-action", "release")
        .with_header("x-ms-lease-id", &lease_id)
        .with_header("if-modified-since", &http_date(at(-60)));
    let response = test.service.container_lease(&release).await.unwrap();
    assert_eq!(response.lease_id, None);
}

#[tokio::test]
async fn test_container_break_and_change() {
    let test = TestService::start("breaking").await;

    let acquire = test
        .container_ctx(t0())
        .with_header("x-ms-lease-action", "acquire")
        .with_header("x-ms-lease-duration", "60");
    let lease_id = test.service.container_lease(&acquire).await.unwrap().lease_id.unwrap();

    let brk = test
        .container_ctx(at(10))
        .with_header("x-ms-lease-action", "break");
    let response = test.service.container_lease(&brk).await.unwrap();
    // A fixed lease breaks when it would have expired.
    assert_eq!(response.lease_time, Some(50));

    let change = test
        .container_ctx(at(11))
        .with_header("x-ms-lease-action", "change")
        .with_header("x-ms-lease-id", &lease_id)
        .with_header("x-ms-proposed-lease-id", "33333333-3333-3333-3333-333333333333");
    let err = test.service.container_lease(&change).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::LeaseIsBreakingAndCannotBeChanged);

    // A shorter break period moves the break earlier.
    let brk = test
        .container_ctx(at(12))
        .with_header("x-ms-lease-action", "break")
        .with_header("x-ms-lease-break-period", "0");
    let response = test.service.container_lease(&brk).await.unwrap();
    assert_eq!(response.lease_time, Some(0));

    let container = test
        .service
        .get_container_properties(&test.container_ctx(at(12)))
        .await
        .unwrap();
    assert_eq!(container.properties.lease_state, Some(LeaseState::Broken));

    let bad = test
        .container_ctx(at(13))
        .with_header("x-ms-lease-action", "break")
        .with_header("x-ms-lease-break-period", "61");
    let err = test.service.container_lease(&bad).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidLeaseBreakPeriod);
}
