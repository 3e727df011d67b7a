//! Conditional header tests against blobs.

mod common;

use azurite_core::ErrorCode;
use bytes::Bytes;
use common::{at, http_date, t0, TestService};
use std::collections::HashMap;

const BLOB: &str = "report.bin";

async fn setup() -> (TestService, String) {
    let test = TestService::start("conditions").await;
    let blob = test.create_page_blob(BLOB, 1024).await;
    (test, blob.properties.etag)
}

#[tokio::test]
async fn test_read_if_match() {
    let (test, etag) = setup().await;

    test.service
        .get_blob_properties(&test.blob_ctx(BLOB, t0()).with_header("if-match", &etag))
        .await
        .unwrap();
    test.service
        .get_blob_properties(&test.blob_ctx(BLOB, t0()).with_header("if-match", "*"))
        .await
        .unwrap();

    let err = test
        .service
        .get_blob_properties(&test.blob_ctx(BLOB, t0()).with_header("if-match", "\"0xOTHER\""))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConditionNotMet);
}

#[tokio::test]
async fn test_read_if_none_match() {
    let (test, etag) = setup().await;

    let err = test
        .service
        .get_blob_properties(&test.blob_ctx(BLOB, t0()).with_header("if-none-match", &etag))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotModified);

    let err = test
        .service
        .get_blob_properties(&test.blob_ctx(BLOB, t0()).with_header("if-none-match", "*"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotModified);

    test.service
        .get_blob_properties(&test.blob_ctx(BLOB, t0()).with_header("if-none-match", "\"0xOTHER\""))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_read_dates() {
    let (test, _) = setup().await;

    test.service
        .download_blob(
            &test
                .blob_ctx(BLOB, t0())
                .with_header("if-modified-since", &http_date(at(-10))),
        )
        .await
        .unwrap();

    let err = test
        .service
        .download_blob(
            &test
                .blob_ctx(BLOB, t0())
                .with_header("if-modified-since", &http_date(t0())),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotModified);

    let err = test
        .service
        .download_blob(
            &test
                .blob_ctx(BLOB, t0())
                .with_header("if-unmodified-since", &http_date(at(-10))),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConditionNotMet);

    // Unparseable dates are ignored.
    test.service
        .download_blob(&test.blob_ctx(BLOB, t0()).with_header("if-unmodified-since", "yesterday"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_read_missing_blob() {
    let test = TestService::start("conditions").await;

    let err = test
        .service
        .get_blob_properties(&test.blob_ctx("missing", t0()).with_header("if-match", "\"0x1\""))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConditionNotMet);

    let err = test
        .service
        .get_blob_properties(&test.blob_ctx("missing", t0()).with_header("if-none-match", "*"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UnsatisfiableCondition);

    let err = test
        .service
        .get_blob_properties(&test.blob_ctx("missing", t0()))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::BlobNotFound);
}

#[tokio::test]
async fn test_write_if_match() {
    let (test, etag) = setup().await;

    let write = |if_match: &str| {
        test.blob_ctx(BLOB, at(1))
            .with_header("x-ms-range", "bytes=0-511")
            .with_header("if-match", if_match)
    };

    let err = test
        .service
        .upload_pages(&write("\"0xOTHER\""), Bytes::from(vec![1u8; 512]))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConditionNotMet);

    let blob = test
        .service
        .upload_pages(&write(&etag), Bytes::from(vec![1u8; 512]))
        .await
        .unwrap();

    // The old etag no longer matches.
    let err = test
        .service
        .upload_pages(&write(&etag), Bytes::from(vec![1u8; 512]))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConditionNotMet);

    test.service
        .upload_pages(&write(&blob.properties.etag), Bytes::from(vec![1u8; 512]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_if_none_match_star() {
    let test = TestService::start("conditions").await;

    let ctx = test
        .blob_ctx(BLOB, t0())
        .with_header("x-ms-blob-content-length", "512")
        .with_header("if-none-match", "*");
    test.service.create_page_blob(&ctx).await.unwrap();

    // A wildcard does not block overwriting on the write path.
    test.service.create_page_blob(&ctx).await.unwrap();

    let blob = test
        .service
        .get_blob_properties(&test.blob_ctx(BLOB, t0()))
        .await
        .unwrap();
    let overwrite = test
        .blob_ctx(BLOB, t0())
        .with_header("x-ms-blob-content-length", "512")
        .with_header("if-none-match", &blob.properties.etag);
    let err = test.service.create_page_blob(&overwrite).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ConditionNotMet);
}

#[tokio::test]
async fn test_write_rejects_header_combinations() {
    let (test, etag) = setup().await;

    let ctx = test
        .blob_ctx(BLOB, at(1))
        .with_header("if-none-match", "\"0xOTHER\"")
        .with_header("if-modified-since", &http_date(at(-10)));
    let err = test.service.delete_blob(&ctx).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::MultipleConditionHeadersNotSupported);

    let ctx = test
        .blob_ctx(BLOB, at(1))
        .with_header("if-match", &format!("{}, \"0xOTHER\"", etag));
    let err = test.service.delete_blob(&ctx).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::MultipleConditionHeadersNotSupported);

    let ctx = test
        .blob_ctx(BLOB, at(1))
        .with_header("if-match", &etag)
        .with_header("if-unmodified-since", &http_date(at(1)));
    test.service.delete_blob(&ctx).await.unwrap();
}

#[tokio::test]
async fn test_if_tags() {
    let (test, _) = setup().await;
    let tags = HashMap::from([
        ("tier".to_string(), "hot".to_string()),
        ("owner".to_string(), "data-team".to_string()),
    ]);
    test.service
        .set_blob_tags(&test.blob_ctx(BLOB, t0()), tags.clone())
        .await
        .unwrap();

    let props = test
        .service
        .get_blob_properties(
            &test
                .blob_ctx(BLOB, t0())
                .with_header("x-ms-if-tags", "\"tier\" = 'hot'"),
        )
        .await
        .unwrap();
    assert_eq!(props.tags, tags);

    let err = test
        .service
        .get_blob_properties(
            &test
                .blob_ctx(BLOB, t0())
                .with_header("x-ms-if-tags", "tier = 'cold' OR owner <> 'data-team'"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConditionNotMet);

    let err = test
        .service
        .get_blob_properties(&test.blob_ctx(BLOB, t0()).with_header("x-ms-if-tags", "tier ="))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidHeaderValue);
}

#[tokio::test]
async fn test_set_tags_ignores_etag_conditions() {
    let (test, _) = setup().await;
    let tags = HashMap::from([("a".to_string(), "1".to_string())]);

    // Comparisons against a tag the blob does not have are false.
    let ctx = test
        .blob_ctx(BLOB, t0())
        .with_header("x-ms-if-tags", "a = '1'");
    let err = test.service.set_blob_tags(&ctx, tags.clone()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ConditionNotMet);

    let ctx = test
        .blob_ctx(BLOB, t0())
        .with_header("if-match", "\"0xOTHER\"");
    test.service.set_blob_tags(&ctx, tags.clone()).await.unwrap();

    let ctx = test
        .blob_ctx(BLOB, t0())
        .with_header("if-match", "\"0xOTHER\"")
        .with_header("x-ms-if-tags", "a = '1'");
    test.service.set_blob_tags(&ctx, tags.clone()).await.unwrap();

    let ctx = test
        .blob_ctx(BLOB, t0())
        .with_header("x-ms-if-tags", "a = '2'");
    let err = test.service.set_blob_tags(&ctx, tags).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ConditionNotMet);
}

#[tokio::test]
async fn test_if_tags_nesting_limit() {
    let (test, _) = setup().await;

    let deep = format!("{}tier = 'hot'{}", "(".repeat(5000), ")".repeat(5000));
    let err = test
        .service
        .get_blob_properties(&test.blob_ctx(BLOB, t0()).with_header("x-ms-if-tags", &deep))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidHeaderValue);

    // The blob has no tier tag, so a shallow predicate evaluates to false.
    let shallow = format!("{}tier = 'hot'{}", "(".repeat(8), ")".repeat(8));
    let err = test
        .service
        .get_blob_properties(&test.blob_ctx(BLOB, t0()).with_header("x-ms-if-tags", &shallow))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConditionNotMet);
}
