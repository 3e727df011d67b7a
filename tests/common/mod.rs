//! Common test utilities.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};

use azurite_core::{BlobModel, BlobService, Config, RequestContext, DEFAULT_ACCOUNT};

/// Fixed "now" every test starts from.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
}

/// `t0()` plus the given number of seconds.
pub fn at(seconds: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(seconds)
}

/// HTTP date header value for a time.
pub fn http_date(time: DateTime<Utc>) -> String {
    azurite_core::context::format_http_date(&time)
}

/// Service wrapper with one container already created.
pub struct TestService {
    pub service: BlobService,
    pub container: String,
}

impl TestService {
    /// Creates a service and a container named `container`.
    pub async fn start(container: &str) -> Self {
        Self::start_with(container, Config::default()).await
    }

    /// Like `start`, with a custom configuration.
    pub async fn start_with(container: &str, config: Config) -> Self {
        let service = BlobService::new(config);
        let test = Self {
            service,
            container: container.to_string(),
        };
        test.service
            .create_container(&test.container_ctx(t0()))
            .await
            .unwrap();
        test
    }

    pub fn container_ctx(&self, now: DateTime<Utc>) -> RequestContext {
        RequestContext::for_container(DEFAULT_ACCOUNT, &self.container).with_timestamp(now)
    }

    pub fn blob_ctx(&self, blob: &str, now: DateTime<Utc>) -> RequestContext {
        RequestContext::for_blob(DEFAULT_ACCOUNT, &self.container, blob).with_timestamp(now)
    }

    /// Creates a page blob of `size` bytes at `t0()`.
    pub async fn create_page_blob(&self, blob: &str, size: u64) -> BlobModel {
        let ctx = self
            .blob_ctx(blob, t0())
            .with_header("x-ms-blob-content-length", &size.to_string());
        self.service.create_page_blob(&ctx).await.unwrap()
    }

    /// Writes `len` bytes of `fill` at `start`.
    pub async fn write_pages(&self, blob: &str, start: u64, len: u64, fill: u8) -> BlobModel {
        let ctx = self
            .blob_ctx(blob, t0())
            .with_header("x-ms-range", &format!("bytes={}-{}", start, start + len - 1));
        self.service
            .upload_pages(&ctx, bytes::Bytes::from(vec![fill; len as usize]))
            .await
            .unwrap()
    }

    /// Acquires a blob lease and returns its id.
    pub async fn acquire_blob_lease(
        &self,
        blob: &str,
        duration: i64,
        now: DateTime<Utc>,
    ) -> String {
        let ctx = self
            .blob_ctx(blob, now)
            .with_header("x-ms-lease-action", "acquire")
            .with_header("x-ms-lease-duration", &duration.to_string());
        self.service.blob_lease(&ctx).await.unwrap().lease_id.unwrap()
    }
}
