// crates/infra-harness/src/s3.rs
// ============================================================================
// Module: S3 Bucket Inspection
// Description: Blocking bucket existence and versioning lookups.
// Purpose: Verify provisioned artifact buckets against the live control plane.
// Dependencies: aws-config, aws-sdk-s3, tokio, thiserror
// ============================================================================

//! ## Overview
//! [`S3Inspector`] owns a private tokio runtime and blocks on SDK calls so
//! scenarios stay synchronous. The runtime is dropped on a helper thread,
//! which keeps drop safe when the inspector is released inside an async
//! context.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::Client;
use aws_sdk_s3::types::BucketVersioningStatus;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::runtime::Runtime;
use tokio::runtime::RuntimeFlavor;

use crate::events::EventKind;
use crate::events::EventOutcome;
use crate::events::EventSink;
use crate::events::HarnessEvent;
use crate::retry::AttemptError;
use crate::retry::RetryError;
use crate::retry::RetryPolicy;
use crate::retry::do_with_retry;


// ============================================================================
// SECTION: Errors
// ============================================================================

/// S3 inspection failures.
#[derive(Debug, Error)]
pub enum S3Error {
    /// Runtime or client construction failed.
    #[error("s3 client error: {0}")]
    Client(String),
    /// The service rejected a request.
    #[error("s3 request for bucket {bucket} failed: {message}")]
    Request {
        /// Bucket name.
        bucket: String,
        /// Service error.
        message: String,
    },
    /// The bucket did not appear within the retry budget.
    #[error("bucket {bucket} not found after {attempts} attempts")]
    BucketMissing {
        /// Bucket name.
        bucket: String,
        /// Attempts made.
        attempts: u32,
    },
    /// A retried lookup gave up.
    #[error("{0}")]
    Retry(Box<RetryError<S3Error>>),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Bucket versioning state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersioningStatus {
    /// Versioning is on.
    Enabled,
    /// Versioning was on and has been suspended.
    Suspended,
    /// Versioning was never configured.
    Disabled,
}

impl VersioningStatus {
    /// Maps the SDK status; an absent status means never configured.
    #[must_use]
    pub fn from_sdk(status: Option<&BucketVersioningStatus>) -> Self {
        match status {
            Some(BucketVersioningStatus::Enabled) => Self::Enabled,
            Some(BucketVersioningStatus::Suspended) => Self::Suspended,
            _ => Self::Disabled,
        }
    }

    /// Stable label used in events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "Enabled",
            Self::Suspended => "Suspended",
            Self::Disabled => "Disabled",
        }
    }
}

impl fmt::Display for VersioningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Read-only bucket inspection.
pub trait BucketInspector {
    /// Returns whether the bucket exists and is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`S3Error`] for failures other than "not found".
    fn bucket_exists(&self, bucket: &str) -> Result<bool, S3Error>;

    /// Returns the bucket's versioning state.
    ///
    /// # Errors
    ///
    /// Returns [`S3Error`] when the lookup fails.
    fn bucket_versioning(&self, bucket: &str) -> Result<VersioningStatus, S3Error>;
}

// ============================================================================
// SECTION: SDK Inspector
// ============================================================================

/// Blocks on an SDK future, borrowing a surrounding multi-thread runtime when
/// one is active.
fn block_on_with_runtime<F, T>(runtime: &Runtime, future: F) -> Result<T, S3Error>
where
    F: Future<Output = Result<T, S3Error>> + Send + 'static,
    T: Send + 'static,
{
    if let Ok(handle) = Handle::try_current() {
        if matches!(handle.runtime_flavor(), RuntimeFlavor::MultiThread) {
            return tokio::task::block_in_place(|| handle.block_on(future));
        }
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        std::thread::spawn(move || {
            let result = Runtime::new()
                .map_err(|err| S3Error::Client(err.to_string()))
                .and_then(|runtime| runtime.block_on(future));
            let _ = tx.send(result);
        });
        return rx
            .recv()
            .unwrap_or_else(|_| Err(S3Error::Client("s3 worker thread join failed".to_string())));
    }
    runtime.block_on(future)
}

/// AWS SDK-backed bucket inspector.
pub struct S3Inspector {
    /// Underlying S3 client.
    client: Client,
    /// Tokio runtime for blocking SDK calls.
    runtime: Option<Arc<Runtime>>,
}

impl Drop for S3Inspector {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = std::thread::spawn(move || drop(runtime));
        }
    }
}

impl S3Inspector {
    /// Builds an inspector for `region`, optionally against a compatible
    /// endpoint (path-style addressing is forced for endpoints).
    ///
    /// # Errors
    ///
    /// Returns [`S3Error::Client`] when the runtime cannot be created.
    pub fn new(region: &str, endpoint: Option<&str>) -> Result<Self, S3Error> {
        let runtime = Runtime::new().map_err(|err| S3Error::Client(err.to_string()))?;
        let region = region.to_string();
        let endpoint = endpoint.map(str::to_string);
        let force_path_style = endpoint.is_some();
        let shared_config = block_on_with_runtime(&runtime, async move {
            let mut loader =
                aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region));
            if let Some(endpoint) = endpoint {
                loader = loader.endpoint_url(endpoint);
            }
            Ok(loader.load().await)
        })?;
        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if force_path_style {
            s3_builder = s3_builder.force_path_style(true);
        }
        Ok(Self {
            client: Client::from_conf(s3_builder.build()),
            runtime: Some(Arc::new(runtime)),
        })
    }

    /// Returns the runtime or an error if shut down.
    fn runtime(&self) -> Result<&Runtime, S3Error> {
        self.runtime
            .as_ref()
            .map(AsRef::as_ref)
            .ok_or_else(|| S3Error::Client("s3 runtime closed".to_string()))
    }
}

impl BucketInspector for S3Inspector {
    fn bucket_exists(&self, bucket: &str) -> Result<bool, S3Error> {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        block_on_with_runtime(self.runtime()?, async move {
            match client.head_bucket().bucket(&bucket).send().await {
                Ok(_) => Ok(true),
                Err(err) => {
                    let service_error = err.into_service_error();
                    if service_error.is_not_found() {
                        Ok(false)
                    } else {
                        Err(S3Error::Request {
                            bucket,
                            message: service_error.to_string(),
                        })
                    }
                }
            }
        })
    }

    fn bucket_versioning(&self, bucket: &str) -> Result<VersioningStatus, S3Error> {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        block_on_with_runtime(self.runtime()?, async move {
            let output =
                client.get_bucket_versioning().bucket(&bucket).send().await.map_err(|err| {
                    S3Error::Request {
                        bucket: bucket.clone(),
                        message: err.into_service_error().to_string(),
                    }
                })?;
            Ok(VersioningStatus::from_sdk(output.status()))
        })
    }
}

// ============================================================================
// SECTION: Retried Checks
// ============================================================================

/// Polls until `bucket` exists.
///
/// # Errors
///
/// Returns [`S3Error::BucketMissing`] when the bucket never appears, or the
/// last request error when lookups keep failing.
pub fn wait_for_bucket(
    inspector: &dyn BucketInspector,
    bucket: &str,
    policy: RetryPolicy,
    sink: &dyn EventSink,
) -> Result<(), S3Error> {
    let description = format!("bucket {bucket} exists");
    let result: Result<(), RetryError<S3Error>> = do_with_retry(&description, policy, sink, || {
        if inspector.bucket_exists(bucket)? {
            Ok(())
        } else {
            Err(AttemptError::Retryable(S3Error::BucketMissing {
                bucket: bucket.to_string(),
                attempts: 1,
            }))
        }
    });
    match result {
        Ok(()) => {
            sink.record(
                &HarnessEvent::new(EventKind::BucketInspected, bucket, EventOutcome::Ok)
                    .with_message("exists"),
            );
            Ok(())
        }
        Err(RetryError::Exhausted {
            attempts,
            last_error: S3Error::BucketMissing { .. },
            ..
        }) => Err(S3Error::BucketMissing {
            bucket: bucket.to_string(),
            attempts,
        }),
        Err(err) => Err(S3Error::Retry(Box::new(err))),
    }
}

/// Looks up the versioning state of `bucket` with retries and records it.
///
/// # Errors
///
/// Returns [`S3Error::Retry`] when every lookup fails.
pub fn versioning_with_retry(
    inspector: &dyn BucketInspector,
    bucket: &str,
    policy: RetryPolicy,
    sink: &dyn EventSink,
) -> Result<VersioningStatus, S3Error> {
    let description = format!("bucket {bucket} versioning");
    let result: Result<VersioningStatus, RetryError<S3Error>> =
        do_with_retry(&description, policy, sink, || {
            inspector.bucket_versioning(bucket).map_err(AttemptError::Retryable)
        });
    let status = result.map_err(|err| S3Error::Retry(Box::new(err)))?;
    sink.record(
        &HarnessEvent::new(EventKind::BucketInspected, bucket, EventOutcome::Info)
            .with_message(format!("versioning {status}")),
    );
    Ok(status)
}
