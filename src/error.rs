//! Azure Blob Storage error types and error body formatting.

use http::StatusCode;
use thiserror::Error;

/// Azure Storage error codes raised by the emulator core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // General errors
    ConditionNotMet,
    InternalError,
    InvalidHeaderValue,
    InvalidQueryParameterValue,
    InvalidRange,
    MissingRequiredHeader,
    MultipleConditionHeadersNotSupported,
    NotModified,
    OutOfRangeInput,
    UnsatisfiableCondition,

    // Blob-specific errors
    BlobNotFound,
    ContainerAlreadyExists,
    ContainerNotFound,
    InvalidBlobType,
    InvalidLeaseBreakPeriod,
    InvalidLeaseDuration,
    InvalidPageRange,
    InvalidTag,
    LeaseAlreadyPresent,
    LeaseIdMismatchWithBlobOperation,
    LeaseIdMismatchWithContainerOperation,
    LeaseIdMismatchWithLeaseOperation,
    LeaseIdMissing,
    LeaseIsBreakingAndCannotBeChanged,
    LeaseIsBrokenAndCannotBeRenewed,
    LeaseLost,
    LeaseNotPresentWithBlobOperation,
    LeaseNotPresentWithContainerOperation,
    LeaseNotPresentWithLeaseOperation,
    SequenceNumberConditionNotMet,
    SourceConditionNotMet,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConditionNotMet => "ConditionNotMet",
            ErrorCode::InternalError => "InternalError",
            ErrorCode::InvalidHeaderValue => "InvalidHeaderValue",
            ErrorCode::InvalidQueryParameterValue => "InvalidQueryParameterValue",
            ErrorCode::InvalidRange => "InvalidRange",
            ErrorCode::MissingRequiredHeader => "MissingRequiredHeader",
            ErrorCode::MultipleConditionHeadersNotSupported => {
                "MultipleConditionHeadersNotSupported"
            }
            ErrorCode::NotModified => "NotModified",
            ErrorCode::OutOfRangeInput => "OutOfRangeInput",
            ErrorCode::UnsatisfiableCondition => "UnsatisfiableCondition",
            ErrorCode::BlobNotFound => "BlobNotFound",
            ErrorCode::ContainerAlreadyExists => "ContainerAlreadyExists",
            ErrorCode::ContainerNotFound => "ContainerNotFound",
            ErrorCode::InvalidBlobType => "InvalidBlobType",
            ErrorCode::InvalidLeaseBreakPeriod => "InvalidLeaseBreakPeriod",
            ErrorCode::InvalidLeaseDuration => "InvalidLeaseDuration",
            ErrorCode::InvalidPageRange => "InvalidPageRange",
            ErrorCode::InvalidTag => "InvalidTag",
            ErrorCode::LeaseAlreadyPresent => "LeaseAlreadyPresent",
            ErrorCode::LeaseIdMismatchWithBlobOperation => "LeaseIdMismatchWithBlobOperation",
            ErrorCode::LeaseIdMismatchWithContainerOperation => {
                "LeaseIdMismatchWithContainerOperation"
            }
            ErrorCode::LeaseIdMismatchWithLeaseOperation => "LeaseIdMismatchWithLeaseOperation",
            ErrorCode::LeaseIdMissing => "LeaseIdMissing",
            ErrorCode::LeaseIsBreakingAndCannotBeChanged => "LeaseIsBreakingAndCannotBeChanged",
            ErrorCode::LeaseIsBrokenAndCannotBeRenewed => "LeaseIsBrokenAndCannotBeRenewed",
            ErrorCode::LeaseLost => "LeaseLost",
            ErrorCode::LeaseNotPresentWithBlobOperation => "LeaseNotPresentWithBlobOperation",
            ErrorCode::LeaseNotPresentWithContainerOperation => {
                "LeaseNotPresentWithContainerOperation"
            }
            ErrorCode::LeaseNotPresentWithLeaseOperation => "LeaseNotPresentWithLeaseOperation",
            ErrorCode::SequenceNumberConditionNotMet => "SequenceNumberConditionNotMet",
            ErrorCode::SourceConditionNotMet => "SourceConditionNotMet",
        }
    }

    /// Returns the HTTP status code the protocol layer should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 304 Not Modified
            ErrorCode::NotModified => StatusCode::NOT_MODIFIED,

            // 400 Bad Request
            ErrorCode::InvalidHeaderValue
            | ErrorCode::InvalidQueryParameterValue
            | ErrorCode::MissingRequiredHeader
            | ErrorCode::MultipleConditionHeadersNotSupported
            | ErrorCode::OutOfRangeInput
            | ErrorCode::UnsatisfiableCondition
            | ErrorCode::InvalidBlobType
            | ErrorCode::InvalidLeaseBreakPeriod
            | ErrorCode::InvalidLeaseDuration
            | ErrorCode::InvalidPageRange
            | ErrorCode::InvalidTag => StatusCode::BAD_REQUEST,

            // 404 Not Found
            ErrorCode::BlobNotFound | ErrorCode::ContainerNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            ErrorCode::ContainerAlreadyExists
            | ErrorCode::LeaseAlreadyPresent
            | ErrorCode::LeaseIdMismatchWithLeaseOperation
            | ErrorCode::LeaseIsBreakingAndCannotBeChanged
            | ErrorCode::LeaseIsBrokenAndCannotBeRenewed
            | ErrorCode::LeaseNotPresentWithLeaseOperation => StatusCode::CONFLICT,

            // 412 Precondition Failed
            ErrorCode::ConditionNotMet
            | ErrorCode::SourceConditionNotMet
            | ErrorCode::LeaseIdMissing
            | ErrorCode::LeaseIdMismatchWithBlobOperation
            | ErrorCode::LeaseIdMismatchWithContainerOperation
            | ErrorCode::LeaseLost
            | ErrorCode::LeaseNotPresentWithBlobOperation
            | ErrorCode::LeaseNotPresentWithContainerOperation
            | ErrorCode::SequenceNumberConditionNotMet => StatusCode::PRECONDITION_FAILED,

            // 416 Range Not Satisfiable
            ErrorCode::InvalidRange => StatusCode::RANGE_NOT_SATISFIABLE,

            // 500 Internal Server Error
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::BlobNotFound => "The specified blob does not exist.",
            ErrorCode::ConditionNotMet => {
                "The condition specified using HTTP conditional header(s) is not met."
            }
            ErrorCode::ContainerAlreadyExists => "The specified container already exists.",
            ErrorCode::ContainerNotFound => "The specified container does not exist.",
            ErrorCode::InvalidHeaderValue => "The value for one of the HTTP headers is not valid.",
            ErrorCode::InvalidLeaseDuration => {
                "The value for x-ms-lease-duration must be -1 or between 15 and 60 seconds."
            }
            ErrorCode::InvalidLeaseBreakPeriod => {
                "The value for x-ms-lease-break-period must be between 0 and 60 seconds."
            }
            ErrorCode::InvalidPageRange => "The page range specified is invalid.",
            ErrorCode::InvalidRange => {
                "The range specified is invalid for the current size of the resource."
            }
            ErrorCode::LeaseAlreadyPresent => "There is already a lease present.",
            ErrorCode::LeaseIdMismatchWithBlobOperation => {
                "The lease ID specified did not match the lease ID for the blob."
            }
            ErrorCode::LeaseIdMismatchWithContainerOperation => {
                "The lease ID specified did not match the lease ID for the container."
            }
            ErrorCode::LeaseIdMismatchWithLeaseOperation => {
                "The lease ID specified did not match the lease ID for the blob/container."
            }
            ErrorCode::LeaseIdMissing => {
                "There is currently a lease on the resource and no lease ID was specified in the request."
            }
            ErrorCode::LeaseIsBreakingAndCannotBeChanged => {
                "The lease ID matched, but the lease is currently in breaking state and cannot be changed."
            }
            ErrorCode::LeaseIsBrokenAndCannotBeRenewed => {
                "The lease ID matched, but the lease has been broken explicitly and cannot be renewed."
            }
            ErrorCode::LeaseLost => {
                "A lease ID was specified, but the lease for the blob has expired."
            }
            ErrorCode::LeaseNotPresentWithBlobOperation => {
                "There is currently no lease on the blob."
            }
            ErrorCode::LeaseNotPresentWithContainerOperation => {
                "There is currently no lease on the container."
            }
            ErrorCode::LeaseNotPresentWithLeaseOperation => {
                "There is currently no lease on the blob/container."
            }
            ErrorCode::MissingRequiredHeader => "A required header was not specified.",
            ErrorCode::MultipleConditionHeadersNotSupported => {
                "Multiple condition headers are not supported."
            }
            ErrorCode::NotModified => {
                "The condition specified using HTTP conditional header(s) is not met."
            }
            ErrorCode::SequenceNumberConditionNotMet => {
                "The sequence number condition specified was not met."
            }
            ErrorCode::SourceConditionNotMet => {
                "The source condition specified using HTTP conditional header(s) is not met."
            }
            ErrorCode::UnsatisfiableCondition => {
                "The request includes an unsatisfiable condition for this operation."
            }
            ErrorCode::InternalError => {
                "The server encountered an internal error. Please retry the request."
            }
            _ => "An error occurred while processing the request.",
        }
    }
}

/// Storage error with code and message.
#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct StorageError {
    pub code: ErrorCode,
    pub message: String,
    pub request_id: Option<String>,
}

impl StorageError {
    /// Creates a new storage error with the given code and default message.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.default_message().to_string(),
            code,
            request_id: None,
        }
    }

    /// Creates a new storage error with a custom message.
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: None,
        }
    }

    /// Sets the request ID for this error.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Malformed header error naming the offending header.
    pub fn invalid_header(header: &str, reason: impl std::fmt::Display) -> Self {
        Self::with_message(
            ErrorCode::InvalidHeaderValue,
            format!("The value for header {} is invalid: {}", header, reason),
        )
    }

    /// Converts the error to an XML error response body.
    pub fn to_xml(&self) -> String {
        let mut message = xml_escape(&self.message);
        if let Some(ref request_id) = self.request_id {
            message.push_str(&format!("\nRequestId:{}", xml_escape(request_id)));
        }
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?><Error><Code>{}</Code><Message>{}</Message></Error>"#,
            self.code.as_str(),
            message
        )
    }
}

/// Escapes special XML characters in a string.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
