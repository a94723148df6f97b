//! Mapping of object store failures onto the upload error taxonomy.

use std::error::Error as StdError;

use lazy_static::lazy_static;
use regex::Regex;
use rusoto_core::RusotoError;
use rusoto_s3::AbortMultipartUploadError;

use crate::error::UploadError;

lazy_static! {
    static ref ERROR_CODE: Regex = Regex::new(r"<Code>([^<]+)</Code>").unwrap();
}

/// Codes that mean the request should be slowed down and retried.
const THROTTLING_CODES: &[&str] = &[
    "SlowDown",
    "Throttling",
    "ThrottlingException",
    "TooManyRequests",
    "RequestLimitExceeded",
];

/// Codes that mean the signature or the credentials were rejected.
const AUTH_CODES: &[&str] = &[
    "RequestTimeTooSkewed",
    "SignatureDoesNotMatch",
    "InvalidAccessKeyId",
    "AccessDenied",
    "ExpiredToken",
    "InvalidToken",
];

/// Codes that mean the multipart manifest does not match the stored parts.
const INCOMPLETE_CODES: &[&str] = &["InvalidPart", "InvalidPartOrder", "NoSuchUpload", "EntityTooSmall"];

/// Extract the S3 error code from an XML error body.
pub fn error_code(body: &str) -> Option<&str> {
    ERROR_CODE
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|code| code.as_str().trim())
}

/// Classify an HTTP error response by status and body.
pub fn classify_response(status: u16, body: &str) -> UploadError {
    let code = error_code(body);
    let message = match code {
        Some(code) => format!("HTTP {} {}", status, code),
        None => format!("HTTP {}", status),
    };

    if let Some(code) = code {
        if THROTTLING_CODES.contains(&code) {
            return UploadError::Transient(message);
        }
        if code == "RequestTimeTooSkewed" {
            return UploadError::Auth(format!("{} (check the system clock)", message));
        }
        if AUTH_CODES.contains(&code) {
            return UploadError::Auth(message);
        }
        if INCOMPLETE_CODES.contains(&code) {
            return UploadError::IncompleteUpload(message);
        }
    }

    match status {
        401 | 403 => UploadError::Auth(message),
        408 | 429 => UploadError::Transient(message),
        500..=599 => UploadError::Transient(message),
        _ => UploadError::Permanent(message),
    }
}

/// Classify a rusoto failure.
pub fn classify_rusoto<E: StdError + 'static>(err: RusotoError<E>) -> UploadError {
    match err {
        RusotoError::HttpDispatch(e) => UploadError::Transient(format!("dispatch failed: {}", e)),
        RusotoError::Credentials(e) => UploadError::Auth(format!("credentials unavailable: {}", e)),
        RusotoError::Validation(msg) => UploadError::Permanent(format!("invalid request: {}", msg)),
        RusotoError::ParseError(msg) => UploadError::Transient(format!("unreadable response: {}", msg)),
        RusotoError::Unknown(response) => {
            classify_response(response.status.as_u16(), &response.body_as_str())
        }
        RusotoError::Service(e) => UploadError::Permanent(e.to_string()),
        RusotoError::Blocking => UploadError::Transient("blocking call failed".to_string()),
    }
}

/// True when a failed request means the upload id is already gone.
///
/// A bare 404 counts; a 404 naming another code (`NoSuchBucket`) does not.
pub fn is_missing_upload(status: u16, body: &str) -> bool {
    match error_code(body) {
        Some(code) => code == "NoSuchUpload",
        None => status == 404,
    }
}

/// Resolve an abort failure: an upload that no longer exists is success.
pub fn abort_result(err: RusotoError<AbortMultipartUploadError>) -> Result<(), UploadError> {
    match err {
        RusotoError::Service(AbortMultipartUploadError::NoSuchUpload(_)) => Ok(()),
        RusotoError::Unknown(ref response)
            if is_missing_upload(response.status.as_u16(), &response.body_as_str()) =>
        {
            Ok(())
        }
        other => Err(classify_rusoto(other)),
    }
}
