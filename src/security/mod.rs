//! Security utilities.
//!
//! Credential scrubbing keeps access keys, secrets and request signatures
//! out of logs and operator messages.

pub mod credential_scrubber;

pub use credential_scrubber::{safe_error_message, scrub_credentials, CredentialScrubber};
