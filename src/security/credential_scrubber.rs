//! Credential scrubbing for log lines and operator messages.
//!
//! Store responses and transport errors can echo request details back:
//! signed query strings, authorization headers, endpoint URLs with user
//! info. Everything that reaches a log or the terminal goes through
//! [`scrub_credentials`] first, and through [`CredentialScrubber`] when the
//! exact secrets of the run are known.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::Credentials;

lazy_static! {
    /// Regex patterns for detecting credentials in free text
    static ref CREDENTIAL_PATTERNS: Vec<(Regex, &'static str)> = vec![
        // SigV4 authorization header
        (Regex::new(r"AWS4-HMAC-SHA256\s+Credential=[^\s,]+,\s*SignedHeaders=[^\s,]+,\s*Signature=[0-9a-fA-F]+").unwrap(),
         "AWS4-HMAC-SHA256 <REDACTED_SIGNATURE>"),

        // Presigned query parameters
        (Regex::new(r"(?i)(X-Amz-Credential|X-Amz-Signature|X-Amz-Security-Token)=([^&\s]+)").unwrap(),
         "$1=<REDACTED>"),

        // Access key id
        (Regex::new(r"(?i)(aws[_-]?access[_-]?key[_-]?id|access[_-]?key[_-]?id|access[_-]?key)\s*[:=]\s*([A-Za-z0-9]{16,64})").unwrap(),
         "$1=<REDACTED_ACCESS_KEY>"),

        // Secret access key
        (Regex::new(r"(?i)(aws[_-]?secret[_-]?access[_-]?key|secret[_-]?access[_-]?key|secret[_-]?key)\s*[:=]\s*([A-Za-z0-9/+=]{16,})").unwrap(),
         "$1=<REDACTED_SECRET>"),

        // Bearer tokens
        (Regex::new(r"(?i)(bearer|authorization)\s*[:=]\s*(bearer\s+)?([A-Za-z0-9\-._~+/]+=*)").unwrap(),
         "$1=<REDACTED_TOKEN>"),

        // Basic auth in URLs
        (Regex::new(r"(https?://)([^:/@\s]+):([^@\s]+)@").unwrap(),
         "$1<REDACTED_USER>:<REDACTED_PASS>@"),
    ];
}

/// Scrub credential-looking values from a string.
///
/// # Example
///
/// ```
/// use site_backup::security::credential_scrubber::scrub_credentials;
///
/// let input = "request failed: secret_key=wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY";
/// assert_eq!(scrub_credentials(input), "request failed: secret_key=<REDACTED_SECRET>");
/// ```
pub fn scrub_credentials(input: &str) -> String {
    let mut result = input.to_string();

    for (pattern, replacement) in CREDENTIAL_PATTERNS.iter() {
        result = pattern.replace_all(&result, *replacement).to_string();
    }

    result
}

/// Format `context: error` with credentials scrubbed.
pub fn safe_error_message(context: &str, error: &impl std::fmt::Display) -> String {
    let raw_message = format!("{}: {}", context, error);
    scrub_credentials(&raw_message)
}

/// Scrubber that also knows the literal secrets of one run.
#[derive(Default)]
pub struct CredentialScrubber {
    secrets: Vec<String>,
}

impl CredentialScrubber {
    /// Remember the access and secret keys; short values are ignored so a
    /// one-character key cannot blank out unrelated text.
    pub fn new(credentials: &Credentials) -> Self {
        let mut secrets: Vec<String> = [&credentials.secret_key, &credentials.access_key]
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| s.len() >= 4)
            .collect();
        // Longest first so a key that contains another is replaced whole
        secrets.sort_by(|a, b| b.len().cmp(&a.len()));
        secrets.dedup();
        Self { secrets }
    }

    pub fn scrub(&self, input: &str) -> String {
        let mut result = input.to_string();
        for secret in &self.secrets {
            result = result.replace(secret.as_str(), "<REDACTED>");
        }
        scrub_credentials(&result)
    }
}
