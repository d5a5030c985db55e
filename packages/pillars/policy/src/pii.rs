//! Narrow, declarative PII pattern set. Structured-identifier detection
//! only (phone, SSN, email) — no statistical name detection, which is out
//! of scope.

use once_cell::sync::Lazy;
use regex::Regex;

pub struct PiiScan {
    pub redacted: String,
    pub matched_any: bool,
}

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]\d{3}[-.\s]\d{4}\b").unwrap());
static SSN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());

/// Scan `text`, replacing any structured PII match with a fixed sentinel.
/// Order matters: SSN before phone, since a bare 9-digit run with dashes
/// could otherwise be mis-tagged by a looser phone pattern.
pub fn scan_and_redact(text: &str) -> PiiScan {
    let mut matched_any = false;

    let after_ssn = SSN_RE.replace_all(text, |_: &regex::Captures| {
        matched_any = true;
        "[REDACTED_SSN]"
    });
    let after_phone = PHONE_RE.replace_all(&after_ssn, |_: &regex::Captures| {
        matched_any = true;
        "[REDACTED_PHONE]"
    });
    let after_email = EMAIL_RE.replace_all(&after_phone, |_: &regex::Captures| {
        matched_any = true;
        "[REDACTED_EMAIL]"
    });

    PiiScan {
        redacted: after_email.into_owned(),
        matched_any,
    }
}
