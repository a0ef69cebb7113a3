//! Secret redaction for stored message history.

use regex::Regex;
use std::sync::LazyLock;

static API_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sk-[A-Za-z0-9_-]{8,}").expect("api key regex"));
static PASSWORD_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)("?password"?\s*[:=]\s*"?)([^"\s,}]+)"#).expect("password regex")
});
static EMAIL_LOCAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@([A-Za-z0-9.-]+\.[A-Za-z]{2,})").expect("email regex")
});
static IPV4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("ipv4 regex"));
static URL_CREDENTIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([?&](?:api_key|token|password)=)[^&\s]+").expect("url credential regex")
});

/// Mask API keys, password pairs, email local parts, IPv4 addresses,
/// and URL credential parameters in the given text.
pub fn redact_secrets(text: &str) -> String {
    let text = API_KEY.replace_all(text, "sk-***");
    let text = PASSWORD_PAIR.replace_all(&text, "${1}***");
    let text = EMAIL_LOCAL.replace_all(&text, "***@${1}");
    let text = IPV4.replace_all(&text, "***.***.***.***");
    URL_CREDENTIAL.replace_all(&text, "${1}***").into_owned()
}
