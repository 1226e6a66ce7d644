//! Per-recipient token substitution for subject and body templates.
//!
//! Pure find/replace over `{{name}}` and `{{email}}` (case-insensitive).
//! Unknown tokens are left verbatim so missing-data bugs stay visible
//! instead of silently rendering as blanks.

use regex::{NoExpand, Regex};
use std::sync::LazyLock;

static NAME_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\{\{name\}\}").unwrap());
static EMAIL_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\{\{email\}\}").unwrap());

/// Substitute recipient tokens into a template string.
///
/// `{{name}}` falls back to the email's local part when the recipient has no
/// name (or a blank one).
pub fn render(template: &str, email: &str, name: Option<&str>) -> String {
    let local_part = email.split('@').next().unwrap_or(email);
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(local_part);

    let result = NAME_TOKEN.replace_all(template, NoExpand(name));
    EMAIL_TOKEN
        .replace_all(&result, NoExpand(email))
        .into_owned()
}
