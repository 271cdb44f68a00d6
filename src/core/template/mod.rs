//! Template substitution for task subjects and descriptions.
//!
//! Rendering is deliberately lenient: an unknown placeholder becomes the
//! empty string so a malformed template can never block task creation.

use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use cadence_types::Account;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern is valid"));

/// Replace every `{{variable}}` in `template` from `vars`.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            vars.get(caps[1].trim()).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Build the substitution context for one account.
pub fn account_context(account: &Account, days_remaining: i64) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("contact_name".to_string(), account.contact_name());
    vars.insert(
        "contact_first_name".to_string(),
        account.contact_first_name.clone().unwrap_or_default(),
    );
    vars.insert(
        "contact_last_name".to_string(),
        account.contact_last_name.clone().unwrap_or_default(),
    );
    vars.insert(
        "contact_email".to_string(),
        account.contact_email.clone().unwrap_or_default(),
    );
    vars.insert(
        "contact_phone".to_string(),
        account.contact_phone.clone().unwrap_or_default(),
    );
    vars.insert("account_name".to_string(), account.account_name.clone());
    vars.insert(
        "renewal_date".to_string(),
        account.renewal_date.map(format_date).unwrap_or_default(),
    );
    vars.insert("days_remaining".to_string(), days_remaining.to_string());
    vars
}

/// Human-facing date used inside rendered text, e.g. "Mar 5, 2026".
pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}
