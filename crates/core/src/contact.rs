//! Contact form submissions.
//!
//! The browser form posts the fixed contact fields plus whatever discovery
//! questions the page asked; unknown fields are carried through untouched.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ValidationError;

const MIN_NAME_LEN: usize = 2;
const MIN_MESSAGE_LEN: usize = 10;
const MAX_FIELD_LEN: usize = 5000;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]{2,}$").expect("email pattern is valid")
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default)]
    pub message: String,
    /// Honeypot. Hidden from humans, so any content means a bot filled it in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trap: Option<Value>,
    /// Discovery-question answers and any other extra fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ContactSubmission {
    /// Parses a raw JSON payload without validating it.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        if !value.is_object() {
            return Err(ValidationError::InvalidInput(
                "expected a JSON object".to_string(),
            ));
        }
        serde_json::from_value(value.clone())
            .map_err(|e| ValidationError::InvalidInput(e.to_string()))
    }

    pub fn is_spam(&self) -> bool {
        self.trap.as_ref().is_some_and(trap_is_filled)
    }

    /// Checks the required fields. Call [`is_spam`](Self::is_spam) first: a
    /// bot submission is answered with success regardless of its content.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.full_name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("fullName".to_string()));
        }
        if name.chars().count() < MIN_NAME_LEN {
            return Err(ValidationError::invalid(
                "fullName",
                format!("must be at least {} characters", MIN_NAME_LEN),
            ));
        }

        let email = self.email.trim();
        if email.is_empty() {
            return Err(ValidationError::MissingField("email".to_string()));
        }
        if !email_regex().is_match(email) {
            return Err(ValidationError::invalid("email", "is not a valid address"));
        }

        let message = self.message.trim();
        if message.is_empty() {
            return Err(ValidationError::MissingField("message".to_string()));
        }
        if message.chars().count() < MIN_MESSAGE_LEN {
            return Err(ValidationError::invalid(
                "message",
                format!("must be at least {} characters", MIN_MESSAGE_LEN),
            ));
        }
        if message.len() > MAX_FIELD_LEN {
            return Err(ValidationError::invalid("message", "is too long"));
        }
        Ok(())
    }

    pub fn email_subject(&self) -> String {
        match self.company.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(company) => format!("New contact request: {} ({})", self.full_name.trim(), company),
            None => format!("New contact request: {}", self.full_name.trim()),
        }
    }

    /// HTML body for the notification e-mail.
    pub fn email_html(&self) -> String {
        let mut rows = vec![
            ("Name".to_string(), self.full_name.trim().to_string()),
            ("Email".to_string(), self.email.trim().to_string()),
        ];
        for (label, value) in [
            ("Phone", &self.phone),
            ("Company", &self.company),
            ("Website", &self.website),
        ] {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                rows.push((label.to_string(), v.to_string()));
            }
        }
        for (key, value) in &self.extra {
            if let Some(text) = render_extra(value) {
                rows.push((humanize(key), text));
            }
        }

        let mut html = String::from("<h2>New contact request</h2><table>");
        for (label, value) in rows {
            html.push_str(&format!(
                "<tr><td><strong>{}</strong></td><td>{}</td></tr>",
                escape_html(&label),
                escape_html(&value)
            ));
        }
        html.push_str("</table><h3>Message</h3><p>");
        html.push_str(&escape_html(self.message.trim()).replace('\n', "<br>"));
        html.push_str("</p>");
        html
    }
}

/// Honeypot check on a raw payload, usable before the payload is parsed so
/// a bot sending oddly typed fields still gets the silent success.
pub fn honeypot_filled(payload: &Value) -> bool {
    payload.get("trap").is_some_and(trap_is_filled)
}

/// Any value other than null, an empty or blank string, `false` or an empty
/// collection counts as filled in.
fn trap_is_filled(trap: &Value) -> bool {
    match trap {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(true) | Value::Number(_) => true,
    }
}

fn render_extra(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Array(items) if items.is_empty() => None,
        Value::Array(items) => Some(
            items
                .iter()
                .map(|i| match i {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

/// `budgetRange` -> `Budget range`
fn humanize(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch == '_' || ch == '-' {
            out.push(' ');
        } else if ch.is_uppercase() && i > 0 {
            out.push(' ');
            out.extend(ch.to_lowercase());
        } else if i == 0 {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "fullName": "Ada Lovelace",
            "email": "ada@example.com",
            "company": "Analytical Engines",
            "message": "We would like to automate our lead intake.",
            "trap": "",
            "budgetRange": "5k-10k",
            "tools": ["HubSpot", "Slack"]
        })
    }

    #[test]
    fn test_valid_submission_passes() {
        let submission = ContactSubmission::from_value(&valid()).unwrap();
        assert!(!submission.is_spam());
        assert!(submission.validate().is_ok());
        assert_eq!(submission.extra.len(), 2);
    }

    #[test]
    fn test_missing_and_invalid_fields() {
        let mut payload = valid();
        payload["email"] = json!("not-an-email");
        let submission = ContactSubmission::from_value(&payload).unwrap();
        assert_eq!(
            submission.validate(),
            Err(ValidationError::invalid("email", "is not a valid address"))
        );

        let submission = ContactSubmission::from_value(&json!({"email": "a@b.io"})).unwrap();
        assert_eq!(
            submission.validate(),
            Err(ValidationError::MissingField("fullName".to_string()))
        );

        let mut payload = valid();
        payload["message"] = json!("short");
        let submission = ContactSubmission::from_value(&payload).unwrap();
        assert!(submission.validate().is_err());
    }

    #[test]
    fn test_honeypot_marks_spam() {
        let mut payload = valid();
        payload["trap"] = json!("http://spam.example");
        let submission = ContactSubmission::from_value(&payload).unwrap();
        assert!(submission.is_spam());
    }

    #[test]
    fn test_non_string_honeypot_marks_spam() {
        for trap in [json!(1), json!(true), json!(["x"]), json!({"url": "x"})] {
            let mut payload = valid();
            payload["trap"] = trap.clone();
            assert!(honeypot_filled(&payload), "{} should count as filled", trap);
            let submission = ContactSubmission::from_value(&payload).unwrap();
            assert!(submission.is_spam());
        }

        for trap in [json!(null), json!("  "), json!(false), json!([])] {
            let mut payload = valid();
            payload["trap"] = trap;
            assert!(!honeypot_filled(&payload));
        }
        assert!(!honeypot_filled(&json!({"fullName": "Ada"})));
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        assert!(ContactSubmission::from_value(&json!("hello")).is_err());
    }

    #[test]
    fn test_email_rendering_escapes_and_includes_discovery_answers() {
        let mut payload = valid();
        payload["message"] = json!("Hello <script>alert(1)</script>\nThanks");
        let submission = ContactSubmission::from_value(&payload).unwrap();

        assert_eq!(
            submission.email_subject(),
            "New contact request: Ada Lovelace (Analytical Engines)"
        );
        let html = submission.email_html();
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("<br>Thanks"));
        assert!(html.contains("Budget range"));
        assert!(html.contains("HubSpot, Slack"));
    }
}
