//! `{{key}}` placeholder substitution against a trigger payload.
//!
//! A placeholder is `{{` followed by one or more word characters
//! (`[A-Za-z0-9_]`) and `}}`. Keys are looked up at the top level of the
//! payload object. Missing, null and empty-string values leave the placeholder
//! untouched so the gap stays visible in the rendered text.

use serde_json::Value;

/// Replace every `{{key}}` in `template` with the payload's value for `key`.
pub fn replace_variables(template: &str, variables: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        let key_len = after_open
            .find(|c: char| !is_word_char(c))
            .unwrap_or(after_open.len());
        let key = &after_open[..key_len];

        if key_len > 0 && after_open[key_len..].starts_with("}}") {
            match lookup(variables, key) {
                Some(text) => out.push_str(&text),
                None => {
                    out.push_str("{{");
                    out.push_str(key);
                    out.push_str("}}");
                }
            }
            rest = &after_open[key_len + 2..];
        } else {
            // Not a placeholder; emit one brace and rescan from the next one.
            out.push('{');
            rest = &rest[start + 1..];
        }
    }

    out.push_str(rest);
    out
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn lookup(variables: &Value, key: &str) -> Option<String> {
    match variables.get(key)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        other => Some(value_to_text(other)),
    }
}

/// Plain-text form of a JSON value: strings unquoted, everything else as JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// First non-empty string among the given payload fields.
pub fn first_text_field(payload: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match payload.get(*field)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        other => Some(value_to_text(other)),
    })
}
