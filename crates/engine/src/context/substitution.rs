//! `{VAR_NAME}` token replacement
//!
//! Tokens are matched case-sensitively and replaced in a single pass, so
//! text produced by a replacement is never scanned again. That makes
//! substitution idempotent whenever variable values do not themselves
//! contain tokens naming live variables.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("token pattern is a valid regex")
});

/// What to do with a token that names no variable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownToken {
    /// Leave `{NAME}` in the output verbatim
    #[default]
    Keep,
    /// Replace with the empty string
    Empty,
}

/// Replace `{NAME}` tokens with values from `variables`
pub fn substitute(template: &str, variables: &Map<String, Value>, unknown: UnknownToken) -> String {
    TOKEN
        .replace_all(template, |caps: &Captures<'_>| match variables.get(&caps[1]) {
            Some(value) => render_value(value),
            None => match unknown {
                UnknownToken::Keep => caps[0].to_string(),
                UnknownToken::Empty => String::new(),
            },
        })
        .into_owned()
}

/// Substitute every string inside a JSON value, recursing into arrays and objects
pub fn substitute_value(value: &Value, variables: &Map<String, Value>, unknown: UnknownToken) -> Value {
    match value {
        Value::String(s) => Value::String(substitute(s, variables, unknown)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute_value(item, variables, unknown))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, variables, unknown)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> Map<String, Value> {
        let Value::Object(map) = json!({
            "CREATOR_NAME": "Jamie Rivera",
            "BRAND_NAME": "Glow Labs",
            "RATE": 450,
            "EMPTY": null,
        }) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn test_replaces_known_tokens() {
        let out = substitute(
            "Hi {CREATOR_NAME}, {BRAND_NAME} offers ${RATE}.",
            &vars(),
            UnknownToken::Keep,
        );
        assert_eq!(out, "Hi Jamie Rivera, Glow Labs offers $450.");
    }

    #[test]
    fn test_unknown_token_policy() {
        let template = "Hello {MISSING}!";
        assert_eq!(substitute(template, &vars(), UnknownToken::Keep), "Hello {MISSING}!");
        assert_eq!(substitute(template, &vars(), UnknownToken::Empty), "Hello !");
    }

    #[test]
    fn test_case_sensitive() {
        assert_eq!(
            substitute("{creator_name}", &vars(), UnknownToken::Keep),
            "{creator_name}"
        );
    }

    #[test]
    fn test_null_renders_empty() {
        assert_eq!(substitute("[{EMPTY}]", &vars(), UnknownToken::Keep), "[]");
    }

    #[test]
    fn test_idempotent() {
        let templates = [
            "Hi {CREATOR_NAME}",
            "{UNKNOWN} and {BRAND_NAME}",
            "no tokens at all",
            "{{CREATOR_NAME}}",
            "",
        ];
        for policy in [UnknownToken::Keep, UnknownToken::Empty] {
            for template in templates {
                let once = substitute(template, &vars(), policy);
                let twice = substitute(&once, &vars(), policy);
                assert_eq!(once, twice, "template {template:?}");
            }
        }
    }

    #[test]
    fn test_single_pass_does_not_rescan_values() {
        let mut variables = vars();
        variables.insert("NOTE".to_string(), json!("see {BRAND_NAME}"));

        assert_eq!(
            substitute("{NOTE}", &variables, UnknownToken::Keep),
            "see {BRAND_NAME}"
        );
    }

    #[test]
    fn test_substitute_value_recurses() {
        let input = json!({
            "subject": "Welcome {CREATOR_NAME}",
            "cc": ["{BRAND_NAME}", 3],
        });
        let out = substitute_value(&input, &vars(), UnknownToken::Keep);
        assert_eq!(out, json!({"subject": "Welcome Jamie Rivera", "cc": ["Glow Labs", 3]}));
    }
}
