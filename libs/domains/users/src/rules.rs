//! Data-driven request validation.
//!
//! A [`RuleSet`] is an ordered table of `(attribute, rules)` entries evaluated
//! against the raw request field map. Attributes may end in `.*` to address
//! every element of an array field (`roles.*` becomes `roles.0`, `roles.1`,
//! ...). Rules other than [`Rule::Required`] are skipped for blank values, and
//! evaluation of an attribute stops at its first failing rule.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use validator::ValidateEmail;

use crate::envelope::FieldErrors;
use crate::error::{UserError, UserResult};

/// Raw request body
pub type FieldMap = Map<String, Value>;

static ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Present and not blank
    Required,
    String,
    Array,
    /// Characters for strings, value for numbers, length for arrays
    Max(usize),
    Email,
    /// URL whose host resolves
    ActiveUrl,
    /// Equal to another attribute
    Same(&'static str),
    Alphanumeric,
    /// No live user owns this email, other than `ignore`
    UniqueEmail { ignore: Option<i64> },
    /// Names an existing role
    RoleExists,
}

/// Lookups a rule needs from outside the request
#[async_trait]
pub trait RuleContext: Send + Sync {
    async fn email_taken(&self, email: &str, ignore: Option<i64>) -> UserResult<bool>;

    async fn role_exists(&self, name: &str) -> UserResult<bool>;

    async fn host_resolves(&self, host: &str) -> bool;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    entries: Vec<(String, Vec<Rule>)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, attribute: &str, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.entries
            .push((attribute.to_string(), rules.into_iter().collect()));
        self
    }

    /// Attribute patterns in evaluation order
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(attribute, _)| attribute.as_str())
    }
}

/// Rules for `POST /users`
pub fn create_rules() -> RuleSet {
    RuleSet::new()
        .field("name", [Rule::Required, Rule::String, Rule::Max(255)])
        .field("thumbnail", [Rule::Max(255), Rule::ActiveUrl])
        .field(
            "email",
            [
                Rule::Required,
                Rule::Email,
                Rule::String,
                Rule::Max(255),
                Rule::UniqueEmail { ignore: None },
            ],
        )
        .field("pass", [Rule::Required, Rule::String])
        .field(
            "pass_verify",
            [Rule::Required, Rule::String, Rule::Same("pass")],
        )
}

/// Rules for `PATCH|PUT /users/{uid}`; password and role rules apply only
/// when the request carries those fields.
pub fn update_rules(data: &FieldMap, user_id: i64) -> RuleSet {
    let mut rules = RuleSet::new()
        .field("name", [Rule::String, Rule::Max(255)])
        .field("thumbnail", [Rule::Max(255), Rule::ActiveUrl])
        .field(
            "email",
            [
                Rule::Email,
                Rule::String,
                Rule::Max(255),
                Rule::UniqueEmail {
                    ignore: Some(user_id),
                },
            ],
        );

    if is_set(data, "pass") || is_set(data, "pass_verify") {
        rules = rules
            .field("pass", [Rule::Required, Rule::String])
            .field(
                "pass_verify",
                [Rule::Required, Rule::String, Rule::Same("pass")],
            );
    }
    if is_set(data, "roles") {
        rules = rules
            .field("roles", [Rule::Array])
            .field("roles.*", [Rule::Alphanumeric, Rule::RoleExists]);
    }
    rules
}

/// Evaluate `rules` against `data`, returning the failing attributes.
///
/// Lookup failures in the context abort validation.
pub async fn validate(
    data: &FieldMap,
    rules: &RuleSet,
    ctx: &dyn RuleContext,
) -> UserResult<FieldErrors> {
    let mut errors = FieldErrors::new();

    for (pattern, attribute_rules) in &rules.entries {
        for attribute in expand(data, pattern) {
            let value = lookup(data, &attribute);
            for rule in attribute_rules {
                if !applies(rule, value) {
                    continue;
                }
                if !passes(rule, data, value, ctx).await? {
                    errors.insert(attribute.clone(), message(rule, &attribute, value));
                    break;
                }
            }
        }
    }

    Ok(errors)
}

/// Present and not null
pub fn is_set(data: &FieldMap, key: &str) -> bool {
    data.get(key).is_some_and(|v| !v.is_null())
}

/// Scalar field as text; `None` when blank or not a string/number
pub fn field_text(data: &FieldMap, key: &str) -> Option<String> {
    let value = data.get(key);
    if is_blank(value) {
        return None;
    }
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Scalar field as text, or a `required` validation error when it has none
pub fn required_text(data: &FieldMap, key: &str) -> UserResult<String> {
    field_text(data, key).ok_or_else(|| {
        let mut errors = FieldErrors::new();
        errors.insert(key.to_string(), message(&Rule::Required, key, None));
        UserError::Validation(errors)
    })
}

/// String entries of an array field
pub fn field_list(data: &FieldMap, key: &str) -> Option<Vec<String>> {
    match data.get(key)? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

fn expand(data: &FieldMap, pattern: &str) -> Vec<String> {
    match pattern.strip_suffix(".*") {
        Some(parent) => match lookup(data, parent) {
            Some(Value::Array(items)) => (0..items.len())
                .map(|i| format!("{parent}.{i}"))
                .collect(),
            _ => Vec::new(),
        },
        None => vec![pattern.to_string()],
    }
}

fn lookup<'a>(data: &'a FieldMap, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

fn applies(rule: &Rule, value: Option<&Value>) -> bool {
    matches!(rule, Rule::Required) || !is_blank(value)
}

async fn passes(
    rule: &Rule,
    data: &FieldMap,
    value: Option<&Value>,
    ctx: &dyn RuleContext,
) -> UserResult<bool> {
    let Some(value) = value else {
        return Ok(!matches!(rule, Rule::Required));
    };

    let ok = match rule {
        Rule::Required => !is_blank(Some(value)),
        Rule::String => value.is_string(),
        Rule::Array => value.is_array(),
        Rule::Max(max) => match value {
            Value::String(s) => s.chars().count() <= *max,
            Value::Number(n) => n.as_f64().is_some_and(|n| n <= *max as f64),
            Value::Array(items) => items.len() <= *max,
            _ => true,
        },
        Rule::Email => value.as_str().is_some_and(|s| s.validate_email()),
        Rule::ActiveUrl => match value.as_str().and_then(url_host) {
            Some(host) => ctx.host_resolves(&host).await,
            None => false,
        },
        Rule::Same(other) => lookup(data, other) == Some(value),
        Rule::Alphanumeric => match value {
            Value::String(s) => ALPHANUMERIC.is_match(s),
            Value::Number(n) => ALPHANUMERIC.is_match(&n.to_string()),
            _ => false,
        },
        Rule::UniqueEmail { ignore } => match value.as_str() {
            Some(email) => !ctx.email_taken(email, *ignore).await?,
            None => true,
        },
        Rule::RoleExists => match value.as_str() {
            Some(name) => ctx.role_exists(name).await?,
            None => false,
        },
    };

    Ok(ok)
}

fn url_host(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw.trim()).ok()?;
    let host = parsed.host_str()?.trim_start_matches('[').trim_end_matches(']');
    (!host.is_empty()).then(|| host.to_string())
}

fn display_name(attribute: &str) -> String {
    attribute.replace('_', " ")
}

fn message(rule: &Rule, attribute: &str, value: Option<&Value>) -> String {
    let name = display_name(attribute);
    match rule {
        Rule::Required => format!("The {name} field is required."),
        Rule::String => format!("The {name} must be a string."),
        Rule::Array => format!("The {name} must be an array."),
        Rule::Max(max) => match value {
            Some(Value::Number(_)) => format!("The {name} may not be greater than {max}."),
            Some(Value::Array(_)) => format!("The {name} may not have more than {max} items."),
            _ => format!("The {name} may not be greater than {max} characters."),
        },
        Rule::Email => format!("The {name} must be a valid email address."),
        Rule::ActiveUrl => format!("The {name} is not a valid URL."),
        Rule::Same(other) => format!("The {name} and {} must match.", display_name(other)),
        Rule::Alphanumeric => format!("The {name} format is invalid."),
        Rule::UniqueEmail { .. } => format!("The {name} has already been taken."),
        Rule::RoleExists => format!("The selected {name} is invalid."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StubContext {
        taken: Vec<(&'static str, i64)>,
        roles: Vec<&'static str>,
        hosts: Vec<&'static str>,
    }

    impl Default for StubContext {
        fn default() -> Self {
            Self {
                taken: vec![("taken@example.com", 7)],
                roles: vec!["admin", "member"],
                hosts: vec!["cdn.example.com"],
            }
        }
    }

    #[async_trait]
    impl RuleContext for StubContext {
        async fn email_taken(&self, email: &str, ignore: Option<i64>) -> UserResult<bool> {
            Ok(self
                .taken
                .iter()
                .any(|(e, id)| e.eq_ignore_ascii_case(email) && Some(*id) != ignore))
        }

        async fn role_exists(&self, name: &str) -> UserResult<bool> {
            Ok(self.roles.contains(&name))
        }

        async fn host_resolves(&self, host: &str) -> bool {
            self.hosts.contains(&host)
        }
    }

    struct FailingContext;

    #[async_trait]
    impl RuleContext for FailingContext {
        async fn email_taken(&self, _: &str, _: Option<i64>) -> UserResult<bool> {
            Err(UserError::Store("connection refused".into()))
        }

        async fn role_exists(&self, _: &str) -> UserResult<bool> {
            Err(UserError::Store("connection refused".into()))
        }

        async fn host_resolves(&self, _: &str) -> bool {
            false
        }
    }

    fn map(value: Value) -> FieldMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("test data must be an object"),
        }
    }

    async fn run(data: Value, rules: &RuleSet) -> FieldErrors {
        validate(&map(data), rules, &StubContext::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_requires_core_fields() {
        let errors = run(json!({}), &create_rules()).await;

        assert_eq!(errors["name"], "The name field is required.");
        assert_eq!(errors["email"], "The email field is required.");
        assert_eq!(errors["pass"], "The pass field is required.");
        assert_eq!(errors["pass_verify"], "The pass verify field is required.");
        assert!(!errors.contains_key("thumbnail"));
    }

    #[tokio::test]
    async fn test_passwords_must_be_strings() {
        let errors = run(
            json!({"name": "A", "email": "a@b.com", "pass": ["x"], "pass_verify": {"x": 1}}),
            &create_rules(),
        )
        .await;
        assert_eq!(errors["pass"], "The pass must be a string.");
        assert_eq!(errors["pass_verify"], "The pass verify must be a string.");

        let data = json!({"pass": 1234, "pass_verify": 1234});
        let errors = run(data.clone(), &update_rules(&map(data), 1)).await;
        assert_eq!(errors["pass"], "The pass must be a string.");
        assert_eq!(errors["pass_verify"], "The pass verify must be a string.");
    }

    #[tokio::test]
    async fn test_create_valid_payload_passes() {
        let errors = run(
            json!({
                "name": "A",
                "email": "a@b.com",
                "pass": "x",
                "pass_verify": "x",
                "thumbnail": "https://cdn.example.com/a.png"
            }),
            &create_rules(),
        )
        .await;

        assert!(errors.is_empty(), "{errors:?}");
    }

    #[tokio::test]
    async fn test_first_failing_rule_wins() {
        let errors = run(
            json!({"name": 42, "email": "not-an-email", "pass": "x", "pass_verify": "y"}),
            &create_rules(),
        )
        .await;

        assert_eq!(errors["name"], "The name must be a string.");
        assert_eq!(errors["email"], "The email must be a valid email address.");
        assert_eq!(errors["pass_verify"], "The pass verify and pass must match.");
    }

    #[tokio::test]
    async fn test_max_counts_characters() {
        let rules = RuleSet::new().field("name", [Rule::Max(3)]);

        assert!(run(json!({"name": "ééé"}), &rules).await.is_empty());
        assert_eq!(
            run(json!({"name": "abcd"}), &rules).await["name"],
            "The name may not be greater than 3 characters."
        );
        assert_eq!(
            run(json!({"name": [1, 2, 3, 4]}), &rules).await["name"],
            "The name may not have more than 3 items."
        );
    }

    #[tokio::test]
    async fn test_blank_values_skip_non_required_rules() {
        let rules = RuleSet::new()
            .field("thumbnail", [Rule::Max(1), Rule::ActiveUrl])
            .field("name", [Rule::String]);

        for blank in [json!(null), json!(""), json!("   "), json!([])] {
            let errors = run(json!({"thumbnail": blank, "name": blank}), &rules).await;
            assert!(errors.is_empty(), "{blank:?} -> {errors:?}");
        }
    }

    #[tokio::test]
    async fn test_active_url_needs_resolving_host() {
        let rules = RuleSet::new().field("thumbnail", [Rule::ActiveUrl]);

        assert!(
            run(json!({"thumbnail": "http://cdn.example.com/x.png"}), &rules)
                .await
                .is_empty()
        );
        for bad in ["http://nowhere.invalid/x.png", "not a url", "mailto:a@b.com"] {
            assert_eq!(
                run(json!({"thumbnail": bad}), &rules).await["thumbnail"],
                "The thumbnail is not a valid URL.",
                "{bad}"
            );
        }
    }

    #[tokio::test]
    async fn test_unique_email_ignores_current_record() {
        let data = json!({"email": "TAKEN@example.com"});

        let errors = run(data.clone(), &update_rules(&map(data.clone()), 3)).await;
        assert_eq!(errors["email"], "The email has already been taken.");

        let errors = run(data.clone(), &update_rules(&map(data), 7)).await;
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_update_without_password_fields_skips_password_rules() {
        let data = json!({"name": "New name"});
        let rules = update_rules(&map(data.clone()), 1);

        assert!(!rules.attributes().any(|a| a.starts_with("pass")));
        assert!(run(data, &rules).await.is_empty());
    }

    #[tokio::test]
    async fn test_update_with_either_password_field_requires_both() {
        let data = json!({"pass_verify": "secret"});
        let errors = run(data.clone(), &update_rules(&map(data), 1)).await;

        assert_eq!(errors["pass"], "The pass field is required.");
        assert_eq!(errors["pass_verify"], "The pass verify and pass must match.");
    }

    #[tokio::test]
    async fn test_role_wildcard_expands_per_element() {
        let data = json!({"roles": ["admin", "ghost", "no-dash"]});
        let errors = run(data.clone(), &update_rules(&map(data), 1)).await;

        assert!(!errors.contains_key("roles.0"));
        assert_eq!(errors["roles.1"], "The selected roles.1 is invalid.");
        assert_eq!(errors["roles.2"], "The roles.2 format is invalid.");
    }

    #[tokio::test]
    async fn test_roles_must_be_an_array() {
        let data = json!({"roles": "admin"});
        let errors = run(data.clone(), &update_rules(&map(data), 1)).await;

        assert_eq!(errors["roles"], "The roles must be an array.");
        assert_eq!(errors.len(), 1);
    }

    #[tokio::test]
    async fn test_context_failure_aborts_validation() {
        let data = map(json!({"email": "a@b.com"}));
        let result = validate(&data, &update_rules(&data, 1), &FailingContext).await;

        assert!(matches!(result, Err(UserError::Store(_))));
    }

    #[test]
    fn test_field_text_and_list() {
        let data = map(json!({"pass": 1234, "name": "  ", "roles": ["admin", 7, null]}));

        assert_eq!(field_text(&data, "pass").as_deref(), Some("1234"));
        assert_eq!(field_text(&data, "name"), None);
        assert_eq!(field_text(&data, "missing"), None);
        assert_eq!(required_text(&data, "pass").unwrap(), "1234");
        match required_text(&data, "name") {
            Err(UserError::Validation(errors)) => {
                assert_eq!(errors["name"], "The name field is required.")
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
        assert_eq!(
            field_list(&data, "roles"),
            Some(vec!["admin".to_string(), "7".to_string()])
        );
    }
}
