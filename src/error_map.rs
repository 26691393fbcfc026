//! Classification of failed responses into [`ApiError`] values carrying a
//! single display message.

use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::response::decode_body;

struct FieldRule {
    fields: &'static [&'static str],
    label: &'static str,
}

const DATE_RULE: FieldRule = FieldRule {
    fields: &["unavailable_dates", "date_range", "start_date", "end_date"],
    label: "Invalid date range",
};

const PRODUCT_RULES: &[FieldRule] = &[
    FieldRule {
        fields: &["images", "image"],
        label: "Invalid images",
    },
    FieldRule {
        fields: &["pricing_tiers"],
        label: "Invalid pricing tiers",
    },
    FieldRule {
        fields: &["category"],
        label: "Invalid category",
    },
    DATE_RULE,
    FieldRule {
        fields: &["product_type"],
        label: "Invalid product type",
    },
];

const RENTAL_RULES: &[FieldRule] = &[DATE_RULE];

fn rules_for(path: &str) -> &'static [FieldRule] {
    if path.contains("/api/products/") {
        PRODUCT_RULES
    } else if path.contains("/api/rentals/") {
        RENTAL_RULES
    } else {
        &[]
    }
}

fn join_non_empty<I: Iterator<Item = String>>(parts: I, sep: &str) -> Option<String> {
    let parts: Vec<String> = parts.collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(sep))
    }
}

/// Render a backend message value as text. Lists are joined with spaces,
/// nested objects become `field: message` pairs.
fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Array(items) => join_non_empty(items.iter().filter_map(render), " "),
        Value::Object(map) => join_non_empty(
            map.iter()
                .filter_map(|(k, v)| render(v).map(|m| format!("{}: {}", k, m))),
            ", ",
        ),
        other => Some(other.to_string()),
    }
}

fn endpoint_message(path: &str, map: &Map<String, Value>) -> Option<String> {
    let rules = rules_for(path);
    join_non_empty(
        map.iter().filter_map(|(key, value)| {
            let rule = rules.iter().find(|r| r.fields.contains(&key.as_str()))?;
            Some(match render(value) {
                Some(message) => format!("{}: {}", rule.label, message),
                None => rule.label.to_string(),
            })
        }),
        "; ",
    )
}

fn state_conflict(map: &Map<String, Value>) -> Option<ApiError> {
    let current_status = map
        .get("current_status")
        .or_else(|| map.get("status"))
        .and_then(Value::as_str)?
        .to_string();
    let message = match known_message(&Value::Object(map.clone())) {
        Some(detail) => format!("{} (current status: {})", detail, current_status),
        None => format!("Action not allowed in current status: {}", current_status),
    };
    Some(ApiError::StateConflict {
        message,
        current_status,
    })
}

/// Message from one of the recognized payload shapes: a plain string,
/// `detail`, `non_field_errors`, `message` or `error`.
fn known_message(payload: &Value) -> Option<String> {
    match payload {
        Value::String(_) => render(payload),
        Value::Object(map) => {
            if let Some(detail) = map.get("detail").and_then(render) {
                return Some(detail);
            }
            if let Some(errors) = map.get("non_field_errors") {
                let first = match errors {
                    Value::Array(items) => items.iter().find_map(render),
                    other => render(other),
                };
                if first.is_some() {
                    return first;
                }
            }
            ["message", "error"]
                .iter()
                .find_map(|key| map.get(*key).and_then(render))
        }
        _ => None,
    }
}

fn by_status(status: u16, message: String, fields: Map<String, Value>) -> ApiError {
    match status {
        401 => ApiError::Unauthorized { message },
        400 | 422 => ApiError::Validation {
            message,
            status,
            fields,
        },
        _ => ApiError::Http { status, message },
    }
}

/// Map a failed response to an error.
///
/// `path` is the resolved URL path of the request; it selects the
/// endpoint-specific field rules.
pub fn map_error(status: u16, path: &str, body: &[u8]) -> ApiError {
    if body.iter().all(u8::is_ascii_whitespace) {
        return ApiError::network(Some(status), None);
    }
    let payload = decode_body(body);

    let fields = match &payload {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    if let Value::Object(map) = &payload {
        if status == 400 {
            if let Some(message) = endpoint_message(path, map) {
                return by_status(status, message, fields);
            }
        }
        if status == 403 {
            if let Some(conflict) = state_conflict(map) {
                return conflict;
            }
        }
    }

    if let Some(message) = known_message(&payload) {
        return by_status(status, message, fields);
    }

    let message = match &payload {
        Value::Object(_) => render(&payload).map(|m| format!("Validation error: {}", m)),
        _ => None,
    }
    .unwrap_or_else(|| format!("Request failed with status {}", status));

    by_status(status, message, fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, CONNECTIVITY_MESSAGE};
    use serde_json::json;

    fn map(status: u16, path: &str, body: Value) -> ApiError {
        map_error(status, path, body.to_string().as_bytes())
    }

    #[test]
    fn test_pricing_tiers_on_product_path() {
        let error = map(400, "/api/products/12/", json!({"pricing_tiers": "must be positive"}));
        assert!(error.message().contains("Invalid pricing tiers"));
        assert_eq!(error.message(), "Invalid pricing tiers: must be positive");
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert!(error.field_errors().unwrap().contains_key("pricing_tiers"));
    }

    #[test]
    fn test_multiple_product_fields() {
        let error = map(
            400,
            "/api/products/",
            json!({
                "category": ["\"spaceship\" is not a valid choice."],
                "title": ["This field is required."],
                "pricing_tiers": [{}, {"price": ["Ensure this value is greater than 0."]}]
            }),
        );
        assert_eq!(
            error.message(),
            "Invalid category: \"spaceship\" is not a valid choice.; \
             Invalid pricing tiers: price: Ensure this value is greater than 0."
        );
    }

    #[test]
    fn test_rental_dates() {
        let error = map(400, "/api/rentals/", json!({"end_date": ["End date must be after start date."]}));
        assert_eq!(error.message(), "Invalid date range: End date must be after start date.");
    }

    #[test]
    fn test_field_rules_only_apply_to_their_paths() {
        let error = map(400, "/api/users/me/", json!({"category": "nope"}));
        assert_eq!(error.message(), "Validation error: category: nope");
    }

    #[test]
    fn test_unrecognized_shape_joins_fields() {
        let error = map(400, "/api/anything/", json!({"foo": "bar", "baz": "qux"}));
        assert_eq!(error.message(), "Validation error: foo: bar, baz: qux");
    }

    #[test]
    fn test_known_shapes() {
        assert_eq!(map(400, "/api/x/", json!("plain failure")).message(), "plain failure");
        assert_eq!(map(404, "/api/x/", json!({"detail": "Not found."})).message(), "Not found.");
        assert_eq!(
            map(400, "/auth/login/", json!({"non_field_errors": ["Unable to log in.", "second"]})).message(),
            "Unable to log in."
        );
        assert_eq!(map(400, "/api/x/", json!({"message": "m"})).message(), "m");
        assert_eq!(
            map(401, "/auth/login/", json!({"error": "Invalid credentials"})).message(),
            "Invalid credentials"
        );
    }

    #[test]
    fn test_detail_wins_over_product_fields_only_when_no_field_matches() {
        let error = map(400, "/api/products/3/", json!({"detail": "Bad request"}));
        assert_eq!(error.message(), "Bad request");
    }

    #[test]
    fn test_variant_follows_status() {
        assert!(matches!(
            map(401, "/api/users/me/", json!({"detail": "Token expired"})),
            ApiError::Unauthorized { .. }
        ));
        assert!(matches!(
            map(500, "/api/users/me/", json!({"error": "boom"})),
            ApiError::Http { status: 500, .. }
        ));
        assert_eq!(
            map(404, "/api/products/77/", json!({"detail": "Not found."})).kind(),
            ErrorKind::Http
        );
        assert!(matches!(
            map(422, "/api/users/me/", json!({"email": ["bad"]})),
            ApiError::Validation { status: 422, .. }
        ));
    }

    #[test]
    fn test_state_conflict() {
        let error = map(
            403,
            "/api/products/9/submit_for_review/",
            json!({"detail": "Only draft listings can be submitted.", "current_status": "active"}),
        );
        assert_eq!(error.kind(), ErrorKind::StateConflict);
        assert_eq!(
            error.message(),
            "Only draft listings can be submitted. (current status: active)"
        );

        let error = map(403, "/api/products/9/", json!({"status": "suspended"}));
        assert_eq!(error.message(), "Action not allowed in current status: suspended");
    }

    #[test]
    fn test_plain_403_is_not_a_conflict() {
        let error = map(403, "/api/products/9/", json!({"error": "You do not have permission to delete this product."}));
        assert!(matches!(error, ApiError::Http { status: 403, .. }));
    }

    #[test]
    fn test_json_null_body_is_an_answer() {
        let error = map_error(500, "/api/products/", b"null");
        assert!(matches!(error, ApiError::Http { status: 500, .. }));
        assert_eq!(error.kind(), ErrorKind::Http);
        assert_eq!(error.message(), "Request failed with status 500");
    }

    #[test]
    fn test_no_body_is_connectivity_error() {
        let error = map_error(502, "/api/products/", b"");
        assert_eq!(error.kind(), ErrorKind::Network);
        assert_eq!(error.message(), CONNECTIVITY_MESSAGE);
        assert_eq!(error.status_code(), Some(502));

        let error = map_error(500, "/api/products/", b"  \n");
        assert_eq!(error.message(), CONNECTIVITY_MESSAGE);
    }

    #[test]
    fn test_unreadable_payloads_fall_back_to_status() {
        assert_eq!(map(500, "/api/x/", json!({})).message(), "Request failed with status 500");
        assert_eq!(map(500, "/api/x/", json!(17)).message(), "Request failed with status 500");
        assert_eq!(
            map(400, "/api/x/", json!({"a": null, "b": []})).message(),
            "Request failed with status 400"
        );
    }

    #[test]
    fn test_text_body_is_plain_string() {
        let error = map_error(503, "/api/x/", b"Service Unavailable");
        assert_eq!(error.message(), "Service Unavailable");
    }
}
