//! Key-case conversion between the client's camelCase field names and the
//! backend's snake_case ones.
//!
//! The conversions are inverse of each other for keys that start with a
//! lowercase letter and contain no underscores on the client side, which
//! covers every field the backend exposes. Only object keys are rewritten;
//! string values, numbers and other leaves are never touched.

use serde_json::{Map, Value};

/// Convert a camelCase identifier to snake_case.
///
/// `pricingTiers` becomes `pricing_tiers`, `userID` becomes `user_i_d`.
pub fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a snake_case identifier to camelCase.
///
/// Leading underscores are kept. An underscore is dropped only when the
/// next character is a lowercase letter, so `a__b` becomes `a_B` and
/// `line_2` stays `line_2`.
pub fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    let mut leading = true;
    while let Some(c) = chars.next() {
        if c == '_' && !leading {
            match chars.peek() {
                Some(next) if next.is_lowercase() => {
                    let next = *next;
                    chars.next();
                    out.extend(next.to_uppercase());
                }
                _ => out.push(c),
            }
            continue;
        }
        if c != '_' {
            leading = false;
        }
        out.push(c);
    }
    out
}

/// Values whose object keys can be rewritten recursively.
pub trait Transformable: Sized {
    /// Rewrite every object key with `f`, depth-first.
    fn map_keys<F>(self, f: &F) -> Self
    where
        F: Fn(&str) -> String;

    /// Rewrite keys into the backend's convention
    fn into_snake_keys(self) -> Self {
        self.map_keys(&to_snake_case)
    }

    /// Rewrite keys into the client's convention
    fn into_camel_keys(self) -> Self {
        self.map_keys(&to_camel_case)
    }
}

impl Transformable for Value {
    fn map_keys<F>(self, f: &F) -> Self
    where
        F: Fn(&str) -> String,
    {
        match self {
            Value::Object(map) => Value::Object(map.map_keys(f)),
            Value::Array(items) => Value::Array(items.into_iter().map(|v| v.map_keys(f)).collect()),
            leaf => leaf,
        }
    }
}

impl Transformable for Map<String, Value> {
    fn map_keys<F>(self, f: &F) -> Self
    where
        F: Fn(&str) -> String,
    {
        self.into_iter()
            .map(|(key, value)| (f(&key), value.map_keys(f)))
            .collect()
    }
}
