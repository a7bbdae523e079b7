//! Structural copy between serde types.
//!
//! Fields are matched by name, ignoring case, `_` and `-`, so `response_code`,
//! `responseCode` and `ResponseCode` all refer to the same field. Only fields
//! that the target serializes are written, and `null` source values are
//! skipped.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Copy same-named, non-null fields of `source` onto `target`.
///
/// Returns `true` if at least one field was copied.
///
/// # Errors
/// Returns an error if either value does not serialize to JSON, or if a copied
/// field has a type the target cannot accept (the target is left untouched).
pub fn bind<T, S>(target: &mut T, source: &S) -> Result<bool, serde_json::Error>
where
    T: Serialize + DeserializeOwned,
    S: Serialize + ?Sized,
{
    let Value::Object(mut fields) = serde_json::to_value(&*target)? else {
        return Ok(false);
    };
    let Value::Object(source_fields) = serde_json::to_value(source)? else {
        return Ok(false);
    };
    if !copy_matching(&mut fields, source_fields) {
        return Ok(false);
    }
    *target = serde_json::from_value(Value::Object(fields))?;
    Ok(true)
}

/// Build the all-default `T` and overlay the non-null fields of `source`.
///
/// `T` only has to be deserializable. Each source field is offered under its
/// original, `snake_case`, `PascalCase` and `camelCase` spellings in turn and
/// lands under the first one `T` declares (aliases included), so no field
/// reaches `T` twice. Fields `T` does not declare, or whose value `T` rejects,
/// are skipped. Returns `None` if `T` cannot be built from an empty object.
pub(crate) fn default_with<T, S>(source: Option<&S>) -> Option<T>
where
    T: DeserializeOwned,
    S: Serialize,
{
    let default = serde_json::from_value::<T>(Value::Object(Map::new())).ok()?;
    let Some(Ok(Value::Object(source_fields))) = source.map(serde_json::to_value) else {
        return Some(default);
    };

    let mut overlay = Map::new();
    for (name, value) in source_fields {
        if value.is_null() {
            continue;
        }
        if let Some(key) = spellings(&name)
            .into_iter()
            .find(|key| declares_field::<T>(key, &value))
        {
            overlay.entry(key).or_insert(value);
        }
    }
    if overlay.is_empty() {
        return Some(default);
    }
    Some(serde_json::from_value(Value::Object(overlay)).unwrap_or(default))
}

/// `true` if `T` accepts `value` under `key` and treats `key` as one of its
/// fields.
///
/// A declared field (or alias) given twice is a "duplicate field" error for
/// derived `Deserialize`, while an undeclared key is ignored either time.
fn declares_field<T: DeserializeOwned>(key: &str, value: &Value) -> bool {
    let key = Value::String(key.to_owned());
    let once = format!("{{{key}:{value}}}");
    let twice = format!("{{{key}:{value},{key}:{value}}}");
    serde_json::from_str::<T>(&once).is_ok() && serde_json::from_str::<T>(&twice).is_err()
}

fn copy_matching(target: &mut Map<String, Value>, source: Map<String, Value>) -> bool {
    let mut copied = false;
    for (name, value) in source {
        if value.is_null() {
            continue;
        }
        let wanted = normalize(&name);
        if let Some(slot) = target
            .iter_mut()
            .find_map(|(k, v)| (normalize(k) == wanted).then_some(v))
        {
            *slot = value;
            copied = true;
        }
    }
    copied
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn spellings(name: &str) -> Vec<String> {
    let camel = to_camel(name);
    let candidates = [name.to_owned(), to_snake(&camel), to_pascal(&camel), camel];
    let mut out: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    out
}

fn to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for (i, c) in name.chars().enumerate() {
        if c == '_' || c == '-' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else if i == 0 {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn to_snake(camel: &str) -> String {
    let mut out = String::with_capacity(camel.len() + 4);
    for c in camel.chars() {
        if c.is_uppercase() {
            if !out.is_empty() {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn to_pascal(camel: &str) -> String {
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::envelope::{ErrorEnvelope, ResponseCode};
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct ProductResult {
        id: u32,
        message: Option<String>,
        response_code: ResponseCode,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default, rename_all = "PascalCase")]
    struct LegacyResult {
        title: Option<String>,
        success: bool,
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Required {
        id: u32,
    }

    fn error() -> ErrorEnvelope {
        ErrorEnvelope {
            title: Some("Not found".to_owned()),
            message: Some("no such product".to_owned()),
            success: Some(false),
            response_code: Some(ResponseCode::Failed),
            link: None,
        }
    }

    #[test]
    fn bind_copies_matching_fields_only() {
        let mut target = ProductResult {
            id: 70,
            ..ProductResult::default()
        };
        assert!(bind(&mut target, &error()).unwrap());
        assert_eq!(
            target,
            ProductResult {
                id: 70,
                message: Some("no such product".to_owned()),
                response_code: ResponseCode::Failed,
            }
        );
    }

    #[test]
    fn bind_skips_null_source_fields() {
        let mut target = ProductResult {
            message: Some("keep".to_owned()),
            ..ProductResult::default()
        };
        let source = ErrorEnvelope {
            title: Some("t".to_owned()),
            ..ErrorEnvelope::default()
        };
        assert!(!bind(&mut target, &source).unwrap());
        assert_eq!(target.message.as_deref(), Some("keep"));
    }

    #[test]
    fn bind_rejects_incompatible_types_without_touching_target() {
        #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
        struct Strict {
            success: String,
        }

        let mut target = Strict::default();
        assert!(bind(&mut target, &error()).is_err());
        assert_eq!(target, Strict::default());
    }

    #[test]
    fn default_with_overlays_snake_case_fields() {
        let merged: ProductResult = default_with(Some(&error())).unwrap();
        assert_eq!(merged.id, 0);
        assert_eq!(merged.message.as_deref(), Some("no such product"));
        assert_eq!(merged.response_code, ResponseCode::Failed);
    }

    #[test]
    fn default_with_overlays_pascal_case_fields() {
        let merged: LegacyResult = default_with(Some(&error())).unwrap();
        assert_eq!(merged.title.as_deref(), Some("Not found"));
        assert!(!merged.success);
    }

    #[test]
    fn default_with_fills_aliased_fields_once() {
        #[derive(Debug, Default, PartialEq, Deserialize)]
        #[serde(default)]
        struct Aliased {
            #[serde(alias = "Message")]
            message: Option<String>,
            #[serde(alias = "responseCode", alias = "ResponseCode")]
            response_code: ResponseCode,
        }

        let merged: Aliased = default_with(Some(&error())).unwrap();
        assert_eq!(merged.message.as_deref(), Some("no such product"));
        assert_eq!(merged.response_code, ResponseCode::Failed);
    }

    #[test]
    fn default_with_merges_into_error_envelope() {
        let merged: ErrorEnvelope = default_with(Some(&error())).unwrap();
        assert_eq!(merged, error());
    }

    #[test]
    fn default_with_skips_fields_with_rejected_values() {
        #[derive(Debug, Default, PartialEq, Deserialize)]
        #[serde(default)]
        struct Mixed {
            message: Option<String>,
            success: String,
        }

        let merged: Mixed = default_with(Some(&error())).unwrap();
        assert_eq!(merged.message.as_deref(), Some("no such product"));
        assert!(merged.success.is_empty());
    }

    #[test]
    fn default_with_respects_deny_unknown_fields() {
        #[derive(Debug, Default, PartialEq, Deserialize)]
        #[serde(default, deny_unknown_fields)]
        struct Closed {
            title: Option<String>,
        }

        let merged: Closed = default_with(Some(&error())).unwrap();
        assert_eq!(merged.title.as_deref(), Some("Not found"));
    }

    #[test]
    fn declares_field_tells_declared_from_ignored_keys() {
        let value = Value::String("x".to_owned());
        assert!(declares_field::<ErrorEnvelope>("title", &value));
        assert!(declares_field::<ErrorEnvelope>("Title", &value));
        assert!(!declares_field::<ErrorEnvelope>("unknown", &value));
        assert!(!declares_field::<ErrorEnvelope>("success", &value));
    }

    #[test]
    fn default_with_requires_default_form() {
        assert!(default_with::<Required, ErrorEnvelope>(Some(&error())).is_none());
    }

    #[test]
    fn default_with_without_source_is_plain_default() {
        let merged: ProductResult = default_with::<_, ErrorEnvelope>(None).unwrap();
        assert_eq!(merged, ProductResult::default());
    }

    #[test]
    fn spellings_cover_common_styles() {
        assert_eq!(
            spellings("responseCode"),
            ["responseCode", "response_code", "ResponseCode"]
        );
        assert_eq!(spellings("title"), ["title", "Title"]);
    }
}
