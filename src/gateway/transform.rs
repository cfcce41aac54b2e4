//! Upstream payload → outbound contract
//!
//! Every transform is a pure `Value -> Value` function. Missing fields turn
//! into `null`; only a wrong top-level shape (something we must iterate is
//! not a list, a record is not an object) is reported as [`ShapeError`].

use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unexpected payload shape: {0}")]
pub struct ShapeError(pub String);

pub type MapFn = fn(Value) -> Result<Value, ShapeError>;

/// How a route reshapes a successful upstream payload
#[derive(Debug, Clone, Copy)]
pub enum Transform {
    /// Body returned unchanged
    Passthrough,
    /// Subset / rename / derive fields
    Projection(MapFn),
    /// Collapse nested sub-records one level
    Flatten(MapFn),
}

impl Transform {
    pub fn apply(self, payload: Value) -> Result<Value, ShapeError> {
        match self {
            Self::Passthrough => Ok(payload),
            Self::Projection(f) | Self::Flatten(f) => f(payload),
        }
    }

    pub const fn policy(self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::Projection(_) => "projection",
            Self::Flatten(_) => "flatten",
        }
    }
}

fn into_object(value: Value, what: &str) -> Result<Map<String, Value>, ShapeError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ShapeError(format!("{what} must be an object, got {}", kind(&other)))),
    }
}

fn into_array(value: Option<Value>, what: &str) -> Result<Vec<Value>, ShapeError> {
    match value {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(ShapeError(format!("{what} must be a list, got {}", kind(&other)))),
        None => Err(ShapeError(format!("{what} is missing"))),
    }
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn field(map: &Map<String, Value>, name: &str) -> Value {
    map.get(name).cloned().unwrap_or(Value::Null)
}

/// Keep only `items` and `meta` of a paginated envelope
pub fn page_items(payload: Value) -> Result<Value, ShapeError> {
    let page = into_object(payload, "page")?;
    Ok(json!({
        "items": field(&page, "items"),
        "meta": field(&page, "meta"),
    }))
}

/// Paginated members, each gaining a `stack` list copied from `skills`
pub fn team_members(payload: Value) -> Result<Value, ShapeError> {
    let mut page = into_object(payload, "page")?;
    let items = into_array(page.remove("items"), "items")?
        .into_iter()
        .map(|item| -> Result<Value, ShapeError> {
            let mut member = into_object(item, "team member")?;
            // `stack` is always a list; a non-list `skills` yields an empty one
            let stack = match member.get("skills") {
                Some(Value::Array(skills)) => Value::Array(skills.clone()),
                _ => Value::Array(Vec::new()),
            };
            member.insert("stack".to_string(), stack);
            Ok(Value::Object(member))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({
        "items": items,
        "meta": field(&page, "meta"),
    }))
}

/// Solutions with `features` reduced to their description strings
pub fn solution_cards(payload: Value) -> Result<Value, ShapeError> {
    let solutions = into_array(Some(payload), "solutions")?;
    let cards = solutions
        .into_iter()
        .map(|item| -> Result<Value, ShapeError> {
            let solution = into_object(item, "solution")?;
            let features = match solution.get("features") {
                Some(Value::Array(features)) => features
                    .iter()
                    .map(|f| f.get("featureDescription").cloned().unwrap_or(Value::Null))
                    .collect(),
                None | Some(Value::Null) => Vec::new(),
                Some(other) => {
                    return Err(ShapeError(format!(
                        "features must be a list, got {}",
                        kind(other)
                    )))
                }
            };
            Ok(json!({
                "id": field(&solution, "id"),
                "title": field(&solution, "title"),
                "icon": field(&solution, "icon"),
                "description": field(&solution, "description"),
                "features": features,
            }))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(cards))
}

/// Vacancy page → list of display cards
pub fn vacancy_cards(payload: Value) -> Result<Value, ShapeError> {
    let mut page = into_object(payload, "page")?;
    let cards = into_array(page.remove("items"), "items")?
        .into_iter()
        .map(|item| -> Result<Value, ShapeError> {
            let vacancy = into_object(item, "vacancy")?;
            Ok(json!({
                "title": field(&vacancy, "jobTitle"),
                "type": field(&vacancy, "mode"),
                "experience": experience_label(vacancy.get("yearsExperience")),
                "slug": field(&vacancy, "slug"),
                "stack": field(&vacancy, "stackRequired"),
                "description": preferred_description(&vacancy),
            }))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(cards))
}

/// `5` → `"5+ años"`
fn experience_label(years: Option<&Value>) -> Value {
    match years {
        Some(Value::Number(n)) => Value::String(format!("{n}+ años")),
        Some(Value::String(s)) if !s.is_empty() => Value::String(format!("{s}+ años")),
        _ => Value::Null,
    }
}

/// Short description when present and non-empty, else the long one
fn preferred_description(vacancy: &Map<String, Value>) -> Value {
    match vacancy.get("shortDescription") {
        Some(Value::String(short)) if !short.is_empty() => Value::String(short.clone()),
        _ => field(vacancy, "description"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> Value {
        json!({
            "currentPage": 1, "itemsPerPage": 4, "totalItems": 1,
            "totalPages": 1, "hasNextPage": false, "hasPreviousPage": false
        })
    }

    #[test]
    fn passthrough_keeps_body() {
        let body = json!({"anything": [1, 2, 3]});
        assert_eq!(Transform::Passthrough.apply(body.clone()).unwrap(), body);
    }

    #[test]
    fn page_items_drops_extra_envelope_fields() {
        let out = page_items(json!({"items": [{"id": "a"}], "meta": meta(), "debug": true})).unwrap();
        assert_eq!(out, json!({"items": [{"id": "a"}], "meta": meta()}));
    }

    #[test]
    fn page_items_missing_meta_is_null() {
        let out = page_items(json!({"items": []})).unwrap();
        assert_eq!(out["meta"], Value::Null);
    }

    #[test]
    fn team_members_gain_stack() {
        let out = team_members(json!({
            "items": [
                {"slug": "keny", "skills": [{"skillName": "Rust"}]},
                {"slug": "ana"},
                {"slug": "luis", "skills": "Rust"}
            ],
            "meta": meta()
        }))
        .unwrap();
        assert_eq!(out["items"][0]["stack"], json!([{"skillName": "Rust"}]));
        assert_eq!(out["items"][1]["stack"], json!([]));
        assert_eq!(out["items"][2]["stack"], json!([]));
        assert_eq!(out["items"][2]["skills"], "Rust");
        assert_eq!(out["meta"], meta());
    }

    #[test]
    fn solutions_flatten_features() {
        let out = solution_cards(json!([{
            "id": "cloud", "title": "Cloud", "icon": "<svg/>", "description": "d",
            "isActive": true, "order": 1,
            "features": [
                {"id": "f1", "featureDescription": "Migración"},
                {"id": "f2"}
            ]
        }]))
        .unwrap();
        assert_eq!(
            out,
            json!([{
                "id": "cloud", "title": "Cloud", "icon": "<svg/>", "description": "d",
                "features": ["Migración", null]
            }])
        );
    }

    #[test]
    fn solutions_must_be_a_list() {
        assert!(solution_cards(json!({"items": []})).is_err());
    }

    #[test]
    fn vacancy_projection() {
        let out = vacancy_cards(json!({
            "items": [
                {
                    "jobTitle": "Senior Frontend Developer", "mode": "Remoto",
                    "yearsExperience": 5, "slug": "senior-frontend-developer",
                    "stackRequired": ["React"], "shortDescription": "corta",
                    "description": "larga"
                },
                {"jobTitle": "QA", "shortDescription": "", "description": "larga"}
            ],
            "meta": meta()
        }))
        .unwrap();
        assert_eq!(
            out[0],
            json!({
                "title": "Senior Frontend Developer", "type": "Remoto",
                "experience": "5+ años", "slug": "senior-frontend-developer",
                "stack": ["React"], "description": "corta"
            })
        );
        assert_eq!(out[1]["description"], "larga");
        assert_eq!(out[1]["experience"], Value::Null);
        assert_eq!(out[1]["stack"], Value::Null);
    }

    #[test]
    fn vacancy_items_must_be_a_list() {
        let err = vacancy_cards(json!({"items": "nope"})).unwrap_err();
        assert!(err.to_string().contains("items must be a list"));
        assert!(vacancy_cards(json!("nope")).is_err());
    }

    #[test]
    fn transform_is_deterministic() {
        let payload = json!({"items": [{"jobTitle": "QA", "yearsExperience": 2}], "meta": meta()});
        let a = serde_json::to_vec(&vacancy_cards(payload.clone()).unwrap()).unwrap();
        let b = serde_json::to_vec(&vacancy_cards(payload).unwrap()).unwrap();
        assert_eq!(a, b);
    }
}
