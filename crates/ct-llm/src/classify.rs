//! Feature grouping prompt and response normalization.

use ct_core::{CommitSummary, FeatureGroup};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{LlmError, Prompt, strip_code_fence};

const CLASSIFY_MAX_TOKENS: u32 = 4096;
const CLASSIFY_TEMPERATURE: f32 = 0.3;
const CLASSIFY_SYSTEM: &str = "You are an expert software development analyst. You identify distinct \
features and work streams from commit histories, separating new features, fixes, refactoring, \
setup, documentation, and tests.";

pub(crate) fn build_prompt(commits: &[CommitSummary]) -> Prompt {
    let mut lines = Vec::new();
    lines.push("Group the following commits into distinct features.".to_string());
    lines.push(
        "Return strict JSON: [{\"featureName\":\"...\",\"commits\":[\"sha1\",\"sha2\"]}]"
            .to_string(),
    );
    lines.push("Rules:".to_string());
    lines.push("- Create at least 3 groups when the history allows it.".to_string());
    lines.push("- Keep bug fixes, refactoring, and setup apart from feature work.".to_string());
    lines.push("- Use only the commit ids listed below.".to_string());
    lines.push(String::new());
    lines.push("commits:".to_string());
    for commit in commits {
        lines.push(format!("{} {}", commit.id, commit.summary));
    }
    Prompt {
        system: Some(CLASSIFY_SYSTEM),
        user: lines.join("\n"),
        max_tokens: CLASSIFY_MAX_TOKENS,
        temperature: CLASSIFY_TEMPERATURE,
    }
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    #[serde(rename = "featureName", alias = "name", alias = "feature_name")]
    name: String,
    #[serde(alias = "commitIds", alias = "commit_ids")]
    commits: Vec<String>,
}

const NAME_KEYS: [&str; 3] = ["featureName", "name", "feature_name"];
const COMMIT_KEYS: [&str; 3] = ["commits", "commitIds", "commit_ids"];
const WRAPPER_KEYS: [&str; 2] = ["features", "groups"];

/// Normalizes a classifier reply into a list of feature groups.
///
/// The reply may be wrapped in a Markdown code fence. Accepted shapes are a
/// list of group objects, an object wrapping that list under `features` or
/// `groups`, a single group object, or an object with any field holding a
/// list of groups. A reply that is not JSON is
/// [`LlmError::InvalidResponse`]; JSON of any other shape, or an empty group
/// list, is [`LlmError::ShapeInvalid`].
pub fn normalize_groups(text: &str) -> Result<Vec<FeatureGroup>, LlmError> {
    let json = strip_code_fence(text);
    let value: Value = serde_json::from_str(json)
        .map_err(|err| LlmError::InvalidResponse(format!("classifier reply is not JSON: {err}")))?;

    let raw = match value {
        Value::Array(items) => group_list("top-level list", items)?,
        Value::Object(map) => object_groups(map)?,
        other => {
            return Err(LlmError::ShapeInvalid(format!(
                "expected a list or object of feature groups, got {}",
                kind(&other)
            )));
        }
    };

    if raw.is_empty() {
        return Err(LlmError::ShapeInvalid("no feature groups".to_string()));
    }

    Ok(raw
        .into_iter()
        .map(|group| FeatureGroup {
            name: group.name.trim().to_string(),
            commit_ids: group
                .commits
                .into_iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        })
        .collect())
}

fn object_groups(mut map: Map<String, Value>) -> Result<Vec<RawGroup>, LlmError> {
    let wrapped = WRAPPER_KEYS
        .into_iter()
        .find_map(|key| match map.get_mut(key) {
            Some(Value::Array(items)) => Some((key, std::mem::take(items))),
            _ => None,
        });
    if let Some((key, items)) = wrapped {
        return group_list(key, items);
    }
    if is_group(&map) {
        tracing::debug!("single feature object, wrapping in list");
        return group(Value::Object(map), "single group").map(|group| vec![group]);
    }
    find_keyed_groups(map)
}

/// Every item must be a group object.
fn group_list(source: &str, items: Vec<Value>) -> Result<Vec<RawGroup>, LlmError> {
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(_) => group(item, &format!("{source} item {idx}")),
            other => Err(LlmError::ShapeInvalid(format!(
                "{source} item {idx} is {}, not a feature group",
                kind(&other)
            ))),
        })
        .collect()
}

fn group(value: Value, source: &str) -> Result<RawGroup, LlmError> {
    serde_json::from_value(value).map_err(|err| LlmError::ShapeInvalid(format!("{source}: {err}")))
}

fn is_group(map: &Map<String, Value>) -> bool {
    NAME_KEYS.iter().any(|key| map.contains_key(*key))
        && COMMIT_KEYS.iter().any(|key| map.contains_key(*key))
}

/// Finds the first field, in reply order, whose value is a non-empty array
/// starting with a group object.
fn find_keyed_groups(map: Map<String, Value>) -> Result<Vec<RawGroup>, LlmError> {
    let keys: Vec<String> = map.keys().cloned().collect();
    for (key, value) in map {
        let Value::Array(items) = value else {
            continue;
        };
        let looks_like_groups = items
            .first()
            .and_then(Value::as_object)
            .is_some_and(is_group);
        if !looks_like_groups {
            continue;
        }
        tracing::debug!(%key, "found feature array");
        return group_list(&format!("field {key}"), items);
    }
    Err(LlmError::ShapeInvalid(format!(
        "object without feature groups (keys: {})",
        keys.join(", ")
    )))
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(groups: &[FeatureGroup]) -> Vec<&str> {
        groups.iter().map(|g| g.name.as_str()).collect()
    }

    #[test]
    fn build_prompt_lists_every_commit() {
        let commits = vec![
            CommitSummary {
                id: "abc123".to_string(),
                summary: "Add login form".to_string(),
            },
            CommitSummary {
                id: "def456".to_string(),
                summary: "Fix token refresh".to_string(),
            },
        ];
        let prompt = build_prompt(&commits);
        assert!(prompt.user.contains("abc123 Add login form"));
        assert!(prompt.user.contains("def456 Fix token refresh"));
        assert!(prompt.user.contains("featureName"));
        assert_eq!(prompt.system, Some(CLASSIFY_SYSTEM));
    }

    #[test]
    fn accepts_top_level_array() {
        let groups = normalize_groups(
            r#"[{"featureName":"Setup","commits":["a","b"]},{"featureName":"Auth","commits":["c"]}]"#,
        )
        .unwrap();
        assert_eq!(names(&groups), vec!["Setup", "Auth"]);
        assert_eq!(groups[0].commit_ids, vec!["a", "b"]);
    }

    #[test]
    fn accepts_wrapped_features() {
        let groups =
            normalize_groups(r#"{"features":[{"featureName":"Setup","commits":["a"]}]}"#).unwrap();
        assert_eq!(names(&groups), vec!["Setup"]);

        let groups = normalize_groups(r#"{"groups":[{"name":"Docs","commitIds":["d"]}]}"#).unwrap();
        assert_eq!(names(&groups), vec!["Docs"]);
        assert_eq!(groups[0].commit_ids, vec!["d"]);
    }

    #[test]
    fn accepts_single_group_object() {
        let groups = normalize_groups(r#"{"featureName":"Everything","commits":["a","b"]}"#).unwrap();
        assert_eq!(names(&groups), vec!["Everything"]);
    }

    #[test]
    fn accepts_groups_under_any_key() {
        let groups = normalize_groups(
            r#"{"summary":"ok","result":[{"featureName":"UI","commits":["u1"]}]}"#,
        )
        .unwrap();
        assert_eq!(names(&groups), vec!["UI"]);
    }

    #[test]
    fn accepts_fenced_reply() {
        let groups =
            normalize_groups("```json\n[{\"featureName\":\"Setup\",\"commits\":[\"a\"]}]\n```")
                .unwrap();
        assert_eq!(names(&groups), vec!["Setup"]);
    }

    #[test]
    fn trims_names_and_drops_blank_ids() {
        let groups =
            normalize_groups(r#"[{"featureName":"  Auth ","commits":[" a ",""]}]"#).unwrap();
        assert_eq!(groups[0].name, "Auth");
        assert_eq!(groups[0].commit_ids, vec!["a"]);
    }

    #[test]
    fn rejects_unrecognized_object() {
        let err = normalize_groups(r#"{"answer":"I could not group these"}"#).unwrap_err();
        assert!(matches!(err, LlmError::ShapeInvalid(_)));
        assert!(err.to_string().contains("answer"));
    }

    #[test]
    fn rejects_empty_group_list() {
        assert!(matches!(
            normalize_groups("[]"),
            Err(LlmError::ShapeInvalid(_))
        ));
        assert!(matches!(
            normalize_groups(r#"{"features":[]}"#),
            Err(LlmError::ShapeInvalid(_))
        ));
    }

    #[test]
    fn rejects_non_json_reply() {
        assert!(matches!(
            normalize_groups("Here are your groups: setup, auth"),
            Err(LlmError::InvalidResponse(_))
        ));
    }

    #[test]
    fn rejects_scalar_json() {
        let err = normalize_groups("42").unwrap_err();
        assert!(matches!(err, LlmError::ShapeInvalid(_)));
        assert!(err.to_string().contains("a number"), "{err}");
        assert!(matches!(
            normalize_groups(r#""Setup""#),
            Err(LlmError::ShapeInvalid(_))
        ));
    }

    #[test]
    fn rejects_positional_group_arrays() {
        let err = normalize_groups(r#"[["Setup",["a","b"]]]"#).unwrap_err();
        assert!(matches!(err, LlmError::ShapeInvalid(_)));
        assert!(err.to_string().contains("not a feature group"), "{err}");

        assert!(matches!(
            normalize_groups(r#"["Setup",["a","b"]]"#),
            Err(LlmError::ShapeInvalid(_))
        ));
        assert!(matches!(
            normalize_groups(r#"{"featureName":"Setup","commits":[["a"]]}"#),
            Err(LlmError::ShapeInvalid(_))
        ));
    }

    #[test]
    fn rejects_list_of_unknown_objects() {
        let err = normalize_groups(r#"[{"foo":1}]"#).unwrap_err();
        assert!(matches!(err, LlmError::ShapeInvalid(_)));
        assert!(err.to_string().contains("top-level list item 0"), "{err}");
    }

    #[test]
    fn keyed_groups_are_found_in_reply_order() {
        let groups = normalize_groups(
            r#"{"b":[{"featureName":"B","commits":["b1"]}],"a":[{"featureName":"A","commits":["a1"]}]}"#,
        )
        .unwrap();
        assert_eq!(names(&groups), vec!["B"]);
    }
}
