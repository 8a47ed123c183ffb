// SPDX-License-Identifier: Apache-2.0

//! Parses and applies a startup YAML config file (spec.md section 6.4).
//!
//! The file's only recognized shape is a top-level `resources:` map from
//! `/<module-path>/<id>` to a YAML value that already mirrors the shape of
//! that endpoint's REST create body (e.g. `{config: {...}}`). YAML's own
//! scalar typing already gives the quoting rule spec.md section 6.4 spells
//! out — a double-quoted scalar parses as a YAML string, an unquoted
//! numeric-looking scalar parses as a YAML number — so translating YAML to
//! JSON is a direct structural conversion with serde_json emitting the
//! compact ("flow-style") form as a side effect of being JSON.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

use openperf_rest_client::RestClient;

use crate::error::BootstrapError;

#[derive(Debug, Deserialize, Default)]
struct RawBootstrap {
    #[serde(default)]
    resources: BTreeMap<String, YamlValue>,
}

/// One `resources:` entry, resolved to the REST path it targets and the JSON
/// body to POST there.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// REST path segment, e.g. `"cpu-generators"`.
    pub module_path: String,
    /// The id named in the resource key, e.g. `"gen-1"`.
    pub id: String,
    /// The YAML value translated to JSON, POSTed verbatim to `/<module_path>`.
    pub body: JsonValue,
}

/// Parses a config file's contents (already read from disk) into its
/// resource list, without applying anything.
pub fn parse(yaml: &str) -> Result<Vec<Resource>, BootstrapError> {
    let raw: RawBootstrap = serde_yaml::from_str(yaml).map_err(|source| BootstrapError::Parse {
        path: "<string>".to_owned(),
        source,
    })?;
    raw.resources
        .into_iter()
        .map(|(key, value)| {
            let (module_path, id) = split_resource_key(&key)?;
            Ok(Resource { module_path, id, body: yaml_to_json(value) })
        })
        .collect()
}

/// Reads and parses a config file from disk (spec.md section 6.4).
pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<Resource>, BootstrapError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| BootstrapError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let raw: RawBootstrap = serde_yaml::from_str(&contents).map_err(|source| BootstrapError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    raw.resources
        .into_iter()
        .map(|(key, value)| {
            let (module_path, id) = split_resource_key(&key)?;
            Ok(Resource { module_path, id, body: yaml_to_json(value) })
        })
        .collect()
}

/// POSTs every resource to its REST endpoint, logging and continuing past
/// individual failures (a malformed resource should not prevent the rest of
/// the file from applying) and returning the first error encountered, if any.
pub async fn apply(resources: &[Resource], rest: &RestClient) -> Result<(), BootstrapError> {
    let mut first_error = None;
    for resource in resources {
        let path = format!("/{}", resource.module_path);
        let body = with_id(&resource.body, &resource.id);
        if let Err(source) = rest.post_raw(&path, &body).await {
            let key = format!("/{}/{}", resource.module_path, resource.id);
            tracing::warn!(resource = %key, error = %source, "failed to apply bootstrap resource");
            first_error.get_or_insert(BootstrapError::Create { key, source });
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Merges the id named by a resource's key into its JSON body (the key is
/// the only place a bootstrap resource names its id; the REST create body
/// expects it inline as `{id, config}`).
fn with_id(body: &JsonValue, id: &str) -> JsonValue {
    let mut object = body.as_object().cloned().unwrap_or_default();
    object.insert("id".to_owned(), JsonValue::String(id.to_owned()));
    JsonValue::Object(object)
}

fn split_resource_key(key: &str) -> Result<(String, String), BootstrapError> {
    let trimmed = key.trim_start_matches('/');
    let (module_path, id) = trimmed
        .rsplit_once('/')
        .ok_or_else(|| BootstrapError::InvalidKey { key: key.to_owned() })?;
    if module_path.is_empty() || id.is_empty() {
        return Err(BootstrapError::InvalidKey { key: key.to_owned() });
    }
    Ok((module_path.to_owned(), id.to_owned()))
}

fn yaml_to_json(value: YamlValue) -> JsonValue {
    match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsonValue::from(i)
            } else if let Some(u) = n.as_u64() {
                JsonValue::from(u)
            } else {
                serde_json::Number::from_f64(n.as_f64().unwrap_or_default()).map_or(JsonValue::Null, JsonValue::Number)
            }
        }
        YamlValue::String(s) => JsonValue::String(s),
        YamlValue::Sequence(items) => JsonValue::Array(items.into_iter().map(yaml_to_json).collect()),
        YamlValue::Mapping(map) => {
            let mut object = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let key = match k {
                    YamlValue::String(s) => s,
                    other => serde_yaml::to_string(&other).unwrap_or_default().trim().to_owned(),
                };
                let _ = object.insert(key, yaml_to_json(v));
            }
            JsonValue::Object(object)
        }
        YamlValue::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resource_keys_and_bodies() {
        let yaml = r#"
resources:
  "/cpu-generators/gen-1":
    config:
      method: system
      system:
        utilization: 0.1
"#;
        let resources = parse(yaml).unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].module_path, "cpu-generators");
        assert_eq!(resources[0].id, "gen-1");
        assert_eq!(resources[0].body["config"]["system"]["utilization"], 0.1);
    }

    #[test]
    fn rejects_a_key_with_no_id_segment() {
        let yaml = "resources:\n  \"cpu-generators\": {config: {}}\n";
        assert!(parse(yaml).is_err());
    }

    #[test]
    fn quoted_numeric_strings_stay_strings() {
        let yaml = "resources:\n  \"/block-generators/dev-0\":\n    config:\n      resource_id: \"10\"\n      queue_depth: 10\n";
        let resources = parse(yaml).unwrap();
        assert_eq!(resources[0].body["config"]["resource_id"], JsonValue::String("10".into()));
        assert_eq!(resources[0].body["config"]["queue_depth"], JsonValue::from(10));
    }

    #[test]
    fn missing_resources_key_yields_an_empty_list() {
        assert!(parse("version: 1\n").unwrap().is_empty());
    }
}
