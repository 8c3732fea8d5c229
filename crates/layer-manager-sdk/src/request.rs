//! Invocation request and its validation

use crate::error::LayerError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Fields every invocation must carry
pub const REQUIRED_FIELDS: &[&str] = &["layer_name", "s3_bucket", "libraries", "action"];

/// Operation requested by an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Publish the first version of a layer that does not exist yet
    CreateNew,
    /// Report the packages installed in the latest version
    ReadOnly,
    /// Install more packages on top of the latest version and republish
    Update,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateNew => "create_new",
            Action::ReadOnly => "read_only",
            Action::Update => "update",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = LayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create_new" => Ok(Action::CreateNew),
            "read_only" => Ok(Action::ReadOnly),
            "update" => Ok(Action::Update),
            other => Err(LayerError::UnknownAction(other.to_string())),
        }
    }
}

/// A validated invocation request.
///
/// The action is kept as raw text: routing happens only after the access
/// probe, so an unknown action is reported at that point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerRequest {
    /// Layer name on the platform
    pub layer_name: String,

    /// Bucket the archive is uploaded to
    pub s3_bucket: String,

    /// Packages to install, in order
    #[serde(default)]
    pub libraries: Vec<String>,

    /// Requested action text
    pub action: String,
}

impl LayerRequest {
    /// Validate a raw invocation event and extract the request.
    ///
    /// # Example
    /// ```
    /// use layer_manager_sdk::LayerRequest;
    /// use serde_json::json;
    ///
    /// let event = json!({
    ///     "layer_name": "L1",
    ///     "s3_bucket": "b",
    ///     "libraries": ["requests"],
    ///     "action": "create_new"
    /// });
    /// let request = LayerRequest::from_event(&event).unwrap();
    /// assert_eq!(request.libraries, vec!["requests".to_string()]);
    /// ```
    pub fn from_event(event: &Value) -> Result<Self, LayerError> {
        let Some(fields) = event.as_object() else {
            return Err(LayerError::Validation(
                "Request must be a JSON object".to_string(),
            ));
        };

        let read_only = fields.get("action").and_then(Value::as_str) == Some("read_only");
        let allow_empty: &[&str] = if read_only { &["libraries"] } else { &[] };

        let diagnostic = validate_fields(fields, REQUIRED_FIELDS, allow_empty);
        if !diagnostic.is_empty() {
            return Err(LayerError::Validation(diagnostic));
        }

        let libraries = match &fields["libraries"] {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        LayerError::Validation(format!(
                            "Invalid value for libraries: expected package names, found {}",
                            item
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            other => {
                return Err(LayerError::Validation(format!(
                    "Invalid value for libraries: expected a list, found {}",
                    other
                )))
            }
        };

        Ok(Self {
            layer_name: string_field(fields, "layer_name")?,
            s3_bucket: string_field(fields, "s3_bucket")?,
            libraries,
            action: string_field(fields, "action")?,
        })
    }

    /// Resolve the requested action
    pub fn action(&self) -> Result<Action, LayerError> {
        self.action.parse()
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Result<String, LayerError> {
    match fields.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(LayerError::Validation(format!(
            "Invalid value for {}: expected a string, found {}",
            key, other
        ))),
        None => Err(LayerError::Validation(format!("Missing Keys: ['{}']", key))),
    }
}

/// Check a request object for missing keys and empty values.
///
/// Returns an empty string when the request is valid. Otherwise the result
/// names the absent `required` keys and every present field whose value is
/// empty (`null`, `false`, `0`, `""`, `[]`, `{}`), except those listed in
/// `allow_empty`. Any non-empty result is fatal for the request.
pub fn validate_fields(
    fields: &Map<String, Value>,
    required: &[&str],
    allow_empty: &[&str],
) -> String {
    let missing_keys: Vec<&str> = required
        .iter()
        .copied()
        .filter(|key| !fields.contains_key(*key))
        .collect();

    let missing_values: Vec<&str> = fields
        .iter()
        .filter(|(key, value)| is_empty_value(value) && !allow_empty.contains(&key.as_str()))
        .map(|(key, _)| key.as_str())
        .collect();

    let mut diagnostic = String::new();
    if !missing_keys.is_empty() {
        diagnostic.push_str("Missing Keys: ");
        diagnostic.push_str(&format_key_list(&missing_keys));
    }
    if !missing_values.is_empty() {
        diagnostic.push_str("*** Missing values: ");
        diagnostic.push_str(&format_key_list(&missing_values));
    }
    diagnostic
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Render keys as `['a', 'b']`
fn format_key_list(keys: &[&str]) -> String {
    let quoted: Vec<String> = keys.iter().map(|k| format!("'{}'", k)).collect();
    format!("[{}]", quoted.join(", "))
}
