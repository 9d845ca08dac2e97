//! Extension metadata model
//!
//! Mirrors the `metadata.json` documents of an extension. Keys this crate
//! does not interpret are kept in `extra` so the serialized metadata that
//! ends up in the registry table and the package stays lossless.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Warehouse an extension targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google BigQuery
    BigQuery,

    /// Snowflake
    Snowflake,
}

impl Provider {
    /// Human readable warehouse name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::BigQuery => "BigQuery",
            Self::Snowflake => "Snowflake",
        }
    }

    /// Stable identifier as written in metadata.json
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigQuery => "bigquery",
            Self::Snowflake => "snowflake",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Logical parameter type declared in component metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    Table,
    String,
    Selection,
    Column,
    Number,
    Boolean,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "Table",
            Self::String => "String",
            Self::Selection => "Selection",
            Self::Column => "Column",
            Self::Number => "Number",
            Self::Boolean => "Boolean",
        }
    }

    /// Whether values of this type are passed as quoted string literals
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::Selection | Self::Column)
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A procedure parameter. Position in the owning list is significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,

    #[serde(rename = "type")]
    pub param_type: ParamType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            optional: None,
            extra: Map::new(),
        }
    }

    /// Mark the parameter as nullable
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }
}

/// A single component of an extension, backed by one stored procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,

    #[serde(rename = "procedureName")]
    pub procedure_name: String,

    #[serde(default)]
    pub inputs: Vec<Parameter>,

    #[serde(default)]
    pub outputs: Vec<Parameter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Component {
    pub fn new(name: impl Into<String>, procedure_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            procedure_name: procedure_name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            icon: None,
            help: None,
            extra: Map::new(),
        }
    }

    pub fn with_input(mut self, param: Parameter) -> Self {
        self.inputs.push(param);
        self
    }

    pub fn with_output(mut self, param: Parameter) -> Self {
        self.outputs.push(param);
        self
    }

    /// Every procedure ends with this flag after inputs and outputs
    pub const DRY_RUN_PARAM: &'static str = "dry_run";

    /// Expected procedure parameter names: inputs, outputs, then `dry_run`
    pub fn procedure_parameter_names(&self) -> Vec<&str> {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .map(|p| p.name.as_str())
            .chain(std::iter::once(Self::DRY_RUN_PARAM))
            .collect()
    }

    /// Logical types matching `procedure_parameter_names`
    pub fn procedure_parameter_types(&self) -> Vec<ParamType> {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .map(|p| p.param_type)
            .chain(std::iter::once(ParamType::Boolean))
            .collect()
    }
}

/// A loaded extension: metadata plus fully resolved components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub name: String,

    pub provider: Provider,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    pub components: Vec<Component>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Extension {
    pub fn new(name: impl Into<String>, provider: Provider) -> Self {
        Self {
            name: name.into(),
            provider,
            icon: None,
            components: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    /// Look up a component by its (un-namespaced) name
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Copy with component names prefixed by the extension name.
    ///
    /// Only the packaged metadata carries namespaced names.
    pub fn namespaced(&self) -> Self {
        let mut ext = self.clone();
        for component in &mut ext.components {
            component.name = format!("{}.{}", self.name, component.name);
        }
        ext
    }

    /// Compact JSON document for the registry table
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// One declared test case of a component (`test/test.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(deserialize_with = "deserialize_test_id")]
    pub id: String,

    #[serde(default)]
    pub inputs: Map<String, Value>,
}

impl TestCase {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inputs: Map::new(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(name.into(), value);
        self
    }

    /// Input value for a parameter; absent and explicit null are the same
    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name).filter(|v| !v.is_null())
    }
}

/// Test ids are written either as strings or as numbers
fn deserialize_test_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_component() -> Component {
        Component::new("buffer", "BUFFER_PROC")
            .with_input(Parameter::new("input_table", ParamType::Table))
            .with_input(Parameter::new("distance", ParamType::Number))
            .with_output(Parameter::new("output_table", ParamType::Table))
    }

    #[test]
    fn textual_types() {
        let textual: Vec<ParamType> = [
            ParamType::Table,
            ParamType::String,
            ParamType::Selection,
            ParamType::Column,
            ParamType::Number,
            ParamType::Boolean,
        ]
        .into_iter()
        .filter(ParamType::is_textual)
        .collect();

        assert_eq!(textual, vec![ParamType::String, ParamType::Selection, ParamType::Column]);
    }

    #[test]
    fn provider_parses_lowercase() {
        let p: Provider = serde_json::from_value(json!("bigquery")).unwrap();
        assert_eq!(p, Provider::BigQuery);
        let p: Provider = serde_json::from_value(json!("snowflake")).unwrap();
        assert_eq!(p, Provider::Snowflake);
        assert!(serde_json::from_value::<Provider>(json!("redshift")).is_err());
    }

    #[test]
    fn procedure_parameter_names_end_with_dry_run() {
        let c = sample_component();
        assert_eq!(
            c.procedure_parameter_names(),
            vec!["input_table", "distance", "output_table", "dry_run"]
        );
        assert_eq!(c.procedure_parameter_types().last(), Some(&ParamType::Boolean));
    }

    #[test]
    fn namespacing_prefixes_component_names() {
        let ext = Extension::new("geo", Provider::BigQuery).with_component(sample_component());
        let namespaced = ext.namespaced();
        assert_eq!(namespaced.components[0].name, "geo.buffer");
        assert_eq!(ext.components[0].name, "buffer");
    }

    #[test]
    fn unknown_component_keys_survive_roundtrip() {
        let raw = json!({
            "name": "buffer",
            "title": "Buffer",
            "procedureName": "BUFFER_PROC",
            "inputs": [{"name": "t", "type": "Table", "title": "Source"}],
            "outputs": [],
        });
        let c: Component = serde_json::from_value(raw).unwrap();
        assert_eq!(c.extra.get("title"), Some(&json!("Buffer")));
        assert_eq!(c.inputs[0].extra.get("title"), Some(&json!("Source")));

        let back = serde_json::to_value(&c).unwrap();
        assert_eq!(back["title"], json!("Buffer"));
        assert_eq!(back["procedureName"], json!("BUFFER_PROC"));
    }

    #[test]
    fn test_case_ids_accept_numbers() {
        let cases: Vec<TestCase> = serde_json::from_value(json!([
            {"id": 1, "inputs": {"a": "x"}},
            {"id": "edge", "inputs": {"a": null}},
        ]))
        .unwrap();
        assert_eq!(cases[0].id, "1");
        assert_eq!(cases[1].id, "edge");
        assert_eq!(cases[0].input("a"), Some(&json!("x")));
        assert_eq!(cases[1].input("a"), None);
        assert_eq!(cases[1].input("missing"), None);
    }
}
