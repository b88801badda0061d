// ABOUTME: Core workflow data structures and parsing functionality
// ABOUTME: Loads YAML or JSON documents through schema, typed and template validation

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

use super::error::{ParserError, Result};
use super::schema::SchemaValidator;
use crate::actions::SHELL_ACTION;
use crate::matrix::{Matrix, MatrixRule};
use crate::template;

/// Workflow-level properties that templates may reference.
pub const ROOT_PROPERTIES: &[&str] = &["id", "description", "data_root", "output_root"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowDocument {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub matrix: Matrix,
    #[serde(default)]
    pub include: Vec<MatrixRule>,
    #[serde(default)]
    pub exclude: Vec<MatrixRule>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_root: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    #[serde(rename = "with", default, skip_serializing_if = "IndexMap::is_empty")]
    pub inputs: IndexMap<String, Value>,
    #[serde(
        rename = "if",
        default,
        deserialize_with = "deserialize_condition",
        skip_serializing_if = "Option::is_none"
    )]
    pub condition: Option<String>,
    #[serde(with = "humantime_serde", default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

/// `if:` accepts a boolean literal as well as a condition string.
fn deserialize_condition<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Condition {
        Flag(bool),
        Text(String),
    }

    Ok(Option::<Condition>::deserialize(deserializer)?.map(|condition| match condition {
        Condition::Flag(flag) => flag.to_string(),
        Condition::Text(text) => text,
    }))
}

impl Step {
    /// Registry reference of the action backing this step.
    pub fn action_reference(&self) -> &str {
        match (&self.uses, &self.run) {
            (Some(uses), _) => uses,
            _ => SHELL_ACTION,
        }
    }

    pub fn is_shell(&self) -> bool {
        self.uses.is_none() && self.run.is_some()
    }
}

impl WorkflowDocument {
    /// Parse workflow from a YAML or JSON file, chosen by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(ParserError::IoError)?;
        Self::from_str_with_format(&content, Format::from_path(path)?)
    }

    /// Parse workflow from YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let raw: serde_yaml::Value = serde_yaml::from_str(content)?;
        Self::from_value(raw)
    }

    /// Parse workflow from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let json: Value = serde_json::from_str(content)?;
        let raw = serde_yaml::to_value(&json)?;
        Self::from_value(raw)
    }

    /// Validate a raw document and build the typed workflow.
    ///
    /// Schema violations are reported before any template is looked at.
    pub fn from_value(raw: serde_yaml::Value) -> Result<Self> {
        let report = SchemaValidator::new().validate(&raw);
        if !report.is_valid() {
            return Err(ParserError::SchemaError(report));
        }

        let document: WorkflowDocument = serde_yaml::from_value(raw)?;

        let available = template::available_names(&document);
        let diagnostics = template::validate_workflow(&document, &available);
        if !diagnostics.is_empty() {
            return Err(ParserError::TemplateError(diagnostics));
        }

        debug!(
            "Parsed workflow '{}': {} axes, {} steps",
            document.id,
            document.matrix.len(),
            document.steps.len()
        );
        Ok(document)
    }

    fn from_str_with_format(content: &str, format: Format) -> Result<Self> {
        match format {
            Format::Yaml => Self::from_yaml(content),
            Format::Json => Self::from_json(content),
        }
    }

    /// Workflow-level properties in declaration order, unresolved.
    pub fn properties(&self) -> Vec<(String, Value)> {
        let mut properties = vec![
            ("id".to_string(), Value::String(self.id.clone())),
            (
                "description".to_string(),
                Value::String(self.description.clone()),
            ),
        ];
        for (name, template) in self.root_templates() {
            properties.push((name.to_string(), Value::String(template.to_string())));
        }
        properties
    }

    /// The root path templates that are set.
    pub fn root_templates(&self) -> Vec<(&'static str, &str)> {
        [
            ("data_root", self.data_root.as_deref()),
            ("output_root", self.output_root.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, template)| template.map(|t| (name, t)))
        .collect()
    }

    pub fn get_step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.name == name)
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name.as_str()).collect()
    }

    /// Convert workflow back to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(ParserError::YamlError)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
}

impl Format {
    fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            Some("json") => Ok(Format::Json),
            Some(other) => Err(ParserError::UnsupportedFormat(other.to_string())),
            None => Ok(Format::Yaml),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowParser;

impl WorkflowParser {
    pub fn new() -> Self {
        Self
    }

    pub async fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowDocument> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(ParserError::IoError)?;
        WorkflowDocument::from_str_with_format(&content, Format::from_path(path)?)
    }

    pub fn parse_string(&self, content: &str) -> Result<WorkflowDocument> {
        WorkflowDocument::from_yaml(content)
    }
}
