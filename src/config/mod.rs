//! Pipeline description files
//!
//! A pipeline is described in TOML: the execution strategy, the component
//! instances with their property values, and the connections between their
//! ports.
//!
//! # Example
//!
//! ```toml
//! [execution]
//! mode = "event_loop"      # or "threaded"
//! join_mode = "any"        # default for every handler
//!
//! [[component]]
//! name = "gray"
//! kind = "CvColorConv"
//! properties = { type = "RGB2GRAY" }
//!
//! [[component]]
//! name = "bin"
//! kind = "CvThreshold"
//! [component.properties]
//! thresh = 0.4
//!
//! [[connection]]
//! from = "gray.out_img"
//! to = "bin.in_img"
//!
//! [source]
//! target = "gray.in_img"
//! frames = 10
//! ```
//!
//! Property values may be written as TOML strings, integers, floats or
//! booleans; they are stringified and parsed by each property's translator.

use crate::error::{Result, ResultExt, VisflowError};
use crate::pipeline::executor::split_address;
use crate::pipeline::{Catalog, JoinMode, Pipeline};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// How the built pipeline is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One event loop on the calling thread.
    #[default]
    EventLoop,
    /// One worker thread per component.
    Threaded,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,

    #[serde(default)]
    pub join_mode: JoinMode,
}

/// One component instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentConfig {
    pub name: String,
    pub kind: String,

    #[serde(default)]
    pub properties: toml::Table,
}

impl ComponentConfig {
    /// Property values as strings, in key order.
    pub fn property_strings(&self) -> Result<Vec<(String, String)>> {
        self.properties
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    toml::Value::String(s) => s.clone(),
                    toml::Value::Integer(i) => i.to_string(),
                    toml::Value::Float(f) => f.to_string(),
                    toml::Value::Boolean(b) => b.to_string(),
                    other => {
                        return Err(VisflowError::Config(format!(
                            "Property '{}.{}' must be a scalar, got {}",
                            self.name,
                            key,
                            other.type_str()
                        )))
                    }
                };
                Ok((key.clone(), text))
            })
            .collect()
    }
}

/// Link from an output to an input, as `component.port` addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub from: String,
    pub to: String,
}

/// Synthetic frame feed used by the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Input the frames are written to.
    pub target: String,

    #[serde(default = "default_frames")]
    pub frames: usize,

    #[serde(default = "default_width")]
    pub width: usize,

    #[serde(default = "default_height")]
    pub height: usize,

    #[serde(default = "default_channels")]
    pub channels: usize,
}

fn default_frames() -> usize {
    10
}

fn default_width() -> usize {
    64
}

fn default_height() -> usize {
    48
}

fn default_channels() -> usize {
    3
}

/// A complete pipeline description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default, rename = "component")]
    pub components: Vec<ComponentConfig>,

    #[serde(default, rename = "connection")]
    pub connections: Vec<ConnectionConfig>,

    #[serde(default)]
    pub source: Option<SourceConfig>,
}

impl PipelineConfig {
    /// Read and validate a pipeline file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            VisflowError::Config(format!("Failed to read pipeline file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content).with_context(|| format!("In {:?}", path))
    }

    /// Parse and validate a pipeline description.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check names and addresses without building anything.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for component in &self.components {
            if component.name.trim().is_empty() {
                return Err(VisflowError::Config(format!(
                    "Component of kind '{}' has an empty name",
                    component.kind
                )));
            }
            if !names.insert(component.name.as_str()) {
                return Err(VisflowError::Config(format!(
                    "Duplicate component name '{}'",
                    component.name
                )));
            }
        }

        let check = |address: &str| -> Result<()> {
            let (component, _) = split_address(address)?;
            if !names.contains(component) {
                return Err(VisflowError::Config(format!(
                    "'{}' refers to undeclared component '{}'",
                    address, component
                )));
            }
            Ok(())
        };
        for connection in &self.connections {
            check(&connection.from)?;
            check(&connection.to)?;
        }
        if let Some(source) = &self.source {
            check(&source.target).context("Invalid [source] target")?;
        }
        Ok(())
    }

    /// Instantiate, configure, prepare and connect every component.
    ///
    /// The returned pipeline is wired but every component is still
    /// `Created`.
    pub fn build(&self, catalog: &Catalog) -> Result<Pipeline> {
        self.validate()?;
        let mut pipeline = Pipeline::with_join_mode(self.execution.join_mode);

        for component in &self.components {
            let context = || format!("Component '{}'", component.name);
            pipeline
                .instantiate(catalog, &component.kind, &component.name)
                .with_context(context)?;
            let settings = component.property_strings()?;
            pipeline
                .configure(
                    &component.name,
                    settings.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                )
                .with_context(context)?;
        }

        pipeline.prepare_all()?;

        for connection in &self.connections {
            pipeline
                .connect(&connection.from, &connection.to)
                .with_context(|| format!("Connection {} -> {}", connection.from, connection.to))?;
        }

        tracing::info!(
            "Built pipeline: {} components, {} connections",
            self.components.len(),
            self.connections.len()
        );
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::builtin_catalog;
    use crate::pipeline::PipelineError;

    const SAMPLE: &str = r#"
        [execution]
        mode = "threaded"
        join_mode = "all"

        [[component]]
        name = "gray"
        kind = "CvColorConv"
        properties = { type = "BGR2GRAY" }

        [[component]]
        name = "bin"
        kind = "CvThreshold"
        [component.properties]
        thresh = 0.25
        otsu = true

        [[connection]]
        from = "gray.out_img"
        to = "bin.in_img"

        [source]
        target = "gray.in_img"
        frames = 3
    "#;

    #[test]
    fn test_parse_sample() {
        let config = PipelineConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.execution.mode, ExecutionMode::Threaded);
        assert_eq!(config.execution.join_mode, JoinMode::All);
        assert_eq!(config.components.len(), 2);
        assert_eq!(
            config.components[1].property_strings().unwrap(),
            vec![
                ("otsu".to_string(), "true".to_string()),
                ("thresh".to_string(), "0.25".to_string())
            ]
        );
        let source = config.source.unwrap();
        assert_eq!(source.frames, 3);
        assert_eq!(source.width, 64);
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config.execution.mode, ExecutionMode::EventLoop);
        assert_eq!(config.execution.join_mode, JoinMode::Any);
        assert!(config.components.is_empty());
        assert!(config.source.is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let toml = r#"
            [[component]]
            name = "a"
            kind = "CvSplit"
            [[component]]
            name = "a"
            kind = "CvSplit"
        "#;
        assert!(matches!(
            PipelineConfig::from_toml_str(toml),
            Err(VisflowError::Config(msg)) if msg.contains("Duplicate")
        ));
    }

    #[test]
    fn test_malformed_address_rejected() {
        let toml = r#"
            [[component]]
            name = "a"
            kind = "CvSplit"
            [[connection]]
            from = "a"
            to = "a.in_img"
        "#;
        let err = PipelineConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(
            err.pipeline_error(),
            Some(PipelineError::InvalidAddress(addr)) if addr == "a"
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
            [[component]]
            name = "a"
            kind = "CvSplit"
            colour = "red"
        "#;
        assert!(matches!(
            PipelineConfig::from_toml_str(toml),
            Err(VisflowError::Toml(_))
        ));
    }

    #[test]
    fn test_non_scalar_property_rejected() {
        let toml = r#"
            [[component]]
            name = "a"
            kind = "CvSplit"
            properties = { channels = [1, 2] }
        "#;
        let config = PipelineConfig::from_toml_str(toml).unwrap();
        assert!(config.components[0].property_strings().is_err());
    }

    #[test]
    fn test_build_applies_properties() {
        let config = PipelineConfig::from_toml_str(SAMPLE).unwrap();
        let pipeline = config.build(&builtin_catalog().unwrap()).unwrap();
        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline.property("gray", "type").unwrap(), "BGR2GRAY");
        assert_eq!(pipeline.property("bin", "thresh").unwrap(), "0.25");
        assert_eq!(pipeline.default_join_mode(), JoinMode::All);
    }

    #[test]
    fn test_build_unknown_kind() {
        let toml = r#"
            [[component]]
            name = "cam"
            kind = "CameraSource"
        "#;
        let config = PipelineConfig::from_toml_str(toml).unwrap();
        let err = config.build(&builtin_catalog().unwrap()).unwrap_err();
        assert!(matches!(
            err.pipeline_error(),
            Some(PipelineError::UnknownKind(kind)) if kind == "CameraSource"
        ));
    }
}
