//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Collector configuration model
//!
//! A pipeline configuration mirrors the collector layout: `receivers`,
//! `processors`, and `exporters` sections plus `service.pipelines`
//! entries referencing them by name. Receivers and exporters are opaque
//! to the engine; only processor configurations are interpreted, by
//! name, against the simulator repertoire. Reference integrity is
//! validated and unknown names are rejected.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::error::{ContrailError, ContrailResult};
use crate::types::AttributeValue;

/// Attribute action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeActionKind {
    /// Set only if absent
    Insert,
    /// Set only if present
    Update,
    /// Set unconditionally
    Upsert,
    /// Remove the key
    Delete,
}

/// A single attribute action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeAction {
    /// Attribute key
    pub key: String,

    /// Value to apply; unused by `delete`
    #[serde(default)]
    pub value: Option<AttributeValue>,

    /// Action kind
    pub action: AttributeActionKind,
}

/// Attributes processor configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributesProcessorConfig {
    /// Ordered actions applied to every item's attributes
    #[serde(default)]
    pub actions: Vec<AttributeAction>,
}

/// Name or body synthesis from attributes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NameJoinConfig {
    /// Attributes whose string forms are joined
    #[serde(default)]
    pub from_attributes: Vec<String>,

    /// Join separator; the processor picks its signal-specific default
    #[serde(default)]
    pub separator: Option<String>,
}

/// Attribute copy configuration; pairs `from_attributes[i]` with
/// `to_attributes[i]`, the shorter length prevailing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributeCopyConfig {
    #[serde(default)]
    pub from_attributes: Vec<String>,

    #[serde(default)]
    pub to_attributes: Vec<String>,
}

/// Span sub-rules of the transform processor
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpanTransformConfig {
    #[serde(default)]
    pub name: Option<NameJoinConfig>,
}

/// Trace section of the transform processor
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TraceTransformConfig {
    #[serde(default)]
    pub span: Option<SpanTransformConfig>,
}

/// Metric section of the transform processor
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricTransformConfig {
    #[serde(default)]
    pub name: Option<NameJoinConfig>,
}

/// Log section of the transform processor
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogTransformConfig {
    #[serde(default)]
    pub body: Option<NameJoinConfig>,
}

/// Transform processor configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformProcessorConfig {
    #[serde(default)]
    pub traces: Option<TraceTransformConfig>,

    #[serde(default)]
    pub metrics: Option<MetricTransformConfig>,

    #[serde(default)]
    pub logs: Option<LogTransformConfig>,

    /// Attribute copy applied to every signal
    #[serde(default)]
    pub attributes: Option<AttributeCopyConfig>,
}

/// Filter matching modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    #[default]
    Exact,
    Regexp,
}

/// Attribute key/value matching criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMatch {
    pub key: String,
    pub value: String,
}

/// Filter criteria for one direction (include or exclude)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// How the name lists and attribute values match
    #[serde(default)]
    pub match_type: MatchType,

    /// Service names matched against the resource `service.name`
    #[serde(default)]
    pub services: Vec<String>,

    /// Span name criteria
    #[serde(default)]
    pub span_names: Vec<String>,

    /// Metric name criteria
    #[serde(default)]
    pub metric_names: Vec<String>,

    /// Log body criteria
    #[serde(default)]
    pub log_bodies: Vec<String>,

    /// Attribute criteria; any match counts
    #[serde(default)]
    pub attributes: Vec<AttributeMatch>,
}

impl FilterCriteria {
    /// Whether the criteria constrain anything at all
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
            && self.span_names.is_empty()
            && self.metric_names.is_empty()
            && self.log_bodies.is_empty()
            && self.attributes.is_empty()
    }
}

/// Filter processor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterProcessorConfig {
    /// A matching include keeps an item
    #[serde(default)]
    pub include: Option<FilterCriteria>,

    /// A matching exclude drops an item
    #[serde(default)]
    pub exclude: Option<FilterCriteria>,

    /// Whether drops are enacted or only reported
    #[serde(default = "default_enforce")]
    pub enforce: bool,
}

impl Default for FilterProcessorConfig {
    fn default() -> Self {
        Self {
            include: None,
            exclude: None,
            enforce: default_enforce(),
        }
    }
}

fn default_enforce() -> bool {
    true
}

/// Interpreted processor configuration, dispatched by name
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorConfig {
    Attributes(AttributesProcessorConfig),
    Transform(TransformProcessorConfig),
    Filter(FilterProcessorConfig),
}

impl ProcessorConfig {
    /// Processor kind as named in configuration
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessorConfig::Attributes(_) => "attributes",
            ProcessorConfig::Transform(_) => "transform",
            ProcessorConfig::Filter(_) => "filter",
        }
    }
}

/// A pipeline entry under `service.pipelines`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineEntry {
    #[serde(default)]
    pub receivers: Vec<String>,

    #[serde(default)]
    pub processors: Vec<String>,

    #[serde(default)]
    pub exporters: Vec<String>,
}

/// The `service` section
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceSection {
    #[serde(default)]
    pub pipelines: BTreeMap<String, PipelineEntry>,
}

/// Collector-style pipeline configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Opaque receiver configurations
    #[serde(default)]
    pub receivers: BTreeMap<String, serde_yaml::Value>,

    /// Processor configurations, interpreted by name
    #[serde(default)]
    pub processors: BTreeMap<String, serde_yaml::Value>,

    /// Opaque exporter configurations
    #[serde(default)]
    pub exporters: BTreeMap<String, serde_yaml::Value>,

    /// Service section referencing the components by name
    #[serde(default)]
    pub service: ServiceSection,
}

impl CollectorConfig {
    /// Parse a configuration from YAML text
    pub fn from_yaml(data: &str) -> ContrailResult<Self> {
        serde_yaml::from_str(data).map_err(|e| {
            ContrailError::serialization_with_source("failed to parse collector configuration", e)
        })
    }

    /// Load a configuration from a file
    pub fn load_from_file(path: &Path) -> ContrailResult<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            ContrailError::configuration_with_source(
                format!("failed to read configuration file {}", path.display()),
                e,
            )
        })?;
        let config = Self::from_yaml(&data)?;
        debug!(file = %path.display(), "loaded collector configuration");
        Ok(config)
    }

    /// Merge another configuration over this one; the override wins per
    /// section key
    pub fn merge(mut self, other: CollectorConfig) -> CollectorConfig {
        self.receivers.extend(other.receivers);
        self.processors.extend(other.processors);
        self.exporters.extend(other.exporters);
        self.service.pipelines.extend(other.service.pipelines);
        self
    }

    /// Validate reference integrity of every pipeline entry
    pub fn validate(&self) -> ContrailResult<()> {
        let mut errors = Vec::new();

        if self.service.pipelines.is_empty() {
            errors.push("service.pipelines section is required".to_string());
        }

        for (name, entry) in &self.service.pipelines {
            for receiver in &entry.receivers {
                if !self.receivers.contains_key(receiver) {
                    errors.push(format!(
                        "pipeline {name}: receiver '{receiver}' not found in receivers section"
                    ));
                }
            }
            for processor in &entry.processors {
                if !self.processors.contains_key(processor) {
                    errors.push(format!(
                        "pipeline {name}: processor '{processor}' not found in processors section"
                    ));
                }
            }
            for exporter in &entry.exporters {
                if !self.exporters.contains_key(exporter) {
                    errors.push(format!(
                        "pipeline {name}: exporter '{exporter}' not found in exporters section"
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ContrailError::configuration(errors.join("; ")))
        }
    }

    /// Interpret a named processor configuration
    ///
    /// The processor kind is the name up to an optional `/` suffix,
    /// following the collector's `type/instance` naming convention.
    pub fn processor_config(&self, name: &str) -> ContrailResult<ProcessorConfig> {
        let raw = self.processors.get(name).ok_or_else(|| {
            ContrailError::configuration(format!("processor '{name}' is not configured"))
        })?;

        let kind = name.split('/').next().unwrap_or(name);
        match kind {
            "attributes" => serde_yaml::from_value(raw.clone())
                .map(ProcessorConfig::Attributes)
                .map_err(|e| {
                    ContrailError::configuration_with_source(
                        format!("invalid attributes processor configuration '{name}'"),
                        e,
                    )
                }),
            "transform" => serde_yaml::from_value(raw.clone())
                .map(ProcessorConfig::Transform)
                .map_err(|e| {
                    ContrailError::configuration_with_source(
                        format!("invalid transform processor configuration '{name}'"),
                        e,
                    )
                }),
            "filter" => serde_yaml::from_value(raw.clone())
                .map(ProcessorConfig::Filter)
                .map_err(|e| {
                    ContrailError::configuration_with_source(
                        format!("invalid filter processor configuration '{name}'"),
                        e,
                    )
                }),
            other => Err(ContrailError::configuration(format!(
                "unknown processor type '{other}' for processor '{name}'"
            ))),
        }
    }

    /// Resolve the interpreted processor chain for a pipeline entry
    pub fn processor_chain(&self, pipeline: &str) -> ContrailResult<Vec<ProcessorConfig>> {
        let entry = self.service.pipelines.get(pipeline).ok_or_else(|| {
            ContrailError::configuration(format!("pipeline '{pipeline}' is not configured"))
        })?;

        entry
            .processors
            .iter()
            .map(|name| self.processor_config(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIG: &str = r#"
receivers:
  otlp:
    protocols:
      grpc: {}
processors:
  attributes/env:
    actions:
      - key: environment
        value: production
        action: insert
  transform:
    traces:
      span:
        name:
          from_attributes: [http.method, http.route]
  filter/errors:
    exclude:
      match_type: regexp
      span_names: ["^internal.*"]
exporters:
  debug: {}
service:
  pipelines:
    traces:
      receivers: [otlp]
      processors: [attributes/env, transform, filter/errors]
      exporters: [debug]
"#;

    #[test]
    fn test_parse_and_validate() {
        let config = CollectorConfig::from_yaml(SAMPLE_CONFIG).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.service.pipelines["traces"].processors.len(), 3);
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let doc = r#"
processors:
  attributes: {}
service:
  pipelines:
    traces:
      processors: [attributes, missing]
"#;
        let config = CollectorConfig::from_yaml(doc).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("'missing' not found"));
    }

    #[test]
    fn test_missing_pipelines_rejected() {
        let config = CollectorConfig::from_yaml("receivers: {}").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("service.pipelines"));
    }

    #[test]
    fn test_processor_dispatch_by_name_prefix() {
        let config = CollectorConfig::from_yaml(SAMPLE_CONFIG).unwrap();

        let attributes = config.processor_config("attributes/env").unwrap();
        match attributes {
            ProcessorConfig::Attributes(cfg) => {
                assert_eq!(cfg.actions.len(), 1);
                assert_eq!(cfg.actions[0].action, AttributeActionKind::Insert);
            }
            other => panic!("expected attributes config, got {:?}", other),
        }

        let transform = config.processor_config("transform").unwrap();
        match transform {
            ProcessorConfig::Transform(cfg) => {
                let join = cfg.traces.unwrap().span.unwrap().name.unwrap();
                assert_eq!(join.from_attributes, vec!["http.method", "http.route"]);
            }
            other => panic!("expected transform config, got {:?}", other),
        }

        let filter = config.processor_config("filter/errors").unwrap();
        match filter {
            ProcessorConfig::Filter(cfg) => {
                assert!(cfg.enforce);
                assert_eq!(cfg.exclude.unwrap().match_type, MatchType::Regexp);
            }
            other => panic!("expected filter config, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_processor_type() {
        let doc = r#"
processors:
  batch: {}
service:
  pipelines:
    traces:
      processors: [batch]
"#;
        let config = CollectorConfig::from_yaml(doc).unwrap();
        let err = config.processor_config("batch").unwrap_err();
        assert!(err.to_string().contains("unknown processor type"));
    }

    #[test]
    fn test_processor_chain_order() {
        let config = CollectorConfig::from_yaml(SAMPLE_CONFIG).unwrap();
        let chain = config.processor_chain("traces").unwrap();
        let kinds: Vec<_> = chain.iter().map(|p| p.kind()).collect();
        assert_eq!(kinds, vec!["attributes", "transform", "filter"]);
    }

    #[test]
    fn test_merge_override_wins() {
        let base = CollectorConfig::from_yaml(SAMPLE_CONFIG).unwrap();
        let overlay = CollectorConfig::from_yaml(
            r#"
processors:
  transform:
    logs:
      body:
        from_attributes: [log.level]
"#,
        )
        .unwrap();

        let merged = base.merge(overlay);
        let transform = merged.processor_config("transform").unwrap();
        match transform {
            ProcessorConfig::Transform(cfg) => {
                assert!(cfg.traces.is_none());
                assert!(cfg.logs.is_some());
            }
            other => panic!("expected transform config, got {:?}", other),
        }
    }
}
