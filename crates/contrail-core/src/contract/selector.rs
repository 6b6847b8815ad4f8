//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Pipeline selector service
//!
//! The service maintains a registry of pipelines with tags and metadata
//! and resolves contracts to pipelines: by exact id when the contract
//! names one, or by evaluating its selector set against every
//! registered pipeline. Registrations happen during orchestrator
//! initialization; all read paths take `&self`, so the service is
//! shared behind an `Arc` once populated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{ContrailError, ContrailResult};

use super::types::{Contract, PipelineSelector, PipelineSelectors, SelectorOperator};

/// A pipeline that contracts can be matched against
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineInfo {
    /// Unique pipeline identifier
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Pipeline type, e.g. `trace`, `metric`, `log`
    #[serde(default, rename = "type")]
    pub pipeline_type: String,

    /// Tag map used by selectors
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// Metadata map used by selectors
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl PipelineInfo {
    /// Create a pipeline entry with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set the pipeline type
    pub fn with_type(mut self, pipeline_type: impl Into<String>) -> Self {
        self.pipeline_type = pipeline_type.into();
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Resolve a selector field path against this pipeline
    fn field_value(&self, field: &str) -> Option<String> {
        let (head, rest) = match field.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (field, None),
        };

        match (head, rest) {
            ("id", None) => Some(self.id.clone()),
            ("name", None) => Some(self.name.clone()),
            ("description", None) => Some(self.description.clone()),
            ("type", None) => Some(self.pipeline_type.clone()),
            ("tags", Some(key)) => self.tags.get(key).cloned(),
            ("metadata", Some(key)) => self.metadata.get(key).cloned(),
            _ => None,
        }
    }
}

/// Registry of pipelines resolvable by id or selector set
#[derive(Debug, Default)]
pub struct PipelineSelectorService {
    /// Registered pipelines in insertion order; insertion order breaks
    /// ties during best-match resolution.
    pipelines: Vec<PipelineInfo>,
}

impl PipelineSelectorService {
    /// Create an empty selector service
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline; re-registering an id replaces the entry in place
    pub fn register(&mut self, pipeline: PipelineInfo) {
        debug!(id = %pipeline.id, "registering pipeline");
        if let Some(existing) = self.pipelines.iter_mut().find(|p| p.id == pipeline.id) {
            *existing = pipeline;
        } else {
            self.pipelines.push(pipeline);
        }
    }

    /// Register multiple pipelines
    pub fn register_all(&mut self, pipelines: impl IntoIterator<Item = PipelineInfo>) {
        for pipeline in pipelines {
            self.register(pipeline);
        }
    }

    /// Look up a pipeline by exact id
    pub fn get(&self, id: &str) -> Option<&PipelineInfo> {
        self.pipelines.iter().find(|p| p.id == id)
    }

    /// All registered pipelines in insertion order
    pub fn list(&self) -> &[PipelineInfo] {
        &self.pipelines
    }

    /// Find every pipeline matching all selectors in the set
    pub fn find_matching(&self, selectors: &PipelineSelectors) -> Vec<&PipelineInfo> {
        if selectors.selectors.is_empty() {
            return Vec::new();
        }
        self.pipelines
            .iter()
            .filter(|pipeline| {
                selectors
                    .selectors
                    .iter()
                    .all(|selector| self.matches_selector(pipeline, selector))
            })
            .collect()
    }

    /// Find the single best matching pipeline across candidate selector sets
    ///
    /// Ties break by higher set priority, then by pipeline insertion
    /// order.
    pub fn find_best_match<'a>(
        &'a self,
        candidates: &[&PipelineSelectors],
    ) -> Option<&'a PipelineInfo> {
        let mut best: Option<(i32, usize)> = None;
        for set in candidates {
            for matched in self.find_matching(set) {
                let position = self
                    .pipelines
                    .iter()
                    .position(|p| p.id == matched.id)
                    .unwrap_or(usize::MAX);
                let candidate = (set.priority, position);
                let better = match best {
                    None => true,
                    Some((priority, pos)) => {
                        candidate.0 > priority || (candidate.0 == priority && candidate.1 < pos)
                    }
                };
                if better {
                    best = Some(candidate);
                }
            }
        }
        best.map(|(_, position)| &self.pipelines[position])
    }

    /// Resolve the pipeline a contract binds to
    ///
    /// Selectors take precedence when both binding forms are present.
    pub fn resolve(&self, contract: &Contract) -> ContrailResult<&PipelineInfo> {
        if let Some(selectors) = contract
            .pipeline_selectors
            .as_ref()
            .filter(|s| !s.selectors.is_empty())
        {
            if contract.pipeline.is_some() {
                warn!(
                    publisher = %contract.publisher,
                    "contract carries both pipeline and pipeline_selectors - using selectors"
                );
            }
            return self.find_best_match(&[selectors]).ok_or_else(|| {
                ContrailError::pipeline_resolution(format!(
                    "no pipeline matched the selectors of contract {}",
                    contract.reference()
                ))
            });
        }

        let id = contract.pipeline.as_deref().unwrap_or_default();
        self.get(id).ok_or_else(|| {
            ContrailError::pipeline_resolution(format!(
                "pipeline {id} referenced by contract {} is not registered",
                contract.reference()
            ))
        })
    }

    fn matches_selector(&self, pipeline: &PipelineInfo, selector: &PipelineSelector) -> bool {
        let Some(actual) = pipeline.field_value(&selector.field) else {
            return false;
        };
        let expected = selector.value.to_string();

        match selector.operator {
            SelectorOperator::Equals => actual == expected,
            SelectorOperator::Matches => match regex::Regex::new(&expected) {
                Ok(re) => re.is_match(&actual),
                Err(e) => {
                    warn!(pattern = %expected, error = %e, "invalid selector pattern");
                    false
                }
            },
            SelectorOperator::Contains => actual.contains(&expected),
            SelectorOperator::StartsWith => actual.starts_with(&expected),
            SelectorOperator::EndsWith => actual.ends_with(&expected),
        }
    }
}
