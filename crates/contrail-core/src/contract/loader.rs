//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Contract loading and structural validation
//!
//! Contracts load from files, directories (recursively, `.yaml`/`.yml`),
//! or glob patterns. Partial success is the normal mode: files that fail
//! to parse or validate are reported alongside the contracts that
//! loaded, and the remaining contracts still run.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{ContrailError, ContrailResult};

use super::types::{Contract, Filter, Inputs, Matchers, TimeWindow};

/// Top-level document keys the schema defines; anything else is
/// tolerated for forward compatibility but surfaced as a diagnostic.
const KNOWN_DOCUMENT_KEYS: &[&str] = &[
    "publisher",
    "version",
    "description",
    "pipeline",
    "pipeline_selectors",
    "inputs",
    "filters",
    "validation_rules",
    "matchers",
    "time_windows",
];

/// Outcome of loading a set of contract paths
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Contracts that parsed and validated
    pub contracts: Vec<Contract>,

    /// Per-file load failures
    pub errors: Vec<ContrailError>,
}

/// Contract loader
#[derive(Debug, Default)]
pub struct Loader;

impl Loader {
    /// Create a new contract loader
    pub fn new() -> Self {
        Self
    }

    /// Load contracts from the given file paths, directories, or glob patterns
    pub fn load_from_paths<P: AsRef<str>>(&self, paths: &[P]) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();
        for path in paths {
            self.load_path(path.as_ref(), &mut outcome);
        }
        debug!(
            loaded = outcome.contracts.len(),
            failed = outcome.errors.len(),
            "contract loading finished"
        );
        outcome
    }

    fn load_path(&self, path: &str, outcome: &mut LoadOutcome) {
        if path.contains('*') {
            self.load_glob(path, outcome);
            return;
        }

        let p = Path::new(path);
        if p.is_dir() {
            self.load_directory(p, outcome);
        } else {
            match self.load_file(p) {
                Ok(contract) => outcome.contracts.push(contract),
                Err(e) => outcome.errors.push(e),
            }
        }
    }

    fn load_glob(&self, pattern: &str, outcome: &mut LoadOutcome) {
        let entries = match glob::glob(pattern) {
            Ok(entries) => entries,
            Err(e) => {
                outcome.errors.push(ContrailError::contract_with_source(
                    format!("invalid glob pattern {pattern}"),
                    e,
                ));
                return;
            }
        };

        for entry in entries {
            match entry {
                Ok(path) => match self.load_file(&path) {
                    Ok(contract) => outcome.contracts.push(contract),
                    Err(e) => outcome.errors.push(e),
                },
                Err(e) => outcome.errors.push(ContrailError::contract_with_source(
                    format!("failed to expand glob pattern {pattern}"),
                    e,
                )),
            }
        }
    }

    fn load_directory(&self, dir: &Path, outcome: &mut LoadOutcome) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                outcome.errors.push(ContrailError::contract_with_source(
                    format!("failed to read directory {}", dir.display()),
                    e,
                ));
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                self.load_directory(&path, outcome);
                continue;
            }
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
                .unwrap_or(false);
            if is_yaml {
                match self.load_file(&path) {
                    Ok(contract) => outcome.contracts.push(contract),
                    Err(e) => outcome.errors.push(e),
                }
            }
        }
    }

    /// Load and validate a single contract file
    pub fn load_file(&self, path: &Path) -> ContrailResult<Contract> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            ContrailError::contract_with_source(
                format!("failed to read contract file {}", path.display()),
                e,
            )
        })?;

        self.report_unknown_keys(&data, path);

        let mut contract: Contract = serde_yaml::from_str(&data).map_err(|e| {
            ContrailError::serialization_with_source(
                format!("failed to parse contract {}", path.display()),
                e,
            )
        })?;
        contract.file_path = path.display().to_string();

        let errors = self.validate_contract(&contract);
        if !errors.is_empty() {
            return Err(ContrailError::contract(format!(
                "contract validation failed for {}: {}",
                path.display(),
                errors.join("; ")
            )));
        }

        debug!(
            publisher = %contract.publisher,
            version = %contract.version,
            file = %contract.file_path,
            "loaded contract"
        );
        Ok(contract)
    }

    fn report_unknown_keys(&self, data: &str, path: &Path) {
        let Ok(raw) = serde_yaml::from_str::<serde_yaml::Value>(data) else {
            return;
        };
        let Some(mapping) = raw.as_mapping() else {
            return;
        };
        for key in mapping.keys() {
            if let Some(key) = key.as_str() {
                if !KNOWN_DOCUMENT_KEYS.contains(&key) {
                    warn!(file = %path.display(), key, "ignoring unknown contract field");
                }
            }
        }
    }

    /// Validate a contract's structure, returning every violation found
    pub fn validate_contract(&self, contract: &Contract) -> Vec<String> {
        let mut errors = Vec::new();

        if contract.publisher.is_empty() {
            errors.push("publisher is required".to_string());
        }
        if contract.version.is_empty() {
            errors.push("version is required".to_string());
        }

        self.validate_pipeline_binding(contract, &mut errors);
        self.validate_inputs(&contract.inputs, &mut errors);
        self.validate_filters(&contract.filters, &mut errors);
        self.validate_matchers(&contract.matchers, &mut errors);
        self.validate_time_windows(&contract.time_windows, &mut errors);

        errors
    }

    fn validate_pipeline_binding(&self, contract: &Contract, errors: &mut Vec<String>) {
        let has_pipeline = contract.pipeline.as_deref().map(|p| !p.is_empty()).unwrap_or(false);
        if !has_pipeline && !contract.has_pipeline_selectors() {
            errors.push("either pipeline or pipeline_selectors must be specified".to_string());
        }
        if has_pipeline && contract.has_pipeline_selectors() {
            warn!(
                publisher = %contract.publisher,
                "both pipeline and pipeline_selectors were provided - selectors take precedence"
            );
        }
    }

    fn validate_inputs(&self, inputs: &Inputs, errors: &mut Vec<String>) {
        if inputs.is_empty() {
            errors.push(
                "at least one input type (traces, metrics, or logs) must be specified".to_string(),
            );
        }

        for (i, trace) in inputs.traces.iter().enumerate() {
            if trace.span_name.is_empty() {
                errors.push(format!("trace input {i}: span_name is required"));
            }
        }
        for (i, metric) in inputs.metrics.iter().enumerate() {
            if metric.name.is_empty() {
                errors.push(format!("metric input {i}: name is required"));
            }
            if metric.value.is_null() {
                errors.push(format!("metric input {i}: value is required"));
            }
        }
        for (i, log) in inputs.logs.iter().enumerate() {
            if log.body.is_empty() {
                errors.push(format!("log input {i}: body is required"));
            }
        }
    }

    fn validate_filters(&self, filters: &[Filter], errors: &mut Vec<String>) {
        for (i, filter) in filters.iter().enumerate() {
            if filter.field.is_empty() {
                errors.push(format!("filter {i}: field is required"));
            }
            if filter.operator.requires_value() && filter.value.is_none() {
                errors.push(format!(
                    "filter {i}: value is required for operator {}",
                    filter.operator.as_str()
                ));
            }
        }
    }

    fn validate_matchers(&self, matchers: &Matchers, errors: &mut Vec<String>) {
        if matchers.is_empty() {
            errors.push(
                "at least one matcher type (traces, metrics, or logs) must be specified"
                    .to_string(),
            );
        }

        for (i, matcher) in matchers.traces.iter().enumerate() {
            if !matcher.constrains_any() {
                errors.push(format!("trace matcher {i}: at least one field must be specified"));
            }
        }
        for (i, matcher) in matchers.metrics.iter().enumerate() {
            if !matcher.constrains_any() {
                errors.push(format!(
                    "metric matcher {i}: at least one field must be specified"
                ));
            }
        }
        for (i, matcher) in matchers.logs.iter().enumerate() {
            if !matcher.constrains_any() {
                errors.push(format!("log matcher {i}: at least one field must be specified"));
            }
        }
    }

    fn validate_time_windows(&self, windows: &[TimeWindow], errors: &mut Vec<String>) {
        for (i, window) in windows.iter().enumerate() {
            if window.aggregation.is_empty() {
                errors.push(format!("time window {i}: aggregation is required"));
            }
            if window.duration.is_empty() {
                errors.push(format!("time window {i}: duration is required"));
            }
            if window.expected_behavior.is_empty() {
                errors.push(format!("time window {i}: expected_behavior is required"));
            }
        }
    }

    /// Group contracts by publisher
    pub fn group_by_publisher(contracts: &[Contract]) -> BTreeMap<String, Vec<&Contract>> {
        let mut groups: BTreeMap<String, Vec<&Contract>> = BTreeMap::new();
        for contract in contracts {
            groups
                .entry(contract.publisher.clone())
                .or_default()
                .push(contract);
        }
        groups
    }

    /// Group contracts by `publisher/pipeline`
    pub fn group_by_publisher_pipeline(contracts: &[Contract]) -> BTreeMap<String, Vec<&Contract>> {
        let mut groups: BTreeMap<String, Vec<&Contract>> = BTreeMap::new();
        for contract in contracts {
            let key = format!(
                "{}/{}",
                contract.publisher,
                contract.pipeline.as_deref().unwrap_or("")
            );
            groups.entry(key).or_default().push(contract);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID_CONTRACT: &str = r#"
publisher: checkout-team
version: "1.0.0"
pipeline: trace-prod
inputs:
  traces:
    - span_name: "POST /checkout"
matchers:
  traces:
    - span_name: "POST /checkout"
"#;

    fn write_contract(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_contract(dir.path(), "checkout.yaml", VALID_CONTRACT);

        let loader = Loader::new();
        let outcome = loader.load_from_paths(&[path.to_str().unwrap()]);
        assert_eq!(outcome.contracts.len(), 1);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.contracts[0].file_path, path.display().to_string());
    }

    #[test]
    fn test_load_directory_partial_success() {
        let dir = tempfile::tempdir().unwrap();
        write_contract(dir.path(), "good.yaml", VALID_CONTRACT);
        write_contract(dir.path(), "bad.yaml", "publisher: p\nversion: \"1\"\n");
        write_contract(dir.path(), "ignored.txt", "not yaml");

        let loader = Loader::new();
        let outcome = loader.load_from_paths(&[dir.path().to_str().unwrap()]);
        assert_eq!(outcome.contracts.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn test_load_glob_pattern() {
        let dir = tempfile::tempdir().unwrap();
        write_contract(dir.path(), "a.yaml", VALID_CONTRACT);
        write_contract(dir.path(), "b.yaml", VALID_CONTRACT);

        let loader = Loader::new();
        let pattern = format!("{}/*.yaml", dir.path().display());
        let outcome = loader.load_from_paths(&[pattern.as_str()]);
        assert_eq!(outcome.contracts.len(), 2);
    }

    #[test]
    fn test_structural_validation_missing_binding() {
        let doc = r#"
publisher: p
version: "1"
inputs:
  logs:
    - body: hello
matchers:
  logs:
    - body: hello
"#;
        let contract: Contract = serde_yaml::from_str(doc).unwrap();
        let errors = Loader::new().validate_contract(&contract);
        assert!(errors
            .iter()
            .any(|e| e.contains("pipeline or pipeline_selectors")));
    }

    #[test]
    fn test_structural_validation_reports_all_errors() {
        let doc = r#"
publisher: ""
version: ""
inputs: {}
matchers: {}
"#;
        let contract: Contract = serde_yaml::from_str(doc).unwrap();
        let errors = Loader::new().validate_contract(&contract);
        assert!(errors.len() >= 4);
    }

    #[test]
    fn test_filter_operator_value_requirement() {
        let doc = r#"
publisher: p
version: "1"
pipeline: x
inputs:
  logs:
    - body: hello
filters:
  - field: span.service.name
    operator: equals
  - field: span.attributes.debug
    operator: not_exists
matchers:
  logs:
    - body: hello
"#;
        let contract: Contract = serde_yaml::from_str(doc).unwrap();
        let errors = Loader::new().validate_contract(&contract);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("filter 0"));
    }

    #[test]
    fn test_group_by_publisher() {
        let mk = |publisher: &str, pipeline: &str| {
            let mut contract: Contract = serde_yaml::from_str(VALID_CONTRACT).unwrap();
            contract.publisher = publisher.to_string();
            contract.pipeline = Some(pipeline.to_string());
            contract
        };
        let contracts = vec![mk("a", "p1"), mk("a", "p2"), mk("b", "p1")];

        let by_publisher = Loader::group_by_publisher(&contracts);
        assert_eq!(by_publisher.get("a").unwrap().len(), 2);
        assert_eq!(by_publisher.get("b").unwrap().len(), 1);

        let by_pipeline = Loader::group_by_publisher_pipeline(&contracts);
        assert_eq!(by_pipeline.get("a/p1").unwrap().len(), 1);
        assert_eq!(by_pipeline.get("a/p2").unwrap().len(), 1);
        assert_eq!(by_pipeline.get("b/p1").unwrap().len(), 1);
    }
}
