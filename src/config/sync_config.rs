use crate::adapters::local_store::TABLE_EXTENSIONS;
use crate::domain::model::{DuplicatePolicy, HeaderMatching, JobKind, JobSpec};
use crate::domain::ports::TableTarget;
use crate::utils::error::{SyncError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub sync: SyncInfo,
    pub source: SourceConfig,
    #[serde(default)]
    pub destination: DestinationConfig,
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncInfo {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    #[serde(default = "default_identifier_column")]
    pub identifier_column: String,
    #[serde(default = "default_value_column")]
    pub value_column: String,
    #[serde(default = "default_value_column_qualifier")]
    pub value_column_qualifier: Option<String>,
    #[serde(default = "default_aggregate_markers")]
    pub aggregate_markers: Vec<String>,
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    #[serde(default = "default_true")]
    pub require_non_empty: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Base directory for relative job paths.
    pub root: Option<PathBuf>,
    #[serde(default = "default_date_column")]
    pub date_column: String,
    #[serde(default)]
    pub header_matching: HeaderMatching,
}

fn default_identifier_column() -> String {
    "Ticker".to_string()
}

fn default_value_column() -> String {
    "(M USD)".to_string()
}

fn default_value_column_qualifier() -> Option<String> {
    Some("Flow".to_string())
}

fn default_aggregate_markers() -> Vec<String> {
    vec!["Median".to_string()]
}

fn default_date_column() -> String {
    "Date".to_string()
}

fn default_true() -> bool {
    true
}

impl SourceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            identifier_column: default_identifier_column(),
            value_column: default_value_column(),
            value_column_qualifier: default_value_column_qualifier(),
            aggregate_markers: default_aggregate_markers(),
            duplicate_policy: DuplicatePolicy::default(),
            require_non_empty: true,
        }
    }

    pub fn is_aggregate_marker(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();
        self.aggregate_markers.iter().any(|m| m.trim() == identifier)
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            root: None,
            date_column: default_date_column(),
            header_matching: HeaderMatching::default(),
        }
    }
}

impl SyncConfig {
    /// Loads the config from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SyncError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parses TOML text, after `${VAR}` substitution.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| SyncError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| SyncError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Resolves a job's file against `destination.root`.
    pub fn target_for(&self, job: &JobSpec) -> TableTarget {
        let path = match &self.destination.root {
            Some(root) if job.path.is_relative() => root.join(&job.path),
            _ => job.path.clone(),
        };
        TableTarget::new(path, job.table.clone())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_path("source.path", &self.source.path)?;
        validation::validate_non_empty_string("source.identifier_column", &self.source.identifier_column)?;
        validation::validate_non_empty_string("source.value_column", &self.source.value_column)?;
        validation::validate_non_empty_string("destination.date_column", &self.destination.date_column)?;

        if self.jobs.is_empty() {
            return Err(SyncError::ConfigValidationError {
                field: "jobs".to_string(),
                message: "At least one job is required".to_string(),
            });
        }

        let names: Vec<String> = self.jobs.iter().map(JobSpec::display_name).collect();
        validation::validate_unique("jobs.name", names.iter().map(String::as_str))?;

        for job in &self.jobs {
            validate_job(job)?;
        }

        Ok(())
    }
}

fn validate_job(job: &JobSpec) -> Result<()> {
    let name = job.display_name();
    let field = |suffix: &str| format!("jobs[{}].{}", name, suffix);

    validation::validate_path(&field("path"), &job.path)?;
    validation::validate_file_extension(&field("path"), &job.path, TABLE_EXTENSIONS)?;

    let is_csv = job
        .path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if !is_csv {
        let table = validation::validate_required_field(&field("table"), &job.table)?;
        validation::validate_non_empty_string(&field("table"), table)?;
    }

    match &job.kind {
        JobKind::Complex { mapping } => {
            if mapping.is_empty() {
                return Err(SyncError::ConfigValidationError {
                    field: field("mapping"),
                    message: "Complex jobs need at least one column mapping".to_string(),
                });
            }
            for (column, identifier) in mapping {
                validation::validate_non_empty_string(&field("mapping"), column)?;
                validation::validate_non_empty_string(&field(&format!("mapping.{}", column)), identifier)?;
            }
        }
        JobKind::Simple {
            identifier,
            flow_column,
        } => {
            validation::validate_non_empty_string(&field("identifier"), identifier)?;
            validation::validate_non_empty_string(&field("flow_column"), flow_column)?;
        }
    }

    let stats_enabled = job.statistics.as_ref().map(|s| s.enabled).unwrap_or(false);
    if stats_enabled && job.adjusted_total_column.is_none() {
        return Err(SyncError::MissingConfigError {
            field: field("adjusted_total_column (required by statistics)"),
        });
    }

    Ok(())
}

impl Validate for SyncConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[sync]
name = "etf-flows"

[source]
path = "ETF1_uf4xn3oe.xlsx"

[destination]
root = "./flows"

[[jobs]]
name = "S&P 500 ETF"
kind = "complex"
path = "Flows-2.xlsx"
table = "S&P 500 ETF"
adjusted_total_column = "Adjusted Total Flow"
mapping = { "SPY " = "SPY US", "IVV " = "IVV US" }

[jobs.statistics]
vwap_column = "SPxVWAP"

[[jobs]]
kind = "simple"
path = "Flows-2 - IBIT.csv"
identifier = "IBIT US"
flow_column = "Flow"
"#;

    #[test]
    fn test_parse_jobs_and_defaults() {
        let config = SyncConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.sync.name, "etf-flows");
        assert_eq!(config.source.identifier_column, "Ticker");
        assert_eq!(config.source.value_column, "(M USD)");
        assert_eq!(config.source.duplicate_policy, DuplicatePolicy::LastSeen);
        assert_eq!(config.destination.date_column, "Date");
        assert_eq!(config.destination.header_matching, HeaderMatching::Exact);
        assert_eq!(config.jobs.len(), 2);

        match &config.jobs[0].kind {
            JobKind::Complex { mapping } => {
                assert_eq!(mapping.get("SPY ").map(String::as_str), Some("SPY US"));
                assert_eq!(mapping.len(), 2);
            }
            other => panic!("unexpected job kind: {:?}", other),
        }
        let stats = config.jobs[0].statistics.as_ref().unwrap();
        assert!(stats.enabled);
        assert_eq!(stats.vwap_column.as_deref(), Some("SPxVWAP"));

        assert_eq!(config.jobs[1].display_name(), "Flows-2 - IBIT");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_target_for_resolves_against_root() {
        let config = SyncConfig::from_toml_str(BASIC).unwrap();
        let target = config.target_for(&config.jobs[0]);
        assert_eq!(target.path, Path::new("./flows").join("Flows-2.xlsx"));
        assert_eq!(target.table.as_deref(), Some("S&P 500 ETF"));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("FLOW_SYNC_TEST_SOURCE", "/data/ETF1.xlsx");

        let toml_content = r#"
[source]
path = "${FLOW_SYNC_TEST_SOURCE}"

[[jobs]]
kind = "simple"
path = "IBIT.csv"
identifier = "IBIT US"
flow_column = "Flow"
"#;

        let config = SyncConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.source.path, PathBuf::from("/data/ETF1.xlsx"));

        std::env::remove_var("FLOW_SYNC_TEST_SOURCE");
    }

    #[test]
    fn test_config_validation_failures() {
        let no_jobs = r#"
[source]
path = "ETF1.xlsx"
"#;
        assert!(SyncConfig::from_toml_str(no_jobs).unwrap().validate().is_err());

        let workbook_without_table = r#"
[source]
path = "ETF1.xlsx"

[[jobs]]
kind = "simple"
path = "Flows-2.xlsx"
identifier = "IBIT US"
flow_column = "Flow"
"#;
        let err = SyncConfig::from_toml_str(workbook_without_table)
            .unwrap()
            .validate()
            .unwrap_err();
        assert!(matches!(err, SyncError::MissingConfigError { .. }));

        let empty_mapping = r#"
[source]
path = "ETF1.xlsx"

[[jobs]]
kind = "complex"
path = "flows.csv"
mapping = {}
"#;
        assert!(SyncConfig::from_toml_str(empty_mapping).unwrap().validate().is_err());

        let duplicate_names = r#"
[source]
path = "ETF1.xlsx"

[[jobs]]
kind = "simple"
path = "a/IBIT.csv"
identifier = "IBIT US"
flow_column = "Flow"

[[jobs]]
kind = "simple"
path = "b/IBIT.csv"
identifier = "IBIT US"
flow_column = "Flow"
"#;
        assert!(SyncConfig::from_toml_str(duplicate_names).unwrap().validate().is_err());

        let stats_without_total = r#"
[source]
path = "ETF1.xlsx"

[[jobs]]
kind = "simple"
path = "IBIT.csv"
identifier = "IBIT US"
flow_column = "Flow"
statistics = { enabled = true }
"#;
        assert!(SyncConfig::from_toml_str(stats_without_total).unwrap().validate().is_err());
    }

    #[test]
    fn test_unknown_job_kind_is_rejected() {
        let content = r#"
[source]
path = "ETF1.xlsx"

[[jobs]]
kind = "fancy"
path = "IBIT.csv"
"#;
        assert!(SyncConfig::from_toml_str(content).is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = SyncConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.sync.name, "etf-flows");
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let config = SyncConfig::from_toml_str(include_str!("../../configs/etf-flows.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.jobs.len(), 24);
        assert_eq!(config.jobs[0].display_name(), "S&P 500 ETF");
        assert_eq!(config.jobs.iter().filter(|job| job.is_simple()).count(), 6);
        // bare [jobs.statistics] tables turn the block on
        assert!(config.jobs[1].statistics.as_ref().map(|s| s.enabled).unwrap_or(false));
    }
}
