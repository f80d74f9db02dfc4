//! Configuration structures for skyaudit
//!
//! A configuration file holds a `default` profile, named `profiles`, a global
//! `exclude` block, and global `thresholds`. Resolving a profile produces an
//! immutable [`Settings`] value that is passed explicitly down to the engine.
//! Exclusion lists are unioned across scopes; thresholds and scalar settings
//! are overridden by the more specific scope.

use crate::error::{AuditError, Result};
use crate::exclusion::{ExclusionContext, ExclusionRule};
use crate::traits::CheckParams;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Role assumed in member accounts when none is configured
pub const DEFAULT_CROSS_ACCOUNT_ROLE: &str = "OrganizationAccountAccessRole";

/// Default size of the worker pool
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Region scanned when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Regions accepted in configuration
pub const VALID_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-central-1",
    "eu-north-1",
    "eu-south-1",
    "ap-south-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-east-1",
    "ca-central-1",
    "sa-east-1",
    "me-south-1",
    "af-south-1",
];

/// Built-in threshold values
pub const DEFAULT_THRESHOLDS: &[(&str, f64)] = &[
    ("ec2_cpu", 20.0),
    ("rds_cpu", 20.0),
    ("lambda_memory", 512.0),
    ("stopped_days", 7.0),
    ("idle_days", 7.0),
    ("old_snapshot_days", 30.0),
    ("access_key_age_days", 90.0),
    ("nat_idle_days", 7.0),
    ("nat_min_mb", 1.0),
    ("alarm_stale_days", 30.0),
];

/// File names searched in the working directory, in order
const LOCAL_CONFIG_NAMES: &[&str] = &[
    "skyaudit.yaml",
    "skyaudit.yml",
    ".skyaudit.yaml",
    ".skyaudit.yml",
];

/// Exclusion lists of one scope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcludeConfig {
    /// Account ids never scheduled
    #[serde(default)]
    pub accounts: Vec<String>,

    /// Regions never scheduled
    #[serde(default)]
    pub regions: Vec<String>,

    /// Services never scheduled
    #[serde(default)]
    pub services: Vec<String>,

    /// ARN glob patterns skipped by checks
    #[serde(default)]
    pub arns: Vec<String>,

    /// Tag rules skipped by checks
    #[serde(default)]
    pub tags: Vec<ExclusionRule>,
}

impl ExcludeConfig {
    /// Cumulative union of two scopes, keeping first-seen order
    pub fn union(&self, other: &ExcludeConfig) -> ExcludeConfig {
        fn merge<T: Clone + PartialEq>(a: &[T], b: &[T]) -> Vec<T> {
            let mut out = a.to_vec();
            for item in b {
                if !out.contains(item) {
                    out.push(item.clone());
                }
            }
            out
        }

        ExcludeConfig {
            accounts: merge(&self.accounts, &other.accounts),
            regions: merge(&self.regions, &other.regions),
            services: merge(&self.services, &other.services),
            arns: merge(&self.arns, &other.arns),
            tags: merge(&self.tags, &other.tags),
        }
    }

    pub fn excludes_account(&self, account_id: &str) -> bool {
        self.accounts.iter().any(|a| a == account_id)
    }

    pub fn excludes_region(&self, region: &str) -> bool {
        self.regions.iter().any(|r| r == region)
    }

    pub fn excludes_service(&self, service: &str) -> bool {
        self.services.iter().any(|s| s == service)
    }

    /// Build the per-resource filter handed to checks
    pub fn exclusion_context(&self) -> Result<ExclusionContext> {
        ExclusionContext::new(self.tags.clone()).with_arn_patterns(&self.arns)
    }

    fn validate(&self, scope: &str, errors: &mut Vec<String>) {
        for region in &self.regions {
            if !VALID_REGIONS.contains(&region.as_str()) {
                errors.push(format!("{}: invalid excluded region '{}'", scope, region));
            }
        }
        for arn in &self.arns {
            if !arn.starts_with("arn:aws:") {
                errors.push(format!(
                    "{}: invalid ARN pattern '{}' (must start with 'arn:aws:')",
                    scope, arn
                ));
            } else if let Err(e) = glob::Pattern::new(arn) {
                errors.push(format!("{}: invalid ARN pattern '{}': {}", scope, arn, e));
            }
        }
        for rule in &self.tags {
            if let Err(e) = rule.validate() {
                errors.push(format!("{}: {}", scope, e));
            }
        }
    }
}

/// Settings of one profile as written in the file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Scan every account in the organization
    pub organization: Option<bool>,

    /// Regions to scan
    pub regions: Option<Vec<String>>,

    /// Size of the worker pool
    pub max_workers: Option<usize>,

    /// Role assumed in member accounts
    pub cross_account_role: Option<String>,

    /// Account used for organization API calls
    pub org_admin_account_id: Option<String>,

    /// Per-call API timeout
    pub api_timeout_secs: Option<u64>,

    /// Retries of throttled session resolution
    pub retry_attempts: Option<u32>,

    /// Initial backoff between retries
    pub retry_backoff_ms: Option<u64>,

    /// Output format (text, json, csv)
    pub output: Option<String>,

    /// Profile exclusions, added to the global ones
    #[serde(default)]
    pub exclude: ExcludeConfig,

    /// Profile thresholds, overriding the global ones
    #[serde(default)]
    pub thresholds: BTreeMap<String, f64>,
}

impl ProfileConfig {
    fn overlay(&mut self, other: &ProfileConfig) {
        if other.organization.is_some() {
            self.organization = other.organization;
        }
        if other.regions.is_some() {
            self.regions = other.regions.clone();
        }
        if other.max_workers.is_some() {
            self.max_workers = other.max_workers;
        }
        if other.cross_account_role.is_some() {
            self.cross_account_role = other.cross_account_role.clone();
        }
        if other.org_admin_account_id.is_some() {
            self.org_admin_account_id = other.org_admin_account_id.clone();
        }
        if other.api_timeout_secs.is_some() {
            self.api_timeout_secs = other.api_timeout_secs;
        }
        if other.retry_attempts.is_some() {
            self.retry_attempts = other.retry_attempts;
        }
        if other.retry_backoff_ms.is_some() {
            self.retry_backoff_ms = other.retry_backoff_ms;
        }
        if other.output.is_some() {
            self.output = other.output.clone();
        }
        self.exclude = self.exclude.union(&other.exclude);
        for (name, value) in &other.thresholds {
            self.thresholds.insert(name.clone(), *value);
        }
    }

    fn validate(&self, scope: &str, errors: &mut Vec<String>) {
        if let Some(regions) = &self.regions {
            if regions.is_empty() {
                errors.push(format!("{}: 'regions' must not be empty", scope));
            }
            for region in regions {
                if !VALID_REGIONS.contains(&region.as_str()) {
                    errors.push(format!("{}: invalid region '{}'", scope, region));
                }
            }
        }
        if self.max_workers == Some(0) {
            errors.push(format!("{}: 'max_workers' must be a positive integer", scope));
        }
        if self.api_timeout_secs == Some(0) {
            errors.push(format!(
                "{}: 'api_timeout_secs' must be a positive integer",
                scope
            ));
        }
        if let Some(role) = &self.cross_account_role {
            if role.trim().is_empty() {
                errors.push(format!("{}: 'cross_account_role' must not be empty", scope));
            }
        }
        if let Some(output) = &self.output {
            if !matches!(output.as_str(), "text" | "console" | "json" | "csv") {
                errors.push(format!("{}: unknown output format '{}'", scope, output));
            }
        }
        validate_thresholds(&self.thresholds, scope, errors);
        self.exclude.validate(scope, errors);
    }
}

fn validate_thresholds(thresholds: &BTreeMap<String, f64>, scope: &str, errors: &mut Vec<String>) {
    for (name, value) in thresholds {
        if !value.is_finite() || *value <= 0.0 {
            errors.push(format!(
                "{}: threshold '{}' must be a positive number, got {}",
                scope, name, value
            ));
        }
    }
}

/// Contents of a configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Base profile
    #[serde(default)]
    pub default: ProfileConfig,

    /// Named profiles layered over `default`
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,

    /// Global exclusions
    #[serde(default)]
    pub exclude: ExcludeConfig,

    /// Global thresholds
    #[serde(default)]
    pub thresholds: BTreeMap<String, f64>,
}

impl ConfigFile {
    /// Parse YAML content
    pub fn from_yaml(content: &str, context: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(content).map_err(|e| AuditError::Parse {
            context: context.to_string(),
            message: e.to_string(),
        })?;
        file.validate()?;
        Ok(file)
    }

    /// Parse JSON content
    pub fn from_json(content: &str, context: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(content).map_err(|e| AuditError::Parse {
            context: context.to_string(),
            message: e.to_string(),
        })?;
        file.validate()?;
        Ok(file)
    }

    /// Check every scope, reporting all problems at once
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        self.default.validate("default", &mut errors);
        for (name, profile) in &self.profiles {
            profile.validate(&format!("profiles.{}", name), &mut errors);
        }
        self.exclude.validate("exclude", &mut errors);
        validate_thresholds(&self.thresholds, "thresholds", &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AuditError::Config(errors.join("\n")))
        }
    }
}

/// Loaded configuration and where it came from
#[derive(Debug, Clone, Default)]
pub struct Config {
    file: ConfigFile,
    source: Option<PathBuf>,
}

impl Config {
    /// Configuration with built-in defaults only
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Wrap an already parsed file
    pub fn from_config_file(file: ConfigFile) -> Self {
        Self { file, source: None }
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let context = path.display().to_string();

        let file = if path.extension().map(|e| e == "json").unwrap_or(false) {
            ConfigFile::from_json(&content, &context)?
        } else {
            // Assume YAML for other extensions
            ConfigFile::from_yaml(&content, &context)?
        };

        Ok(Self {
            file,
            source: Some(path.to_path_buf()),
        })
    }

    /// Load an explicit file, or discover one, or fall back to defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(AuditError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        match Self::discover() {
            Some(path) => {
                debug!("Using configuration file {}", path.display());
                Self::from_file(&path)
            }
            None => {
                debug!("No configuration file found, using built-in defaults");
                Ok(Self::builtin())
            }
        }
    }

    fn discover() -> Option<PathBuf> {
        for name in LOCAL_CONFIG_NAMES {
            let candidate = PathBuf::from(name);
            if candidate.exists() {
                return Some(candidate);
            }
        }

        let home = std::env::var_os("HOME")?;
        let candidate = PathBuf::from(home).join(".skyaudit").join("config.yaml");
        candidate.exists().then_some(candidate)
    }

    /// Path the configuration was loaded from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn file(&self) -> &ConfigFile {
        &self.file
    }

    /// Names of the configured profiles
    pub fn profile_names(&self) -> Vec<&str> {
        self.file.profiles.keys().map(|k| k.as_str()).collect()
    }

    /// Resolve the effective settings for a profile
    pub fn settings(&self, profile: &str) -> Result<Settings> {
        let mut merged = self.file.default.clone();
        let mut resolved_profile = "default".to_string();

        // Global exclusions come first so profile additions append to them
        merged.exclude = self.file.exclude.union(&merged.exclude);

        let mut thresholds = self.file.thresholds.clone();
        for (name, value) in &merged.thresholds {
            thresholds.insert(name.clone(), *value);
        }
        merged.thresholds = thresholds;

        if profile != "default" {
            match self.file.profiles.get(profile) {
                Some(selected) => {
                    merged.overlay(selected);
                    resolved_profile = profile.to_string();
                }
                None => warn!("Profile '{}' not found, using 'default'", profile),
            }
        }

        Settings::from_profile(resolved_profile, merged)
    }
}

/// Effective settings for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub profile: String,
    pub organization: bool,
    pub regions: Vec<String>,
    pub max_workers: usize,
    /// Configured role, `None` means the default role
    pub cross_account_role: Option<String>,
    pub org_admin_account_id: Option<String>,
    #[serde(with = "duration_secs")]
    pub api_timeout: Duration,
    pub retry_attempts: u32,
    #[serde(with = "duration_millis")]
    pub retry_backoff: Duration,
    pub output: String,
    pub exclude: ExcludeConfig,
    pub thresholds: BTreeMap<String, f64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            organization: false,
            regions: vec![DEFAULT_REGION.to_string()],
            max_workers: DEFAULT_MAX_WORKERS,
            cross_account_role: None,
            org_admin_account_id: None,
            api_timeout: Duration::from_secs(30),
            retry_attempts: 2,
            retry_backoff: Duration::from_millis(200),
            output: "text".to_string(),
            exclude: ExcludeConfig::default(),
            thresholds: default_thresholds(),
        }
    }
}

fn default_thresholds() -> BTreeMap<String, f64> {
    DEFAULT_THRESHOLDS
        .iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect()
}

/// Values supplied on the command line, applied over the profile
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub organization: Option<bool>,
    pub regions: Option<Vec<String>>,
    pub max_workers: Option<usize>,
    pub cross_account_role: Option<String>,
    pub org_admin_account_id: Option<String>,
    pub api_timeout_secs: Option<u64>,
    pub output: Option<String>,
}

impl Settings {
    fn from_profile(profile: String, config: ProfileConfig) -> Result<Self> {
        let defaults = Settings::default();

        let mut thresholds = defaults.thresholds;
        thresholds.extend(config.thresholds);

        let settings = Settings {
            profile,
            organization: config.organization.unwrap_or(defaults.organization),
            regions: config.regions.unwrap_or(defaults.regions),
            max_workers: config.max_workers.unwrap_or(defaults.max_workers),
            cross_account_role: config.cross_account_role,
            org_admin_account_id: config.org_admin_account_id,
            api_timeout: config
                .api_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.api_timeout),
            retry_attempts: config.retry_attempts.unwrap_or(defaults.retry_attempts),
            retry_backoff: config
                .retry_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_backoff),
            output: config.output.unwrap_or(defaults.output),
            exclude: config.exclude,
            thresholds,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Apply command-line overrides and re-validate
    pub fn with_overrides(mut self, overrides: SettingsOverrides) -> Result<Self> {
        if let Some(organization) = overrides.organization {
            self.organization = organization;
        }
        if let Some(regions) = overrides.regions {
            self.regions = regions;
        }
        if let Some(max_workers) = overrides.max_workers {
            self.max_workers = max_workers;
        }
        if overrides.cross_account_role.is_some() {
            self.cross_account_role = overrides.cross_account_role;
        }
        if overrides.org_admin_account_id.is_some() {
            self.org_admin_account_id = overrides.org_admin_account_id;
        }
        if let Some(secs) = overrides.api_timeout_secs {
            self.api_timeout = Duration::from_secs(secs);
        }
        if let Some(output) = overrides.output {
            self.output = output;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate resolved values
    pub fn validate(&self) -> Result<()> {
        let as_profile = ProfileConfig {
            organization: Some(self.organization),
            regions: Some(self.regions.clone()),
            max_workers: Some(self.max_workers),
            cross_account_role: self.cross_account_role.clone(),
            org_admin_account_id: self.org_admin_account_id.clone(),
            api_timeout_secs: None,
            retry_attempts: Some(self.retry_attempts),
            retry_backoff_ms: None,
            output: Some(self.output.clone()),
            exclude: self.exclude.clone(),
            thresholds: self.thresholds.clone(),
        };

        let mut errors = Vec::new();
        as_profile.validate(&self.profile, &mut errors);
        if self.api_timeout.is_zero() {
            errors.push(format!("{}: API timeout must be positive", self.profile));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AuditError::Config(errors.join("\n")))
        }
    }

    /// Reject excluded service names that no check provides
    pub fn validate_services(&self, known: &[&str]) -> Result<()> {
        let unknown: Vec<_> = self
            .exclude
            .services
            .iter()
            .filter(|s| !known.contains(&s.as_str()))
            .map(|s| format!("Unknown service: '{}'", s))
            .collect();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(AuditError::Config(unknown.join("\n")))
        }
    }

    /// Role name used for member accounts
    pub fn role_name(&self) -> &str {
        self.cross_account_role
            .as_deref()
            .unwrap_or(DEFAULT_CROSS_ACCOUNT_ROLE)
    }

    /// Regions remaining after exclusions
    pub fn effective_regions(&self) -> Vec<String> {
        self.regions
            .iter()
            .filter(|r| !self.exclude.excludes_region(r))
            .cloned()
            .collect()
    }

    /// Thresholds as check parameters
    pub fn check_params(&self) -> CheckParams {
        CheckParams::new(self.thresholds.clone())
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}
