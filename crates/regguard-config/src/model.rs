// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Regguard.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use regguard_core::Protocol;
use serde::{Deserialize, Serialize};

/// Top-level Regguard configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RegguardConfig {
    /// Admission control, timeouts and transport defaults.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Query target validation settings.
    #[serde(default)]
    pub validator: ValidatorConfig,

    /// Secure resolver settings.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Network boundary guard settings.
    #[serde(default)]
    pub boundary: BoundaryConfig,

    /// Registry endpoints used for endpoint selection.
    #[serde(default)]
    pub registries: Vec<RegistryConfig>,

    /// Schema and threat validation settings.
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Redaction policy engine settings and policy seeds.
    #[serde(default)]
    pub redaction: RedactionConfig,

    /// Audit trail settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Pipeline-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Maximum number of pipelines running at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Maximum number of requests waiting for a slot. Zero rejects immediately.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Registry fetch timeout in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Upper bound on the registry response body.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,

    /// Transport used when the caller does not ask for one.
    #[serde(default = "default_protocol")]
    pub default_protocol: Protocol,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            queue_capacity: default_queue_capacity(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
            default_protocol: default_protocol(),
        }
    }
}

fn default_max_concurrency() -> usize {
    64
}

fn default_queue_capacity() -> usize {
    256
}

fn default_fetch_timeout_ms() -> u64 {
    8_000
}

fn default_max_response_bytes() -> usize {
    1024 * 1024
}

fn default_protocol() -> Protocol {
    Protocol::Https
}

/// Target validator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Labels rejected on whole-label match (case-insensitive).
    #[serde(default = "default_reserved_labels")]
    pub reserved_labels: Vec<String>,

    /// Thresholds for the default homograph detector.
    #[serde(default)]
    pub homograph: HomographConfig,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reserved_labels: default_reserved_labels(),
            homograph: HomographConfig::default(),
        }
    }
}

fn default_reserved_labels() -> Vec<String> {
    ["localhost", "internal", "intranet", "admin", "test", "localdomain"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Run-length thresholds for the default homograph detector.
///
/// A label is flagged when a run is strictly longer than the threshold.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HomographConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_vowel_run")]
    pub max_vowel_run: usize,

    #[serde(default = "default_max_digit_run")]
    pub max_digit_run: usize,

    #[serde(default = "default_max_hyphen_run")]
    pub max_hyphen_run: usize,
}

impl Default for HomographConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_vowel_run: default_max_vowel_run(),
            max_digit_run: default_max_digit_run(),
            max_hyphen_run: default_max_hyphen_run(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_vowel_run() -> usize {
    5
}

fn default_max_digit_run() -> usize {
    8
}

fn default_max_hyphen_run() -> usize {
    2
}

/// What to do when DNSSEC validation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DnssecPolicy {
    /// Bogus answers fail the request.
    Require,
    /// Bogus answers downgrade the run's security level.
    Downgrade,
    /// DNSSEC outcome is recorded but has no effect.
    Ignore,
}

/// Secure resolver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// Per-lookup timeout in milliseconds.
    #[serde(default = "default_resolver_timeout_ms")]
    pub timeout_ms: u64,

    /// Cache TTL ceiling in seconds. Must not exceed 60.
    #[serde(default = "default_ttl_ceiling_secs")]
    pub ttl_ceiling_secs: u64,

    #[serde(default = "default_dnssec_policy")]
    pub dnssec_policy: DnssecPolicy,

    /// Upstream nameserver IPs. Empty uses the system configuration.
    #[serde(default)]
    pub nameservers: Vec<String>,

    /// Maximum number of cached names.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Domain suffixes that are never resolved.
    #[serde(default)]
    pub denied_suffixes: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_resolver_timeout_ms(),
            ttl_ceiling_secs: default_ttl_ceiling_secs(),
            dnssec_policy: default_dnssec_policy(),
            nameservers: Vec::new(),
            cache_capacity: default_cache_capacity(),
            denied_suffixes: Vec::new(),
        }
    }
}

fn default_resolver_timeout_ms() -> u64 {
    3_000
}

fn default_ttl_ceiling_secs() -> u64 {
    60
}

fn default_dnssec_policy() -> DnssecPolicy {
    DnssecPolicy::Downgrade
}

fn default_cache_capacity() -> usize {
    10_000
}

/// Network boundary guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BoundaryConfig {
    /// Transports the guard accepts. Defaults to encrypted transport only.
    #[serde(default = "default_allowed_protocols")]
    pub allowed_protocols: Vec<Protocol>,

    /// Private IPs that are explicitly allowed despite range blocking.
    #[serde(default)]
    pub allowed_private_ips: Vec<String>,

    /// Additional CIDR ranges to block on top of the built-in ones.
    #[serde(default)]
    pub denied_ranges: Vec<String>,

    /// Known certificate fingerprints per host.
    #[serde(default)]
    pub certificate_pins: Vec<CertificatePinConfig>,

    /// Reject hosts that have no configured pins.
    #[serde(default)]
    pub require_certificate_pins: bool,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub geo_fence: GeoFenceConfig,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            allowed_protocols: default_allowed_protocols(),
            allowed_private_ips: Vec::new(),
            denied_ranges: Vec::new(),
            certificate_pins: Vec::new(),
            require_certificate_pins: false,
            rate_limit: RateLimitConfig::default(),
            geo_fence: GeoFenceConfig::default(),
        }
    }
}

fn default_allowed_protocols() -> Vec<Protocol> {
    vec![Protocol::Https]
}

/// Pinned SHA-256 fingerprints (hex) of acceptable leaf certificates for a host.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CertificatePinConfig {
    pub host: String,
    pub sha256: Vec<String>,
}

/// Token bucket parameters, applied per client identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Requests allowed per window (also the burst size).
    #[serde(default = "default_rate_capacity")]
    pub capacity: u32,

    /// Window after which the bucket is refilled to `capacity`.
    #[serde(default = "default_rate_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_rate_capacity(),
            window_secs: default_rate_window_secs(),
        }
    }
}

fn default_rate_capacity() -> u32 {
    100
}

fn default_rate_window_secs() -> u64 {
    60
}

/// Optional geo-fence over resolved addresses.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeoFenceConfig {
    #[serde(default)]
    pub enabled: bool,

    /// When non-empty, only these countries are allowed.
    #[serde(default)]
    pub allowed_countries: Vec<String>,

    #[serde(default)]
    pub blocked_countries: Vec<String>,

    /// Static CIDR-to-country table for the built-in locator.
    #[serde(default)]
    pub ranges: Vec<GeoRangeConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeoRangeConfig {
    pub cidr: String,
    pub country: String,
}

/// A registry endpoint and the targets it is authoritative for.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    pub name: String,

    /// Base URL, e.g. `https://rdap.example.net/rdap`.
    pub base_url: String,

    /// Domain suffixes without leading dot (`eu`, `co.uk`).
    #[serde(default)]
    pub domain_suffixes: Vec<String>,

    /// CIDR ranges served by this registry.
    #[serde(default)]
    pub ip_ranges: Vec<String>,

    /// Inclusive ASN ranges, `"64496-64511"` or a single number.
    #[serde(default)]
    pub asn_ranges: Vec<String>,
}

/// Schema and threat validator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    /// Aggregate threat score at or above which a record is rejected.
    #[serde(default = "default_threat_threshold")]
    pub threat_threshold: f64,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_max_entities")]
    pub max_entities: usize,

    #[serde(default = "default_max_string_length")]
    pub max_string_length: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            threat_threshold: default_threat_threshold(),
            max_depth: default_max_depth(),
            max_entities: default_max_entities(),
            max_string_length: default_max_string_length(),
        }
    }
}

fn default_threat_threshold() -> f64 {
    0.7
}

fn default_max_depth() -> usize {
    32
}

fn default_max_entities() -> usize {
    64
}

fn default_max_string_length() -> usize {
    8 * 1024
}

/// Redaction engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RedactionConfig {
    /// Regexes matched against field names to spot PII.
    #[serde(default = "default_pii_field_patterns")]
    pub pii_field_patterns: Vec<String>,

    /// Jurisdictions where PII passes through when no policy applies.
    #[serde(default = "default_permissive_jurisdictions")]
    pub permissive_jurisdictions: Vec<String>,

    /// Threat score at which the fail-safe default applies everywhere.
    #[serde(default = "default_strict_threat_score")]
    pub strict_threat_score: f64,

    /// Secret mixed into salt derivation for hashing.
    #[serde(default)]
    pub hash_secret: Option<String>,

    #[serde(default = "default_salt_version")]
    pub salt_version: u32,

    /// Entries kept in the decision cache. Zero disables the cache.
    #[serde(default = "default_decision_cache_capacity")]
    pub decision_cache_capacity: usize,

    /// Retention in days per legal basis.
    #[serde(default = "default_retention_days")]
    pub retention_days: BTreeMap<String, u32>,

    /// Retention when the legal basis is absent or unlisted.
    #[serde(default = "default_fallback_retention_days")]
    pub default_retention_days: u32,

    /// Policy seeds, registered in declaration order.
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            pii_field_patterns: default_pii_field_patterns(),
            permissive_jurisdictions: default_permissive_jurisdictions(),
            strict_threat_score: default_strict_threat_score(),
            hash_secret: None,
            salt_version: default_salt_version(),
            decision_cache_capacity: default_decision_cache_capacity(),
            retention_days: default_retention_days(),
            default_retention_days: default_fallback_retention_days(),
            policies: Vec::new(),
        }
    }
}

fn default_pii_field_patterns() -> Vec<String> {
    [
        r"(?i)e-?mail",
        r"(?i)phone|tel|voice|fax|mobile",
        r"(?i)^(fn|full_?name|name|given_?name|family_?name|contact_?name)$",
        r"(?i)street|^(address|adr)$|postal|zip|city|locality",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_permissive_jurisdictions() -> Vec<String> {
    vec!["US".to_string()]
}

fn default_strict_threat_score() -> f64 {
    0.5
}

fn default_salt_version() -> u32 {
    1
}

fn default_decision_cache_capacity() -> usize {
    1024
}

fn default_retention_days() -> BTreeMap<String, u32> {
    BTreeMap::from([
        ("consent".to_string(), 365),
        ("contract".to_string(), 730),
        ("legal-obligation".to_string(), 2555),
        ("legitimate-interest".to_string(), 180),
    ])
}

fn default_fallback_retention_days() -> u32 {
    30
}

/// A redaction policy as declared in configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    pub id: String,

    /// Jurisdictions this policy applies to. `"*"` matches any declared one.
    #[serde(default)]
    pub jurisdictions: Vec<String>,

    /// Legal bases this policy applies to. Empty matches any.
    #[serde(default)]
    pub legal_bases: Vec<String>,

    #[serde(default)]
    pub priority: i32,

    /// Every condition must match for the policy to be selected.
    #[serde(default)]
    pub conditions: Vec<ConditionConfig>,

    /// Rules in evaluation order.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Operator of a policy condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    Contains,
    Regex,
    In,
    NotIn,
}

/// Where a condition looks up its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextScope {
    /// Client and tenant identity.
    User,
    /// Jurisdiction, legal basis, security level, threat score.
    Request,
    /// The registry the record came from.
    Registry,
    /// A field of the record itself.
    Data,
}

/// Condition operand: a single string or a list (for `in` / `not_in`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ConditionValue {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionConfig {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: ConditionValue,
    pub scope: ContextScope,
}

/// Field-level redaction action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionAction {
    Remove,
    Mask,
    Hash,
    Replace,
    Partial,
}

/// Preservation pattern for `partial`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialPattern {
    /// Keep `+`, the country code and the last four digits.
    Phone,
    /// Keep the first local-part character and the domain.
    Email,
    /// Keep `keep_first` leading and `keep_last` trailing characters.
    Edges,
}

/// Parameters of an action. Which fields matter depends on the action.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ActionParams {
    #[serde(default)]
    pub mask_char: Option<char>,

    #[serde(default)]
    pub preserve_length: Option<bool>,

    #[serde(default)]
    pub replacement: Option<String>,

    #[serde(default)]
    pub pattern: Option<PartialPattern>,

    #[serde(default)]
    pub keep_first: Option<usize>,

    #[serde(default)]
    pub keep_last: Option<usize>,

    #[serde(default)]
    pub reversible: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Field locator, dotted path with `*` (one segment) and `**` (any depth).
    pub field: String,

    pub action: RedactionAction,

    #[serde(default)]
    pub params: ActionParams,

    /// Extra conditions the rule needs on top of its policy's.
    #[serde(default)]
    pub conditions: Vec<ConditionConfig>,

    /// Evaluated in declared order after the rule matched.
    #[serde(default)]
    pub exceptions: Vec<ExceptionConfig>,
}

/// How a matching exception changes its rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionEffect {
    /// The field passes through unredacted.
    Bypass,
    /// The rule runs with a substitute action and parameters.
    Modify,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExceptionConfig {
    pub when: ConditionConfig,

    pub effect: ExceptionEffect,

    /// Substitute action for `modify`; defaults to the rule's own action.
    #[serde(default)]
    pub action: Option<RedactionAction>,

    #[serde(default)]
    pub params: ActionParams,
}

/// Audit trail configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// JSON-lines file used when the audit sink is unavailable.
    /// `None` falls back to the error log.
    #[serde(default)]
    pub emergency_log_path: Option<String>,

    /// Key used to sign audit events.
    #[serde(default)]
    pub signing_key: Option<String>,
}
