//! Scan configuration and the key-value extraction engine
//!
//! The configuration aggregates extraction patterns, search keywords and the
//! suppression tables. It is loaded once per invocation (from an explicit
//! path, or from the first existing well-known location) and is immutable
//! afterwards. A user file is merged by field replacement: any field absent
//! or empty in the file inherits the built-in default for that field.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A regex pattern extracting a `(key, value)` pair from one line.
///
/// Group 1 holds the key; `value_group` selects the capturing group holding
/// the candidate value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionPattern {
    pub name: String,
    pub pattern: String,
    pub value_group: usize,
    #[serde(default)]
    pub description: String,
}

/// A named group of search keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordGroup {
    pub name: String,
    pub patterns: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// Length bounds and case handling for candidate values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub min_secret_length: usize,
    pub max_secret_length: usize,
    pub case_sensitive: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_secret_length: 3,
            max_secret_length: 500,
            case_sensitive: false,
        }
    }
}

/// Complete scan configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub extraction_patterns: Vec<ExtractionPattern>,
    pub keywords: Vec<KeywordGroup>,
    pub ignored_values: Vec<String>,
    pub ignored_files: Vec<String>,
    pub exclude_binary_extensions: Vec<String>,
    pub settings: Settings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extraction_patterns: default_extraction_patterns(),
            keywords: default_keyword_groups(),
            ignored_values: default_ignored_values(),
            ignored_files: default_ignored_files(),
            exclude_binary_extensions: default_binary_extensions(),
            settings: Settings::default(),
        }
    }
}

fn default_extraction_patterns() -> Vec<ExtractionPattern> {
    let table = [
        (
            "key_equals_value",
            r"^\s*([a-zA-Z_][\w.$/-]*)\s*=\s*(.+)$",
            "Standard key=value format",
        ),
        (
            "yaml_colon",
            r#"^\s*([a-zA-Z_][\w._-]*)\s*:\s+['"]?([^'"\n=]+)['"]?\s*$"#,
            "YAML key: value format",
        ),
        (
            "json_quoted",
            r#""([a-zA-Z_][\w._]*)"\s*:\s*"([^"]+)""#,
            "JSON \"key\": \"value\" format",
        ),
        (
            "export_env",
            r#"^\s*export\s+([A-Z_][A-Z0-9_]*)\s*=\s*['"]?([^'"\n]+)['"]?"#,
            "Shell export KEY=value format",
        ),
    ];
    table
        .into_iter()
        .map(|(name, pattern, description)| ExtractionPattern {
            name: name.to_string(),
            pattern: pattern.to_string(),
            value_group: 2,
            description: description.to_string(),
        })
        .collect()
}

fn default_keyword_groups() -> Vec<KeywordGroup> {
    let table: [(&str, &[&str], &str); 10] = [
        (
            "password",
            &["password", "passwd", "pwd", "pass", "mot_de_passe"],
            "Passwords",
        ),
        (
            "secret",
            &["secret", "client_secret", "app_secret", "api_secret"],
            "Application secrets",
        ),
        ("api_key", &["api_key", "apikey", "api-key"], "API keys"),
        (
            "token",
            &["token", "access_token", "auth_token", "bearer"],
            "Authentication tokens",
        ),
        (
            "credentials",
            &["credential", "credentials", "auth"],
            "Credentials",
        ),
        (
            "private_key",
            &["private_key", "privatekey", "private-key", "rsa_private"],
            "Private keys",
        ),
        (
            "connection_string",
            &[
                "connection_string",
                "connectionstring",
                "conn_str",
                "database_url",
                "db_url",
            ],
            "Connection strings",
        ),
        (
            "oauth",
            &["oauth", "client_id", "client_secret", "refresh_token"],
            "OAuth",
        ),
        ("aws", &["aws_access_key", "aws_secret", "aws_key"], "AWS credentials"),
        (
            "encryption",
            &["encryption_key", "encrypt_key", "aes_key", "cipher"],
            "Encryption keys",
        ),
    ];
    table
        .into_iter()
        .map(|(name, patterns, description)| KeywordGroup {
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            description: description.to_string(),
        })
        .collect()
}

fn default_ignored_values() -> Vec<String> {
    // Substring matches, case-folded. Note that `example` intentionally
    // suppresses any value containing it (api.example.com included).
    [
        "<empty>", "<none>", "<null>", "null", "nil", "undefined", "none", "N/A",
        "${", "{{", "%s", "<value>", "<your_", "[your_",
        "PLACEHOLDER", "your_", "YOUR_", "example", "EXAMPLE", "sample",
        "xxx", "XXX", "***", "----", "____",
        "REMOVED", "REDACTED", "HIDDEN", "MASKED",
        "changeme", "CHANGEME", "change_me", "TODO", "FIXME",
        "default", "DEFAULT",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_ignored_files() -> Vec<String> {
    // Source-code extensions are excluded by default to suppress variable
    // names that look like assignments. A user file replaces this list
    // wholesale, so the conservative default is a knob.
    [
        "*.md", "*.txt", "*.rst",
        "*.lock",
        "*.go", "*.js", "*.ts", "*.jsx", "*.tsx", "*.py", "*.java", "*.rb",
        "*.php", "*.c", "*.cpp", "*.h", "*.cs", "*.swift", "*.kt", "*.rs",
        "*.scala",
        "*.json", "*.jsonl",
        "node_modules/**", "vendor/**", ".git/**",
        "*.min.js", "*.min.css",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_binary_extensions() -> Vec<String> {
    [
        ".jar", ".war", ".zip", ".tar", ".gz", ".rar",
        ".png", ".jpg", ".jpeg", ".gif", ".ico", ".svg",
        ".pdf", ".doc", ".docx", ".xls", ".xlsx",
        ".exe", ".dll", ".so", ".dylib",
        ".class", ".pyc", ".o", ".a",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Values rejected by exact case-folded equality. Substring matching would
/// also suppress real secrets like `demopassword`.
const COMMON_KEYWORDS: &[&str] = &[
    "password", "secret", "token", "key", "credential", "auth", "pass", "pwd",
];

const URL_PREFIXES: &[&str] = &[
    "http://", "https://", "ftp://", "ssh://", "file://", "mailto:",
];

const CODE_PREFIXES: &[&str] = &[
    "func ", "return ", "if ", "for ", "range ", "make(", "append(", "new(", "len(",
];

/// Error loading or validating a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

impl Config {
    /// Load configuration from an explicit path. Errors are fatal.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        let config = config.fill_empty();
        config.validate()?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Load configuration from the first existing well-known location, or
    /// fall back to built-in defaults. Any load failure also falls back.
    pub fn load_auto() -> Self {
        for location in auto_locations() {
            if !location.exists() {
                continue;
            }
            match Self::load(&location) {
                Ok(config) => return config,
                Err(e) => {
                    warn!(
                        path = %location.display(),
                        error = %e,
                        "Ignoring unreadable configuration file, using defaults"
                    );
                    return Config::default();
                }
            }
        }
        Config::default()
    }

    /// Load from an explicit path when given, auto-detect otherwise.
    pub fn load_or_auto(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::load_auto()),
        }
    }

    /// Serialize the configuration to pretty JSON at `path`.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn fill_empty(mut self) -> Self {
        if self.extraction_patterns.is_empty() {
            self.extraction_patterns = default_extraction_patterns();
        }
        if self.keywords.is_empty() {
            self.keywords = default_keyword_groups();
        }
        if self.ignored_values.is_empty() {
            self.ignored_values = default_ignored_values();
        }
        if self.ignored_files.is_empty() {
            self.ignored_files = default_ignored_files();
        }
        if self.exclude_binary_extensions.is_empty() {
            self.exclude_binary_extensions = default_binary_extensions();
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.settings;
        if s.min_secret_length == 0 || s.min_secret_length > s.max_secret_length {
            return Err(ConfigError::InvalidSettings(format!(
                "secret length bounds must satisfy 0 < min <= max (got {}..{})",
                s.min_secret_length, s.max_secret_length
            )));
        }
        Ok(())
    }

    /// The search vocabulary: the union of every group's patterns.
    pub fn all_keywords(&self) -> Vec<String> {
        self.keywords
            .iter()
            .flat_map(|group| group.patterns.iter().cloned())
            .collect()
    }

    /// Whether a repository-relative path is excluded from scanning.
    pub fn should_ignore_file(&self, path: &str) -> bool {
        if self.ignored_files.iter().any(|p| glob_match(p, path)) {
            return true;
        }
        self.exclude_binary_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
    }

    /// Whether a candidate value must be rejected.
    pub fn should_ignore_value(&self, value: &str) -> bool {
        if value.len() < self.settings.min_secret_length
            || value.len() > self.settings.max_secret_length
        {
            return true;
        }

        if looks_like_code(value) {
            return true;
        }

        let folded = value.to_lowercase();
        if URL_PREFIXES.iter().any(|p| folded.starts_with(p)) {
            return true;
        }
        if COMMON_KEYWORDS.iter().any(|kw| folded == *kw) {
            return true;
        }

        self.ignored_values
            .iter()
            .any(|ignored| folded.contains(&ignored.to_lowercase()))
    }

    /// Compile the extraction patterns, skipping any that fail to compile or
    /// whose value group is out of range.
    pub fn compiled_patterns(&self) -> Vec<CompiledPattern> {
        let mut compiled = Vec::with_capacity(self.extraction_patterns.len());
        for ep in &self.extraction_patterns {
            let regex = match Regex::new(&ep.pattern) {
                Ok(r) => r,
                Err(e) => {
                    warn!(pattern = %ep.name, error = %e, "Skipping invalid extraction pattern");
                    continue;
                }
            };
            if ep.value_group == 0 || ep.value_group >= regex.captures_len() {
                warn!(
                    pattern = %ep.name,
                    value_group = ep.value_group,
                    "Skipping extraction pattern with out-of-range value group"
                );
                continue;
            }
            compiled.push(CompiledPattern {
                name: ep.name.clone(),
                regex,
                value_group: ep.value_group,
            });
        }
        compiled
    }
}

fn auto_locations() -> Vec<PathBuf> {
    let mut locations = vec![
        PathBuf::from("patterns.json"),
        PathBuf::from("config/patterns.json"),
    ];
    if let Ok(home) = std::env::var("HOME") {
        locations.push(
            PathBuf::from(home)
                .join(".config")
                .join("git-secret-scanner")
                .join("patterns.json"),
        );
    }
    locations
}

/// Heuristic rejection of values that are code fragments rather than
/// secrets: calls, indexing, literals, field-access chains.
fn looks_like_code(value: &str) -> bool {
    if value.contains('(') && value.contains(')') {
        return true;
    }
    if value.contains('[') && value.contains(']') {
        return true;
    }
    if value.starts_with('{') || value.ends_with('}') {
        return true;
    }
    let dots = value.matches('.').count();
    if dots > 2 {
        return true;
    }
    if dots == 1 {
        // ident.Field style access, e.g. entry.Date
        if let Some((lhs, rhs)) = value.split_once('.') {
            let simple_ident =
                !lhs.is_empty() && lhs.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if simple_ident && rhs.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
                return true;
            }
        }
    }
    CODE_PREFIXES.iter().any(|kw| value.starts_with(kw))
}

/// Minimal glob matching for the ignore list. Four forms are supported:
/// `X/**` (prefix `X/`), `*.ext` (suffix), `dir/` (prefix), exact equality.
fn glob_match(pattern: &str, path: &str) -> bool {
    if let Some(prefix) = pattern.split("**").next().filter(|_| pattern.contains("**")) {
        return path.starts_with(prefix);
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        if pattern.starts_with("*.") {
            return path.ends_with(suffix);
        }
    }
    if pattern.ends_with('/') {
        return path.starts_with(pattern);
    }
    path == pattern
}

/// An extraction pattern compiled and validated for matching.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub name: String,
    pub regex: Regex,
    pub value_group: usize,
}

/// Line classifier shared by the history and working-tree scanners.
///
/// Holds the immutable configuration and the compiled pattern table and
/// applies the containment, extraction, and suppression steps.
pub struct Extractor {
    config: Arc<Config>,
    patterns: Vec<CompiledPattern>,
}

impl Extractor {
    pub fn new(config: Arc<Config>) -> Self {
        let patterns = config.compiled_patterns();
        Self { config, patterns }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Extract a `(key, value)` pair from one line; first matching pattern
    /// wins.
    pub fn extract(&self, line: &str) -> Option<(String, String)> {
        for pattern in &self.patterns {
            if let Some(caps) = pattern.regex.captures(line) {
                let key = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
                let value = caps
                    .get(pattern.value_group)
                    .map(|m| m.as_str().trim())
                    .unwrap_or_default();
                return Some((key.to_string(), value.to_string()));
            }
        }
        None
    }

    /// Run the full candidate pipeline for one keyword over one line:
    /// containment, extraction, then value suppression.
    pub fn candidate(&self, keyword: &str, line: &str) -> Option<(String, String)> {
        let contained = if self.config.settings.case_sensitive {
            line.contains(keyword)
        } else {
            line.to_lowercase().contains(&keyword.to_lowercase())
        };
        if !contained {
            return None;
        }

        let (key, value) = self.extract(line)?;
        if self.config.should_ignore_value(&value) {
            return None;
        }
        Some((key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> Extractor {
        Extractor::new(Arc::new(Config::default()))
    }

    #[test]
    fn extraction_table() {
        let ex = extractor();
        let cases = [
            ("password=secret1", "password", "secret1"),
            ("password: secret2", "password", "secret2"),
            (r#""password": "secret3""#, "password", "secret3"),
            ("export PASSWORD=secret4", "PASSWORD", "secret4"),
            ("api_key = myapikey123", "api_key", "myapikey123"),
            (
                "ibp/ate/mailConfig$service.mail.login.password=xK9m$pQ2wR#7vNjL",
                "ibp/ate/mailConfig$service.mail.login.password",
                "xK9m$pQ2wR#7vNjL",
            ),
            (
                "ibp/ate/oidc$oidc.client_secret=e8d7c6b5-a4f3-42e1-9b8a-1c2d3e4f5a6b",
                "ibp/ate/oidc$oidc.client_secret",
                "e8d7c6b5-a4f3-42e1-9b8a-1c2d3e4f5a6b",
            ),
        ];

        for (line, key, value) in cases {
            let (k, v) = ex.extract(line).unwrap_or_else(|| panic!("no match: {line}"));
            assert_eq!(k, key, "line: {line}");
            assert_eq!(v, value, "line: {line}");
        }
    }

    #[test]
    fn first_pattern_wins() {
        let ex = extractor();
        // Matches both key_equals_value and export_env shapes; declared
        // order decides.
        let (key, value) = ex.extract("token=abc123xyz").unwrap();
        assert_eq!(key, "token");
        assert_eq!(value, "abc123xyz");
    }

    #[test]
    fn code_shaped_values_are_rejected() {
        let config = Config::default();
        for value in [
            "entry.Date",
            "config.Value",
            "secret.FirstSeen",
            "make([]string, 0)",
            "append(slice, item)",
            "data[0]",
            "{foo: bar}",
            "foo.bar.baz.qux",
            "return err",
        ] {
            assert!(config.should_ignore_value(value), "should reject {value}");
        }
    }

    #[test]
    fn real_secrets_are_accepted() {
        let config = Config::default();
        for value in [
            "xK9m$pQ2wR#7vNjL",
            "e8d7c6b5-a4f3-42e1-9b8a-1c2d3e4f5a6b",
            "ibp/ate/config$value",
            "mysecretpassword",
        ] {
            assert!(!config.should_ignore_value(value), "should accept {value}");
        }
    }

    #[test]
    fn ignored_value_is_a_substring_test() {
        let config = Config::default();
        assert!(config.should_ignore_value("api.example.com"));
        assert!(config.should_ignore_value("my-placeholder-token"));
        assert!(config.should_ignore_value("***REMOVED***"));
    }

    #[test]
    fn urls_and_bare_keywords_are_rejected() {
        let config = Config::default();
        assert!(config.should_ignore_value("https://internal.host/path"));
        assert!(config.should_ignore_value("Password"));
        assert!(config.should_ignore_value("TOKEN"));
        // ...but only on exact equality
        assert!(!config.should_ignore_value("demo-pwd-8812"));
    }

    #[test]
    fn length_bounds_are_inclusive_of_min() {
        let mut config = Config::default();
        config.settings.min_secret_length = 5;
        assert!(config.should_ignore_value("abcd"));
        assert!(!config.should_ignore_value("abcde"));
        let long = "x".repeat(config.settings.max_secret_length + 1);
        assert!(config.should_ignore_value(&long));
    }

    #[test]
    fn glob_matcher_forms() {
        assert!(glob_match("node_modules/**", "node_modules/a/b.js"));
        assert!(!glob_match("node_modules/**", "src/node_modules.rs"));
        assert!(glob_match("*.md", "README.md"));
        assert!(glob_match("*.md", "docs/guide.md"));
        assert!(!glob_match("*.md", "README.mdx"));
        assert!(glob_match("build/", "build/out.txt"));
        assert!(glob_match("Makefile", "Makefile"));
        assert!(!glob_match("Makefile", "sub/Makefile"));
    }

    #[test]
    fn binary_extensions_are_ignored_files() {
        let config = Config::default();
        assert!(config.should_ignore_file("assets/logo.png"));
        assert!(config.should_ignore_file("dist/app.jar"));
        assert!(config.should_ignore_file("main.go"));
        assert!(!config.should_ignore_file("config/app.env"));
    }

    #[test]
    fn user_file_merges_by_field_replacement() {
        let json = r#"{
            "keywords": [
                {"name": "custom", "patterns": ["sesame"], "description": ""}
            ]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let config = config.fill_empty();

        assert_eq!(config.all_keywords(), vec!["sesame"]);
        // Absent fields inherit the built-ins.
        assert_eq!(config.extraction_patterns.len(), 4);
        assert!(!config.ignored_values.is_empty());
        assert_eq!(config.settings.min_secret_length, 3);
    }

    #[test]
    fn custom_extraction_patterns_replace_defaults() {
        let json = r#"{
            "extractionPatterns": [
                {"name": "custom", "pattern": "^custom_(.+)=(.+)$", "valueGroup": 2, "description": "Custom"}
            ]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let config = config.fill_empty();
        let patterns = config.compiled_patterns();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].name, "custom");
    }

    #[test]
    fn invalid_patterns_are_skipped() {
        let mut config = Config::default();
        config.extraction_patterns.push(ExtractionPattern {
            name: "broken".to_string(),
            pattern: "([unclosed".to_string(),
            value_group: 1,
            description: String::new(),
        });
        config.extraction_patterns.push(ExtractionPattern {
            name: "out_of_range".to_string(),
            pattern: "^(a)=(b)$".to_string(),
            value_group: 5,
            description: String::new(),
        });
        assert_eq!(config.compiled_patterns().len(), 4);
    }

    #[test]
    fn settings_bounds_are_validated() {
        let mut config = Config::default();
        config.settings.min_secret_length = 0;
        assert!(config.validate().is_err());
        config.settings.min_secret_length = 10;
        config.settings.max_secret_length = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn candidate_applies_containment_and_filters() {
        let ex = extractor();
        assert_eq!(
            ex.candidate("password", "password=xK9m$pQ2wR#7vNjL"),
            Some(("password".to_string(), "xK9m$pQ2wR#7vNjL".to_string()))
        );
        // Keyword containment is case-insensitive by default.
        assert!(ex.candidate("password", "PASSWORD=xK9m$pQ2wR#7vNjL").is_some());
        // No keyword on the line.
        assert!(ex.candidate("password", "username=alice123").is_none());
        // Extracted but code-shaped.
        assert!(ex.candidate("token", "token=entry.Date").is_none());
    }
}
