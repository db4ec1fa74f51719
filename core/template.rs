use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub const DIRECT: &str = "DIRECT";
pub const REJECT: &str = "REJECT";
const MATCH: &str = "MATCH";
const RULE_SET: &str = "RULE-SET";

const DEFAULT_TEMPLATE_YAML: &str = include_str!("../data/default_template.yaml");

static DEFAULT_TEMPLATE: Lazy<Result<RoutingTemplate, TemplateError>> =
    Lazy::new(|| RoutingTemplate::from_yaml(DEFAULT_TEMPLATE_YAML));

/// The built-in template, parsed and validated once per process.
pub fn default_template() -> Result<&'static RoutingTemplate, TemplateError> {
    (*DEFAULT_TEMPLATE).as_ref().map_err(Clone::clone)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read template {path}: {message}")]
    Read { path: String, message: String },
    #[error("template is not valid yaml: {0}")]
    Yaml(String),
    #[error("invalid template: {0}")]
    Invalid(String),
}

/// Everything the assembler adds around the parsed proxies.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingTemplate {
    pub general: GeneralSettings,
    pub groups: GroupSettings,
    #[serde(rename = "rule-providers", default)]
    pub rule_providers: Vec<RuleProvider>,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GeneralSettings {
    pub port: u16,
    pub socks_port: u16,
    pub redir_port: u16,
    pub allow_lan: bool,
    pub mode: String,
    pub log_level: String,
    pub external_controller: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GroupSettings {
    /// Name of the manual selection group.
    pub select: String,
    /// Name of the latency race group.
    pub url_test: String,
    pub test_url: String,
    /// Seconds between health checks.
    pub test_interval: u32,
}

/// Serialized without its name; the name becomes the mapping key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuleProvider {
    #[serde(skip_serializing)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub behavior: String,
    pub url: String,
    pub path: String,
    pub interval: u32,
}

/// One routing directive, `TYPE,param,...,TARGET` or `MATCH,TARGET`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rule {
    pub kind: String,
    pub params: Vec<String>,
    pub target: String,
}

impl Rule {
    pub fn is_match(&self) -> bool {
        self.kind == MATCH
    }
}

impl FromStr for Rule {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        if fields.iter().any(|f| f.is_empty()) {
            return Err(TemplateError::Invalid(format!(
                "rule has an empty field: {:?}",
                s
            )));
        }
        let min = if fields[0] == MATCH { 2 } else { 3 };
        if fields.len() < min || (fields[0] == MATCH && fields.len() != 2) {
            return Err(TemplateError::Invalid(format!(
                "rule must be TYPE,param,...,TARGET or MATCH,TARGET: {:?}",
                s
            )));
        }
        let last = fields.len() - 1;
        Ok(Rule {
            kind: fields[0].to_string(),
            params: fields[1..last].iter().map(|p| p.to_string()).collect(),
            target: fields[last].to_string(),
        })
    }
}

impl TryFrom<String> for Rule {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rule> for String {
    fn from(rule: Rule) -> Self {
        rule.to_string()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind)?;
        for param in &self.params {
            write!(f, ",{}", param)?;
        }
        write!(f, ",{}", self.target)
    }
}

impl RoutingTemplate {
    pub fn from_yaml(yaml: &str) -> Result<Self, TemplateError> {
        let template: RoutingTemplate =
            serde_yaml::from_str(yaml).map_err(|e| TemplateError::Yaml(e.to_string()))?;
        validate_template(&template)?;
        Ok(template)
    }

    pub fn from_file(path: &Path) -> Result<Self, TemplateError> {
        let content = fs::read_to_string(path).map_err(|e| TemplateError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }

    pub fn group_names(&self) -> [&str; 2] {
        [&self.groups.select, &self.groups.url_test]
    }
}

pub fn validate_template(template: &RoutingTemplate) -> Result<(), TemplateError> {
    validate_groups(&template.groups)?;
    for (idx, provider) in template.rule_providers.iter().enumerate() {
        validate_provider(provider)?;
        if template.rule_providers[..idx]
            .iter()
            .any(|p| p.name == provider.name)
        {
            return Err(TemplateError::Invalid(format!(
                "duplicate rule provider: {}",
                provider.name
            )));
        }
    }

    let last = template
        .rules
        .last()
        .ok_or_else(|| TemplateError::Invalid("rules must not be empty".to_string()))?;
    if !last.is_match() {
        return Err(TemplateError::Invalid(
            "last rule must be a MATCH catch-all".to_string(),
        ));
    }

    let groups = template.group_names();
    let rule_count = template.rules.len();
    for (idx, rule) in template.rules.iter().enumerate() {
        if rule.is_match() && idx + 1 != rule_count {
            return Err(TemplateError::Invalid(format!(
                "MATCH must be the last rule, found at position {}",
                idx + 1
            )));
        }
        if rule.kind == RULE_SET {
            let provider = &rule.params[0];
            if !template.rule_providers.iter().any(|p| &p.name == provider) {
                return Err(TemplateError::Invalid(format!(
                    "rule {} references unknown provider {}",
                    rule, provider
                )));
            }
        }
        let target = rule.target.as_str();
        if target != DIRECT && target != REJECT && !groups.contains(&target) {
            return Err(TemplateError::Invalid(format!(
                "rule {} targets unknown name {}",
                rule, target
            )));
        }
    }

    Ok(())
}

fn validate_groups(groups: &GroupSettings) -> Result<(), TemplateError> {
    for name in [&groups.select, &groups.url_test] {
        if name.trim().is_empty() {
            return Err(TemplateError::Invalid("group name is required".to_string()));
        }
        if name == DIRECT || name == REJECT {
            return Err(TemplateError::Invalid(format!(
                "group name {} is reserved",
                name
            )));
        }
    }
    if groups.select == groups.url_test {
        return Err(TemplateError::Invalid(
            "select and url-test groups must have different names".to_string(),
        ));
    }
    if groups.test_url.trim().is_empty() {
        return Err(TemplateError::Invalid("test-url is required".to_string()));
    }
    if groups.test_interval == 0 {
        return Err(TemplateError::Invalid(
            "test-interval must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_provider(provider: &RuleProvider) -> Result<(), TemplateError> {
    if provider.name.trim().is_empty() {
        return Err(TemplateError::Invalid(
            "rule provider name is required".to_string(),
        ));
    }
    if provider.url.trim().is_empty() || provider.path.trim().is_empty() {
        return Err(TemplateError::Invalid(format!(
            "rule provider {} needs url and path",
            provider.name
        )));
    }
    if provider.interval == 0 {
        return Err(TemplateError::Invalid(format!(
            "rule provider {} interval must be > 0",
            provider.name
        )));
    }
    Ok(())
}
