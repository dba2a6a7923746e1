use crate::mark::MarkingMode;
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Configuration for a classmark run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// What the marks are for: shrinking or obfuscation
    pub mode: MarkingMode,

    /// Keep rules naming the roots
    pub keep: Vec<KeepRule>,

    /// Classes or members (`Class#member`) whose marks should be explained
    pub why_are_you_keeping: Vec<String>,

    /// Write the unused classes and members to this file
    pub print_usage: Option<PathBuf>,

    /// Report configuration
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Output format: terminal, json
    pub format: String,

    /// List unused members in the terminal report
    pub show_members: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: "terminal".to_string(),
            show_members: true,
        }
    }
}

/// One keep directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepRule {
    /// Class name pattern in Java notation, with `?`, `*` and `**` wildcards
    pub class: String,

    #[serde(default)]
    pub kind: KeepKind,

    /// Only classes extending or implementing a class matching this pattern
    #[serde(default)]
    pub extends: Option<String>,

    #[serde(default)]
    pub members: Vec<MemberSpec>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepKind {
    /// Keep the matching classes and the listed members
    #[default]
    Keep,
    /// Keep the listed members, if their class is used
    ClassMembers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSpec {
    #[serde(default)]
    pub kind: MemberKind,

    /// Member name pattern; `<methods>`, `<fields>` and `*` select every
    /// method, field or member
    pub name: String,

    /// JVM descriptor, e.g. `([Ljava/lang/String;)V`; any when absent
    #[serde(default)]
    pub descriptor: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Field,
    Method,
    #[default]
    Any,
}

impl KeepRule {
    pub fn class(pattern: &str) -> Self {
        Self {
            class: pattern.to_string(),
            kind: KeepKind::Keep,
            extends: None,
            members: Vec::new(),
        }
    }
}

impl fmt::Display for KeepRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let directive = match self.kind {
            KeepKind::Keep => "-keep",
            KeepKind::ClassMembers => "-keepclassmembers",
        };
        write!(f, "{} class {}", directive, self.class)?;
        if let Some(extends) = &self.extends {
            write!(f, " extends {}", extends)?;
        }
        if !self.members.is_empty() {
            write!(f, " {{")?;
            for member in &self.members {
                write!(f, " {};", member)?;
            }
            write!(f, " }}")?;
        }
        Ok(())
    }
}

impl fmt::Display for MemberSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.descriptor {
            Some(descriptor) => write!(f, "{}{}", self.name, descriptor),
            None => write!(f, "{}", self.name),
        }
    }
}

impl Config {
    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match extension {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse YAML config"),
            "toml" => toml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse TOML config"),
            _ => {
                if let Ok(config) = serde_yaml::from_str(&contents) {
                    Ok(config)
                } else {
                    toml::from_str(&contents)
                        .into_diagnostic()
                        .wrap_err("Failed to parse config file")
                }
            }
        }
    }

    /// Try to load configuration from default locations
    pub fn from_default_locations(root: &Path) -> Result<Self> {
        let default_names = [
            ".classmark.yml",
            ".classmark.yaml",
            ".classmark.toml",
            "classmark.yml",
            "classmark.yaml",
            "classmark.toml",
        ];

        for name in &default_names {
            let path = root.join(name);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }
}
