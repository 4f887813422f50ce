use crate::config::{Config, Layout, Output, Parallelism, RuleConfig};
use crate::rules::factory;
use crate::rules::RuleBuildError;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum LoadError {
    Read(std::io::Error),
    Parse(toml::de::Error),
    Rule(RuleBuildError),
    MissingOutputDir,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Read(e) => write!(f, "failed to read config: {}", e),
            LoadError::Parse(e) => write!(f, "failed to parse config: {}", e),
            LoadError::Rule(e) => write!(f, "failed to build rule: {}", e),
            LoadError::MissingOutputDir => {
                write!(f, "an output directory is required unless files are rewritten in place")
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Read(e) => Some(e),
            LoadError::Parse(e) => Some(e),
            LoadError::Rule(e) => Some(e),
            LoadError::MissingOutputDir => None,
        }
    }
}

/// Top-level rules file structure.
#[derive(Debug, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub rule: Vec<TomlRule>,
}

/// The `[settings]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub in_place: bool,
    pub output_dir: Option<PathBuf>,
    pub layout: LayoutSetting,
    /// `0` = one thread per CPU, `1` = sequential.
    pub threads: usize,
    /// File-name glob applied when a target is a directory.
    pub pattern: String,
    pub recursive: bool,
    pub keep_permissions: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            in_place: false,
            output_dir: None,
            layout: LayoutSetting::Flat,
            threads: 0,
            pattern: "*".into(),
            recursive: true,
            keep_permissions: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LayoutSetting {
    #[default]
    Flat,
    Mirrored,
}

impl From<LayoutSetting> for Layout {
    fn from(l: LayoutSetting) -> Self {
        match l {
            LayoutSetting::Flat => Layout::Flat,
            LayoutSetting::Mirrored => Layout::Mirrored,
        }
    }
}

/// A single `[[rule]]` entry.
#[derive(Debug, Deserialize)]
pub struct TomlRule {
    pub action: String,
    #[serde(rename = "match")]
    pub positive: Option<String>,
    #[serde(rename = "unless")]
    pub negative: Option<String>,
    pub replacement: Option<String>,
}

impl TomlRule {
    /// Convert to the core `RuleConfig` type.
    pub fn to_rule_config(&self) -> RuleConfig {
        RuleConfig {
            action: self.action.clone(),
            positive: self.positive.clone(),
            negative: self.negative.clone(),
            replacement: self.replacement.clone(),
        }
    }
}

/// Command-line values that take precedence over `[settings]`.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub in_place: bool,
    pub output_dir: Option<PathBuf>,
    pub layout: Option<LayoutSetting>,
    pub threads: Option<usize>,
    pub pattern: Option<String>,
    pub no_recursive: bool,
}

/// A ready-to-run configuration plus how directories are walked.
#[derive(Debug)]
pub struct RunPlan {
    pub config: Config,
    pub pattern: String,
    pub recursive: bool,
}

/// Read and parse a rules file, apply overrides and build the rules.
pub fn load(path: &Path, overrides: &Overrides) -> Result<RunPlan, LoadError> {
    let text = fs::read_to_string(path).map_err(LoadError::Read)?;
    let toml_config: TomlConfig = toml::from_str(&text).map_err(LoadError::Parse)?;
    tracing::debug!(
        "loaded {} rule(s) from {}",
        toml_config.rule.len(),
        path.display()
    );
    toml_config.into_plan(overrides)
}

impl TomlConfig {
    pub fn into_plan(self, overrides: &Overrides) -> Result<RunPlan, LoadError> {
        let rule_configs: Vec<RuleConfig> = self.rule.iter().map(TomlRule::to_rule_config).collect();
        let rules = factory::build_rules(&rule_configs).map_err(LoadError::Rule)?;

        let settings = self.settings;
        let in_place = overrides.in_place || settings.in_place;
        let output = if in_place {
            Output::InPlace
        } else {
            let dir = overrides
                .output_dir
                .clone()
                .or(settings.output_dir)
                .ok_or(LoadError::MissingOutputDir)?;
            Output::Directory {
                dir,
                layout: overrides.layout.unwrap_or(settings.layout).into(),
            }
        };

        let threads = overrides.threads.unwrap_or(settings.threads);
        let mut config =
            Config::new(rules, output).with_parallelism(Parallelism::from_thread_count(threads));
        config.keep_permissions = settings.keep_permissions;

        Ok(RunPlan {
            config,
            pattern: overrides.pattern.clone().unwrap_or(settings.pattern),
            recursive: settings.recursive && !overrides.no_recursive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleAction;

    fn parse(text: &str) -> TomlConfig {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn full_file() {
        let config = parse(
            r#"
[settings]
output_dir = "out"
layout = "mirrored"
threads = 4
pattern = "*.log"
recursive = false

[[rule]]
action = "delete"
match = "^DEBUG"

[[rule]]
action = "modify"
match = "SKU=(\\w+)"
unless = "test"
replacement = "sku:$1"
"#,
        );
        let plan = config.into_plan(&Overrides::default()).unwrap();
        assert_eq!(
            plan.config.output,
            Output::Directory {
                dir: PathBuf::from("out"),
                layout: Layout::Mirrored
            }
        );
        assert_eq!(plan.config.parallelism.num_threads(), 4);
        assert_eq!(plan.pattern, "*.log");
        assert!(!plan.recursive);
        assert_eq!(plan.config.rules.len(), 2);
        assert_eq!(
            plan.config.rules[1].action(),
            &RuleAction::Modify("sku:$1".into())
        );
        assert!(plan.config.rules[1].negative().is_some());
    }

    #[test]
    fn defaults_need_output_dir() {
        let err = parse("").into_plan(&Overrides::default()).unwrap_err();
        assert!(matches!(err, LoadError::MissingOutputDir));
    }

    #[test]
    fn overrides_win() {
        let config = parse(
            r#"
[settings]
output_dir = "out"
threads = 8
"#,
        );
        let overrides = Overrides {
            in_place: true,
            threads: Some(1),
            pattern: Some("*.txt".into()),
            no_recursive: true,
            ..Default::default()
        };
        let plan = config.into_plan(&overrides).unwrap();
        assert_eq!(plan.config.output, Output::InPlace);
        assert_eq!(plan.config.parallelism, Parallelism::Sequential);
        assert_eq!(plan.pattern, "*.txt");
        assert!(!plan.recursive);
    }

    #[test]
    fn bad_rule_is_reported() {
        let config = parse(
            r#"
[settings]
in_place = true

[[rule]]
action = "shred"
"#,
        );
        let err = config.into_plan(&Overrides::default()).unwrap_err();
        assert!(matches!(err, LoadError::Rule(RuleBuildError::UnknownAction(0, _))));
    }

    #[test]
    fn unknown_layout_fails_to_parse() {
        let result: Result<TomlConfig, _> = toml::from_str("[settings]\nlayout = \"sideways\"\n");
        assert!(result.is_err());
    }
}
