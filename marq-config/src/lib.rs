//! Shared configuration loader for the marq toolchain.
//!
//! `defaults/marq.default.toml` is embedded into every binary so that docs
//! and runtime behavior stay in sync. Applications layer user-specific files
//! on top of those defaults via [`Loader`] before deserializing into
//! [`MarqConfig`], then [`MarqConfig::compile`] turns the declarative tables
//! into the runtime objects the parser and renderer consume: the command
//! table (with alias renames applied), the macro table (with placeholder
//! spellings encoded and parameter counts reconciled), the code-marker
//! registry, and the parser settings.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use marq_babel::UnhandledFormatPolicy;
use marq_parser::marq::commands;
use marq_parser::marq::macros::{count_params, encode_placeholders};
use marq_parser::{CommandTable, Macro, MacroTable, MarkerRegistry, ParserSettings};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

const DEFAULT_TOML: &str = include_str!("../defaults/marq.default.toml");

/// Top-level configuration consumed by marq applications.
#[derive(Debug, Clone, Deserialize)]
pub struct MarqConfig {
    pub parser: ParserConfig,
    pub output: OutputConfig,
    /// English command name -> replacement spelling.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub macros: BTreeMap<String, MacroConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    pub tab_size: usize,
    pub include_paths: Vec<PathBuf>,
    pub max_include_depth: usize,
    pub output_format: String,
    pub defines: Vec<String>,
    pub default_code_language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub unhandled_format: UnhandledFormatSetting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnhandledFormatSetting {
    Warning,
    Silent,
}

impl From<UnhandledFormatSetting> for UnhandledFormatPolicy {
    fn from(setting: UnhandledFormatSetting) -> UnhandledFormatPolicy {
        match setting {
            UnhandledFormatSetting::Warning => UnhandledFormatPolicy::Warning,
            UnhandledFormatSetting::Silent => UnhandledFormatPolicy::Silent,
        }
    }
}

/// One user macro: an optional default body plus per-format bodies, written
/// with `\1`..`\8` parameter spellings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MacroConfig {
    #[serde(default)]
    pub default: Option<String>,
    #[serde(flatten)]
    pub formats: BTreeMap<String, String>,
}

/// The runtime tables compiled from a [`MarqConfig`]. Shared read-only
/// across parse calls.
pub struct CompiledConfig {
    pub commands: CommandTable,
    pub macros: MacroTable,
    pub markers: MarkerRegistry,
    pub settings: ParserSettings,
    pub unhandled_format: UnhandledFormatPolicy,
    /// Configuration-level complaints: bad aliases, shadowed builtins,
    /// inconsistent macro parameter counts.
    pub warnings: Vec<String>,
}

impl MarqConfig {
    /// Builds the runtime tables. Alias conflicts that make the command
    /// table unbuildable are errors; everything else degrades to a warning.
    pub fn compile(&self) -> Result<CompiledConfig, ConfigError> {
        let mut warnings = Vec::new();

        let commands = CommandTable::build(&self.aliases)
            .map_err(|err| ConfigError::Message(err.to_string()))?;
        warnings.extend(commands.warnings().iter().cloned());

        let mut macros = MacroTable::new();
        for (name, mc) in &self.macros {
            if commands::is_builtin(name) {
                warnings.push(format!(
                    "macro '\\{}' would shadow a built-in command; ignored",
                    name
                ));
                continue;
            }
            let (m, mut macro_warnings) = compile_macro(name, mc);
            warnings.append(&mut macro_warnings);
            macros.insert(name.clone(), m);
        }

        let mut markers = MarkerRegistry::with_defaults();
        markers.set_default_language(self.parser.default_code_language.clone());

        let settings = ParserSettings {
            tab_size: self.parser.tab_size,
            include_paths: self.parser.include_paths.clone(),
            max_include_depth: self.parser.max_include_depth,
            output_format: self.parser.output_format.clone(),
            defines: self.parser.defines.iter().cloned().collect::<BTreeSet<_>>(),
        };

        Ok(CompiledConfig {
            commands,
            macros,
            markers,
            settings,
            unhandled_format: self.output.unhandled_format.into(),
            warnings,
        })
    }
}

/// Encodes placeholder spellings and reconciles the parameter count across a
/// macro's bodies: disagreeing variants take the larger count, with a
/// warning naming the authoritative variant.
fn compile_macro(name: &str, mc: &MacroConfig) -> (Macro, Vec<String>) {
    let mut warnings = Vec::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    let default_def = mc.default.as_deref().map(encode_placeholders);
    if let Some(def) = &default_def {
        counts.push(("default".to_string(), count_params(def)));
    }

    let mut other_defs = BTreeMap::new();
    for (format, def) in &mc.formats {
        let encoded = encode_placeholders(def);
        counts.push((format.clone(), count_params(&encoded)));
        other_defs.insert(format.clone(), encoded);
    }

    let num_params = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
    if let Some((authoritative, _)) = counts.iter().find(|(_, n)| *n == num_params) {
        if counts.iter().any(|(_, n)| *n != num_params) {
            warnings.push(format!(
                "macro '\\{}' takes inconsistent numbers of arguments; using {} from the '{}' definition",
                name, num_params, authoritative
            ));
        }
    }

    (
        Macro {
            default_def,
            default_def_position: None,
            other_defs,
            num_params,
        },
        warnings,
    )
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override (useful for CLI settings).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<MarqConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<MarqConfig, ConfigError> {
    Loader::new().build()
}
