//! Compilation of configuration source into pipeline instances.
//!
//! The configuration language proper lives outside this crate; what the
//! host needs is the interface boundary: given a [`PipelineConfig`],
//! produce a created (not yet started) [`Pipeline`] or a
//! [`ConfigurationError`]. [`StandardCompiler`] implements the minimal
//! `input { … } filter { … } output { … }` block grammar with a pluggable
//! factory table so hosts and tests can register their own stage plugins.

use crate::config::PipelineConfig;
use crate::errors::ConfigurationError;
use crate::pipeline::{
    BlockingIntake, GeneratorIntake, NoopTransform, NullOutput, Pipeline, Stage, StageKind,
    StdoutOutput,
};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

/// Attributes supplied to a plugin in the configuration source.
pub type PluginAttributes = BTreeMap<String, String>;

/// Factory function type for constructing stages from configuration.
pub type StageFactory = Box<dyn Fn(&str, &PluginAttributes) -> Arc<dyn Stage> + Send + Sync>;

/// Trait for the compiler collaborator.
///
/// Implementations must be deterministic: compiling the same configuration
/// twice yields pipelines with the same `config_hash`.
pub trait PipelineCompiler: Send + Sync {
    /// Compiles a configuration into a created pipeline.
    fn compile(&self, config: &PipelineConfig) -> Result<Pipeline, ConfigurationError>;
}

/// The built-in compiler for the minimal block grammar.
///
/// Recognized sections are `input`, `filter`, and `output`; each contains
/// plugin blocks of the form `name { key => value … }`. A configuration
/// must declare at least one input and one output.
pub struct StandardCompiler {
    factories: HashMap<(StageKind, String), StageFactory>,
}

impl Default for StandardCompiler {
    fn default() -> Self {
        let mut compiler = Self {
            factories: HashMap::new(),
        };
        compiler.register_plugin(StageKind::Intake, "generator", |name, _| {
            Arc::new(GeneratorIntake::new(name))
        });
        compiler.register_plugin(StageKind::Intake, "blocking", |name, _| {
            Arc::new(BlockingIntake::new(name))
        });
        compiler.register_plugin(StageKind::Transform, "noop", |name, _| {
            Arc::new(NoopTransform::new(name))
        });
        compiler.register_plugin(StageKind::Output, "null", |name, _| {
            Arc::new(NullOutput::new(name))
        });
        compiler.register_plugin(StageKind::Output, "stdout", |name, _| {
            Arc::new(StdoutOutput::new(name))
        });
        compiler
    }
}

impl StandardCompiler {
    /// Creates a compiler with the built-in plugin set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stage factory for a plugin name within a section kind.
    ///
    /// The factory receives the stage name (the plugin's `id` attribute, or
    /// the plugin name when absent) and the parsed attributes.
    pub fn register_plugin<F>(&mut self, kind: StageKind, plugin: impl Into<String>, factory: F)
    where
        F: Fn(&str, &PluginAttributes) -> Arc<dyn Stage> + Send + Sync + 'static,
    {
        self.factories
            .insert((kind, plugin.into()), Box::new(factory));
    }

    fn instantiate(
        &self,
        kind: StageKind,
        plugin: &str,
        attrs: &PluginAttributes,
        offset: usize,
    ) -> Result<Arc<dyn Stage>, ConfigurationError> {
        let factory = self.factories.get(&(kind, plugin.to_string())).ok_or_else(|| {
            ConfigurationError::new(format!("unknown {kind} plugin `{plugin}`")).at_offset(offset)
        })?;
        let name = attrs.get("id").map_or(plugin, String::as_str);
        Ok(factory(name, attrs))
    }
}

impl PipelineCompiler for StandardCompiler {
    fn compile(&self, config: &PipelineConfig) -> Result<Pipeline, ConfigurationError> {
        let sections = parse_sections(config.source())?;

        let mut stages: Vec<Arc<dyn Stage>> = Vec::new();
        let mut has_intake = false;
        let mut has_output = false;
        for section in &sections {
            for plugin in &section.plugins {
                stages.push(self.instantiate(
                    section.kind,
                    &plugin.name,
                    &plugin.attributes,
                    plugin.offset,
                )?);
            }
            match section.kind {
                StageKind::Intake if !section.plugins.is_empty() => has_intake = true,
                StageKind::Output if !section.plugins.is_empty() => has_output = true,
                _ => {}
            }
        }

        if !has_intake {
            return Err(ConfigurationError::new("configuration declares no input"));
        }
        if !has_output {
            return Err(ConfigurationError::new("configuration declares no output"));
        }

        Ok(Pipeline::new(config.clone(), stages))
    }
}

#[derive(Debug)]
struct Section {
    kind: StageKind,
    plugins: Vec<PluginBlock>,
}

#[derive(Debug)]
struct PluginBlock {
    name: String,
    attributes: PluginAttributes,
    offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String, usize),
    Arrow(usize),
    LBrace(usize),
    RBrace(usize),
    Literal(String, usize),
}

impl Token {
    const fn offset(&self) -> usize {
        match self {
            Self::Ident(_, o)
            | Self::Arrow(o)
            | Self::LBrace(o)
            | Self::RBrace(o)
            | Self::Literal(_, o) => *o,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Ident(s, _) => format!("`{s}`"),
            Self::Arrow(_) => "`=>`".to_string(),
            Self::LBrace(_) => "`{`".to_string(),
            Self::RBrace(_) => "`}`".to_string(),
            Self::Literal(s, _) => format!("literal `{s}`"),
        }
    }
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?x)
            (?P<ws>\s+|\#[^\n]*)
            | (?P<arrow>=>)
            | (?P<lbrace>\{)
            | (?P<rbrace>\})
            | (?P<ident>[A-Za-z_][A-Za-z0-9_.\-]*)
            | (?P<literal>"[^"]*"|'[^']*'|-?[0-9]+(\.[0-9]+)?|\[[^\]]*\])
            "#,
        )
        .expect("token pattern is valid")
    })
}

fn tokenize(source: &str) -> Result<Vec<Token>, ConfigurationError> {
    let pattern = token_pattern();
    let mut tokens = Vec::new();
    let mut position = 0;
    while position < source.len() {
        let Some(found) = pattern.find_at(source, position) else {
            return Err(ConfigurationError::new("unexpected character").at_offset(position));
        };
        if found.start() != position {
            return Err(ConfigurationError::new("unexpected character").at_offset(position));
        }
        let Some(captures) = pattern.captures_at(source, position) else {
            return Err(ConfigurationError::new("unexpected character").at_offset(position));
        };
        if captures.name("ws").is_none() {
            let offset = found.start();
            let text = found.as_str().to_string();
            let token = if captures.name("arrow").is_some() {
                Token::Arrow(offset)
            } else if captures.name("lbrace").is_some() {
                Token::LBrace(offset)
            } else if captures.name("rbrace").is_some() {
                Token::RBrace(offset)
            } else if captures.name("ident").is_some() {
                Token::Ident(text, offset)
            } else {
                Token::Literal(trim_quotes(&text), offset)
            };
            tokens.push(token);
        }
        position = found.end();
    }
    Ok(tokens)
}

fn trim_quotes(literal: &str) -> String {
    let bytes = literal.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'"' || bytes[0] == b'\'') && bytes[bytes.len() - 1] == bytes[0]
    {
        literal[1..literal.len() - 1].to_string()
    } else {
        literal.to_string()
    }
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn expect_lbrace(&mut self, after: &str) -> Result<(), ConfigurationError> {
        match self.next() {
            Some(Token::LBrace(_)) => Ok(()),
            Some(token) => Err(ConfigurationError::new(format!(
                "expected `{{` after {after}, found {}",
                token.describe()
            ))
            .at_offset(token.offset())),
            None => Err(ConfigurationError::new(format!(
                "expected `{{` after {after}, found end of input"
            ))),
        }
    }
}

fn parse_sections(source: &str) -> Result<Vec<Section>, ConfigurationError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        index: 0,
    };
    let mut sections = Vec::new();

    while let Some(token) = parser.next() {
        let (name, offset) = match token {
            Token::Ident(name, offset) => (name, offset),
            other => {
                return Err(ConfigurationError::new(format!(
                    "expected section name, found {}",
                    other.describe()
                ))
                .at_offset(other.offset()))
            }
        };
        let kind = match name.as_str() {
            "input" => StageKind::Intake,
            "filter" => StageKind::Transform,
            "output" => StageKind::Output,
            other => {
                return Err(ConfigurationError::new(format!("unknown section `{other}`"))
                    .at_offset(offset)
                    .with_context_entry("section", other))
            }
        };
        parser.expect_lbrace(&format!("`{name}`"))?;
        let plugins = parse_plugins(&mut parser, &name)?;
        sections.push(Section { kind, plugins });
    }

    Ok(sections)
}

fn parse_plugins(parser: &mut Parser, section: &str) -> Result<Vec<PluginBlock>, ConfigurationError> {
    let mut plugins = Vec::new();
    loop {
        match parser.next() {
            Some(Token::RBrace(_)) => return Ok(plugins),
            Some(Token::Ident(name, offset)) => {
                parser.expect_lbrace(&format!("plugin `{name}`"))?;
                let attributes = parse_attributes(parser, &name)?;
                plugins.push(PluginBlock {
                    name,
                    attributes,
                    offset,
                });
            }
            Some(token) => {
                return Err(ConfigurationError::new(format!(
                    "expected plugin name or `}}` in `{section}` section, found {}",
                    token.describe()
                ))
                .at_offset(token.offset()))
            }
            None => {
                return Err(ConfigurationError::new(format!(
                    "unterminated `{section}` section"
                )))
            }
        }
    }
}

fn parse_attributes(
    parser: &mut Parser,
    plugin: &str,
) -> Result<PluginAttributes, ConfigurationError> {
    let mut attributes = PluginAttributes::new();
    loop {
        match parser.next() {
            Some(Token::RBrace(_)) => return Ok(attributes),
            Some(Token::Ident(key, offset)) => {
                match parser.next() {
                    Some(Token::Arrow(_)) => {}
                    Some(token) => {
                        return Err(ConfigurationError::new(format!(
                            "expected `=>` after attribute `{key}`, found {}",
                            token.describe()
                        ))
                        .at_offset(token.offset()))
                    }
                    None => {
                        return Err(ConfigurationError::new(format!(
                            "expected `=>` after attribute `{key}`"
                        ))
                        .at_offset(offset))
                    }
                }
                match parser.next() {
                    Some(Token::Literal(value, _) | Token::Ident(value, _)) => {
                        attributes.insert(key, value);
                    }
                    Some(token) => {
                        return Err(ConfigurationError::new(format!(
                            "expected value for attribute `{key}`, found {}",
                            token.describe()
                        ))
                        .at_offset(token.offset()))
                    }
                    None => {
                        return Err(ConfigurationError::new(format!(
                            "expected value for attribute `{key}`"
                        ))
                        .at_offset(offset))
                    }
                }
            }
            Some(token) => {
                return Err(ConfigurationError::new(format!(
                    "expected attribute or `}}` in plugin `{plugin}`, found {}",
                    token.describe()
                ))
                .at_offset(token.offset()))
            }
            None => {
                return Err(ConfigurationError::new(format!(
                    "unterminated plugin `{plugin}`"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineSettings;
    use pretty_assertions::assert_eq;

    fn config(source: &str) -> PipelineConfig {
        PipelineConfig::new("main", source, PipelineSettings::new())
    }

    #[test]
    fn test_compiles_minimal_pipeline() {
        let compiler = StandardCompiler::new();
        let pipeline = compiler
            .compile(&config("input { blocking {} } output { null {} }"))
            .expect("compile");
        assert_eq!(pipeline.id().as_str(), "main");
        assert!(!pipeline.running());
    }

    #[test]
    fn test_plugin_id_attribute_names_stage() {
        let compiler = StandardCompiler::new();
        let pipeline = compiler
            .compile(&config(
                "input { blocking { id => 'new' } } output { null {} }",
            ))
            .expect("compile");
        assert!(pipeline.reloadable());
    }

    #[test]
    fn test_rejects_missing_section_brace() {
        let compiler = StandardCompiler::new();
        let err = compiler
            .compile(&config(
                "input blocking { id => 'new' } } output { null {} }",
            ))
            .expect_err("must fail");
        assert!(err.message.contains("expected `{`"), "{}", err.message);
    }

    #[test]
    fn test_rejects_unknown_plugin() {
        let compiler = StandardCompiler::new();
        let err = compiler
            .compile(&config("input { mystery {} } output { null {} }"))
            .expect_err("must fail");
        assert!(err.message.contains("mystery"));
    }

    #[test]
    fn test_rejects_unknown_section() {
        let compiler = StandardCompiler::new();
        let err = compiler
            .compile(&config("intake { blocking {} }"))
            .expect_err("must fail");
        assert_eq!(err.context.get("section").map(String::as_str), Some("intake"));
    }

    #[test]
    fn test_requires_input_and_output() {
        let compiler = StandardCompiler::new();
        let err = compiler
            .compile(&config("output { null {} }"))
            .expect_err("must fail");
        assert!(err.message.contains("no input"));

        let err = compiler
            .compile(&config("input { generator {} }"))
            .expect_err("must fail");
        assert!(err.message.contains("no output"));
    }

    #[test]
    fn test_filter_section_supported() {
        let compiler = StandardCompiler::new();
        let pipeline = compiler
            .compile(&config(
                "input { generator {} } filter { noop {} } output { stdout {} }",
            ))
            .expect("compile");
        assert!(pipeline.reloadable());
    }

    #[test]
    fn test_custom_plugin_registration() {
        let mut compiler = StandardCompiler::new();
        compiler.register_plugin(StageKind::Intake, "custom", |name, _| {
            Arc::new(GeneratorIntake::new(name))
        });
        assert!(compiler
            .compile(&config("input { custom {} } output { null {} }"))
            .is_ok());
    }
}
