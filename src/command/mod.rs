//! HandBrakeCLI invocation building.
//!
//! Walks a validated [`JobConfig`] in canonical group order and renders every
//! option through the [`codec`]. The result is a [`CommandLine`] that can be
//! spawned directly or printed as a shell-quoted string.

pub mod codec;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::JobConfig;
use crate::error::{EncodingError, Result};
use crate::schema::Schema;

/// A complete HandBrakeCLI invocation.
///
/// The first token is the program, followed by `--input`, `--output` and the
/// per-group option tokens. Never mutated after it is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommandLine {
    tokens: Vec<String>,
}

impl CommandLine {
    #[cfg(test)]
    pub(crate) fn from_tokens(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    /// All tokens, program first.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// The program token.
    pub fn program(&self) -> &str {
        &self.tokens[0]
    }

    /// Arguments after the program.
    pub fn args(&self) -> &[String] {
        &self.tokens[1..]
    }

    /// Renders the invocation for pasting into a POSIX shell.
    ///
    /// Tokens made only of word characters and `@%+=:,./-` are left bare;
    /// everything else, including any token with whitespace, is single-quoted.
    pub fn to_shell_string(&self) -> String {
        self.tokens
            .iter()
            .map(|token| shell_quote(token))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_string())
    }
}

fn shell_quote(token: &str) -> String {
    if token.is_empty() {
        return "''".to_string();
    }
    let bare = token.chars().all(|c| {
        c.is_alphanumeric()
            || matches!(c, '_' | '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '-')
    });
    if bare {
        token.to_string()
    } else {
        format!("'{}'", token.replace('\'', r#"'"'"'"#))
    }
}

/// Builder for HandBrakeCLI invocations.
///
/// # Examples
///
/// ```no_run
/// use handbrake_job::{CommandBuilder, Loader};
///
/// # fn example() -> handbrake_job::Result<()> {
/// let mut loader = Loader::new();
/// let config = loader.load_file("job.json")?;
/// let command = CommandBuilder::new("/usr/bin/HandBrakeCLI").build(config)?;
/// println!("{}", command);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct CommandBuilder<'s> {
    program: PathBuf,
    schema: Option<&'s Schema>,
}

impl<'s> CommandBuilder<'s> {
    /// Creates a builder for the given HandBrakeCLI path.
    pub fn new<P: AsRef<Path>>(program: P) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            schema: None,
        }
    }

    /// Encodes against `schema` instead of the bundled one.
    ///
    /// Default: the bundled schema
    pub fn schema(mut self, schema: &'s Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Renders `config` into a full invocation.
    ///
    /// Output depends only on `config` and the schema, so building the same
    /// configuration twice yields identical tokens.
    ///
    /// # Errors
    ///
    /// Returns `Encoding` if an option is undeclared or holds a value of the
    /// wrong kind, and `SchemaDefinition` if the bundled schema is broken.
    pub fn build(&self, config: &JobConfig) -> Result<CommandLine> {
        let schema = match self.schema {
            Some(schema) => schema,
            None => Schema::bundled()?,
        };

        let mut tokens = vec![
            self.program.to_string_lossy().into_owned(),
            "--input".to_string(),
            config.source().to_string(),
            "--output".to_string(),
            config.output_file().to_string(),
        ];

        for (group, entries) in config.groups() {
            log::info!("Processing '{}'", group);
            for entry in entries {
                let spec = schema.option(group, &entry.key).ok_or_else(|| {
                    EncodingError::UnknownOption {
                        group: group.to_string(),
                        key: entry.key.clone(),
                    }
                })?;
                tokens.extend(codec::encode(&entry.key, spec, &entry.value)?);
            }
        }

        log::debug!("Built {} command-line tokens", tokens.len());
        Ok(CommandLine { tokens })
    }
}
