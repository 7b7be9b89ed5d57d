//! Processor configuration.
//!
//! Can be created through `serde::Deserialize` from various formats, or from YAML
//! with [`str::parse`].

use std::str::FromStr;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigurationError;

/// The configuration for the request processor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// Limits applied when parsing GraphQL documents.
    pub parser: Parser,
}

#[buildstructor::buildstructor]
impl Configuration {
    #[builder(visibility = "pub")]
    fn new(parser: Option<Parser>) -> Self {
        Self {
            parser: parser.unwrap_or_default(),
        }
    }

    /// Parse configuration from a string in YAML syntax.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigurationError> {
        serde_yaml::from_str(yaml).map_err(|error| ConfigurationError::InvalidConfiguration {
            message: "could not parse configuration",
            error: error.to_string(),
        })
    }
}

impl FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_yaml(s)
    }
}

/// Parser limits.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Parser {
    /// Maximum nesting depth of a document.
    /// default: 4096
    pub recursion_limit: usize,

    /// Maximum number of tokens in a document.
    /// default: unlimited
    pub token_limit: Option<usize>,
}

#[buildstructor::buildstructor]
impl Parser {
    #[builder(visibility = "pub")]
    fn new(recursion_limit: Option<usize>, token_limit: Option<usize>) -> Self {
        Self {
            recursion_limit: recursion_limit.unwrap_or_else(default_parser_recursion_limit),
            token_limit,
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Parser::builder().build()
    }
}

fn default_parser_recursion_limit() -> usize {
    // Protects against stack overflow but is still very high for "reasonable" queries.
    4096
}
