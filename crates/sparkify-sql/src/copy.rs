//! Bulk-copy statements rendered from a template
//!
//! Storage paths and the role ARN come from configuration and are embedded
//! as string literals, so every value goes through the `sql_literal` filter.

use minijinja::{context, Environment};
use crate::catalog::CatalogError;

const COPY_TEMPLATE: &str = "COPY {{ table }} FROM {{ path | sql_literal }}
credentials {{ credentials | sql_literal }}
format as json {{ format | sql_literal }}
{%- if accept_inv_chars %}
ACCEPTINVCHARS AS {{ accept_inv_chars | sql_literal }}
{%- endif %}
STATUPDATE ON
region {{ region | sql_literal }};";

/// How the warehouse maps JSON documents onto columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonFormat {
    /// Match object keys to column names
    Auto,

    /// Use a JSONPaths file at the given storage URI
    JsonPaths(String),
}

impl JsonFormat {
    /// Interpret a config value (`auto` or a URI)
    pub fn from_setting(value: &str) -> Self {
        if value.eq_ignore_ascii_case("auto") {
            Self::Auto
        } else {
            Self::JsonPaths(value.to_string())
        }
    }

    fn descriptor(&self) -> &str {
        match self {
            Self::Auto => "auto",
            Self::JsonPaths(path) => path,
        }
    }
}

/// One staging table load from object storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySource {
    /// Staging table receiving the rows
    pub table: &'static str,

    /// Source URI (bucket + key prefix)
    pub path: String,

    /// Role the cluster assumes to read the bucket
    pub iam_role: String,

    pub format: JsonFormat,

    pub region: String,

    /// Replacement for invalid UTF-8 characters, if they should be accepted
    pub accept_inv_chars: Option<char>,
}

impl CopySource {
    pub fn new(table: &'static str, path: impl Into<String>, iam_role: impl Into<String>) -> Self {
        Self {
            table,
            path: path.into(),
            iam_role: iam_role.into(),
            format: JsonFormat::Auto,
            region: sparkify_core::config::DEFAULT_REGION.to_string(),
            accept_inv_chars: None,
        }
    }

    pub fn with_format(mut self, format: JsonFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn accepting_invalid_chars(mut self, replacement: char) -> Self {
        self.accept_inv_chars = Some(replacement);
        self
    }

    /// Render the COPY statement
    pub fn render(&self) -> Result<String, CatalogError> {
        let mut env = Environment::new();
        env.add_filter("sql_literal", sql_literal);
        env.add_template("copy", COPY_TEMPLATE)
            .map_err(|e| CatalogError::TemplateError(e.to_string()))?;

        let template = env.get_template("copy")
            .map_err(|e| CatalogError::TemplateError(e.to_string()))?;

        template
            .render(context! {
                table => self.table,
                path => &self.path,
                credentials => format!("aws_iam_role={}", self.iam_role),
                format => self.format.descriptor(),
                accept_inv_chars => self.accept_inv_chars.map(|c| c.to_string()),
                region => &self.region,
            })
            .map_err(|e| CatalogError::TemplateError(e.to_string()))
    }
}

/// Quote a value as a SQL string literal
pub fn sql_literal(value: String) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
