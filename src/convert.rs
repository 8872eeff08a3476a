//! One-call conversion from DBML source to output files.

use std::fmt;
use std::str::FromStr;

use crate::ast::DatabaseSchema;
use crate::codegen::{GeneratorOptions, PrismaGenerator, TypeOrmGenerator};
use crate::parser::{self, ParseError, ParseOptions};

pub const JSON_FILE: &str = "schema.json";
pub const MODULE_FILE: &str = "database.module.ts";
pub const PRISMA_FILE: &str = "schema.prisma";

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Unknown output format `{0}` (expected json, typeorm or prisma)")]
    UnknownFormat(String),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    TypeOrm,
    Prisma,
}

impl OutputFormat {
    pub fn id(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::TypeOrm => "typeorm",
            Self::Prisma => "prisma",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "typeorm" => Ok(Self::TypeOrm),
            "prisma" => Ok(Self::Prisma),
            _ => Err(ConvertError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A named output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub content: String,
}

impl Artifact {
    fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub parse: ParseOptions,
    pub generator: GeneratorOptions,
}

/// Parse `source` and render it in `format`.
pub fn convert(
    source: &str,
    format: OutputFormat,
    options: &ConvertOptions,
) -> Result<Vec<Artifact>, ConvertError> {
    let schema = parser::parse_with(source, options.parse)?;
    render(&schema, format, &options.generator)
}

/// Render an already parsed schema.
pub fn render(
    schema: &DatabaseSchema,
    format: OutputFormat,
    options: &GeneratorOptions,
) -> Result<Vec<Artifact>, ConvertError> {
    let artifacts = match format {
        OutputFormat::Json => {
            vec![Artifact::new(JSON_FILE, serde_json::to_string_pretty(schema)?)]
        }
        OutputFormat::TypeOrm => {
            let code = TypeOrmGenerator::new(options.clone()).generate(schema);
            let mut artifacts: Vec<Artifact> = code
                .entities
                .into_iter()
                .map(|(filename, content)| Artifact::new(filename, content))
                .collect();
            artifacts.push(Artifact::new(MODULE_FILE, code.module));
            artifacts
        }
        OutputFormat::Prisma => {
            let code = PrismaGenerator::new(options.clone()).generate(schema);
            vec![Artifact::new(PRISMA_FILE, code.schema)]
        }
    };
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP: &str = r#"
        Table customers {
            id int [pk, increment]
            name varchar [not null]
        }
        Table orders {
            id int [pk, increment]
            customer_id int [ref: > customers.id]
            total decimal(10, 2) [default: 0]
        }
    "#;

    fn filenames(artifacts: &[Artifact]) -> Vec<&str> {
        artifacts.iter().map(|a| a.filename.as_str()).collect()
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TypeORM".parse::<OutputFormat>().unwrap(), OutputFormat::TypeOrm);
        assert_eq!("PRISMA".parse::<OutputFormat>().unwrap(), OutputFormat::Prisma);
        assert!(matches!(
            "sequelize".parse::<OutputFormat>(),
            Err(ConvertError::UnknownFormat(f)) if f == "sequelize"
        ));
        assert_eq!(OutputFormat::TypeOrm.to_string(), "typeorm");
    }

    #[test]
    fn test_json_output_round_trips() {
        let artifacts = convert(SHOP, OutputFormat::Json, &ConvertOptions::default()).unwrap();
        assert_eq!(filenames(&artifacts), vec![JSON_FILE]);

        let content = &artifacts[0].content;
        assert!(content.starts_with("{\n  \"tables\": ["));
        let schema: DatabaseSchema = serde_json::from_str(content).unwrap();
        assert_eq!(schema, parser::parse(SHOP).unwrap());
        assert_eq!(schema.tables[1].columns[2].typ, "decimal(10,2)");
    }

    #[test]
    fn test_typeorm_artifacts() {
        let artifacts = convert(SHOP, OutputFormat::TypeOrm, &ConvertOptions::default()).unwrap();
        assert_eq!(
            filenames(&artifacts),
            vec!["customers.entity.ts", "orders.entity.ts", MODULE_FILE]
        );
        assert!(artifacts[1].content.contains("@ManyToOne(() => Customers"));
        assert!(artifacts[2].content.contains("TypeOrmModule.forFeature([Customers, Orders])"));
    }

    #[test]
    fn test_prisma_artifact() {
        let artifacts = convert(SHOP, OutputFormat::Prisma, &ConvertOptions::default()).unwrap();
        assert_eq!(filenames(&artifacts), vec![PRISMA_FILE]);
        assert!(artifacts[0].content.contains("model Orders {"));
        assert!(artifacts[0].content.contains("total Float @default(0)"));
    }

    #[test]
    fn test_strict_parse_error_surfaces() {
        let options = ConvertOptions {
            parse: ParseOptions { strict: true },
            ..Default::default()
        };
        let err = convert("Table t {\n  ???\n}", OutputFormat::Json, &options).unwrap_err();
        assert!(matches!(err, ConvertError::Parse(ParseError::Lex { line: 2, .. })));
    }
}
