use std::collections::HashSet;

use tracing::debug;

use super::{class_name, field_name, GeneratorOptions};
use crate::ast::{Column, DatabaseSchema, Table};
use crate::types::{prisma_type, TimestampKind};

const DEFAULT_PROVIDER: &str = "postgresql";

/// Output of [`PrismaGenerator::generate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrismaSchema {
    pub schema: String,
}

/// Generates a `schema.prisma` with one model per table.
#[derive(Debug, Clone, Default)]
pub struct PrismaGenerator {
    options: GeneratorOptions,
}

impl PrismaGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self { options }
    }

    pub fn generate(&self, schema: &DatabaseSchema) -> PrismaSchema {
        let models: Vec<String> = schema
            .tables
            .iter()
            .map(|table| self.model(table, schema))
            .collect();

        PrismaSchema {
            schema: format!(
                r#"generator client {{
  provider = "prisma-client-js"
}}

datasource db {{
  provider = "{}"
  url      = env("DATABASE_URL")
}}

{}
"#,
                self.provider(schema),
                models.join("\n\n")
            ),
        }
    }

    fn provider(&self, schema: &DatabaseSchema) -> String {
        if let Some(provider) = &self.options.datasource_provider {
            return provider.clone();
        }

        let Some(database_type) = schema.metadata_str("database_type") else {
            return DEFAULT_PROVIDER.to_string();
        };
        let provider = match database_type.trim().to_lowercase().as_str() {
            "postgresql" | "postgres" => "postgresql",
            "mysql" => "mysql",
            "sqlite" => "sqlite",
            "sql server" | "sqlserver" | "mssql" => "sqlserver",
            "mongodb" => "mongodb",
            "cockroachdb" => "cockroachdb",
            other => {
                debug!(database_type = other, "unknown database type, using default provider");
                DEFAULT_PROVIDER
            }
        };
        provider.to_string()
    }

    fn model(&self, table: &Table, schema: &DatabaseSchema) -> String {
        let junction = is_junction(table);

        let mut fields = Vec::new();
        if junction {
            fields.push("id Int @id @default(autoincrement())".to_string());
        }
        fields.extend(table.columns.iter().map(|c| self.field(c, junction)));

        let relations = relations(table, schema);

        let sections: Vec<String> = [fields.join("\n  "), relations.join("\n  ")]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();

        format!(
            "model {} {{\n  {}\n}}",
            class_name(&table.name),
            sections.join("\n\n  ")
        )
    }

    fn field(&self, column: &Column, junction: bool) -> String {
        let lifecycle = TimestampKind::of(&column.name, &column.typ)
            .filter(|k| matches!(k, TimestampKind::Created | TimestampKind::Updated));

        let mut typ = prisma_type(&column.typ).to_string();
        if column.is_nullable() && column.default.is_none() && lifecycle.is_none() {
            typ.push('?');
        }

        let mut attrs = Vec::new();
        if column.pk && !junction {
            let id = if column.increment {
                "@id @default(autoincrement())"
            } else {
                "@id"
            };
            attrs.push(id.to_string());
        }
        if column.unique && !column.pk {
            attrs.push("@unique".to_string());
        }
        if let Some(default) = &column.default {
            if !column.increment && lifecycle.is_none() {
                attrs.push(format!("@default({})", default.to_literal()));
            }
        }
        match lifecycle {
            Some(TimestampKind::Created) => attrs.push("@default(now())".to_string()),
            Some(TimestampKind::Updated) => attrs.push("@updatedAt".to_string()),
            _ => {}
        }
        if column.name.contains('_') {
            attrs.push(format!("@map(\"{}\")", column.name));
        }

        let mut field = String::new();
        if let Some(note) = column.note.as_deref().filter(|_| self.options.include_comments) {
            field.push_str(&format!("/// {}\n  ", note));
        }
        field.push_str(&column.name);
        field.push(' ');
        field.push_str(&typ);
        if !attrs.is_empty() {
            field.push(' ');
            field.push_str(&attrs.join(" "));
        }
        field
    }
}

/// At least two FK columns pointing at two or more distinct tables.
fn is_junction(table: &Table) -> bool {
    let targets: Vec<&str> = table.foreign_keys().map(|(_, r)| r.table.as_str()).collect();
    targets.len() >= 2 && targets.iter().collect::<HashSet<_>>().len() >= 2
}

fn relations(table: &Table, schema: &DatabaseSchema) -> Vec<String> {
    let mut relations = Vec::new();

    for (column, reference) in table.foreign_keys() {
        if column.is_many_to_many_fk() {
            continue;
        }
        let Some(related) = schema.table(&reference.table) else {
            debug!(table = %table.name, column = %column.name, "skipping FK to unknown table");
            continue;
        };

        let mut args = vec![
            format!("fields: [{}]", column.name),
            format!("references: [{}]", reference.column),
        ];
        if let Some(action) = reference.on_delete {
            args.push(format!("onDelete: {}", action.as_prisma()));
        }
        if let Some(action) = reference.on_update {
            args.push(format!("onUpdate: {}", action.as_prisma()));
        }

        relations.push(format!(
            "{} {}{} @relation({})",
            field_name(&related.name),
            class_name(&related.name),
            if column.is_nullable() { "?" } else { "" },
            args.join(", ")
        ));
    }

    for other in &schema.tables {
        if other.name == table.name {
            continue;
        }

        for (fk, _) in other.foreign_keys().filter(|(_, r)| r.table == table.name) {
            if fk.is_many_to_many_fk() {
                continue;
            }
            let suffix = if fk.is_one_to_one_fk() { "?" } else { "[]" };
            relations.push(format!(
                "{} {}{}",
                field_name(&other.name),
                class_name(&other.name),
                suffix
            ));
        }
    }

    relations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn generate(source: &str) -> String {
        PrismaGenerator::default().generate(&parse(source).unwrap()).schema
    }

    #[test]
    fn test_blog_schema() {
        let schema = generate(
            r#"
            Table users {
                id int [pk, increment]
                email varchar [unique, not null]
                bio text [null, note: 'Shown on the profile']
                created_at timestamp [default: `now()`]
                updated_at timestamp
            }
            Table posts {
                id int [pk, increment]
                title varchar [default: 'Untitled']
                author_id int [ref: > users.id]
            }
            "#,
        );
        assert_eq!(
            schema,
            r#"generator client {
  provider = "prisma-client-js"
}

datasource db {
  provider = "postgresql"
  url      = env("DATABASE_URL")
}

model Users {
  id Int @id @default(autoincrement())
  email String @unique
  /// Shown on the profile
  bio String?
  created_at DateTime @default(now()) @map("created_at")
  updated_at DateTime @updatedAt @map("updated_at")

  posts Posts[]
}

model Posts {
  id Int @id @default(autoincrement())
  title String @default("Untitled")
  author_id Int @map("author_id")

  users Users @relation(fields: [author_id], references: [id])
}
"#
        );
    }

    #[test]
    fn test_junction_model() {
        let schema = generate(
            r#"
            Table students {
                id int [pk, increment]
            }
            Table courses {
                id int [pk, increment]
            }
            Ref: students.id <> courses.id
            "#,
        );
        assert!(schema.contains(
            "model StudentsCourses {
  id Int @id @default(autoincrement())
  students_id Int @map(\"students_id\")
  courses_id Int @map(\"courses_id\")

  students Students @relation(fields: [students_id], references: [id])
  courses Courses @relation(fields: [courses_id], references: [id])
}"
        ));
        assert!(schema.contains(
            "model Students {
  id Int @id @default(autoincrement())

  studentsCourses StudentsCourses[]
}"
        ));
    }

    #[test]
    fn test_one_to_one_and_actions() {
        let schema = generate(
            r#"
            Table users {
                id int [pk]
            }
            Table profiles {
                id int [pk]
                user_id int [null]
            }
            Ref: profiles.user_id - users.id [delete: cascade, update: set null]
            "#,
        );
        assert!(schema.contains(
            "users Users? @relation(fields: [user_id], references: [id], onDelete: Cascade, onUpdate: SetNull)"
        ));
        assert!(schema.contains("  profiles Profiles?\n}"));
    }

    #[test]
    fn test_default_literals() {
        let schema = generate(
            r#"
            Table flags {
                id int [pk, increment, default: 1]
                enabled boolean [default: false, null]
                ratio float [default: 0.5]
            }
            "#,
        );
        assert!(schema.contains("id Int @id @default(autoincrement())\n"));
        assert!(schema.contains("enabled Boolean @default(false)\n"));
        assert!(schema.contains("ratio Float @default(0.5)\n"));
    }

    #[test]
    fn test_provider() {
        let source = "Project shop {\n  database_type: 'MySQL'\n}\nTable t {\n  id int [pk]\n}";
        assert!(generate(source).contains("provider = \"mysql\""));

        let source = "Project shop {\n  database_type: 'Oracle'\n}";
        assert!(generate(source).contains("provider = \"postgresql\""));

        let generator = PrismaGenerator::new(GeneratorOptions {
            datasource_provider: Some("sqlite".into()),
            ..Default::default()
        });
        let schema = generator.generate(&parse(source).unwrap()).schema;
        assert!(schema.contains("provider = \"sqlite\""));
    }

    #[test]
    fn test_dangling_fk_is_skipped() {
        let schema = generate("Table posts {\n  author_id int [ref: > ghosts.id]\n}");
        assert!(schema.contains("model Posts {\n  author_id Int @map(\"author_id\")\n}"));
    }
}
