use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::debug;

use super::{class_name, lower_first, plural_camel, GeneratorOptions};
use crate::ast::{Column, ColumnRef, DatabaseSchema, Table};
use crate::types::{ts_type, typeorm_type, TimestampKind};

/// Output of [`TypeOrmGenerator::generate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedCode {
    /// `<table>.entity.ts` -> source, in table order.
    pub entities: IndexMap<String, String>,
    /// `database.module.ts` source; empty for an empty schema.
    pub module: String,
}

/// TypeORM decorators, declared in import order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Decorator {
    Entity,
    Column,
    PrimaryColumn,
    PrimaryGeneratedColumn,
    CreateDateColumn,
    UpdateDateColumn,
    DeleteDateColumn,
    OneToOne,
    OneToMany,
    ManyToOne,
    JoinColumn,
}

impl Decorator {
    fn name(self) -> &'static str {
        match self {
            Self::Entity => "Entity",
            Self::Column => "Column",
            Self::PrimaryColumn => "PrimaryColumn",
            Self::PrimaryGeneratedColumn => "PrimaryGeneratedColumn",
            Self::CreateDateColumn => "CreateDateColumn",
            Self::UpdateDateColumn => "UpdateDateColumn",
            Self::DeleteDateColumn => "DeleteDateColumn",
            Self::OneToOne => "OneToOne",
            Self::OneToMany => "OneToMany",
            Self::ManyToOne => "ManyToOne",
            Self::JoinColumn => "JoinColumn",
        }
    }
}

fn entity_file(table: &str) -> String {
    format!("{}.entity", table)
}

/// One entity class being assembled.
struct EntityBuilder<'s> {
    table: &'s Table,
    class: String,
    decorators: BTreeSet<Decorator>,
    /// Related tables to import, first use first.
    related: Vec<&'s str>,
    properties: Vec<String>,
}

impl<'s> EntityBuilder<'s> {
    fn new(table: &'s Table) -> Self {
        Self {
            table,
            class: class_name(&table.name),
            decorators: BTreeSet::from([Decorator::Entity]),
            related: Vec::new(),
            properties: Vec::new(),
        }
    }

    fn import(&mut self, table: &'s str) {
        if table != self.table.name && !self.related.contains(&table) {
            self.related.push(table);
        }
    }

    fn push(&mut self, comment: Option<&str>, decorators: &[String], declaration: String) {
        let mut property = String::new();
        if let Some(comment) = comment {
            property.push_str(&format!("/** {} */\n  ", comment));
        }
        for decorator in decorators {
            property.push_str(decorator);
            property.push_str("\n  ");
        }
        property.push_str(&declaration);
        self.properties.push(property);
    }

    fn finish(self) -> String {
        let names: Vec<&str> = self.decorators.iter().map(|d| d.name()).collect();
        let mut imports = vec![format!("import {{ {} }} from 'typeorm';", names.join(", "))];
        for table in &self.related {
            imports.push(format!(
                "import {{ {} }} from './{}';",
                class_name(table),
                entity_file(table)
            ));
        }

        format!(
            "{}\n\n@Entity('{}')\nexport class {} {{\n  {}\n}}\n",
            imports.join("\n"),
            self.table.name,
            self.class,
            self.properties.join("\n\n  ")
        )
    }
}

/// Generates one TypeORM entity per table plus a NestJS module registering them.
#[derive(Debug, Clone, Default)]
pub struct TypeOrmGenerator {
    options: GeneratorOptions,
}

impl TypeOrmGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self { options }
    }

    pub fn generate(&self, schema: &DatabaseSchema) -> GeneratedCode {
        let entities = schema
            .tables
            .iter()
            .map(|table| {
                (
                    format!("{}.ts", entity_file(&table.name)),
                    self.entity(table, schema),
                )
            })
            .collect();

        GeneratedCode {
            entities,
            module: module(schema),
        }
    }

    fn entity(&self, table: &Table, schema: &DatabaseSchema) -> String {
        let mut entity = EntityBuilder::new(table);
        for column in &table.columns {
            self.column(&mut entity, column, schema);
        }
        self.reverse_relations(&mut entity, schema);
        entity.finish()
    }

    fn column<'s>(&self, entity: &mut EntityBuilder<'s>, column: &'s Column, schema: &'s DatabaseSchema) {
        let comment = column
            .note
            .as_deref()
            .filter(|_| self.options.include_comments);
        let declaration = format!("{}: {};", column.name, ts_type(&column.typ));

        // Junction key columns stay plain primary keys.
        if column.pk && column.is_many_to_many_fk() {
            let decorator = primary_decorator(entity, column);
            entity.push(comment, &[decorator], declaration);
            return;
        }

        if let Some(reference) = &column.reference {
            let Some(related) = schema.table(&reference.table) else {
                debug!(
                    table = %entity.table.name,
                    column = %column.name,
                    target = %reference.table,
                    "skipping FK to unknown table"
                );
                return;
            };
            let decorators = relation_decorators(entity, column, reference, related);
            let related_class = class_name(&related.name);
            entity.import(&related.name);
            entity.push(
                comment,
                &decorators,
                format!("{}: {};", lower_first(&related_class), related_class),
            );
            return;
        }

        if column.pk {
            let decorator = primary_decorator(entity, column);
            entity.push(comment, &[decorator], declaration);
            return;
        }

        if let Some(kind) = TimestampKind::of(&column.name, &column.typ) {
            let decorator = match kind {
                TimestampKind::Created => {
                    entity.decorators.insert(Decorator::CreateDateColumn);
                    "@CreateDateColumn({ type: 'timestamptz', default: () => 'CURRENT_TIMESTAMP' })"
                }
                TimestampKind::Updated => {
                    entity.decorators.insert(Decorator::UpdateDateColumn);
                    "@UpdateDateColumn({ type: 'timestamptz', default: () => 'CURRENT_TIMESTAMP', onUpdate: 'CURRENT_TIMESTAMP' })"
                }
                TimestampKind::Deleted => {
                    entity.decorators.insert(Decorator::DeleteDateColumn);
                    "@DeleteDateColumn({ type: 'timestamptz', nullable: true })"
                }
            };
            entity.push(comment, &[decorator.to_string()], declaration);
            return;
        }

        let mut options = vec![format!("type: '{}'", typeorm_type(&column.typ))];
        if let Some(nullable) = column.nullable {
            options.push(format!("nullable: {}", nullable));
        }
        if column.unique {
            options.push("unique: true".to_string());
        }
        if let Some(default) = &column.default {
            options.push(format!("default: {}", default.to_literal()));
        }
        entity.decorators.insert(Decorator::Column);
        entity.push(
            comment,
            &[format!("@Column({{ {} }})", options.join(", "))],
            declaration,
        );
    }

    /// Inverse sides of FKs that other tables hold against this one.
    fn reverse_relations<'s>(&self, entity: &mut EntityBuilder<'s>, schema: &'s DatabaseSchema) {
        let table: &'s Table = entity.table;
        let inverse = lower_first(&entity.class);

        for other in &schema.tables {
            if other.name == table.name {
                continue;
            }

            for (fk, _) in other.foreign_keys().filter(|(_, r)| r.table == table.name) {
                if fk.pk && fk.is_many_to_many_fk() {
                    continue;
                }

                let other_class = class_name(&other.name);
                let var = lower_first(&other_class);
                entity.import(&other.name);

                if fk.is_one_to_one_fk() {
                    entity.decorators.insert(Decorator::OneToOne);
                    entity.push(
                        None,
                        &[format!("@OneToOne(() => {}, {} => {}.{})", other_class, var, var, inverse)],
                        format!("{}: {};", var, other_class),
                    );
                } else {
                    entity.decorators.insert(Decorator::OneToMany);
                    entity.push(
                        None,
                        &[format!("@OneToMany(() => {}, {} => {}.{})", other_class, var, var, inverse)],
                        format!("{}: {}[];", plural_camel(&other_class), other_class),
                    );
                }
            }
        }
    }
}

fn primary_decorator(entity: &mut EntityBuilder, column: &Column) -> String {
    if column.increment {
        entity.decorators.insert(Decorator::PrimaryGeneratedColumn);
        "@PrimaryGeneratedColumn('increment')".to_string()
    } else {
        entity.decorators.insert(Decorator::PrimaryColumn);
        "@PrimaryColumn()".to_string()
    }
}

/// Owning side of a FK: `@OneToOne`/`@ManyToOne` followed by `@JoinColumn`.
fn relation_decorators(
    entity: &mut EntityBuilder,
    column: &Column,
    reference: &ColumnRef,
    related: &Table,
) -> Vec<String> {
    let related_class = class_name(&related.name);
    let var = lower_first(&related_class);

    let mut options = Vec::new();
    if let Some(action) = reference.on_delete {
        options.push(format!("onDelete: '{}'", action.as_sql()));
    }
    if let Some(action) = reference.on_update {
        options.push(format!("onUpdate: '{}'", action.as_sql()));
    }
    let options = if options.is_empty() {
        String::new()
    } else {
        format!(", {{ {} }}", options.join(", "))
    };

    let relation = if column.is_one_to_one_fk() {
        entity.decorators.insert(Decorator::OneToOne);
        format!(
            "@OneToOne(() => {}, {} => {}.{}{})",
            related_class,
            var,
            var,
            lower_first(&entity.class),
            options
        )
    } else {
        entity.decorators.insert(Decorator::ManyToOne);
        format!(
            "@ManyToOne(() => {}, {} => {}.{}{})",
            related_class,
            var,
            var,
            plural_camel(&entity.class),
            options
        )
    };

    entity.decorators.insert(Decorator::JoinColumn);
    vec![relation, format!("@JoinColumn({{ name: '{}' }})", column.name)]
}

/// `database.module.ts`
fn module(schema: &DatabaseSchema) -> String {
    if schema.tables.is_empty() {
        return String::new();
    }

    let imports: Vec<String> = schema
        .tables
        .iter()
        .map(|t| format!("import {{ {} }} from './{}';", class_name(&t.name), entity_file(&t.name)))
        .collect();
    let classes: Vec<String> = schema.tables.iter().map(|t| class_name(&t.name)).collect();

    format!(
        "import {{ Module }} from '@nestjs/common';
import {{ TypeOrmModule }} from '@nestjs/typeorm';
{}

@Module({{
  imports: [TypeOrmModule.forFeature([{}])],
  exports: [TypeOrmModule],
}})
export class DatabaseModule {{}}
",
        imports.join("\n"),
        classes.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    const BLOG: &str = r#"
        Table users {
            id int [pk, increment]
            email varchar [unique, not null, note: 'Login email']
            created_at timestamp
        }
        Table posts {
            id int [pk]
            user_id int [ref: > users.id]
        }
    "#;

    fn generate(source: &str) -> GeneratedCode {
        TypeOrmGenerator::default().generate(&parse(source).unwrap())
    }

    #[test]
    fn test_entity_with_reverse_relation() {
        let code = generate(BLOG);
        assert_eq!(
            code.entities["users.entity.ts"],
            "import { Entity, Column, PrimaryGeneratedColumn, CreateDateColumn, OneToMany } from 'typeorm';
import { Posts } from './posts.entity';

@Entity('users')
export class Users {
  @PrimaryGeneratedColumn('increment')
  id: number;

  /** Login email */
  @Column({ type: 'varchar', nullable: false, unique: true })
  email: string;

  @CreateDateColumn({ type: 'timestamptz', default: () => 'CURRENT_TIMESTAMP' })
  created_at: Date;

  @OneToMany(() => Posts, posts => posts.users)
  posts: Posts[];
}
"
        );
    }

    #[test]
    fn test_many_to_one() {
        let code = generate(BLOG);
        assert_eq!(
            code.entities["posts.entity.ts"],
            "import { Entity, PrimaryColumn, ManyToOne, JoinColumn } from 'typeorm';
import { Users } from './users.entity';

@Entity('posts')
export class Posts {
  @PrimaryColumn()
  id: number;

  @ManyToOne(() => Users, users => users.posts)
  @JoinColumn({ name: 'user_id' })
  users: Users;
}
"
        );
    }

    #[test]
    fn test_one_to_one() {
        let code = generate(
            r#"
            Table users {
                id int [pk]
            }
            Table profiles {
                id int [pk]
                user_id int [unique, ref: - users.id]
            }
            "#,
        );
        let profiles = &code.entities["profiles.entity.ts"];
        assert!(profiles.contains(
            "@OneToOne(() => Users, users => users.profiles)\n  @JoinColumn({ name: 'user_id' })\n  users: Users;"
        ));

        let users = &code.entities["users.entity.ts"];
        assert!(users.contains("@OneToOne(() => Profiles, profiles => profiles.users)\n  profiles: Profiles;"));
        assert!(users.starts_with("import { Entity, PrimaryColumn, OneToOne } from 'typeorm';"));
    }

    #[test]
    fn test_referential_actions() {
        let code = generate(
            r#"
            Table users {
                id int [pk]
            }
            Table posts {
                id int [pk]
            }
            Ref: posts.author_id > users.id [delete: cascade, update: no action]
            "#,
        );
        assert!(code.entities["posts.entity.ts"].contains(
            "@ManyToOne(() => Users, users => users.posts, { onDelete: 'CASCADE', onUpdate: 'NO ACTION' })"
        ));
    }

    #[test]
    fn test_timestamp_and_column_options() {
        let code = generate(
            r#"
            Table items {
                updated_at timestamp
                deleted_at timestamptz
                published_at timestamp [null]
                title varchar [default: 'Untitled']
                qty int [default: 0]
                attrs jsonb
            }
            "#,
        );
        let items = &code.entities["items.entity.ts"];
        assert!(items.starts_with(
            "import { Entity, Column, UpdateDateColumn, DeleteDateColumn } from 'typeorm';\n\n"
        ));
        assert!(items.contains("@UpdateDateColumn({ type: 'timestamptz', default: () => 'CURRENT_TIMESTAMP', onUpdate: 'CURRENT_TIMESTAMP' })\n  updated_at: Date;"));
        assert!(items.contains("@DeleteDateColumn({ type: 'timestamptz', nullable: true })\n  deleted_at: Date;"));
        assert!(items.contains("@Column({ type: 'timestamp', nullable: true })\n  published_at: Date;"));
        assert!(items.contains("@Column({ type: 'varchar', default: \"Untitled\" })\n  title: string;"));
        assert!(items.contains("@Column({ type: 'int', default: 0 })\n  qty: number;"));
        assert!(items.contains("@Column({ type: 'json' })\n  attrs: Record<string, any>;"));
    }

    #[test]
    fn test_junction_keys_and_self_reference() {
        let code = generate(
            r#"
            Table employees {
                id int [pk]
                manager_id int [ref: > employees.id]
                mentor_id int [pk, ref: <> employees.id]
            }
            "#,
        );
        let employees = &code.entities["employees.entity.ts"];
        assert!(employees.contains("@PrimaryColumn()\n  mentor_id: number;"));
        assert!(employees.contains("@ManyToOne(() => Employees, employees => employees.employees)"));
        assert!(!employees.contains("import { Employees }"));
    }

    #[test]
    fn test_comments_disabled() {
        let generator = TypeOrmGenerator::new(GeneratorOptions {
            include_comments: false,
            ..Default::default()
        });
        let code = generator.generate(&parse(BLOG).unwrap());
        assert!(!code.entities["users.entity.ts"].contains("/**"));
    }

    #[test]
    fn test_module() {
        let code = generate(BLOG);
        assert_eq!(
            code.module,
            "import { Module } from '@nestjs/common';
import { TypeOrmModule } from '@nestjs/typeorm';
import { Users } from './users.entity';
import { Posts } from './posts.entity';

@Module({
  imports: [TypeOrmModule.forFeature([Users, Posts])],
  exports: [TypeOrmModule],
})
export class DatabaseModule {}
"
        );
        let names: Vec<&str> = code.entities.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["users.entity.ts", "posts.entity.ts"]);
    }

    #[test]
    fn test_fk_to_unknown_table_is_skipped() {
        let code = generate(
            "Table posts {\n  id int [pk]\n  author_id int [ref: > ghosts.id]\n}",
        );
        let posts = &code.entities["posts.entity.ts"];
        assert!(posts.starts_with("import { Entity, PrimaryColumn } from 'typeorm';\n\n@Entity('posts')"));
        assert!(!posts.contains("ManyToOne"));
        assert!(!posts.contains("JoinColumn"));
        assert!(!posts.contains("Ghosts"));
        assert!(!posts.contains("author_id"));
        assert!(posts.contains("  @PrimaryColumn()\n  id: number;\n}"));
    }

    #[test]
    fn test_empty_schema() {
        let code = generate("");
        assert!(code.entities.is_empty());
        assert_eq!(code.module, "");
    }
}
