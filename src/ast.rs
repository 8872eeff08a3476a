//! Normalized schema produced by the parser and consumed by every generator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub tables: Vec<Table>,
    pub relations: Vec<Relation>,
    /// Project-level settings (`Project name { database_type: '...' }`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl DatabaseSchema {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    /// Type of `table.column`, if both exist.
    pub fn column_type(&self, table: &str, column: &str) -> Option<&str> {
        self.table(table)
            .and_then(|t| t.column(column))
            .map(|c| c.typ.as_str())
    }

    /// Value of a string entry in `metadata`.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            columns: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = (&Column, &ColumnRef)> {
        self.columns
            .iter()
            .filter_map(|c| c.reference.as_ref().map(|r| (c, r)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub pk: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,
    /// `None` means unspecified, which is not the same as nullable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub increment: bool,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ColumnRef>,
}

impl Column {
    pub fn new(name: impl Into<String>, typ: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            typ: typ.into(),
            ..Self::default()
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable == Some(true)
    }

    pub fn references(&self, table: &str, column: &str) -> bool {
        self.reference
            .as_ref()
            .is_some_and(|r| r.table == table && r.column == column)
    }

    /// FK rendered as one-to-one: unique, or declared `-`.
    pub fn is_one_to_one_fk(&self) -> bool {
        match &self.reference {
            Some(r) => self.unique || r.cardinality == Some(RelationCardinality::ONE_TO_ONE),
            None => false,
        }
    }

    pub fn is_many_to_many_fk(&self) -> bool {
        self.reference
            .as_ref()
            .is_some_and(|r| r.cardinality.is_some_and(|c| c.is_many_to_many()))
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<RelationCardinality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ReferentialAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferentialAction>,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            cardinality: None,
            on_update: None,
            on_delete: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub table: String,
    pub column: String,
}

impl Endpoint {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub from: Endpoint,
    pub to: Endpoint,
    pub cardinality: RelationCardinality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ReferentialAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferentialAction>,
}

impl Relation {
    pub fn is_many_to_many(&self) -> bool {
        self.cardinality.is_many_to_many()
    }

    /// Same `(from, to)` column pair, regardless of cardinality.
    pub fn same_endpoints(&self, other: &Relation) -> bool {
        self.from == other.from && self.to == other.to
    }

    /// The `ref` a FK column on the `from` side carries.
    pub fn column_ref(&self) -> ColumnRef {
        ColumnRef {
            table: self.to.table.clone(),
            column: self.to.column.clone(),
            cardinality: Some(self.cardinality),
            on_update: self.on_update,
            on_delete: self.on_delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationCardinality {
    pub from: Cardinality,
    pub to: Cardinality,
}

impl RelationCardinality {
    pub const ONE_TO_ONE: Self = Self::new(Cardinality::One, Cardinality::One);
    pub const ONE_TO_MANY: Self = Self::new(Cardinality::One, Cardinality::Many);
    pub const MANY_TO_ONE: Self = Self::new(Cardinality::Many, Cardinality::One);
    pub const MANY_TO_MANY: Self = Self::new(Cardinality::Many, Cardinality::Many);

    pub const fn new(from: Cardinality, to: Cardinality) -> Self {
        Self { from, to }
    }

    pub fn is_many_to_many(&self) -> bool {
        *self == Self::MANY_TO_MANY
    }
}

/// Relation operator as written in DBML: `-`, `<`, `>`, `<>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationOp {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationOp {
    pub fn cardinality(self) -> RelationCardinality {
        match self {
            Self::OneToOne => RelationCardinality::ONE_TO_ONE,
            Self::OneToMany => RelationCardinality::ONE_TO_MANY,
            Self::ManyToOne => RelationCardinality::MANY_TO_ONE,
            Self::ManyToMany => RelationCardinality::MANY_TO_MANY,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::OneToOne => "-",
            Self::OneToMany => "<",
            Self::ManyToOne => ">",
            Self::ManyToMany => "<>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
    #[serde(rename = "NO ACTION")]
    NoAction,
    #[serde(rename = "RESTRICT")]
    Restrict,
}

impl ReferentialAction {
    /// Parse a DBML action (`cascade`, `set null`, ...), case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        let words: Vec<String> = s.split_whitespace().map(str::to_lowercase).collect();
        match words.join(" ").as_str() {
            "cascade" => Some(Self::Cascade),
            "set null" => Some(Self::SetNull),
            "set default" => Some(Self::SetDefault),
            "no action" => Some(Self::NoAction),
            "restrict" => Some(Self::Restrict),
            _ => None,
        }
    }

    /// SQL spelling, as TypeORM expects it.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
        }
    }

    /// Prisma `onDelete`/`onUpdate` spelling.
    pub fn as_prisma(self) -> &'static str {
        match self {
            Self::Cascade => "Cascade",
            Self::SetNull => "SetNull",
            Self::SetDefault => "SetDefault",
            Self::NoAction => "NoAction",
            Self::Restrict => "Restrict",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Bool(bool),
    Number(serde_json::Number),
    Str(String),
}

impl DefaultValue {
    /// Rendered as a JSON literal: strings quoted, numbers and booleans bare.
    pub fn to_literal(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Str(s) => Value::String(s.clone()).to_string(),
        }
    }
}

impl From<&str> for DefaultValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<bool> for DefaultValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for DefaultValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}
