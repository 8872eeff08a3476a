//! Column type mapping to TypeScript, TypeORM and Prisma types.

/// Category of a raw DBML column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    String,
    Date,
    Boolean,
    Float,
    Json,
}

impl TypeCategory {
    /// Checked in this order; the first category with a matching substring wins.
    const TABLE: [(TypeCategory, &'static [&'static str]); 6] = [
        (Self::Integer, &["int", "integer", "bigint", "smallint", "tinyint"]),
        (Self::String, &["varchar", "char", "text", "string"]),
        (Self::Date, &["date", "datetime", "timestamp", "time"]),
        (Self::Boolean, &["bool", "boolean"]),
        (Self::Float, &["float", "double", "decimal", "real"]),
        (Self::Json, &["json", "jsonb"]),
    ];

    pub fn of(raw_type: &str) -> Option<Self> {
        let lower = raw_type.to_lowercase();
        Self::TABLE
            .iter()
            .find(|(_, names)| names.iter().any(|n| lower.contains(n)))
            .map(|(category, _)| *category)
    }
}

/// Map a DBML type to a TypeScript property type.
pub fn ts_type(raw_type: &str) -> &'static str {
    match TypeCategory::of(raw_type) {
        Some(TypeCategory::Integer) | Some(TypeCategory::Float) => "number",
        Some(TypeCategory::String) => "string",
        Some(TypeCategory::Date) => "Date",
        Some(TypeCategory::Boolean) => "boolean",
        Some(TypeCategory::Json) => "Record<string, any>",
        None => "string",
    }
}

/// Map a DBML type to a TypeORM `@Column` type.
pub fn typeorm_type(raw_type: &str) -> &'static str {
    match TypeCategory::of(raw_type) {
        Some(TypeCategory::Integer) => "int",
        Some(TypeCategory::String) => "varchar",
        Some(TypeCategory::Date) => {
            let lower = raw_type.to_lowercase();
            if lower.contains("stamp") {
                "timestamp"
            } else if lower.contains("time") {
                "time"
            } else {
                "date"
            }
        }
        Some(TypeCategory::Boolean) => "boolean",
        Some(TypeCategory::Float) => "float",
        Some(TypeCategory::Json) => "json",
        None => "varchar",
    }
}

/// Map a DBML type to a Prisma scalar type.
pub fn prisma_type(raw_type: &str) -> &'static str {
    match TypeCategory::of(raw_type) {
        Some(TypeCategory::Integer) => "Int",
        Some(TypeCategory::String) => "String",
        Some(TypeCategory::Date) => "DateTime",
        Some(TypeCategory::Boolean) => "Boolean",
        Some(TypeCategory::Float) => "Float",
        Some(TypeCategory::Json) => "Json",
        None => "String",
    }
}

const CREATED_AT_FIELDS: &[&str] = &["created_at", "createdat", "creation_date"];
const UPDATED_AT_FIELDS: &[&str] = &["updated_at", "updatedat", "modification_date"];
const DELETED_AT_FIELDS: &[&str] = &["deleted_at", "deletedat", "deletion_date"];
const TIME_TYPES: &[&str] = &["time", "timestamp", "timestamptz", "datetime"];

/// Lifecycle timestamp columns that ORMs manage themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampKind {
    Created,
    Updated,
    Deleted,
}

impl TimestampKind {
    /// Requires both a lifecycle name and a time-like type.
    pub fn of(name: &str, raw_type: &str) -> Option<Self> {
        if !TIME_TYPES.contains(&raw_type.to_lowercase().as_str()) {
            return None;
        }

        let name = name.to_lowercase();
        if CREATED_AT_FIELDS.contains(&name.as_str()) {
            Some(Self::Created)
        } else if UPDATED_AT_FIELDS.contains(&name.as_str()) {
            Some(Self::Updated)
        } else if DELETED_AT_FIELDS.contains(&name.as_str()) {
            Some(Self::Deleted)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(TypeCategory::of("INT"), Some(TypeCategory::Integer));
        assert_eq!(TypeCategory::of("varchar(255)"), Some(TypeCategory::String));
        assert_eq!(TypeCategory::of("timestamptz"), Some(TypeCategory::Date));
        assert_eq!(TypeCategory::of("bool"), Some(TypeCategory::Boolean));
        assert_eq!(TypeCategory::of("decimal(10,2)"), Some(TypeCategory::Float));
        assert_eq!(TypeCategory::of("jsonb"), Some(TypeCategory::Json));
        assert_eq!(TypeCategory::of("uuid"), None);
    }

    #[test]
    fn test_first_category_wins() {
        // "point" contains "int"
        assert_eq!(TypeCategory::of("point"), Some(TypeCategory::Integer));
    }

    #[test]
    fn test_ts_types() {
        assert_eq!(ts_type("bigint"), "number");
        assert_eq!(ts_type("double"), "number");
        assert_eq!(ts_type("text"), "string");
        assert_eq!(ts_type("datetime"), "Date");
        assert_eq!(ts_type("json"), "Record<string, any>");
        assert_eq!(ts_type("uuid"), "string");
    }

    #[test]
    fn test_typeorm_types() {
        assert_eq!(typeorm_type("timestamp"), "timestamp");
        assert_eq!(typeorm_type("timestamptz"), "timestamp");
        assert_eq!(typeorm_type("datetime"), "time");
        assert_eq!(typeorm_type("date"), "date");
        assert_eq!(typeorm_type("decimal"), "float");
        assert_eq!(typeorm_type("uuid"), "varchar");
    }

    #[test]
    fn test_prisma_types() {
        assert_eq!(prisma_type("int"), "Int");
        assert_eq!(prisma_type("char(2)"), "String");
        assert_eq!(prisma_type("timestamp"), "DateTime");
        assert_eq!(prisma_type("boolean"), "Boolean");
        assert_eq!(prisma_type("real"), "Float");
        assert_eq!(prisma_type("jsonb"), "Json");
        assert_eq!(prisma_type("uuid"), "String");
    }

    #[test]
    fn test_timestamp_kind() {
        assert_eq!(TimestampKind::of("created_at", "timestamp"), Some(TimestampKind::Created));
        assert_eq!(TimestampKind::of("UpdatedAt", "DATETIME"), Some(TimestampKind::Updated));
        assert_eq!(TimestampKind::of("deletion_date", "timestamptz"), Some(TimestampKind::Deleted));
        assert_eq!(TimestampKind::of("created_at", "varchar"), None);
        assert_eq!(TimestampKind::of("published_at", "timestamp"), None);
    }
}
