//! Source generators for TypeORM entities and Prisma schemas.

mod prisma;
mod typeorm;

pub use prisma::{PrismaGenerator, PrismaSchema};
pub use typeorm::{GeneratedCode, TypeOrmGenerator};

use convert_case::{Case, Casing};

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Render column notes as doc comments.
    pub include_comments: bool,
    /// Prisma `datasource db` provider; derived from the project's
    /// `database_type` when unset.
    pub datasource_provider: Option<String>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            include_comments: true,
            datasource_provider: None,
        }
    }
}

/// `user_profile` -> `UserProfile`
pub(crate) fn class_name(table: &str) -> String {
    table
        .split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect()
}

/// `UserProfile` -> `userProfile`
pub(crate) fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `UserProfile` -> `userProfiles`, `Posts` -> `posts`
pub(crate) fn plural_camel(name: &str) -> String {
    let camel = lower_first(name);
    if camel.ends_with('s') {
        camel
    } else {
        camel + "s"
    }
}

/// Prisma relation field name: `user_profile` -> `userProfile`
pub(crate) fn field_name(table: &str) -> String {
    table.to_case(Case::Camel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_name() {
        assert_eq!(class_name("users"), "Users");
        assert_eq!(class_name("user_profile"), "UserProfile");
        assert_eq!(class_name("books__authors"), "BooksAuthors");
        assert_eq!(class_name("orderItems"), "OrderItems");
    }

    #[test]
    fn test_camel_forms() {
        assert_eq!(lower_first("UserProfile"), "userProfile");
        assert_eq!(plural_camel("UserProfile"), "userProfiles");
        assert_eq!(plural_camel("Posts"), "posts");
        assert_eq!(plural_camel(""), "s");
    }

    #[test]
    fn test_field_name() {
        assert_eq!(field_name("users"), "users");
        assert_eq!(field_name("user_profile"), "userProfile");
        assert_eq!(field_name("students_courses"), "studentsCourses");
    }
}
