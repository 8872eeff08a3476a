//! Post-scan passes that repair and complete a freshly parsed schema.
//!
//! Run in order: alias resolution, junction tables, missing FK columns,
//! relation deduplication.

use std::collections::HashMap;

use tracing::debug;

use crate::ast::{Column, ColumnRef, DatabaseSchema, Endpoint, Relation, RelationCardinality, Table};

const FALLBACK_FK_TYPE: &str = "int";

/// A relation as registered during the scan, with its optional `Ref name`.
#[derive(Debug, Clone)]
pub(crate) struct PendingRelation {
    pub relation: Relation,
    pub name: Option<String>,
}

pub(crate) fn normalize(schema: &mut DatabaseSchema, mut pending: Vec<PendingRelation>) {
    resolve_aliases(&mut schema.tables, &mut pending);

    for p in pending.iter().filter(|p| p.relation.is_many_to_many()) {
        let name = p.name.clone().unwrap_or_else(|| {
            format!("{}_{}", p.relation.from.table, p.relation.to.table)
        });
        resolve_junction_table(schema, &p.relation, &name);
    }

    for p in pending.iter().filter(|p| !p.relation.is_many_to_many()) {
        backfill_foreign_key(schema, &p.relation);
    }

    schema.relations = dedupe(pending.into_iter().map(|p| p.relation));
}

/// Rewrite references to `Table x as alias` so they name `x`.
fn resolve_aliases(tables: &mut [Table], pending: &mut [PendingRelation]) {
    let aliases: HashMap<String, String> = tables
        .iter()
        .filter_map(|t| t.alias.as_ref().map(|a| (a.clone(), t.name.clone())))
        .filter(|(alias, _)| !tables.iter().any(|t| &t.name == alias))
        .collect();

    if aliases.is_empty() {
        return;
    }

    let resolve = |name: &mut String| {
        if let Some(real) = aliases.get(name.as_str()) {
            *name = real.clone();
        }
    };

    for p in pending.iter_mut() {
        resolve(&mut p.relation.from.table);
        resolve(&mut p.relation.to.table);
    }
    for column in tables.iter_mut().flat_map(|t| t.columns.iter_mut()) {
        if let Some(r) = column.reference.as_mut() {
            resolve(&mut r.table);
        }
    }
}

/// Type of the referenced column, `int` when it cannot be resolved.
fn referenced_type(schema: &DatabaseSchema, endpoint: &Endpoint) -> String {
    schema
        .column_type(&endpoint.table, &endpoint.column)
        .unwrap_or(FALLBACK_FK_TYPE)
        .to_string()
}

fn junction_column(relation: &Relation, endpoint: &Endpoint, typ: String) -> Column {
    Column {
        name: format!("{}_{}", endpoint.table, endpoint.column),
        typ,
        pk: true,
        reference: Some(ColumnRef {
            cardinality: Some(RelationCardinality::MANY_TO_ONE),
            on_update: relation.on_update,
            on_delete: relation.on_delete,
            ..ColumnRef::new(endpoint.table.clone(), endpoint.column.clone())
        }),
        ..Column::default()
    }
}

/// Make sure a junction table named `name` links both endpoints of a
/// many-to-many relation through primary-key FK columns.
fn resolve_junction_table(schema: &mut DatabaseSchema, relation: &Relation, name: &str) {
    let from_column = junction_column(relation, &relation.from, referenced_type(schema, &relation.from));
    let to_column = junction_column(relation, &relation.to, referenced_type(schema, &relation.to));

    if schema.table(name).is_none() {
        debug!(table = name, "creating junction table");
        schema.tables.push(Table {
            name: name.to_string(),
            alias: None,
            columns: vec![from_column, to_column],
        });
        return;
    }
    let Some(table) = schema.table_mut(name) else {
        return;
    };

    let mut has_from = false;
    let mut has_to = false;
    for column in &mut table.columns {
        if column.references(&relation.from.table, &relation.from.column) {
            has_from = true;
            column.pk = true;
        }
        if column.references(&relation.to.table, &relation.to.column) {
            has_to = true;
            column.pk = true;
        }
    }

    if !has_from {
        debug!(table = name, column = %from_column.name, "adding junction FK column");
        table.columns.push(from_column);
    }
    if !has_to {
        debug!(table = name, column = %to_column.name, "adding junction FK column");
        table.columns.push(to_column);
    }
}

/// Give the `from` side of a relation a FK column carrying its `ref`.
fn backfill_foreign_key(schema: &mut DatabaseSchema, relation: &Relation) {
    let typ = referenced_type(schema, &relation.to);
    let Some(table) = schema.table_mut(&relation.from.table) else {
        return;
    };

    match table.column_mut(&relation.from.column) {
        Some(column) => {
            if column.reference.is_none() {
                column.reference = Some(relation.column_ref());
            }
        }
        None => {
            debug!(
                table = %relation.from.table,
                column = %relation.from.column,
                "adding missing FK column"
            );
            table.columns.push(Column {
                reference: Some(relation.column_ref()),
                ..Column::new(relation.from.column.clone(), typ)
            });
        }
    }
}

/// Keep the first relation for every `(from, to)` column pair.
fn dedupe(relations: impl Iterator<Item = Relation>) -> Vec<Relation> {
    let mut unique: Vec<Relation> = Vec::new();
    for relation in relations {
        if unique.iter().any(|r| r.same_endpoints(&relation)) {
            debug!(from = %relation.from.table, to = %relation.to.table, "dropping duplicate relation");
            continue;
        }
        unique.push(relation);
    }
    unique
}
