use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::ast::*;
use crate::lexer::{self, LexError, Lexer, Token};
use crate::normalize::{self, PendingRelation};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Lex error on line {line}: {source}")]
    Lex { line: usize, source: LexError },
    #[error("Unrecognized statement on line {line}: {text}")]
    Unrecognized { line: usize, text: String },
    #[error("Table `{name}` is never closed")]
    UnclosedTable { name: String },
    #[error("Internal parser error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Report unrecognized lines instead of skipping them.
    pub strict: bool,
}

/// Parse DBML source into a normalized schema, skipping lines it does not understand.
pub fn parse(input: &str) -> Result<DatabaseSchema, ParseError> {
    parse_with(input, ParseOptions::default())
}

pub fn parse_with(input: &str, options: ParseOptions) -> Result<DatabaseSchema, ParseError> {
    Parser::new(input).with_options(options).parse()
}

/// Open `{ ... }` blocks, innermost last.
#[derive(Debug, Clone, Copy)]
enum Block {
    Table(usize),
    Project,
    /// Any block whose content is ignored (`indexes`, `Enum`, long-form `Ref`, ...).
    Skipped,
}

pub struct Parser<'a> {
    input: &'a str,
    options: ParseOptions,
    schema: DatabaseSchema,
    relations: Vec<PendingRelation>,
    blocks: Vec<Block>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            options: ParseOptions::default(),
            schema: DatabaseSchema::default(),
            relations: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn parse(mut self) -> Result<DatabaseSchema, ParseError> {
        if self.input.trim().is_empty() {
            return Ok(DatabaseSchema::default());
        }

        let input = self.input;
        for (i, raw) in input.lines().enumerate() {
            let line = i + 1;
            let text = raw.trim();
            if text.is_empty() || text.starts_with("//") {
                continue;
            }

            let (tokens, error) = Lexer::new(text).tokenize_partial();
            if let Some(source) = error {
                if self.options.strict && !matches!(self.blocks.last(), Some(Block::Skipped)) {
                    return Err(ParseError::Lex { line, source });
                }
                trace!(line, error = %source, "ignoring rest of line");
            }

            for statement in split_statements(&tokens) {
                self.statement(line, text, statement)?;
            }
        }

        if self.options.strict {
            if let Some(index) = self.blocks.iter().find_map(|b| match b {
                Block::Table(index) => Some(*index),
                _ => None,
            }) {
                let name = self
                    .schema
                    .tables
                    .get(index)
                    .map(|t| t.name.clone())
                    .unwrap_or_default();
                return Err(ParseError::UnclosedTable { name });
            }
        }

        let mut schema = self.schema;
        normalize::normalize(&mut schema, self.relations);
        Ok(schema)
    }

    fn statement(&mut self, line: usize, text: &str, tokens: &[Token]) -> Result<(), ParseError> {
        if tokens == [Token::RBrace] {
            if self.blocks.pop().is_none() {
                return self.unrecognized(line, text);
            }
            return Ok(());
        }

        if matches!(self.blocks.last(), None | Some(Block::Table(_))) {
            if let Some((name, alias)) = parse_table_header(tokens) {
                self.open_table(name, alias);
                return Ok(());
            }
        }

        if tokens.last() == Some(&Token::LBrace) {
            if self.blocks.is_empty() {
                if let Some(name) = parse_project_header(tokens) {
                    self.open_project(name);
                    return Ok(());
                }
            }
            trace!(line, "skipping block");
            self.blocks.push(Block::Skipped);
            return Ok(());
        }

        match self.blocks.last().copied() {
            None => self.top_level_statement(line, text, tokens),
            Some(Block::Table(index)) => self.table_statement(line, text, index, tokens),
            Some(Block::Project) => self.project_statement(line, text, tokens),
            Some(Block::Skipped) => Ok(()),
        }
    }

    fn open_table(&mut self, name: String, alias: Option<String>) {
        // A `Table` line inside an open table replaces it as the current table.
        if let Some(Block::Table(_)) = self.blocks.last() {
            self.blocks.pop();
        }

        debug!(table = %name, "opening table");
        self.schema.tables.push(Table {
            name,
            alias,
            columns: Vec::new(),
        });
        self.blocks.push(Block::Table(self.schema.tables.len() - 1));
    }

    fn open_project(&mut self, name: Option<String>) {
        let metadata = self.schema.metadata.get_or_insert_with(Map::new);
        if let Some(name) = name {
            metadata.insert("name".to_string(), Value::String(name));
        }
        self.blocks.push(Block::Project);
    }

    fn top_level_statement(&mut self, line: usize, text: &str, tokens: &[Token]) -> Result<(), ParseError> {
        match parse_ref(tokens) {
            Some((relation, name)) => {
                debug!(
                    from = %relation.from.table,
                    to = %relation.to.table,
                    op = relation_symbol(&relation),
                    "registering relation"
                );
                self.relations.push(PendingRelation { relation, name });
                Ok(())
            }
            None => self.unrecognized(line, text),
        }
    }

    fn table_statement(
        &mut self,
        line: usize,
        text: &str,
        index: usize,
        tokens: &[Token],
    ) -> Result<(), ParseError> {
        let Some((column, rest)) = parse_column(tokens) else {
            if is_note(tokens) {
                return Ok(());
            }
            return self.unrecognized(line, text);
        };

        // e.g. an unquoted multi-word type: `amount double precision [not null]`
        if !rest.is_empty() {
            if self.options.strict {
                return Err(ParseError::Unrecognized {
                    line,
                    text: text.to_string(),
                });
            }
            trace!(line, text, column = %column.name, "ignoring trailing tokens after column");
        }

        let table = self
            .schema
            .tables
            .get_mut(index)
            .ok_or_else(|| ParseError::Internal(format!("table index {} out of range", index)))?;

        if let Some(reference) = &column.reference {
            self.relations.push(PendingRelation {
                relation: Relation {
                    from: Endpoint::new(table.name.clone(), column.name.clone()),
                    to: Endpoint::new(reference.table.clone(), reference.column.clone()),
                    cardinality: reference.cardinality.unwrap_or(RelationCardinality::MANY_TO_ONE),
                    on_update: reference.on_update,
                    on_delete: reference.on_delete,
                },
                name: None,
            });
        }
        table.columns.push(column);
        Ok(())
    }

    fn project_statement(&mut self, line: usize, text: &str, tokens: &[Token]) -> Result<(), ParseError> {
        let [Token::Ident(key), Token::Colon, value @ ..] = tokens else {
            return self.unrecognized(line, text);
        };

        let value = match value {
            [Token::Str(s)] => s.clone(),
            _ => lexer::render(value),
        };
        self.schema
            .metadata
            .get_or_insert_with(Map::new)
            .insert(key.clone(), Value::String(value));
        Ok(())
    }

    fn unrecognized(&self, line: usize, text: &str) -> Result<(), ParseError> {
        if self.options.strict {
            return Err(ParseError::Unrecognized {
                line,
                text: text.to_string(),
            });
        }
        trace!(line, text, "skipping unrecognized statement");
        Ok(())
    }
}

fn relation_symbol(relation: &Relation) -> &'static str {
    match (relation.cardinality.from, relation.cardinality.to) {
        (Cardinality::One, Cardinality::One) => RelationOp::OneToOne.symbol(),
        (Cardinality::One, Cardinality::Many) => RelationOp::OneToMany.symbol(),
        (Cardinality::Many, Cardinality::One) => RelationOp::ManyToOne.symbol(),
        (Cardinality::Many, Cardinality::Many) => RelationOp::ManyToMany.symbol(),
    }
}

/// Split a tokenized line into logical lines: a statement ends after `{`,
/// and `}` always stands alone, unless inside `[...]`.
fn split_statements(tokens: &[Token]) -> Vec<&[Token]> {
    let tokens = tokens.strip_suffix(&[Token::Eof]).unwrap_or(tokens);
    let mut statements = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;

    for (i, tok) in tokens.iter().enumerate() {
        match tok {
            Token::LBracket => depth += 1,
            Token::RBracket => depth = depth.saturating_sub(1),
            Token::LBrace if depth == 0 => {
                statements.push(&tokens[start..=i]);
                start = i + 1;
            }
            Token::RBrace if depth == 0 => {
                if start < i {
                    statements.push(&tokens[start..i]);
                }
                statements.push(&tokens[i..=i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if start < tokens.len() {
        statements.push(&tokens[start..]);
    }
    statements
}

/// Split a settings list on commas that are not nested in parentheses.
fn split_list(tokens: &[Token]) -> Vec<&[Token]> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;

    for (i, tok) in tokens.iter().enumerate() {
        match tok {
            Token::LParen | Token::LBracket => depth += 1,
            Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
            Token::Comma if depth == 0 => {
                if start < i {
                    items.push(&tokens[start..i]);
                }
                start = i + 1;
            }
            _ => {}
        }
    }

    if start < tokens.len() {
        items.push(&tokens[start..]);
    }
    items
}

static EOF: Token = Token::Eof;

struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Cursor<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &'t Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &'t Token {
        self.tokens.get(self.pos + offset).unwrap_or(&EOF)
    }

    fn advance(&mut self) -> &'t Token {
        let tok = self.peek();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        self.peek().is_keyword(keyword)
    }

    fn expect_name(&mut self) -> Option<String> {
        let name = self.peek().as_name()?.to_string();
        self.pos += 1;
        Some(name)
    }

    fn is_done(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn rest(&self) -> &'t [Token] {
        self.tokens.get(self.pos..).unwrap_or(&[])
    }

    /// Consume a `open ... close` group and return its inner tokens.
    fn group(&mut self, open: &Token, close: &Token) -> Option<&'t [Token]> {
        if !self.eat(open) {
            return None;
        }

        let start = self.pos;
        let mut depth = 1usize;
        while !self.is_done() {
            let tok = self.advance();
            if tok == open {
                depth += 1;
            } else if tok == close {
                depth -= 1;
                if depth == 0 {
                    return self.tokens.get(start..self.pos - 1);
                }
            }
        }
        None
    }
}

/// `Table [schema.]name [as alias] [settings] {`
fn parse_table_header(tokens: &[Token]) -> Option<(String, Option<String>)> {
    let mut c = Cursor::new(tokens);
    if !c.check_keyword("table") {
        return None;
    }
    c.advance();

    let mut name = c.expect_name()?;
    while c.eat(&Token::Dot) {
        name = c.expect_name()?;
    }

    let mut alias = None;
    if c.check_keyword("as") {
        c.advance();
        alias = Some(c.expect_name()?);
    }

    if *c.peek() == Token::LBracket {
        c.group(&Token::LBracket, &Token::RBracket)?;
    }

    (c.eat(&Token::LBrace) && c.is_done()).then_some((name, alias))
}

/// `Project [name] {`
fn parse_project_header(tokens: &[Token]) -> Option<Option<String>> {
    let mut c = Cursor::new(tokens);
    if !c.check_keyword("project") {
        return None;
    }
    c.advance();

    let name = c.peek().as_name().map(String::from);
    if name.is_some() {
        c.advance();
    }

    (c.eat(&Token::LBrace) && c.is_done()).then_some(name)
}

/// Table-level `Note: '...'`.
fn is_note(tokens: &[Token]) -> bool {
    matches!(tokens, [first, Token::Colon, ..] if first.is_keyword("note"))
}

/// `name type[(args)] [settings]`, returning any tokens left unread.
fn parse_column(tokens: &[Token]) -> Option<(Column, &[Token])> {
    let mut c = Cursor::new(tokens);
    let name = c.expect_name()?;
    let mut typ = c.expect_name()?;

    if *c.peek() == Token::LParen {
        let args = c.group(&Token::LParen, &Token::RParen)?;
        typ = format!("{}({})", typ, lexer::render(args));
    }
    if *c.peek() == Token::LBracket && *c.peek_at(1) == Token::RBracket {
        c.advance();
        c.advance();
        typ.push_str("[]");
    }

    let mut column = Column::new(name, typ);
    if *c.peek() == Token::LBracket {
        if let Some(settings) = c.group(&Token::LBracket, &Token::RBracket) {
            apply_column_settings(&mut column, settings);
        }
    }
    Some((column, c.rest()))
}

fn apply_column_settings(column: &mut Column, settings: &[Token]) {
    for setting in split_list(settings) {
        if let [Token::Ident(key), Token::Colon, value @ ..] = setting {
            match key.to_lowercase().as_str() {
                "ref" => {
                    if let Some((op, target)) = parse_ref_target(value) {
                        column.reference = Some(ColumnRef {
                            cardinality: Some(op.cardinality()),
                            ..ColumnRef::new(target.table, target.column)
                        });
                    }
                }
                "default" => {
                    if let Some(default) = parse_default(value) {
                        column.default = Some(default);
                    }
                }
                "note" => {
                    if let [Token::Str(note)] = value {
                        if !note.is_empty() {
                            column.note = Some(note.clone());
                        }
                    }
                }
                _ => {}
            }
            continue;
        }

        match flag_name(setting).as_deref() {
            Some("pk" | "primary key") => column.pk = true,
            Some("unique") => column.unique = true,
            Some("not null" | "nn") => column.nullable = Some(false),
            Some("null") => column.nullable = Some(true),
            Some("increment" | "auto_increment" | "identity") => column.increment = true,
            _ => {}
        }
    }
}

/// Lowercased words of a keyword setting such as `Primary Key`.
fn flag_name(tokens: &[Token]) -> Option<String> {
    let words = tokens
        .iter()
        .map(|t| match t {
            Token::Ident(s) => Some(s.to_lowercase()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(words.join(" "))
}

fn parse_default(value: &[Token]) -> Option<DefaultValue> {
    match value {
        [] => None,
        [Token::Str(s)] if s.is_empty() => None,
        [Token::Str(s)] => Some(DefaultValue::Str(s.clone())),
        [Token::Ident(s)] if s.eq_ignore_ascii_case("true") => Some(DefaultValue::Bool(true)),
        [Token::Ident(s)] if s.eq_ignore_ascii_case("false") => Some(DefaultValue::Bool(false)),
        _ => {
            let raw = lexer::render(value);
            Some(parse_number(&raw).unwrap_or(DefaultValue::Str(raw)))
        }
    }
}

/// Unquoted numeric literal: `18`, `-1.5`, `.5`, `1e3`.
fn parse_number(s: &str) -> Option<DefaultValue> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(DefaultValue::Number(i.into()));
    }

    let f = s.parse::<f64>().ok()?;
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        return Some(DefaultValue::Number((f as i64).into()));
    }
    serde_json::Number::from_f64(f).map(DefaultValue::Number)
}

/// `-`, `<`, `>` or `<>`
fn parse_op(c: &mut Cursor) -> Option<RelationOp> {
    match c.advance() {
        Token::Lt if c.eat(&Token::Gt) => Some(RelationOp::ManyToMany),
        Token::Lt => Some(RelationOp::OneToMany),
        Token::Gt => Some(RelationOp::ManyToOne),
        Token::Dash => Some(RelationOp::OneToOne),
        _ => None,
    }
}

/// `[schema.]table.column`
fn parse_endpoint(c: &mut Cursor) -> Option<Endpoint> {
    let mut parts = vec![c.expect_name()?];
    while c.eat(&Token::Dot) {
        parts.push(c.expect_name()?);
    }

    let column = parts.pop()?;
    let table = parts.pop()?;
    Some(Endpoint { table, column })
}

/// Inline `ref:` value, e.g. `> users.id`.
fn parse_ref_target(value: &[Token]) -> Option<(RelationOp, Endpoint)> {
    let mut c = Cursor::new(value);
    let op = parse_op(&mut c)?;
    let target = parse_endpoint(&mut c)?;
    Some((op, target))
}

/// `Ref [name]: table1.col1 <op> table2.col2 [settings]`
fn parse_ref(tokens: &[Token]) -> Option<(Relation, Option<String>)> {
    let mut c = Cursor::new(tokens);
    if !c.check_keyword("ref") {
        return None;
    }
    c.advance();

    let mut name = None;
    match (c.peek(), c.peek_at(1)) {
        (Token::Colon, _) => {
            c.advance();
        }
        (tok, Token::Colon) if tok.as_name().is_some() => {
            name = tok.as_name().map(String::from);
            c.advance();
            c.advance();
        }
        (tok, next) if tok.as_name().is_some() && *next != Token::Dot => {
            name = tok.as_name().map(String::from);
            c.advance();
        }
        _ => {}
    }

    let from = parse_endpoint(&mut c)?;
    let op = parse_op(&mut c)?;
    let to = parse_endpoint(&mut c)?;

    let mut relation = Relation {
        from,
        to,
        cardinality: op.cardinality(),
        on_update: None,
        on_delete: None,
    };

    if *c.peek() == Token::LBracket {
        if let Some(settings) = c.group(&Token::LBracket, &Token::RBracket) {
            apply_ref_settings(&mut relation, settings);
        }
    }

    Some((relation, name))
}

fn apply_ref_settings(relation: &mut Relation, settings: &[Token]) {
    for setting in split_list(settings) {
        let [Token::Ident(key), Token::Colon, value @ ..] = setting else {
            continue;
        };
        let action = ReferentialAction::parse(&lexer::render(value));
        match key.to_lowercase().as_str() {
            "delete" => relation.on_delete = action,
            "update" => relation.on_update = action,
            _ => {}
        }
    }
}
