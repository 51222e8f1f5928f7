//! Minimal TypeQL interpreter backing the test server.
//!
//! Understands just enough of the language for the integration tests:
//! `define` of entity and attribute types, single-statement `insert`,
//! and `match` with `has` constraints, optionally followed by `fetch`.

use std::sync::atomic::{AtomicU64, Ordering};

use typedb_client::concept::{
    Attribute, AttributeType, Concept, DocumentMap, Entity, EntityType, Node, Value, ValueType, IID,
};
use typedb_client::protocol::{ErrorCode, QueryType, ServerFailure, TransactionType};

#[derive(Debug, Clone, Default)]
pub struct EntityDef {
    pub label: String,
    pub owns: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub entities: Vec<EntityDef>,
    pub attributes: Vec<(String, ValueType)>,
}

impl Schema {
    fn entity(&self, label: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.label == label)
    }

    fn entity_mut(&mut self, label: &str) -> &mut EntityDef {
        if let Some(index) = self.entities.iter().position(|e| e.label == label) {
            &mut self.entities[index]
        } else {
            self.entities.push(EntityDef {
                label: label.to_string(),
                owns: Vec::new(),
            });
            self.entities.last_mut().expect("just pushed")
        }
    }

    fn attribute(&self, label: &str) -> Option<ValueType> {
        self.attributes
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, value_type)| *value_type)
    }

    pub fn define_text(&self) -> String {
        let mut text = String::from("define\n");
        for entity in &self.entities {
            text.push_str(&format!("  entity {}", entity.label));
            for owned in &entity.owns {
                text.push_str(&format!(", owns {}", owned));
            }
            text.push_str(";\n");
        }
        for (label, value_type) in &self.attributes {
            text.push_str(&format!("  attribute {}, value {};\n", label, value_type.name()));
        }
        text
    }
}

#[derive(Debug, Clone)]
pub struct Instance {
    pub iid: u64,
    pub label: String,
    pub attributes: Vec<(String, Value)>,
}

impl Instance {
    fn first(&self, attribute: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Store {
    pub schema: Schema,
    pub instances: Vec<Instance>,
    /// Bumped by every commit that changes something
    pub version: u64,
}

/// Server-side state of one open transaction.
#[derive(Debug)]
pub struct ServerTransaction {
    pub database: String,
    pub transaction_type: TransactionType,
    pub view: Store,
    pub inserted: Vec<Instance>,
    pub schema_changed: bool,
    /// Store version the view was taken from
    pub base_version: u64,
}

impl ServerTransaction {
    pub fn new(database: String, transaction_type: TransactionType, snapshot: Store) -> Self {
        Self {
            database,
            transaction_type,
            base_version: snapshot.version,
            view: snapshot,
            inserted: Vec::new(),
            schema_changed: false,
        }
    }

    pub fn reset(&mut self, snapshot: Store) {
        self.base_version = snapshot.version;
        self.view = snapshot;
        self.inserted.clear();
        self.schema_changed = false;
    }

    pub fn has_changes(&self) -> bool {
        self.schema_changed || !self.inserted.is_empty()
    }

    pub fn apply_to(self, store: &mut Store) {
        if !self.has_changes() {
            return;
        }
        if self.schema_changed {
            store.schema = self.view.schema;
        }
        store.instances.extend(self.inserted);
        store.version += 1;
    }
}

pub enum Outcome {
    Ok(QueryType),
    Rows {
        query_type: QueryType,
        columns: Vec<String>,
        rows: Vec<Vec<Option<Concept>>>,
    },
    Documents {
        query_type: QueryType,
        documents: Vec<Node>,
    },
}

fn syntax(message: impl Into<String>) -> ServerFailure {
    ServerFailure::new(ErrorCode::QUERY_SYNTAX, message)
}

fn semantic(message: impl Into<String>) -> ServerFailure {
    ServerFailure::new(ErrorCode::QUERY_SEMANTIC, message)
}

pub fn execute(
    transaction: &mut ServerTransaction,
    query: &str,
    include_instance_types: bool,
    iids: &AtomicU64,
) -> Result<Outcome, ServerFailure> {
    let query = query.trim();
    let (keyword, rest) = query.split_once(char::is_whitespace).unwrap_or((query, ""));
    match keyword {
        "define" => define(transaction, rest),
        "insert" => insert(transaction, rest, include_instance_types, iids),
        "match" => match_query(transaction, rest, include_instance_types),
        _ => Err(syntax(format!("[TQL03] Unrecognised query: '{}'", query))),
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Text(String),
}

fn tokenize(clause: &str) -> Result<Vec<Token>, ServerFailure> {
    let mut tokens = Vec::new();
    let mut chars = clause.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' {
            chars.next();
            let mut text = String::new();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some(c) => text.push(c),
                    None => return Err(syntax("Unterminated string literal")),
                }
            }
            tokens.push(Token::Text(text));
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '"' {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }
    Ok(tokens)
}

fn statements(body: &str) -> impl Iterator<Item = &str> {
    body.split(';').map(str::trim).filter(|s| !s.is_empty())
}

fn clauses(statement: &str) -> Result<Vec<Vec<Token>>, ServerFailure> {
    statement.split(',').map(tokenize).collect()
}

fn word(token: &Token) -> Option<&str> {
    match token {
        Token::Word(w) => Some(w),
        Token::Text(_) => None,
    }
}

fn variable(token: &Token) -> Option<&str> {
    word(token).and_then(|w| w.strip_prefix('$'))
}

fn literal(token: &Token, value_type: ValueType) -> Option<Value> {
    match (token, value_type) {
        (Token::Text(text), ValueType::String) => Some(Value::String(text.clone())),
        (Token::Word(w), ValueType::Integer) => w.parse().ok().map(Value::Integer),
        (Token::Word(w), ValueType::Double) => w.parse().ok().map(Value::Double),
        (Token::Word(w), ValueType::Boolean) => w.parse().ok().map(Value::Boolean),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// define
// ---------------------------------------------------------------------------

fn define(transaction: &mut ServerTransaction, body: &str) -> Result<Outcome, ServerFailure> {
    if transaction.transaction_type != TransactionType::Schema {
        return Err(semantic("Schema queries require a schema transaction"));
    }

    let mut schema = transaction.view.schema.clone();
    for statement in statements(body) {
        let clauses = clauses(statement)?;
        let head: Vec<&str> = clauses[0].iter().filter_map(word).collect();
        match head.as_slice() {
            ["entity", label] => {
                let entity = schema.entity_mut(label);
                for clause in &clauses[1..] {
                    let words: Vec<&str> = clause.iter().filter_map(word).collect();
                    match words.as_slice() {
                        ["owns", attribute] => {
                            if !entity.owns.iter().any(|o| o == attribute) {
                                entity.owns.push(attribute.to_string());
                            }
                        }
                        _ => return Err(syntax(format!("Unexpected entity clause in '{}'", statement))),
                    }
                }
            }
            ["attribute", label] => {
                let value_type = match clauses.get(1).map(|c| c.iter().filter_map(word).collect::<Vec<_>>()) {
                    Some(words) if words.len() == 2 && words[0] == "value" => ValueType::from_name(words[1])
                        .ok_or_else(|| semantic(format!("Unknown value type '{}'", words[1])))?,
                    _ => return Err(syntax(format!("Attribute '{}' needs a value type", label))),
                };
                schema.attributes.retain(|(name, _)| name != label);
                schema.attributes.push((label.to_string(), value_type));
            }
            _ => return Err(syntax(format!("Unexpected definition '{}'", statement))),
        }
    }

    for entity in &schema.entities {
        for owned in &entity.owns {
            if schema.attribute(owned).is_none() {
                return Err(semantic(format!("Attribute type '{}' not found", owned)));
            }
        }
    }

    transaction.view.schema = schema;
    transaction.schema_changed = true;
    Ok(Outcome::Ok(QueryType::Schema))
}

// ---------------------------------------------------------------------------
// insert
// ---------------------------------------------------------------------------

fn insert(
    transaction: &mut ServerTransaction,
    body: &str,
    include_instance_types: bool,
    iids: &AtomicU64,
) -> Result<Outcome, ServerFailure> {
    if !transaction.transaction_type.is_writable() {
        return Err(semantic("Write queries require a write or schema transaction"));
    }

    let mut columns = Vec::new();
    let mut created = Vec::new();
    for statement in statements(body) {
        let clauses = clauses(statement)?;
        let (var, label) = match clauses[0].as_slice() {
            [var, isa, label] if word(isa) == Some("isa") => match (variable(var), word(label)) {
                (Some(var), Some(label)) => (var.to_string(), label.to_string()),
                _ => return Err(syntax(format!("Malformed insert statement '{}'", statement))),
            },
            _ => return Err(syntax(format!("Malformed insert statement '{}'", statement))),
        };
        let entity = transaction
            .view
            .schema
            .entity(&label)
            .ok_or_else(|| semantic(format!("Type '{}' not found", label)))?;

        let mut attributes = Vec::new();
        for clause in &clauses[1..] {
            match clause.as_slice() {
                [has, attribute, value] if word(has) == Some("has") => {
                    let attribute = word(attribute).ok_or_else(|| syntax("Expected an attribute label"))?;
                    if !entity.owns.iter().any(|o| o == attribute) {
                        return Err(semantic(format!("Type '{}' does not own '{}'", label, attribute)));
                    }
                    let value_type = transaction
                        .view
                        .schema
                        .attribute(attribute)
                        .ok_or_else(|| semantic(format!("Attribute type '{}' not found", attribute)))?;
                    let value = literal(value, value_type).ok_or_else(|| {
                        semantic(format!("Value for '{}' must be a {}", attribute, value_type))
                    })?;
                    attributes.push((attribute.to_string(), value));
                }
                _ => return Err(syntax(format!("Malformed insert clause in '{}'", statement))),
            }
        }

        let instance = Instance {
            iid: iids.fetch_add(1, Ordering::SeqCst),
            label,
            attributes,
        };
        columns.push(var);
        created.push(Some(entity_concept(&instance, include_instance_types)));
        transaction.view.instances.push(instance.clone());
        transaction.inserted.push(instance);
    }

    Ok(Outcome::Rows {
        query_type: QueryType::Write,
        columns,
        rows: vec![created],
    })
}

// ---------------------------------------------------------------------------
// match / fetch
// ---------------------------------------------------------------------------

enum Constraint {
    Bind { attribute: String, var: String },
    Equals { attribute: String, value: Value },
}

struct Binding<'a> {
    instance: &'a Instance,
    attributes: Vec<(String, &'a Value)>,
}

fn match_query(
    transaction: &ServerTransaction,
    body: &str,
    include_instance_types: bool,
) -> Result<Outcome, ServerFailure> {
    let (pattern, fetch) = match body.split_once("fetch") {
        Some((pattern, fetch)) => (pattern, Some(fetch)),
        None => (body, None),
    };
    let mut pattern_statements = statements(pattern);
    let statement = pattern_statements
        .next()
        .ok_or_else(|| syntax("Empty match pattern"))?;
    if pattern_statements.next().is_some() {
        return Err(syntax("Only single-statement patterns are supported"));
    }

    let schema = &transaction.view.schema;
    let clauses = clauses(statement)?;
    let (var, label) = match clauses[0].as_slice() {
        [var, isa, label] if word(isa) == Some("isa") => match (variable(var), word(label)) {
            (Some(var), Some(label)) => (var.to_string(), label.to_string()),
            _ => return Err(syntax(format!("Malformed match statement '{}'", statement))),
        },
        _ => return Err(syntax(format!("Malformed match statement '{}'", statement))),
    };
    if schema.entity(&label).is_none() {
        return Err(semantic(format!("Type '{}' not found", label)));
    }

    let mut constraints = Vec::new();
    for clause in &clauses[1..] {
        match clause.as_slice() {
            [has, attribute, target] if word(has) == Some("has") => {
                let attribute = word(attribute).ok_or_else(|| syntax("Expected an attribute label"))?;
                let value_type = schema
                    .attribute(attribute)
                    .ok_or_else(|| semantic(format!("Attribute type '{}' not found", attribute)))?;
                let constraint = match variable(target) {
                    Some(bound) => Constraint::Bind {
                        attribute: attribute.to_string(),
                        var: bound.to_string(),
                    },
                    None => Constraint::Equals {
                        attribute: attribute.to_string(),
                        value: literal(target, value_type).ok_or_else(|| {
                            semantic(format!("Value for '{}' must be a {}", attribute, value_type))
                        })?,
                    },
                };
                constraints.push(constraint);
            }
            _ => return Err(syntax(format!("Malformed match clause in '{}'", statement))),
        }
    }

    let bindings: Vec<Binding<'_>> = transaction
        .view
        .instances
        .iter()
        .filter(|instance| instance.label == label)
        .filter_map(|instance| {
            let mut attributes = Vec::new();
            for constraint in &constraints {
                match constraint {
                    Constraint::Bind { attribute, var } => {
                        attributes.push((var.clone(), instance.first(attribute)?));
                    }
                    Constraint::Equals { attribute, value } => {
                        if !instance
                            .attributes
                            .iter()
                            .any(|(name, v)| name == attribute && v == value)
                        {
                            return None;
                        }
                    }
                }
            }
            Some(Binding { instance, attributes })
        })
        .collect();

    let attribute_label = |var: &str| {
        constraints.iter().find_map(|c| match c {
            Constraint::Bind { attribute, var: v } if v == var => Some(attribute.as_str()),
            _ => None,
        })
    };

    match fetch {
        None => {
            let mut columns = vec![var];
            columns.extend(constraints.iter().filter_map(|c| match c {
                Constraint::Bind { var, .. } => Some(var.clone()),
                Constraint::Equals { .. } => None,
            }));
            let rows = bindings
                .iter()
                .map(|binding| {
                    let mut row = vec![Some(entity_concept(binding.instance, include_instance_types))];
                    for (bound, value) in &binding.attributes {
                        let label = attribute_label(bound).unwrap_or_default();
                        row.push(Some(attribute_concept(label, value, include_instance_types)));
                    }
                    row
                })
                .collect();
            Ok(Outcome::Rows {
                query_type: QueryType::Read,
                columns,
                rows,
            })
        }
        Some(fetch) => {
            let entries = parse_fetch(fetch)?;
            let documents = bindings
                .iter()
                .map(|binding| {
                    let mut map = DocumentMap::new();
                    for (key, target) in &entries {
                        let node = match target.split_once('.') {
                            Some((owner, attribute)) if owner == var => binding
                                .instance
                                .first(attribute)
                                .map(|value| Node::from(attribute_concept(attribute, value, include_instance_types)))
                                .unwrap_or(Node::Leaf(None)),
                            Some(_) => Node::Leaf(None),
                            None if *target == var => {
                                Node::from(entity_concept(binding.instance, include_instance_types))
                            }
                            None => binding
                                .attributes
                                .iter()
                                .find(|(bound, _)| bound == target)
                                .map(|(bound, value)| {
                                    let label = attribute_label(bound).unwrap_or_default();
                                    Node::from(attribute_concept(label, value, include_instance_types))
                                })
                                .unwrap_or(Node::Leaf(None)),
                        };
                        map.insert(key.clone(), node);
                    }
                    Node::Map(map)
                })
                .collect();
            Ok(Outcome::Documents {
                query_type: QueryType::Read,
                documents,
            })
        }
    }
}

/// Parse `{ "key": $var, "key": $var.attribute }` into (key, target) pairs.
fn parse_fetch(fetch: &str) -> Result<Vec<(String, String)>, ServerFailure> {
    let body = fetch.trim().trim_end_matches(';').trim();
    let body = body
        .strip_prefix('{')
        .and_then(|b| b.strip_suffix('}'))
        .ok_or_else(|| syntax("Fetch body must be enclosed in braces"))?;

    body.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (key, target) = entry
                .split_once(':')
                .ok_or_else(|| syntax(format!("Malformed fetch entry '{}'", entry)))?;
            let target = target
                .trim()
                .strip_prefix('$')
                .ok_or_else(|| syntax(format!("Fetch entry '{}' must reference a variable", entry)))?;
            Ok((key.trim().trim_matches('"').to_string(), target.to_string()))
        })
        .collect()
}

fn entity_concept(instance: &Instance, include_instance_types: bool) -> Concept {
    Concept::Entity(Entity {
        iid: IID::from(instance.iid.to_be_bytes().to_vec()),
        type_: include_instance_types.then(|| EntityType::new(instance.label.clone())),
    })
}

fn attribute_concept(label: &str, value: &Value, include_instance_types: bool) -> Concept {
    Concept::Attribute(Attribute {
        iid: IID::from(format!("{}:{}", label, value).into_bytes()),
        value: value.clone(),
        type_: include_instance_types.then(|| AttributeType::new(label, Some(value.value_type()))),
    })
}
