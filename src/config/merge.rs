//! Merging user configuration onto the default schema.
//!
//! # Rules
//! - Schema keys always survive, at the same depth.
//! - Table/table pairs merge recursively; anything else is replaced wholesale.
//! - Keys unknown to the schema are kept and reported, never dropped.

use toml::{Table, Value};

/// Path label used for the top level of a configuration.
pub const ROOT_LABEL: &str = "<root>";

/// Deep-merge `user` onto `schema`, returning a new table.
///
/// Neither input is modified. User values are taken verbatim, with no type
/// check against the schema default.
pub fn merge_with_defaults(schema: &Table, user: &Table) -> Table {
    let mut merged = Table::new();

    for (key, default) in schema {
        let value = match (default, user.get(key)) {
            (Value::Table(default_table), Some(Value::Table(user_table))) => {
                Value::Table(merge_with_defaults(default_table, user_table))
            }
            (_, Some(user_value)) => user_value.clone(),
            (_, None) => default.clone(),
        };
        merged.insert(key.clone(), value);
    }

    for (key, user_value) in user {
        if !schema.contains_key(key) {
            merged.insert(key.clone(), user_value.clone());
        }
    }

    merged
}

/// A configuration key that has no counterpart in the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnexpectedKey {
    /// Label of the table holding the key, e.g. `<root>` or `[app]`.
    pub parent: String,
    pub key: String,
}

impl UnexpectedKey {
    /// Full bracketed path, e.g. `[app][UNKNOWN]`.
    pub fn path(&self) -> String {
        format!("{}[{}]", self.parent, self.key)
    }
}

impl std::fmt::Display for UnexpectedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Config entry key {} not in schema", self.path())
    }
}

/// Report every key in `user` that the schema does not define.
///
/// Recurses into sections that the schema does define so that stray keys
/// inside valid sections are caught too. Each finding is logged as a warning.
pub fn warn_unexpected_keys(schema: &Table, user: &Table, path_label: &str) -> Vec<UnexpectedKey> {
    let mut found = Vec::new();
    collect_unexpected(schema, user, path_label, &mut found);

    for unexpected in &found {
        tracing::warn!(path = %unexpected.path(), "{}", unexpected);
    }
    found
}

fn collect_unexpected(schema: &Table, user: &Table, label: &str, found: &mut Vec<UnexpectedKey>) {
    for (key, user_value) in user {
        match (schema.get(key), user_value) {
            (None, _) => found.push(UnexpectedKey {
                parent: label.to_string(),
                key: key.clone(),
            }),
            (Some(Value::Table(schema_table)), Value::Table(user_table)) => {
                collect_unexpected(schema_table, user_table, &child_label(label, key), found);
            }
            _ => {}
        }
    }
}

// Sections directly under the root are labelled `[section]`, deeper ones
// keep the parent chain.
fn child_label(parent: &str, key: &str) -> String {
    if parent == ROOT_LABEL {
        format!("[{}]", key)
    } else {
        format!("{}[{}]", parent, key)
    }
}

/// A user value whose TOML type differs from the schema default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub path: String,
    pub expected: &'static str,
    pub found: &'static str,
}

impl std::fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Config entry {} should be {} but is {}",
            self.path, self.expected, self.found
        )
    }
}

/// Compare user value types against schema defaults.
///
/// Purely diagnostic: the merge never consults this.
pub fn type_mismatches(schema: &Table, user: &Table) -> Vec<TypeMismatch> {
    let mut found = Vec::new();
    collect_mismatches(schema, user, ROOT_LABEL, &mut found);
    found
}

fn collect_mismatches(schema: &Table, user: &Table, label: &str, found: &mut Vec<TypeMismatch>) {
    for (key, default) in schema {
        let Some(user_value) = user.get(key) else {
            continue;
        };
        match (default, user_value) {
            (Value::Table(schema_table), Value::Table(user_table)) => {
                collect_mismatches(schema_table, user_table, &child_label(label, key), found);
            }
            _ if default.type_str() != user_value.type_str() => found.push(TypeMismatch {
                path: format!("{}[{}]", label, key),
                expected: default.type_str(),
                found: user_value.type_str(),
            }),
            _ => {}
        }
    }
}
