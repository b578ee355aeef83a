//! Validated SQL identifiers. Identifier positions cannot be bound, so names from
//! callers are checked and quoted here before they reach statement text.

use crate::error::AccessError;
use std::fmt;

/// PostgreSQL truncates identifiers longer than NAMEDATALEN - 1 bytes.
pub const MAX_IDENT_LEN: usize = 63;

/// A schema, table or column name that passed validation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ident(String);

impl Ident {
    pub fn parse(name: &str) -> Result<Self, AccessError> {
        if name.is_empty() {
            return Err(AccessError::Validation("identifier must not be empty".into()));
        }
        if name.len() > MAX_IDENT_LEN {
            return Err(AccessError::Validation(format!(
                "identifier longer than {} bytes: {}",
                MAX_IDENT_LEN,
                name.escape_debug()
            )));
        }
        if name.chars().any(char::is_control) {
            return Err(AccessError::Validation(format!(
                "identifier contains control characters: {}",
                name.escape_debug()
            )));
        }
        Ok(Ident(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form with embedded quotes doubled.
    pub fn quoted(&self) -> String {
        quote(&self.0)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub(crate) fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified(schema: &Ident, table: &Ident) -> String {
    format!("{}.{}", schema.quoted(), table.quoted())
}
