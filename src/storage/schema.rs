use std::fmt;

use itertools::Itertools;

use crate::error::DbError;

/// Capacity of the payload of a string cell. On disk a string cell
/// occupies one length byte plus this many payload bytes.
pub const STRING_CAPACITY: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Int,
    String,
}

impl Type {
    /// On-disk width of a cell of this type, in bytes.
    pub fn get_len(&self) -> usize {
        match self {
            Type::Int => 8,
            Type::String => 1 + STRING_CAPACITY,
        }
    }

    pub fn parse(s: &str) -> Result<Type, DbError> {
        match s {
            "int" => Ok(Type::Int),
            "string" => Ok(Type::String),
            _ => Err(DbError::new(&format!("unknown field type: {}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldItem {
    pub field_name: String,
    pub field_type: Type,
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub fields: Vec<FieldItem>,
}

impl Schema {
    pub fn new(fields: Vec<FieldItem>) -> Schema {
        Schema { fields }
    }

    /// Row size in bytes.
    pub fn get_size(&self) -> usize {
        self.fields.iter().map(|f| f.field_type.get_len()).sum()
    }

    pub fn get_field_type(&self, i: usize) -> Type {
        self.fields[i].field_type
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        if self.fields.len() != other.fields.len() {
            return false;
        }

        self.fields
            .iter()
            .zip(&other.fields)
            .all(|(a, b)| a.field_name == b.field_name && a.field_type == b.field_type)
    }
}

impl Eq for Schema {}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let depiction = self
            .fields
            .iter()
            .map(|field| format!("{}({:?})", field.field_name, field.field_type))
            .join(", ");
        write!(f, "({})", depiction)
    }
}

pub fn small_int_schema(width: usize, name_prefix: &str) -> Schema {
    let mut fields: Vec<FieldItem> = Vec::new();
    for i in 0..width {
        let field = FieldItem {
            field_name: format!("{}-{}", name_prefix, i),
            field_type: Type::Int,
        };
        fields.push(field);
    }

    Schema { fields }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_size() {
        let schema = small_int_schema(3, "f");
        assert_eq!(schema.get_size(), 24);
    }

    #[test]
    fn test_schema_eq() {
        assert_eq!(small_int_schema(2, "a"), small_int_schema(2, "a"));
        assert_ne!(small_int_schema(2, "a"), small_int_schema(2, "b"));
        assert_ne!(small_int_schema(2, "a"), small_int_schema(3, "a"));
    }
}
