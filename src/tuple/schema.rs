use std::fmt::Display;
use std::str::FromStr;

use crate::error::{Result, StorageError};

/// Maximum number of bytes a text value may occupy.
pub const STRING_LEN: usize = 128;

const I32_SIZE: usize = std::mem::size_of::<i32>();

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeId {
    Integer,
    Text,
}

impl TypeId {
    /// Returns how many bytes every value of this type occupies when serialized
    pub fn size(&self) -> usize {
        match self {
            TypeId::Integer => I32_SIZE,
            // length prefix followed by the padded content
            TypeId::Text => I32_SIZE + STRING_LEN,
        }
    }
}

impl FromStr for TypeId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Integer" | "integer" | "int" => Ok(TypeId::Integer),
            "Text" | "text" => Ok(TypeId::Text),
            s => Err(StorageError::NotFound(format!("Invalid TypeId {s}"))),
        }
    }
}

impl Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDefinition {
    type_id: TypeId,
    column_name: Option<String>,
}

impl ColumnDefinition {
    pub fn new(type_id: TypeId, column_name: impl Into<String>) -> Self {
        Self {
            type_id,
            column_name: Some(column_name.into()),
        }
    }

    /// creates a column definition where only the type is known
    pub fn with_type_id(type_id: TypeId) -> Self {
        Self {
            type_id,
            column_name: None,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn column_name(&self) -> Option<&str> {
        self.column_name.as_deref()
    }
}

impl Display for ColumnDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({})",
            self.column_name.as_deref().unwrap_or(""),
            self.type_id
        )
    }
}

/// An immutable, ordered list of columns.
///
/// Two schemas are equal if they have the same number of columns and the n-th column
/// of both schemas has the same type. Column names are ignored.
#[derive(Clone, Debug)]
pub struct Schema {
    columns: Vec<ColumnDefinition>,
}

impl Schema {
    /// An empty column list is accepted here, but no tuple or page can be built from it:
    /// `Tuple::new` and `HeapFile::open` reject schemas without columns.
    pub fn new(columns: Vec<ColumnDefinition>) -> Self {
        Self { columns }
    }

    /// Creates a schema with anonymous columns of the given types
    pub fn from_types(types: &[TypeId]) -> Self {
        Self::new(
            types
                .iter()
                .map(|type_id| ColumnDefinition::with_type_id(*type_id))
                .collect(),
        )
    }

    /// Creates a schema whose columns are the columns of `left` followed by the columns of `right`
    pub fn merge(left: &Schema, right: &Schema) -> Self {
        let columns = left
            .columns
            .iter()
            .chain(right.columns.iter())
            .cloned()
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, index: usize) -> Result<&ColumnDefinition> {
        self.columns.get(index).ok_or_else(|| {
            StorageError::NotFound(format!(
                "Column index {index} is out of range for a schema with {} columns",
                self.columns.len()
            ))
        })
    }

    pub fn type_id(&self, index: usize) -> Result<TypeId> {
        self.column(index).map(|col| col.type_id())
    }

    pub fn column_name(&self, index: usize) -> Result<Option<&str>> {
        self.column(index).map(|col| col.column_name())
    }

    /// Returns the index of the first column with the given name
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|col| col.column_name() == Some(name))
            .ok_or_else(|| StorageError::NotFound(format!("No column named {name}")))
    }

    /// Size in bytes of a serialized tuple of this schema
    pub fn tuple_size(&self) -> usize {
        self.columns.iter().map(|col| col.type_id().size()).sum()
    }

    /// Prepends each column name, e.g. with the alias 'tbl' the column 'id' is renamed to 'tbl.id'.
    /// Anonymous columns keep an empty name after the alias.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|col| {
                ColumnDefinition::new(
                    col.type_id(),
                    format!("{}.{}", prefix, col.column_name().unwrap_or("")),
                )
            })
            .collect();
        Self { columns }
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|(a, b)| a.type_id() == b.type_id())
    }
}

impl Eq for Schema {}

/// Parses a comma separated list of columns such as `id:int,name:text` or `int,text`.
impl FromStr for Schema {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        let columns = s
            .split(',')
            .map(str::trim)
            .map(|col| match col.split_once(':') {
                Some((name, type_id)) => {
                    Ok(ColumnDefinition::new(type_id.trim().parse()?, name.trim()))
                }
                None => Ok(ColumnDefinition::with_type_id(col.parse()?)),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(columns))
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let columns = self
            .columns
            .iter()
            .map(|col| col.to_string())
            .collect::<Vec<String>>()
            .join(", ");
        write!(f, "{columns}")
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnDefinition, Schema, TypeId, STRING_LEN};
    use crate::error::StorageError;

    fn accounts() -> Schema {
        Schema::new(vec![
            ColumnDefinition::new(TypeId::Integer, "id"),
            ColumnDefinition::new(TypeId::Text, "name"),
            ColumnDefinition::new(TypeId::Integer, "id"),
        ])
    }

    #[test]
    fn computes_tuple_size() {
        let schema = accounts();
        assert_eq!(schema.tuple_size(), 4 + 4 + STRING_LEN + 4);
        assert_eq!(Schema::from_types(&[TypeId::Integer]).tuple_size(), 4);
    }

    #[test]
    fn name_lookup_returns_first_match() {
        let schema = accounts();
        assert_eq!(schema.index_of("id").unwrap(), 0);
        assert_eq!(schema.index_of("name").unwrap(), 1);
        assert!(matches!(
            schema.index_of("email"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn index_lookup_is_bounds_checked() {
        let schema = accounts();
        assert_eq!(schema.type_id(1).unwrap(), TypeId::Text);
        assert_eq!(schema.column_name(2).unwrap(), Some("id"));
        assert!(matches!(schema.type_id(3), Err(StorageError::NotFound(_))));
        assert!(matches!(
            schema.column_name(3),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn equality_ignores_names() {
        let named = accounts();
        let anonymous = Schema::from_types(&[TypeId::Integer, TypeId::Text, TypeId::Integer]);
        assert_eq!(named, anonymous);

        let different_types = Schema::from_types(&[TypeId::Integer, TypeId::Integer, TypeId::Text]);
        assert_ne!(named, different_types);

        let shorter = Schema::from_types(&[TypeId::Integer, TypeId::Text]);
        assert_ne!(named, shorter);
    }

    #[test]
    fn merge_keeps_left_then_right_order() {
        let left = Schema::new(vec![ColumnDefinition::new(TypeId::Text, "a")]);
        let right = Schema::new(vec![
            ColumnDefinition::new(TypeId::Integer, "b"),
            ColumnDefinition::with_type_id(TypeId::Text),
        ]);
        let merged = Schema::merge(&left, &right);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged.column_name(0).unwrap(), Some("a"));
        assert_eq!(merged.column_name(1).unwrap(), Some("b"));
        assert_eq!(merged.column_name(2).unwrap(), None);
        assert_eq!(merged.tuple_size(), left.tuple_size() + right.tuple_size());
    }

    #[test]
    fn prefix_qualifies_column_names() {
        let schema = accounts().with_prefix("acc");
        assert_eq!(schema.index_of("acc.name").unwrap(), 1);
        assert_eq!(schema.to_string(), "acc.id(Integer), acc.name(Text), acc.id(Integer)");
    }

    #[test]
    fn parses_column_lists() {
        let schema: Schema = "id:int, name:text,Integer".parse().unwrap();
        assert_eq!(schema, accounts());
        assert_eq!(schema.column_name(1).unwrap(), Some("name"));
        assert_eq!(schema.column_name(2).unwrap(), None);

        assert!(matches!(
            "int,float".parse::<Schema>(),
            Err(StorageError::NotFound(_))
        ));
    }
}
