use std::fmt::Display;
use std::sync::Arc;

use self::schema::{Schema, STRING_LEN};
use self::value::Value;
use crate::common::{PageId, Slot};
use crate::error::{Result, StorageError};
use crate::storage::common::{DecodeError, Deserializer, Serializer};

pub mod schema;
pub mod value;

/// Where a tuple is stored: a page and the slot within that page.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordId {
    page_id: PageId,
    slot: Slot,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: Slot) -> Self {
        Self { page_id, slot }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tuple {
    schema: Arc<Schema>,
    values: Vec<Option<Value>>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple where every field is still unset.
    /// Returns an error if the schema has no columns.
    pub fn new(schema: Arc<Schema>) -> Result<Self> {
        if schema.is_empty() {
            return Err(StorageError::InvalidValue(
                "Cannot create a tuple for a schema without columns".to_owned(),
            ));
        }
        let values = vec![None; schema.len()];
        Ok(Self {
            schema,
            values,
            record_id: None,
        })
    }

    /// Creates a tuple and sets all of its fields.
    pub fn with_values(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(StorageError::InvalidValue(format!(
                "Expected {} values, got {}",
                schema.len(),
                values.len()
            )));
        }
        let mut tuple = Self::new(schema)?;
        for (i, value) in values.into_iter().enumerate() {
            tuple.set(i, value)?;
        }
        Ok(tuple)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Binds this tuple to another schema. The caller has to make sure both schemas are compatible.
    pub fn reset_schema(&mut self, schema: Arc<Schema>) {
        self.schema = schema;
    }

    /// Returns the value of a field, or None if it has not been set yet.
    pub fn get(&self, index: usize) -> Result<Option<&Value>> {
        self.values
            .get(index)
            .map(|val| val.as_ref())
            .ok_or_else(|| self.index_out_of_range(index))
    }

    pub fn set(&mut self, index: usize, value: Value) -> Result<()> {
        let type_id = self.schema.type_id(index)?;
        if value.type_id() != type_id {
            return Err(StorageError::InvalidValue(format!(
                "Cannot store {} value in column {index} of type {type_id}",
                value.type_id()
            )));
        }
        if let Value::String(text) = &value {
            if text.len() > STRING_LEN {
                return Err(StorageError::InvalidValue(format!(
                    "Text of {} bytes exceeds the maximum of {STRING_LEN} bytes",
                    text.len()
                )));
            }
        }
        let slot = self
            .values
            .get_mut(index)
            .ok_or_else(|| StorageError::NotFound(format!("Field index {index} is out of range")))?;
        *slot = Some(value);
        Ok(())
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    pub fn fields(&self) -> impl Iterator<Item = Option<&Value>> {
        self.values.iter().map(|val| val.as_ref())
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    fn index_out_of_range(&self, index: usize) -> StorageError {
        StorageError::NotFound(format!(
            "Field index {index} is out of range for a tuple with {} fields",
            self.values.len()
        ))
    }

    /// Writes every field in schema order. Unset fields are written as zero values.
    pub(crate) fn serialize(&self, serializer: &mut Serializer) {
        debug_assert_eq!(self.values.len(), self.schema.len());
        for (column, value) in self.schema.columns().iter().zip(self.values.iter()) {
            match value {
                Some(value) => value.serialize_value(serializer),
                None => Value::zero(column.type_id()).serialize_value(serializer),
            }
        }
    }

    pub(crate) fn parse(
        deserializer: &mut Deserializer,
        schema: &Arc<Schema>,
        record_id: RecordId,
    ) -> std::result::Result<Self, DecodeError> {
        let mut values = Vec::with_capacity(schema.len());
        for column in schema.columns() {
            values.push(Some(Value::parse_value(deserializer, column.type_id())?));
        }
        Ok(Self {
            schema: Arc::clone(schema),
            values,
            record_id: Some(record_id),
        })
    }
}

impl Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let line = self
            .values
            .iter()
            .map(|val| match val {
                Some(val) => val.to_string(),
                None => "null".to_owned(),
            })
            .collect::<Vec<String>>()
            .join("\t");
        write!(f, "{line}")
    }
}
