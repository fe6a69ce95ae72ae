use std::sync::Arc;

use crate::catalog::SchemaRegistry;
use crate::common::{PageId, Slot, TransactionId};
use crate::error::{Result, StorageError};
use crate::storage::common::{DecodeError, Deserializer, Serializer};
use crate::storage::Page;
use crate::tuple::schema::Schema;
use crate::tuple::{RecordId, Tuple};

/// How tuples of a fixed size are arranged on a page of a fixed size.
///
/// A page starts with a bitmap holding one bit per slot, followed by the slots and
/// zero padding up to the page size:
/// ```text
/// [header: header_size bytes][slot 0]...[slot slot_count - 1][padding]
/// ```
/// Bit `i % 8` of header byte `i / 8` is set iff slot i holds a tuple.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PageLayout {
    page_size: usize,
    tuple_size: usize,
    slot_count: usize,
    header_size: usize,
}

impl PageLayout {
    /// Returns an error if not even a single tuple fits on a page.
    pub fn new(page_size: usize, tuple_size: usize) -> Result<Self> {
        if tuple_size == 0 {
            return Err(StorageError::InvalidValue(
                "Cannot store tuples without any columns".to_owned(),
            ));
        }
        // every slot needs its tuple bytes plus one bit in the header
        let slot_count = (page_size * 8) / (tuple_size * 8 + 1);
        if slot_count == 0 {
            return Err(StorageError::TupleTooLarge {
                tuple_size,
                page_size,
            });
        }
        let header_size = (slot_count + 7) / 8;

        Ok(Self {
            page_size,
            tuple_size,
            slot_count,
            header_size,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }
}

#[derive(Debug)]
pub struct HeapPage {
    page_id: PageId,
    schema: Arc<Schema>,
    layout: PageLayout,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirtied_by: Option<TransactionId>,
    before_image: Arc<[u8]>,
}

impl HeapPage {
    /// Decodes a page from exactly `layout.page_size()` bytes.
    /// The layout has to be derived from the given schema.
    pub fn new(
        page_id: PageId,
        schema: Arc<Schema>,
        layout: PageLayout,
        data: &[u8],
    ) -> Result<Self> {
        let (header, tuples) = decode(page_id, &schema, &layout, data)
            .map_err(|source| StorageError::CorruptPage { page_id, source })?;

        let mut page = Self {
            page_id,
            schema,
            layout,
            header,
            tuples,
            dirtied_by: None,
            before_image: Arc::from(Vec::new()),
        };
        page.set_before_image();
        Ok(page)
    }

    /// Decodes a page, looking up the schema of the page's table in the registry.
    pub fn from_registry(
        registry: &dyn SchemaRegistry,
        page_id: PageId,
        page_size: usize,
        data: &[u8],
    ) -> Result<Self> {
        let schema = registry.schema_for(page_id.table_id())?;
        let layout = PageLayout::new(page_size, schema.tuple_size())?;
        Self::new(page_id, schema, layout, data)
    }

    /// Returns the bytes of a page without any tuples
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn slot_count(&self) -> usize {
        self.layout.slot_count
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.layout.slot_count && is_bit_set(&self.header, slot)
    }

    fn mark_slot_used(&mut self, slot: usize, used: bool) {
        let mask = 1 << (slot % 8);
        if used {
            self.header[slot / 8] |= mask;
        } else {
            self.header[slot / 8] &= !mask;
        }
    }

    pub fn empty_slot_count(&self) -> usize {
        (0..self.layout.slot_count)
            .filter(|slot| !self.is_slot_used(*slot))
            .count()
    }

    /// Returns the tuple stored in a slot, if any
    pub fn tuple(&self, slot: usize) -> Option<&Tuple> {
        self.tuples.get(slot).and_then(|tuple| tuple.as_ref())
    }

    /// Iterates over the stored tuples in slot order
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().filter_map(|tuple| tuple.as_ref())
    }

    /// Stores the tuple in the lowest free slot and attaches the new record id to it.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<RecordId> {
        // a tuple rebound to a schema of another shape would not fill its slot
        if **tuple.schema() != *self.schema || tuple.values().len() != self.schema.len() {
            return Err(StorageError::SchemaMismatch {
                expected: self.schema.to_string(),
                actual: tuple.schema().to_string(),
            });
        }
        let slot = (0..self.layout.slot_count)
            .find(|slot| !self.is_slot_used(*slot))
            .ok_or(StorageError::PageFull(self.page_id))?;

        let record_id = RecordId::new(self.page_id, slot as Slot);
        tuple.set_record_id(Some(record_id));
        let mut stored = tuple.clone();
        stored.reset_schema(Arc::clone(&self.schema));
        self.tuples[slot] = Some(stored);
        self.mark_slot_used(slot, true);

        Ok(record_id)
    }

    /// Frees the slot referenced by the tuple's record id and clears the record id.
    pub fn delete_tuple(&mut self, tuple: &mut Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(StorageError::TupleNotPlaced)?;
        let slot = record_id.slot() as usize;
        if record_id.page_id() != self.page_id || slot >= self.layout.slot_count {
            return Err(StorageError::SlotNotOwned {
                record_id,
                page_id: self.page_id,
            });
        }
        if !self.is_slot_used(slot) {
            return Err(StorageError::SlotAlreadyEmpty(record_id));
        }

        self.tuples[slot] = None;
        self.mark_slot_used(slot, false);
        tuple.set_record_id(None);

        Ok(())
    }
}

impl Page for HeapPage {
    fn id(&self) -> PageId {
        self.page_id
    }

    fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    fn mark_dirty(&mut self, dirty: bool, txn: TransactionId) {
        self.dirtied_by = if dirty { Some(txn) } else { None };
    }

    fn page_data(&self) -> Vec<u8> {
        let mut data = Self::empty_page_data(self.layout.page_size);
        let mut serializer = Serializer::new(&mut data);
        serializer.copy_bytes(&self.header);
        for tuple in &self.tuples {
            match tuple {
                Some(tuple) => tuple.serialize(&mut serializer),
                None => serializer.zeroes(self.layout.tuple_size),
            }
        }
        // the remaining bytes are already zero and serve as padding
        data
    }

    fn before_image(&self) -> Result<Self> {
        Self::new(
            self.page_id,
            Arc::clone(&self.schema),
            self.layout,
            &self.before_image,
        )
    }

    fn set_before_image(&mut self) {
        self.before_image = Arc::from(self.page_data());
    }
}

fn is_bit_set(header: &[u8], slot: usize) -> bool {
    (header[slot / 8] & (1 << (slot % 8))) != 0
}

fn decode(
    page_id: PageId,
    schema: &Arc<Schema>,
    layout: &PageLayout,
    data: &[u8],
) -> std::result::Result<(Vec<u8>, Vec<Option<Tuple>>), DecodeError> {
    if data.len() != layout.page_size {
        return Err(DecodeError::BufferSize {
            expected: layout.page_size,
            actual: data.len(),
        });
    }
    let mut deserializer = Deserializer::new(data);
    let header = deserializer.read_bytes(layout.header_size)?.to_vec();

    let mut tuples = Vec::with_capacity(layout.slot_count);
    for slot in 0..layout.slot_count {
        if is_bit_set(&header, slot) {
            let record_id = RecordId::new(page_id, slot as Slot);
            tuples.push(Some(Tuple::parse(&mut deserializer, schema, record_id)?));
        } else {
            // keep the read position aligned to the next slot
            deserializer.skip(layout.tuple_size)?;
            tuples.push(None);
        }
    }

    Ok((header, tuples))
}
