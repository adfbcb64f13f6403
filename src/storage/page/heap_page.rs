use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use crate::common::{KilnError, PageId, RecordId, Result, SlotId};
use crate::tuple::{Schema, Tuple};

/// Heap page layout:
///
/// +------------------+
/// | Slot Bitmap      |  (ceil(slot_count / 8) bytes)
/// +------------------+
/// | [slot 0]         |  (tuple_size bytes each)
/// | [slot 1]         |
/// | ...              |
/// | [slot n-1]       |
/// +------------------+
/// | Zero Padding     |
/// +------------------+
///
/// Bit i of the bitmap lives in byte i / 8 at bit position i % 8 (least
/// significant first) and is 1 iff slot i holds a tuple. Empty slots and the
/// padding are all zero bytes.
///
/// Each tuple costs tuple_size * 8 bits of slot plus 1 bit of bitmap, so
/// slot_count = floor(page_size * 8 / (tuple_size * 8 + 1)).
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    schema: Arc<Schema>,
    page_size: usize,
    slot_count: usize,
    header_size: usize,
}

impl PageLayout {
    /// Derives the slot geometry for tuples of `schema` on pages of `page_size` bytes.
    pub fn new(schema: Arc<Schema>, page_size: usize) -> Result<Self> {
        let tuple_size = schema.tuple_size();
        if tuple_size == 0 {
            return Err(KilnError::InvalidConfiguration(
                "schema has zero-width tuples".into(),
            ));
        }

        let slot_count = (page_size * 8) / (tuple_size * 8 + 1);
        if slot_count == 0 {
            return Err(KilnError::InvalidConfiguration(format!(
                "a {} byte tuple does not fit a {} byte page",
                tuple_size, page_size
            )));
        }
        if slot_count > u16::MAX as usize + 1 {
            return Err(KilnError::InvalidConfiguration(format!(
                "{} slots per page exceeds the slot id range",
                slot_count
            )));
        }

        Ok(Self {
            schema,
            page_size,
            slot_count,
            header_size: slot_count.div_ceil(8),
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    pub fn tuple_size(&self) -> usize {
        self.schema.tuple_size()
    }
}

/// Returns an all-zero page image, which decodes to a page with no tuples.
/// Used to extend a table file by one page.
pub fn empty_page_bytes(page_size: usize) -> Bytes {
    Bytes::from(vec![0u8; page_size])
}

/// In-memory form of one fixed-size heap page.
///
/// The bitmap and the slot array always agree: a slot holds a tuple exactly
/// when its bit is set.
#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    layout: Arc<PageLayout>,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirty: bool,
    /// Serialized page as of the last load or flush.
    before_image: Bytes,
}

impl HeapPage {
    /// Creates a page with every slot empty.
    pub fn new_empty(page_id: PageId, layout: Arc<PageLayout>) -> Self {
        Self {
            page_id,
            header: vec![0u8; layout.header_size()],
            tuples: vec![None; layout.slot_count()],
            dirty: false,
            before_image: empty_page_bytes(layout.page_size()),
            layout,
        }
    }

    /// Decodes a page image produced by `encode` (or `empty_page_bytes`).
    pub fn decode(page_id: PageId, layout: Arc<PageLayout>, data: &[u8]) -> Result<Self> {
        if data.len() != layout.page_size() {
            return Err(KilnError::CorruptPage {
                page_id,
                reason: format!(
                    "expected {} bytes, got {}",
                    layout.page_size(),
                    data.len()
                ),
            });
        }

        let header = data[..layout.header_size()].to_vec();
        let tuple_size = layout.tuple_size();
        let mut tuples = Vec::with_capacity(layout.slot_count());

        for i in 0..layout.slot_count() {
            if !bit_is_set(&header, i) {
                tuples.push(None);
                continue;
            }
            let start = layout.header_size() + i * tuple_size;
            let mut slot = &data[start..start + tuple_size];
            let mut tuple = Tuple::read_from(layout.schema().clone(), &mut slot).ok_or_else(
                || KilnError::CorruptPage {
                    page_id,
                    reason: format!("slot {} does not hold a valid tuple", i),
                },
            )?;
            tuple.set_record_id(Some(RecordId::new(page_id, SlotId::new(i as u16))));
            tuples.push(Some(tuple));
        }

        Ok(Self {
            page_id,
            layout,
            header,
            tuples,
            dirty: false,
            before_image: Bytes::copy_from_slice(data),
        })
    }

    /// Serializes the page to exactly `page_size` bytes.
    pub fn encode(&self) -> Bytes {
        let tuple_size = self.layout.tuple_size();
        let mut buf = BytesMut::with_capacity(self.layout.page_size());

        buf.put_slice(&self.header);
        for slot in &self.tuples {
            match slot {
                Some(tuple) => tuple.write_to(&mut buf),
                None => buf.put_bytes(0, tuple_size),
            }
        }
        buf.put_bytes(0, self.layout.page_size() - buf.len());

        buf.freeze()
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn layout(&self) -> &Arc<PageLayout> {
        &self.layout
    }

    /// Returns the number of slots on this page.
    pub fn slot_count(&self) -> usize {
        self.layout.slot_count()
    }

    /// Returns true if the given slot holds a tuple.
    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.slot_count() && bit_is_set(&self.header, slot)
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.slot_count())
            .filter(|&i| !self.is_slot_used(i))
            .count()
    }

    /// Returns the tuple in the given slot, if any.
    pub fn tuple(&self, slot: SlotId) -> Option<&Tuple> {
        self.tuples.get(slot.as_usize()).and_then(Option::as_ref)
    }

    /// Stores the tuple in the lowest-numbered empty slot and records its locator.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<RecordId> {
        if **tuple.schema() != **self.layout.schema() {
            return Err(KilnError::SchemaMismatch(format!(
                "tuple {} does not match the schema of page {}",
                tuple, self.page_id
            )));
        }

        let slot = (0..self.slot_count())
            .find(|&i| !self.is_slot_used(i))
            .ok_or(KilnError::PageFull(self.page_id))?;

        let record_id = RecordId::new(self.page_id, SlotId::new(slot as u16));
        tuple.set_record_id(Some(record_id));
        self.tuples[slot] = Some(tuple.clone());
        set_bit(&mut self.header, slot, true);

        Ok(record_id)
    }

    /// Removes the tuple from its slot and detaches its locator.
    pub fn delete_tuple(&mut self, tuple: &mut Tuple) -> Result<()> {
        let record_id = match tuple.record_id() {
            Some(rid) if rid.page_id == self.page_id => rid,
            _ => {
                return Err(KilnError::TupleNotOnPage {
                    page_id: self.page_id,
                })
            }
        };

        let slot = record_id.slot_id.as_usize();
        if !self.is_slot_used(slot) {
            return Err(KilnError::EmptySlot {
                page_id: self.page_id,
                slot: record_id.slot_id,
            });
        }

        self.tuples[slot] = None;
        set_bit(&mut self.header, slot, false);
        tuple.set_record_id(None);

        Ok(())
    }

    /// Returns an iterator over the stored tuples in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> + '_ {
        self.tuples.iter().flatten()
    }

    pub fn tuple_count(&self) -> usize {
        self.iter().count()
    }

    pub fn mark_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the page as it was when last loaded or flushed.
    pub fn before_image(&self) -> Result<HeapPage> {
        HeapPage::decode(self.page_id, self.layout.clone(), &self.before_image)
    }

    /// Captures the current contents as the new before-image.
    pub fn set_before_image(&mut self) {
        self.before_image = self.encode();
    }
}

/// Two pages are equal when they have the same id, bitmap and tuples.
impl PartialEq for HeapPage {
    fn eq(&self, other: &Self) -> bool {
        self.page_id == other.page_id && self.header == other.header && self.tuples == other.tuples
    }
}

fn bit_is_set(header: &[u8], i: usize) -> bool {
    header[i / 8] & (1 << (i % 8)) != 0
}

fn set_bit(header: &mut [u8], i: usize, value: bool) {
    if value {
        header[i / 8] |= 1 << (i % 8);
    } else {
        header[i / 8] &= !(1 << (i % 8));
    }
}
