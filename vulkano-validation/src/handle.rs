// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Generation-checked handle tables.
//!
//! Every object of a device lives in a [`HandleTable`] that is specific to its type. The handle
//! that is given out for an object encodes where it lives:
//!
//! ```text
//!  63                32 31      24 23                 0
//! +--------------------+----------+--------------------+
//! |     generation     |  device  |     slot index     |
//! +--------------------+----------+--------------------+
//! ```
//!
//! The low 8 bits of the generation hold the [`ObjectType`] tag, bit 8 is set while the slot is
//! occupied and the remaining bits count how often the slot was reused. Since the generation of
//! an occupied slot always has the occupied bit set, the null handle is never valid.

use crate::{
    object::{Object, ObjectRef, ObjectType},
    ValidationError, ValidationErrorKind,
};
use parking_lot::RwLock;
use std::{
    error::Error,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    sync::Arc,
};

const NIL: u32 = u32::MAX;

const TAG_MASK: u32 = 0xFF;

const OCCUPIED_BIT: u32 = 1 << 8;

const INDEX_BITS: u32 = 24;

const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;

/// The position of an object in a [`SlotMap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SlotId {
    index: u32,
    generation: u32,
}

impl SlotId {
    #[inline]
    pub(crate) const fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub(crate) const fn generation(self) -> u32 {
        self.generation
    }

    #[inline]
    pub(crate) const fn tag(self) -> u32 {
        self.generation & TAG_MASK
    }

    #[inline]
    const fn is_occupied(self) -> bool {
        self.generation & OCCUPIED_BIT != 0
    }
}

/// A slot map with generation-checked keys. Removed slots are reused through a free list, and
/// every reuse advances the generation of the slot, so that keys of removed values never match
/// again.
#[derive(Debug)]
pub(crate) struct SlotMap<V> {
    slots: Vec<Slot<V>>,
    len: u32,
    free_list_head: u32,
}

#[derive(Debug)]
struct Slot<V> {
    generation: u32,
    inner: SlotInner<V>,
}

#[derive(Debug)]
enum SlotInner<V> {
    Occupied(V),
    Vacant { next_free: u32 },
}

impl<V> Default for SlotMap<V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SlotMap<V> {
    #[inline]
    pub(crate) const fn new() -> Self {
        SlotMap {
            slots: Vec::new(),
            len: 0,
            free_list_head: NIL,
        }
    }

    #[inline]
    pub(crate) fn reserved_len(&self) -> u32 {
        self.slots.len() as u32
    }

    #[inline]
    pub(crate) fn len(&self) -> u32 {
        self.len
    }

    /// Inserts the value returned by `f`, which receives the id the value is going to have.
    pub(crate) fn insert_with_tag(&mut self, tag: u32, f: impl FnOnce(SlotId) -> V) -> SlotId {
        assert_eq!(tag & !TAG_MASK, 0);

        if self.free_list_head != NIL {
            let index = self.free_list_head;
            let slot = &mut self.slots[index as usize];
            let generation = slot.generation.wrapping_add(OCCUPIED_BIT | tag);
            let id = SlotId { index, generation };

            let SlotInner::Vacant { next_free } = slot.inner else {
                unreachable!("the free list only links vacant slots");
            };

            self.free_list_head = next_free;
            slot.generation = generation;
            slot.inner = SlotInner::Occupied(f(id));
            self.len += 1;

            id
        } else {
            if self.slots.len() > INDEX_MASK as usize {
                capacity_overflow();
            }

            let index = self.slots.len() as u32;
            let generation = OCCUPIED_BIT | tag;
            let id = SlotId { index, generation };

            self.slots.push(Slot {
                generation,
                inner: SlotInner::Occupied(f(id)),
            });
            self.len += 1;

            id
        }
    }

    pub(crate) fn remove(&mut self, id: SlotId) -> Option<V> {
        let slot = self.slots.get_mut(id.index() as usize)?;

        if slot.generation != id.generation() || !id.is_occupied() {
            return None;
        }

        slot.generation = (id.generation() & !TAG_MASK).wrapping_add(OCCUPIED_BIT);

        let inner = std::mem::replace(
            &mut slot.inner,
            SlotInner::Vacant {
                next_free: self.free_list_head,
            },
        );
        self.free_list_head = id.index();
        self.len -= 1;

        match inner {
            SlotInner::Occupied(value) => Some(value),
            SlotInner::Vacant { .. } => unreachable!("an occupied generation has a value"),
        }
    }

    #[inline]
    pub(crate) fn get(&self, id: SlotId) -> Option<&V> {
        let slot = self.slots.get(id.index() as usize)?;

        if slot.generation == id.generation() {
            match &slot.inner {
                SlotInner::Occupied(value) => Some(value),
                SlotInner::Vacant { .. } => None,
            }
        } else {
            None
        }
    }

    /// Returns whether `id` names a slot that existed at some point but has since been vacated
    /// or reused.
    pub(crate) fn was_removed(&self, id: SlotId) -> bool {
        let Some(slot) = self.slots.get(id.index() as usize) else {
            return false;
        };

        // Above the tag, the generation counts insertions and removals of the slot.
        let age = (slot.generation >> 8).wrapping_sub(id.generation() >> 8) & 0xFF_FFFF;

        id.is_occupied() && age != 0 && age < 1 << 23
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (SlotId, &V)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match &slot.inner {
                SlotInner::Occupied(value) => Some((
                    SlotId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )),
                SlotInner::Vacant { .. } => None,
            })
    }
}

#[cold]
fn capacity_overflow() -> ! {
    panic!("capacity overflow");
}

/// An ID of any object of a device.
///
/// The type parameter denotes the type of object being referred to. The raw value of an id is the
/// handle that the API user sees.
///
/// Note that this ID **is not** globally unique. It is unique in the scope of a logical device.
#[repr(transparent)]
pub struct Id<T> {
    raw: u64,
    marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    /// The null handle, which never refers to an object.
    pub const NULL: Self = Id::from_raw(0);

    /// Creates an id from a raw handle value. Whether it refers to a live object is only decided
    /// once it is looked up.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Id {
            raw,
            marker: PhantomData,
        }
    }

    #[inline]
    const fn new(device_tag: u8, slot: SlotId) -> Self {
        Id::from_raw(
            (slot.generation() as u64) << 32
                | (device_tag as u64) << INDEX_BITS
                | slot.index() as u64,
        )
    }

    /// Returns the raw handle value.
    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.raw
    }

    /// Returns whether this is the null handle.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.raw == 0
    }

    #[inline]
    pub(crate) const fn device_tag(self) -> u8 {
        (self.raw >> INDEX_BITS) as u8
    }

    #[inline]
    pub(crate) const fn slot(self) -> SlotId {
        SlotId {
            index: self.raw as u32 & INDEX_MASK,
            generation: (self.raw >> 32) as u32,
        }
    }
}

impl<T: Object> Id<T> {
    /// Returns a type-erased reference to the object.
    #[inline]
    pub fn erase(self) -> ObjectRef {
        ObjectRef {
            object_type: T::TYPE,
            handle: self.raw,
        }
    }
}

impl<T> Clone for Id<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({:#018x})", self.raw)
    }
}

impl<T> PartialEq for Id<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

/// The objects of one type that belong to one device.
///
/// Lookups take a read lock, creation and destruction a write lock. Records are reference
/// counted, so a record that was looked up stays readable after it is erased from the table.
#[derive(Debug)]
pub struct HandleTable<T> {
    device_tag: u8,
    slots: RwLock<SlotMap<Arc<T>>>,
}

impl<T: Object> HandleTable<T> {
    pub(crate) fn new(device_tag: u8) -> Self {
        HandleTable {
            device_tag,
            slots: RwLock::new(SlotMap::new()),
        }
    }

    /// Registers the record returned by `f`, which receives the id the record is going to have.
    pub(crate) fn register_with(&self, f: impl FnOnce(Id<T>) -> T) -> (Id<T>, Arc<T>) {
        let device_tag = self.device_tag;
        let mut slots = self.slots.write();
        let slot = slots.insert_with_tag(T::TYPE.tag(), |slot| {
            Arc::new(f(Id::new(device_tag, slot)))
        });
        let record = slots.get(slot).cloned();
        drop(slots);

        match record {
            Some(record) => (Id::new(device_tag, slot), record),
            None => unreachable!("the slot was just occupied"),
        }
    }

    /// Registers `record` and returns its id.
    pub(crate) fn register(&self, record: T) -> Id<T> {
        self.register_with(|_| record).0
    }

    fn check(&self, id: Id<T>) -> Result<SlotId, InvalidHandleError> {
        if id.is_null() {
            return Err(InvalidHandleError::new(id.erase(), InvalidHandleProblem::Null));
        }

        if id.device_tag() != self.device_tag {
            return Err(InvalidHandleError::new(
                id.erase(),
                InvalidHandleProblem::ForeignDevice,
            ));
        }

        let slot = id.slot();

        if slot.tag() != T::TYPE.tag() {
            return Err(InvalidHandleError::new(
                id.erase(),
                InvalidHandleProblem::WrongType(ObjectType::from_tag(slot.tag())),
            ));
        }

        Ok(slot)
    }

    fn missing(&self, slots: &SlotMap<Arc<T>>, id: Id<T>, slot: SlotId) -> InvalidHandleError {
        let problem = if slots.was_removed(slot) {
            InvalidHandleProblem::Destroyed
        } else {
            InvalidHandleProblem::Unknown
        };

        InvalidHandleError::new(id.erase(), problem)
    }

    /// Looks up the record of `id`.
    pub fn get(&self, id: Id<T>) -> Result<Arc<T>, InvalidHandleError> {
        let slot = self.check(id)?;
        let slots = self.slots.read();

        slots
            .get(slot)
            .cloned()
            .ok_or_else(|| self.missing(&slots, id, slot))
    }

    /// Returns whether `id` refers to a live object of this table.
    #[inline]
    pub fn contains(&self, id: Id<T>) -> bool {
        self.get(id).is_ok()
    }

    /// Removes the record of `id` from the table. The handle is invalid afterward.
    pub(crate) fn erase(&self, id: Id<T>) -> Result<Arc<T>, InvalidHandleError> {
        let slot = self.check(id)?;
        let mut slots = self.slots.write();

        match slots.remove(slot) {
            Some(record) => Ok(record),
            None => Err(self.missing(&slots, id, slot)),
        }
    }

    /// Returns the number of live objects.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.read().len() as usize
    }

    /// Returns the ids and records of all live objects, in slot order.
    pub(crate) fn snapshot(&self) -> Vec<(Id<T>, Arc<T>)> {
        let slots = self.slots.read();

        slots
            .iter()
            .map(|(slot, record)| (Id::new(self.device_tag, slot), record.clone()))
            .collect()
    }

    /// Removes every record from the table.
    pub(crate) fn clear(&self) -> Vec<(Id<T>, Arc<T>)> {
        let mut slots = self.slots.write();
        let records = slots
            .iter()
            .map(|(slot, record)| (Id::new(self.device_tag, slot), record.clone()))
            .collect::<Vec<_>>();
        *slots = SlotMap::new();

        records
    }
}

/// Error that happens when a handle does not refer to a live object of the expected type on the
/// device it is used with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidHandleError {
    object: ObjectRef,
    problem: InvalidHandleProblem,
}

/// The reason why a handle is invalid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidHandleProblem {
    /// The handle is `VK_NULL_HANDLE`.
    Null,

    /// The handle was created by another device.
    ForeignDevice,

    /// The handle refers to an object of another type.
    WrongType(Option<ObjectType>),

    /// The object was destroyed.
    Destroyed,

    /// No object was ever created with this handle.
    Unknown,
}

impl InvalidHandleError {
    fn new(object: ObjectRef, problem: InvalidHandleProblem) -> Self {
        InvalidHandleError { object, problem }
    }

    /// Returns the handle that was looked up.
    #[inline]
    pub fn object(&self) -> ObjectRef {
        self.object
    }

    /// Returns why the handle is invalid.
    #[inline]
    pub fn problem(&self) -> InvalidHandleProblem {
        self.problem
    }

    /// Converts the error into a validation error of the parameter named `context`.
    ///
    /// Using a destroyed object is a lifetime error; every other problem is a parameter error.
    pub(crate) fn into_validation_error(
        self,
        context: &'static str,
        vuids: &'static [&'static str],
    ) -> Box<ValidationError> {
        let kind = match self.problem {
            InvalidHandleProblem::Destroyed => ValidationErrorKind::Lifetime,
            _ => ValidationErrorKind::Parameter,
        };

        Box::new(ValidationError {
            context: context.into(),
            problem: self.to_string().into(),
            vuids,
            kind,
            ..Default::default()
        })
    }
}

impl fmt::Display for InvalidHandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let &Self { object, problem } = self;

        match problem {
            InvalidHandleProblem::Null => {
                write!(f, "is VK_NULL_HANDLE, which is not a valid {}", object.object_type)
            }
            InvalidHandleProblem::ForeignDevice => {
                write!(f, "{object} was not created, allocated or retrieved from this device")
            }
            InvalidHandleProblem::WrongType(Some(actual)) => {
                write!(f, "{object} is a {actual} handle")
            }
            InvalidHandleProblem::WrongType(None) => {
                write!(f, "{object} is not a valid handle")
            }
            InvalidHandleProblem::Destroyed => write!(f, "{object} has been destroyed"),
            InvalidHandleProblem::Unknown => write!(f, "{object} is not a valid handle"),
        }
    }
}

impl Error for InvalidHandleError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buffer::Buffer, memory::MemoryAllocateInfo, tests::uniform_buffer_info};

    #[test]
    fn basic_usage() {
        let mut map = SlotMap::new();

        let x = map.insert_with_tag(3, |_| 69);
        let y = map.insert_with_tag(3, |_| 42);

        assert_eq!(map.get(x), Some(&69));
        assert_eq!(map.get(y), Some(&42));

        map.remove(x);

        let x2 = map.insert_with_tag(3, |_| 12);

        assert_eq!(x2.index(), x.index());
        assert_ne!(x2.generation(), x.generation());
        assert_eq!(map.get(x2), Some(&12));
        assert_eq!(map.get(x), None);
        assert!(map.was_removed(x));

        map.remove(y);
        map.remove(x2);

        assert_eq!(map.get(y), None);
        assert_eq!(map.get(x2), None);
        assert_eq!(map.len(), 0);
        assert_eq!(map.reserved_len(), 2);
    }

    #[test]
    fn removed_twice() {
        let mut map = SlotMap::new();

        let x = map.insert_with_tag(1, |_| ());
        assert_eq!(map.remove(x), Some(()));
        assert_eq!(map.remove(x), None);
        assert!(map.was_removed(x));
    }

    #[test]
    fn insert_sees_own_id() {
        let mut map = SlotMap::new();

        let x = map.insert_with_tag(5, |id| id);
        assert_eq!(map.get(x), Some(&x));
        assert_eq!(x.tag(), 5);
    }

    #[test]
    fn iter() {
        let mut map = SlotMap::new();

        let x = map.insert_with_tag(1, |_| 1);
        let y = map.insert_with_tag(1, |_| 2);
        let z = map.insert_with_tag(1, |_| 3);
        map.remove(y);

        let mut iter = map.iter();
        assert_eq!(iter.next(), Some((x, &1)));
        assert_eq!(iter.next(), Some((z, &3)));
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn handle_problems() {
        let (device, _queue, _log) = test_device!();
        let other = test_device!().0;

        let buffer = device.create_buffer(uniform_buffer_info(256)).unwrap();
        let foreign = other.create_buffer(uniform_buffer_info(256)).unwrap();
        let memory = device
            .allocate_memory(MemoryAllocateInfo {
                allocation_size: 256,
                memory_type_index: 0,
                ..Default::default()
            })
            .unwrap();

        let table = &device.objects.buffers;

        assert!(table.get(buffer).is_ok());
        assert_eq!(
            table.get(Id::NULL).unwrap_err().problem(),
            InvalidHandleProblem::Null,
        );
        assert_eq!(
            table.get(foreign).unwrap_err().problem(),
            InvalidHandleProblem::ForeignDevice,
        );
        assert_eq!(
            table
                .get(Id::<Buffer>::from_raw(memory.as_raw()))
                .unwrap_err()
                .problem(),
            InvalidHandleProblem::WrongType(Some(ObjectType::DeviceMemory)),
        );

        let never = Id::<Buffer>::from_raw(buffer.as_raw() + 7);
        assert_eq!(
            table.get(never).unwrap_err().problem(),
            InvalidHandleProblem::Unknown,
        );

        table.erase(buffer).unwrap();
        assert_eq!(
            table.get(buffer).unwrap_err().problem(),
            InvalidHandleProblem::Destroyed,
        );
        assert_eq!(
            table.erase(buffer).unwrap_err().problem(),
            InvalidHandleProblem::Destroyed,
        );
    }

    #[test]
    fn stale_after_reuse() {
        let (device, _queue, _log) = test_device!();
        let table = &device.objects.buffers;

        let first = device.create_buffer(uniform_buffer_info(256)).unwrap();
        table.erase(first).unwrap();
        let second = device.create_buffer(uniform_buffer_info(256)).unwrap();

        assert_eq!(first.slot().index(), second.slot().index());
        assert_eq!(
            table.get(first).unwrap_err().problem(),
            InvalidHandleProblem::Destroyed,
        );
        assert!(table.get(second).is_ok());
    }
}
