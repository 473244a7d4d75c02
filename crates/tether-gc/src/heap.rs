//! Graph state shared by every collector operation.
//!
//! The heap owns the object and reference arenas, the field chain, and the
//! process-wide flags. Everything here assumes the caller already holds the
//! global lock; nothing in this module synchronises on its own.

use std::alloc::{alloc_zeroed, handle_alloc_error, realloc, Layout};
use std::collections::HashMap;

use crate::field::{Field, FIELD_COUNT};
use crate::object::{Object, ObjectId};
use crate::reference::{RefId, Reference};
use crate::tracing;
use crate::{Address, Finalizer, Slot, WeakInvalidator};

/// Well-known address of the root object. Chosen to be a value no real
/// allocator will ever hand out; the collector never dereferences it.
#[cfg(target_pointer_width = "64")]
pub(crate) const ROOT_SENTINEL: usize = 0xDEAD_BEEF_FEED_FACE;
#[cfg(not(target_pointer_width = "64"))]
pub(crate) const ROOT_SENTINEL: usize = 0xCAFE_BABE;

/// Self-allocated storage is at least one word, so any tracked block can
/// hold an address.
const WORD: usize = std::mem::size_of::<usize>();

/// The object-and-reference graph plus the generational field chain.
pub(crate) struct Heap {
    pub(crate) objects: HashMap<ObjectId, Object>,
    pub(crate) refs: HashMap<RefId, Reference>,
    pub(crate) fields: Vec<Field>,
    pub(crate) root: ObjectId,
    next_object: u64,
    next_ref: u64,
    /// Raised by `terminate`; strong target death is tolerated while set.
    pub(crate) shutting_down: bool,
    /// Raised by `terminate(false)` so teardown skips host finalizers.
    pub(crate) finalizers_disabled: bool,
    /// Raised while a sweep partitions a field table, so that edge-removal
    /// side effects cannot destroy objects the sweep has already classified.
    pub(crate) suppress_trivial: bool,
    /// Replaces the default null-the-slot behavior on weak target death.
    pub(crate) invalidator: Option<WeakInvalidator>,
}

impl Heap {
    /// Builds the field chain and installs the root in the oldest field.
    pub(crate) fn new() -> Self {
        let mut heap = Self {
            objects: HashMap::new(),
            refs: HashMap::new(),
            fields: (0..FIELD_COUNT).map(|_| Field::new()).collect(),
            root: ObjectId(0),
            next_object: 0,
            next_ref: 0,
            shutting_down: false,
            finalizers_disabled: false,
            suppress_trivial: false,
            invalidator: None,
        };
        let root = heap.next_object_id();
        heap.objects
            .insert(root, Object::new(ROOT_SENTINEL, None, 0));
        heap.root = root;
        heap.bind_tenured(ROOT_SENTINEL, root);
        heap
    }

    pub(crate) fn object(&self, id: ObjectId) -> &Object {
        self.objects.get(&id).expect("unknown object identity")
    }

    pub(crate) fn object_mut(&mut self, id: ObjectId) -> &mut Object {
        self.objects.get_mut(&id).expect("unknown object identity")
    }

    pub(crate) fn reference(&self, rid: RefId) -> &Reference {
        self.refs.get(&rid).expect("unknown reference identity")
    }

    fn next_object_id(&mut self) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        id
    }

    fn next_ref_id(&mut self) -> RefId {
        let id = RefId(self.next_ref);
        self.next_ref += 1;
        id
    }

    /// Creates an object record for `address` and binds it in the nursery.
    fn admit(&mut self, address: usize, finalizer: Option<Finalizer>, self_len: usize) -> ObjectId {
        assert!(
            self.lookup(address).is_none(),
            "address {address:#x} is already tracked"
        );
        let id = self.next_object_id();
        self.objects
            .insert(id, Object::new(address, finalizer, self_len));
        self.bind_nursery(address, id);
        tracing::object_admitted(address, self_len);
        id
    }

    /// Inserts an edge into the arena and both endpoint sets.
    fn link(&mut self, reference: Reference) -> RefId {
        let rid = self.next_ref_id();
        tracing::reference_created(
            reference.kind.as_str(),
            self.object(reference.owner).address,
            self.object(reference.target).address,
        );
        self.object_mut(reference.owner).outgoing.insert(rid);
        self.object_mut(reference.target).incoming.insert(rid);
        self.refs.insert(rid, reference);
        rid
    }

    /// Declares a strong edge; `slot`, when given, is rewritten on migration.
    pub(crate) fn link_strong(
        &mut self,
        owner: ObjectId,
        target: ObjectId,
        slot: Option<usize>,
    ) -> RefId {
        self.link(Reference::strong(owner, target, slot))
    }

    /// Declares a weak edge; `slot` is mandatory and invalidated on target
    /// death.
    pub(crate) fn link_weak(&mut self, owner: ObjectId, target: ObjectId, slot: usize) -> RefId {
        self.link(Reference::weak(owner, target, slot))
    }

    /// Wraps a host-owned address; the collector will never free it.
    pub(crate) fn register(
        &mut self,
        address: usize,
        owner: ObjectId,
        finalizer: Option<Finalizer>,
    ) -> ObjectId {
        let id = self.admit(address, finalizer, 0);
        self.link_strong(owner, id, None);
        id
    }

    /// Allocates `max(len, word)` zero-filled bytes owned by the collector
    /// and tracks them like any registered object.
    pub(crate) fn allocate(
        &mut self,
        len: usize,
        owner: ObjectId,
        finalizer: Option<Finalizer>,
    ) -> usize {
        assert!(len > 0, "allocation of a zero length");
        let layout = Self::storage_layout(len);
        // SAFETY: the layout has non-zero size (at least one word).
        let block = unsafe { alloc_zeroed(layout) };
        if block.is_null() {
            handle_alloc_error(layout);
        }
        let address = block as usize;
        let id = self.admit(address, finalizer, len);
        self.link_strong(owner, id, None);
        address
    }

    /// Layout of collector-owned storage for a requested length.
    pub(crate) fn storage_layout(len: usize) -> Layout {
        Layout::from_size_align(len.max(WORD), std::mem::align_of::<usize>())
            .expect("unrepresentable allocation size")
    }

    /// Records a new address for a tracked object, rewriting every
    /// registered pointer slot among its incoming edges and rebinding the
    /// field table entry.
    pub(crate) fn migrate(&mut self, old: usize, new: usize) {
        assert!(new != 0, "migration to a null address");
        if old == new {
            return;
        }
        let id = self
            .lookup(old)
            .expect("migration of an untracked address");
        assert!(
            self.lookup(new).is_none(),
            "migration target {new:#x} is already tracked"
        );
        self.object_mut(id).address = new;
        let pointing: Vec<RefId> = self.object(id).incoming.iter().copied().collect();
        for rid in pointing {
            if let Some(slot) = self.reference(rid).slot {
                // SAFETY: slot validity for the lifetime of the edge was
                // promised when the reference was registered.
                unsafe { *(slot as Slot) = new as Address };
            }
        }
        self.rebind(old, new, id);
        tracing::object_migrated(old, new);
    }

    /// Reallocates collector-owned storage, migrating if the block moved.
    /// Returns the (possibly unchanged) address.
    pub(crate) fn resize(&mut self, address: usize, new_len: usize) -> usize {
        assert!(new_len > 0, "resize to a zero length");
        let id = self.lookup(address).expect("resize of an untracked address");
        let old_len = self.object(id).self_len;
        assert!(old_len > 0, "resize of host-owned storage");

        let old_layout = Self::storage_layout(old_len);
        let new_size = new_len.max(WORD);
        // SAFETY: the block at `address` was allocated by this collector
        // with `old_layout`, and `new_size` is non-zero.
        let block = unsafe { realloc(address as *mut u8, old_layout, new_size) };
        if block.is_null() {
            handle_alloc_error(Self::storage_layout(new_len));
        }
        self.object_mut(id).self_len = new_len;

        let moved_to = block as usize;
        if moved_to != address {
            self.migrate(address, moved_to);
        }
        moved_to
    }

    /// Runs the weak-invalidation hook, or the default slot wipe.
    pub(crate) fn invalidate_slot(&self, owner_address: usize, slot: usize) {
        if let Some(hook) = self.invalidator {
            hook(owner_address as Address, slot as Slot);
        } else {
            // SAFETY: slot validity was promised at registration.
            unsafe { *(slot as Slot) = std::ptr::null_mut() };
        }
    }
}
