//! Process-wide collector facade.
//!
//! One global [`RwSpinLock`] guards the whole graph: address lookups take
//! the read side, every mutation and every collection takes the write side.
//! Operations that both look up and mutate (edge registration, for one) do
//! so in two separate critical sections on purpose; the mutator is the sole
//! source of destruction requests, so the objects found by the lookup are
//! still there at the mutation as long as the host keeps its own ordering
//! straight.

use crate::field::FIELD_COUNT;
use crate::heap::{Heap, ROOT_SENTINEL};
use crate::object::ObjectId;
use crate::reference::RefKind;
use crate::sync::RwSpinLock;
use crate::tracing;
use crate::{Address, Finalizer, Slot, WeakInvalidator};

/// Address of the root object: a well-known sentinel distinct from anything
/// a real allocator returns. Usable wherever an owner address is expected.
pub const ROOT: Address = ROOT_SENTINEL as Address;

static COLLECTOR: RwSpinLock<Option<Heap>> = RwSpinLock::new(None);

const NOT_INITIALIZED: &str = "collector is not initialized";

/// Constructs the root object and the generational field chain.
///
/// # Panics
///
/// Panics if the collector is already initialized.
pub fn init() {
    let mut state = COLLECTOR.write();
    assert!(state.is_none(), "collector is already initialized");
    tracing::startup();
    *state = Some(Heap::new());
}

/// Destroys every tracked object and shuts the collector down.
///
/// Teardown walks the field chain youngest first and ignores reference
/// topology, so strong edges to already-destroyed targets are expected and
/// absorbed. With `run_finalizers` false, host finalizers are skipped;
/// collector-owned storage is released either way. The collector may be
/// initialized again afterwards.
///
/// # Panics
///
/// Panics if the collector is not initialized.
pub fn terminate(run_finalizers: bool) {
    let mut state = COLLECTOR.write();
    let mut heap = state.take().expect(NOT_INITIALIZED);
    heap.teardown(run_finalizers);
    tracing::shutdown(run_finalizers);
}

/// Runs a collection: `partial` sweeps only the nursery (survivors are
/// promoted), otherwise every generation is swept. Holds the write lock for
/// the full duration.
///
/// # Panics
///
/// Panics if the collector is not initialized.
pub fn collect(partial: bool) {
    let mut state = COLLECTOR.write();
    let heap = state.as_mut().expect(NOT_INITIALIZED);
    heap.collect(if partial { 1 } else { FIELD_COUNT });
}

/// Allocates `max(len, word size)` zero-filled collector-owned bytes,
/// tracked from birth with a strong edge from `owner`, and returns their
/// address. Pass [`ROOT`] as the owner to keep the object rooted until an
/// [`autorelease`].
///
/// # Panics
///
/// Panics if `len` is zero, `owner` is null or untracked, or the collector
/// is not initialized.
pub fn new_object(len: usize, owner: Address, finalizer: Option<Finalizer>) -> Address {
    let owner_id = resolve(owner);
    let mut state = COLLECTOR.write();
    let heap = state.as_mut().expect(NOT_INITIALIZED);
    heap.allocate(len, owner_id, finalizer) as Address
}

/// Tracks a host-owned allocation; the collector never frees the storage,
/// only runs the finalizer when the object is reclaimed. A strong edge from
/// `owner` keeps it alive initially.
///
/// # Panics
///
/// Panics if either address is null, `addr` is already tracked, `owner` is
/// untracked, or the collector is not initialized.
pub fn register_object(addr: Address, owner: Address, finalizer: Option<Finalizer>) {
    assert!(!addr.is_null(), "registered a null address");
    let owner_id = resolve(owner);
    let mut state = COLLECTOR.write();
    let heap = state.as_mut().expect(NOT_INITIALIZED);
    heap.register(addr as usize, owner_id, finalizer);
}

/// Declares a strong edge from `owner` to `target`. With a slot supplied,
/// the slot is rewritten should the target ever migrate.
///
/// # Safety
///
/// A supplied `slot` must be non-null, writable, and must remain valid for
/// as long as the edge exists; the collector writes through it on
/// migration.
///
/// # Panics
///
/// Panics if either address is null or untracked, or the collector is not
/// initialized.
pub unsafe fn register_reference(owner: Address, target: Address, slot: Option<Slot>) {
    let (owner_id, target_id) = resolve_pair(owner, target);
    let slot = slot.map(|s| {
        assert!(!s.is_null(), "registered a null pointer slot");
        s as usize
    });
    let mut state = COLLECTOR.write();
    let heap = state.as_mut().expect(NOT_INITIALIZED);
    heap.link_strong(owner_id, target_id, slot);
}

/// Removes one strong edge from `owner` to `target`. If that was the last
/// edge of any kind into the target, the target is reclaimed on the spot.
///
/// # Panics
///
/// Panics if no such edge exists, either address is null or untracked, or
/// the collector is not initialized.
pub fn unregister_reference(owner: Address, target: Address) {
    let (owner_id, target_id) = resolve_pair(owner, target);
    let mut state = COLLECTOR.write();
    let heap = state.as_mut().expect(NOT_INITIALIZED);
    heap.disown(owner_id, target_id, RefKind::Strong);
}

/// Declares a weak edge from `owner` to `target`. Weak edges do not keep
/// the target alive; when it is reclaimed, the slot is nulled (or handed to
/// the hook installed with [`set_weak_invalidator`]).
///
/// # Examples
///
/// ```
/// use tether_gc as gc;
///
/// gc::init();
/// let obj = gc::new_object(16, gc::ROOT, None);
/// let mut handle: gc::Address = obj;
/// unsafe { gc::register_weak_reference(gc::ROOT, obj, &mut handle) };
///
/// gc::autorelease(obj);
/// gc::collect(false);
/// assert!(!gc::object_live(obj));
/// assert!(handle.is_null());
/// gc::terminate(true);
/// ```
///
/// # Safety
///
/// `slot` must be non-null, writable, and must remain valid for as long as
/// the edge exists; the collector writes through it on migration and on
/// target death.
///
/// # Panics
///
/// Panics if either address is null or untracked, `slot` is null, or the
/// collector is not initialized.
pub unsafe fn register_weak_reference(owner: Address, target: Address, slot: Slot) {
    assert!(!slot.is_null(), "registered a null pointer slot");
    let (owner_id, target_id) = resolve_pair(owner, target);
    let mut state = COLLECTOR.write();
    let heap = state.as_mut().expect(NOT_INITIALIZED);
    heap.link_weak(owner_id, target_id, slot as usize);
}

/// Removes one weak edge from `owner` to `target` without invalidating its
/// slot.
///
/// # Panics
///
/// Panics if no such edge exists, either address is null or untracked, or
/// the collector is not initialized.
pub fn unregister_weak_reference(owner: Address, target: Address) {
    let (owner_id, target_id) = resolve_pair(owner, target);
    let mut state = COLLECTOR.write();
    let heap = state.as_mut().expect(NOT_INITIALIZED);
    heap.disown(owner_id, target_id, RefKind::Weak);
}

/// Releases the automatic root edge a new object is born with. Shorthand
/// for `unregister_reference(ROOT, addr)`; call it once the object has been
/// handed to its real owner.
///
/// # Panics
///
/// As [`unregister_reference`].
pub fn autorelease(addr: Address) {
    assert!(!addr.is_null(), "autorelease of a null address");
    unregister_reference(ROOT, addr);
}

/// Whether an address is currently tracked. Null and unknown addresses are
/// simply not live; this is the one query with a soft failure mode.
///
/// # Panics
///
/// Panics if the collector is not initialized.
pub fn object_live(addr: Address) -> bool {
    if addr.is_null() {
        return false;
    }
    let state = COLLECTOR.read();
    let heap = state.as_ref().expect(NOT_INITIALIZED);
    heap.lookup(addr as usize).is_some()
}

/// Records that the object at `old` now lives at `new`. Every incoming edge
/// with a registered slot has the slot rewritten to `new`, and the field
/// binding follows. The host moves the bytes; the collector moves the
/// bookkeeping.
///
/// # Panics
///
/// Panics if `old` is untracked, `new` is null or already tracked, or the
/// collector is not initialized.
pub fn object_migrate(old: Address, new: Address) {
    assert!(!old.is_null(), "migration of a null address");
    let mut state = COLLECTOR.write();
    let heap = state.as_mut().expect(NOT_INITIALIZED);
    heap.migrate(old as usize, new as usize);
}

/// The self-allocated length of a tracked object; 0 for host-owned storage.
///
/// # Panics
///
/// Panics if `addr` is null or untracked, or the collector is not
/// initialized.
pub fn object_size(addr: Address) -> usize {
    assert!(!addr.is_null(), "size query for a null address");
    let state = COLLECTOR.read();
    let heap = state.as_ref().expect(NOT_INITIALIZED);
    let id = heap
        .lookup(addr as usize)
        .expect("size query for an untracked address");
    heap.object(id).self_len
}

/// Reallocates a collector-owned object to `new_len` bytes and returns its
/// address, running the migration fix-up if the block moved.
///
/// # Panics
///
/// Panics if `addr` is null, untracked, or host-owned, `new_len` is zero,
/// or the collector is not initialized.
pub fn object_resize(addr: Address, new_len: usize) -> Address {
    assert!(!addr.is_null(), "resize of a null address");
    let mut state = COLLECTOR.write();
    let heap = state.as_mut().expect(NOT_INITIALIZED);
    heap.resize(addr as usize, new_len) as Address
}

/// Installs (or, with `None`, removes) the hook run when a weakly
/// referenced target dies. The default behavior writes null into the
/// registered slot. Intended to be set once at startup.
///
/// # Panics
///
/// Panics if the collector is not initialized.
pub fn set_weak_invalidator(hook: Option<WeakInvalidator>) {
    let mut state = COLLECTOR.write();
    let heap = state.as_mut().expect(NOT_INITIALIZED);
    heap.invalidator = hook;
}

/// Read-locked address lookup, fatal on misses: the operations built on
/// this require the address to be tracked.
fn resolve(address: Address) -> ObjectId {
    assert!(!address.is_null(), "null address");
    let state = COLLECTOR.read();
    let heap = state.as_ref().expect(NOT_INITIALIZED);
    heap.lookup(address as usize)
        .expect("address is not tracked by the collector")
}

/// Read-locked lookup of an owner/target pair in one critical section.
fn resolve_pair(owner: Address, target: Address) -> (ObjectId, ObjectId) {
    assert!(!owner.is_null(), "null owner address");
    assert!(!target.is_null(), "null target address");
    let state = COLLECTOR.read();
    let heap = state.as_ref().expect(NOT_INITIALIZED);
    let owner_id = heap
        .lookup(owner as usize)
        .expect("owner address is not tracked by the collector");
    let target_id = heap
        .lookup(target as usize)
        .expect("target address is not tracked by the collector");
    (owner_id, target_id)
}
