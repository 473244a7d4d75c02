//! C-compatible boundary.
//!
//! Thin `extern "C"` wrappers over the crate-level operations, for hosts
//! that link the collector as a foreign library. Nullable pointers map to
//! `Option` on the Rust side; everything else passes through untouched.

use crate::{Address, Finalizer, Slot, WeakInvalidator};

/// See [`crate::init`].
#[no_mangle]
pub extern "C" fn tether_init() {
    crate::init();
}

/// See [`crate::terminate`].
#[no_mangle]
pub extern "C" fn tether_terminate(run_finalizers: bool) {
    crate::terminate(run_finalizers);
}

/// See [`crate::collect`].
#[no_mangle]
pub extern "C" fn tether_collect(partial: bool) {
    crate::collect(partial);
}

/// The root object's sentinel address; see [`crate::ROOT`].
#[no_mangle]
pub extern "C" fn tether_root() -> Address {
    crate::ROOT
}

/// See [`crate::new_object`].
#[no_mangle]
pub extern "C" fn tether_new_object(
    len: usize,
    owner: Address,
    finalizer: Option<Finalizer>,
) -> Address {
    crate::new_object(len, owner, finalizer)
}

/// See [`crate::register_object`].
#[no_mangle]
pub extern "C" fn tether_register_object(
    addr: Address,
    owner: Address,
    finalizer: Option<Finalizer>,
) {
    crate::register_object(addr, owner, finalizer);
}

/// See [`crate::autorelease`].
#[no_mangle]
pub extern "C" fn tether_autorelease(addr: Address) {
    crate::autorelease(addr);
}

/// See [`crate::register_reference`]. `slot` may be null.
///
/// # Safety
///
/// A non-null `slot` must stay valid and writable for the lifetime of the
/// edge.
#[no_mangle]
pub unsafe extern "C" fn tether_register_reference(owner: Address, target: Address, slot: Slot) {
    let slot = (!slot.is_null()).then_some(slot);
    unsafe { crate::register_reference(owner, target, slot) };
}

/// See [`crate::unregister_reference`].
#[no_mangle]
pub extern "C" fn tether_unregister_reference(owner: Address, target: Address) {
    crate::unregister_reference(owner, target);
}

/// See [`crate::register_weak_reference`].
///
/// # Safety
///
/// `slot` must be non-null and stay valid and writable for the lifetime of
/// the edge.
#[no_mangle]
pub unsafe extern "C" fn tether_register_weak_reference(
    owner: Address,
    target: Address,
    slot: Slot,
) {
    unsafe { crate::register_weak_reference(owner, target, slot) };
}

/// See [`crate::unregister_weak_reference`].
#[no_mangle]
pub extern "C" fn tether_unregister_weak_reference(owner: Address, target: Address) {
    crate::unregister_weak_reference(owner, target);
}

/// See [`crate::object_live`].
#[no_mangle]
pub extern "C" fn tether_object_live(addr: Address) -> bool {
    crate::object_live(addr)
}

/// See [`crate::object_migrate`].
#[no_mangle]
pub extern "C" fn tether_object_migrate(old: Address, new: Address) {
    crate::object_migrate(old, new);
}

/// See [`crate::object_size`].
#[no_mangle]
pub extern "C" fn tether_object_size(addr: Address) -> usize {
    crate::object_size(addr)
}

/// See [`crate::object_resize`].
#[no_mangle]
pub extern "C" fn tether_object_resize(addr: Address, new_len: usize) -> Address {
    crate::object_resize(addr, new_len)
}

/// See [`crate::set_weak_invalidator`]. Passing null restores the default.
#[no_mangle]
pub extern "C" fn tether_weak_invalidator(hook: Option<WeakInvalidator>) {
    crate::set_weak_invalidator(hook);
}
