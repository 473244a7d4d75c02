//! Weak references observe without retaining.

mod common;

use std::sync::Mutex;
use tether_gc as gc;
use tether_gc::{Address, Slot};

static HOOK_CALLS: Mutex<Vec<(usize, usize)>> = Mutex::new(Vec::new());

extern "C" fn recording_hook(owner: Address, slot: Slot) {
    HOOK_CALLS
        .lock()
        .unwrap()
        .push((owner as usize, slot as usize));
    // Behave like the default so the handle assertions still hold.
    unsafe { *slot = std::ptr::null_mut() };
}

#[test]
fn weak_handle_is_nulled_on_reclaim() {
    let _session = common::session();

    let obj = gc::new_object(10, gc::ROOT, None);
    let mut handle: Address = obj;
    unsafe { gc::register_weak_reference(gc::ROOT, obj, &mut handle) };

    gc::collect(false);
    assert!(gc::object_live(obj));
    assert_eq!(handle, obj);

    gc::autorelease(obj);
    // The weak observer alone does not keep the object alive, but it does
    // block reclamation at release time; only the sweep may kill it.
    assert!(gc::object_live(obj));

    gc::collect(false);
    assert!(!gc::object_live(obj));
    assert!(handle.is_null());
}

#[test]
fn unregistered_weak_edge_leaves_its_slot_alone() {
    let _session = common::session();

    let obj = gc::new_object(10, gc::ROOT, None);
    let mut handle: Address = obj;
    unsafe { gc::register_weak_reference(gc::ROOT, obj, &mut handle) };
    gc::unregister_weak_reference(gc::ROOT, obj);

    gc::autorelease(obj);
    gc::collect(false);
    assert!(!gc::object_live(obj));
    assert_eq!(handle, obj);
}

#[test]
fn custom_invalidator_replaces_the_default() {
    let _session = common::session();
    HOOK_CALLS.lock().unwrap().clear();

    gc::set_weak_invalidator(Some(recording_hook));
    let owner = gc::new_object(10, gc::ROOT, None);
    let obj = gc::new_object(10, gc::ROOT, None);
    let mut handle: Address = obj;
    let slot: Slot = &mut handle;
    unsafe { gc::register_weak_reference(owner, obj, slot) };

    gc::autorelease(obj);
    gc::collect(false);
    assert!(!gc::object_live(obj));
    assert!(handle.is_null());

    let calls = HOOK_CALLS.lock().unwrap().clone();
    assert_eq!(calls, vec![(owner as usize, slot as usize)]);

    gc::set_weak_invalidator(None);
}

#[test]
fn each_weak_edge_is_invalidated_once() {
    let _session = common::session();

    let watcher = gc::new_object(10, gc::ROOT, None);
    let obj = gc::new_object(10, gc::ROOT, None);
    let mut first: Address = obj;
    let mut second: Address = obj;
    unsafe {
        gc::register_weak_reference(gc::ROOT, obj, &mut first);
        gc::register_weak_reference(watcher, obj, &mut second);
    }

    gc::autorelease(obj);
    gc::collect(false);
    assert!(!gc::object_live(obj));
    assert!(first.is_null());
    assert!(second.is_null());
    assert!(gc::object_live(watcher));
}
