//! A freshly created object is rooted until released.

mod common;

use tether_gc as gc;

#[test]
fn rooted_object_survives_until_released() {
    let _session = common::session();

    let obj = gc::new_object(10, gc::ROOT, None);
    assert!(gc::object_live(obj));

    gc::collect(false);
    assert!(gc::object_live(obj));

    gc::autorelease(obj);
    gc::collect(false);
    assert!(!gc::object_live(obj));
}

#[test]
fn partial_and_full_collections_spare_rooted_objects() {
    let _session = common::session();

    let obj = gc::new_object(32, gc::ROOT, None);
    for _ in 0..4 {
        gc::collect(true);
        assert!(gc::object_live(obj));
    }
    gc::collect(false);
    assert!(gc::object_live(obj));
}

#[test]
fn liveness_is_a_soft_query() {
    let _session = common::session();

    assert!(!gc::object_live(std::ptr::null_mut()));
    assert!(!gc::object_live(0x1234 as gc::Address));
}
