//! Promotion and partial-collection behavior through the public surface.

mod common;

use tether_gc as gc;

/// A mutually linked pair survives release until a sweep proves it
/// unreachable, which makes generational residency observable from outside.
fn released_pair() -> (gc::Address, gc::Address) {
    let a = gc::new_object(10, gc::ROOT, None);
    let b = gc::new_object(10, gc::ROOT, None);
    unsafe {
        gc::register_reference(a, b, None);
        gc::register_reference(b, a, None);
    }
    (a, b)
}

#[test]
fn tenured_garbage_waits_for_a_full_collection() {
    let _session = common::session();

    let (a, b) = released_pair();
    // Two partial collections tenure the pair into the oldest field.
    gc::collect(true);
    gc::collect(true);

    gc::autorelease(a);
    gc::autorelease(b);

    // Partial collections only sweep the nursery; the tenured cycle stays.
    gc::collect(true);
    assert!(gc::object_live(a));
    assert!(gc::object_live(b));

    gc::collect(false);
    assert!(!gc::object_live(a));
    assert!(!gc::object_live(b));
}

#[test]
fn nursery_garbage_dies_in_a_partial_collection() {
    let _session = common::session();

    let (a, b) = released_pair();
    gc::autorelease(a);
    gc::autorelease(b);

    gc::collect(true);
    assert!(!gc::object_live(a));
    assert!(!gc::object_live(b));
}

#[test]
fn tenured_owner_keeps_a_nursery_newcomer() {
    let _session = common::session();

    let keeper = gc::new_object(10, gc::ROOT, None);
    gc::collect(true);
    gc::collect(true);

    // A fresh object whose only strong edge comes from the tenured keeper.
    let newcomer = gc::new_object(10, keeper, None);
    gc::collect(true);
    assert!(gc::object_live(newcomer));

    gc::unregister_reference(keeper, newcomer);
    assert!(!gc::object_live(newcomer));
    assert!(gc::object_live(keeper));
}

#[test]
fn survivors_keep_their_edges_across_promotion() {
    let _session = common::session();

    let parent = gc::new_object(10, gc::ROOT, None);
    let child = gc::new_object(10, parent, None);

    // Tenure both; the edge must stay intact through every promotion.
    gc::collect(true);
    gc::collect(true);
    gc::collect(false);
    assert!(gc::object_live(parent));
    assert!(gc::object_live(child));

    gc::autorelease(parent);
    gc::collect(false);
    assert!(!gc::object_live(parent));
    assert!(!gc::object_live(child));
}
