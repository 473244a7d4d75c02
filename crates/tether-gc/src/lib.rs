//! An explicitly-rooted, generational tracing collector for host-managed
//! allocations.
//!
//! `tether-gc` does not own a heap of its own. The host program keeps
//! allocating however it likes and tells the collector about three things:
//! the allocations it wants tracked, the reference edges between them, and
//! the storage locations (*pointer slots*) where it keeps addresses that the
//! collector may need to rewrite. From that declared graph the collector
//! decides reachability: a tracked object stays alive exactly as long as a
//! chain of strong edges connects it to the distinguished root object, and
//! everything else is reclaimed on the next collection.
//!
//! # Features
//!
//! - **Explicit edges**: no stack or register scanning; the mutator declares
//!   every reference, weak or strong
//! - **Generational sweeps**: three generations with nursery promotion, so a
//!   partial collection only scans recently created objects
//! - **Weak references**: reclaiming a weakly referenced target nulls (or
//!   hands to a user hook) the registered pointer slot
//! - **Migration**: a tracked object can change address; every registered
//!   slot holding the old address is rewritten in place
//!
//! # Quick Start
//!
//! ```
//! use tether_gc as gc;
//!
//! gc::init();
//!
//! // Collector-owned storage, kept alive by a strong edge from the root.
//! let obj = gc::new_object(64, gc::ROOT, None);
//! assert!(gc::object_live(obj));
//!
//! // Drop the root's edge; the object is unreachable and gets reclaimed.
//! gc::autorelease(obj);
//! gc::collect(false);
//! assert!(!gc::object_live(obj));
//!
//! gc::terminate(true);
//! ```
//!
//! # Threading
//!
//! All operations funnel through one global reader/writer lock; lookups take
//! the read side, mutations and collections the write side. Collections are
//! triggered only by the host and hold the write lock for their full
//! duration. Host callbacks (finalizers, the weak invalidator) run while
//! that lock is held and must not call back into the collector.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod collector;
mod field;
mod heap;
mod object;
mod reference;
mod sync;
mod tracing;

pub mod ffi;

pub use collector::{
    autorelease, collect, init, new_object, object_live, object_migrate, object_resize,
    object_size, register_object, register_reference, register_weak_reference,
    set_weak_invalidator, terminate, unregister_reference, unregister_weak_reference, ROOT,
};

/// Raw address of a tracked allocation. The collector never dereferences it.
pub type Address = *mut u8;

/// A mutator-owned storage location holding an [`Address`].
///
/// Slots are rewritten in place on migration and nulled (or passed to the
/// installed invalidator) when a weakly referenced target dies.
pub type Slot = *mut Address;

/// Host-provided cleanup hook, invoked once with the object's address when
/// the object is reclaimed.
pub type Finalizer = extern "C" fn(Address);

/// Host-provided hook run when a weakly referenced target dies, receiving
/// the owning object's address and the registered pointer slot.
pub type WeakInvalidator = extern "C" fn(Address, Slot);
