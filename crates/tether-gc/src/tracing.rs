//! Structured event logging for collector operations.
//!
//! With the `tracing` feature enabled these emit `tracing` events; without
//! it they compile to nothing. Call sites stay unconditional either way.

#[cfg(feature = "tracing")]
pub(crate) use enabled::*;

#[cfg(not(feature = "tracing"))]
pub(crate) use disabled::*;

#[cfg(feature = "tracing")]
mod enabled {
    use ::tracing::{debug, trace};

    pub(crate) fn startup() {
        debug!(
            word_bytes = std::mem::size_of::<usize>(),
            generations = crate::field::FIELD_COUNT,
            "collector initialized"
        );
    }

    pub(crate) fn shutdown(ran_finalizers: bool) {
        debug!(ran_finalizers, "collector terminated");
    }

    pub(crate) fn object_admitted(address: usize, self_len: usize) {
        trace!(address, self_len, "object admitted");
    }

    pub(crate) fn object_condemned(address: usize, reason: &str) {
        trace!(address, reason, "object condemned");
    }

    pub(crate) fn reference_created(kind: &str, owner: usize, target: usize) {
        trace!(kind, owner, target, "reference created");
    }

    pub(crate) fn reference_destroyed(kind: &str, owner: usize, target: usize) {
        trace!(kind, owner, target, "reference destroyed");
    }

    pub(crate) fn collection_started(depth: usize) {
        debug!(depth, "collection started");
    }

    pub(crate) fn field_swept(index: usize, retained: usize, reclaimed: usize) {
        debug!(index, retained, reclaimed, "field swept");
    }

    pub(crate) fn collection_finished() {
        debug!("collection finished");
    }

    pub(crate) fn object_migrated(old: usize, new: usize) {
        trace!(old, new, "object migrated");
    }

    pub(crate) fn weak_invalidated(owner: usize, slot: usize) {
        trace!(owner, slot, "weak reference invalidated");
    }
}

#[cfg(not(feature = "tracing"))]
#[allow(clippy::missing_const_for_fn)]
mod disabled {
    pub(crate) fn startup() {}

    pub(crate) fn shutdown(_ran_finalizers: bool) {}

    pub(crate) fn object_admitted(_address: usize, _self_len: usize) {}

    pub(crate) fn object_condemned(_address: usize, _reason: &str) {}

    pub(crate) fn reference_created(_kind: &str, _owner: usize, _target: usize) {}

    pub(crate) fn reference_destroyed(_kind: &str, _owner: usize, _target: usize) {}

    pub(crate) fn collection_started(_depth: usize) {}

    pub(crate) fn field_swept(_index: usize, _retained: usize, _reclaimed: usize) {}

    pub(crate) fn collection_finished() {}

    pub(crate) fn object_migrated(_old: usize, _new: usize) {}

    pub(crate) fn weak_invalidated(_owner: usize, _slot: usize) {}
}
