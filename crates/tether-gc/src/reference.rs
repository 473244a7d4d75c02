//! Edge records and the reactive callbacks that keep the graph consistent.
//!
//! A reference binds an owner object to a target object. It lives in the
//! owner's outgoing set and the target's incoming set simultaneously, and
//! exactly one of three events ends it: the owner dies, the owner explicitly
//! disowns it, or the target dies. Each event runs once, removes the record
//! from whichever endpoint sets still hold it, and deletes the record.
//!
//! Two rules keep the callbacks safe against re-entrancy:
//!
//! - a condemned endpoint is mid-destruction and already iterating its own
//!   edge sets, so callbacks never mutate a condemned endpoint's sets;
//! - *trivial reclamation* (condemning a target whose incoming set just
//!   emptied) goes through [`Heap::condemn`] with the edge as the last
//!   reference, which makes it suppressible while a sweep is classifying
//!   the table it plans to destroy from.

use crate::heap::Heap;
use crate::object::ObjectId;
use crate::tracing;

/// Identity of an edge in the reference arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct RefId(pub(crate) u64);

/// Whether an edge keeps its target reachable.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum RefKind {
    Strong,
    Weak,
}

impl RefKind {
    pub(crate) const fn is_weak(self) -> bool {
        matches!(self, Self::Weak)
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Weak => "weak",
        }
    }
}

/// One declared edge between two tracked objects.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Reference {
    pub(crate) owner: ObjectId,
    pub(crate) target: ObjectId,
    pub(crate) kind: RefKind,
    /// Mutator storage holding the target's address, rewritten on migration
    /// and invalidated on weak target death. Mandatory for weak edges.
    pub(crate) slot: Option<usize>,
}

impl Reference {
    pub(crate) const fn strong(owner: ObjectId, target: ObjectId, slot: Option<usize>) -> Self {
        Self {
            owner,
            target,
            kind: RefKind::Strong,
            slot,
        }
    }

    pub(crate) fn weak(owner: ObjectId, target: ObjectId, slot: usize) -> Self {
        assert!(slot != 0, "weak reference constructed without a pointer slot");
        Self {
            owner,
            target,
            kind: RefKind::Weak,
            slot: Some(slot),
        }
    }
}

impl Heap {
    /// The owner is being destroyed; its outgoing edges fold up one by one.
    ///
    /// Removes the record from the target's incoming set unless the target
    /// is itself condemned, then attempts trivial reclamation of a target
    /// left with an empty incoming set.
    pub(crate) fn owner_died(&mut self, rid: RefId) {
        let r = *self.reference(rid);
        let target_live = self
            .objects
            .get(&r.target)
            .is_some_and(|t| !t.condemned);
        if target_live {
            let removed = self.object_mut(r.target).incoming.remove(&rid);
            assert!(removed, "reference missing from its target's incoming set");
        }
        tracing::reference_destroyed(
            r.kind.as_str(),
            self.address_of(r.owner),
            self.address_of(r.target),
        );
        self.refs.remove(&rid);
        if target_live && !self.is_referenced(r.target) {
            tracing::object_condemned(self.address_of(r.target), "unreferenced");
            self.condemn(r.target, Some(rid));
        }
    }

    /// The owner explicitly unregistered the edge.
    pub(crate) fn owner_disowned(&mut self, rid: RefId) {
        let r = *self.reference(rid);
        let removed = self.object_mut(r.owner).outgoing.remove(&rid);
        assert!(removed, "reference missing from its owner's outgoing set");
        let target_live = self
            .objects
            .get(&r.target)
            .is_some_and(|t| !t.condemned);
        if target_live {
            let removed = self.object_mut(r.target).incoming.remove(&rid);
            assert!(removed, "reference missing from its target's incoming set");
        }
        tracing::reference_destroyed(
            r.kind.as_str(),
            self.address_of(r.owner),
            self.address_of(r.target),
        );
        self.refs.remove(&rid);
        if target_live && !self.is_referenced(r.target) {
            tracing::object_condemned(self.address_of(r.target), "unreferenced");
            self.condemn(r.target, Some(rid));
        }
    }

    /// The target is being destroyed; its incoming edges fold up one by one.
    ///
    /// For a weak edge the registered slot is invalidated. For a strong edge
    /// a live owner means the reachability contract was violated; that is
    /// fatal outside of shutdown teardown, where topology-blind destruction
    /// order makes it expected.
    pub(crate) fn target_died(&mut self, rid: RefId) {
        let r = *self.reference(rid);
        let owner_live = self
            .objects
            .get(&r.owner)
            .is_some_and(|o| !o.condemned);
        if r.kind.is_weak() {
            if owner_live {
                let removed = self.object_mut(r.owner).outgoing.remove(&rid);
                assert!(removed, "reference missing from its owner's outgoing set");
            }
            let owner_address = self.object(r.owner).address;
            let slot = r.slot.expect("weak reference lost its pointer slot");
            tracing::reference_destroyed(
                r.kind.as_str(),
                owner_address,
                self.address_of(r.target),
            );
            tracing::weak_invalidated(owner_address, slot);
            self.invalidate_slot(owner_address, slot);
            self.refs.remove(&rid);
        } else {
            assert!(
                self.shutting_down,
                "strong reference target destroyed while its owner lives"
            );
            if owner_live {
                self.object_mut(r.owner).outgoing.remove(&rid);
            }
            tracing::reference_destroyed(
                r.kind.as_str(),
                self.address_of(r.owner),
                self.address_of(r.target),
            );
            self.refs.remove(&rid);
        }
    }

    /// Finds one edge of the given kind from `owner` to `target` and runs
    /// the disown path on it. Scans the owner's outgoing set.
    pub(crate) fn disown(&mut self, owner: ObjectId, target: ObjectId, kind: RefKind) {
        let found = self
            .object(owner)
            .outgoing
            .iter()
            .copied()
            .find(|rid| {
                let r = self.reference(*rid);
                r.target == target && r.kind == kind
            });
        let rid = found.expect("no such reference is registered");
        self.owner_disowned(rid);
    }

    /// Address for logging. During shutdown teardown an endpoint may already
    /// be gone from the arena; 0 stands in for it.
    fn address_of(&self, id: ObjectId) -> usize {
        self.objects.get(&id).map_or(0, |o| o.address)
    }
}
