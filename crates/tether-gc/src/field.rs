//! Generation tables and the mark/sweep/promote step.
//!
//! A field maps raw addresses to object records. Fields form a fixed chain
//! from the nursery (index 0) to the tenured table (index `FIELD_COUNT - 1`,
//! where the root lives). Lookup walks youngest to oldest, so an address is
//! bound in at most one field. Collecting a field traces strong reachability
//! from the root *within that field only*, promotes survivors to the parent
//! (or rebuilds the table, for the oldest field), and condemns the rest.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::heap::Heap;
use crate::object::ObjectId;
use crate::tracing;

/// Depth of the field chain: nursery, middle, tenured.
pub(crate) const FIELD_COUNT: usize = 3;

/// One generation's address table.
pub(crate) struct Field {
    pub(crate) table: HashMap<usize, ObjectId>,
}

impl Field {
    pub(crate) fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }
}

impl Heap {
    /// Resolves an address anywhere in the chain, youngest first.
    pub(crate) fn lookup(&self, address: usize) -> Option<ObjectId> {
        self.lookup_from(0, address)
    }

    /// Resolves an address in the given field or any older one.
    pub(crate) fn lookup_from(&self, start: usize, address: usize) -> Option<ObjectId> {
        self.fields[start..]
            .iter()
            .find_map(|field| field.table.get(&address).copied())
    }

    /// Binds a fresh object in the nursery.
    pub(crate) fn bind_nursery(&mut self, address: usize, id: ObjectId) {
        self.fields[0].table.insert(address, id);
    }

    /// Binds directly into the oldest field; used for the root at startup.
    pub(crate) fn bind_tenured(&mut self, address: usize, id: ObjectId) {
        self.fields[FIELD_COUNT - 1].table.insert(address, id);
    }

    /// Drops an address binding from whichever field holds it.
    pub(crate) fn unbind(&mut self, address: usize) {
        for field in &mut self.fields {
            if field.table.remove(&address).is_some() {
                return;
            }
        }
        panic!("address {address:#x} is bound in no field");
    }

    /// Rebinds an address in place, within whichever field holds it.
    pub(crate) fn rebind(&mut self, old: usize, new: usize, id: ObjectId) {
        for field in &mut self.fields {
            if field.table.remove(&old).is_some() {
                field.table.insert(new, id);
                return;
            }
        }
        panic!("address {old:#x} is bound in no field");
    }

    /// Collects the youngest `depth` fields, youngest first. Depth 1 is a
    /// partial (nursery) collection; depth [`FIELD_COUNT`] is a full one.
    pub(crate) fn collect(&mut self, depth: usize) {
        tracing::collection_started(depth);
        for index in 0..depth.min(FIELD_COUNT) {
            self.collect_field(index);
        }
        tracing::collection_finished();
    }

    /// One generational step over `fields[index]`.
    fn collect_field(&mut self, index: usize) {
        let promote = index + 1 < FIELD_COUNT;

        // Trace strong reachability from the root, confined to this field's
        // own table. Objects bound elsewhere are not traversed: if they are
        // older they count as retained already (see the elder check below),
        // and younger fields were swept earlier in the same collection.
        let mut reached: HashSet<ObjectId> = HashSet::new();
        let mut worklist: VecDeque<ObjectId> = VecDeque::new();
        reached.insert(self.root);
        worklist.push_back(self.root);
        // Objects strongly held from an older generation act as extra trace
        // roots: their descendants inside this field are reachable through
        // them, and the trace never leaves the field to discover that. The
        // elder itself may be garbage; retention is conservative until the
        // elder's own generation is swept.
        if promote {
            let residents: Vec<ObjectId> = self.fields[index].table.values().copied().collect();
            for id in residents {
                if self.retained_by_elder(index, id) && reached.insert(id) {
                    worklist.push_back(id);
                }
            }
        }
        while let Some(id) = worklist.pop_front() {
            for rid in &self.object(id).outgoing {
                let r = self.reference(*rid);
                if r.kind.is_weak() {
                    continue;
                }
                if r.target == id {
                    continue;
                }
                let target_address = self.object(r.target).address;
                if !self.fields[index].table.contains_key(&target_address) {
                    continue;
                }
                if reached.insert(r.target) {
                    worklist.push_back(r.target);
                }
            }
        }

        // Partition the table. Survivors are copied into the destination
        // (the parent's table, or a replacement for the oldest field); the
        // rest queue up for condemnation. Trivial reclamation stays off for
        // the walk so that nothing is destroyed before the plan is final.
        self.suppress_trivial = true;
        let entries: Vec<(usize, ObjectId)> = self.fields[index]
            .table
            .iter()
            .map(|(&address, &id)| (address, id))
            .collect();
        let mut replacement: HashMap<usize, ObjectId> = HashMap::new();
        let mut doomed: Vec<ObjectId> = Vec::new();
        let mut retained = 0usize;
        for (address, id) in entries {
            if reached.contains(&id) {
                retained += 1;
                if promote {
                    self.fields[index + 1].table.insert(address, id);
                } else {
                    replacement.insert(address, id);
                }
            } else {
                assert!(id != self.root, "root object ended up unreachable");
                doomed.push(id);
            }
        }
        self.suppress_trivial = false;

        tracing::field_swept(index, retained, doomed.len());
        for id in doomed {
            if let Some(obj) = self.objects.get(&id) {
                tracing::object_condemned(obj.address, "unreachable");
            }
            self.condemn(id, None);
        }

        // The doomed entries removed themselves during condemnation; what is
        // left of the old table is either promoted duplicates or, for the
        // oldest field, superseded by the replacement.
        if promote {
            self.fields[index].table.clear();
        } else {
            self.fields[index].table = replacement;
        }
    }

    /// Whether a strong incoming edge originates in an older generation.
    /// Keeps inter-generation references working without a write barrier: an
    /// elder owner retains its target across a partial collection even
    /// though the trace never leaves the swept field.
    fn retained_by_elder(&self, index: usize, id: ObjectId) -> bool {
        self.object(id).incoming.iter().any(|rid| {
            let r = self.reference(*rid);
            !r.kind.is_weak() && {
                let owner_address = self.object(r.owner).address;
                self.lookup_from(index + 1, owner_address).is_some()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::RefKind;

    /// Cyclically linked pair so that releasing the root edges does not
    /// trigger trivial reclamation before the sweep runs.
    fn linked_pair(heap: &mut Heap, a_addr: usize, b_addr: usize) -> (ObjectId, ObjectId) {
        let a = heap.register(a_addr, heap.root, None);
        let b = heap.register(b_addr, heap.root, None);
        heap.link_strong(a, b, None);
        heap.link_strong(b, a, None);
        (a, b)
    }

    #[test]
    fn lookup_walks_youngest_to_oldest() {
        let mut heap = Heap::new();
        heap.register(0x1000, heap.root, None);
        assert!(heap.fields[0].table.contains_key(&0x1000));
        assert!(heap.lookup(0x1000).is_some());
        assert!(heap.lookup(crate::heap::ROOT_SENTINEL).is_some());
        assert!(heap.lookup(0x9999).is_none());
    }

    #[test]
    fn cycle_is_reclaimed_by_one_collection() {
        let mut heap = Heap::new();
        let (a, b) = linked_pair(&mut heap, 0x1000, 0x2000);
        heap.disown(heap.root, a, RefKind::Strong);
        heap.disown(heap.root, b, RefKind::Strong);
        // The mutual edges keep both "referenced", so they survive release.
        assert!(heap.lookup(0x1000).is_some());
        assert!(heap.lookup(0x2000).is_some());

        heap.collect(FIELD_COUNT);
        assert!(heap.lookup(0x1000).is_none());
        assert!(heap.lookup(0x2000).is_none());
    }

    #[test]
    fn self_edge_does_not_retain() {
        let mut heap = Heap::new();
        let a = heap.register(0x1000, heap.root, None);
        heap.link_strong(a, a, None);
        heap.disown(heap.root, a, RefKind::Strong);
        assert!(heap.lookup(0x1000).is_some());

        heap.collect(FIELD_COUNT);
        assert!(heap.lookup(0x1000).is_none());
    }

    #[test]
    fn survivors_are_promoted_one_generation_per_collection() {
        let mut heap = Heap::new();
        heap.register(0x1000, heap.root, None);
        heap.collect(1);
        assert!(heap.fields[0].table.is_empty());
        assert!(heap.fields[1].table.contains_key(&0x1000));

        heap.collect(1);
        assert!(heap.fields[1].table.contains_key(&0x1000));

        heap.collect(2);
        assert!(heap.fields[1].table.is_empty());
        assert!(heap.fields[2].table.contains_key(&0x1000));
    }

    #[test]
    fn partial_collection_spares_tenured_garbage() {
        let mut heap = Heap::new();
        let (a, b) = linked_pair(&mut heap, 0x1000, 0x2000);
        heap.collect(1);
        heap.collect(2);
        assert!(heap.fields[2].table.contains_key(&0x1000));

        heap.disown(heap.root, a, RefKind::Strong);
        heap.disown(heap.root, b, RefKind::Strong);
        heap.collect(1);
        assert!(heap.lookup(0x1000).is_some());
        assert!(heap.lookup(0x2000).is_some());

        heap.collect(FIELD_COUNT);
        assert!(heap.lookup(0x1000).is_none());
        assert!(heap.lookup(0x2000).is_none());
    }

    #[test]
    fn elder_owner_retains_nursery_target() {
        let mut heap = Heap::new();
        let keeper = heap.register(0x1000, heap.root, None);
        heap.collect(1);
        heap.collect(2);
        assert!(heap.fields[2].table.contains_key(&0x1000));

        // A fresh nursery object referenced only from the tenured keeper.
        let fresh = heap.register(0x2000, heap.root, None);
        heap.link_strong(keeper, fresh, None);
        heap.disown(heap.root, fresh, RefKind::Strong);

        heap.collect(1);
        assert!(heap.lookup(0x2000).is_some());
        assert!(heap.fields[1].table.contains_key(&0x2000));

        // Once the elder lets go, the object is plain garbage.
        heap.disown(keeper, fresh, RefKind::Strong);
        assert!(heap.lookup(0x2000).is_none());
    }

    #[test]
    fn elder_retention_extends_to_nursery_descendants() {
        let mut heap = Heap::new();
        let keeper = heap.register(0x1000, heap.root, None);
        heap.collect(1);
        heap.collect(2);

        // keeper -> first -> second, with both newcomers in the nursery and
        // no root path into either.
        let first = heap.register(0x2000, heap.root, None);
        let second = heap.register(0x3000, heap.root, None);
        heap.link_strong(keeper, first, None);
        heap.link_strong(first, second, None);
        heap.disown(heap.root, first, RefKind::Strong);
        heap.disown(heap.root, second, RefKind::Strong);

        heap.collect(1);
        assert!(heap.lookup(0x2000).is_some());
        assert!(heap.lookup(0x3000).is_some());

        heap.disown(keeper, first, RefKind::Strong);
        assert!(heap.lookup(0x2000).is_none());
        assert!(heap.lookup(0x3000).is_none());
    }

    #[test]
    fn collection_reclaims_exactly_the_unreachable() {
        let mut heap = Heap::new();
        // root -> a -> b, plus orphan pair c <-> d.
        let a = heap.register(0x1000, heap.root, None);
        let b = heap.register(0x2000, heap.root, None);
        heap.link_strong(a, b, None);
        heap.disown(heap.root, b, RefKind::Strong);
        let (c, d) = linked_pair(&mut heap, 0x3000, 0x4000);
        heap.disown(heap.root, c, RefKind::Strong);
        heap.disown(heap.root, d, RefKind::Strong);

        heap.collect(FIELD_COUNT);
        assert!(heap.lookup(0x1000).is_some());
        assert!(heap.lookup(0x2000).is_some());
        assert!(heap.lookup(0x3000).is_none());
        assert!(heap.lookup(0x4000).is_none());

        // Cutting the chain strands b.
        heap.disown(a, b, RefKind::Strong);
        heap.collect(FIELD_COUNT);
        assert!(heap.lookup(0x1000).is_some());
        assert!(heap.lookup(0x2000).is_none());
    }

    #[test]
    fn root_survives_every_collection() {
        let mut heap = Heap::new();
        for _ in 0..4 {
            heap.collect(FIELD_COUNT);
        }
        assert!(heap.lookup(crate::heap::ROOT_SENTINEL).is_some());
    }
}
