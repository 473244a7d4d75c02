//! Object records and the condemnation path.

use std::collections::HashSet;

use crate::heap::Heap;
use crate::reference::RefId;
use crate::tracing;
use crate::{Address, Finalizer};

/// Identity of an object in the object arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct ObjectId(pub(crate) u64);

/// One tracked allocation.
pub(crate) struct Object {
    /// The raw address the host knows this object by. Never dereferenced.
    pub(crate) address: usize,
    pub(crate) finalizer: Option<Finalizer>,
    /// Length of collector-owned backing storage; 0 means the host owns it.
    pub(crate) self_len: usize,
    /// Set once destruction begins; sticky. Callbacks use it to recognise an
    /// endpoint whose edge sets are already being drained.
    pub(crate) condemned: bool,
    /// Edges pointing at this object.
    pub(crate) incoming: HashSet<RefId>,
    /// Edges this object owns.
    pub(crate) outgoing: HashSet<RefId>,
}

impl Object {
    pub(crate) fn new(address: usize, finalizer: Option<Finalizer>, self_len: usize) -> Self {
        assert!(address != 0, "object constructed with a null address");
        Self {
            address,
            finalizer,
            self_len,
            condemned: false,
            incoming: HashSet::new(),
            outgoing: HashSet::new(),
        }
    }
}

impl Heap {
    /// Whether anything still points at the object. The root is always
    /// referenced. Weak edges count here on purpose: an edge mutation that
    /// empties the strong side must not reclaim an object a weak observer
    /// is still watching. Only the mark phase, which follows strong edges
    /// exclusively, may do that (and then the observer is invalidated).
    pub(crate) fn is_referenced(&self, id: ObjectId) -> bool {
        id == self.root || !self.object(id).incoming.is_empty()
    }

    /// The only way an object dies.
    ///
    /// `last_reference` is `Some` on the trivial-reclamation paths (the edge
    /// whose removal emptied the incoming set) and `None` for the planned
    /// condemnations of a sweep and of shutdown. Trivial condemnation is a
    /// no-op while a sweep is partitioning a field table, and condemnation
    /// of any kind is a no-op on an object already condemned.
    pub(crate) fn condemn(&mut self, id: ObjectId, last_reference: Option<RefId>) {
        let Some(obj) = self.objects.get(&id) else {
            return;
        };
        if obj.condemned {
            return;
        }
        if last_reference.is_some() && self.suppress_trivial {
            return;
        }

        // Strip the incoming edges whose owners are still alive before the
        // destructor walks the sets: those owners run their own callbacks
        // later, and an edge present in both walks would be removed twice.
        let address = obj.address;
        let stripped: Vec<RefId> = match last_reference {
            Some(rid) => vec![rid],
            None => obj
                .incoming
                .iter()
                .copied()
                .filter(|rid| !self.reference(*rid).kind.is_weak())
                .collect(),
        };
        let obj = self.object_mut(id);
        obj.condemned = true;
        for rid in &stripped {
            obj.incoming.remove(rid);
        }

        self.unbind(address);
        self.destroy(id);
    }

    /// Destructor body: finalizer, outgoing callbacks, incoming callbacks,
    /// then release of collector-owned storage.
    fn destroy(&mut self, id: ObjectId) {
        let (address, finalizer, self_len) = {
            let obj = self.object(id);
            (obj.address, obj.finalizer, obj.self_len)
        };

        if !self.finalizers_disabled {
            if let Some(finalize) = finalizer {
                finalize(address as Address);
            }
        }

        // Snapshot before iterating: the callbacks delete records and may
        // cascade into further destructions.
        let owned: Vec<RefId> = self.object(id).outgoing.iter().copied().collect();
        for rid in owned {
            if self.refs.contains_key(&rid) {
                self.owner_died(rid);
            }
        }
        let pointing: Vec<RefId> = self.object(id).incoming.iter().copied().collect();
        for rid in pointing {
            if self.refs.contains_key(&rid) {
                self.target_died(rid);
            }
        }

        self.objects.remove(&id);
        if self_len > 0 {
            // SAFETY: storage with self_len > 0 was allocated by this
            // collector with exactly this layout.
            unsafe {
                std::alloc::dealloc(address as *mut u8, Self::storage_layout(self_len));
            }
        }
    }

    /// Shutdown teardown: walk the field chain youngest first and condemn
    /// whatever is still standing. Destruction order ignores reference
    /// topology here, which is why strong target death is tolerated while
    /// `shutting_down` is set.
    pub(crate) fn teardown(&mut self, run_finalizers: bool) {
        self.shutting_down = true;
        self.finalizers_disabled = !run_finalizers;
        for index in 0..crate::field::FIELD_COUNT {
            let residents: Vec<ObjectId> = self.fields[index].table.values().copied().collect();
            for id in residents {
                if self.objects.contains_key(&id) {
                    tracing::object_condemned(self.object(id).address, "shutdown");
                    self.condemn(id, None);
                }
            }
        }
        debug_assert!(self.objects.is_empty(), "teardown left objects behind");
        debug_assert!(self.refs.is_empty(), "teardown left references behind");
    }
}
