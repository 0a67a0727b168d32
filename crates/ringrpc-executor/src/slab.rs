//! Operation arena.
//!
//! Fixed-capacity slab of in-flight `OpRecord`s. A slot's index and
//! generation make up the completion tag, so the record for a completion
//! is found without any pointer in `user_data`. Removing bumps the
//! generation: a stale tag for a reused slot no longer matches.
//!
//! The slot vector never grows after construction.

use ringrpc_core::op::OpRecord;
use ringrpc_core::token::OpToken;

struct Slot {
    generation: u32,
    op: Option<OpRecord>,
}

pub struct OpSlab {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl OpSlab {
    pub fn new(capacity: usize) -> Self {
        let mut free = Vec::with_capacity(capacity);
        for i in (0..capacity).rev() {
            free.push(i);
        }
        Self {
            slots: (0..capacity)
                .map(|_| Slot { generation: 0, op: None })
                .collect(),
            free,
        }
    }

    /// Store `op`; `None` when every slot is taken.
    pub fn insert(&mut self, op: OpRecord) -> Option<OpToken> {
        let idx = self.free.pop()?;
        let slot = &mut self.slots[idx];
        let token = OpToken::new(op.kind(), slot.generation, idx);
        slot.op = Some(op);
        Some(token)
    }

    fn slot_for(&mut self, token: OpToken) -> Option<&mut Slot> {
        let slot = self.slots.get_mut(token.slot())?;
        let live = slot.op.as_ref()?;
        let matches = Some(live.kind()) == token.kind()
            && OpToken::new(live.kind(), slot.generation, token.slot()) == token;
        matches.then_some(slot)
    }

    pub fn get_mut(&mut self, token: OpToken) -> Option<&mut OpRecord> {
        self.slot_for(token)?.op.as_mut()
    }

    /// Take the record out for good. Only a live, matching tag succeeds.
    pub fn remove(&mut self, token: OpToken) -> Option<OpRecord> {
        let slot = self.slot_for(token)?;
        let op = slot.op.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(token.slot());
        op
    }

    /// Records currently stored.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Forget every stored record without running its destructor.
    ///
    /// Used at shutdown: the kernel may still reference those buffers until
    /// the ring is gone, and the process is about to exit. Returns how many
    /// records were leaked.
    pub fn leak_all(&mut self) -> usize {
        let mut leaked = 0;
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if let Some(op) = slot.op.take() {
                std::mem::forget(op);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(idx);
                leaked += 1;
            }
        }
        leaked
    }
}
