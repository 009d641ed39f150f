//! Fixed-capacity ring of window slots indexed by `seq % capacity`.

use sr_lab_abstract::Packet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Slot {
    #[default]
    Empty,
    /// Sent and awaiting acknowledgment (sender) or received but not yet delivered (receiver)
    Buffered(Packet),
    /// Acknowledged but not yet slid past
    Acknowledged,
}

impl Slot {
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

#[derive(Debug, Clone)]
pub struct SlotRing {
    slots: Vec<Slot>,
}

impl SlotRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Slot::Empty; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn index(&self, seq: u32) -> usize {
        seq as usize % self.slots.len()
    }

    pub fn get(&self, seq: u32) -> &Slot {
        &self.slots[self.index(seq)]
    }

    pub fn set(&mut self, seq: u32, slot: Slot) {
        let idx = self.index(seq);
        self.slots[idx] = slot;
    }

    /// Clear the slot and return what it held.
    pub fn take(&mut self, seq: u32) -> Slot {
        let idx = self.index(seq);
        std::mem::take(&mut self.slots[idx])
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    pub fn clear(&mut self) {
        self.slots.fill(Slot::Empty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr_lab_abstract::Message;

    #[test]
    fn indexes_wrap_by_capacity() {
        let mut ring = SlotRing::new(6);
        let pkt = Packet::new_data(7, Message::filled(b'b'));
        ring.set(7, Slot::Buffered(pkt));
        assert_eq!(*ring.get(1), Slot::Buffered(pkt));
        assert_eq!(ring.occupied(), 1);
    }

    #[test]
    fn take_leaves_slot_empty() {
        let mut ring = SlotRing::new(4);
        ring.set(2, Slot::Acknowledged);
        assert_eq!(ring.take(2), Slot::Acknowledged);
        assert!(ring.get(2).is_empty());
        ring.set(3, Slot::Acknowledged);
        ring.clear();
        assert_eq!(ring.occupied(), 0);
        assert_eq!(ring.capacity(), 4);
    }
}
