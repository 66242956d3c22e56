//! The retire stage: drains completed, WAW-resolved entries off the ROB
//! head and publishes them onto its own write-source ports (spec.md
//! §4.6.3). Each port triple is meant to feed a
//! [`crate::connection::regfile_wire::RegFileWritebackConnection`] wired to
//! a destination register file, not to be written to directly.

use crate::backend::rob::{Rob, RobEntry};
use crate::component::{PortHandle, PortSet};
use crate::packet::Packet;
use crate::port::{Direction, Port};

/// Retires completed instructions in program order and publishes each onto
/// one of `width` output port triples named `retire{i}_addr`/
/// `retire{i}_data`/`retire{i}_mask`.
/// One retire lane's output port triple.
struct RetirePort {
    addr: PortHandle,
    data: PortHandle,
    mask: PortHandle,
}

pub struct RetireStage {
    ports: PortSet,
    lanes: Vec<RetirePort>,
    /// Instructions retired so far (including trapping ones).
    pub retired: u64,
    /// Retired entries that raised a trap.
    pub traps: u64,
}

impl RetireStage {
    /// Builds a retire stage that retires at most `width` entries per
    /// cycle.
    #[must_use]
    pub fn new(width: usize) -> Self {
        let width = width.max(1);
        let mut ports = PortSet::new();
        let mut lanes = Vec::with_capacity(width);
        for i in 0..width {
            let addr = ports.insert(Port::new(format!("retire{i}_addr"), Direction::Output));
            let data = ports.insert(Port::new(format!("retire{i}_data"), Direction::Output));
            let mask = ports.insert(Port::new(format!("retire{i}_mask"), Direction::Output));
            lanes.push(RetirePort { addr, data, mask });
        }
        Self { ports, lanes, retired: 0, traps: 0 }
    }

    /// Looks up one of this stage's write-source ports by name.
    #[must_use]
    pub fn port(&self, name: &str) -> Option<PortHandle> {
        self.ports.handle(name)
    }

    /// Clears every write-source port.
    pub fn reset(&mut self) {
        self.ports.clear_all();
    }

    /// Runs one cycle: pulls a WAW-resolved batch off `rob` and publishes
    /// each entry onto its corresponding write-source port triple, in
    /// order. An entry whose port triple is still occupied by an
    /// undrained previous write is dropped (retire width should stay
    /// within what the downstream connection can drain per cycle).
    pub fn tick(&mut self, rob: &mut Rob) -> Vec<RobEntry> {
        let batch = rob.retire(self.lanes.len());
        let mut published = Vec::with_capacity(batch.len());
        for (lane, entry) in self.lanes.iter().zip(batch.iter()) {
            self.retired += 1;
            if entry.traps {
                self.traps += 1;
            }

            if lane.addr.borrow().has_data() || lane.data.borrow().has_data() {
                continue;
            }
            lane.addr.borrow_mut().set_data(Packet::Scalar(entry.dest as u64));
            lane.data.borrow_mut().set_data(Packet::Scalar(entry.result));
            lane.mask.borrow_mut().set_data(Packet::Scalar(u64::from(entry.byte_enable)));
            published.push(entry.clone());
        }
        published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::rob::DestKind;

    #[test]
    fn publishes_retired_entries_onto_their_own_port_triple() {
        let mut rob = Rob::new(4);
        let a = rob.dispatch(0, 0, 5, DestKind::Scalar, false, 0).unwrap();
        rob.complete(a, 42, 0xFF, 1);

        let mut stage = RetireStage::new(2);
        let published = stage.tick(&mut rob);
        assert_eq!(published.len(), 1);
        assert_eq!(stage.retired, 1);
        assert_eq!(stage.port("retire0_data").unwrap().borrow().peek(), Some(&Packet::Scalar(42)));
        assert_eq!(stage.port("retire0_mask").unwrap().borrow().peek(), Some(&Packet::Scalar(0xFF)));
        assert!(!stage.port("retire1_addr").unwrap().borrow().has_data());
    }

    #[test]
    fn counts_traps_separately_from_total_retired() {
        let mut rob = Rob::new(4);
        let a = rob.dispatch(0, 0, 5, DestKind::Scalar, true, 0).unwrap();
        rob.complete(a, 0, 0xFF, 1);

        let mut stage = RetireStage::new(1);
        stage.tick(&mut rob);
        assert_eq!(stage.retired, 1);
        assert_eq!(stage.traps, 1);
    }

    #[test]
    fn occupied_port_drops_the_entry_rather_than_overwriting() {
        let mut rob = Rob::new(4);
        let a = rob.dispatch(0, 0, 1, DestKind::Scalar, false, 0).unwrap();
        rob.complete(a, 7, 0xFF, 0);

        let mut stage = RetireStage::new(1);
        stage.port("retire0_addr").unwrap().borrow_mut().set_data(Packet::Scalar(99));

        let published = stage.tick(&mut rob);
        assert!(published.is_empty(), "port 0 is still occupied from a previous, undrained write");
    }
}
