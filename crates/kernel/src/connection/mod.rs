//! Connection framework and its flow-control variants.
//!
//! A connection binds a source port set to a destination port set and is
//! itself a ticking entity: `start` schedules its first propagate, and
//! every propagate reschedules its own successor at `last_time + period`,
//! exactly the discipline [`crate::event::schedule_periodic`] gives
//! components — connections need their own copy of it because propagate
//! needs `&mut EventKernel` (to schedule delayed deliveries), which
//! `schedule_periodic`'s plain `FnMut(&mut T)` tick signature doesn't carry.
//!
//! Per the design notes on connection back-pointers: a [`crate::port::Port`]
//! never points back at the connection that feeds or drains it. Instead
//! every variant here holds [`crate::component::PortHandle`] clones for
//! exactly the ports it binds.

pub mod broadcast;
pub mod credit;
pub mod ready_valid;
pub mod regfile_wire;

pub use broadcast::BroadcastConnection;
pub use credit::CreditConnection;
pub use ready_valid::ReadyValidConnection;
pub use regfile_wire::RegFileWritebackConnection;

use std::cell::RefCell;
use std::rc::Rc;

use crate::common::time::SimTime;
use crate::component::PortHandle;
use crate::event::{EventHandle, EventKernel, EventKind, Priority};
use crate::packet::Packet;
use crate::common::error::SimResult;

/// Common ticking behavior every connection variant implements.
pub trait Connection {
    /// Name used in trace records and scheduler labels.
    fn name(&self) -> &str;

    /// Cycles between successive propagates.
    fn period(&self) -> u64;

    /// Executes one propagate: inspects source ports and moves packets
    /// toward destination ports per this connection's flow-control
    /// discipline.
    fn propagate(&mut self, kernel: &mut EventKernel);
}

/// Schedules `conn`'s first propagate at `start_time`, and every
/// subsequent one at `last_time + period`, for as long as the connection
/// lives.
pub fn start<C: Connection + 'static>(
    conn: Rc<RefCell<C>>,
    kernel: &mut EventKernel,
    start_time: SimTime,
) -> SimResult<EventHandle> {
    fn fire<C: Connection + 'static>(kernel: &mut EventKernel, time: SimTime, conn: Rc<RefCell<C>>) {
        let period = conn.borrow().period();
        conn.borrow_mut().propagate(kernel);
        let next = time.advance(period.max(1));
        let c2 = conn.clone();
        let _ = kernel.schedule_at(next, Priority::Connection, EventKind::Propagate, "propagate", move |k| {
            fire(k, next, c2);
        });
    }

    kernel.schedule_at(start_time, Priority::Connection, EventKind::Propagate, "propagate", move |k| {
        fire(k, start_time, conn);
    })
}

/// Delivers `packet` onto `dest`, either inline (latency 0 — safe because
/// [`Priority::Connection`] already precedes [`Priority::Component`] this
/// cycle) or via a [`Priority::Delivery`] event scheduled to land one cycle
/// early, per the kernel's delivery-before-next-cycle guarantee.
pub fn deliver(kernel: &mut EventKernel, current_time: SimTime, latency: u64, dest: PortHandle, packet: Packet) {
    if latency == 0 {
        dest.borrow_mut().set_data(packet);
        return;
    }
    let fire_time = current_time.advance(latency - 1);
    let _ = kernel.schedule_at(fire_time, Priority::Delivery, EventKind::Delivery, "delivery", move |_k| {
        dest.borrow_mut().set_data(packet);
    });
}
