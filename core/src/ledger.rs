//! Shared record of which targets have answered.
//!
//! The correlator writes to it from the capture task while the scheduler and
//! the publisher read it, so every operation takes one short lock. A host
//! enters the alive set at most once; whether it can still be handed to the
//! result queue is decided at that moment against the scan-host cap.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Outcome of [`HostLedger::mark_alive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// The address is not one of the run's targets.
    NotTarget,
    /// Already counted earlier in this run.
    AlreadyAlive,
    /// Newly alive and within the cap.
    Deliverable,
    /// Newly alive but the cap was already reached.
    OverCap,
    /// Results were already published; nothing may change any more.
    Sealed,
}

impl Promotion {
    pub fn is_new(self) -> bool {
        matches!(self, Promotion::Deliverable | Promotion::OverCap)
    }
}

/// Alive hosts in promotion order, split by the cap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub deliverable: Vec<IpAddr>,
    pub over_cap: Vec<IpAddr>,
}

#[derive(Debug, Default)]
struct LedgerSets {
    targets: HashSet<IpAddr>,
    alive: HashSet<IpAddr>,
    over_cap: HashSet<IpAddr>,
    promoted: Vec<IpAddr>,
    sealed: bool,
}

impl LedgerSets {
    fn deliverable_count(&self) -> usize {
        self.alive.len() - self.over_cap.len()
    }

    fn snapshot(&self) -> LedgerSnapshot {
        let (over_cap, deliverable): (Vec<IpAddr>, Vec<IpAddr>) = self
            .promoted
            .iter()
            .partition(|addr| self.over_cap.contains(*addr));
        LedgerSnapshot {
            deliverable,
            over_cap,
        }
    }
}

#[derive(Debug)]
pub struct HostLedger {
    sets: Mutex<LedgerSets>,
    max_scan_hosts: usize,
}

impl HostLedger {
    /// `max_scan_hosts` of 0 leaves the deliverable set unbounded.
    pub fn new<I>(targets: I, max_scan_hosts: usize) -> Self
    where
        I: IntoIterator<Item = IpAddr>,
    {
        let sets = LedgerSets {
            targets: targets.into_iter().collect(),
            ..Default::default()
        };
        Self {
            sets: Mutex::new(sets),
            max_scan_hosts,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerSets> {
        self.sets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mark_alive(&self, addr: IpAddr) -> Promotion {
        let mut sets = self.lock();
        if sets.sealed {
            return Promotion::Sealed;
        }
        if !sets.targets.contains(&addr) {
            return Promotion::NotTarget;
        }
        if !sets.alive.insert(addr) {
            return Promotion::AlreadyAlive;
        }
        sets.promoted.push(addr);

        // `alive` already includes this host.
        let within_cap =
            self.max_scan_hosts == 0 || sets.deliverable_count() <= self.max_scan_hosts;
        if within_cap {
            Promotion::Deliverable
        } else {
            sets.over_cap.insert(addr);
            Promotion::OverCap
        }
    }

    pub fn is_target(&self, addr: IpAddr) -> bool {
        self.lock().targets.contains(&addr)
    }

    pub fn is_alive(&self, addr: IpAddr) -> bool {
        self.lock().alive.contains(&addr)
    }

    pub fn target_count(&self) -> usize {
        self.lock().targets.len()
    }

    /// Alive hosts that will be (or were) handed to the result queue.
    pub fn alive_hosts_count(&self) -> usize {
        self.lock().deliverable_count()
    }

    /// Every host seen alive, including those beyond the cap.
    pub fn alive_count(&self) -> usize {
        self.lock().alive.len()
    }

    pub fn max_scan_hosts(&self) -> usize {
        self.max_scan_hosts
    }

    pub fn max_scan_hosts_reached(&self) -> bool {
        self.max_scan_hosts != 0 && self.alive_hosts_count() >= self.max_scan_hosts
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.lock().snapshot()
    }

    /// Freezes the ledger and returns its final contents. Later promotions
    /// are refused with [`Promotion::Sealed`].
    pub fn seal(&self) -> LedgerSnapshot {
        let mut sets = self.lock();
        sets.sealed = true;
        sets.snapshot()
    }

    pub fn is_sealed(&self) -> bool {
        self.lock().sealed
    }

    /// Forgets every promotion and lifts the seal. The target set and the cap
    /// stay as they are.
    pub fn reset(&self) {
        let mut sets = self.lock();
        sets.alive.clear();
        sets.over_cap.clear();
        sets.promoted.clear();
        sets.sealed = false;
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
