use log::{debug, error, info, warn};

use crate::buffer::BufferPool;
use crate::card::{CardDriver, CardMedium};
use crate::error::ErrorKind;
use crate::lun::LogicalUnit;
use crate::medium::{Medium, MediumStatus};
use crate::ramdisk::RamDisk;
use crate::registry::Registry;
use crate::Config;

/// Probe state of one removable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Unprobed,
    /// Card present and bound to a unit.
    Bound,
    /// Card present but bring-up or binding failed.
    Failed,
    Absent,
}

struct Slot<'a, D: CardDriver> {
    /// Held while no unit owns the card.
    driver: Option<&'a mut D>,
    state: SlotState,
    /// Index assigned on first binding, kept across removal.
    unit: Option<usize>,
}

/// Brings up the fixed medium and the card slots and registers their units.
pub struct Enumerator<'a, D: CardDriver, const S: usize> {
    fixed: Option<RamDisk<'a>>,
    fixed_unit: Option<usize>,
    slots: [Slot<'a, D>; S],
    config: Config,
}

impl<'a, D: CardDriver, const S: usize> Enumerator<'a, D, S> {
    pub fn new(fixed: RamDisk<'a>, drivers: [&'a mut D; S], config: Config) -> Self {
        Enumerator {
            fixed: Some(fixed),
            fixed_unit: None,
            slots: drivers.map(|driver| Slot {
                driver: Some(driver),
                state: SlotState::Unprobed,
                unit: None,
            }),
            config,
        }
    }

    pub fn slot_state(&self, slot: usize) -> Option<SlotState> {
        self.slots.get(slot).map(|s| s.state)
    }

    /// Unit index the slot's card is (or was last) bound to.
    pub fn slot_unit(&self, slot: usize) -> Option<usize> {
        self.slots.get(slot).and_then(|s| s.unit)
    }

    pub fn fixed_unit(&self) -> Option<usize> {
        self.fixed_unit
    }

    /// Bind every available medium into `registry`, returning the unit count.
    ///
    /// Safe to call again: bound media are left alone, removed cards are
    /// evicted and absent or failed slots are probed once more.
    pub fn run<const N: usize, const B: usize>(
        &mut self,
        registry: &mut Registry<'a, D, N>,
        pool: &mut BufferPool<'a, B>,
    ) -> usize {
        if let Err(e) = self.bind_fixed(registry, pool) {
            error!("Fixed medium not bound: {:?}", e);
        }

        for i in 0..S {
            if self.slots[i].state == SlotState::Bound {
                self.check_removed(i, registry, pool);
            } else {
                self.probe_slot(i, registry, pool);
            }
        }

        info!(
            "Enumeration done: {} units, {} active, {} buffers spare",
            registry.len(),
            registry.active_count(),
            pool.available()
        );
        registry.len()
    }

    fn bind_fixed<const N: usize, const B: usize>(
        &mut self,
        registry: &mut Registry<'a, D, N>,
        pool: &mut BufferPool<'a, B>,
    ) -> Result<(), ErrorKind> {
        let disk = match self.fixed.take() {
            Some(disk) => disk,
            None => return Ok(()),
        };
        if !registry.is_empty() {
            // The fixed medium must own unit 0.
            self.fixed = Some(disk);
            return Err(ErrorKind::Configuration);
        }
        let buffer = match pool.take() {
            Some(buffer) => buffer,
            None => {
                self.fixed = Some(disk);
                return Err(ErrorKind::Configuration);
            }
        };

        let unit = match LogicalUnit::bind(disk.into(), buffer, self.config.fixed_read_only) {
            Ok(unit) => unit,
            Err(unbound) => {
                pool.give_back(unbound.buffer);
                if let Medium::Fixed(disk) = unbound.medium {
                    self.fixed = Some(disk);
                }
                return Err(unbound.kind);
            }
        };
        match registry.push(unit) {
            Ok(index) => {
                debug_assert_eq!(index, 0);
                self.fixed_unit = Some(index);
                Ok(())
            }
            Err((kind, unit)) => {
                let (medium, buffer) = unit.into_parts();
                pool.give_back(buffer);
                if let Medium::Fixed(disk) = medium {
                    self.fixed = Some(disk);
                }
                Err(kind)
            }
        }
    }

    fn check_removed<const N: usize, const B: usize>(
        &mut self,
        i: usize,
        registry: &mut Registry<'a, D, N>,
        pool: &mut BufferPool<'a, B>,
    ) {
        let slot = &mut self.slots[i];
        let index = match slot.unit {
            Some(index) => index,
            None => {
                warn!("Slot {} bound without a unit index", i);
                slot.state = SlotState::Failed;
                return;
            }
        };
        let status = match registry
            .get_mut(index)
            .and_then(|unit| unit.medium_mut().as_card_mut())
        {
            Some(card) => card.refresh_presence(),
            None => {
                warn!("Slot {} unit {} missing from registry", i, index);
                slot.state = SlotState::Failed;
                return;
            }
        };
        match status {
            MediumStatus::Ready => {
                debug!("Slot {} still present as unit {}", i, index);
                return;
            }
            MediumStatus::Failed => {
                // Stays registered; transfers fail until the card reports ready again.
                warn!("Slot {} unit {} reports a failed card", i, index);
                return;
            }
            MediumStatus::NotPresent => {}
        }

        if let Some(unit) = registry.evict(index) {
            let (medium, buffer) = unit.into_parts();
            pool.give_back(buffer);
            slot.driver = reclaim(medium);
        }
        slot.state = SlotState::Absent;
        info!("** Card {} Disconnected", i);
    }

    fn probe_slot<const N: usize, const B: usize>(
        &mut self,
        i: usize,
        registry: &mut Registry<'a, D, N>,
        pool: &mut BufferPool<'a, B>,
    ) {
        let slot = &mut self.slots[i];
        let driver = match slot.driver.take() {
            Some(driver) => driver,
            None => {
                warn!("Slot {} has no driver to probe", i);
                return;
            }
        };

        if driver.status() == MediumStatus::Ready {
            info!("Connecting to slot {}", i);
        }
        let card = match CardMedium::probe(driver) {
            Ok(card) => card,
            Err((ErrorKind::NotPresent, driver)) => {
                if slot.state != SlotState::Absent {
                    info!("** Card {} Disconnected", i);
                }
                slot.driver = Some(driver);
                slot.state = SlotState::Absent;
                return;
            }
            Err((e, driver)) => {
                error!("Slot {} bring-up failed: {:?}", i, e);
                slot.driver = Some(driver);
                slot.state = SlotState::Failed;
                return;
            }
        };

        let buffer = match pool.take() {
            Some(buffer) => buffer,
            None => {
                error!("No buffer left for slot {}", i);
                slot.driver = Some(card.into_driver());
                slot.state = SlotState::Failed;
                return;
            }
        };
        let read_only = card.is_write_protected();
        let unit = match LogicalUnit::bind(card.into(), buffer, read_only) {
            Ok(unit) => unit,
            Err(unbound) => {
                error!("Slot {} binding failed: {:?}", i, unbound.kind);
                pool.give_back(unbound.buffer);
                slot.driver = reclaim(unbound.medium);
                slot.state = SlotState::Failed;
                return;
            }
        };

        let res = match slot.unit {
            Some(index) => registry.install(index, unit),
            None => registry.push(unit),
        };
        match res {
            Ok(index) => {
                info!("Slot {} bound as unit {}", i, index);
                slot.unit = Some(index);
                slot.state = SlotState::Bound;
            }
            Err((kind, unit)) => {
                error!("Slot {} not registered: {:?}", i, kind);
                let (medium, buffer) = unit.into_parts();
                pool.give_back(buffer);
                slot.driver = reclaim(medium);
                slot.state = SlotState::Failed;
            }
        }
    }
}

fn reclaim<'a, D: CardDriver>(medium: Medium<'a, D>) -> Option<&'a mut D> {
    match medium {
        Medium::Card(card) => Some(card.into_driver()),
        Medium::Fixed(_) => {
            error!("Fixed medium found in a card slot");
            None
        }
    }
}
