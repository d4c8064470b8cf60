use log::{debug, error, info};

use crate::card::CardDriver;
use crate::error::ErrorKind;
use crate::lun::LogicalUnit;
use crate::medium::MediumKind;

/// Fixed capacity arena of logical units addressed by index.
///
/// Indices are handed out in registration order and are the unit numbers the
/// host sees. An evicted unit leaves a hole so later indices keep their number.
pub struct Registry<'a, D: CardDriver, const N: usize> {
    units: [Option<LogicalUnit<'a, D>>; N],
    len: usize,
}

impl<'a, D: CardDriver, const N: usize> Registry<'a, D, N> {
    pub fn new() -> Self {
        Registry {
            units: core::array::from_fn(|_| None),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Number of indices assigned so far, bound or not.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of indices currently backed by a unit.
    pub fn active_count(&self) -> usize {
        self.units.iter().filter(|u| u.is_some()).count()
    }

    /// Register `unit` at the next free index.
    pub fn push(
        &mut self,
        unit: LogicalUnit<'a, D>,
    ) -> Result<usize, (ErrorKind, LogicalUnit<'a, D>)> {
        if self.len >= N {
            error!("Unit registry full, {} units", N);
            return Err((ErrorKind::Configuration, unit));
        }
        let index = self.len;
        self.units[index] = Some(unit);
        self.len += 1;
        info!("Registered unit {} of {}", index, N);
        Ok(index)
    }

    /// Re-bind a unit at an index that was assigned before and is now empty.
    pub fn install(
        &mut self,
        index: usize,
        unit: LogicalUnit<'a, D>,
    ) -> Result<usize, (ErrorKind, LogicalUnit<'a, D>)> {
        if index >= self.len || self.units[index].is_some() {
            error!("Unit index {} is not free for re-binding", index);
            return Err((ErrorKind::Configuration, unit));
        }
        self.units[index] = Some(unit);
        info!("Re-bound unit {}", index);
        Ok(index)
    }

    /// Remove the unit at `index`, keeping the index reserved.
    pub fn evict(&mut self, index: usize) -> Option<LogicalUnit<'a, D>> {
        let unit = self.units.get_mut(index)?.take();
        if unit.is_some() {
            debug!("Evicted unit {}", index);
        }
        unit
    }

    pub fn get(&self, index: usize) -> Option<&LogicalUnit<'a, D>> {
        self.units.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut LogicalUnit<'a, D>> {
        self.units.get_mut(index)?.as_mut()
    }

    /// Bound units with their index, in host order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &LogicalUnit<'a, D>)> {
        self.units[..self.len]
            .iter()
            .enumerate()
            .filter_map(|(i, u)| u.as_ref().map(|u| (i, u)))
    }

    /// The unit backed by the fixed memory medium.
    pub fn fixed_unit_mut(&mut self) -> Option<&mut LogicalUnit<'a, D>> {
        self.units
            .iter_mut()
            .flatten()
            .find(|u| u.kind() == MediumKind::FixedMemory)
    }
}

impl<'a, D: CardDriver, const N: usize> Default for Registry<'a, D, N> {
    fn default() -> Self {
        Self::new()
    }
}
