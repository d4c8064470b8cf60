use crate::card::{CardDriver, CardMedium};
use crate::error::ErrorKind;
use crate::ramdisk::RamDisk;
use crate::storage::{Geometry, LbaId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediumKind {
    FixedMemory,
    RemovableCard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediumStatus {
    Ready,
    NotPresent,
    Failed,
}

/// Block store capability shared by every backend.
pub trait MediumBackend {
    fn kind(&self) -> MediumKind;

    fn geometry(&self) -> Geometry;

    fn status(&self) -> MediumStatus;

    /// Read `count` blocks starting at `lba` into the head of `data`.
    fn read(&mut self, lba: LbaId, count: u32, data: &mut [u8]) -> Result<(), ErrorKind>;

    /// Write `count` blocks starting at `lba` from the head of `data`.
    fn write(&mut self, lba: LbaId, count: u32, data: &[u8]) -> Result<(), ErrorKind>;

    /// Commit any state the backend buffers internally.
    fn flush(&mut self) -> Result<(), ErrorKind> {
        Ok(())
    }
}

/// A medium as bound into a logical unit.
pub enum Medium<'a, D: CardDriver> {
    Fixed(RamDisk<'a>),
    Card(CardMedium<'a, D>),
}

impl<'a, D: CardDriver> Medium<'a, D> {
    pub fn as_card_mut(&mut self) -> Option<&mut CardMedium<'a, D>> {
        match self {
            Medium::Card(card) => Some(card),
            Medium::Fixed(_) => None,
        }
    }
}

impl<'a, D: CardDriver> MediumBackend for Medium<'a, D> {
    fn kind(&self) -> MediumKind {
        match self {
            Medium::Fixed(disk) => disk.kind(),
            Medium::Card(card) => card.kind(),
        }
    }

    fn geometry(&self) -> Geometry {
        match self {
            Medium::Fixed(disk) => disk.geometry(),
            Medium::Card(card) => card.geometry(),
        }
    }

    fn status(&self) -> MediumStatus {
        match self {
            Medium::Fixed(disk) => disk.status(),
            Medium::Card(card) => card.status(),
        }
    }

    fn read(&mut self, lba: LbaId, count: u32, data: &mut [u8]) -> Result<(), ErrorKind> {
        match self {
            Medium::Fixed(disk) => disk.read(lba, count, data),
            Medium::Card(card) => card.read(lba, count, data),
        }
    }

    fn write(&mut self, lba: LbaId, count: u32, data: &[u8]) -> Result<(), ErrorKind> {
        match self {
            Medium::Fixed(disk) => disk.write(lba, count, data),
            Medium::Card(card) => card.write(lba, count, data),
        }
    }

    fn flush(&mut self) -> Result<(), ErrorKind> {
        match self {
            Medium::Fixed(disk) => disk.flush(),
            Medium::Card(card) => card.flush(),
        }
    }
}

impl<'a, D: CardDriver> From<RamDisk<'a>> for Medium<'a, D> {
    fn from(disk: RamDisk<'a>) -> Self {
        Medium::Fixed(disk)
    }
}

impl<'a, D: CardDriver> From<CardMedium<'a, D>> for Medium<'a, D> {
    fn from(card: CardMedium<'a, D>) -> Self {
        Medium::Card(card)
    }
}
