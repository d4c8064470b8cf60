use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use zerocopy::AsBytes;

use crate::card::{CardDriver, CardId, CardInfo, CID_LEN};
use crate::error::ErrorKind;
use crate::flush::RefreshSignal;
use crate::medium::MediumStatus;
use crate::registry::Registry;
use crate::storage::{Geometry, LbaId};
use crate::transport::{Direction, TransferObserver, Transport};

pub(crate) const SIM_BLOCK_SIZE: usize = 512;

pub(crate) const WRITE_PATTERN: u8 = 0xA7;

pub(crate) fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn make_cid(serial: u32) -> [u8; CID_LEN] {
    let mut id = CardId {
        manufacturer: 0x03,
        oem: *b"SM",
        product: *b"SIM01",
        revision: 0x10,
        serial: serial.to_be_bytes(),
        date: [0x01, 0x57],
        crc: 0,
    };
    id.fix_crc();
    let mut cid = [0u8; CID_LEN];
    cid.copy_from_slice(id.as_bytes());
    cid
}

/// Card controller backed by memory.
pub(crate) struct SimCard {
    data: Vec<u8>,
    num_blocks: u32,
    present: Rc<Cell<bool>>,
    failed: Rc<Cell<bool>>,
    /// Reported instead of the real geometry when set.
    pub(crate) geometry: Option<Geometry>,
    pub(crate) cid: [u8; CID_LEN],
    pub(crate) fail_init: bool,
    pub(crate) fail_transfers: bool,
    pub(crate) write_protected: bool,
    pub(crate) read_attempts: u32,
    pub(crate) write_attempts: u32,
    pub(crate) writes: u32,
}

impl SimCard {
    pub(crate) fn new(num_blocks: u32) -> Self {
        SimCard {
            data: vec![0u8; num_blocks as usize * SIM_BLOCK_SIZE],
            num_blocks,
            present: Rc::new(Cell::new(true)),
            failed: Rc::new(Cell::new(false)),
            geometry: None,
            cid: make_cid(num_blocks),
            fail_init: false,
            fail_transfers: false,
            write_protected: false,
            read_attempts: 0,
            write_attempts: 0,
            writes: 0,
        }
    }

    pub(crate) fn absent() -> Self {
        let card = SimCard::new(0);
        card.present.set(false);
        card
    }

    /// Shared presence switch, usable while the card is lent out.
    pub(crate) fn present_handle(&self) -> Rc<Cell<bool>> {
        self.present.clone()
    }

    /// Controller fault switch, usable while the card is lent out.
    pub(crate) fn failed_handle(&self) -> Rc<Cell<bool>> {
        self.failed.clone()
    }
}

impl CardDriver for SimCard {
    fn status(&self) -> MediumStatus {
        if !self.present.get() {
            MediumStatus::NotPresent
        } else if self.failed.get() {
            MediumStatus::Failed
        } else {
            MediumStatus::Ready
        }
    }

    fn init_card(&mut self) -> Result<CardInfo, ErrorKind> {
        if self.fail_init {
            return Err(ErrorKind::DeviceFailure);
        }
        Ok(CardInfo {
            cid: self.cid,
            geometry: self.geometry.unwrap_or(Geometry {
                block_size: SIM_BLOCK_SIZE,
                num_blocks: self.num_blocks,
            }),
            write_protected: self.write_protected,
        })
    }

    fn read_blocks(&mut self, lba: LbaId, data: &mut [u8]) -> Result<(), ErrorKind> {
        self.read_attempts += 1;
        if !self.present.get() {
            return Err(ErrorKind::NotPresent);
        }
        if self.fail_transfers {
            return Err(ErrorKind::DeviceFailure);
        }
        let start = lba.0 as usize * SIM_BLOCK_SIZE;
        data.copy_from_slice(&self.data[start..start + data.len()]);
        Ok(())
    }

    fn write_blocks(&mut self, lba: LbaId, data: &[u8]) -> Result<(), ErrorKind> {
        self.write_attempts += 1;
        if !self.present.get() {
            return Err(ErrorKind::NotPresent);
        }
        if self.fail_transfers {
            return Err(ErrorKind::DeviceFailure);
        }
        let start = lba.0 as usize * SIM_BLOCK_SIZE;
        self.data[start..start + data.len()].copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }
}

/// One host request replayed per service step.
#[derive(Debug, Clone)]
pub(crate) enum Op {
    Write { unit: usize, lba: u32, count: u32 },
    Read { unit: usize, lba: u32, count: u32 },
    /// Completion report without touching a unit.
    Report(Direction, u32),
    /// Timer fires.
    Tick,
}

/// Transport that replays a fixed list of host requests.
pub(crate) struct ScriptedTransport {
    refresh: &'static RefreshSignal,
    ops: VecDeque<Op>,
    pub(crate) configured: bool,
    pub(crate) attached: Vec<usize>,
    pub(crate) steps: usize,
    pub(crate) failures: u32,
    pub(crate) last_written: Vec<u8>,
    pub(crate) last_read: Vec<u8>,
}

impl ScriptedTransport {
    pub(crate) fn new(refresh: &'static RefreshSignal, ops: Vec<Op>) -> Self {
        ScriptedTransport {
            refresh,
            ops: ops.into(),
            configured: true,
            attached: vec![],
            steps: 0,
            failures: 0,
            last_written: vec![],
            last_read: vec![],
        }
    }
}

impl<'a, const N: usize> Transport<'a, SimCard, N> for ScriptedTransport {
    fn attach(&mut self, num_units: usize) {
        self.attached.push(num_units);
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn service(
        &mut self,
        units: &mut Registry<'a, SimCard, N>,
        observer: &mut dyn TransferObserver,
    ) {
        self.steps += 1;
        let op = match self.ops.pop_front() {
            Some(op) => op,
            None => return,
        };
        match op {
            Op::Write { unit, lba, count } => {
                let data = vec![WRITE_PATTERN; count as usize * SIM_BLOCK_SIZE];
                let res = units
                    .get_mut(unit)
                    .ok_or(ErrorKind::NotPresent)
                    .and_then(|u| u.write(LbaId(lba), count, &data));
                match res {
                    Ok(()) => {
                        observer.on_transfer(Direction::HostToDevice, data.len() as u32);
                        self.last_written = data;
                    }
                    Err(_) => self.failures += 1,
                }
            }
            Op::Read { unit, lba, count } => {
                let mut data = vec![0u8; count as usize * SIM_BLOCK_SIZE];
                let res = units
                    .get_mut(unit)
                    .ok_or(ErrorKind::NotPresent)
                    .and_then(|u| u.read(LbaId(lba), count, &mut data));
                match res {
                    Ok(()) => {
                        observer.on_transfer(Direction::DeviceToHost, data.len() as u32);
                        self.last_read = data;
                    }
                    Err(_) => self.failures += 1,
                }
            }
            Op::Report(direction, num_bytes) => observer.on_transfer(direction, num_bytes),
            Op::Tick => self.refresh.raise(),
        }
    }
}
