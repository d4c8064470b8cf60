use log::{error, info, trace, warn};
use zerocopy::{AsBytes, FromBytes, LayoutVerified};

use crate::error::ErrorKind;
use crate::medium::{MediumBackend, MediumKind, MediumStatus};
use crate::storage::{Geometry, LbaId};

pub const CID_LEN: usize = 16;

const CRC7: crc::Crc<u8> = crc::Crc::<u8>::new(&crc::CRC_7_MMC);

/// Card controller driver consumed by the card medium.
///
/// Implemented by the board's SD/MMC host driver. Clocking, bus negotiation
/// and command sequencing stay behind this interface.
pub trait CardDriver {
    /// Whether a card is seated and the controller can talk to it.
    fn status(&self) -> MediumStatus;

    /// Negotiate the bus and identify the card.
    fn init_card(&mut self) -> Result<CardInfo, ErrorKind>;

    fn read_blocks(&mut self, lba: LbaId, data: &mut [u8]) -> Result<(), ErrorKind>;

    fn write_blocks(&mut self, lba: LbaId, data: &[u8]) -> Result<(), ErrorKind>;

    /// Wait for the card to finish programming buffered writes.
    fn sync(&mut self) -> Result<(), ErrorKind> {
        Ok(())
    }
}

/// What a driver learns about a card during initialization.
#[derive(Debug, Clone)]
pub struct CardInfo {
    pub cid: [u8; CID_LEN],
    pub geometry: Geometry,
    /// Write-protect switch position.
    pub write_protected: bool,
}

/// Layout of the card identification register.
#[derive(Debug, AsBytes, FromBytes, Clone)]
#[repr(C)]
pub struct CardId {
    pub manufacturer: u8,
    pub oem: [u8; 2],
    pub product: [u8; 5],
    pub revision: u8,
    pub serial: [u8; 4],
    /// Reserved nibble, then year and month.
    pub date: [u8; 2],
    /// CRC-7 in the upper seven bits, stop bit in bit zero.
    pub crc: u8,
}

impl CardId {
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self, ErrorKind> {
        let block: Option<LayoutVerified<_, CardId>> = LayoutVerified::new(bytes);
        let cid = match block {
            Some(block) => (*block).clone(),
            None => {
                error!("Failure to create card id from bytes.");
                return Err(ErrorKind::InconsistentState);
            }
        };

        let expected = cid.compute_crc();
        if cid.crc >> 1 != expected {
            error!(
                "Card id crc mismatch: found 0x{:02x} expected 0x{:02x}",
                cid.crc >> 1,
                expected
            );
            return Err(ErrorKind::InconsistentState);
        }
        Ok(cid)
    }

    fn compute_crc(&self) -> u8 {
        CRC7.checksum(&self.as_bytes()[..CID_LEN - 1])
    }

    /// Recompute the CRC byte after the fields changed.
    pub fn fix_crc(&mut self) {
        self.crc = (self.compute_crc() << 1) | 1;
    }

    pub fn serial(&self) -> u32 {
        u32::from_be_bytes(self.serial)
    }

    /// Manufacture year and month.
    pub fn manufactured(&self) -> (u16, u8) {
        let year = (((self.date[0] & 0x0F) as u16) << 4) | (self.date[1] >> 4) as u16;
        (2000 + year, self.date[1] & 0x0F)
    }

    pub fn product_name(&self) -> &str {
        core::str::from_utf8(&self.product).unwrap_or("?????")
    }
}

/// Removable card exposed as a medium.
pub struct CardMedium<'a, D: CardDriver> {
    driver: &'a mut D,
    geometry: Geometry,
    status: MediumStatus,
    write_protected: bool,
}

impl<'a, D: CardDriver> CardMedium<'a, D> {
    /// Bring up the card behind `driver`.
    ///
    /// On failure the driver is handed back so the slot can be probed again.
    pub fn probe(driver: &'a mut D) -> Result<Self, (ErrorKind, &'a mut D)> {
        match driver.status() {
            MediumStatus::Ready => {}
            MediumStatus::NotPresent => return Err((ErrorKind::NotPresent, driver)),
            MediumStatus::Failed => return Err((ErrorKind::DeviceFailure, driver)),
        }

        let info = match driver.init_card() {
            Ok(info) => info,
            Err(e) => {
                error!("SD/MMC device initialization failed: {:?}", e);
                return Err((e, driver));
            }
        };
        let id = match CardId::try_from_bytes(&info.cid[..]) {
            Ok(id) => id,
            Err(e) => return Err((e, driver)),
        };
        if !info.geometry.block_size.is_power_of_two() || info.geometry.num_blocks == 0 {
            error!(
                "Card reported unusable geometry: {} blocks of {} bytes",
                info.geometry.num_blocks, info.geometry.block_size
            );
            return Err((ErrorKind::Configuration, driver));
        }

        let (year, month) = id.manufactured();
        info!(
            "Card mid: 0x{:02x} oid: {}{} pnm: {} prv: {}.{} psn: 0x{:08x} mdt: {}/{:02}",
            id.manufacturer,
            id.oem[0] as char,
            id.oem[1] as char,
            id.product_name(),
            id.revision >> 4,
            id.revision & 0x0F,
            id.serial(),
            year,
            month
        );
        info!(
            "Card capacity: {} blocks of {} bytes ({} MiB)",
            info.geometry.num_blocks,
            info.geometry.block_size,
            info.geometry.capacity_bytes() / (1024 * 1024)
        );

        Ok(CardMedium {
            driver,
            geometry: info.geometry,
            status: MediumStatus::Ready,
            write_protected: info.write_protected,
        })
    }

    pub fn is_write_protected(&self) -> bool {
        self.write_protected
    }

    /// Re-read presence from the driver; only enumeration calls this.
    pub fn refresh_presence(&mut self) -> MediumStatus {
        self.status = self.driver.status();
        trace!("card presence refreshed: {:?}", self.status);
        self.status
    }

    /// Give the driver back once the medium is torn down.
    pub fn into_driver(self) -> &'a mut D {
        self.driver
    }

    fn ensure_present(&self) -> Result<(), ErrorKind> {
        match self.status {
            MediumStatus::Ready => Ok(()),
            MediumStatus::NotPresent => Err(ErrorKind::NotPresent),
            MediumStatus::Failed => Err(ErrorKind::DeviceFailure),
        }
    }
}

impl<'a, D: CardDriver> MediumBackend for CardMedium<'a, D> {
    fn kind(&self) -> MediumKind {
        MediumKind::RemovableCard
    }

    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn status(&self) -> MediumStatus {
        self.status
    }

    fn read(&mut self, lba: LbaId, count: u32, data: &mut [u8]) -> Result<(), ErrorKind> {
        let num_bytes = self.geometry.check_range(lba, count, data.len())?;
        self.ensure_present()?;
        if num_bytes == 0 {
            return Ok(());
        }
        self.driver
            .read_blocks(lba, &mut data[..num_bytes])
            .map_err(|e| {
                warn!("card rd lba: {} count: {} failed: {:?}", lba.0, count, e);
                device_error(e)
            })
    }

    fn write(&mut self, lba: LbaId, count: u32, data: &[u8]) -> Result<(), ErrorKind> {
        let num_bytes = self.geometry.check_range(lba, count, data.len())?;
        self.ensure_present()?;
        if num_bytes == 0 {
            return Ok(());
        }
        self.driver
            .write_blocks(lba, &data[..num_bytes])
            .map_err(|e| {
                warn!("card wr lba: {} count: {} failed: {:?}", lba.0, count, e);
                device_error(e)
            })
    }

    fn flush(&mut self) -> Result<(), ErrorKind> {
        self.ensure_present()?;
        self.driver.sync().map_err(device_error)
    }
}

/// Driver errors other than removal collapse into a device failure.
fn device_error(e: ErrorKind) -> ErrorKind {
    match e {
        ErrorKind::NotPresent => ErrorKind::NotPresent,
        _ => ErrorKind::DeviceFailure,
    }
}
