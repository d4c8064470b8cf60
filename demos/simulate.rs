use ironmsd::{
    BufferPool, CardDriver, CardId, CardInfo, Config, Direction, Enumerator, ErrorKind,
    FlushDecision, Geometry, IoBuffer, LbaId, MediumStatus, RamDisk, RefreshSignal, Registry,
    ServiceLoop, TransferObserver, Transport, IO_BUFFER_SIZE, MAX_CARD_SLOTS, MAX_UNITS,
};
use log::LevelFilter;
use log::{info, warn};
use structopt::StructOpt;
use zerocopy::AsBytes;

/// Card slot simulated in host memory.
struct MemCard {
    data: Vec<u8>,
    num_blocks: u32,
    present: bool,
    serial: u32,
}

impl MemCard {
    fn new(serial: u32, num_blocks: u32, present: bool) -> Self {
        MemCard {
            data: vec![0u8; num_blocks as usize * 512],
            num_blocks,
            present,
            serial,
        }
    }
}

impl CardDriver for MemCard {
    fn status(&self) -> MediumStatus {
        if self.present {
            MediumStatus::Ready
        } else {
            MediumStatus::NotPresent
        }
    }

    fn init_card(&mut self) -> Result<CardInfo, ErrorKind> {
        let mut id = CardId {
            manufacturer: 0x1B,
            oem: *b"SM",
            product: *b"00000",
            revision: 0x10,
            serial: self.serial.to_be_bytes(),
            date: [0x01, 0x83],
            crc: 0,
        };
        id.fix_crc();
        let mut cid = [0u8; 16];
        cid.copy_from_slice(id.as_bytes());
        Ok(CardInfo {
            cid,
            geometry: Geometry {
                block_size: 512,
                num_blocks: self.num_blocks,
            },
            write_protected: false,
        })
    }

    fn read_blocks(&mut self, lba: LbaId, data: &mut [u8]) -> Result<(), ErrorKind> {
        let start = lba.0 as usize * 512;
        data.copy_from_slice(&self.data[start..start + data.len()]);
        Ok(())
    }

    fn write_blocks(&mut self, lba: LbaId, data: &[u8]) -> Result<(), ErrorKind> {
        let start = lba.0 as usize * 512;
        self.data[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }
}

/// Host issuing pseudo random READ10/WRITE10 requests.
struct HostSim {
    seed: u32,
    num_units: usize,
    step: u64,
    tick_every: u64,
    refresh: &'static RefreshSignal,
    scratch: Vec<u8>,
}

impl HostSim {
    fn next(&mut self) -> u32 {
        self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.seed >> 8
    }
}

impl<'a, const N: usize> Transport<'a, MemCard, N> for HostSim {
    fn attach(&mut self, num_units: usize) {
        info!("Host sees {} units", num_units);
        self.num_units = num_units;
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn service(
        &mut self,
        units: &mut Registry<'a, MemCard, N>,
        observer: &mut dyn TransferObserver,
    ) {
        self.step += 1;
        if self.step % self.tick_every == 0 {
            self.refresh.raise();
        }
        if self.num_units == 0 {
            return;
        }

        let index = self.next() as usize % self.num_units;
        let is_write = self.next() % 2 == 0;
        let unit = match units.get_mut(index) {
            Some(unit) => unit,
            None => return,
        };
        let geometry = unit.geometry();
        let count = 1 + self.next() % 64;
        let count = core::cmp::min(count, geometry.num_blocks);
        let lba = self.next() % (geometry.num_blocks - count + 1);
        let len = count as usize * geometry.block_size;
        self.scratch.resize(len, 0);

        let res = if is_write {
            self.scratch.fill((self.step & 0xFF) as u8);
            unit.write(LbaId(lba), count, &self.scratch)
                .map(|()| Direction::HostToDevice)
        } else {
            unit.read(LbaId(lba), count, &mut self.scratch)
                .map(|()| Direction::DeviceToHost)
        };
        match res {
            Ok(direction) => observer.on_transfer(direction, len as u32),
            Err(e) => warn!("unit {} transfer failed: {:?}", index, e),
        }
    }
}

#[derive(StructOpt)]
struct Opt {
    /// Presence of each card slot, e.g. `--cards 1 0`.
    #[structopt(long, default_value = "1")]
    cards: Vec<u8>,

    /// Number of service loop passes.
    #[structopt(long, default_value = "2000")]
    steps: u64,

    /// Raise the refresh tick every this many passes.
    #[structopt(long, default_value = "50")]
    tick_every: u64,

    #[structopt(long, default_value = "50000")]
    flush_threshold: u64,

    /// RAM disk size in MiB.
    #[structopt(long, default_value = "8")]
    ramdisk_mib: usize,

    #[structopt(long, default_value = "info")]
    log_level: LevelFilter,
}

fn main() {
    let opt = Opt::from_args();
    env_logger::builder()
        .format_timestamp_nanos()
        .filter_level(opt.log_level)
        .init();

    let config = Config {
        flush_threshold: opt.flush_threshold,
        ..Config::new()
    };

    let memory: &'static mut [u8] =
        Box::leak(vec![0u8; opt.ramdisk_mib * 1024 * 1024].into_boxed_slice());
    let disk = match RamDisk::new(memory, config.block_size) {
        Ok(disk) => disk,
        Err(e) => {
            eprintln!("ram disk setup failed: {:?}", e);
            std::process::exit(1);
        }
    };

    let drivers: [&'static mut MemCard; MAX_CARD_SLOTS] = core::array::from_fn(|i| {
        let present = opt.cards.get(i).map(|p| *p != 0).unwrap_or(false);
        Box::leak(Box::new(MemCard::new(0xC0DE_0000 + i as u32, 32 * 1024, present)))
    });
    let buffers: [&'static mut [u8]; MAX_UNITS] = core::array::from_fn(|_| {
        Box::leak(Box::new(IoBuffer::<IO_BUFFER_SIZE>::new())).as_mut_slice()
    });
    let mut pool = BufferPool::new(buffers);
    let mut registry: Registry<MemCard, MAX_UNITS> = Registry::new();

    let mut enumerator = Enumerator::new(disk, drivers, config);
    enumerator.run(&mut registry, &mut pool);

    let refresh: &'static RefreshSignal = Box::leak(Box::new(RefreshSignal::new()));
    let host = HostSim {
        seed: 0x1234_5678,
        num_units: 0,
        step: 0,
        tick_every: opt.tick_every.max(1),
        refresh,
        scratch: vec![],
    };
    let mut service = ServiceLoop::new(registry, host, refresh, &config);

    let mut commits = 0;
    let mut idles = 0;
    for _ in 0..opt.steps {
        match service.step() {
            Some(FlushDecision::Commit { .. }) => commits += 1,
            Some(FlushDecision::Idle { .. }) => idles += 1,
            None => {}
        }
    }

    for (index, unit) in service.registry().iter() {
        let stats = unit.stats();
        info!(
            "unit {}: {:?} {} blocks, read {} written {} failures {}",
            index,
            unit.kind(),
            unit.geometry().num_blocks,
            stats.bytes_read,
            stats.bytes_written,
            stats.failures
        );
    }
    info!("refresh ticks: {} committed, {} idle", commits, idles);
}
