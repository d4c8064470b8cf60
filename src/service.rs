use log::{info, trace, warn};

use crate::card::CardDriver;
use crate::flush::{FlushDecision, FlushPolicy, RefreshSignal};
use crate::registry::Registry;
use crate::transport::Transport;
use crate::Config;

/// Steady state driver: services the transport and applies the idle flush.
pub struct ServiceLoop<'a, D: CardDriver, T: Transport<'a, D, N>, const N: usize> {
    registry: Registry<'a, D, N>,
    transport: T,
    policy: FlushPolicy,
    refresh: &'a RefreshSignal,
}

impl<'a, D: CardDriver, T: Transport<'a, D, N>, const N: usize> ServiceLoop<'a, D, T, N> {
    /// Hand the enumerated units to `transport`. The unit count is announced
    /// here and never again.
    pub fn new(
        registry: Registry<'a, D, N>,
        mut transport: T,
        refresh: &'a RefreshSignal,
        config: &Config,
    ) -> Self {
        info!("Attaching transport with {} units", registry.len());
        transport.attach(registry.len());
        ServiceLoop {
            registry,
            transport,
            policy: FlushPolicy::new(config.flush_threshold),
            refresh,
        }
    }

    pub fn registry(&self) -> &Registry<'a, D, N> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry<'a, D, N> {
        &mut self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn policy(&self) -> &FlushPolicy {
        &self.policy
    }

    /// One pass of the loop body.
    ///
    /// Returns the flush decision when a refresh tick was consumed.
    pub fn step(&mut self) -> Option<FlushDecision> {
        if !self.transport.is_configured() {
            return None;
        }
        self.transport.service(&mut self.registry, &mut self.policy);

        if !self.refresh.take() {
            return None;
        }
        let decision = self.policy.consume();
        if let FlushDecision::Commit { written } = decision {
            self.commit(written);
        }
        Some(decision)
    }

    /// Service forever.
    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }

    fn commit(&mut self, written: u64) {
        match self.registry.fixed_unit_mut() {
            Some(unit) => match unit.flush() {
                Ok(()) => trace!("committed fixed medium after {} bytes", written),
                Err(e) => warn!("fixed medium commit failed: {:?}", e),
            },
            None => warn!("no fixed medium to commit"),
        }
    }
}
