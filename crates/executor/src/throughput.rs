//! Throughput accounting
//!
//! Every [`Operation`](crate::Operation) owns a [`Throughput`] accumulator.
//! Handlers charge it through an [`Accountant`], which converts record sizes
//! into units with the registry's [`CostModel`]. Counters only ever grow while
//! a handler runs; if the handler fails, the executor puts them back to where
//! they were before dispatch.

use partis_core::{CostModel, MIN_READ_UNITS};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Read and write units consumed by one operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Throughput {
    read_units: u32,
    write_units: u32,
}

impl Throughput {
    /// Counters with explicit values
    pub fn new(read_units: u32, write_units: u32) -> Self {
        Throughput {
            read_units,
            write_units,
        }
    }

    /// Read units consumed
    #[inline]
    pub fn read_units(&self) -> u32 {
        self.read_units
    }

    /// Write units consumed
    #[inline]
    pub fn write_units(&self) -> u32 {
        self.write_units
    }

    /// True when nothing has been charged
    pub fn is_zero(&self) -> bool {
        self.read_units == 0 && self.write_units == 0
    }

    /// Add read units (saturating)
    pub fn add_read(&mut self, units: u32) {
        self.read_units = self.read_units.saturating_add(units);
    }

    /// Add write units (saturating)
    pub fn add_write(&mut self, units: u32) {
        self.write_units = self.write_units.saturating_add(units);
    }

    pub(crate) fn restore(&mut self, snapshot: Throughput) {
        *self = snapshot;
    }
}

/// Charges an operation's throughput according to a cost model
pub struct Accountant<'a> {
    model: &'a CostModel,
    throughput: &'a mut Throughput,
    reads_charged: u32,
}

impl<'a> Accountant<'a> {
    /// Charge `throughput` using `model`
    pub fn new(model: &'a CostModel, throughput: &'a mut Throughput) -> Self {
        Accountant {
            model,
            throughput,
            reads_charged: 0,
        }
    }

    /// Charge for reading a record of `size` bytes
    pub fn read_record(&mut self, size: u64) {
        self.read_units(self.model.read_units(size));
    }

    /// Charge the minimum read
    pub fn min_read(&mut self) {
        self.read_units(MIN_READ_UNITS);
    }

    /// Charge an explicit number of read units
    pub fn read_units(&mut self, units: u32) {
        trace!(units, "charge read");
        self.reads_charged = self.reads_charged.saturating_add(units);
        self.throughput.add_read(units);
    }

    /// Charge for writing (or removing) a record of `size` bytes
    pub fn write_record(&mut self, size: u64) {
        let units = self.model.write_units(size);
        trace!(units, "charge write");
        self.throughput.add_write(units);
    }

    /// Charge the minimum read unless something was already read through this
    /// accountant
    pub fn ensure_min_read(&mut self) {
        if self.reads_charged == 0 {
            self.min_read();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput_saturates() {
        let mut t = Throughput::new(u32::MAX - 1, 0);
        t.add_read(5);
        assert_eq!(t.read_units(), u32::MAX);
    }

    #[test]
    fn test_accountant_charges_by_size() {
        let model = CostModel::default();
        let mut t = Throughput::default();
        {
            let mut acct = Accountant::new(&model, &mut t);
            acct.read_record(2048);
            acct.write_record(1);
            acct.ensure_min_read();
        }
        assert_eq!(t, Throughput::new(2, 1));
    }

    #[test]
    fn test_ensure_min_read_only_when_nothing_read() {
        let model = CostModel::default();
        let mut t = Throughput::default();
        Accountant::new(&model, &mut t).ensure_min_read();
        assert_eq!(t.read_units(), 1);
        assert_eq!(t.write_units(), 0);
    }

    #[test]
    fn test_restore() {
        let mut t = Throughput::new(3, 4);
        let snapshot = t;
        t.add_write(10);
        t.restore(snapshot);
        assert_eq!(t, Throughput::new(3, 4));
        assert!(!t.is_zero());
        assert!(Throughput::default().is_zero());
    }
}
