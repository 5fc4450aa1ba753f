use derive_more::Display;

/// Half-open `[start, end)` span of absolute stream addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[display("[{start:#x}, {end:#x})")]
pub struct AddressRange {
    start: u64,
    end: u64,
}

impl AddressRange {
    /// Creates a range. An `end` before `start` collapses to an empty range at `start`.
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, address: u64) -> bool {
        self.start <= address && address < self.end
    }
}
