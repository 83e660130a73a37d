use hftshm_layout::{LayoutError, RingLayout};

/// What a producer asks for when standing up a ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingParams {
    pub name: String,
    pub max_consumers: u8,
    /// 0 for variable-length events, otherwise a power of two.
    pub event_size: u16,
    /// Power of two.
    pub buffer_size: u32,
    /// 0 for regular pages.
    pub hugepage_size: u64,
}

impl RingParams {
    pub fn new(name: impl Into<String>, max_consumers: u8, event_size: u16, buffer_size: u32) -> Self {
        Self {
            name: name.into(),
            max_consumers,
            event_size,
            buffer_size,
            hugepage_size: 0,
        }
    }

    pub fn with_hugepages(mut self, hugepage_size: u64) -> Self {
        self.hugepage_size = hugepage_size;
        self
    }

    pub fn layout(&self) -> Result<RingLayout, LayoutError> {
        RingLayout::new(
            self.max_consumers,
            self.event_size,
            self.buffer_size,
            self.hugepage_size,
        )
    }
}
