use crate::AcquisitionStatus;

/// Position of the pagination loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    page_number: u32,
    pages_fetched: u32,
    consecutive_low_yield: u32,
}

impl PageCursor {
    pub fn new() -> Self {
        Self {
            page_number: 1,
            pages_fetched: 0,
            consecutive_low_yield: 0,
        }
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn consecutive_low_yield(&self) -> u32 {
        self.consecutive_low_yield
    }

    pub(crate) fn record_page(&mut self, low_yield: bool) {
        self.pages_fetched += 1;
        if low_yield {
            self.consecutive_low_yield += 1;
        } else {
            self.consecutive_low_yield = 0;
        }
    }

    pub(crate) fn advance(&mut self) {
        self.page_number += 1;
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Fetching { page: u32 },
    Done(AcquisitionStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    cursor: PageCursor,
    phase: Phase,
    records_seen: usize,
}

impl PaginationState {
    pub fn new() -> Self {
        Self {
            cursor: PageCursor::new(),
            phase: Phase::Fetching { page: 1 },
            records_seen: 0,
        }
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn records_seen(&self) -> usize {
        self.records_seen
    }

    pub fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Done(_))
    }

    pub fn status(&self) -> Option<&AcquisitionStatus> {
        match &self.phase {
            Phase::Done(status) => Some(status),
            Phase::Fetching { .. } => None,
        }
    }

    pub(crate) fn cursor_mut(&mut self) -> &mut PageCursor {
        &mut self.cursor
    }

    pub(crate) fn add_records(&mut self, count: usize) {
        self.records_seen += count;
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }
}

impl Default for PaginationState {
    fn default() -> Self {
        Self::new()
    }
}
