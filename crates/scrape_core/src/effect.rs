use crate::AcquisitionStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Request listing page `page` next.
    FetchPage { page: u32 },
    /// Pagination is over; no further listing requests may be issued.
    Finish(AcquisitionStatus),
}
