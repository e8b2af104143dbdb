use std::fmt;

use serde::{Deserialize, Serialize};

/// Final outcome of an acquisition run, reported next to the records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionStatus {
    Complete(CompletionReason),
    Partial(PartialReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionReason {
    /// A listing page yielded no records.
    NaturalEnd,
    /// The configured page ceiling was reached.
    PageLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartialReason {
    ListingFetchFailed { page: u32, reason: String },
    LowYield { page: u32 },
    Cancelled { page: u32 },
}

impl AcquisitionStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, AcquisitionStatus::Complete(_))
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, AcquisitionStatus::Partial(_))
    }
}

impl fmt::Display for AcquisitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionStatus::Complete(CompletionReason::NaturalEnd) => {
                write!(f, "complete, natural end")
            }
            AcquisitionStatus::Complete(CompletionReason::PageLimit) => {
                write!(f, "complete, page limit reached")
            }
            AcquisitionStatus::Partial(PartialReason::ListingFetchFailed { page, reason }) => {
                write!(f, "partial: listing fetch failed at page {page} ({reason})")
            }
            AcquisitionStatus::Partial(PartialReason::LowYield { page }) => {
                write!(
                    f,
                    "partial: stopped at page {page} after repeated low-yield pages"
                )
            }
            AcquisitionStatus::Partial(PartialReason::Cancelled { page }) => {
                write!(f, "partial: cancelled at page {page}")
            }
        }
    }
}
