#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Listing page `page` was fetched and extracted into `yielded` records.
    PageExtracted { page: u32, yielded: usize },
    /// Listing page `page` could not be fetched (retries exhausted or fatal).
    ListingFailed { page: u32, reason: String },
    /// External cancellation observed at the top of an iteration.
    Cancelled,
}
