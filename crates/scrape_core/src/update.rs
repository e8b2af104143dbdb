use crate::{
    AcquisitionStatus, CompletionReason, Effect, Msg, PaginationPolicy, PaginationState,
    PartialReason, Phase,
};

/// Initial state plus the first effect of a run.
pub fn start(policy: &PaginationPolicy) -> (PaginationState, Vec<Effect>) {
    let mut state = PaginationState::new();
    if policy.max_pages == Some(0) {
        let status = AcquisitionStatus::Complete(CompletionReason::PageLimit);
        state.set_phase(Phase::Done(status.clone()));
        return (state, vec![Effect::Finish(status)]);
    }
    let page = state.cursor().page_number();
    (state, vec![Effect::FetchPage { page }])
}

/// Pure update function: applies a message to state and returns any effects.
///
/// Once the state is `Done` every message is ignored, so a finished run can
/// never request another page.
pub fn update(
    mut state: PaginationState,
    policy: &PaginationPolicy,
    msg: Msg,
) -> (PaginationState, Vec<Effect>) {
    let current = match state.phase() {
        Phase::Fetching { page } => *page,
        Phase::Done(_) => return (state, Vec::new()),
    };

    let status = match msg {
        Msg::PageExtracted { page, yielded } => {
            if page != current {
                return (state, Vec::new());
            }
            decide(&mut state, policy, page, yielded)
        }
        Msg::ListingFailed { page, reason } => {
            if page != current {
                return (state, Vec::new());
            }
            Some(AcquisitionStatus::Partial(
                PartialReason::ListingFetchFailed { page, reason },
            ))
        }
        Msg::Cancelled => Some(AcquisitionStatus::Partial(PartialReason::Cancelled {
            page: current,
        })),
    };

    match status {
        Some(status) => {
            state.set_phase(Phase::Done(status.clone()));
            (state, vec![Effect::Finish(status)])
        }
        None => {
            state.cursor_mut().advance();
            let page = state.cursor().page_number();
            state.set_phase(Phase::Fetching { page });
            (state, vec![Effect::FetchPage { page }])
        }
    }
}

// Termination checks in priority order: empty page, low-yield streak, ceiling.
fn decide(
    state: &mut PaginationState,
    policy: &PaginationPolicy,
    page: u32,
    yielded: usize,
) -> Option<AcquisitionStatus> {
    state.add_records(yielded);
    let low_yield = yielded < policy.low_yield_threshold;
    state.cursor_mut().record_page(low_yield);

    if yielded == 0 {
        return Some(AcquisitionStatus::Complete(CompletionReason::NaturalEnd));
    }
    if page > 1 && state.cursor().consecutive_low_yield() >= policy.streak_limit() {
        return Some(AcquisitionStatus::Partial(PartialReason::LowYield { page }));
    }
    if policy.page_limit_reached(page) {
        return Some(AcquisitionStatus::Complete(CompletionReason::PageLimit));
    }
    None
}
