use scrape_engine::{EngineEvent, FetchPurpose, ProgressSink};

/// Prints one line per notable engine event to stderr.
#[derive(Debug, Default)]
pub struct TerminalProgress;

impl ProgressSink for TerminalProgress {
    fn emit(&self, event: EngineEvent) {
        if let Some(line) = describe(&event) {
            eprintln!("{line}");
        }
    }
}

fn describe(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::Attempt { attempt: 1, .. } => None,
        EngineEvent::Attempt {
            purpose,
            attempt,
            max_attempts,
        } => Some(format!("  retrying {purpose} ({attempt}/{max_attempts})")),
        EngineEvent::Backoff {
            purpose,
            class,
            wait,
        } => Some(format!(
            "  {purpose}: {class}, waiting {:.1}s",
            wait.as_secs_f64()
        )),
        EngineEvent::PageExtracted { page, records } => {
            Some(format!("page {page}: {records} articles"))
        }
        EngineEvent::ListingStopped { status } => Some(format!("listing finished: {status}")),
        EngineEvent::DetailFetched {
            index,
            content_chars: Some(chars),
            ..
        } => Some(format!(
            "  {}: {chars} chars",
            FetchPurpose::Detail { index: *index }
        )),
        EngineEvent::DetailFetched {
            index,
            url,
            content_chars: None,
        } => Some(format!(
            "  {}: failed, keeping {url} without content",
            FetchPurpose::Detail { index: *index }
        )),
    }
}
