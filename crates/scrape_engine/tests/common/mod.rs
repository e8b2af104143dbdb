#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use scrape_engine::{
    EngineEvent, FixedJitter, PacingSettings, ProgressSink, RecordingSleeper, ResilientTransport,
    RetryPolicy, TransportSettings,
};
use tokio_util::sync::CancellationToken;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

#[derive(Default)]
pub struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl TestSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Transport with no pacing and a recording sleeper, so retries finish instantly.
pub fn instant_transport(
    retry: RetryPolicy,
    cancel: CancellationToken,
) -> (ResilientTransport, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::new());
    let transport = ResilientTransport::builder(TransportSettings::default())
        .pacing(PacingSettings::none())
        .retry(retry)
        .jitter(Arc::new(FixedJitter::default()))
        .sleeper(sleeper.clone())
        .cancel(cancel)
        .build()
        .expect("transport builds");
    (transport, sleeper)
}

/// Listing page in the primary markup variant with `count` entries numbered from `first`.
pub fn listing_page(first: usize, count: usize) -> String {
    let items: String = (first..first + count)
        .map(|n| {
            format!(
                r#"<div class="article-item-box csdn-tracking-statistics" data-articleid="{n}">
  <h4 class=""><a href="/tester/article/details/{n}" target="_blank">Article {n}</a></h4>
  <p class="content">Summary of article {n}</p>
  <div class="info-box">
    <span class="date">2024-03-{day:02} 09:30:00</span>
    <span class="read-num">阅读 {reads}</span>
    <span class="praise">点赞 {likes}</span>
    <span class="comment-num">评论 {comments}</span>
  </div>
</div>
"#,
                day = n % 28 + 1,
                reads = n * 10 + 1,
                likes = n + 2,
                comments = n % 3,
            )
        })
        .collect();
    format!(
        "<html><head><title>Blog</title></head><body><div class=\"article-list\">{items}</div></body></html>"
    )
}

pub fn detail_page(n: usize, paragraphs: usize) -> String {
    let body: String = (0..paragraphs)
        .map(|p| format!("<p>Paragraph {p} of article {n}.</p>"))
        .collect();
    format!(
        r#"<html><body><div class="blog-content-box"><h1>Article {n}</h1>
<div id="content_views" class="markdown_views">{body}<script>track();</script></div></div></body></html>"#
    )
}
