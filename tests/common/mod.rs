#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use forum_sentiment::analysis::{
    AnalysisError, DocumentSentiment, SentimentAnalyzer, SentimentBackend,
};
use forum_sentiment::chunkers::TextChunker;
use forum_sentiment::messaging::{BatchLimits, EventBatch, RetryPolicy, SinkError, StreamSink};
use forum_sentiment::pipeline::{IngestPipeline, PostEnricher, RunSettings};
use forum_sentiment::source::{PostSource, SourceError, TimeFilter};
use forum_sentiment::types::RawPost;

/// Build a post in `forum` with the given self-text and comment bodies.
pub fn post(id: &str, forum: &str, selftext: &str, comments: &[&str]) -> RawPost {
    RawPost {
        id: id.to_string(),
        title: format!("title of {id}"),
        score: 42,
        num_comments: comments.len() as i64,
        author: "someone".to_string(),
        forum: forum.to_string(),
        forum_id: format!("t5_{forum}"),
        created_utc: 1_700_000_000.0,
        selftext: selftext.to_string(),
        comments: comments.iter().map(|c| c.to_string()).collect(),
    }
}

/// Post source answering from a fixed table of (forum, term) results.
///
/// Unknown pairs return no posts. Pairs in `failing` return a status error.
/// Pairs in `hanging` never complete.
#[derive(Default)]
pub struct FakeSource {
    results: HashMap<(String, String), Vec<RawPost>>,
    failing: HashSet<(String, String)>,
    hanging: HashSet<(String, String)>,
    pub calls: Mutex<Vec<(String, String, TimeFilter, usize)>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(mut self, forum: &str, term: &str, posts: Vec<RawPost>) -> Self {
        self.results
            .insert((forum.to_string(), term.to_string()), posts);
        self
    }

    pub fn failing(mut self, forum: &str, term: &str) -> Self {
        self.failing.insert((forum.to_string(), term.to_string()));
        self
    }

    pub fn hanging(mut self, forum: &str, term: &str) -> Self {
        self.hanging.insert((forum.to_string(), term.to_string()));
        self
    }

    /// (forum, term) pairs searched so far, in call order.
    pub fn searched(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(forum, term, _, _)| (forum.clone(), term.clone()))
            .collect()
    }
}

#[async_trait]
impl PostSource for FakeSource {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn search(
        &self,
        forum: &str,
        term: &str,
        time_filter: TimeFilter,
        limit: usize,
    ) -> Result<Vec<RawPost>, SourceError> {
        self.calls.lock().unwrap().push((
            forum.to_string(),
            term.to_string(),
            time_filter,
            limit,
        ));

        let key = (forum.to_string(), term.to_string());
        if self.hanging.contains(&key) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&key) {
            return Err(SourceError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        let mut posts = self.results.get(&key).cloned().unwrap_or_default();
        posts.truncate(limit);
        Ok(posts)
    }
}

/// Sentiment backend that scores text by keyword and records every call.
///
/// Text containing "FAIL" is rejected. Otherwise the score is 0.9 for text
/// containing "great", 0.1 for "awful" and 0.7 for anything else.
#[derive(Default)]
pub struct FakeBackend {
    pub calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SentimentBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn analyze(
        &self,
        text: &str,
        _mine_opinions: bool,
    ) -> Result<DocumentSentiment, AnalysisError> {
        self.calls.lock().unwrap().push(text.to_string());

        if text.contains("FAIL") {
            return Err(AnalysisError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        let positive_confidence = if text.contains("great") {
            0.9
        } else if text.contains("awful") {
            0.1
        } else {
            0.7
        };
        Ok(DocumentSentiment {
            positive_confidence,
            sentences: Vec::new(),
        })
    }
}

/// Stream sink that keeps every delivered batch and can fail the first sends.
pub struct FakeSink {
    limits: BatchLimits,
    failures_left: AtomicUsize,
    pub send_calls: AtomicUsize,
    pub delivered: Mutex<Vec<Vec<String>>>,
}

impl FakeSink {
    pub fn new(limits: BatchLimits) -> Self {
        Self {
            limits,
            failures_left: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Reject the next `failures` sends.
    pub fn failing_first(self, failures: usize) -> Self {
        self.failures_left.store(failures, Ordering::SeqCst);
        self
    }

    /// Every delivered payload, parsed back into JSON, in delivery order.
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|payload| serde_json::from_str(payload).unwrap())
            .collect()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.delivered.lock().unwrap().iter().map(Vec::len).collect()
    }
}

impl Default for FakeSink {
    fn default() -> Self {
        Self::new(BatchLimits::default())
    }
}

#[async_trait]
impl StreamSink for FakeSink {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn limits(&self) -> BatchLimits {
        self.limits
    }

    async fn send(&self, batch: &EventBatch) -> Result<(), SinkError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(SinkError::Unavailable("injected failure".to_string()));
        }

        self.delivered
            .lock()
            .unwrap()
            .push(batch.payloads().to_vec());
        Ok(())
    }
}

/// Settings with fast retries and no run timeout.
pub fn fast_settings() -> RunSettings {
    RunSettings {
        post_limit: 20,
        time_filter: TimeFilter::Day,
        run_timeout: None,
        retry: RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
    }
}

/// Wire the fakes into a pipeline.
pub fn pipeline(
    source: Arc<FakeSource>,
    backend: Arc<FakeBackend>,
    sink: Arc<FakeSink>,
    chunk_size: usize,
    settings: RunSettings,
) -> IngestPipeline {
    let analyzer = SentimentAnalyzer::new(backend, TextChunker::new(chunk_size).unwrap());
    IngestPipeline::new(source, PostEnricher::new(analyzer), sink, settings)
}
