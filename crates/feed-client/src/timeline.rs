//! # Timeline synchronization
//!
//! Keeps a newest-first, duplicate-free list of approved posts. Backfill
//! walks towards older posts with `cursor`; polling walks towards newer ones
//! with `since`. The two directions never share a request.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use domains::{Page, PageCursor, PostId, PostView, TimelineCursor, DEFAULT_PAGE_LIMIT};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::api::FeedApi;
use crate::error::ClientError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Upper bound on consecutive incremental fetches within one poll.
const MAX_DRAIN_ROUNDS: usize = 20;

/// The locally held window of the timeline.
#[derive(Debug, Clone, Default)]
pub struct TimelineState {
    posts: Vec<PostView>,
    seen: HashSet<PostId>,
    next_cursor: Option<PageCursor>,
    has_next_page: bool,
}

impl TimelineState {
    pub fn posts(&self) -> &[PostView] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Creation time of the newest post held.
    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.posts.first().map(|view| view.post.created_at)
    }

    pub fn cursor(&self) -> TimelineCursor {
        TimelineCursor {
            next_cursor: self.next_cursor.map(|cursor| cursor.created_at),
            since_marker: self.newest(),
            has_next_page: self.has_next_page,
        }
    }

    /// Replaces everything with a freshly fetched first page.
    pub fn reset(&mut self, page: Page) {
        self.posts.clear();
        self.seen.clear();
        self.next_cursor = page.pagination.next_page_cursor();
        self.has_next_page = page.pagination.has_next_page;
        for view in page.posts {
            if self.seen.insert(view.post.id) {
                self.posts.push(view);
            }
        }
    }

    /// Prepends the posts not already held, keeping their relative order.
    /// Already held posts never move. Returns how many were added.
    pub fn merge_newer(&mut self, incoming: Vec<PostView>) -> usize {
        let unseen: Vec<PostView> = incoming
            .into_iter()
            .filter(|view| self.seen.insert(view.post.id))
            .collect();
        let added = unseen.len();
        if added > 0 {
            self.posts.splice(0..0, unseen);
        }
        added
    }

    /// Appends an older backfill page and advances the cursor.
    pub fn append_older(&mut self, page: Page) -> usize {
        self.next_cursor = page.pagination.next_page_cursor();
        self.has_next_page = page.pagination.has_next_page;
        let before = self.posts.len();
        for view in page.posts {
            if self.seen.insert(view.post.id) {
                self.posts.push(view);
            }
        }
        self.posts.len() - before
    }
}

struct Shared {
    api: Arc<dyn FeedApi>,
    state: Mutex<TimelineState>,
    page_limit: u32,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, TimelineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn refresh(&self) -> Result<usize, ClientError> {
        let page = self.api.fetch_page(self.page_limit, None).await?;
        let mut state = self.state();
        state.reset(page);
        Ok(state.len())
    }

    /// Fetches newer posts until the server reports a partial page.
    async fn pull_newer(&self) -> Result<usize, ClientError> {
        let newest = self.state().newest();
        let Some(mut marker) = newest else {
            return self.refresh().await;
        };

        let mut added = 0;
        for _ in 0..MAX_DRAIN_ROUNDS {
            let page = self.api.fetch_since(Some(marker), self.page_limit).await?;
            let more = page.pagination.has_next_page;
            let mut state = self.state();
            added += state.merge_newer(page.posts);
            match state.newest() {
                Some(newest) if more && newest > marker => marker = newest,
                _ => break,
            }
        }
        Ok(added)
    }
}

/// Owns the timeline window and at most one background polling task.
pub struct TimelineSync {
    shared: Arc<Shared>,
    interval: Duration,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl TimelineSync {
    pub fn new(api: Arc<dyn FeedApi>) -> Self {
        Self::with_options(api, DEFAULT_PAGE_LIMIT, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_options(api: Arc<dyn FeedApi>, page_limit: u32, interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                api,
                state: Mutex::new(TimelineState::default()),
                page_limit,
            }),
            interval,
            poller: Mutex::new(None),
        }
    }

    /// Snapshot of the held posts, newest first.
    pub fn posts(&self) -> Vec<PostView> {
        self.shared.state().posts().to_vec()
    }

    pub fn cursor(&self) -> TimelineCursor {
        self.shared.state().cursor()
    }

    /// Loads the first page, discarding what was held. Errors are returned so
    /// the caller can offer a retry.
    pub async fn refresh(&self) -> Result<usize, ClientError> {
        self.shared.refresh().await
    }

    /// Loads the next older page. Returns `Ok(0)` once the timeline is
    /// exhausted.
    pub async fn load_more(&self) -> Result<usize, ClientError> {
        let cursor = {
            let state = self.shared.state();
            match (state.has_next_page, state.next_cursor) {
                (true, Some(cursor)) => cursor,
                _ => return Ok(0),
            }
        };
        let page = self.shared.api.fetch_page(self.shared.page_limit, Some(cursor)).await?;
        Ok(self.shared.state().append_older(page))
    }

    /// One incremental fetch, as the poller does it. Failures are logged and
    /// reported as nothing new.
    pub async fn poll_once(&self) -> usize {
        poll(&self.shared).await
    }

    /// Starts background polling. Returns `false` if it was already running.
    pub fn start_polling(&self) -> bool {
        let mut poller = self.poller.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if poller.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let shared = Arc::clone(&self.shared);
        let period = self.interval;
        *poller = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                poll(&shared).await;
            }
        }));
        debug!(interval_secs = period.as_secs(), "timeline polling started");
        true
    }

    /// Stops background polling. Returns `false` if it was not running.
    pub fn stop_polling(&self) -> bool {
        let handle = self
            .poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match handle {
            Some(handle) => {
                handle.abort();
                debug!("timeline polling stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for TimelineSync {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

async fn poll(shared: &Shared) -> usize {
    match shared.pull_newer().await {
        Ok(added) => {
            if added > 0 {
                debug!(added, "new posts merged");
            }
            added
        }
        Err(err) => {
            warn!(error = %err, "background timeline poll failed");
            0
        }
    }
}
