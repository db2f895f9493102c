// Scroll/fling end detection for on-screen account lists.
//
// Lists in the app never say "you reached the end". The only reliable
// signal is that scrolling stops changing what is visible, so we record
// the handles seen on every page and declare the end once the last page
// matches the previous `repeats_to_end - 1` pages exactly.
//
// Two skip counters escalate traversal when whole pages turn out to be
// already-known accounts: the fling counter is a one-shot signal that
// resets itself, the skip counter stays up until the caller resets it.

use tracing::debug;

pub const DEFAULT_REPEATS_TO_END: usize = 2;
pub const DEFAULT_SKIPPED_LIST_LIMIT: u32 = 7;
pub const DEFAULT_SKIPPED_FLING_LIMIT: u32 = 3;

#[derive(Debug, Clone)]
pub struct ScrollEndDetector {
    pages: Vec<Vec<String>>,
    pages_seen: usize,
    repeats_to_end: usize,
    skipped_list_limit: u32,
    skipped_fling_limit: u32,
    skipped_all: u32,
    skipped_all_fling: u32,
}

impl Default for ScrollEndDetector {
    fn default() -> Self {
        Self::new(
            DEFAULT_REPEATS_TO_END,
            DEFAULT_SKIPPED_LIST_LIMIT,
            DEFAULT_SKIPPED_FLING_LIMIT,
        )
    }
}

impl ScrollEndDetector {
    /// `repeats_to_end` below 2 is raised to 2: a single page can't repeat.
    pub fn new(repeats_to_end: usize, skipped_list_limit: u32, skipped_fling_limit: u32) -> Self {
        Self {
            pages: Vec::new(),
            pages_seen: 0,
            repeats_to_end: repeats_to_end.max(2),
            skipped_list_limit,
            skipped_fling_limit,
            skipped_all: 0,
            skipped_all_fling: 0,
        }
    }

    /// Start a new page. Call once per list refresh or scroll. Only the
    /// last `repeats_to_end` pages are kept.
    pub fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.pages_seen += 1;
        if self.pages.len() > self.repeats_to_end {
            let excess = self.pages.len() - self.repeats_to_end;
            self.pages.drain(..excess);
        }
    }

    /// Record a handle seen on the current page.
    pub fn observe(&mut self, handle: &str) {
        if self.pages.is_empty() {
            self.new_page();
        }
        if let Some(page) = self.pages.last_mut() {
            page.push(handle.to_string());
        }
    }

    /// Pages started since the detector was created.
    pub fn page_count(&self) -> usize {
        self.pages_seen
    }

    /// True when the last page equals each of the `repeats_to_end - 1`
    /// pages before it, in the same order.
    pub fn is_end(&self) -> bool {
        if self.pages.len() < 2 || self.pages.len() < self.repeats_to_end {
            return false;
        }

        let last = &self.pages[self.pages.len() - 1];
        let is_end = self.pages[..self.pages.len() - 1]
            .iter()
            .rev()
            .take(self.repeats_to_end - 1)
            .all(|page| page == last);

        if is_end {
            debug!(pages = self.pages_seen, "Same accounts seen repeatedly, end of list");
        }
        is_end
    }

    /// A whole page was skipped (already interacted, blacklisted, ...).
    pub fn notify_all_skipped(&mut self) {
        self.skipped_all += 1;
        self.skipped_all_fling += 1;
        debug!(
            skipped = self.skipped_all,
            fling = self.skipped_all_fling,
            "Every account on this page was skipped"
        );
    }

    pub fn skipped_all(&self) -> u32 {
        self.skipped_all
    }

    /// Whether too many fully-skipped pages were seen. Stays true until
    /// [`reset_skipped_all`](Self::reset_skipped_all).
    pub fn skip_limit_reached(&self) -> bool {
        self.skipped_all >= self.skipped_list_limit
    }

    /// Whether to switch from scrolling to flinging. Resets its own counter
    /// when it fires.
    pub fn fling_limit_reached(&mut self) -> bool {
        if self.skipped_all_fling >= self.skipped_fling_limit {
            self.skipped_all_fling = 0;
            return true;
        }
        false
    }

    pub fn reset_skipped_all(&mut self) {
        self.skipped_all = 0;
    }
}
