//! Reading progress and per-document settings.
//!
//! Progress follows page changes, it never drives them: the tracker listens
//! to the controller's page changes and writes `{page}` after a quiet period.
//! The saved page is applied once per load, as soon as pagination is ready.

use crate::config::{Appearance, ReaderConfig, ReadingProgress};
use crate::error::Result;
use crate::host::{DocumentId, KeyValueStore, ThreadPointerSink};
use crate::navigation::make_block_cfi;
use crate::schedule::{Debounced, Millis};

/// Storage key of the saved page.
pub fn progress_key(document: DocumentId) -> String {
    format!("reader-progress-{document}")
}

/// Storage key of the typography settings.
pub fn appearance_key(document: DocumentId) -> String {
    format!("reader-appearance-{document}")
}

/// Stored appearance, or the defaults when missing or unreadable.
pub fn load_appearance<S: KeyValueStore + ?Sized>(store: &S, document: DocumentId) -> Appearance {
    let key = appearance_key(document);
    match store.get(&key) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("ignoring malformed {key}: {e}");
            Appearance::default()
        }),
        Ok(None) => Appearance::default(),
        Err(e) => {
            log::warn!("failed to read {key}: {e}");
            Appearance::default()
        }
    }
}

pub fn save_appearance<S: KeyValueStore + ?Sized>(
    store: &mut S,
    document: DocumentId,
    appearance: &Appearance,
) -> Result<()> {
    let json = serde_json::to_string(appearance)?;
    store.set(&appearance_key(document), &json)
}

/// Stored reading position, if any. Malformed records count as absent.
pub fn load_progress<S: KeyValueStore + ?Sized>(store: &S, document: DocumentId) -> Option<ReadingProgress> {
    let key = progress_key(document);
    let raw = match store.get(&key) {
        Ok(raw) => raw?,
        Err(e) => {
            log::warn!("failed to read {key}: {e}");
            return None;
        }
    };
    serde_json::from_str(&raw)
        .inspect_err(|e| log::warn!("ignoring malformed {key}: {e}"))
        .ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Restore {
    /// Waiting for pagination; `None` when nothing was saved.
    Pending(Option<usize>),
    Done,
}

/// Saves the current page and the conversation-thread pointer.
#[derive(Debug)]
pub struct ProgressTracker {
    document: Option<DocumentId>,
    restore: Restore,
    save: Debounced<usize>,
    thread: Option<i64>,
    thread_save: Debounced<()>,
}

impl ProgressTracker {
    pub fn new(config: &ReaderConfig) -> Self {
        Self {
            document: None,
            restore: Restore::Done,
            save: Debounced::new(config.progress_delay),
            thread: None,
            thread_save: Debounced::new(config.thread_pointer_delay),
        }
    }

    /// Start tracking `document`, reading its saved page for a later restore.
    pub fn begin<S: KeyValueStore + ?Sized>(&mut self, store: &S, document: DocumentId) {
        self.reset();
        self.document = Some(document);
        let page = load_progress(store, document).map(|p| p.page).filter(|&p| p > 0);
        self.restore = Restore::Pending(page);
    }

    /// Stop tracking and drop pending saves.
    pub fn reset(&mut self) {
        self.document = None;
        self.restore = Restore::Done;
        self.save.cancel();
        self.thread_save.cancel();
    }

    pub fn is_restored(&self) -> bool {
        self.restore == Restore::Done
    }

    /// The page to restore, handed out once, after pagination reports pages.
    pub fn take_restore(&mut self, total_pages: usize) -> Option<usize> {
        let Restore::Pending(page) = self.restore else {
            return None;
        };
        if total_pages == 0 {
            return None;
        }
        self.restore = Restore::Done;
        page
    }

    /// Attach or detach the conversation thread whose pointer follows the
    /// reader.
    pub fn attach_thread(&mut self, thread: Option<i64>) {
        self.thread = thread;
        if thread.is_none() {
            self.thread_save.cancel();
        }
    }

    pub fn thread(&self) -> Option<i64> {
        self.thread
    }

    /// React to a page change.
    pub fn on_page_change(&mut self, page: usize, now: Millis) {
        if self.document.is_none() {
            return;
        }
        self.save.schedule(page, now);
        if self.thread.is_some() {
            self.thread_save.schedule((), now);
        }
    }

    /// Run saves whose quiet period has elapsed. `first_visible_block` is
    /// consulted only when the thread pointer is due. Failures are logged.
    pub fn tick<S, F>(&mut self, store: &mut S, now: Millis, first_visible_block: F)
    where
        S: KeyValueStore + ThreadPointerSink + ?Sized,
        F: FnOnce() -> Option<usize>,
    {
        let Some(document) = self.document else {
            return;
        };
        if let Some(page) = self.save.take_ready(now) {
            let json = serde_json::to_string(&ReadingProgress { page });
            let written = json
                .map_err(Into::into)
                .and_then(|json| store.set(&progress_key(document), &json));
            match written {
                Ok(()) => log::debug!("saved page {page} of document {document}"),
                Err(e) => log::warn!("failed to save reading progress: {e}"),
            }
        }
        if self.thread_save.take_ready(now).is_some()
            && let Some(thread) = self.thread
            && let Some(block) = first_visible_block()
        {
            let cfi = make_block_cfi(block);
            if let Err(e) = store.set_thread_last_cfi(thread, &cfi) {
                log::warn!("failed to save thread {thread} position: {e}");
            }
        }
    }
}
