//! In-order page scanning for the match stream.
//!
//! A scan walks the document from the first page to the last and reports each page that
//! contains the query once, no matter how many occurrences it holds. Scans can be
//! cancelled between pages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use docview_core::{SearchEpoch, SurfaceEvent};

/// Cooperative cancellation flag shared between the surface and a scan worker.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent; every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Per-page search over a loaded document.
pub trait PageText {
    fn page_count(&self) -> usize;

    /// First case-insensitive occurrence of `query` on `page`, spelled as on the page.
    fn find(&self, page: usize, query: &str) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub pages_scanned: usize,
    pub matches: usize,
    pub errors: usize,
    pub cancelled: bool,
}

/// Scans every page of `source` for `query`.
///
/// `sink` receives `SearchMatch` and `PageError` events and returns `false` to stop the
/// scan early, e.g. when nobody is listening anymore.
pub fn scan_pages<T, F>(
    source: &T,
    query: &str,
    epoch: SearchEpoch,
    token: &CancellationToken,
    mut sink: F,
) -> ScanSummary
where
    T: PageText + ?Sized,
    F: FnMut(SurfaceEvent) -> bool,
{
    let mut summary = ScanSummary::default();
    for page in 0..source.page_count() {
        if token.is_cancelled() {
            summary.cancelled = true;
            break;
        }
        summary.pages_scanned += 1;
        let event = match source.find(page, query) {
            Ok(Some(text)) => {
                summary.matches += 1;
                SurfaceEvent::SearchMatch { epoch, page, text }
            }
            Ok(None) => continue,
            Err(err) => {
                summary.errors += 1;
                SurfaceEvent::PageError {
                    page,
                    cause: format!("{err:#}"),
                }
            }
        };
        if !sink(event) {
            summary.cancelled = true;
            break;
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    use anyhow::anyhow;

    struct FakePages {
        pages: Vec<Result<&'static str, &'static str>>,
    }

    impl PageText for FakePages {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn find(&self, page: usize, query: &str) -> Result<Option<String>> {
            let text = self.pages[page].map_err(|cause| anyhow!(cause))?;
            let found = text
                .to_ascii_lowercase()
                .find(&query.to_ascii_lowercase())
                .map(|start| text[start..start + query.len()].to_owned());
            Ok(found)
        }
    }

    fn epoch() -> SearchEpoch {
        SearchEpoch::default().next()
    }

    #[test]
    fn reports_each_matching_page_once_in_order() {
        let pages = FakePages {
            pages: vec![
                Ok("nothing here"),
                Ok("Rust and rust and RUST"),
                Ok("still nothing"),
                Ok("trusty"),
            ],
        };
        let mut events = Vec::new();
        let summary = scan_pages(&pages, "rust", epoch(), &CancellationToken::new(), |e| {
            events.push(e);
            true
        });

        assert_eq!(
            events,
            vec![
                SurfaceEvent::SearchMatch {
                    epoch: epoch(),
                    page: 1,
                    text: "Rust".into()
                },
                SurfaceEvent::SearchMatch {
                    epoch: epoch(),
                    page: 3,
                    text: "rust".into()
                },
            ]
        );
        assert_eq!(summary.matches, 2);
        assert_eq!(summary.pages_scanned, 4);
        assert!(!summary.cancelled);
    }

    #[test]
    fn unreadable_pages_are_reported_and_skipped() {
        let pages = FakePages {
            pages: vec![Err("broken content stream"), Ok("needle")],
        };
        let mut events = Vec::new();
        let summary = scan_pages(&pages, "needle", epoch(), &CancellationToken::new(), |e| {
            events.push(e);
            true
        });
        assert_eq!(summary.errors, 1);
        assert!(matches!(
            events[0],
            SurfaceEvent::PageError { page: 0, .. }
        ));
        assert!(matches!(
            events[1],
            SurfaceEvent::SearchMatch { page: 1, .. }
        ));
    }

    #[test]
    fn cancelled_token_stops_between_pages() {
        let pages = FakePages {
            pages: vec![Ok("hit"), Ok("hit"), Ok("hit")],
        };
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let mut seen = 0;
        let summary = scan_pages(&pages, "hit", epoch(), &worker_token, |_| {
            seen += 1;
            token.cancel();
            true
        });
        assert_eq!(seen, 1);
        assert!(summary.cancelled);
        assert!(token.is_cancelled());
    }

    #[test]
    fn closed_sink_stops_the_scan() {
        let pages = FakePages {
            pages: vec![Ok("hit"), Ok("hit")],
        };
        let summary = scan_pages(&pages, "hit", epoch(), &CancellationToken::new(), |_| false);
        assert_eq!(summary.pages_scanned, 1);
        assert!(summary.cancelled);
    }
}
