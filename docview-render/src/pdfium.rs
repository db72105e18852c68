use std::collections::BTreeMap;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use docview_core::{
    Bookmark, DocumentMetadata, DocumentSource, OpenRequest, QueueHandle, RenderingSurface,
    SearchEpoch, SurfaceError, SurfaceEvent,
};
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use tracing::{debug, info, instrument, trace, warn};

use crate::scan::{scan_pages, CancellationToken, PageText};

pub const PDFIUM_LIBRARY_ENV: &str = "DOCVIEW_PDFIUM_LIBRARY_PATH";

/// Binds to pdfium, preferring an explicit library path, then the working directory,
/// then whatever the system loader finds.
pub fn bind_pdfium() -> Result<Arc<Pdfium>> {
    let mut errors = Vec::new();

    if let Ok(path) = std::env::var(PDFIUM_LIBRARY_ENV) {
        if !path.is_empty() {
            match Pdfium::bind_to_library(&path) {
                Ok(bindings) => return Ok(Arc::new(Pdfium::new(bindings))),
                Err(err) => {
                    warn!("failed to load Pdfium from {}={}: {}", PDFIUM_LIBRARY_ENV, path, err);
                    errors.push(format!("{path}: {err}"));
                }
            }
        }
    }

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");
    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Arc::new(Pdfium::new(bindings))),
        Err(err) => errors.push(format!("{}: {}", cwd_path.display(), err)),
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Arc::new(Pdfium::new(bindings))),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; ensure it is installed ({})",
                errors.join(", ")
            ))
        }
    }
}

fn pdf_page_index(page: usize) -> Result<PdfPageIndex> {
    page.try_into()
        .map_err(|_| anyhow!("page {} is out of supported range", page))
}

struct LoadedDocument {
    path: PathBuf,
    page_count: usize,
    // Declared before `_pdfium` so it is dropped first.
    document: Mutex<PdfDocument<'static>>,
    _pdfium: Arc<Pdfium>,
}

impl LoadedDocument {
    fn load(pdfium: Arc<Pdfium>, path: &Path) -> Result<Self> {
        let document = pdfium
            .load_pdf_from_file(path, None)
            .with_context(|| format!("failed to open {:?}", path))?;
        // SAFETY: the document borrows the bindings owned by `pdfium`. That Arc is stored
        // next to the document and struct fields drop in declaration order, so the
        // document is always dropped while the bindings are still alive.
        let document = unsafe { mem::transmute::<PdfDocument<'_>, PdfDocument<'static>>(document) };
        let page_count = usize::try_from(document.pages().len()).unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            page_count,
            document: Mutex::new(document),
            _pdfium: pdfium,
        })
    }

    fn check_page(&self, page: usize) -> Result<()> {
        let document = self.document.lock();
        let page = document
            .pages()
            .get(pdf_page_index(page)?)
            .with_context(|| format!("page {} out of range", page))?;
        if page.width().value <= 0.0 || page.height().value <= 0.0 {
            return Err(anyhow!("page has an empty media box"));
        }
        Ok(())
    }

    fn metadata(&self) -> DocumentMetadata {
        let document = self.document.lock();
        let metadata = document.metadata();
        let tag = |kind| metadata.get(kind).map(|t| t.value().to_owned());
        DocumentMetadata {
            title: tag(PdfDocumentMetadataTagType::Title),
            author: tag(PdfDocumentMetadataTagType::Author),
            subject: tag(PdfDocumentMetadataTagType::Subject),
            keywords: tag(PdfDocumentMetadataTagType::Keywords),
            creator: tag(PdfDocumentMetadataTagType::Creator),
            producer: tag(PdfDocumentMetadataTagType::Producer),
            creation_date: tag(PdfDocumentMetadataTagType::CreationDate),
            mod_date: tag(PdfDocumentMetadataTagType::ModificationDate),
        }
    }

    fn outline(&self) -> Vec<Bookmark> {
        let document = self.document.lock();
        let bookmarks = document.bookmarks();
        collect_bookmarks(bookmarks.root())
    }
}

impl PageText for LoadedDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn find(&self, page: usize, query: &str) -> Result<Option<String>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }
        let document = self.document.lock();
        let pdf_page = document
            .pages()
            .get(pdf_page_index(page)?)
            .with_context(|| format!("page {} out of range", page))?;
        let text = pdf_page
            .text()
            .with_context(|| format!("failed to extract text for page {}", page))?;
        let options = PdfSearchOptions::new();
        let search = text
            .search(query, &options)
            .with_context(|| format!("failed to perform search on page {}", page))?;

        let Some(segments) = search.find_next() else {
            return Ok(None);
        };
        let matched: String = segments.iter().map(|segment| segment.text()).collect();
        if matched.trim().is_empty() {
            Ok(Some(query.to_owned()))
        } else {
            Ok(Some(matched))
        }
    }
}

/// Walks a sibling chain. Entries without a resolvable destination are dropped and
/// their children take their place.
fn collect_bookmarks(first: Option<PdfBookmark<'_>>) -> Vec<Bookmark> {
    let mut out = Vec::new();
    let mut next = first;
    while let Some(bookmark) = next {
        let children = collect_bookmarks(bookmark.first_child());
        let page_index = bookmark
            .destination()
            .and_then(|destination| destination.page_index().ok());
        match page_index {
            Some(page_index) => out.push(Bookmark {
                title: bookmark.title().unwrap_or_default(),
                page_index: page_index as usize,
                children,
            }),
            None => out.extend(children),
        }
        next = bookmark.next_sibling();
    }
    out
}

struct ActiveSearch {
    token: CancellationToken,
    hits: Arc<Mutex<BTreeMap<usize, String>>>,
}

/// Rendering surface backed by pdfium.
///
/// Loading happens synchronously inside `open`; the outcome is still reported through
/// the task queue so the session sees the same event order as with any other surface.
/// Searches run on a dedicated worker thread.
pub struct PdfiumSurface {
    pdfium: Arc<Pdfium>,
    assets_dir: PathBuf,
    queue: QueueHandle,
    document: Option<Arc<LoadedDocument>>,
    current_page: usize,
    search: Option<ActiveSearch>,
    selection: Option<String>,
    scroll_handle_offset: u32,
}

impl PdfiumSurface {
    pub fn new(pdfium: Arc<Pdfium>, assets_dir: impl Into<PathBuf>, queue: QueueHandle) -> Self {
        Self {
            pdfium,
            assets_dir: assets_dir.into(),
            queue,
            document: None,
            current_page: 0,
            search: None,
            selection: None,
            scroll_handle_offset: 0,
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn scroll_handle_offset(&self) -> u32 {
        self.scroll_handle_offset
    }

    fn resolve_path(&self, source: &DocumentSource) -> Result<PathBuf, SurfaceError> {
        let path = match source {
            DocumentSource::Asset(name) => self.assets_dir.join(name),
            DocumentSource::External(reference) => reference
                .to_file_path()
                .ok_or_else(|| SurfaceError::UnsupportedSource(reference.to_string()))?,
        };
        if !path.is_file() {
            return Err(SurfaceError::NotFound(path.display().to_string()));
        }
        Ok(path)
    }

    fn loaded(&self) -> Result<&LoadedDocument, SurfaceError> {
        self.document.as_deref().ok_or(SurfaceError::NotLoaded)
    }

    fn cancel_search(&mut self) {
        if let Some(search) = self.search.take() {
            search.token.cancel();
        }
    }

    fn set_selection(&mut self, selection: Option<String>) {
        let had_selection = self.selection.is_some();
        let has_selection = selection.is_some();
        self.selection = selection;
        if had_selection || has_selection {
            self.queue
                .post_surface(SurfaceEvent::SelectionChanged { has_selection });
        }
    }

    fn show_page(&mut self, page: usize) {
        let Some(document) = self.document.clone() else {
            debug!(page, "jump ignored, no document loaded");
            return;
        };
        if document.page_count == 0 {
            return;
        }
        let page = page.min(document.page_count - 1);
        if let Err(err) = document.check_page(page) {
            self.queue.post_surface(SurfaceEvent::PageError {
                page,
                cause: format!("{err:#}"),
            });
        }
        self.current_page = page;
        self.queue.post_surface(SurfaceEvent::PageChanged {
            page,
            page_count: document.page_count,
        });

        let hit = self
            .search
            .as_ref()
            .and_then(|search| search.hits.lock().get(&page).cloned());
        self.set_selection(hit);
    }
}

impl RenderingSurface for PdfiumSurface {
    #[instrument(skip(self, request), fields(source = %request.source))]
    fn open(&mut self, request: OpenRequest) -> Result<(), SurfaceError> {
        self.cancel_search();
        self.selection = None;
        self.document = None;
        self.current_page = 0;

        let path = self.resolve_path(&request.source)?;
        debug!(layout = ?request.layout, path = %path.display(), "loading document");
        match LoadedDocument::load(Arc::clone(&self.pdfium), &path) {
            Ok(document) => {
                info!(
                    path = %document.path.display(),
                    pages = document.page_count,
                    "document loaded"
                );
                let page_count = document.page_count;
                self.document = Some(Arc::new(document));
                self.queue
                    .post_surface(SurfaceEvent::LoadComplete { page_count });
                self.show_page(0);
            }
            Err(err) => {
                warn!(?err, "document failed to load");
                self.queue.post_surface(SurfaceEvent::LoadFailed {
                    cause: format!("{err:#}"),
                });
            }
        }
        Ok(())
    }

    fn jump_to(&mut self, page: usize) {
        self.show_page(page);
    }

    fn search(&mut self, query: &str, epoch: SearchEpoch) {
        self.cancel_search();
        let Some(document) = self.document.clone() else {
            debug!(%epoch, "search ignored, no document loaded");
            return;
        };

        let token = CancellationToken::new();
        let hits = Arc::new(Mutex::new(BTreeMap::new()));
        self.search = Some(ActiveSearch {
            token: token.clone(),
            hits: Arc::clone(&hits),
        });

        let queue = self.queue.clone();
        let query = query.to_owned();
        let spawned = thread::Builder::new()
            .name("docview-search".into())
            .spawn(move || {
                let summary = scan_pages(&*document, &query, epoch, &token, |event| {
                    if let SurfaceEvent::SearchMatch { page, text, .. } = &event {
                        hits.lock().insert(*page, text.clone());
                    }
                    queue.post_surface(event)
                });
                debug!(%epoch, ?summary, "search scan finished");
            });
        if let Err(err) = spawned {
            warn!(?err, %epoch, "failed to start search worker");
        }
    }

    fn close_search(&mut self) {
        self.cancel_search();
        self.set_selection(None);
    }

    fn selection(&self) -> Option<String> {
        self.selection.clone()
    }

    fn metadata(&self) -> Result<DocumentMetadata, SurfaceError> {
        Ok(self.loaded()?.metadata())
    }

    fn outline(&self) -> Result<Vec<Bookmark>, SurfaceError> {
        Ok(self.loaded()?.outline())
    }

    fn set_scroll_handle_offset(&mut self, offset: u32) {
        trace!(offset, "scroll handle offset");
        self.scroll_handle_offset = offset;
    }
}
