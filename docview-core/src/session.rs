use std::collections::BTreeMap;

use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::LayoutOptions;
use crate::descriptor::DocumentDescriptor;
use crate::navigator::{Advance, Direction, MatchOutcome, SearchNavigator};
use crate::queue::{Deferred, QueueHandle, Task};
use crate::surface::{Bookmark, OpenRequest, RenderingSurface, SearchEpoch, SurfaceError};

/// What the viewer currently shows. Only the session's callbacks write to it.
#[derive(Debug, Default)]
pub struct ViewerState {
    pub descriptor: Option<DocumentDescriptor>,
    /// Last page reported by the surface, never a page we merely asked for.
    pub current_page_number: usize,
    pub page_count: usize,
    pub page_errors: BTreeMap<usize, String>,
    pub search: SearchNavigator,
}

pub struct DocumentSession {
    surface: Box<dyn RenderingSurface>,
    queue: QueueHandle,
    layout: LayoutOptions,
    scroll_offset_stop_at: u32,
    diagnostics: bool,
    epoch: SearchEpoch,
    state: ViewerState,
}

impl DocumentSession {
    pub fn new(
        surface: Box<dyn RenderingSurface>,
        queue: QueueHandle,
        layout: LayoutOptions,
        diagnostics: bool,
    ) -> Self {
        Self {
            surface,
            queue,
            scroll_offset_stop_at: layout.scroll_offset_stop_at(),
            layout,
            diagnostics,
            epoch: SearchEpoch::default(),
            state: ViewerState::default(),
        }
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn epoch(&self) -> SearchEpoch {
        self.epoch
    }

    pub fn layout(&self) -> &LayoutOptions {
        &self.layout
    }

    #[instrument(skip(self, descriptor), fields(document = %descriptor.id(), name = descriptor.display_name()))]
    pub fn open(&mut self, descriptor: DocumentDescriptor) -> Result<(), SurfaceError> {
        if self.state.search.session().active {
            self.surface.close_search();
            self.surface.set_scroll_handle_offset(0);
        }
        self.epoch = self.epoch.next();
        self.state = ViewerState {
            descriptor: Some(descriptor.clone()),
            ..ViewerState::default()
        };

        let request = OpenRequest {
            source: descriptor.source(),
            layout: self.layout,
        };
        info!(source = %request.source, "opening document");
        self.surface.open(request)
    }

    pub fn on_load_complete(&mut self, page_count: usize) {
        self.state.page_count = page_count;
        info!(page_count, "document loaded");
        if self.diagnostics {
            self.log_diagnostics();
        }
    }

    pub fn on_load_failed(&mut self, cause: &str) {
        error!(cause, "document failed to load");
    }

    pub fn on_page_changed(&mut self, page: usize, page_count: usize) {
        self.state.current_page_number = page;
        self.state.page_count = page_count;
    }

    pub fn on_page_error(&mut self, page: usize, cause: String) {
        error!(page, %cause, "cannot load page");
        self.state.page_errors.insert(page, cause);
    }

    pub fn on_selection_changed(&mut self, has_selection: bool) {
        if !has_selection {
            return;
        }
        if let Some(text) = self.surface.selection() {
            debug!(%text, "selected text");
        }
    }

    pub fn on_search_match(&mut self, epoch: SearchEpoch, page: usize, text: &str) -> MatchOutcome {
        if epoch != self.epoch {
            trace!(%epoch, current = %self.epoch, page, "discarding stale search match");
            return MatchOutcome::Ignored;
        }
        let outcome = self.state.search.record_match(page);
        match outcome {
            MatchOutcome::FirstMatch(page) => {
                debug!(page, text, "first search match");
                self.queue
                    .post(Task::Deferred(Deferred::JumpTo { page, epoch }));
            }
            MatchOutcome::Recorded => trace!(page, text, "search match"),
            MatchOutcome::Ignored => {}
        }
        outcome
    }

    pub fn run_deferred(&mut self, deferred: Deferred) {
        match deferred {
            Deferred::JumpTo { page, epoch } => {
                if epoch != self.epoch || !self.state.search.session().active {
                    trace!(page, %epoch, "skipping jump for a closed search");
                    return;
                }
                self.jump_to(page);
            }
        }
    }

    /// Asks the surface to show `page`. The current page only changes once the surface
    /// reports back.
    pub fn jump_to(&mut self, page: usize) {
        self.surface.jump_to(page);
    }

    /// Starts a new query. A blank query closes the search instead and returns `false`.
    #[instrument(skip(self))]
    pub fn search(&mut self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            self.close_search();
            return false;
        }
        if self.state.descriptor.is_none() {
            warn!("search requested without a document");
        }
        if self.state.search.session().active {
            self.surface.close_search();
        }
        self.epoch = self.epoch.next();
        self.state.search.begin(query);
        self.surface.search(query, self.epoch);
        self.surface
            .set_scroll_handle_offset(self.scroll_offset_stop_at);
        true
    }

    pub fn close_search(&mut self) {
        self.epoch = self.epoch.next();
        self.surface.close_search();
        self.state.search.close();
        self.surface.set_scroll_handle_offset(0);
    }

    pub fn advance(&mut self, direction: Direction) -> Advance {
        self.advance_by(direction, 1)
    }

    /// Moves `count` matches in `direction` and requests a single jump to where the
    /// walk ends.
    pub fn advance_by(&mut self, direction: Direction, count: usize) -> Advance {
        let outcome = self.state.search.advance_by(direction, count);
        if let Advance::JumpTo(page) = outcome {
            self.jump_to(page);
        }
        outcome
    }

    fn log_diagnostics(&self) {
        match self.surface.metadata() {
            Ok(meta) => {
                debug!(title = ?meta.title, author = ?meta.author, subject = ?meta.subject, "document metadata");
                debug!(keywords = ?meta.keywords, creator = ?meta.creator, producer = ?meta.producer, "document metadata");
                debug!(creation_date = ?meta.creation_date, mod_date = ?meta.mod_date, "document metadata");
            }
            Err(err) => warn!(?err, "failed to read document metadata"),
        }
        match self.surface.outline() {
            Ok(outline) => log_outline(&outline, "-"),
            Err(err) => warn!(?err, "failed to read document outline"),
        }
    }
}

fn log_outline(tree: &[Bookmark], sep: &str) {
    for bookmark in tree {
        debug!("---> {} {}, p {}", sep, bookmark.title, bookmark.page_index);
        if bookmark.has_children() {
            log_outline(&bookmark.children, &format!("{sep}-"));
        }
    }
}
