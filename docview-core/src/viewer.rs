use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::ViewerConfig;
use crate::descriptor::{DocumentResolver, ExternalRef};
use crate::navigator::{Advance, Direction};
use crate::permission::{
    GateDecision, Permission, PermissionGate, PermissionSubsystem, RequestCode,
};
use crate::queue::{ActivityOutcome, QueueHandle, Task, TaskQueue};
use crate::session::DocumentSession;
use crate::surface::{RenderingSurface, SurfaceEvent};

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// User intents, as produced by whatever input front-end drives the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    PickDocument,
    OpenReference { reference: ExternalRef },
    OpenBundled,
    Search { query: String },
    CloseSearch,
    NextMatch { count: usize },
    PreviousMatch { count: usize },
    GotoPage { page: usize },
    ShowStatus,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NoMatches,
    PickerUnavailable,
    OpenFailed(String),
    LoadFailed(String),
    Status(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NoMatches => f.write_str("no matches found"),
            Notice::PickerUnavailable => f.write_str("unable to open a file chooser"),
            Notice::OpenFailed(cause) => write!(f, "cannot open document: {cause}"),
            Notice::LoadFailed(cause) => write!(f, "cannot load document: {cause}"),
            Notice::Status(status) => f.write_str(status),
        }
    }
}

/// Title bar, search controls and transient notices.
pub trait Presenter: Send {
    fn set_title(&mut self, title: &str);
    fn set_search_controls_visible(&mut self, visible: bool);
    fn show_notice(&mut self, notice: &Notice);
}

#[derive(Debug, Error)]
pub enum PickerError {
    #[error("no file chooser is available")]
    Unavailable,
    #[error("file chooser failed: {0}")]
    Failed(String),
}

/// The document chooser. A successful launch answers later with a
/// `Task::ActivityResult` carrying the same code.
pub trait FilePicker: Send {
    fn launch(&mut self, mime_type: &str, code: RequestCode) -> Result<(), PickerError>;
}

/// Actions that wait behind the read permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatedAction {
    LaunchPicker,
    Open(ExternalRef),
}

impl GatedAction {
    /// Each kind of action waits under its own code. A second action of the same kind
    /// replaces the one already waiting.
    pub fn request_code(&self) -> RequestCode {
        match self {
            GatedAction::LaunchPicker => RequestCode::READ_EXTERNAL_STORAGE,
            GatedAction::Open(_) => RequestCode::OPEN_EXTERNAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

type ResultHandler = fn(&mut Viewer, ActivityOutcome);

pub struct ViewerParts {
    pub surface: Box<dyn RenderingSurface>,
    pub permissions: Box<dyn PermissionSubsystem>,
    pub picker: Box<dyn FilePicker>,
    pub presenter: Box<dyn Presenter>,
}

/// Owns every collaborator and handles tasks one at a time.
pub struct Viewer {
    session: DocumentSession,
    resolver: DocumentResolver,
    permissions: Box<dyn PermissionSubsystem>,
    gate: PermissionGate<GatedAction>,
    picker: Box<dyn FilePicker>,
    presenter: Box<dyn Presenter>,
    result_handlers: HashMap<RequestCode, ResultHandler>,
    search_controls_visible: bool,
}

impl Viewer {
    pub fn new(
        config: &ViewerConfig,
        queue: QueueHandle,
        parts: ViewerParts,
        resolver: DocumentResolver,
    ) -> Self {
        let session =
            DocumentSession::new(parts.surface, queue, config.layout, config.diagnostics);
        let mut result_handlers: HashMap<RequestCode, ResultHandler> = HashMap::new();
        result_handlers.insert(RequestCode::PICK_DOCUMENT, Viewer::on_document_picked);
        Self {
            session,
            resolver,
            permissions: parts.permissions,
            gate: PermissionGate::new(),
            picker: parts.picker,
            presenter: parts.presenter,
            result_handlers,
            search_controls_visible: false,
        }
    }

    pub fn session(&self) -> &DocumentSession {
        &self.session
    }

    /// Opens the initial document: `reference` when given, the bundled one otherwise.
    pub fn start(&mut self, reference: Option<ExternalRef>) {
        match reference {
            Some(reference) => self.with_read_permission(GatedAction::Open(reference)),
            None => self.display_document(None),
        }
    }

    pub async fn run(&mut self, queue: &mut TaskQueue) {
        while let Some(task) = queue.next().await {
            if self.handle(task) == Flow::Quit {
                break;
            }
        }
        info!("viewer stopped");
    }

    /// Handles everything queued right now, including work queued while doing so.
    pub fn run_until_idle(&mut self, queue: &mut TaskQueue) -> Flow {
        while let Some(task) = queue.try_next() {
            if self.handle(task) == Flow::Quit {
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    pub fn handle(&mut self, task: Task) -> Flow {
        match task {
            Task::Surface(event) => self.on_surface_event(event),
            Task::PermissionResult { code, granted } => {
                if let Some(action) = self.gate.resolve(code, granted) {
                    self.perform(action);
                }
            }
            Task::ActivityResult { code, outcome } => {
                let handler = self.result_handlers.get(&code).copied();
                match handler {
                    Some(handler) => handler(self, outcome),
                    None => debug!(%code, ?outcome, "no handler for activity result"),
                }
            }
            Task::Deferred(deferred) => self.session.run_deferred(deferred),
            Task::User(command) => return self.execute(command),
            Task::Shutdown => return Flow::Quit,
        }
        Flow::Continue
    }

    pub fn execute(&mut self, command: Command) -> Flow {
        match command {
            Command::PickDocument => self.with_read_permission(GatedAction::LaunchPicker),
            Command::OpenReference { reference } => {
                self.with_read_permission(GatedAction::Open(reference))
            }
            Command::OpenBundled => self.display_document(None),
            Command::Search { query } => {
                let active = self.session.search(&query);
                self.set_search_controls(active);
            }
            Command::CloseSearch => {
                self.session.close_search();
                self.set_search_controls(false);
            }
            Command::NextMatch { count } => self.advance(Direction::Next, count),
            Command::PreviousMatch { count } => self.advance(Direction::Previous, count),
            Command::GotoPage { page } => self.session.jump_to(page),
            Command::ShowStatus => {
                let status = self.status_line();
                self.presenter.show_notice(&Notice::Status(status));
            }
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// `name | page n/m`, followed by the search summary while a search is active.
    pub fn status_line(&self) -> String {
        let state = self.session.state();
        let name = state
            .descriptor
            .as_ref()
            .map(|d| d.display_name())
            .unwrap_or("<no document>");
        let mut status = format!(
            "{} | page {}/{}",
            name,
            state.current_page_number + 1,
            state.page_count
        );
        if let Some(query) = state.search.query() {
            status.push_str(" | /");
            status.push_str(query);
            let total = state.search.session().match_pages.len();
            if total == 0 {
                status.push_str(" (no matches)");
            } else if let Some((index, total)) = state.search.position() {
                status.push_str(&format!(" ({}/{})", index + 1, total));
            } else {
                status.push_str(&format!(" (0/{})", total));
            }
        }
        if !state.page_errors.is_empty() {
            status.push_str(&format!(" | {} page error(s)", state.page_errors.len()));
        }
        status
    }

    fn with_read_permission(&mut self, action: GatedAction) {
        let code = action.request_code();
        let decision = self.gate.ensure(
            self.permissions.as_mut(),
            Permission::ReadExternalStorage,
            code,
            action,
        );
        match decision {
            GateDecision::Proceed(action) => self.perform(action),
            GateDecision::Deferred => debug!(%code, "waiting for read permission"),
        }
    }

    fn perform(&mut self, action: GatedAction) {
        match action {
            GatedAction::LaunchPicker => self.launch_picker(),
            GatedAction::Open(reference) => self.display_document(Some(reference)),
        }
    }

    fn launch_picker(&mut self) {
        if let Err(err) = self.picker.launch(PDF_MIME_TYPE, RequestCode::PICK_DOCUMENT) {
            warn!(?err, "failed to launch file chooser");
            self.presenter.show_notice(&Notice::PickerUnavailable);
        }
    }

    fn on_document_picked(&mut self, outcome: ActivityOutcome) {
        match outcome {
            ActivityOutcome::Picked(reference) => self.display_document(Some(reference)),
            ActivityOutcome::Cancelled => debug!("document pick cancelled"),
        }
    }

    #[instrument(skip(self))]
    fn display_document(&mut self, reference: Option<ExternalRef>) {
        let descriptor = self.resolver.resolve(reference);
        let title = descriptor.display_name().to_owned();
        self.set_search_controls(false);
        match self.session.open(descriptor) {
            Ok(()) => self.presenter.set_title(&title),
            Err(err) => {
                warn!(?err, "failed to open document");
                self.presenter
                    .show_notice(&Notice::OpenFailed(err.to_string()));
            }
        }
    }

    fn advance(&mut self, direction: Direction, count: usize) {
        match self.session.advance_by(direction, count) {
            Advance::NoMatches => self.presenter.show_notice(&Notice::NoMatches),
            Advance::JumpTo(page) => debug!(page, ?direction, "moved to search match"),
            Advance::Inactive => {}
        }
    }

    fn set_search_controls(&mut self, visible: bool) {
        if self.search_controls_visible != visible {
            self.search_controls_visible = visible;
            self.presenter.set_search_controls_visible(visible);
        }
    }

    fn on_surface_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::LoadComplete { page_count } => self.session.on_load_complete(page_count),
            SurfaceEvent::LoadFailed { cause } => {
                self.session.on_load_failed(&cause);
                self.presenter.show_notice(&Notice::LoadFailed(cause));
            }
            SurfaceEvent::PageChanged { page, page_count } => {
                self.session.on_page_changed(page, page_count)
            }
            SurfaceEvent::PageError { page, cause } => self.session.on_page_error(page, cause),
            SurfaceEvent::SearchMatch { epoch, page, text } => {
                self.session.on_search_match(epoch, page, &text);
            }
            SurfaceEvent::SelectionChanged { has_selection } => {
                self.session.on_selection_changed(has_selection)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::permission::PermissionStatus;
    use crate::queue::{task_queue, Deferred};
    use crate::session::tests::{RecordingSurface, SurfaceCall};
    use crate::surface::{DocumentSource, SearchEpoch};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Shown {
        Title(String),
        Controls(bool),
        Notice(Notice),
    }

    #[derive(Clone, Default)]
    struct RecordingPresenter {
        shown: Arc<Mutex<Vec<Shown>>>,
    }

    impl RecordingPresenter {
        fn take(&self) -> Vec<Shown> {
            std::mem::take(&mut *self.shown.lock())
        }
    }

    impl Presenter for RecordingPresenter {
        fn set_title(&mut self, title: &str) {
            self.shown.lock().push(Shown::Title(title.to_owned()));
        }

        fn set_search_controls_visible(&mut self, visible: bool) {
            self.shown.lock().push(Shown::Controls(visible));
        }

        fn show_notice(&mut self, notice: &Notice) {
            self.shown.lock().push(Shown::Notice(notice.clone()));
        }
    }

    #[derive(Clone)]
    struct ScriptedPermissions {
        status: Arc<Mutex<PermissionStatus>>,
        requests: Arc<Mutex<Vec<RequestCode>>>,
    }

    impl PermissionSubsystem for ScriptedPermissions {
        fn check(&self, _permission: Permission) -> PermissionStatus {
            *self.status.lock()
        }

        fn request(&mut self, _permission: Permission, code: RequestCode) {
            self.requests.lock().push(code);
        }
    }

    #[derive(Clone, Default)]
    struct ScriptedPicker {
        unavailable: bool,
        launches: Arc<Mutex<Vec<(String, RequestCode)>>>,
    }

    impl FilePicker for ScriptedPicker {
        fn launch(&mut self, mime_type: &str, code: RequestCode) -> Result<(), PickerError> {
            if self.unavailable {
                return Err(PickerError::Unavailable);
            }
            self.launches.lock().push((mime_type.to_owned(), code));
            Ok(())
        }
    }

    struct Harness {
        viewer: Viewer,
        queue: TaskQueue,
        handle: QueueHandle,
        surface: RecordingSurface,
        presenter: RecordingPresenter,
        permissions: ScriptedPermissions,
        picker: ScriptedPicker,
    }

    impl Harness {
        fn new(status: PermissionStatus, picker: ScriptedPicker) -> Self {
            Self::with_surface(status, picker, RecordingSurface::default())
        }

        fn with_surface(
            status: PermissionStatus,
            picker: ScriptedPicker,
            surface: RecordingSurface,
        ) -> Self {
            let (handle, queue) = task_queue();
            let presenter = RecordingPresenter::default();
            let permissions = ScriptedPermissions {
                status: Arc::new(Mutex::new(status)),
                requests: Arc::default(),
            };
            let parts = ViewerParts {
                surface: Box::new(surface.clone()),
                permissions: Box::new(permissions.clone()),
                picker: Box::new(picker.clone()),
                presenter: Box::new(presenter.clone()),
            };
            let viewer = Viewer::new(
                &ViewerConfig::default(),
                handle.clone(),
                parts,
                DocumentResolver::new("sample.pdf"),
            );
            Self {
                viewer,
                queue,
                handle,
                surface,
                presenter,
                permissions,
                picker,
            }
        }

        fn post(&mut self, task: Task) -> Flow {
            self.handle.post(task);
            self.viewer.run_until_idle(&mut self.queue)
        }

        fn user(&mut self, command: Command) -> Flow {
            self.post(Task::User(command))
        }

        fn surface_event(&mut self, event: SurfaceEvent) {
            self.post(Task::Surface(event));
        }
    }

    fn picked(raw: &str) -> Task {
        Task::ActivityResult {
            code: RequestCode::PICK_DOCUMENT,
            outcome: ActivityOutcome::Picked(ExternalRef::parse(raw).unwrap()),
        }
    }

    #[test]
    fn startup_opens_bundled_document_and_sets_title() {
        let mut h = Harness::new(PermissionStatus::Denied, ScriptedPicker::default());
        h.viewer.start(None);
        assert_eq!(
            h.surface.take_calls(),
            vec![SurfaceCall::Open(DocumentSource::Asset("sample.pdf".into()))]
        );
        assert_eq!(h.presenter.take(), vec![Shown::Title("sample.pdf".into())]);
        assert!(h.permissions.requests.lock().is_empty());
    }

    #[test]
    fn pick_with_permission_launches_picker_inline() {
        let mut h = Harness::new(PermissionStatus::Granted, ScriptedPicker::default());
        h.user(Command::PickDocument);
        assert_eq!(
            *h.picker.launches.lock(),
            vec![(PDF_MIME_TYPE.to_owned(), RequestCode::PICK_DOCUMENT)]
        );

        h.post(picked("file:///tmp/library/paper%201.pdf"));
        assert_eq!(h.presenter.take(), vec![Shown::Title("paper 1.pdf".into())]);
        assert!(matches!(
            h.surface.take_calls().as_slice(),
            [SurfaceCall::Open(DocumentSource::External(_))]
        ));
    }

    #[test]
    fn pick_without_permission_waits_for_grant() {
        let mut h = Harness::new(PermissionStatus::Denied, ScriptedPicker::default());
        h.user(Command::PickDocument);
        assert!(h.picker.launches.lock().is_empty());
        assert_eq!(
            *h.permissions.requests.lock(),
            vec![RequestCode::READ_EXTERNAL_STORAGE]
        );

        *h.permissions.status.lock() = PermissionStatus::Granted;
        h.post(Task::PermissionResult {
            code: RequestCode::READ_EXTERNAL_STORAGE,
            granted: true,
        });
        assert_eq!(h.picker.launches.lock().len(), 1);
    }

    #[test]
    fn denied_permission_is_a_silent_no_op() {
        let mut h = Harness::new(PermissionStatus::Denied, ScriptedPicker::default());
        h.user(Command::PickDocument);
        h.post(Task::PermissionResult {
            code: RequestCode::READ_EXTERNAL_STORAGE,
            granted: false,
        });
        assert!(h.picker.launches.lock().is_empty());
        assert!(h.presenter.take().is_empty());
        assert!(h.surface.take_calls().is_empty());
    }

    #[test]
    fn unavailable_picker_shows_notice_without_state_change() {
        let picker = ScriptedPicker {
            unavailable: true,
            ..ScriptedPicker::default()
        };
        let mut h = Harness::new(PermissionStatus::Granted, picker);
        h.viewer.start(None);
        h.presenter.take();
        h.surface.take_calls();

        h.user(Command::PickDocument);
        assert_eq!(
            h.presenter.take(),
            vec![Shown::Notice(Notice::PickerUnavailable)]
        );
        assert!(h.surface.take_calls().is_empty());
        assert!(h.viewer.session().state().descriptor.is_some());
    }

    #[test]
    fn unknown_activity_result_and_cancel_are_ignored() {
        let mut h = Harness::new(PermissionStatus::Granted, ScriptedPicker::default());
        h.post(Task::ActivityResult {
            code: RequestCode(1),
            outcome: ActivityOutcome::Cancelled,
        });
        h.post(Task::ActivityResult {
            code: RequestCode::PICK_DOCUMENT,
            outcome: ActivityOutcome::Cancelled,
        });
        assert!(h.surface.take_calls().is_empty());
        assert!(h.presenter.take().is_empty());
    }

    #[test]
    fn search_flow_auto_jumps_then_walks_circularly() {
        let mut h = Harness::new(PermissionStatus::Granted, ScriptedPicker::default());
        h.viewer.start(None);
        h.surface_event(SurfaceEvent::LoadComplete { page_count: 20 });
        h.surface.take_calls();
        h.presenter.take();

        h.user(Command::Search {
            query: "needle".into(),
        });
        assert_eq!(h.presenter.take(), vec![Shown::Controls(true)]);
        let epoch = h.viewer.session().epoch();

        for page in [3, 7, 12] {
            h.surface_event(SurfaceEvent::SearchMatch {
                epoch,
                page,
                text: "needle".into(),
            });
        }
        h.surface_event(SurfaceEvent::PageChanged {
            page: 3,
            page_count: 20,
        });
        let calls = h.surface.take_calls();
        assert_eq!(
            calls
                .iter()
                .filter(|c| matches!(c, SurfaceCall::JumpTo(_)))
                .collect::<Vec<_>>(),
            vec![&SurfaceCall::JumpTo(3)]
        );
        assert_eq!(h.viewer.session().state().current_page_number, 3);

        h.user(Command::NextMatch { count: 1 });
        h.user(Command::NextMatch { count: 1 });
        h.user(Command::NextMatch { count: 1 });
        h.user(Command::PreviousMatch { count: 1 });
        assert_eq!(
            h.surface.take_calls(),
            vec![
                SurfaceCall::JumpTo(7),
                SurfaceCall::JumpTo(12),
                SurfaceCall::JumpTo(3),
                SurfaceCall::JumpTo(12),
            ]
        );
        assert_eq!(
            h.viewer.status_line(),
            "sample.pdf | page 4/20 | /needle (3/3)"
        );
    }

    #[test]
    fn next_without_matches_shows_notice() {
        let mut h = Harness::new(PermissionStatus::Granted, ScriptedPicker::default());
        h.viewer.start(None);
        h.user(Command::Search {
            query: "absent".into(),
        });
        h.presenter.take();
        h.surface.take_calls();

        h.user(Command::NextMatch { count: 1 });
        assert_eq!(h.presenter.take(), vec![Shown::Notice(Notice::NoMatches)]);
        assert!(h.surface.take_calls().is_empty());
    }

    #[test]
    fn navigation_while_idle_is_ignored() {
        let mut h = Harness::new(PermissionStatus::Granted, ScriptedPicker::default());
        h.viewer.start(None);
        h.presenter.take();
        h.surface.take_calls();
        h.user(Command::NextMatch { count: 1 });
        assert!(h.presenter.take().is_empty());
        assert!(h.surface.take_calls().is_empty());
    }

    #[test]
    fn close_search_hides_controls_and_drops_late_matches() {
        let mut h = Harness::new(PermissionStatus::Granted, ScriptedPicker::default());
        h.viewer.start(None);
        h.user(Command::Search {
            query: "term".into(),
        });
        let epoch = h.viewer.session().epoch();
        h.presenter.take();

        h.user(Command::CloseSearch);
        h.user(Command::CloseSearch);
        assert_eq!(h.presenter.take(), vec![Shown::Controls(false)]);

        h.surface_event(SurfaceEvent::SearchMatch {
            epoch,
            page: 2,
            text: "term".into(),
        });
        assert!(h.viewer.session().state().search.session().match_pages.is_empty());
        assert!(!h
            .surface
            .take_calls()
            .contains(&SurfaceCall::JumpTo(2)));
    }

    #[test]
    fn first_match_jump_runs_after_the_callback() {
        let mut h = Harness::new(PermissionStatus::Granted, ScriptedPicker::default());
        h.viewer.start(None);
        h.user(Command::Search { query: "x".into() });
        let epoch = h.viewer.session().epoch();
        h.surface.take_calls();

        // Handle the match without draining: the jump must still be queued.
        h.viewer.handle(Task::Surface(SurfaceEvent::SearchMatch {
            epoch,
            page: 5,
            text: "x".into(),
        }));
        assert!(h.surface.take_calls().is_empty());
        assert_eq!(
            h.queue.try_next(),
            Some(Task::Deferred(Deferred::JumpTo { page: 5, epoch }))
        );
    }

    #[test]
    fn page_errors_and_load_failures_are_not_fatal() {
        let mut h = Harness::new(PermissionStatus::Granted, ScriptedPicker::default());
        h.viewer.start(None);
        h.presenter.take();
        h.surface_event(SurfaceEvent::LoadComplete { page_count: 2 });
        h.surface_event(SurfaceEvent::PageError {
            page: 1,
            cause: "bad xref".into(),
        });
        assert_eq!(
            h.viewer.session().state().page_errors.get(&1).map(String::as_str),
            Some("bad xref")
        );
        assert_eq!(
            h.viewer.status_line(),
            "sample.pdf | page 1/2 | 1 page error(s)"
        );

        h.surface_event(SurfaceEvent::LoadFailed {
            cause: "truncated file".into(),
        });
        assert_eq!(
            h.presenter.take(),
            vec![Shown::Notice(Notice::LoadFailed("truncated file".into()))]
        );
        assert_eq!(h.user(Command::ShowStatus), Flow::Continue);
    }

    #[test]
    fn open_reference_is_gated_and_reopens_after_grant() {
        let mut h = Harness::new(PermissionStatus::Denied, ScriptedPicker::default());
        let reference = ExternalRef::parse("file:///srv/docs/spec.pdf").unwrap();
        h.user(Command::OpenReference {
            reference: reference.clone(),
        });
        assert!(h.surface.take_calls().is_empty());
        assert_eq!(
            *h.permissions.requests.lock(),
            vec![RequestCode::OPEN_EXTERNAL]
        );

        h.post(Task::PermissionResult {
            code: RequestCode::OPEN_EXTERNAL,
            granted: true,
        });
        assert_eq!(
            h.surface.take_calls(),
            vec![SurfaceCall::Open(DocumentSource::External(reference))]
        );
        assert_eq!(h.presenter.take(), vec![Shown::Title("spec.pdf".into())]);
    }

    #[test]
    fn picker_and_open_wait_for_permission_side_by_side() {
        let mut h = Harness::new(PermissionStatus::Denied, ScriptedPicker::default());
        let reference = ExternalRef::parse("file:///srv/docs/notes.pdf").unwrap();
        h.user(Command::PickDocument);
        h.user(Command::OpenReference {
            reference: reference.clone(),
        });
        assert_eq!(
            *h.permissions.requests.lock(),
            vec![RequestCode::READ_EXTERNAL_STORAGE, RequestCode::OPEN_EXTERNAL]
        );

        h.post(Task::PermissionResult {
            code: RequestCode::OPEN_EXTERNAL,
            granted: true,
        });
        assert_eq!(
            h.surface.take_calls(),
            vec![SurfaceCall::Open(DocumentSource::External(reference))]
        );

        h.post(Task::PermissionResult {
            code: RequestCode::READ_EXTERNAL_STORAGE,
            granted: true,
        });
        assert_eq!(
            *h.picker.launches.lock(),
            vec![(PDF_MIME_TYPE.to_owned(), RequestCode::PICK_DOCUMENT)]
        );
    }

    #[test]
    fn failed_open_leaves_the_title_alone() {
        let surface = RecordingSurface {
            fail_open: true,
            ..RecordingSurface::default()
        };
        let mut h = Harness::with_surface(
            PermissionStatus::Granted,
            ScriptedPicker::default(),
            surface,
        );
        h.user(Command::OpenReference {
            reference: ExternalRef::parse("file:///srv/docs/missing.pdf").unwrap(),
        });
        let shown = h.presenter.take();
        assert!(matches!(
            shown.as_slice(),
            [Shown::Notice(Notice::OpenFailed(_))]
        ));
    }

    #[test]
    fn quit_and_shutdown_stop_the_loop() {
        let mut h = Harness::new(PermissionStatus::Granted, ScriptedPicker::default());
        assert_eq!(h.user(Command::Quit), Flow::Quit);
        assert_eq!(h.post(Task::Shutdown), Flow::Quit);
    }

    #[tokio::test]
    async fn run_consumes_queue_until_shutdown() {
        let mut h = Harness::new(PermissionStatus::Granted, ScriptedPicker::default());
        h.viewer.start(None);
        h.handle.post(Task::Surface(SurfaceEvent::LoadComplete { page_count: 9 }));
        h.handle.post(Task::Shutdown);
        h.viewer.run(&mut h.queue).await;
        assert_eq!(h.viewer.session().state().page_count, 9);
        assert_eq!(h.viewer.session().epoch(), SearchEpoch::default().next());
    }
}
