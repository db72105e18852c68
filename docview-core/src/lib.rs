//! Orchestration for a search-driven document viewer.
//!
//! Resolves which document to show, gates external documents behind the read
//! permission, drives a [`RenderingSurface`] and keeps the search navigation state
//! consistent with the asynchronous events the surface reports back. All state changes
//! go through one [`TaskQueue`] consumed by the [`Viewer`].

pub mod config;
pub mod descriptor;
pub mod navigator;
pub mod permission;
pub mod queue;
pub mod session;
pub mod surface;
pub mod viewer;

pub use config::{
    ConfigError, LayoutOptions, PermissionConfig, PermissionPolicy, PickerConfig, ViewerConfig,
    DEFAULT_BUNDLED_DOCUMENT,
};
pub use descriptor::{
    DocumentDescriptor, DocumentId, DocumentResolver, ExternalRef, FileNameProvider,
    MetadataCursor, MetadataProvider, DISPLAY_NAME,
};
pub use navigator::{
    step_circular, step_circular_by, Advance, Direction, MatchOutcome, NavigatorState,
    SearchNavigator, SearchSession,
};
pub use permission::{
    GateDecision, Permission, PermissionGate, PermissionStatus, PermissionSubsystem, RequestCode,
};
pub use queue::{task_queue, ActivityOutcome, Deferred, QueueHandle, Task, TaskQueue};
pub use session::{DocumentSession, ViewerState};
pub use surface::{
    Bookmark, DocumentMetadata, DocumentSource, OpenRequest, RenderingSurface, SearchEpoch,
    SurfaceError, SurfaceEvent,
};
pub use viewer::{
    Command, FilePicker, Flow, GatedAction, Notice, PickerError, Presenter, Viewer, ViewerParts,
    PDF_MIME_TYPE,
};
