use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LayoutOptions;
use crate::descriptor::ExternalRef;

/// Identifies one query execution. Every `search`, `close_search` and document open
/// moves to a fresh epoch so late match events can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SearchEpoch(u64);

impl SearchEpoch {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SearchEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Asset(String),
    External(ExternalRef),
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Asset(name) => write!(f, "asset:{name}"),
            DocumentSource::External(reference) => write!(f, "{reference}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub source: DocumentSource,
    pub layout: LayoutOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub mod_date: Option<String>,
}

/// One entry of the document outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub title: String,
    pub page_index: usize,
    pub children: Vec<Bookmark>,
}

impl Bookmark {
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Everything the rendering surface reports back. Delivered through the task queue,
/// never by calling into the viewer directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    LoadComplete {
        page_count: usize,
    },
    LoadFailed {
        cause: String,
    },
    PageChanged {
        page: usize,
        page_count: usize,
    },
    PageError {
        page: usize,
        cause: String,
    },
    /// At most one per page per query, in increasing page order.
    SearchMatch {
        epoch: SearchEpoch,
        page: usize,
        text: String,
    },
    SelectionChanged {
        has_selection: bool,
    },
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("document source {0} is not supported")]
    UnsupportedSource(String),
    #[error("document {0} could not be found")]
    NotFound(String),
    #[error("no document is loaded")]
    NotLoaded,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// The rendering engine as seen by the document session.
///
/// `open`, `jump_to` and `search` are requests: their effects are observed later
/// through [`SurfaceEvent`]s. `open` only returns an error when the request cannot be
/// issued at all.
pub trait RenderingSurface: Send {
    fn open(&mut self, request: OpenRequest) -> Result<(), SurfaceError>;
    fn jump_to(&mut self, page: usize);
    fn search(&mut self, query: &str, epoch: SearchEpoch);
    fn close_search(&mut self);
    fn selection(&self) -> Option<String>;
    fn metadata(&self) -> Result<DocumentMetadata, SurfaceError>;
    fn outline(&self) -> Result<Vec<Bookmark>, SurfaceError>;
    fn set_scroll_handle_offset(&mut self, offset: u32);
}
