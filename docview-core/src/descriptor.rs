use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::surface::DocumentSource;

pub type DocumentId = Uuid;

static DOCUMENT_NAMESPACE: Lazy<Uuid> = Lazy::new(|| {
    Uuid::parse_str("3f0d6a52-8c41-5e07-9b2e-1d74c6a0e913").expect("valid namespace UUID")
});

/// Column queried from a [`MetadataProvider`] to obtain a human-readable name.
pub const DISPLAY_NAME: &str = "_display_name";

/// Opaque reference to a document outside the bundled assets.
///
/// Anything that parses as an absolute URL is kept as-is (`content://`, `file://`,
/// `https://`). Everything else is treated as a filesystem path and turned into a
/// `file://` URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalRef {
    url: Url,
}

impl ExternalRef {
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        match Url::parse(trimmed) {
            // Single-letter schemes are Windows drive letters, not URLs.
            Ok(url) if url.scheme().len() > 1 => Some(Self { url }),
            _ => Self::from_path(Path::new(trimmed)),
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let resolved = path
            .canonicalize()
            .or_else(|_| {
                if path.is_absolute() {
                    Ok(path.to_path_buf())
                } else {
                    std::env::current_dir().map(|cwd| cwd.join(path))
                }
            })
            .unwrap_or_else(|_| path.to_path_buf());
        Url::from_file_path(&resolved).ok().map(|url| Self { url })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.url.scheme() != "file" {
            return None;
        }
        self.url.to_file_path().ok()
    }

    /// Last non-empty path component, percent-decoded.
    pub fn last_path_segment(&self) -> Option<String> {
        let segment = match self.url.path_segments() {
            Some(segments) => segments.filter(|s| !s.is_empty()).last()?.to_owned(),
            None => self
                .url
                .path()
                .rsplit('/')
                .find(|s| !s.is_empty())?
                .to_owned(),
        };
        let decoded = match urlencoding::decode(&segment) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => segment.clone(),
        };
        Some(decoded)
    }
}

impl fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentDescriptor {
    Bundled {
        name: String,
    },
    External {
        reference: ExternalRef,
        display_name: String,
    },
}

impl DocumentDescriptor {
    pub fn id(&self) -> DocumentId {
        let key = match self {
            DocumentDescriptor::Bundled { name } => format!("asset:{name}"),
            DocumentDescriptor::External { reference, .. } => reference.as_str().to_owned(),
        };
        Uuid::new_v5(&DOCUMENT_NAMESPACE, key.as_bytes())
    }

    pub fn display_name(&self) -> &str {
        match self {
            DocumentDescriptor::Bundled { name } => name,
            DocumentDescriptor::External { display_name, .. } => display_name,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, DocumentDescriptor::External { .. })
    }

    pub fn source(&self) -> DocumentSource {
        match self {
            DocumentDescriptor::Bundled { name } => DocumentSource::Asset(name.clone()),
            DocumentDescriptor::External { reference, .. } => {
                DocumentSource::External(reference.clone())
            }
        }
    }
}

/// A row returned by a metadata query. Dropping the cursor releases whatever
/// handle the provider acquired for it.
pub trait MetadataCursor {
    fn string(&self, column: &str) -> Result<Option<String>>;
}

pub trait MetadataProvider: Send + Sync {
    /// `Ok(None)` means the provider has nothing for this reference.
    fn query<'a>(
        &'a self,
        reference: &ExternalRef,
    ) -> Result<Option<Box<dyn MetadataCursor + 'a>>>;
}

pub struct DocumentResolver {
    bundled_name: String,
    provider: Option<Arc<dyn MetadataProvider>>,
}

impl DocumentResolver {
    pub fn new(bundled_name: impl Into<String>) -> Self {
        Self {
            bundled_name: bundled_name.into(),
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn bundled_name(&self) -> &str {
        &self.bundled_name
    }

    pub fn resolve(&self, reference: Option<ExternalRef>) -> DocumentDescriptor {
        match reference {
            Some(reference) => {
                let display_name = self.display_name(&reference);
                DocumentDescriptor::External {
                    reference,
                    display_name,
                }
            }
            None => DocumentDescriptor::Bundled {
                name: self.bundled_name.clone(),
            },
        }
    }

    fn display_name(&self, reference: &ExternalRef) -> String {
        match self.query_display_name(reference) {
            Ok(Some(name)) if !name.trim().is_empty() => return name,
            Ok(_) => {}
            Err(err) => {
                debug!(?err, reference = %reference, "display name lookup failed");
            }
        }
        reference
            .last_path_segment()
            .unwrap_or_else(|| reference.as_str().to_owned())
    }

    fn query_display_name(&self, reference: &ExternalRef) -> Result<Option<String>> {
        let Some(provider) = self.provider.as_ref() else {
            return Ok(None);
        };
        let Some(cursor) = provider.query(reference)? else {
            return Ok(None);
        };
        cursor.string(DISPLAY_NAME)
    }
}

/// Names local files by their file name. Other schemes are left to the resolver's
/// last-segment fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileNameProvider;

struct FileNameCursor {
    name: Option<String>,
}

impl MetadataCursor for FileNameCursor {
    fn string(&self, column: &str) -> Result<Option<String>> {
        if column == DISPLAY_NAME {
            Ok(self.name.clone())
        } else {
            Ok(None)
        }
    }
}

impl MetadataProvider for FileNameProvider {
    fn query<'a>(
        &'a self,
        reference: &ExternalRef,
    ) -> Result<Option<Box<dyn MetadataCursor + 'a>>> {
        let Some(path) = reference.to_file_path() else {
            return Ok(None);
        };
        let metadata = fs::metadata(&path)
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if !metadata.is_file() {
            return Ok(None);
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(Some(Box::new(FileNameCursor { name })))
    }
}
