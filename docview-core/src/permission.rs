use std::collections::HashMap;
use std::fmt;

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ReadExternalStorage,
}

impl Permission {
    pub fn name(self) -> &'static str {
        match self {
            Permission::ReadExternalStorage => "read-external-storage",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Correlates an asynchronous request with the response that eventually answers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestCode(pub u32);

impl RequestCode {
    pub const PICK_DOCUMENT: RequestCode = RequestCode(8081);
    pub const READ_EXTERNAL_STORAGE: RequestCode = RequestCode(1_000_901);
    /// Read permission asked for on behalf of a direct `open`, parked apart from the
    /// picker so neither replaces the other.
    pub const OPEN_EXTERNAL: RequestCode = RequestCode(1_000_902);
}

impl fmt::Display for RequestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// The platform's permission service. `request` answers later with a
/// `Task::PermissionResult` carrying the same code.
pub trait PermissionSubsystem: Send {
    fn check(&self, permission: Permission) -> PermissionStatus;
    fn request(&mut self, permission: Permission, code: RequestCode);
}

#[derive(Debug, PartialEq, Eq)]
pub enum GateDecision<A> {
    /// Permission is already held; run the action now.
    Proceed(A),
    /// A request is in flight; the action is parked until it is answered.
    Deferred,
}

/// Parks actions that need a permission until the permission subsystem answers.
#[derive(Debug)]
pub struct PermissionGate<A> {
    pending: HashMap<RequestCode, A>,
}

impl<A> Default for PermissionGate<A> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }
}

impl<A: fmt::Debug> PermissionGate<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure(
        &mut self,
        subsystem: &mut dyn PermissionSubsystem,
        permission: Permission,
        code: RequestCode,
        action: A,
    ) -> GateDecision<A> {
        match subsystem.check(permission) {
            PermissionStatus::Granted => GateDecision::Proceed(action),
            PermissionStatus::Denied => {
                if let Some(replaced) = self.pending.insert(code, action) {
                    debug!(?replaced, %code, "superseded pending permission action");
                }
                subsystem.request(permission, code);
                GateDecision::Deferred
            }
        }
    }

    /// Returns the parked action when the response grants the permission. Denials and
    /// unknown codes yield nothing.
    pub fn resolve(&mut self, code: RequestCode, granted: bool) -> Option<A> {
        let Some(action) = self.pending.remove(&code) else {
            debug!(%code, "permission response without a pending action");
            return None;
        };
        if granted {
            Some(action)
        } else {
            debug!(%code, ?action, "permission denied, dropping action");
            None
        }
    }

    pub fn is_pending(&self, code: RequestCode) -> bool {
        self.pending.contains_key(&code)
    }
}
