use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Search state for one query execution.
///
/// `current_page` is `None` until the first match arrives and is always a member of
/// `match_pages` afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSession {
    pub active: bool,
    pub match_pages: BTreeSet<usize>,
    pub current_page: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigatorState {
    Idle,
    Searching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// First match of the session; the caller owes a jump to this page.
    FirstMatch(usize),
    Recorded,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    JumpTo(usize),
    NoMatches,
    Inactive,
}

/// One step of a circular walk over `ordered` (ascending, deduplicated).
///
/// A `current` that is absent from `ordered` sits before the first element when
/// walking forward and after the last when walking backward.
pub fn step_circular(
    ordered: &[usize],
    current: Option<usize>,
    direction: Direction,
) -> Option<usize> {
    step_circular_by(ordered, current, direction, 1)
}

/// Where `steps` consecutive [`step_circular`] calls would land, computed directly.
/// Zero steps count as one.
pub fn step_circular_by(
    ordered: &[usize],
    current: Option<usize>,
    direction: Direction,
    steps: usize,
) -> Option<usize> {
    let len = ordered.len();
    if len == 0 {
        return None;
    }
    let steps = steps.max(1);
    let wrapped = steps % len;
    let position = current.and_then(|page| ordered.binary_search(&page).ok());
    let index = match (direction, position) {
        (Direction::Next, Some(i)) => (i + wrapped) % len,
        (Direction::Next, None) => (steps - 1) % len,
        (Direction::Previous, Some(i)) => (i + len - wrapped) % len,
        (Direction::Previous, None) => len - 1 - (steps - 1) % len,
    };
    Some(ordered[index])
}

#[derive(Debug, Default)]
pub struct SearchNavigator {
    session: SearchSession,
    query: Option<String>,
}

impl SearchNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> NavigatorState {
        if self.session.active {
            NavigatorState::Searching
        } else {
            NavigatorState::Idle
        }
    }

    pub fn session(&self) -> &SearchSession {
        &self.session
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Starts a fresh session. Anything recorded for a previous query is discarded.
    pub fn begin(&mut self, query: impl Into<String>) {
        self.session = SearchSession {
            active: true,
            ..SearchSession::default()
        };
        self.query = Some(query.into());
    }

    pub fn close(&mut self) {
        self.session = SearchSession::default();
        self.query = None;
    }

    pub fn record_match(&mut self, page: usize) -> MatchOutcome {
        if !self.session.active {
            return MatchOutcome::Ignored;
        }
        let first = self.session.match_pages.is_empty();
        self.session.match_pages.insert(page);
        if first {
            self.session.current_page = Some(page);
            MatchOutcome::FirstMatch(page)
        } else {
            MatchOutcome::Recorded
        }
    }

    pub fn advance(&mut self, direction: Direction) -> Advance {
        self.advance_by(direction, 1)
    }

    /// Moves `count` matches at once; the walk wraps as often as needed.
    pub fn advance_by(&mut self, direction: Direction, count: usize) -> Advance {
        if !self.session.active {
            return Advance::Inactive;
        }
        let ordered: Vec<usize> = self.session.match_pages.iter().copied().collect();
        match step_circular_by(&ordered, self.session.current_page, direction, count) {
            Some(page) => {
                self.session.current_page = Some(page);
                Advance::JumpTo(page)
            }
            None => Advance::NoMatches,
        }
    }

    /// 0-based position of `current_page` among the matches, with the match count.
    pub fn position(&self) -> Option<(usize, usize)> {
        let current = self.session.current_page?;
        let index = self
            .session
            .match_pages
            .iter()
            .position(|&page| page == current)?;
        Some((index, self.session.match_pages.len()))
    }
}
