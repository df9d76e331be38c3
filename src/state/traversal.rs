/// Traversal state definitions
///
/// A traversal walks one paginated listing (a board or the member list)
/// page by page. These types name where a traversal is and how it ended.
use std::fmt;

/// Where a paginated traversal currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalState {
    // ===== Active States =====
    /// Accumulator initialized, current page is the listing's root path
    Start,

    /// Waiting for the fetcher
    FetchingPage,

    /// Running the extractor over the fetched page
    Extracting,

    /// A next-page link was found
    MorePages,

    /// The page had no next-page link
    Done,

    // ===== Terminal State =====
    /// Records and status have been emitted
    Finished,
}

impl TraversalState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Whether the state machine may move from `self` to `next`
    ///
    /// Any active state may jump to `Finished` (fetch failure, structural
    /// error, ceiling or cancellation).
    pub fn can_transition_to(&self, next: Self) -> bool {
        use TraversalState::*;
        matches!(
            (self, next),
            (Start, FetchingPage)
                | (FetchingPage, Extracting)
                | (Extracting, MorePages)
                | (Extracting, Done)
                | (MorePages, FetchingPage)
                | (Done, Finished)
        ) || (!self.is_terminal() && next == Finished)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::FetchingPage => "fetching_page",
            Self::Extracting => "extracting",
            Self::MorePages => "more_pages",
            Self::Done => "done",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for TraversalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a traversal unit ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalStatus {
    /// Every page was fetched and extracted
    Complete,

    /// A page failed to fetch or extract; records of earlier pages are kept
    Partial,

    /// The page ceiling was hit before the last page
    Truncated,

    /// The run was cancelled while this unit was in progress
    Cancelled,
}

impl TraversalStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Truncated => "truncated",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "complete" => Some(Self::Complete),
            "partial" => Some(Self::Partial),
            "truncated" => Some(Self::Truncated),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn all_statuses() -> [Self; 4] {
        [
            Self::Complete,
            Self::Partial,
            Self::Truncated,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for TraversalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// The kind of unit a traversal record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalKind {
    Board,
    MemberList,
    Thread,
    Profile,
}

impl TraversalKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Board => "board",
            Self::MemberList => "member_list",
            Self::Thread => "thread",
            Self::Profile => "profile",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "board" => Some(Self::Board),
            "member_list" => Some(Self::MemberList),
            "thread" => Some(Self::Thread),
            "profile" => Some(Self::Profile),
            _ => None,
        }
    }
}

impl fmt::Display for TraversalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use TraversalState::*;
        let path = [
            Start,
            FetchingPage,
            Extracting,
            MorePages,
            FetchingPage,
            Extracting,
            Done,
            Finished,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_early_finish_from_active_states() {
        use TraversalState::*;
        for state in [Start, FetchingPage, Extracting, MorePages, Done] {
            assert!(state.can_transition_to(Finished));
        }
        assert!(!Finished.can_transition_to(Finished));
        assert!(!Finished.can_transition_to(Start));
    }

    #[test]
    fn test_invalid_transitions() {
        use TraversalState::*;
        assert!(!Start.can_transition_to(Extracting));
        assert!(!Done.can_transition_to(FetchingPage));
        assert!(!MorePages.can_transition_to(Extracting));
    }

    #[test]
    fn test_status_roundtrip_db_string() {
        for status in TraversalStatus::all_statuses() {
            assert_eq!(
                TraversalStatus::from_db_string(status.to_db_string()),
                Some(status),
                "Failed roundtrip for {:?}",
                status
            );
        }
        assert_eq!(TraversalStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_kind_db_strings() {
        assert_eq!(TraversalKind::MemberList.to_db_string(), "member_list");
        assert_eq!(
            TraversalKind::from_db_string("profile"),
            Some(TraversalKind::Profile)
        );
        assert_eq!(TraversalKind::from_db_string("page"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", TraversalState::FetchingPage), "fetching_page");
        assert_eq!(format!("{}", TraversalStatus::Truncated), "truncated");
    }
}
