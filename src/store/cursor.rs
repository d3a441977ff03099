/// Progress of a cursor-driven key scan.
///
/// The store uses `0` both as the first request cursor and as the
/// end-of-scan marker; keeping the two apart here means the loop always
/// issues the first request and stops right after the final page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanCursor {
    #[default]
    NotStarted,
    InProgress(u64),
    Done,
}

impl ScanCursor {
    /// Cursor to send with the next request, `None` once the scan is done.
    pub fn request(&self) -> Option<u64> {
        match self {
            Self::NotStarted => Some(0),
            Self::InProgress(token) => Some(*token),
            Self::Done => None,
        }
    }

    /// State after the store answered with `returned`.
    pub fn advance(self, returned: u64) -> Self {
        match (self, returned) {
            (Self::Done, _) | (_, 0) => Self::Done,
            (_, token) => Self::InProgress(token),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_uses_zero() {
        assert_eq!(ScanCursor::NotStarted.request(), Some(0));
    }

    #[test]
    fn test_zero_reply_finishes_scan() {
        let cursor = ScanCursor::NotStarted.advance(0);
        assert!(cursor.is_done());
        assert_eq!(cursor.request(), None);
    }

    #[test]
    fn test_progress_and_finish() {
        let cursor = ScanCursor::NotStarted.advance(17);
        assert_eq!(cursor, ScanCursor::InProgress(17));
        assert_eq!(cursor.request(), Some(17));

        let cursor = cursor.advance(0);
        assert_eq!(cursor, ScanCursor::Done);
    }

    #[test]
    fn test_done_is_terminal() {
        assert_eq!(ScanCursor::Done.advance(5), ScanCursor::Done);
    }
}
