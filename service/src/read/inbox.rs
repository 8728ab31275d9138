//! [`Inbox`] read model definition.

use std::cmp::Reverse;

#[cfg(doc)]
use crate::domain::User;
use crate::domain::Record;

/// [`Record`]s addressed to a single [`User`], split by their read state.
#[derive(Clone, Debug, Default)]
pub struct Inbox {
    /// [`Record`]s not read yet, most recent first.
    pub unread: Vec<Record>,

    /// Already read [`Record`]s, most recent first.
    pub read: Vec<Record>,
}

impl Inbox {
    /// Assembles an [`Inbox`] out of the provided [`Record`]s.
    #[must_use]
    pub fn new(mut records: Vec<Record>) -> Self {
        records.sort_by_key(|r| Reverse(r.created_at));
        let (unread, read) = records.into_iter().partition(|r| r.is_new);
        Self { unread, read }
    }

    /// Returns the number of unread [`Record`]s.
    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.unread.len()
    }
}

#[cfg(test)]
mod spec {
    use common::DateTime;

    use crate::domain::order::record::{spec::record, Kind, Transition};

    use super::Inbox;

    #[test]
    fn splits_and_sorts_records() {
        let mut older = record(Kind::Like, Transition::Liked);
        older.created_at =
            DateTime::from_rfc3339("2024-05-01T10:00:00Z").unwrap().coerce();
        let mut newer = record(Kind::Comment, Transition::Commented);
        newer.created_at =
            DateTime::from_rfc3339("2024-05-02T10:00:00Z").unwrap().coerce();
        let mut read = record(Kind::Rent, Transition::Requested);
        read.is_new = false;

        let inbox = Inbox::new(vec![older.clone(), read.clone(), newer.clone()]);

        assert_eq!(inbox.unread_count(), 2);
        assert_eq!(inbox.unread[0].id, newer.id);
        assert_eq!(inbox.unread[1].id, older.id);
        assert_eq!(inbox.read[0].id, read.id);
    }
}
