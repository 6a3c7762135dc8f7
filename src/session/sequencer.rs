use std::collections::BTreeMap;

/// Reorders results of concurrent transcription jobs.
///
/// Each utterance takes a ticket from [`issue`](Self::issue) when it is
/// handed off; results come back in any order through
/// [`complete`](Self::complete), which releases them strictly in ticket
/// order.  A job that fails must still complete its ticket, otherwise every
/// later result stays parked.
#[derive(Debug)]
pub struct TranscriptSequencer<T> {
    next_ticket: u64,
    next_release: u64,
    parked: BTreeMap<u64, T>,
}

impl<T> Default for TranscriptSequencer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TranscriptSequencer<T> {
    pub fn new() -> Self {
        Self {
            next_ticket: 0,
            next_release: 0,
            parked: BTreeMap::new(),
        }
    }

    pub fn issue(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    /// Record the result for `ticket` and return every result that is now
    /// releasable, in order.
    pub fn complete(&mut self, ticket: u64, value: T) -> Vec<T> {
        if ticket < self.next_release {
            log::warn!("sequencer: ticket {ticket} completed twice; ignoring");
            return Vec::new();
        }
        self.parked.insert(ticket, value);

        let mut ready = Vec::new();
        while let Some(value) = self.parked.remove(&self.next_release) {
            ready.push(value);
            self.next_release += 1;
        }
        ready
    }

    /// Tickets issued but not yet released.
    pub fn outstanding(&self) -> u64 {
        self.next_ticket - self.next_release
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_completion_releases_immediately() {
        let mut seq = TranscriptSequencer::new();
        let a = seq.issue();
        let b = seq.issue();
        assert_eq!(seq.complete(a, "a"), vec!["a"]);
        assert_eq!(seq.complete(b, "b"), vec!["b"]);
        assert_eq!(seq.outstanding(), 0);
    }

    #[test]
    fn late_first_result_holds_back_later_ones() {
        let mut seq = TranscriptSequencer::new();
        let a = seq.issue();
        let b = seq.issue();
        let c = seq.issue();
        assert!(seq.complete(c, "c").is_empty());
        assert!(seq.complete(b, "b").is_empty());
        assert_eq!(seq.outstanding(), 3);
        assert_eq!(seq.complete(a, "a"), vec!["a", "b", "c"]);
        assert_eq!(seq.outstanding(), 0);
    }

    #[test]
    fn duplicate_completion_is_ignored() {
        let mut seq = TranscriptSequencer::new();
        let a = seq.issue();
        assert_eq!(seq.complete(a, 1), vec![1]);
        assert!(seq.complete(a, 2).is_empty());
    }
}
