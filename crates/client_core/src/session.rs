//! Local division bookkeeping and reply ordering.

/// Division sequence the operator is stepping through.
///
/// `current_division` is `0` (no active sequence) or within
/// `1..=total_divisions`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionState {
    current_division: u32,
    total_divisions: u32,
    angle_per_division: f64,
}

impl SessionState {
    pub fn current_division(&self) -> u32 {
        self.current_division
    }

    pub fn total_divisions(&self) -> u32 {
        self.total_divisions
    }

    pub fn angle_per_division(&self) -> f64 {
        self.angle_per_division
    }

    pub fn is_divided(&self) -> bool {
        self.total_divisions > 0
    }

    /// Starts a new sequence positioned on the first division.
    pub fn start(&mut self, divisions: u32, angle_per_division: f64) {
        self.total_divisions = divisions;
        self.current_division = if divisions > 0 { 1 } else { 0 };
        self.angle_per_division = angle_per_division;
    }

    /// Steps to the next division, wrapping from `total` back to `1`.
    pub fn advance(&mut self) -> u32 {
        if self.total_divisions == 0 {
            return 0;
        }
        self.current_division = (self.current_division % self.total_divisions) + 1;
        self.current_division
    }

    /// Drops the position in the sequence. The division layout is kept.
    pub fn rewind(&mut self) {
        self.current_division = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Monotonic ticketing so a reply to an older request never overwrites the
/// effect of a newer one.
#[derive(Debug, Default)]
pub struct SequenceGuard {
    issued: u64,
    applied: u64,
}

impl SequenceGuard {
    pub fn issue(&mut self) -> Ticket {
        self.issued += 1;
        Ticket(self.issued)
    }

    /// Returns whether a reply carrying `ticket` may be applied, recording it
    /// as the latest applied one if so.
    pub fn admit(&mut self, ticket: Ticket) -> bool {
        if ticket.0 < self.applied {
            return false;
        }
        self.applied = ticket.0;
        true
    }

    /// Whether nothing newer than `ticket` has been admitted yet. Unlike
    /// [`SequenceGuard::admit`] this records nothing, so several tickets can
    /// pass against the same admitted one.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 >= self.applied
    }

    /// Marks every ticket issued so far as stale.
    pub fn supersede_outstanding(&mut self) {
        self.applied = self.issued + 1;
        self.issued = self.applied;
    }
}
