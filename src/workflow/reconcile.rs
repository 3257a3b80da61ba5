use crate::models::access_request::RequestStatus;
use crate::models::validation::{ValidationRecord, ValidationStatus};

/// Derives the request status from its validation records.
///
/// - no records: pending
/// - any rejected: rejected
/// - all approved: approved
/// - some approved, some pending: validating
/// - all pending: pending
pub fn reconcile(records: &[ValidationRecord]) -> RequestStatus {
    reconcile_statuses(records.iter().map(|record| record.status))
}

pub fn reconcile_statuses(statuses: impl IntoIterator<Item = ValidationStatus>) -> RequestStatus {
    let mut approved = 0usize;
    let mut pending = 0usize;

    for status in statuses {
        match status {
            ValidationStatus::Rejected => return RequestStatus::Rejected,
            ValidationStatus::Approved => approved += 1,
            ValidationStatus::Pending => pending += 1,
        }
    }

    match (approved, pending) {
        (0, _) => RequestStatus::Pending,
        (_, 0) => RequestStatus::Approved,
        _ => RequestStatus::Validating,
    }
}

/// Status to store after a mutation. Finalization is never undone by
/// reconciliation.
pub fn next_status(current: RequestStatus, statuses: impl IntoIterator<Item = ValidationStatus>) -> RequestStatus {
    if current == RequestStatus::Finalized {
        return current;
    }
    reconcile_statuses(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ValidationStatus::{Approved, Pending, Rejected};

    const ALL: [ValidationStatus; 3] = [Pending, Approved, Rejected];

    /// Every status sequence of the given length.
    fn sequences(len: usize) -> Vec<Vec<ValidationStatus>> {
        (0..len).fold(vec![Vec::new()], |acc, _| {
            acc.into_iter()
                .flat_map(|prefix| {
                    ALL.into_iter().map(move |status| {
                        let mut next = prefix.clone();
                        next.push(status);
                        next
                    })
                })
                .collect()
        })
    }

    #[test]
    fn empty_set_is_pending() {
        assert_eq!(reconcile(&[]), RequestStatus::Pending);
    }

    #[test]
    fn any_rejection_rejects_the_request() {
        for len in 1..=4 {
            for seq in sequences(len).into_iter().filter(|s| s.contains(&Rejected)) {
                assert_eq!(reconcile_statuses(seq.clone()), RequestStatus::Rejected, "{seq:?}");
            }
        }
    }

    #[test]
    fn all_approved_approves() {
        for len in 1..=5 {
            assert_eq!(reconcile_statuses(vec![Approved; len]), RequestStatus::Approved);
        }
    }

    #[test]
    fn partial_progress_is_validating() {
        for len in 2..=4 {
            for seq in sequences(len) {
                let mixed = seq.contains(&Approved) && seq.contains(&Pending) && !seq.contains(&Rejected);
                if mixed {
                    assert_eq!(reconcile_statuses(seq.clone()), RequestStatus::Validating, "{seq:?}");
                }
            }
        }
    }

    #[test]
    fn untouched_records_stay_pending() {
        assert_eq!(reconcile_statuses(vec![Pending; 3]), RequestStatus::Pending);
    }

    #[test]
    fn reconciliation_is_order_independent_and_idempotent() {
        for seq in sequences(3) {
            let mut reversed = seq.clone();
            reversed.reverse();
            let first = reconcile_statuses(seq.clone());
            assert_eq!(first, reconcile_statuses(seq.clone()));
            assert_eq!(first, reconcile_statuses(reversed));
        }
    }

    #[test]
    fn finalized_requests_keep_their_status() {
        assert_eq!(next_status(RequestStatus::Finalized, [Approved, Pending]), RequestStatus::Finalized);
        assert_eq!(next_status(RequestStatus::Pending, [Approved, Pending]), RequestStatus::Validating);
    }
}
