//! Set reconciliation of incoming candidates against a seller's persisted catalog.
//!
//! Pure functions only: the caller fetches the existing offer ids and decides
//! what to do with the resulting sets.

use std::borrow::Cow;

use offerbook_core::OfferId;

use crate::product::{CandidateUpdate, ProductRecord};
use crate::row_error::RowError;

/// What a single candidate turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Update,
    Delete,
}

/// Disjoint (by offer id) write sets for one seller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationSets {
    pub to_add: Vec<ProductRecord>,
    pub to_update: Vec<ProductRecord>,
    pub to_delete: Vec<ProductRecord>,
}

impl ReconciliationSets {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Records that end up in the upsert statement (adds first, then updates).
    pub fn upserts(&self) -> impl Iterator<Item = &ProductRecord> {
        self.to_add.iter().chain(self.to_update.iter())
    }

    pub fn delete_ids(&self) -> Vec<OfferId> {
        self.to_delete.iter().map(|r| r.offer_id).collect()
    }
}

/// Output of [`reconcile`]: the write sets plus the records validation dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub sets: ReconciliationSets,
    pub errors: Vec<RowError>,
}

/// Membership test over an ascending, duplicate-free id slice.
pub fn contains(sorted_ids: &[OfferId], id: OfferId) -> bool {
    sorted_ids.binary_search(&id).is_ok()
}

/// Classify one candidate against the sorted set of existing offer ids.
pub fn classify(sorted_existing: &[OfferId], candidate: &CandidateUpdate) -> Operation {
    if !candidate.available {
        Operation::Delete
    } else if contains(sorted_existing, candidate.offer_id()) {
        Operation::Update
    } else {
        Operation::Add
    }
}

/// Partition `candidates` into add/update/delete sets and validate the writes.
///
/// Delete requests are never validated: a seller may always remove an offer.
/// Validation errors are reported for the add set first, then the update set,
/// each in input order.
pub fn reconcile(existing: &[OfferId], candidates: Vec<CandidateUpdate>) -> Reconciliation {
    let existing = sorted_unique(existing);

    let mut adds = Vec::new();
    let mut updates = Vec::new();
    let mut to_delete = Vec::new();
    for candidate in candidates {
        match classify(&existing, &candidate) {
            Operation::Add => adds.push(candidate),
            Operation::Update => updates.push(candidate),
            Operation::Delete => to_delete.push(candidate.record),
        }
    }

    let mut errors = Vec::new();
    let to_add = keep_valid(adds, &mut errors);
    let to_update = keep_valid(updates, &mut errors);

    Reconciliation {
        sets: ReconciliationSets {
            to_add,
            to_update,
            to_delete,
        },
        errors,
    }
}

fn sorted_unique(ids: &[OfferId]) -> Cow<'_, [OfferId]> {
    if ids.windows(2).all(|w| w[0] < w[1]) {
        return Cow::Borrowed(ids);
    }
    let mut owned = ids.to_vec();
    owned.sort_unstable();
    owned.dedup();
    Cow::Owned(owned)
}

fn keep_valid(candidates: Vec<CandidateUpdate>, errors: &mut Vec<RowError>) -> Vec<ProductRecord> {
    let mut valid = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match candidate.record.validate() {
            Ok(()) => valid.push(candidate.record),
            Err(e) => errors.push(RowError::from_domain(candidate.row, e)),
        }
    }
    valid
}
