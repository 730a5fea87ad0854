//! Operator authorization seam
//!
//! Identity comes from the session subsystem; this only answers whether an
//! operator may act on an event.

use std::collections::HashSet;

use raffle_core::{EventId, OperatorId};

pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, operator: &OperatorId, event_id: &EventId) -> bool;
}

/// Every operator may act on every event
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn is_authorized(&self, _operator: &OperatorId, _event_id: &EventId) -> bool {
        true
    }
}

/// Fixed set of operators, valid for every event
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    operators: HashSet<OperatorId>,
}

impl AllowList {
    pub fn new(operators: impl IntoIterator<Item = OperatorId>) -> Self {
        Self {
            operators: operators.into_iter().collect(),
        }
    }
}

impl Authorizer for AllowList {
    fn is_authorized(&self, operator: &OperatorId, _event_id: &EventId) -> bool {
        self.operators.contains(operator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list() {
        let list = AllowList::new([OperatorId::new("alice")]);
        let event = EventId::new("e1");
        assert!(list.is_authorized(&OperatorId::new("alice"), &event));
        assert!(!list.is_authorized(&OperatorId::new("mallory"), &event));
        assert!(AllowAll.is_authorized(&OperatorId::new("mallory"), &event));
    }
}
