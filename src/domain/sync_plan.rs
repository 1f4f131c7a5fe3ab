//! Decides which provider operation a task/link edit requires.
//!
//! The whole contract is the ordered table in [`plan_operation`]: one
//! struct-pattern `match`, first arm wins. Reordering arms changes behavior.

use serde::Serialize;

/// Provider-side operation required to keep the external calendar consistent
/// with the edited task/link pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarOp {
    Create,
    Update,
    Delete,
    /// Delete then recreate. Used when the provider may have already purged
    /// an expired event, so an in-place update cannot be trusted.
    Replace,
    None,
}

/// The boolean facts the operation decision is a pure function of.
///
/// `delete_on_claim`/`delete_on_expiry` are the values requested by the
/// current edit; the `previous_*` fields are the link's stored values, kept
/// so policy toggles can be detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncFacts {
    pub add_to_calendar: bool,
    pub reactivate: bool,
    pub is_expired_now: bool,
    pub was_expired_by_status: bool,
    pub had_event: bool,
    pub delete_on_claim: bool,
    pub delete_on_expiry: bool,
    pub previous_delete_on_claim: bool,
    pub previous_delete_on_expiry: bool,
    pub was_claimed: bool,
}

pub fn plan_operation(facts: &SyncFacts) -> CalendarOp {
    use CalendarOp::*;

    match *facts {
        // Integration switched off: tear down whatever exists.
        SyncFacts { add_to_calendar: false, had_event: true, .. } => Delete,
        SyncFacts { add_to_calendar: false, .. } => None,
        // Reactivation wins over every rule below.
        SyncFacts { reactivate: true, had_event: false, .. } => Create,
        SyncFacts { reactivate: true, .. } => Update,
        // Claim/expiry deletion policies.
        SyncFacts { was_claimed: true, delete_on_claim: true, had_event: true, .. } => Delete,
        SyncFacts { is_expired_now: true, delete_on_expiry: true, had_event: true, .. } => Delete,
        // Policy toggled off after a claim-triggered delete.
        SyncFacts {
            was_claimed: true,
            delete_on_claim: false,
            previous_delete_on_claim: true,
            had_event: false,
            ..
        } => Create,
        // Link recorded as expired but the new window is live again; the
        // provider may have purged the old event, so rebuild it.
        SyncFacts { was_expired_by_status: true, is_expired_now: false, had_event: true, .. } => {
            Replace
        }
        SyncFacts { was_expired_by_status: true, is_expired_now: false, had_event: false, .. } => {
            Create
        }
        // Policy toggled off after an expiry-triggered delete.
        SyncFacts {
            is_expired_now: true,
            delete_on_expiry: false,
            previous_delete_on_expiry: true,
            had_event: false,
            ..
        } => Create,
        // Live window: keep the event in step.
        SyncFacts { is_expired_now: false, had_event: true, .. } => Update,
        SyncFacts { is_expired_now: false, had_event: false, .. } => Create,
        // Expired but retention requested: keep the event visible.
        SyncFacts { is_expired_now: true, delete_on_expiry: false, had_event: true, .. } => Update,
        SyncFacts { is_expired_now: true, delete_on_expiry: false, had_event: false, .. } => Create,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts_from_bits(bits: u16) -> SyncFacts {
        SyncFacts {
            add_to_calendar: bits & 0b00000_00001 != 0,
            reactivate: bits & 0b00000_00010 != 0,
            is_expired_now: bits & 0b00000_00100 != 0,
            was_expired_by_status: bits & 0b00000_01000 != 0,
            had_event: bits & 0b00000_10000 != 0,
            delete_on_claim: bits & 0b00001_00000 != 0,
            delete_on_expiry: bits & 0b00010_00000 != 0,
            previous_delete_on_claim: bits & 0b00100_00000 != 0,
            previous_delete_on_expiry: bits & 0b01000_00000 != 0,
            was_claimed: bits & 0b10000_00000 != 0,
        }
    }

    fn live_update_facts() -> SyncFacts {
        SyncFacts {
            add_to_calendar: true,
            reactivate: false,
            is_expired_now: false,
            was_expired_by_status: false,
            had_event: true,
            delete_on_claim: false,
            delete_on_expiry: false,
            previous_delete_on_claim: false,
            previous_delete_on_expiry: false,
            was_claimed: false,
        }
    }

    #[test]
    fn live_link_with_event_updates() {
        assert_eq!(plan_operation(&live_update_facts()), CalendarOp::Update);
    }

    #[test]
    fn claim_delete_policy_wins_regardless_of_expiry() {
        for is_expired_now in [false, true] {
            let facts = SyncFacts {
                was_claimed: true,
                delete_on_claim: true,
                had_event: true,
                is_expired_now,
                ..live_update_facts()
            };
            assert_eq!(plan_operation(&facts), CalendarOp::Delete);
        }
    }

    #[test]
    fn integration_off_deletes_or_noops() {
        let with_event = SyncFacts { add_to_calendar: false, ..live_update_facts() };
        assert_eq!(plan_operation(&with_event), CalendarOp::Delete);

        let without_event = SyncFacts { had_event: false, ..with_event };
        assert_eq!(plan_operation(&without_event), CalendarOp::None);
    }

    #[test]
    fn reactivation_overrides_claim_policy() {
        let facts = SyncFacts {
            reactivate: true,
            was_claimed: true,
            delete_on_claim: true,
            ..live_update_facts()
        };
        assert_eq!(plan_operation(&facts), CalendarOp::Update);

        let without_event = SyncFacts { had_event: false, ..facts };
        assert_eq!(plan_operation(&without_event), CalendarOp::Create);
    }

    #[test]
    fn claim_policy_toggle_recreates_event() {
        let facts = SyncFacts {
            was_claimed: true,
            delete_on_claim: false,
            previous_delete_on_claim: true,
            had_event: false,
            ..live_update_facts()
        };
        assert_eq!(plan_operation(&facts), CalendarOp::Create);
    }

    #[test]
    fn expired_status_with_live_window_replaces() {
        let facts = SyncFacts { was_expired_by_status: true, ..live_update_facts() };
        assert_eq!(plan_operation(&facts), CalendarOp::Replace);

        let without_event = SyncFacts { had_event: false, ..facts };
        assert_eq!(plan_operation(&without_event), CalendarOp::Create);
    }

    #[test]
    fn expired_retention_keeps_event_in_step() {
        let facts = SyncFacts { is_expired_now: true, ..live_update_facts() };
        assert_eq!(plan_operation(&facts), CalendarOp::Update);

        let without_event = SyncFacts { had_event: false, ..facts };
        assert_eq!(plan_operation(&without_event), CalendarOp::Create);
    }

    #[test]
    fn expiry_delete_policy_without_event_is_noop() {
        let facts = SyncFacts {
            is_expired_now: true,
            delete_on_expiry: true,
            had_event: false,
            ..live_update_facts()
        };
        assert_eq!(plan_operation(&facts), CalendarOp::None);
    }

    /// Structural invariants that must hold for every one of the 1024 fact
    /// combinations, independent of arm order.
    #[test]
    fn exhaustive_table_invariants() {
        for bits in 0u16..1024 {
            let facts = facts_from_bits(bits);
            let op = plan_operation(&facts);

            if !facts.add_to_calendar {
                assert!(
                    matches!(op, CalendarOp::Delete | CalendarOp::None),
                    "integration off must never create or update: {facts:?} -> {op:?}"
                );
            }
            match op {
                CalendarOp::Create => assert!(
                    !facts.had_event,
                    "create requires no existing event: {facts:?}"
                ),
                CalendarOp::Update | CalendarOp::Replace | CalendarOp::Delete => assert!(
                    facts.had_event,
                    "{op:?} requires an existing event: {facts:?}"
                ),
                CalendarOp::None => {}
            }
            if facts.add_to_calendar && facts.reactivate {
                let expected = if facts.had_event { CalendarOp::Update } else { CalendarOp::Create };
                assert_eq!(op, expected, "reactivation wins: {facts:?}");
            }
        }
    }
}
