//! Evaluating a compiled policy against the live system and assembling the
//! job report sent back in a REPORT PDU (spec §4.1, §4.3).
//!
//! Agent-side resource evaluation is strictly sequential, in topological
//! order (spec §5): no per-resource parallelism, no suspension between
//! resources except inside adapter/template calls `stat`/`remediate`
//! themselves make.

use std::time::{SystemTime, UNIX_EPOCH};

use concord_api::{Action, JobReport, Outcome, ResourceReport};
use concord_cfg::Policy;
use concord_resources::LiveView;

fn now() -> (u32, u32) {
    let d = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    (d.as_secs() as u32, d.subsec_micros())
}

/// Run every resource in `policy` (already topologically sorted) against
/// `live`, in order, returning the accumulated job report.
pub fn run_policy(mut policy: Policy, live: &mut dyn LiveView) -> JobReport {
    let (start_sec, start_usec) = now();
    let mut resources = Vec::with_capacity(policy.resources.len());

    for record in &mut policy.resources {
        let type_tag = record.type_tag().to_string();
        let key = record.key().to_string();

        let action = match record.stat(live) {
            Err(e) => Action { description: format!("stat failed: {e}"), outcome: Outcome::Fail },
            Ok(()) if record.difference() == 0 => {
                Action { description: "already matches the desired state".to_string(), outcome: Outcome::Ok }
            }
            Ok(()) => match record.remediate(live) {
                Ok(()) => Action { description: "remediated to the desired state".to_string(), outcome: Outcome::Fixed },
                Err(e) => Action { description: format!("remediation failed: {e}"), outcome: Outcome::Fail },
            },
        };

        resources.push(ResourceReport { type_tag, key, actions: vec![action] });
    }

    let (end_sec, end_usec) = now();
    JobReport { start_sec, start_usec, end_sec, end_usec, resources }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_cfg::Policy;
    use concord_resources::{MemoryView, Resource, ResourceRecord, User};

    #[test]
    fn a_matching_resource_reports_ok() {
        let mut policy = Policy::new("p");
        policy.resources.push(ResourceRecord::User(User::new("alice")));
        let mut live = MemoryView::new();
        let report = run_policy(policy, &mut live);
        assert_eq!(report.resources.len(), 1);
        assert_eq!(report.resources[0].actions[0].outcome, Outcome::Fixed);
    }

    #[test]
    fn duration_is_never_negative() {
        let policy = Policy::new("empty");
        let mut live = MemoryView::new();
        let report = run_policy(policy, &mut live);
        assert!(report.resources.is_empty());
        let _ = report.duration_usec();
    }
}
