//! Job and resource counters (spec's ambient stack per SPEC_FULL §0),
//! mirroring the teacher's `metrics.rs` shape and scoped down from its
//! per-zone gauges to the job/resource counters this daemon actually has.

use std::fmt;

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

const PREFIX: &str = "concord";

#[derive(Debug)]
pub struct MetricsCollection {
    registry: Registry,
    pub jobs_total: Counter,
    pub jobs_failed_total: Counter,
    pub resources_evaluated_total: Counter,
    pub resources_failed_total: Counter,
}

impl MetricsCollection {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix(PREFIX);
        let jobs_total = Counter::default();
        let jobs_failed_total = Counter::default();
        let resources_evaluated_total = Counter::default();
        let resources_failed_total = Counter::default();

        registry.register("jobs", "Jobs accepted by the master", jobs_total.clone());
        registry.register("jobs_failed", "Jobs that ended in an ERROR PDU", jobs_failed_total.clone());
        registry.register("resources_evaluated", "Resources stat'd during agent runs", resources_evaluated_total.clone());
        registry.register("resources_failed", "Resources whose remediation failed", resources_failed_total.clone());

        Self { registry, jobs_total, jobs_failed_total, resources_evaluated_total, resources_failed_total }
    }

    pub fn record_report(&self, report: &concord_api::JobReport) {
        self.jobs_total.inc();
        for resource in &report.resources {
            for action in &resource.actions {
                self.resources_evaluated_total.inc();
                if action.outcome == concord_api::Outcome::Fail {
                    self.resources_failed_total.inc();
                }
            }
        }
    }

    pub fn assemble(&self) -> Result<String, fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for MetricsCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_api::{Action, JobReport, Outcome, ResourceReport};

    #[test]
    fn recording_a_report_updates_counters() {
        let metrics = MetricsCollection::new();
        let report = JobReport {
            start_sec: 0,
            start_usec: 0,
            end_sec: 0,
            end_usec: 0,
            resources: vec![ResourceReport {
                type_tag: "res_user".to_string(),
                key: "alice".to_string(),
                actions: vec![Action { description: "failed".to_string(), outcome: Outcome::Fail }],
            }],
        };
        metrics.record_report(&report);
        assert_eq!(metrics.jobs_total.get(), 1);
        assert_eq!(metrics.resources_failed_total.get(), 1);
    }
}
