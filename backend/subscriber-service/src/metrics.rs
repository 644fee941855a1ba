use prometheus::{IntCounterVec, Opts};
use tracing::warn;

#[derive(Clone)]
pub struct SubscriberMetrics {
    /// Labels: `op` (subscribe, unsubscribe), `outcome` (committed, unchanged, failed)
    pub membership_changes: IntCounterVec,
    /// Labels: `outcome` (succeeded, failed)
    pub compensations: IntCounterVec,
}

impl SubscriberMetrics {
    pub fn new() -> Self {
        let registry = prometheus::default_registry();

        let membership_changes = IntCounterVec::new(
            Opts::new(
                "subscriber_membership_changes_total",
                "Subscribe and unsubscribe attempts by outcome",
            ),
            &["op", "outcome"],
        )
        .expect("valid metric opts for subscriber_membership_changes_total");

        let compensations = IntCounterVec::new(
            Opts::new(
                "subscriber_counter_compensations_total",
                "Inverse counter calls issued after a failed local commit",
            ),
            &["outcome"],
        )
        .expect("valid metric opts for subscriber_counter_compensations_total");

        for metric in [
            Box::new(membership_changes.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(compensations.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("Failed to register subscriber metric: {}", e);
            }
        }

        Self {
            membership_changes,
            compensations,
        }
    }

    pub fn record_membership_change(&self, op: &str, outcome: &str) {
        self.membership_changes
            .with_label_values(&[op, outcome])
            .inc();
    }

    pub fn record_compensation(&self, outcome: &str) {
        self.compensations.with_label_values(&[outcome]).inc();
    }
}

impl Default for SubscriberMetrics {
    fn default() -> Self {
        Self::new()
    }
}
