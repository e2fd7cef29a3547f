//! Prometheus counters for submissions and reactions.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OutcomeLabels {
    outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ReactionLabels {
    reaction_type: String,
}

#[derive(Debug)]
pub struct Metrics {
    registry: Registry,
    submissions: Family<OutcomeLabels, Counter>,
    toggles: Family<ReactionLabels, Counter>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("sanctuary");

        let submissions = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "post_submissions",
            "Validated post submissions by moderation outcome",
            submissions.clone(),
        );

        let toggles = Family::<ReactionLabels, Counter>::default();
        registry.register(
            "reaction_toggles",
            "Reaction toggle requests by reaction type",
            toggles.clone(),
        );

        Self { registry, submissions, toggles }
    }

    /// `outcome` is one of `approved`, `approved_override`, `rejected`,
    /// `fail_closed`.
    pub fn record_submission(&self, outcome: &str) {
        self.submissions
            .get_or_create(&OutcomeLabels { outcome: outcome.to_string() })
            .inc();
    }

    pub fn record_toggle(&self, reaction_type: &str) {
        self.toggles
            .get_or_create(&ReactionLabels { reaction_type: reaction_type.to_string() })
            .inc();
    }

    /// OpenMetrics text exposition of every registered metric.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut body = String::new();
        encode(&mut body, &self.registry)?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_counters_with_labels() {
        let metrics = Metrics::new();
        metrics.record_submission("approved");
        metrics.record_submission("approved");
        metrics.record_submission("fail_closed");
        metrics.record_toggle("thanks");

        let body = metrics.render().unwrap();
        assert!(body.contains(r#"sanctuary_post_submissions_total{outcome="approved"} 2"#), "{body}");
        assert!(body.contains(r#"sanctuary_post_submissions_total{outcome="fail_closed"} 1"#));
        assert!(body.contains(r#"sanctuary_reaction_toggles_total{reaction_type="thanks"} 1"#));
        assert!(body.ends_with("# EOF\n"));
    }
}
