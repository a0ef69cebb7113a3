//! Per-provider request metrics.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Rolling metrics for one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetrics {
    /// Requests attempted.
    pub request_count: u64,
    /// Requests that succeeded.
    pub success_count: u64,
    /// Requests that failed.
    pub error_count: u64,
    /// Sum of observed latencies, milliseconds.
    pub total_latency_ms: u64,
    /// Mean observed latency, milliseconds.
    pub average_latency_ms: f64,
    /// Total USD cost of successful requests.
    pub total_cost: Decimal,
}

impl ProviderMetrics {
    /// Record one finished request. Cost is only accumulated on success.
    pub(crate) fn record(&mut self, latency_ms: u64, cost: Option<Decimal>, ok: bool) {
        self.request_count += 1;
        self.total_latency_ms += latency_ms;
        if ok {
            self.success_count += 1;
            if let Some(cost) = cost {
                self.total_cost += cost;
            }
        } else {
            self.error_count += 1;
        }
        self.average_latency_ms = self.total_latency_ms as f64 / self.request_count as f64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_follow_recorded_latencies() {
        let mut m = ProviderMetrics::default();
        m.record(100, None, true);
        m.record(300, None, false);
        assert_eq!(m.request_count, 2);
        assert_eq!(m.success_count, 1);
        assert_eq!(m.error_count, 1);
        assert!((m.average_latency_ms - 200.0).abs() < f64::EPSILON);
    }
}
