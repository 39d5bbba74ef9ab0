use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use super::probe::PayloadProbe;
use super::types::{Payload, ProbeTarget};
use tracing::debug;

/// Status code → payloads that received it, in completion order.
pub type StatusBuckets = HashMap<u16, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeResults {
    pub total: usize,
    pub data: StatusBuckets,
}

impl ProbeResults {
    pub fn new(total: usize, data: StatusBuckets) -> Self {
        Self { total, data }
    }

    pub fn with_status(&self, status: u16) -> &[String] {
        self.data.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultStats {
    pub matched: usize,
    pub total: usize,
    pub percentage: f64,
    pub all_passed: bool,
}

/// How many of the probed payloads came back with `expected_code`.
pub fn calculate_results(results: &ProbeResults, expected_code: u16) -> ResultStats {
    let matched = results.with_status(expected_code).len();
    let total = results.total;
    let percentage = if total > 0 {
        matched as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    ResultStats {
        matched,
        total,
        percentage,
        all_passed: matched == total,
    }
}

/// Worker cap for I/O bound fan-out: twice the core count.
pub fn worker_count(requested: usize) -> usize {
    requested.min(num_cpus::get() * 2).max(1)
}

/// Fans a batch of payloads out over a bounded number of in-flight probes.
#[derive(Clone)]
pub struct ParallelProbeRunner {
    probe: PayloadProbe,
    max_workers: usize,
}

impl ParallelProbeRunner {
    pub fn new(probe: PayloadProbe, threads: usize) -> Self {
        Self {
            probe,
            max_workers: worker_count(threads),
        }
    }

    pub async fn run_all(&self, payloads: &[String], target: &ProbeTarget) -> ProbeResults {
        debug!(count = payloads.len(), workers = self.max_workers, endpoint = %target.endpoint, "Probing payloads");

        let completed: Vec<(String, u16)> = stream::iter(payloads.iter())
            .map(|raw| {
                let probe = &self.probe;
                let payload = Payload::new(target, raw);
                async move {
                    let status = probe.probe(&payload).await;
                    (payload.raw, status)
                }
            })
            .buffer_unordered(self.max_workers)
            .collect()
            .await;

        let mut data = StatusBuckets::new();
        for (raw, status) in completed {
            data.entry(status).or_default().push(raw);
        }
        ProbeResults::new(payloads.len(), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(total: usize, buckets: &[(u16, &[&str])]) -> ProbeResults {
        let data = buckets
            .iter()
            .map(|(code, payloads)| (*code, payloads.iter().map(|p| p.to_string()).collect()))
            .collect();
        ProbeResults::new(total, data)
    }

    #[test]
    fn test_calculate_results_partial_match() {
        let r = results(5, &[(200, &["payload1", "payload3"]), (403, &["payload2", "payload4", "payload5"])]);
        let stats = calculate_results(&r, 200);
        assert_eq!(stats.matched, 2);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.percentage, 40.0);
        assert!(!stats.all_passed);
    }

    #[test]
    fn test_calculate_results_all_match() {
        let r = results(3, &[(200, &["payload1", "payload2", "payload3"])]);
        let stats = calculate_results(&r, 200);
        assert_eq!(stats.matched, 3);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.percentage, 100.0);
        assert!(stats.all_passed);
    }

    #[test]
    fn test_calculate_results_no_match() {
        let r = results(3, &[(403, &["payload1", "payload2", "payload3"])]);
        let stats = calculate_results(&r, 200);
        assert_eq!(stats.matched, 0);
        assert_eq!(stats.percentage, 0.0);
        assert!(!stats.all_passed);
    }

    #[test]
    fn test_calculate_results_empty_batch() {
        let stats = calculate_results(&ProbeResults::default(), 200);
        assert_eq!(stats.percentage, 0.0);
        assert!(stats.all_passed);
    }

    #[test]
    fn test_with_status_missing_bucket_is_empty() {
        let r = results(2, &[(200, &["a"]), (403, &["b"])]);
        assert_eq!(r.with_status(403), ["b".to_string()]);
        assert!(r.with_status(302).is_empty());
    }

    #[test]
    fn test_worker_count_is_bounded() {
        assert_eq!(worker_count(0), 1);
        assert_eq!(worker_count(1), 1);
        assert!(worker_count(100_000) <= num_cpus::get() * 2);
    }
}
