//! Parser for the Prometheus text exposition format returned by each
//! upstream's `/metrics` endpoint.

use std::collections::HashMap;

use thiserror::Error;

/// The subset of an upstream's exposed gauges the scraper cares about.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrapedLoad {
    pub num_requests_running: f64,
    pub num_requests_waiting: f64,
    pub gpu_cache_usage_perc: f64,
    pub process_max_fds: f64,
}

#[derive(Debug, Error)]
pub enum MetricsParseError {
    #[error("metrics body contained no parseable samples")]
    Empty,
}

const RUNNING: &str = "vllm:num_requests_running";
const WAITING: &str = "vllm:num_requests_waiting";
const GPU_CACHE: &str = "vllm:gpu_cache_usage_perc";
const MAX_FDS: &str = "process_max_fds";

/// Parse a Prometheus text body, summing multiple label sets under the same
/// metric name (each model/engine reports its own series).
pub fn parse(body: &str) -> Result<ScrapedLoad, MetricsParseError> {
    let mut sums: HashMap<&str, f64> = HashMap::new();
    let mut parsed_any = false;

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((name, value)) = split_sample(line) else {
            continue;
        };

        let tracked = match name {
            RUNNING => RUNNING,
            WAITING => WAITING,
            GPU_CACHE => GPU_CACHE,
            MAX_FDS => MAX_FDS,
            _ => continue,
        };

        *sums.entry(tracked).or_insert(0.0) += value;
        parsed_any = true;
    }

    if !parsed_any {
        return Err(MetricsParseError::Empty);
    }

    Ok(ScrapedLoad {
        num_requests_running: sums.get(RUNNING).copied().unwrap_or(0.0),
        num_requests_waiting: sums.get(WAITING).copied().unwrap_or(0.0),
        gpu_cache_usage_perc: sums.get(GPU_CACHE).copied().unwrap_or(0.0),
        process_max_fds: sums.get(MAX_FDS).copied().unwrap_or(0.0),
    })
}

/// Split a single exposition line into `(metric_name, value)`, stripping any
/// `{label="value",...}` block. Returns `None` for lines that do not end in
/// a parseable float (e.g. truncated or binary garbage).
fn split_sample(line: &str) -> Option<(&str, f64)> {
    let (head, value_str) = line.rsplit_once(' ')?;
    let value: f64 = value_str.parse().ok()?;

    let name = match head.find('{') {
        Some(idx) => head[..idx].trim_end(),
        None => head.trim_end(),
    };

    if name.is_empty() {
        return None;
    }

    Some((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_gauges() {
        let body = "vllm:num_requests_running 4\nvllm:num_requests_waiting 2\nvllm:gpu_cache_usage_perc 0.37\n";
        let load = parse(body).expect("parseable");
        assert_eq!(load.num_requests_running, 4.0);
        assert_eq!(load.num_requests_waiting, 2.0);
        assert!((load.gpu_cache_usage_perc - 0.37).abs() < 1e-9);
    }

    #[test]
    fn sums_multi_label_samples() {
        let body = concat!(
            "vllm:num_requests_running{model=\"a\"} 3\n",
            "vllm:num_requests_running{model=\"b\"} 5\n",
        );
        let load = parse(body).expect("parseable");
        assert_eq!(load.num_requests_running, 8.0);
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let body = "# HELP vllm:num_requests_running docs\n# TYPE vllm:num_requests_running gauge\n\nvllm:num_requests_running 1\n";
        let load = parse(body).expect("parseable");
        assert_eq!(load.num_requests_running, 1.0);
    }

    #[test]
    fn ignores_unrecognised_metrics() {
        let body = "process_open_fds 12\nsome_other_metric{x=\"y\"} 99\nvllm:num_requests_running 1\n";
        let load = parse(body).expect("parseable");
        assert_eq!(load.num_requests_running, 1.0);
    }

    #[test]
    fn empty_body_is_malformed() {
        assert!(parse("").is_err());
        assert!(parse("# just a comment\n").is_err());
        assert!(parse("not a metrics line at all").is_err());
    }
}
