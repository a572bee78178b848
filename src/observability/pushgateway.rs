use tracing::{info, warn};

use crate::pipeline::RunReport;

/// Render a run summary in the Prometheus text exposition format.
pub fn render_run_summary(report: &RunReport) -> String {
    let duration_secs = report
        .duration()
        .map(|d| d.num_milliseconds() as f64 / 1000.0)
        .unwrap_or(0.0);
    let timestamp_secs = report
        .completed_at
        .unwrap_or(report.started_at)
        .timestamp() as f64;

    format!(
        "# TYPE gigradar_runs_total counter\n\
         gigradar_runs_total 1\n\
         # TYPE gigradar_run_units gauge\n\
         gigradar_run_units {}\n\
         # TYPE gigradar_run_unit_failures gauge\n\
         gigradar_run_unit_failures {}\n\
         # TYPE gigradar_run_events gauge\n\
         gigradar_run_events {}\n\
         # TYPE gigradar_run_duration_seconds gauge\n\
         gigradar_run_duration_seconds {}\n\
         # TYPE gigradar_run_last_timestamp_seconds gauge\n\
         gigradar_run_last_timestamp_seconds {}\n",
        report.units_invoked,
        report.errors.len(),
        report.total_events(),
        duration_secs,
        timestamp_secs
    )
}

/// Push the run summary to a Prometheus Pushgateway. Failures are logged, never returned.
pub async fn push_run_summary(base_url: &str, report: &RunReport) {
    let push_url = format!(
        "{}/metrics/job/gigradar/instance/{}",
        base_url.trim_end_matches('/'),
        report.run_id
    );

    let client = reqwest::Client::new();
    let push_res = client
        .post(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(render_run_summary(report))
        .send()
        .await;

    match push_res {
        Ok(r) if r.status().is_success() => {
            info!("Pushed run summary to Pushgateway for run={}", report.run_id);
        }
        Ok(r) => {
            warn!(
                "Pushgateway push responded with status {} for run={}",
                r.status().as_u16(),
                report.run_id
            );
        }
        Err(e) => {
            warn!("Failed to push run summary to Pushgateway: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ScraperError;

    #[test]
    fn test_summary_reports_units_and_failures() {
        let mut report = RunReport::new();
        report.units_invoked = 3;
        report.units_succeeded = 2;
        report
            .errors
            .push(ScraperError::new("jfr", "HTTP 404", "trace"));
        report.complete();

        let body = render_run_summary(&report);

        assert!(body.contains("gigradar_runs_total 1\n"));
        assert!(body.contains("gigradar_run_units 3\n"));
        assert!(body.contains("gigradar_run_unit_failures 1\n"));
        assert!(body.contains("gigradar_run_events 0\n"));
    }
}
