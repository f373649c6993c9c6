//! Usage metrics summary

use agent_chat_core::UsageMetrics;

pub fn render_metrics(metrics: &UsageMetrics) -> Vec<String> {
    vec![
        format!(
            "Total tokens:   {}{}",
            number(metrics.total_tokens),
            trend(metrics.tokens_trend, "vs. previous month")
        ),
        format!(
            "Total cost:     {}{}",
            metrics.cost_display(),
            trend(metrics.cost_trend, "vs. previous month")
        ),
        format!("Active agents:  {}", number(metrics.active_agents)),
        format!(
            "Requests/min:   {}{}",
            metrics
                .requests_per_minute
                .map(|rpm| format!("{:.1}", rpm))
                .unwrap_or_else(|| "-".to_string()),
            trend(metrics.requests_trend, "vs. previous hour")
        ),
    ]
}

fn number(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn trend(value: Option<f64>, label: &str) -> String {
    match value {
        Some(pct) => format!("  ({:+.1}% {})", pct, label),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_trends() {
        let metrics = UsageMetrics {
            total_tokens: Some(1500),
            tokens_trend: Some(12.5),
            total_cost: Some(4.2),
            ..UsageMetrics::default()
        };

        let lines = render_metrics(&metrics);
        assert_eq!(lines[0], "Total tokens:   1500  (+12.5% vs. previous month)");
        assert_eq!(lines[1], "Total cost:     $4.20");
        assert_eq!(lines[2], "Active agents:  -");
    }
}
