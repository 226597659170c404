use std::{thread, time::Duration};

use anyhow::{Context, Result};
use log::warn;

use crate::component::DashboardConfig;

const SYSTEM_INSTRUCTIONS: &str = r#"You are a business intelligence analyst designing a dashboard for a dataset.
Reply with JSON only, using exactly this shape:
{
  "title": "Dashboard title derived from the file name",
  "components": [
    {"id": "kpi1", "type": "kpi", "title": "Total Revenue (USD)", "config": {"operation": "sum", "column": "amount"}},
    {"id": "kpi2", "type": "kpi", "title": "Average Price (USD)", "config": {"operation": "mean", "column": "price"}},
    {"id": "chart1", "type": "chart", "chart_type": "bar", "title": "Top Products (Units)", "config": {"x": "product", "y": "quantity", "operation": "sum", "limit": 10}},
    {"id": "chart2", "type": "chart", "chart_type": "pie", "title": "Share by Category (%)", "config": {"x": "category", "y": "quantity", "operation": "sum"}},
    {"id": "map1", "type": "map", "title": "Store Locations", "config": {"lat": "latitude", "lon": "longitude", "label": "store"}}
  ]
}
Rules:
- Produce two KPIs, one bar chart and one pie chart, in that order.
- Add the map only when the dataset clearly has latitude and longitude columns.
- KPI operations: sum, mean, max, min, count, nunique. Chart operations: sum, mean, count.
- Use column names exactly as listed in the summary.
- Titles use business language rather than column names, with the unit in parentheses when it can be inferred."#;

const REMINDER: &str = "Remember: 2 KPIs, 1 bar chart, 1 pie chart, and a map only if coordinates exist.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub file_name: &'a str,
    pub summary: &'a str,
    pub instruction: Option<&'a str>,
}

pub trait ComponentPlanner: Send + Sync {
    /// Returns the raw reply text for `prompt`.
    fn generate(&self, prompt: &Prompt) -> Result<String>;
}

impl<F> ComponentPlanner for F
where
    F: Fn(&Prompt) -> Result<String> + Send + Sync,
{
    fn generate(&self, prompt: &Prompt) -> Result<String> {
        self(prompt)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt + 1`: `base * 1.5^attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.mul_f64(1.5_f64.powi(attempt as i32))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

pub fn build_prompt(request: &PlanRequest<'_>) -> Prompt {
    let user = format!(
        "FILE NAME: {}\nCOLUMN SUMMARY:\n{}\nUSER INTENT: {}\n{REMINDER}",
        request.file_name,
        request.summary,
        request.instruction.unwrap_or("")
    );
    Prompt {
        system: SYSTEM_INSTRUCTIONS.to_string(),
        user,
    }
}

pub fn plan_dashboard(
    planner: &dyn ComponentPlanner,
    request: &PlanRequest<'_>,
    policy: &RetryPolicy,
) -> Result<DashboardConfig> {
    let prompt = build_prompt(request);
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    let reply = loop {
        match planner.generate(&prompt) {
            Ok(reply) => break reply,
            Err(err) if attempt + 1 < attempts => {
                let delay = policy.delay(attempt);
                warn!(
                    "Planner attempt {} of {attempts} failed: {err:#}; retrying in {delay:?}",
                    attempt + 1
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => {
                return Err(err).context(format!("Planner failed after {attempts} attempt(s)"));
            }
        }
    };

    let mut dashboard =
        DashboardConfig::parse_str(strip_code_fence(&reply)).context("Reading planner reply")?;
    if dashboard.title.is_none() {
        dashboard.title = Some(format!("Dashboard: {}", request.file_name));
    }
    Ok(dashboard)
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.strip_prefix("json").unwrap_or(rest);
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_code_fence_handles_tagged_and_bare_replies() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn backoff_grows_by_half_each_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_millis(1500));
    }
}
