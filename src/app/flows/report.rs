use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

/// 每個步驟一行的 pass/fail 報告
#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub flow: String,
    pub started_at: DateTime<Utc>,
    pub steps: Vec<StepResult>,
}

impl FlowReport {
    pub fn new(flow: impl Into<String>) -> Self {
        Self {
            flow: flow.into(),
            started_at: Utc::now(),
            steps: Vec::new(),
        }
    }

    pub fn pass(&mut self, name: impl Into<String>, detail: impl Into<String>) {
        let step = StepResult {
            name: name.into(),
            passed: true,
            detail: detail.into(),
        };
        tracing::info!("✅ {}: {}", step.name, step.detail);
        self.steps.push(step);
    }

    pub fn fail(&mut self, name: impl Into<String>, detail: impl Into<String>) {
        let step = StepResult {
            name: name.into(),
            passed: false,
            detail: detail.into(),
        };
        tracing::error!("❌ {}: {}", step.name, step.detail);
        self.steps.push(step);
    }

    pub fn all_passed(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|step| step.passed)
    }

    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|step| step.name == name)
    }

    pub fn passed_count(&self) -> usize {
        self.steps.iter().filter(|step| step.passed).count()
    }
}

impl fmt::Display for FlowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({}) - {}/{} steps passed",
            self.flow,
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.passed_count(),
            self.steps.len()
        )?;
        for step in &self.steps {
            let mark = if step.passed { "✅" } else { "❌" };
            writeln!(f, "  {} {}: {}", mark, step.name, step.detail)?;
        }
        Ok(())
    }
}
