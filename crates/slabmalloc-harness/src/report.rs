//! JSON report shapes printed by the harness binary.

use serde::{Deserialize, Serialize};

/// Outcome of one named scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub cases: Vec<CaseResult>,
    pub passed: usize,
    pub failed: usize,
}

impl ScenarioReport {
    pub fn from_cases(cases: Vec<CaseResult>) -> Self {
        let passed = cases.iter().filter(|case| case.passed).count();
        let failed = cases.len() - passed;
        Self {
            cases,
            passed,
            failed,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Metrics from one churn run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurnReport {
    pub seed: u64,
    pub ops: usize,
    pub max_size: usize,
    pub allocations: usize,
    pub small_allocations: usize,
    pub large_allocations: usize,
    pub frees: usize,
    pub zero_size_requests: usize,
    pub peak_live: usize,
    pub live_at_end: usize,
    pub pages_carved: usize,
    pub corrupted_blocks: usize,
    pub usable_size_violations: usize,
}

impl ChurnReport {
    pub fn is_clean(&self) -> bool {
        self.corrupted_blocks == 0 && self.usable_size_violations == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_report_counts() {
        let report = ScenarioReport::from_cases(vec![
            CaseResult {
                name: "a".into(),
                passed: true,
                detail: String::new(),
            },
            CaseResult {
                name: "b".into(),
                passed: false,
                detail: "boom".into(),
            },
        ]);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 1);
        assert!(!report.all_passed());
    }

    #[test]
    fn scenario_report_json_shape() {
        let report = ScenarioReport::from_cases(vec![CaseResult {
            name: "only".into(),
            passed: true,
            detail: "ok".into(),
        }]);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["passed"], 1);
        assert_eq!(value["failed"], 0);
        assert_eq!(value["cases"][0]["name"], "only");
        assert_eq!(value["cases"][0]["passed"], true);
        assert_eq!(value["cases"][0]["detail"], "ok");
    }

    #[test]
    fn churn_report_cleanliness() {
        let mut report = ChurnReport::default();
        assert!(report.is_clean());
        report.corrupted_blocks = 1;
        assert!(!report.is_clean());
    }
}
