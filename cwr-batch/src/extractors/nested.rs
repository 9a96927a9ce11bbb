//! Nested results strategy
//!
//! Some single plugins report several candidate outputs under a top-level
//! `results` list. Each item is tried with the direct, solutions and findings
//! strategies; the first item yielding a coordinate wins.

use serde_json::Value;

use super::{direct, findings, solutions, StrategyFn};
use crate::models::CoordinateCandidate;

const ITEM_STRATEGIES: [StrategyFn; 3] = [
    direct::extract_direct,
    solutions::extract_solutions,
    findings::extract_findings,
];

pub fn extract_nested(result: &Value) -> Option<CoordinateCandidate> {
    result.get("results")?.as_array()?.iter().find_map(|item| {
        ITEM_STRATEGIES
            .iter()
            .find_map(|strategy| strategy(item))
    })
}
