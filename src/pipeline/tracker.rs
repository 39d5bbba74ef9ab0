use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use crate::errors::WafsmithError;

/// Terminal outcome for one attack payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Coverage {
    /// Blocked by the rule synthesized for it.
    Individual,
    /// Blocked by a consolidated rule.
    Aggregated,
    Evaded,
}

/// Working state of a `create` run.
///
/// Each payload is assigned a terminal [`Coverage`] at most once; a second
/// assignment is an error, so the three terminal sets stay disjoint.
#[derive(Debug, Clone, Default)]
pub struct AggregationTracker {
    pending_rules: Vec<String>,
    pending_payloads: Vec<String>,
    consolidated_rules: Vec<String>,
    blocked_by_consolidated: Vec<String>,
    evaded: Vec<String>,
    blocked_by_individual: Vec<String>,
    patched_rules: Vec<String>,
    assigned: HashMap<String, Coverage>,
    order: Vec<String>,
}

impl AggregationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn assign(&mut self, payload: &str, coverage: Coverage) -> Result<(), WafsmithError> {
        if let Some(existing) = self.assigned.get(payload) {
            return Err(WafsmithError::Internal(format!(
                "Payload already recorded as {:?}, cannot record it as {:?}: {}",
                existing, coverage, payload
            )));
        }
        self.assigned.insert(payload.to_string(), coverage);
        self.order.push(payload.to_string());
        match coverage {
            Coverage::Individual => self.blocked_by_individual.push(payload.to_string()),
            Coverage::Aggregated => self.blocked_by_consolidated.push(payload.to_string()),
            Coverage::Evaded => self.evaded.push(payload.to_string()),
        }
        Ok(())
    }

    /// `rule` blocked `payload` on its own; it waits for aggregation.
    pub fn record_passed(&mut self, payload: &str, rule: &str) -> Result<(), WafsmithError> {
        if self.assigned.contains_key(payload) || self.pending_payloads.iter().any(|p| p == payload) {
            return Err(WafsmithError::Internal(format!("Payload recorded twice: {}", payload)));
        }
        self.pending_payloads.push(payload.to_string());
        self.pending_rules.push(rule.to_string());
        Ok(())
    }

    /// No rule was produced for `payload`, or its rule did not hold up.
    pub fn record_evaded(&mut self, payload: &str) -> Result<(), WafsmithError> {
        if self.pending_payloads.iter().any(|p| p == payload) {
            return Err(WafsmithError::Internal(format!(
                "Payload already passed individual evaluation: {}",
                payload
            )));
        }
        self.assign(payload, Coverage::Evaded)
    }

    /// Keep a consolidated rule and credit it with the pending payloads it
    /// blocked. Payloads an earlier consolidated rule already covers stay
    /// with that rule.
    pub fn record_consolidated(&mut self, rule: &str, blocked: &[String]) -> Result<(), WafsmithError> {
        self.consolidated_rules.push(rule.to_string());
        for payload in blocked {
            if !self.pending_payloads.iter().any(|p| p == payload) {
                return Err(WafsmithError::Internal(format!(
                    "Consolidated rule credited with a payload it was not evaluated for: {}",
                    payload
                )));
            }
            if self.assigned.get(payload.as_str()) == Some(&Coverage::Aggregated) {
                continue;
            }
            self.assign(payload, Coverage::Aggregated)?;
        }
        Ok(())
    }

    /// Carry forward the individual rule of every pending payload no
    /// consolidated rule covers. Returns how many rules were patched in.
    pub fn patch(&mut self) -> Result<usize, WafsmithError> {
        let uncovered: Vec<(String, String)> = self
            .pending_payloads
            .iter()
            .zip(&self.pending_rules)
            .filter(|(payload, _)| !self.assigned.contains_key(payload.as_str()))
            .map(|(payload, rule)| (payload.clone(), rule.clone()))
            .collect();

        for (payload, rule) in &uncovered {
            self.assign(payload, Coverage::Individual)?;
            self.patched_rules.push(rule.clone());
        }
        Ok(uncovered.len())
    }

    pub fn pending_rules(&self) -> &[String] {
        &self.pending_rules
    }

    pub fn pending_payloads(&self) -> &[String] {
        &self.pending_payloads
    }

    pub fn consolidated_rules(&self) -> &[String] {
        &self.consolidated_rules
    }

    pub fn patched_rules(&self) -> &[String] {
        &self.patched_rules
    }

    pub fn blocked_by_consolidated(&self) -> &[String] {
        &self.blocked_by_consolidated
    }

    pub fn blocked_by_individual(&self) -> &[String] {
        &self.blocked_by_individual
    }

    pub fn evaded(&self) -> &[String] {
        &self.evaded
    }

    /// Consolidated rules followed by patched individual rules.
    pub fn final_ruleset(&self) -> Vec<String> {
        self.consolidated_rules
            .iter()
            .chain(&self.patched_rules)
            .cloned()
            .collect()
    }

    pub fn coverage_of(&self, payload: &str) -> Option<Coverage> {
        self.assigned.get(payload).copied()
    }

    /// Every assigned payload with its coverage, in assignment order.
    pub fn coverage(&self) -> Vec<(String, Coverage)> {
        self.order
            .iter()
            .filter_map(|p| self.assigned.get(p).map(|c| (p.clone(), *c)))
            .collect()
    }
}
