//! Conditions attached to triggers and actions
//!
//! Conditions are opaque predicates supplied from outside. A failing
//! evaluation never stops event processing: [`ConditionHandle`] reports the
//! first failure and treats every failure as "not satisfied".

use crate::error::{TriggerError, TriggerResult};
use crate::variables::{Value, VariableStore};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use tracing::warn;

pub trait Condition {
    fn evaluate(&self, variables: &dyn VariableStore) -> TriggerResult<bool>;
}

impl<F> Condition for F
where
    F: Fn(&dyn VariableStore) -> TriggerResult<bool>,
{
    fn evaluate(&self, variables: &dyn VariableStore) -> TriggerResult<bool> {
        self(variables)
    }
}

/// Shared condition with failure reporting
#[derive(Clone)]
pub struct ConditionHandle {
    condition: Rc<dyn Condition>,
    reported: Rc<Cell<bool>>,
}

impl ConditionHandle {
    pub fn new(condition: impl Condition + 'static) -> Self {
        Self {
            condition: Rc::new(condition),
            reported: Rc::new(Cell::new(false)),
        }
    }

    pub fn satisfied(&self, variables: &dyn VariableStore) -> bool {
        match self.condition.evaluate(variables) {
            Ok(satisfied) => satisfied,
            Err(err) => {
                if !self.reported.replace(true) {
                    warn!("Condition failed, treating as not satisfied: {err}");
                }
                false
            }
        }
    }
}

impl fmt::Debug for ConditionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionHandle")
            .field("reported", &self.reported.get())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    EqualTo,
    NotEqualTo,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

/// Compares a variable against a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableCondition {
    pub variable: String,
    pub operator: ComparisonOperator,
    pub value: Value,
}

impl VariableCondition {
    pub fn new(variable: &str, operator: ComparisonOperator, value: impl Into<Value>) -> Self {
        Self {
            variable: variable.to_string(),
            operator,
            value: value.into(),
        }
    }
}

impl Condition for VariableCondition {
    fn evaluate(&self, variables: &dyn VariableStore) -> TriggerResult<bool> {
        use ComparisonOperator::*;

        let Some(current) = variables.get(&self.variable) else {
            return Ok(self.operator == NotEqualTo);
        };
        match self.operator {
            EqualTo => Ok(current == self.value),
            NotEqualTo => Ok(current != self.value),
            GreaterThan => self.compare(&current, |lhs, rhs| lhs > rhs),
            GreaterThanOrEqual => self.compare(&current, |lhs, rhs| lhs >= rhs),
            LessThan => self.compare(&current, |lhs, rhs| lhs < rhs),
            LessThanOrEqual => self.compare(&current, |lhs, rhs| lhs <= rhs),
        }
    }
}

impl VariableCondition {
    fn compare(&self, current: &Value, op: impl Fn(f64, f64) -> bool) -> TriggerResult<bool> {
        match (current.as_number(), self.value.as_number()) {
            (Some(lhs), Some(rhs)) => Ok(op(lhs, rhs)),
            _ => Err(TriggerError::Condition(format!(
                "cannot order '{}' ({current}) against {}",
                self.variable, self.value
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    All,
    Any,
    None,
}

/// Combination of several conditions
pub struct ConditionGroup {
    pub mode: GroupMode,
    pub conditions: Vec<ConditionHandle>,
}

impl Condition for ConditionGroup {
    fn evaluate(&self, variables: &dyn VariableStore) -> TriggerResult<bool> {
        let mut results = self.conditions.iter().map(|c| c.satisfied(variables));
        Ok(match self.mode {
            GroupMode::All => results.all(|r| r),
            GroupMode::Any => results.any(|r| r),
            GroupMode::None => !results.any(|r| r),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::{MemoryVariableStore, FINGERS};

    #[test]
    fn test_variable_condition() {
        let store = MemoryVariableStore::new();
        let fingers_is_3 = VariableCondition::new(FINGERS, ComparisonOperator::EqualTo, 3.0);
        let at_least_2 = VariableCondition::new(FINGERS, ComparisonOperator::GreaterThanOrEqual, 2.0);

        assert!(!fingers_is_3.evaluate(&store).unwrap());
        store.set(FINGERS, Some(3u8.into()));
        assert!(fingers_is_3.evaluate(&store).unwrap());
        assert!(at_least_2.evaluate(&store).unwrap());
    }

    #[test]
    fn test_failing_condition_is_not_satisfied() {
        let store = MemoryVariableStore::new();
        store.set("name", Some("touchpad".into()));
        let handle = ConditionHandle::new(VariableCondition::new(
            "name",
            ComparisonOperator::LessThan,
            2.0,
        ));
        assert!(!handle.satisfied(&store));
        // keeps evaluating after the first failure
        assert!(!handle.satisfied(&store));
        store.set("name", Some(1.0.into()));
        assert!(handle.satisfied(&store));
    }

    #[test]
    fn test_group_modes() {
        let store = MemoryVariableStore::new();
        let constant = |value: bool| {
            ConditionHandle::new(move |_: &dyn VariableStore| -> TriggerResult<bool> { Ok(value) })
        };
        let yes = || constant(true);
        let no = || constant(false);

        let any = ConditionGroup {
            mode: GroupMode::Any,
            conditions: vec![no(), yes()],
        };
        let all = ConditionGroup {
            mode: GroupMode::All,
            conditions: vec![no(), yes()],
        };
        let none = ConditionGroup {
            mode: GroupMode::None,
            conditions: vec![no()],
        };
        assert!(any.evaluate(&store).unwrap());
        assert!(!all.evaluate(&store).unwrap());
        assert!(none.evaluate(&store).unwrap());
    }
}
