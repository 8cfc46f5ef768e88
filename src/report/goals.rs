use crate::model::{Amount, Goal};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// `round(current / target * 100)`, halves rounded away from zero. Not clamped: a goal over its
/// target is over 100. `None` when the target is not positive.
pub fn percentage(current: Amount, target: Amount) -> Option<i64> {
    if target.value() <= Decimal::ZERO {
        return None;
    }
    current
        .value()
        .checked_mul(Decimal::ONE_HUNDRED)?
        .checked_div(target.value())?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalProgress {
    pub id: Option<u64>,
    pub name: String,
    pub current: Amount,
    pub target: Amount,
    pub percentage: Option<i64>,
    pub completed: bool,
}

/// Progress of every goal that has a target. A missing current amount counts as nothing saved.
pub fn goal_progress(goals: &[Goal]) -> Vec<GoalProgress> {
    goals
        .iter()
        .filter_map(|goal| {
            let target = goal.target_amount?;
            let current = goal.current_amount.unwrap_or(Amount::ZERO);
            Some(GoalProgress {
                id: goal.id,
                name: goal.display_name().unwrap_or_default().to_string(),
                current,
                target,
                percentage: percentage(current, target),
                completed: current >= target,
            })
        })
        .collect()
}

/// The goals of `after` that are completed and that were present, by id, and not completed in
/// `before`.
pub fn completion_transitions<'a>(before: &[Goal], after: &'a [Goal]) -> Vec<&'a Goal> {
    after
        .iter()
        .filter(|goal| goal.is_completed())
        .filter(|goal| {
            goal.id.is_some_and(|id| {
                before
                    .iter()
                    .any(|old| old.id == Some(id) && !old.is_completed())
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::amount;

    fn goal(id: u64, current: &str, target: &str) -> Goal {
        Goal {
            id: Some(id),
            name: Some(format!("Goal {id}")),
            description: None,
            target_amount: Some(amount(target)),
            current_amount: Some(amount(current)),
            frequency: None,
        }
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(amount("450"), amount("1200")), Some(38));
        assert_eq!(percentage(amount("1"), amount("8")), Some(13)); // 12.5
        assert_eq!(percentage(amount("0"), amount("10")), Some(0));
        assert_eq!(percentage(amount("10"), amount("10")), Some(100));
        assert_eq!(percentage(amount("1"), amount("3")), Some(33));
        assert_eq!(percentage(amount("2"), amount("3")), Some(67));
    }

    #[test]
    fn test_percentage_is_not_clamped() {
        assert_eq!(percentage(amount("150"), amount("100")), Some(150));
    }

    #[test]
    fn test_percentage_without_target() {
        assert_eq!(percentage(amount("1"), Amount::ZERO), None);
        assert_eq!(percentage(amount("1"), amount("-5")), None);
    }

    #[test]
    fn test_goal_progress_skips_goals_without_target() {
        let mut no_target = goal(3, "5", "10");
        no_target.target_amount = None;
        let mut no_current = goal(4, "0", "80");
        no_current.current_amount = None;

        let progress = goal_progress(&[goal(1, "25", "100"), no_target, no_current]);
        assert_eq!(progress.len(), 2);
        assert_eq!(progress[0].percentage, Some(25));
        assert!(!progress[0].completed);
        assert_eq!(progress[1].current, Amount::ZERO);
        assert_eq!(progress[1].name, "Goal 4");
    }

    #[test]
    fn test_completion_transitions() {
        let before = vec![goal(1, "50", "100"), goal(2, "100", "100"), goal(3, "0", "10")];
        let after = vec![
            goal(1, "100", "100"),
            goal(2, "100", "100"),
            goal(3, "5", "10"),
            goal(4, "10", "10"),
        ];
        let ids: Vec<Option<u64>> = completion_transitions(&before, &after)
            .into_iter()
            .map(|g| g.id)
            .collect();
        assert_eq!(ids, vec![Some(1)]);
    }
}
