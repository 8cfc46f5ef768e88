use crate::error::{ClientError, Res};
use crate::model::{Amount, Goal, NewGoal};
use crate::resources::GoalClient;
use tracing::info;

/// The result of contributing to a goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub goal: Goal,
    /// The contribution is what made the goal reach its target.
    pub completed: bool,
}

impl GoalClient {
    /// Adds `amount` to the current amount of goal `id`. A contribution that would take the goal
    /// past its target is rejected.
    pub async fn contribute(&self, id: u64, amount: Amount) -> Res<Contribution> {
        if amount.is_negative() || amount.is_zero() {
            return Err(ClientError::validation(
                "a contribution must be greater than zero",
            ));
        }
        let before = self.find(id).await?;
        let mut payload = NewGoal::try_from(&before)?;
        match payload.current_amount.checked_add(amount) {
            Some(current) if current <= payload.target_amount => payload.current_amount = current,
            _ => {
                return Err(ClientError::validation(format!(
                    "contributing {amount} would exceed the target of {} (currently {})",
                    payload.target_amount,
                    before.current_amount.unwrap_or(Amount::ZERO)
                )))
            }
        }

        let goal = self.update(id, &payload).await?;
        let completed = !before.is_completed() && goal.is_completed();
        if completed {
            info!("Goal '{}' is complete", payload.name);
        }
        Ok(Contribution { goal, completed })
    }
}

#[cfg(test)]
mod tests {
    use crate::api::FakeApi;
    use crate::error::ClientError;
    use crate::model::{Amount, Record};
    use crate::resources::tests::demo_client;
    use crate::resources::GoalClient;
    use serde_json::json;
    use std::str::FromStr;
    use std::sync::Arc;

    fn amount(s: &str) -> Amount {
        Amount::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_contribute_then_complete() {
        let fake = Arc::new(FakeApi::seeded());
        let goals = GoalClient::new(demo_client(&fake).await);
        let goal = goals.list().await.unwrap().remove(0);
        let id = goal.require_id().unwrap();

        let first = goals.contribute(id, amount("100")).await.unwrap();
        assert!(!first.completed);
        assert_eq!(first.goal.current_amount, Some(amount("550")));

        let last = goals.contribute(id, amount("650")).await.unwrap();
        assert!(last.completed);
        assert!(last.goal.is_completed());
    }

    #[tokio::test]
    async fn test_contribute_over_target_is_rejected() {
        let fake = Arc::new(FakeApi::seeded());
        let goals = GoalClient::new(demo_client(&fake).await);
        let goal = goals.list().await.unwrap().remove(0);
        let id = goal.require_id().unwrap();

        let err = goals.contribute(id, amount("751")).await.unwrap_err();
        assert!(matches!(err, ClientError::ValidationFailed(_)));
        let unchanged = goals.list().await.unwrap().remove(0);
        assert_eq!(unchanged.current_amount, Some(amount("450")));
    }

    #[tokio::test]
    async fn test_contribute_that_overflows_is_rejected() {
        let fake = Arc::new(FakeApi::new());
        fake.add_user("demo", "demo");
        let id = fake.insert(
            "objetivo",
            json!({
                "name": "Enorme",
                "target_amount": "79228162514264337593543950335",
                "current_amount": "79228162514264337593543950335"
            }),
        );
        let goals = GoalClient::new(demo_client(&fake).await);
        let err = goals
            .contribute(id, amount("79228162514264337593543950335"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_contribute_sends_one_display_string() {
        let fake = Arc::new(FakeApi::new());
        fake.add_user("demo", "demo");
        let id = fake.insert(
            "objetivo",
            json!({"description": "Portátil", "target_amount": 900, "current_amount": null}),
        );
        let goals = GoalClient::new(demo_client(&fake).await);
        let result = goals.contribute(id, amount("100")).await.unwrap();
        assert_eq!(result.goal.name.as_deref(), Some("Portátil"));
        assert_eq!(result.goal.description.as_deref(), Some("Portátil"));
        assert_eq!(result.goal.current_amount, Some(amount("100")));
    }
}
