use crate::error::{ClientError, Res};
use crate::model::{Amount, NewSavings, Savings};
use crate::resources::SavingsClient;
use tracing::info;

impl SavingsClient {
    /// Adds `amount` to the savings fund `id` and sends the whole record back. The amount of a
    /// fund only ever grows this way.
    pub async fn deposit(&self, id: u64, amount: Amount) -> Res<Savings> {
        if amount.is_negative() || amount.is_zero() {
            return Err(ClientError::validation(
                "a deposit must be greater than zero",
            ));
        }
        let fund = self.find(id).await?;
        let mut payload = NewSavings::try_from(&fund)?;
        payload.amount = payload.amount.checked_add(amount).ok_or_else(|| {
            ClientError::validation(format!(
                "depositing {amount} would take savings fund #{id} past the largest amount"
            ))
        })?;
        let updated = self.update(id, &payload).await?;
        info!("Deposited {amount} into savings fund #{id}, now {}", payload.amount);
        Ok(updated)
    }
}
