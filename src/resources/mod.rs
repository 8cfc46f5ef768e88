//! Typed CRUD for the five kinds of records the API holds, plus the read-only frequency list.
//!
//! Each kind is a zero-sized type implementing `Resource`, which names its URL segment, its record
//! type and its payload type. `ResourceClient<R>` is the only implementation of list, create,
//! update and delete; it adds nothing to the `ApiClient` beyond building paths and bodies, and it
//! passes errors through as they are.

mod goals;
mod savings;

use crate::api::{ApiClient, RequestOptions};
use crate::error::{ClientError, Res};
use crate::model::{
    Frequency, Goal, NewGoal, NewRecurringExpense, NewSavings, NewTransaction, Payload, Record,
    RecurringExpense, Savings, Transaction,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

pub use goals::Contribution;

/// A kind of record served at `api/finanzas/<SEGMENT>/`.
pub trait Resource: Send + Sync + 'static {
    /// The URL segment, e.g. `gastos`.
    const SEGMENT: &'static str;
    /// A human name, e.g. `expense`.
    const NAME: &'static str;
    type Record: Record + Serialize + DeserializeOwned + Debug + Clone + Send + Sync;
    type Payload: Payload;
}

macro_rules! resource {
    ($name:ident, $segment:literal, $human:literal, $record:ty, $payload:ty) => {
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Resource for $name {
            const SEGMENT: &'static str = $segment;
            const NAME: &'static str = $human;
            type Record = $record;
            type Payload = $payload;
        }
    };
}

resource!(Incomes, "ingresos", "income", Transaction, NewTransaction);
resource!(Expenses, "gastos", "expense", Transaction, NewTransaction);
resource!(
    RecurringExpenses,
    "gastosfijos",
    "recurring expense",
    RecurringExpense,
    NewRecurringExpense
);
resource!(SavingsFunds, "ahorros", "savings fund", Savings, NewSavings);
resource!(Goals, "objetivo", "goal", Goal, NewGoal);

pub type IncomeClient = ResourceClient<Incomes>;
pub type ExpenseClient = ResourceClient<Expenses>;
pub type RecurringExpenseClient = ResourceClient<RecurringExpenses>;
pub type SavingsClient = ResourceClient<SavingsFunds>;
pub type GoalClient = ResourceClient<Goals>;

/// CRUD for one kind of record. Clones share the set of pending modifications.
pub struct ResourceClient<R> {
    client: ApiClient,
    pending: Arc<Mutex<HashSet<u64>>>,
    _resource: PhantomData<R>,
}

impl<R> Clone for ResourceClient<R> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            pending: self.pending.clone(),
            _resource: PhantomData,
        }
    }
}

impl<R: Resource> ResourceClient<R> {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            pending: Arc::new(Mutex::new(HashSet::new())),
            _resource: PhantomData,
        }
    }

    /// All records. Elements that are not even objects of the expected shape are skipped with a
    /// warning; a body that is not a list fails the whole call.
    pub async fn list(&self) -> Res<Vec<R::Record>> {
        let values: Vec<Value> = self
            .client
            .fetch(R::SEGMENT, RequestOptions::get())
            .await?;
        let records = values
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<R::Record>(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping an unreadable {} record: {e}", R::NAME);
                    None
                }
            })
            .collect::<Vec<R::Record>>();
        debug!("Listed {} {} records", records.len(), R::NAME);
        Ok(records)
    }

    /// Validates, applies creation defaults and submits a new record. Returns the record as the
    /// server stored it.
    pub async fn create(&self, payload: R::Payload) -> Res<R::Record> {
        payload.validate()?;
        let payload = payload.for_create();
        let body = serde_json::to_value(&payload).map_err(ClientError::parse)?;
        self.client
            .fetch(R::SEGMENT, RequestOptions::post(body))
            .await
    }

    /// Replaces the record `id` with `payload`.
    pub async fn update(&self, id: u64, payload: &R::Payload) -> Res<R::Record> {
        payload.validate()?;
        let body = serde_json::to_value(payload).map_err(ClientError::parse)?;
        let _pending = self.begin(id)?;
        self.client
            .fetch(&item_path::<R>(id), RequestOptions::put(body))
            .await
    }

    pub async fn delete(&self, id: u64) -> Res<()> {
        let _pending = self.begin(id)?;
        self.client
            .request(&item_path::<R>(id), RequestOptions::delete())
            .await?;
        debug!("Deleted {} {id}", R::NAME);
        Ok(())
    }

    /// `update` for a record that came from `list`; fails if it has no id.
    pub async fn update_record(&self, record: &R::Record, payload: &R::Payload) -> Res<R::Record> {
        self.update(record.require_id()?, payload).await
    }

    /// `delete` for a record that came from `list`; fails if it has no id.
    pub async fn delete_record(&self, record: &R::Record) -> Res<()> {
        self.delete(record.require_id()?).await
    }

    /// The record `id`, found in the full list.
    pub(crate) async fn find(&self, id: u64) -> Res<R::Record> {
        self.list()
            .await?
            .into_iter()
            .find(|r| r.id() == Some(id))
            .ok_or_else(|| ClientError::request_failed(Some(404), format!("No {} #{id}", R::NAME)))
    }

    /// Marks `id` as being modified until the returned guard is dropped.
    fn begin(&self, id: u64) -> Res<Pending> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if !pending.insert(id) {
            return Err(ClientError::validation(format!(
                "a change to {} #{id} is already in progress",
                R::NAME
            )));
        }
        Ok(Pending {
            id,
            pending: self.pending.clone(),
        })
    }
}

struct Pending {
    id: u64,
    pending: Arc<Mutex<HashSet<u64>>>,
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

fn item_path<R: Resource>(id: u64) -> String {
    format!("{}/{id}", R::SEGMENT)
}

/// The frequency reference list. It cannot be modified.
#[derive(Debug, Clone)]
pub struct FrequencyClient {
    client: ApiClient,
}

impl FrequencyClient {
    pub const SEGMENT: &'static str = "frecuencia";

    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Res<Vec<Frequency>> {
        let values: Vec<Value> = self
            .client
            .fetch(Self::SEGMENT, RequestOptions::get())
            .await?;
        Ok(values
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect())
    }
}

/// One client per kind of record, all sharing the same `ApiClient`.
#[derive(Clone)]
pub struct Resources {
    pub incomes: IncomeClient,
    pub expenses: ExpenseClient,
    pub recurring: RecurringExpenseClient,
    pub savings: SavingsClient,
    pub goals: GoalClient,
    pub frequencies: FrequencyClient,
}

impl Resources {
    pub fn new(client: &ApiClient) -> Self {
        Self {
            incomes: ResourceClient::new(client.clone()),
            expenses: ResourceClient::new(client.clone()),
            recurring: ResourceClient::new(client.clone()),
            savings: ResourceClient::new(client.clone()),
            goals: ResourceClient::new(client.clone()),
            frequencies: FrequencyClient::new(client.clone()),
        }
    }
}
