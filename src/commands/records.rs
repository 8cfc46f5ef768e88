//! Record commands: `list`, `frequencies`, `add`, `update`, `delete`, `deposit` and `contribute`.

use crate::api::ApiClient;
use crate::args::{Kind, RecordFields};
use crate::commands::Out;
use crate::error::{ClientError, Res};
use crate::model::{
    Amount, Goal, NewGoal, NewRecurringExpense, NewSavings, NewTransaction, Record,
    RecurringExpense, Savings, Transaction,
};
use crate::report::percentage;
use crate::resources::Resources;
use crate::Result;
use serde::Serialize;
use serde_json::Value;

/// The records of one kind, as fetched. Lets commands and reports that work on any kind fetch
/// once and then hand the typed list to generic code.
pub(crate) enum Records {
    Transactions(Vec<Transaction>),
    Recurring(Vec<RecurringExpense>),
    Savings(Vec<Savings>),
    Goals(Vec<Goal>),
}

impl Records {
    pub(crate) async fn fetch(resources: &Resources, kind: Kind) -> Res<Self> {
        Ok(match kind {
            Kind::Income => Records::Transactions(resources.incomes.list().await?),
            Kind::Expense => Records::Transactions(resources.expenses.list().await?),
            Kind::Recurring => Records::Recurring(resources.recurring.list().await?),
            Kind::Savings => Records::Savings(resources.savings.list().await?),
            Kind::Goal => Records::Goals(resources.goals.list().await?),
        })
    }
}

pub async fn list(client: &ApiClient, kind: Kind) -> Result<Out<Value>> {
    let resources = Resources::new(client);
    match Records::fetch(&resources, kind).await? {
        Records::Transactions(records) => listing(kind, &records),
        Records::Recurring(records) => listing(kind, &records),
        Records::Savings(records) => listing(kind, &records),
        Records::Goals(records) => listing(kind, &records),
    }
}

fn listing<R: Record + Serialize>(kind: Kind, records: &[R]) -> Result<Out<Value>> {
    let mut message = match records.len() {
        1 => format!("1 {kind} record"),
        n => format!("{n} {kind} records"),
    };
    for record in records {
        message.push('\n');
        message.push_str(&record.summary());
    }
    Ok(Out::new(message, serde_json::to_value(records)?))
}

pub async fn frequencies(client: &ApiClient) -> Result<Out<Value>> {
    let frequencies = Resources::new(client).frequencies.list().await?;
    let mut message = format!("{} frequencies", frequencies.len());
    for frequency in &frequencies {
        message.push('\n');
        message.push_str(&frequency.summary());
    }
    Ok(Out::new(message, serde_json::to_value(&frequencies)?))
}

pub async fn add(client: &ApiClient, kind: Kind, fields: &RecordFields) -> Result<Out<Value>> {
    let r = Resources::new(client);
    match kind {
        Kind::Income => saved("Added", kind, r.incomes.create(transaction(fields, None)?).await?),
        Kind::Expense => saved("Added", kind, r.expenses.create(transaction(fields, None)?).await?),
        Kind::Recurring => saved(
            "Added",
            kind,
            r.recurring.create(recurring(fields, None)?).await?,
        ),
        Kind::Savings => saved("Added", kind, r.savings.create(savings(fields, None)?).await?),
        Kind::Goal => saved("Added", kind, r.goals.create(goal(fields, None)?).await?),
    }
}

/// Replaces record `id` with its current values overlaid by `fields`.
pub async fn update(
    client: &ApiClient,
    kind: Kind,
    id: u64,
    fields: &RecordFields,
) -> Result<Out<Value>> {
    let r = Resources::new(client);
    match kind {
        Kind::Income => {
            let payload = transaction(fields, Some(&r.incomes.find(id).await?))?;
            saved("Updated", kind, r.incomes.update(id, &payload).await?)
        }
        Kind::Expense => {
            let payload = transaction(fields, Some(&r.expenses.find(id).await?))?;
            saved("Updated", kind, r.expenses.update(id, &payload).await?)
        }
        Kind::Recurring => {
            let payload = recurring(fields, Some(&r.recurring.find(id).await?))?;
            saved("Updated", kind, r.recurring.update(id, &payload).await?)
        }
        Kind::Savings => {
            let payload = savings(fields, Some(&r.savings.find(id).await?))?;
            saved("Updated", kind, r.savings.update(id, &payload).await?)
        }
        Kind::Goal => {
            let payload = goal(fields, Some(&r.goals.find(id).await?))?;
            saved("Updated", kind, r.goals.update(id, &payload).await?)
        }
    }
}

pub async fn delete(client: &ApiClient, kind: Kind, id: u64) -> Result<Out<()>> {
    let r = Resources::new(client);
    match kind {
        Kind::Income => r.incomes.delete(id).await?,
        Kind::Expense => r.expenses.delete(id).await?,
        Kind::Recurring => r.recurring.delete(id).await?,
        Kind::Savings => r.savings.delete(id).await?,
        Kind::Goal => r.goals.delete(id).await?,
    }
    Ok(format!("Deleted {kind} #{id}").into())
}

pub async fn deposit(client: &ApiClient, id: u64, amount: Amount) -> Result<Out<Value>> {
    let fund = Resources::new(client).savings.deposit(id, amount).await?;
    let message = format!(
        "Deposited {amount}, savings fund #{id} now holds {}",
        fund.amount.unwrap_or(Amount::ZERO)
    );
    Ok(Out::new(message, serde_json::to_value(&fund)?))
}

pub async fn contribute(client: &ApiClient, id: u64, amount: Amount) -> Result<Out<Value>> {
    let contribution = Resources::new(client).goals.contribute(id, amount).await?;
    let goal = &contribution.goal;
    let current = goal.current_amount.unwrap_or(Amount::ZERO);
    let mut message = format!("Contributed {amount}, goal #{id} is at {current}");
    if let Some(p) = goal
        .target_amount
        .and_then(|target| percentage(current, target))
    {
        message.push_str(&format!(" ({p}%)"));
    }
    if contribution.completed {
        message.push_str(&format!(
            ". Goal '{}' reached!",
            goal.display_name().unwrap_or_default()
        ));
    }
    Ok(Out::new(message, serde_json::to_value(goal)?))
}

fn saved<R: Record + Serialize>(verb: &str, kind: Kind, record: R) -> Result<Out<Value>> {
    let id = record
        .id()
        .map(|id| format!(" #{id}"))
        .unwrap_or_default();
    Ok(Out::new(
        format!("{verb} {kind}{id}\n{}", record.summary()),
        serde_json::to_value(&record)?,
    ))
}

fn required<T>(value: Option<T>, flag: &str) -> Res<T> {
    value.ok_or_else(|| ClientError::validation(format!("--{flag} is required")))
}

/// `fields` with blanks filled from `base`.
fn transaction(fields: &RecordFields, base: Option<&Transaction>) -> Res<NewTransaction> {
    Ok(NewTransaction {
        amount: required(fields.amount.or(base.and_then(|b| b.amount)), "amount")?,
        date: required(fields.date.or(base.and_then(|b| b.date)), "date")?,
        description: required(
            fields
                .description
                .clone()
                .or_else(|| base.and_then(|b| b.description.clone())),
            "description",
        )?,
    })
}

fn recurring(fields: &RecordFields, base: Option<&RecurringExpense>) -> Res<NewRecurringExpense> {
    Ok(NewRecurringExpense {
        amount: required(fields.amount.or(base.and_then(|b| b.amount)), "amount")?,
        description: required(
            fields
                .description
                .clone()
                .or_else(|| base.and_then(|b| b.description.clone())),
            "description",
        )?,
        frequency: fields.frequency.or(base.and_then(|b| b.frequency)),
    })
}

fn savings(fields: &RecordFields, base: Option<&Savings>) -> Res<NewSavings> {
    Ok(NewSavings {
        name: required(
            fields
                .name
                .clone()
                .or_else(|| base.and_then(|b| b.name.clone())),
            "name",
        )?,
        amount: required(fields.amount.or(base.and_then(|b| b.amount)), "amount")?,
        start_date: required(
            fields.start_date.or(base.and_then(|b| b.start_date)),
            "start-date",
        )?,
        end_date: fields.end_date.or(base.and_then(|b| b.end_date)),
        description: fields
            .description
            .clone()
            .or_else(|| base.and_then(|b| b.description.clone())),
    })
}

/// Goals take `--name`, or `--description` as the same thing.
fn goal(fields: &RecordFields, base: Option<&Goal>) -> Res<NewGoal> {
    let name = fields
        .name
        .clone()
        .or_else(|| fields.description.clone())
        .or_else(|| base.and_then(|b| b.display_name()).map(str::to_string));
    Ok(NewGoal::new(
        required(name, "name")?,
        required(
            fields.target.or(base.and_then(|b| b.target_amount)),
            "target",
        )?,
        fields
            .current
            .or(base.and_then(|b| b.current_amount))
            .unwrap_or(Amount::ZERO),
        fields.frequency.or(base.and_then(|b| b.frequency)),
    ))
}
