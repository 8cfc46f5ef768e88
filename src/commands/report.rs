//! The `report` command: fetches records and runs them through the aggregation functions.

use crate::api::ApiClient;
use crate::args::{Kind, Report};
use crate::commands::records::Records;
use crate::commands::Out;
use crate::model::Record;
use crate::report::{
    goal_progress, group_by_label, monthly_evolution, summary, top_n, total, Entry, Group,
    KeywordTable, Window,
};
use crate::resources::Resources;
use crate::{Config, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Write;

/// Computes `report` from what the server currently holds. `today` anchors the monthly evolution.
pub async fn report(
    client: &ApiClient,
    config: &Config,
    report: &Report,
    today: NaiveDate,
) -> Result<Out<Value>> {
    let resources = Resources::new(client);
    match report {
        Report::Summary => summary_report(&resources).await,
        Report::Totals => totals_report(&resources).await,
        Report::Top { kind, n } => {
            let n = n.unwrap_or(config.top_n());
            match Records::fetch(&resources, *kind).await? {
                Records::Transactions(records) => top_report(*kind, &records, n),
                Records::Recurring(records) => top_report(*kind, &records, n),
                Records::Savings(records) => top_report(*kind, &records, n),
                Records::Goals(records) => top_report(*kind, &records, n),
            }
        }
        Report::Categories { kind, by_label } => {
            let table = (!by_label).then(|| config.keyword_table());
            let groups = match Records::fetch(&resources, *kind).await? {
                Records::Transactions(records) => groups(table.as_ref(), &records),
                Records::Recurring(records) => groups(table.as_ref(), &records),
                Records::Savings(records) => groups(table.as_ref(), &records),
                Records::Goals(records) => groups(table.as_ref(), &records),
            };
            categories_report(*kind, groups)
        }
        Report::Evolution { months } => evolution_report(&resources, today, *months).await,
        Report::Goals => goals_report(&resources).await,
    }
}

async fn summary_report(resources: &Resources) -> Result<Out<Value>> {
    let (incomes, expenses, recurring, savings, goals) = tokio::try_join!(
        resources.incomes.list(),
        resources.expenses.list(),
        resources.recurring.list(),
        resources.savings.list(),
        resources.goals.list(),
    )?;
    let s = summary(&incomes, &expenses, &recurring, &savings, &goals);
    let message = format!(
        "Income:             {:>12}\n\
         Expenses:           {:>12}\n\
         Balance:            {:>12}\n\
         Recurring expenses: {:>12}\n\
         Savings:            {:>12}\n\
         Saved for goals:    {:>12}",
        s.income, s.expenses, s.balance, s.recurring, s.savings, s.goals_saved
    );
    structured(message, &s)
}

async fn totals_report(resources: &Resources) -> Result<Out<Value>> {
    let (incomes, expenses, recurring, savings, goals) = tokio::try_join!(
        resources.incomes.list(),
        resources.expenses.list(),
        resources.recurring.list(),
        resources.savings.list(),
        resources.goals.list(),
    )?;
    let totals = [
        (Kind::Income, total(&incomes), incomes.len()),
        (Kind::Expense, total(&expenses), expenses.len()),
        (Kind::Recurring, total(&recurring), recurring.len()),
        (Kind::Savings, total(&savings), savings.len()),
        (Kind::Goal, total(&goals), goals.len()),
    ];
    let mut message = String::from("Totals");
    let mut structure = serde_json::Map::new();
    for (kind, amount, count) in totals {
        let _ = write!(
            message,
            "\n{:<10} {:>12}  ({count} records)",
            kind.to_string(),
            amount
        );
        structure.insert(kind.to_string(), json!({ "total": amount, "count": count }));
    }
    Ok(Out::new(message, Value::Object(structure)))
}

fn top_report<R>(kind: Kind, records: &[R], n: usize) -> Result<Out<Value>>
where
    R: Entry + Record + Serialize,
{
    let top = top_n(records, n);
    let mut message = format!("Top {} {kind} records", top.len());
    for record in &top {
        message.push('\n');
        message.push_str(&record.summary());
    }
    structured(message, &top)
}

fn groups<E: Entry>(table: Option<&KeywordTable>, entries: &[E]) -> Vec<Group> {
    match table {
        Some(table) => table.group_by_category(entries),
        None => group_by_label(entries),
    }
}

fn categories_report(kind: Kind, groups: Vec<Group>) -> Result<Out<Value>> {
    let mut message = format!("{kind} by category");
    for group in &groups {
        let _ = write!(
            message,
            "\n{:<24} {:>12}  ({} records)",
            group.label, group.total, group.count
        );
    }
    structured(message, &groups)
}

async fn evolution_report(
    resources: &Resources,
    today: NaiveDate,
    window: Window,
) -> Result<Out<Value>> {
    let (incomes, expenses, savings) = tokio::try_join!(
        resources.incomes.list(),
        resources.expenses.list(),
        resources.savings.list(),
    )?;
    let points = monthly_evolution(today, window, &incomes, &expenses, &savings);
    let mut message = format!(
        "{:<8} {:>12} {:>12} {:>12} {:>12}",
        "Month", "Income", "Expense", "Balance", "Savings"
    );
    for p in &points {
        let _ = write!(
            message,
            "\n{:<8} {:>12} {:>12} {:>12} {:>12}",
            p.to_string(),
            p.income,
            p.expense,
            p.balance,
            p.savings
        );
    }
    structured(message, &points)
}

async fn goals_report(resources: &Resources) -> Result<Out<Value>> {
    let progress = goal_progress(&resources.goals.list().await?);
    let mut message = format!("{} goals", progress.len());
    for g in &progress {
        let percent = g
            .percentage
            .map(|p| format!("{p}%"))
            .unwrap_or_else(|| "-".into());
        let done = if g.completed { "  done" } else { "" };
        let _ = write!(
            message,
            "\n{:<24} {:>12} / {:<12} {:>5}{done}",
            g.name, g.current, g.target, percent
        );
    }
    structured(message, &progress)
}

fn structured<T: Serialize + ?Sized>(message: String, value: &T) -> Result<Out<Value>> {
    Ok(Out::new(message, serde_json::to_value(value)?))
}
