use crate::domain::report::{
    DueReportSetting, NewReportRecord, OutcomeWrite, ReportOutcome, ReportSetting, User,
};
use crate::domain::transaction::{LedgerEntry, NewTransaction, RecurringTemplate};
use crate::storage::{
    DueScan, InvalidSetting, InvalidTemplate, Materialized, Store, TemplateScan,
};
use crate::time::period::ReportPeriod;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    templates: Vec<RecurringTemplate>,
    invalid_templates: Vec<(Uuid, String)>,
    next_recurring: HashMap<Uuid, NaiveDate>,
    transactions: Vec<(Uuid, NewTransaction)>,
    ledger: Vec<(Uuid, LedgerEntry)>,
    users: Vec<User>,
    settings: Vec<ReportSetting>,
    invalid_settings: Vec<(Uuid, Uuid, String)>,
    reports: Vec<NewReportRecord>,
    fail_insert: HashSet<Uuid>,
    fail_ledger: HashSet<Uuid>,
    fail_record: HashSet<Uuid>,
    race_insert: HashSet<Uuid>,
    advance_on_read: HashMap<Uuid, DateTime<Utc>>,
}

/// In-process `Store` for job tests, with per-entity failure injection.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_template(&self, template: RecurringTemplate) {
        self.state.lock().unwrap().templates.push(template);
    }

    pub fn add_invalid_template(&self, id: Uuid, reason: &str) {
        self.state
            .lock()
            .unwrap()
            .invalid_templates
            .push((id, reason.to_string()));
    }

    pub fn add_ledger_entry(&self, user_id: Uuid, entry: LedgerEntry) {
        self.state.lock().unwrap().ledger.push((user_id, entry));
    }

    pub fn add_user(&self, user: User) {
        self.state.lock().unwrap().users.push(user);
    }

    pub fn add_setting(&self, setting: ReportSetting) {
        self.state.lock().unwrap().settings.push(setting);
    }

    pub fn add_invalid_setting(&self, id: Uuid, user_id: Uuid, reason: &str) {
        self.state
            .lock()
            .unwrap()
            .invalid_settings
            .push((id, user_id, reason.to_string()));
    }

    /// An overlapping run inserts the same child just before this store
    /// does, after `find_materialized` already answered `None`.
    pub fn race_insert_for(&self, template_id: Uuid) {
        self.state.lock().unwrap().race_insert.insert(template_id);
    }

    /// An overlapping run moves the setting to `next` right after it is read
    /// as due.
    pub fn advance_on_read(&self, setting_id: Uuid, next: DateTime<Utc>) {
        self.state
            .lock()
            .unwrap()
            .advance_on_read
            .insert(setting_id, next);
    }

    pub fn fail_insert_for(&self, template_id: Uuid) {
        self.state.lock().unwrap().fail_insert.insert(template_id);
    }

    pub fn fail_ledger_for(&self, user_id: Uuid) {
        self.state.lock().unwrap().fail_ledger.insert(user_id);
    }

    pub fn fail_record_for(&self, setting_id: Uuid) {
        self.state.lock().unwrap().fail_record.insert(setting_id);
    }

    pub fn materialized(&self) -> Vec<NewTransaction> {
        let state = self.state.lock().unwrap();
        state.transactions.iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn template(&self, id: Uuid) -> Option<RecurringTemplate> {
        let state = self.state.lock().unwrap();
        state.templates.iter().find(|t| t.id == id).cloned()
    }

    pub fn next_recurring_date(&self, id: Uuid) -> Option<NaiveDate> {
        self.state.lock().unwrap().next_recurring.get(&id).copied()
    }

    pub fn setting(&self, id: Uuid) -> Option<ReportSetting> {
        let state = self.state.lock().unwrap();
        state.settings.iter().find(|s| s.id == id).cloned()
    }

    pub fn reports(&self) -> Vec<NewReportRecord> {
        self.state.lock().unwrap().reports.clone()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn recurring_templates(&self) -> anyhow::Result<TemplateScan> {
        let state = self.state.lock().unwrap();
        let mut scan: TemplateScan = state.templates.iter().cloned().map(Ok).collect();
        scan.extend(state.invalid_templates.iter().map(|(id, reason)| {
            Err(InvalidTemplate {
                id: *id,
                error: anyhow::anyhow!("{reason}"),
            })
        }));
        Ok(scan)
    }

    async fn find_materialized(
        &self,
        template_id: Uuid,
        date: NaiveDate,
    ) -> anyhow::Result<Option<Uuid>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .transactions
            .iter()
            .find(|(_, t)| t.recurring_parent_id == Some(template_id) && t.date == date)
            .map(|(id, _)| *id))
    }

    async fn insert_materialized(
        &self,
        transaction: &NewTransaction,
        next_recurring_date: NaiveDate,
    ) -> anyhow::Result<Materialized> {
        let mut state = self.state.lock().unwrap();
        let parent_id = transaction
            .recurring_parent_id
            .ok_or_else(|| anyhow::anyhow!("materialized transaction without parent"))?;
        if state.fail_insert.contains(&parent_id) {
            anyhow::bail!("insert transactions failed (template={parent_id})");
        }

        if state.race_insert.remove(&parent_id) {
            state.transactions.push((Uuid::new_v4(), transaction.clone()));
        }

        let duplicate = state
            .transactions
            .iter()
            .any(|(_, t)| t.recurring_parent_id == Some(parent_id) && t.date == transaction.date);
        if duplicate {
            return Ok(Materialized::AlreadyExists);
        }

        let id = Uuid::new_v4();
        state.transactions.push((id, transaction.clone()));
        state.ledger.push((
            transaction.user_id,
            LedgerEntry {
                kind: transaction.kind,
                amount: transaction.amount,
                category: transaction.category.clone(),
                date: transaction.date,
            },
        ));
        if let Some(parent) = state.templates.iter_mut().find(|t| t.id == parent_id) {
            parent.last_processed = Some(transaction.date);
        }
        state.next_recurring.insert(parent_id, next_recurring_date);
        Ok(Materialized::Inserted(id))
    }

    async fn ledger_entries(
        &self,
        user_id: Uuid,
        period: ReportPeriod,
    ) -> anyhow::Result<Vec<LedgerEntry>> {
        let state = self.state.lock().unwrap();
        if state.fail_ledger.contains(&user_id) {
            anyhow::bail!("select transactions failed (user={user_id})");
        }
        Ok(state
            .ledger
            .iter()
            .filter(|(owner, e)| *owner == user_id && period.contains(e.date))
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn due_report_settings(&self, now: DateTime<Utc>) -> anyhow::Result<DueScan> {
        let mut state = self.state.lock().unwrap();
        let mut due: Vec<DueReportSetting> = state
            .settings
            .iter()
            .filter(|s| s.is_enabled && s.next_report_date.is_some_and(|d| d <= now))
            .map(|s| DueReportSetting {
                setting: s.clone(),
                user: state.users.iter().find(|u| u.id == s.user_id).cloned(),
            })
            .collect();
        due.sort_by_key(|d| (d.setting.next_report_date, d.setting.id));

        let moves: Vec<(Uuid, DateTime<Utc>)> = state.advance_on_read.drain().collect();
        for (id, next) in moves {
            if let Some(setting) = state.settings.iter_mut().find(|s| s.id == id) {
                setting.next_report_date = Some(next);
            }
        }

        let mut scan: DueScan = due.into_iter().map(Ok).collect();
        scan.extend(state.invalid_settings.iter().map(|(id, user_id, reason)| {
            Err(InvalidSetting {
                id: *id,
                user_id: *user_id,
                error: anyhow::anyhow!("{reason}"),
            })
        }));
        Ok(scan)
    }

    async fn record_report_outcome(
        &self,
        outcome: &ReportOutcome,
    ) -> anyhow::Result<OutcomeWrite> {
        let mut state = self.state.lock().unwrap();
        if state.fail_record.contains(&outcome.setting_id) {
            anyhow::bail!("update report_settings failed (setting={})", outcome.setting_id);
        }

        let Some(setting) = state
            .settings
            .iter_mut()
            .find(|s| s.id == outcome.setting_id)
        else {
            return Ok(OutcomeWrite::Superseded);
        };
        if setting.next_report_date != outcome.observed_next_report_date {
            return Ok(OutcomeWrite::Superseded);
        }

        setting.next_report_date = Some(outcome.next_report_date);
        if let Some(sent) = outcome.last_sent_date {
            setting.last_sent_date = Some(sent);
        }
        state.reports.push(outcome.record.clone());
        Ok(OutcomeWrite::Recorded)
    }
}
