//! Read-side projections over a day's turns.
//!
//! Ordering is computed at read time; nothing here writes.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use crate::models::{Priority, Turn, TurnDetails, TurnState};
use crate::store::QueueStore;

/// Per-clinic counters and averages for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicStats {
    pub clinic_id: i64,
    pub date: NaiveDate,
    pub total: usize,
    pub waiting: usize,
    pub called: usize,
    pub in_progress: usize,
    pub done: usize,
    pub absent: usize,
    pub cancelled: usize,
    /// Mean minutes from registration to start of attendance, over turns
    /// whose attendance has both started and ended
    pub avg_wait_minutes: f64,
    /// Turns contributing to `avg_wait_minutes`
    pub wait_sample: usize,
    /// Mean minutes from start to end of attendance
    pub avg_attendance_minutes: f64,
    pub attendance_sample: usize,
}

impl ClinicStats {
    /// Aggregate `turns`. Averages are 0.0 over an empty sample.
    pub fn from_turns<'a, I>(clinic_id: i64, date: NaiveDate, turns: I) -> Self
    where
        I: IntoIterator<Item = &'a Turn>,
    {
        let mut stats = ClinicStats {
            clinic_id,
            date,
            total: 0,
            waiting: 0,
            called: 0,
            in_progress: 0,
            done: 0,
            absent: 0,
            cancelled: 0,
            avg_wait_minutes: 0.0,
            wait_sample: 0,
            avg_attendance_minutes: 0.0,
            attendance_sample: 0,
        };
        let mut wait_total = 0.0;
        let mut attendance_total = 0.0;

        for turn in turns {
            stats.total += 1;
            *stats.count_mut(turn.state) += 1;

            // Only finished attendances count towards either average
            if let (Some(wait), Some(attendance)) = (turn.wait_minutes(), turn.attendance_minutes()) {
                wait_total += wait;
                stats.wait_sample += 1;
                attendance_total += attendance;
                stats.attendance_sample += 1;
            }
        }

        stats.avg_wait_minutes = mean(wait_total, stats.wait_sample);
        stats.avg_attendance_minutes = mean(attendance_total, stats.attendance_sample);
        stats
    }

    pub fn count(&self, state: TurnState) -> usize {
        match state {
            TurnState::Waiting => self.waiting,
            TurnState::Called => self.called,
            TurnState::InProgress => self.in_progress,
            TurnState::Done => self.done,
            TurnState::Absent => self.absent,
            TurnState::Cancelled => self.cancelled,
        }
    }

    fn count_mut(&mut self, state: TurnState) -> &mut usize {
        match state {
            TurnState::Waiting => &mut self.waiting,
            TurnState::Called => &mut self.called,
            TurnState::InProgress => &mut self.in_progress,
            TurnState::Done => &mut self.done,
            TurnState::Absent => &mut self.absent,
            TurnState::Cancelled => &mut self.cancelled,
        }
    }
}

fn mean(total: f64, sample: usize) -> f64 {
    if sample == 0 {
        0.0
    } else {
        total / sample as f64
    }
}

/// One row of the kiosk display. Carries the patient's name only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardEntry {
    pub ticket_number: String,
    pub clinic_id: i64,
    pub clinic_name: String,
    pub patient_name: String,
    pub state: TurnState,
    pub priority: Priority,
    pub called_at: Option<DateTime<Utc>>,
}

impl From<&TurnDetails> for BoardEntry {
    fn from(details: &TurnDetails) -> Self {
        BoardEntry {
            ticket_number: details.turn.ticket_number.clone(),
            clinic_id: details.turn.clinic_id,
            clinic_name: details.clinic_name.clone(),
            patient_name: details.patient_name.clone(),
            state: details.turn.state,
            priority: details.turn.priority,
            called_at: details.turn.called_at,
        }
    }
}

/// Active turns in queue order.
pub fn active_in_order(mut turns: Vec<TurnDetails>) -> Vec<TurnDetails> {
    turns.retain(|d| d.turn.state.is_active());
    turns.sort_by(|a, b| Turn::queue_order(&a.turn, &b.turn));
    turns
}

/// Waiting turns in queue order, at most `limit` of them.
pub fn waiting_in_order(mut turns: Vec<TurnDetails>, limit: usize) -> Vec<TurnDetails> {
    turns.retain(|d| d.turn.state == TurnState::Waiting);
    turns.sort_by(|a, b| Turn::queue_order(&a.turn, &b.turn));
    turns.truncate(limit);
    turns
}

/// Board ordering: clinic, then most recently called first.
fn board_order(a: &TurnDetails, b: &TurnDetails) -> Ordering {
    a.turn
        .clinic_id
        .cmp(&b.turn.clinic_id)
        .then_with(|| b.turn.called_at.cmp(&a.turn.called_at))
        .then_with(|| a.turn.id.cmp(&b.turn.id))
}

/// Queue projections backed by a [`QueueStore`].
pub struct QueueQueries<'a, S> {
    store: &'a S,
    board_limit: usize,
}

impl<'a, S: QueueStore> QueueQueries<'a, S> {
    pub fn new(store: &'a S, board_limit: usize) -> Self {
        Self { store, board_limit }
    }

    /// Waiting, called and in-progress turns: priority first, then FIFO.
    pub fn active_queue(&self, clinic_id: i64, date: NaiveDate) -> DbResult<Vec<TurnDetails>> {
        let turns = self.store.list_turns(date, Some(clinic_id))?;
        Ok(active_in_order(turns))
    }

    /// The waiting turn that should be called next.
    pub fn next(&self, clinic_id: i64, date: NaiveDate) -> DbResult<Option<TurnDetails>> {
        Ok(self
            .active_queue(clinic_id, date)?
            .into_iter()
            .find(|d| d.turn.state == TurnState::Waiting))
    }

    pub fn statistics(&self, clinic_id: i64, date: NaiveDate) -> DbResult<ClinicStats> {
        let turns = self.store.list_turns(date, Some(clinic_id))?;
        Ok(ClinicStats::from_turns(
            clinic_id,
            date,
            turns.iter().map(|d| &d.turn),
        ))
    }

    /// Waiting turns of every clinic (or one), next to be called first.
    /// Shares the board's size cap.
    pub fn waiting_list(&self, date: NaiveDate, clinic_id: Option<i64>) -> DbResult<Vec<TurnDetails>> {
        let turns = self.store.list_turns(date, clinic_id)?;
        Ok(waiting_in_order(turns, self.board_limit))
    }

    /// Called and in-progress turns for the kiosk, all clinics unless filtered.
    pub fn public_board(&self, date: NaiveDate, clinic_id: Option<i64>) -> DbResult<Vec<BoardEntry>> {
        let mut turns = self.store.list_turns(date, clinic_id)?;
        turns.retain(|d| matches!(d.turn.state, TurnState::Called | TurnState::InProgress));
        turns.sort_by(board_order);
        Ok(turns
            .iter()
            .take(self.board_limit)
            .map(BoardEntry::from)
            .collect())
    }
}
