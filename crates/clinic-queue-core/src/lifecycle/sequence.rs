//! Ticket number generation.
//!
//! ```text
//! "Clínica Níño Feliz", clinic 3, 2024-11-09, 1st ticket
//!   NFD + drop marks   → "Clinica Nino Feliz"
//!   ASCII alnum only   → "ClinicaNinoFeliz"
//!   first 3, upper     → "CLI"
//!   ticket             → "CLI-3-1109-001"
//! ```
//!
//! The sequence is the number of turns already issued for the clinic that
//! day plus one. Two creations that read the same count race for the same
//! ticket; the unique index on `ticket_number` lets only one of them commit.

use chrono::NaiveDate;
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::db::DbResult;
use crate::store::QueueStore;

/// Prefix length; shorter names are padded with `X`.
const PREFIX_LEN: usize = 3;

/// Derive the 3-character ticket prefix from a clinic name.
pub fn clinic_prefix(clinic_name: &str) -> String {
    let mut prefix: String = clinic_name
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(char::is_ascii_alphanumeric)
        .take(PREFIX_LEN)
        .collect::<String>()
        .to_ascii_uppercase();

    while prefix.len() < PREFIX_LEN {
        prefix.push('X');
    }
    prefix
}

/// `{prefix}-{clinicId}-{MMDD}-{sequence:03}`
pub fn format_ticket_number(prefix: &str, clinic_id: i64, date: NaiveDate, sequence: u32) -> String {
    format!(
        "{}-{}-{}-{:03}",
        prefix,
        clinic_id,
        date.format("%m%d"),
        sequence
    )
}

/// A reserved-by-count ticket, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketAllocation {
    pub sequence: u32,
    pub ticket_number: String,
}

/// Computes the next ticket number for a clinic and day.
pub struct SequenceGenerator<'a, S> {
    store: &'a S,
}

impl<'a, S: QueueStore> SequenceGenerator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Next ticket for `(clinic_id, date)`.
    pub fn next_ticket_number(
        &self,
        clinic_id: i64,
        clinic_name: &str,
        date: NaiveDate,
    ) -> DbResult<TicketAllocation> {
        let issued = self.store.count_turns_for_day(clinic_id, date)?;
        let sequence = issued + 1;
        let ticket_number = format_ticket_number(&clinic_prefix(clinic_name), clinic_id, date, sequence);

        debug!(clinic_id, %date, issued, %ticket_number, "Allocated ticket number");

        Ok(TicketAllocation {
            sequence,
            ticket_number,
        })
    }
}
