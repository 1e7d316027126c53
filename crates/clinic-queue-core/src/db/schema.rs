//! SQLite schema definition.

/// Complete database schema for the clinic queue.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Clinics
-- ============================================================================

CREATE TABLE IF NOT EXISTS clinics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    location TEXT,
    created_at TEXT NOT NULL
);

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    age INTEGER,
    gender TEXT,
    document_id TEXT,
    created_at TEXT NOT NULL
);

-- ============================================================================
-- Turns (never deleted; terminal states are sinks)
-- ============================================================================

CREATE TABLE IF NOT EXISTS turns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket_number TEXT NOT NULL UNIQUE,
    sequence INTEGER NOT NULL,
    patient_id INTEGER NOT NULL REFERENCES patients(id),
    clinic_id INTEGER NOT NULL REFERENCES clinics(id),
    created_by INTEGER NOT NULL,
    attended_by INTEGER,
    state TEXT NOT NULL DEFAULT 'waiting'
        CHECK (state IN ('waiting', 'called', 'in_progress', 'done', 'absent', 'cancelled')),
    priority TEXT NOT NULL DEFAULT 'normal'
        CHECK (priority IN ('normal', 'urgent', 'emergency')),
    reason TEXT,
    notes TEXT,
    turn_date TEXT NOT NULL,                     -- YYYY-MM-DD
    registered_at TEXT NOT NULL,
    called_at TEXT,
    attendance_started_at TEXT,
    attendance_ended_at TEXT,
    UNIQUE (clinic_id, turn_date, sequence)
);

CREATE INDEX IF NOT EXISTS idx_turns_clinic_date ON turns(clinic_id, turn_date);
CREATE INDEX IF NOT EXISTS idx_turns_date_state ON turns(turn_date, state);

CREATE TRIGGER IF NOT EXISTS turns_no_delete BEFORE DELETE ON turns
BEGIN
    SELECT RAISE(ABORT, 'Turns are never deleted');
END;

CREATE TRIGGER IF NOT EXISTS turns_terminal_is_final BEFORE UPDATE OF state ON turns
WHEN old.state IN ('done', 'absent', 'cancelled') AND new.state <> old.state
BEGIN
    SELECT RAISE(ABORT, 'Terminal turns cannot change state');
END;

CREATE TRIGGER IF NOT EXISTS turns_priority_fixed BEFORE UPDATE OF priority ON turns
WHEN new.priority <> old.priority
BEGIN
    SELECT RAISE(ABORT, 'Turn priority is fixed at creation');
END;

-- ============================================================================
-- Turn History (Append-Only - Immutable after creation)
-- ============================================================================

CREATE TABLE IF NOT EXISTS turn_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    turn_id INTEGER NOT NULL REFERENCES turns(id),
    actor_id INTEGER NOT NULL,
    prior_state TEXT,                            -- NULL for the creation entry
    new_state TEXT NOT NULL,
    comment TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_turn ON turn_history(turn_id, id);

CREATE TRIGGER IF NOT EXISTS turn_history_no_update BEFORE UPDATE ON turn_history
BEGIN
    SELECT RAISE(ABORT, 'History entries are immutable');
END;

CREATE TRIGGER IF NOT EXISTS turn_history_no_delete BEFORE DELETE ON turn_history
BEGIN
    SELECT RAISE(ABORT, 'History entries are immutable');
END;
"#;
