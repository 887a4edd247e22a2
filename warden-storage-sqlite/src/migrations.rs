//! Embedded schema for the SQLite backend.
//!
//! Statements are idempotent and applied in order by
//! [`SqliteRepositoryProvider::migrate`](crate::SqliteRepositoryProvider).

pub(crate) const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        phone TEXT NOT NULL UNIQUE,
        first_name TEXT NOT NULL DEFAULT '',
        last_name TEXT NOT NULL DEFAULT '',
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'user',
        has_access INTEGER NOT NULL DEFAULT 0,
        access_changed_by TEXT,
        access_changed_at INTEGER,
        failed_login_attempts INTEGER NOT NULL DEFAULT 0,
        lock_until INTEGER,
        last_login_at INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS login_attempts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL,
        account_id TEXT,
        success INTEGER NOT NULL,
        failure_reason TEXT,
        ip_address TEXT,
        user_agent TEXT,
        browser TEXT,
        os TEXT,
        is_mobile INTEGER NOT NULL DEFAULT 0,
        location TEXT,
        attempted_at INTEGER NOT NULL,
        session_duration_secs INTEGER,
        suspicious INTEGER NOT NULL DEFAULT 0,
        suspicious_reasons TEXT
    )
    "#,
    // The window queries recount by identity or origin over recent rows
    "CREATE INDEX IF NOT EXISTS idx_login_attempts_email_attempted_at
        ON login_attempts (email, attempted_at)",
    "CREATE INDEX IF NOT EXISTS idx_login_attempts_ip_attempted_at
        ON login_attempts (ip_address, attempted_at)",
    "CREATE INDEX IF NOT EXISTS idx_login_attempts_attempted_at
        ON login_attempts (attempted_at)",
];
