//! Database schema migrations.
//!
//! Each entry is applied once, in order, inside its own transaction.
//! Never edit an applied migration; append a new one instead.

/// All schema migrations, oldest first.
pub const MIGRATIONS: &[&str] = &[
    // v1: users, roles, attempt log, sessions
    r#"
    CREATE TABLE users (
        id                  INTEGER PRIMARY KEY AUTOINCREMENT,
        email               TEXT NOT NULL COLLATE NOCASE UNIQUE,
        password_hash       TEXT NOT NULL,
        first_name          TEXT NOT NULL DEFAULT '',
        last_name           TEXT NOT NULL DEFAULT '',
        is_active           INTEGER NOT NULL DEFAULT 1,
        two_factor_enabled  INTEGER NOT NULL DEFAULT 0,
        two_factor_secret   TEXT,
        created_at          TEXT NOT NULL,
        last_login_at       TEXT,
        last_login_ip       TEXT,
        last_activity_at    TEXT
    );

    CREATE TABLE user_roles (
        user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role        TEXT NOT NULL,
        PRIMARY KEY (user_id, role)
    );

    CREATE TABLE login_attempts (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id         INTEGER,
        email           TEXT NOT NULL COLLATE NOCASE,
        succeeded       INTEGER NOT NULL,
        failure_reason  TEXT,
        ip_address      TEXT NOT NULL,
        user_agent      TEXT NOT NULL,
        occurred_at     TEXT NOT NULL
    );

    CREATE INDEX idx_login_attempts_email_time
        ON login_attempts(email, occurred_at);

    CREATE TABLE sessions (
        id                  INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id             INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        token               TEXT NOT NULL,
        ip_address          TEXT NOT NULL,
        user_agent          TEXT NOT NULL,
        created_at          TEXT NOT NULL,
        expires_at          TEXT NOT NULL,
        last_activity_at    TEXT NOT NULL,
        is_active           INTEGER NOT NULL DEFAULT 1
    );

    CREATE INDEX idx_sessions_user_token ON sessions(user_id, token);
    "#,
];
