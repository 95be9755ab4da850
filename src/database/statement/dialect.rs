//! Per-dialect statement factories and schema scripts.

use std::fmt;

use super::StatementFactory;
use crate::record::LookupOptions;

/// SQL dialects with a statement factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Sqlite,
    Postgres,
    MySql,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
        }
    }

    /// The statement factory for this dialect.
    pub fn statements(self, defaults: LookupOptions) -> Box<dyn StatementFactory> {
        match self {
            Self::Sqlite => Box::new(SqliteStatements::new(defaults)),
            Self::Postgres => Box::new(PostgresStatements::new(defaults)),
            Self::MySql => Box::new(MySqlStatements::new(defaults)),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a DDL script into executable statements.
///
/// Strips `--` line comments and `/* */` block comments, then splits on `;`.
/// Scripts must not put either comment marker or `;` inside string literals.
pub fn split_script(script: &str) -> Vec<String> {
    let mut stripped = String::with_capacity(script.len());
    let mut rest = script;

    while !rest.is_empty() {
        let line = rest.find("--");
        let block = rest.find("/*");
        match (line, block) {
            (Some(l), b) if b.is_none_or(|b| l < b) => {
                stripped.push_str(&rest[..l]);
                rest = rest[l..].find('\n').map_or("", |end| &rest[l + end..]);
            }
            (_, Some(b)) => {
                stripped.push_str(&rest[..b]);
                stripped.push(' ');
                rest = rest[b + 2..].find("*/").map_or("", |end| &rest[b + 2 + end + 2..]);
            }
            _ => {
                stripped.push_str(rest);
                rest = "";
            }
        }
    }

    stripped
        .split(';')
        .map(|statement| statement.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|statement| !statement.is_empty())
        .collect()
}

const SQLITE_SCHEMA: &str = r#"
-- Timestamps are stored as fixed-width text, booleans as 0/1.
CREATE TABLE IF NOT EXISTS players (
    uuid        VARCHAR(36) PRIMARY KEY NOT NULL,
    username    VARCHAR(16) NOT NULL,
    lastIP      VARCHAR(45),
    firstJoin   TEXT NOT NULL,
    lastJoin    TEXT NOT NULL,
    lastLeave   TEXT,
    lastServer  VARCHAR(64),
    playtime    INTEGER NOT NULL DEFAULT 0,  -- milliseconds
    totalJoins  INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_players_username ON players (username);

CREATE TABLE IF NOT EXISTS bans (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    status          VARCHAR(8) NOT NULL,
    playerUuid      VARCHAR(36),
    staffUuid       VARCHAR(36),
    unbanStaffUuid  VARCHAR(36),
    playerIP        VARCHAR(45),
    banDate         TEXT NOT NULL,
    unbanDate       TEXT,
    contexts        VARCHAR(64),
    reason          TEXT,
    unbanReason     TEXT
);
CREATE INDEX IF NOT EXISTS idx_bans_player ON bans (playerUuid);
CREATE INDEX IF NOT EXISTS idx_bans_address ON bans (playerIP);
CREATE INDEX IF NOT EXISTS idx_bans_staff ON bans (staffUuid);

CREATE TABLE IF NOT EXISTS mutes (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    status           VARCHAR(8) NOT NULL,
    playerUuid       VARCHAR(36),
    staffUuid        VARCHAR(36),
    unmuteStaffUuid  VARCHAR(36),
    playerIP         VARCHAR(45),
    muteDate         TEXT NOT NULL,
    unmuteDate       TEXT,
    contexts         VARCHAR(64),
    reason           TEXT,
    unmuteReason     TEXT
);
CREATE INDEX IF NOT EXISTS idx_mutes_player ON mutes (playerUuid);
CREATE INDEX IF NOT EXISTS idx_mutes_address ON mutes (playerIP);
CREATE INDEX IF NOT EXISTS idx_mutes_staff ON mutes (staffUuid);

CREATE TABLE IF NOT EXISTS kicks (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    playerUuid  VARCHAR(36) NOT NULL,
    staffUuid   VARCHAR(36),
    kickDate    TEXT NOT NULL,
    isGlobal    INTEGER NOT NULL DEFAULT 0,
    reason      TEXT
);
CREATE INDEX IF NOT EXISTS idx_kicks_player ON kicks (playerUuid);

/* Comments double as warnings when isWarning is set. */
CREATE TABLE IF NOT EXISTS comments (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    playerUuid  VARCHAR(36) NOT NULL,
    staffUuid   VARCHAR(36),
    dateAdded   TEXT NOT NULL,
    isWarning   INTEGER NOT NULL DEFAULT 0,
    comment     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_comments_player ON comments (playerUuid);
"#;

const POSTGRES_SCHEMA: &str = r#"
-- Unquoted identifiers fold to lowercase; rows are read back case-insensitively.
CREATE TABLE IF NOT EXISTS players (
    uuid        VARCHAR(36) PRIMARY KEY,
    username    VARCHAR(16) NOT NULL,
    lastIP      VARCHAR(45),
    firstJoin   TIMESTAMP NOT NULL,
    lastJoin    TIMESTAMP NOT NULL,
    lastLeave   TIMESTAMP,
    lastServer  VARCHAR(64),
    playtime    BIGINT NOT NULL DEFAULT 0,
    totalJoins  BIGINT NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_players_username ON players (username);

CREATE TABLE IF NOT EXISTS bans (
    id              BIGSERIAL PRIMARY KEY,
    status          VARCHAR(8) NOT NULL,
    playerUuid      VARCHAR(36),
    staffUuid       VARCHAR(36),
    unbanStaffUuid  VARCHAR(36),
    playerIP        VARCHAR(45),
    banDate         TIMESTAMP NOT NULL,
    unbanDate       TIMESTAMP,
    contexts        VARCHAR(64),
    reason          TEXT,
    unbanReason     TEXT
);
CREATE INDEX IF NOT EXISTS idx_bans_player ON bans (playerUuid);
CREATE INDEX IF NOT EXISTS idx_bans_address ON bans (playerIP);
CREATE INDEX IF NOT EXISTS idx_bans_staff ON bans (staffUuid);

CREATE TABLE IF NOT EXISTS mutes (
    id               BIGSERIAL PRIMARY KEY,
    status           VARCHAR(8) NOT NULL,
    playerUuid       VARCHAR(36),
    staffUuid        VARCHAR(36),
    unmuteStaffUuid  VARCHAR(36),
    playerIP         VARCHAR(45),
    muteDate         TIMESTAMP NOT NULL,
    unmuteDate       TIMESTAMP,
    contexts         VARCHAR(64),
    reason           TEXT,
    unmuteReason     TEXT
);
CREATE INDEX IF NOT EXISTS idx_mutes_player ON mutes (playerUuid);
CREATE INDEX IF NOT EXISTS idx_mutes_address ON mutes (playerIP);
CREATE INDEX IF NOT EXISTS idx_mutes_staff ON mutes (staffUuid);

CREATE TABLE IF NOT EXISTS kicks (
    id          BIGSERIAL PRIMARY KEY,
    playerUuid  VARCHAR(36) NOT NULL,
    staffUuid   VARCHAR(36),
    kickDate    TIMESTAMP NOT NULL,
    isGlobal    BOOLEAN NOT NULL DEFAULT FALSE,
    reason      TEXT
);
CREATE INDEX IF NOT EXISTS idx_kicks_player ON kicks (playerUuid);

CREATE TABLE IF NOT EXISTS comments (
    id          BIGSERIAL PRIMARY KEY,
    playerUuid  VARCHAR(36) NOT NULL,
    staffUuid   VARCHAR(36),
    dateAdded   TIMESTAMP NOT NULL,
    isWarning   BOOLEAN NOT NULL DEFAULT FALSE,
    comment     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_comments_player ON comments (playerUuid);
"#;

const MYSQL_SCHEMA: &str = r#"
-- MySQL has no CREATE INDEX IF NOT EXISTS, so indexes are declared inline.
CREATE TABLE IF NOT EXISTS players (
    uuid        VARCHAR(36) NOT NULL PRIMARY KEY,
    username    VARCHAR(16) NOT NULL,
    lastIP      VARCHAR(45),
    firstJoin   DATETIME(6) NOT NULL,
    lastJoin    DATETIME(6) NOT NULL,
    lastLeave   DATETIME(6),
    lastServer  VARCHAR(64),
    playtime    BIGINT NOT NULL DEFAULT 0,
    totalJoins  BIGINT NOT NULL DEFAULT 0,
    INDEX idx_players_username (username)
);

CREATE TABLE IF NOT EXISTS bans (
    id              BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    status          VARCHAR(8) NOT NULL,
    playerUuid      VARCHAR(36),
    staffUuid       VARCHAR(36),
    unbanStaffUuid  VARCHAR(36),
    playerIP        VARCHAR(45),
    banDate         DATETIME(6) NOT NULL,
    unbanDate       DATETIME(6),
    contexts        VARCHAR(64),
    reason          TEXT,
    unbanReason     TEXT,
    INDEX idx_bans_player (playerUuid),
    INDEX idx_bans_address (playerIP),
    INDEX idx_bans_staff (staffUuid)
);

CREATE TABLE IF NOT EXISTS mutes (
    id               BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    status           VARCHAR(8) NOT NULL,
    playerUuid       VARCHAR(36),
    staffUuid        VARCHAR(36),
    unmuteStaffUuid  VARCHAR(36),
    playerIP         VARCHAR(45),
    muteDate         DATETIME(6) NOT NULL,
    unmuteDate       DATETIME(6),
    contexts         VARCHAR(64),
    reason           TEXT,
    unmuteReason     TEXT,
    INDEX idx_mutes_player (playerUuid),
    INDEX idx_mutes_address (playerIP),
    INDEX idx_mutes_staff (staffUuid)
);

CREATE TABLE IF NOT EXISTS kicks (
    id          BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    playerUuid  VARCHAR(36) NOT NULL,
    staffUuid   VARCHAR(36),
    kickDate    DATETIME(6) NOT NULL,
    isGlobal    BOOLEAN NOT NULL DEFAULT FALSE,
    reason      TEXT,
    INDEX idx_kicks_player (playerUuid)
);

CREATE TABLE IF NOT EXISTS comments (
    id          BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    playerUuid  VARCHAR(36) NOT NULL,
    staffUuid   VARCHAR(36),
    dateAdded   DATETIME(6) NOT NULL,
    isWarning   BOOLEAN NOT NULL DEFAULT FALSE,
    comment     TEXT NOT NULL,
    INDEX idx_comments_player (playerUuid)
);
"#;

/// Embedded SQLite, plain or encrypted.
#[derive(Debug, Clone)]
pub struct SqliteStatements {
    defaults: LookupOptions,
}

impl SqliteStatements {
    pub fn new(defaults: LookupOptions) -> Self {
        Self { defaults }
    }
}

impl StatementFactory for SqliteStatements {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn schema(&self) -> &'static str {
        SQLITE_SCHEMA
    }

    fn default_options(&self) -> &LookupOptions {
        &self.defaults
    }
}

/// PostgreSQL: numbered placeholders and `RETURNING id`.
#[derive(Debug, Clone)]
pub struct PostgresStatements {
    defaults: LookupOptions,
}

impl PostgresStatements {
    pub fn new(defaults: LookupOptions) -> Self {
        Self { defaults }
    }
}

impl StatementFactory for PostgresStatements {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn schema(&self) -> &'static str {
        POSTGRES_SCHEMA
    }

    fn default_options(&self) -> &LookupOptions {
        &self.defaults
    }

    fn render(&self, sql: String) -> String {
        let mut rendered = String::with_capacity(sql.len() + 16);
        let mut index = 0;
        for ch in sql.chars() {
            if ch == '?' {
                index += 1;
                rendered.push('$');
                rendered.push_str(&index.to_string());
            } else {
                rendered.push(ch);
            }
        }
        rendered
    }

    fn generated_key_clause(&self) -> &'static str {
        " RETURNING id"
    }
}

/// MySQL and MariaDB.
#[derive(Debug, Clone)]
pub struct MySqlStatements {
    defaults: LookupOptions,
}

impl MySqlStatements {
    pub fn new(defaults: LookupOptions) -> Self {
        Self { defaults }
    }
}

impl StatementFactory for MySqlStatements {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn schema(&self) -> &'static str {
        MYSQL_SCHEMA
    }

    fn default_options(&self) -> &LookupOptions {
        &self.defaults
    }
}
