//! History repository: bounded rolling conversation log per user

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use crate::{Error, Result};

/// Maximum turns retained per user; older turns are pruned on append
pub const HISTORY_CAP: usize = 100;

/// A single conversation turn
#[derive(Debug, Clone, serde::Serialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Turn role
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// History repository
#[derive(Clone)]
pub struct HistoryRepo {
    pool: DbPool,
}

impl HistoryRepo {
    /// Create a new history repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append a turn to a user's log, pruning anything beyond the cap
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn append_turn(&self, user_id: &str, role: TurnRole, content: &str) -> Result<Turn> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let seq: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(seq) + 1, 0) FROM turns WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO turns (id, user_id, role, content, created_at, seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![&id, user_id, role.as_str(), content, &now_str, seq],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        // Keep only the newest HISTORY_CAP turns
        #[allow(clippy::cast_possible_wrap)]
        conn.execute(
            "DELETE FROM turns WHERE user_id = ?1 AND id NOT IN (
                 SELECT id FROM turns WHERE user_id = ?1
                 ORDER BY seq DESC LIMIT ?2
             )",
            rusqlite::params![user_id, HISTORY_CAP as i64],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Turn {
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    /// Get the most recent turns for a user, in chronological order
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get_history(&self, user_id: &str, limit: usize) -> Result<Vec<Turn>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT role, content, created_at FROM turns
                 WHERE user_id = ?1 ORDER BY seq DESC LIMIT ?2",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        #[allow(clippy::cast_possible_wrap)]
        let turns = stmt
            .query_map(rusqlite::params![user_id, limit as i64], |row| {
                Ok(Turn {
                    role: TurnRole::from_str(&row.get::<_, String>(0)?)
                        .unwrap_or(TurnRole::User),
                    content: row.get(1)?,
                    created_at: parse_datetime(&row.get::<_, String>(2)?),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        Ok(turns)
    }

    /// Clear a user's entire history. Idempotent: clearing an empty or
    /// unknown user succeeds.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn clear_user(&self, user_id: &str) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.execute("DELETE FROM turns WHERE user_id = ?1", [user_id])
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Count turns for a user
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn turn_count(&self, user_id: &str) -> Result<usize> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM turns WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
