// SQLite persistence layer for votes, comments, saved bills and sponsors.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use tracing::debug;

use crate::model::{
    BillSponsor, Comment, EngagementSnapshot, Legislator, Level, SavedBill, SponsorRole, Vote,
    VoteAction, VoteType,
};
use crate::repository::{
    ensure_user, plan_vote_write, toggled_vote, Repository, StoreError, StoreResult, VoteWrite,
};

/// SQLite-backed implementation of [`Repository`].
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS votes (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id    TEXT NOT NULL,
                bill_id    TEXT NOT NULL,
                vote_type  TEXT NOT NULL CHECK (vote_type IN ('upvote', 'downvote')),
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(user_id, bill_id)
            );

            CREATE TABLE IF NOT EXISTS comments (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id    TEXT NOT NULL,
                bill_id    TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS saved_bills (
                user_id  TEXT NOT NULL,
                bill_id  TEXT NOT NULL,
                saved_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (user_id, bill_id)
            );

            CREATE TABLE IF NOT EXISTS legislators (
                id             TEXT PRIMARY KEY,
                name           TEXT NOT NULL,
                title          TEXT NOT NULL,
                level          TEXT NOT NULL,
                jurisdiction   TEXT NOT NULL,
                contact_email  TEXT,
                contact_phone  TEXT,
                office_address TEXT,
                website_url    TEXT
            );

            CREATE TABLE IF NOT EXISTS bill_legislators (
                bill_id       TEXT NOT NULL,
                legislator_id TEXT NOT NULL REFERENCES legislators(id),
                role          TEXT NOT NULL CHECK (role IN ('sponsor', 'cosponsor')),
                PRIMARY KEY (bill_id, legislator_id)
            );

            CREATE INDEX IF NOT EXISTS idx_votes_bill_id ON votes(bill_id);
            CREATE INDEX IF NOT EXISTS idx_comments_bill_id ON comments(bill_id);
            ",
        )?;

        debug!("database ready at {path}");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Read the stored vote and write its replacement in one immediate
    /// transaction; other writers for the same (user, bill) wait on the lock.
    fn write_vote_atomically(
        &self,
        user_id: &str,
        bill_id: &str,
        target: impl FnOnce(Option<VoteType>) -> Option<VoteType>,
    ) -> StoreResult<VoteAction> {
        ensure_user(user_id)?;
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = find_vote_on(&tx, user_id, bill_id)?;
        let write = plan_vote_write(current.as_ref(), target(current.as_ref().map(|v| v.vote_type)));
        match write {
            VoteWrite::Keep => {}
            VoteWrite::Create(vote_type) => {
                create_vote_on(&tx, user_id, bill_id, vote_type)?;
            }
            VoteWrite::Update(id, vote_type) => update_vote_on(&tx, id, vote_type)?,
            VoteWrite::Delete(id) => delete_vote_on(&tx, id)?,
        }
        tx.commit()?;
        debug!("vote by {user_id} on {bill_id}: {write:?}");
        Ok(write.action())
    }

    /// Insert a legislator or refresh their contact details.
    pub fn upsert_legislator(&self, legislator: &Legislator) -> StoreResult<()> {
        let conn = self.conn();
        upsert_legislator_on(&conn, legislator)
    }

    /// Link a legislator to a bill. Re-linking replaces the role.
    pub fn link_legislator(
        &self,
        bill_id: &str,
        legislator_id: &str,
        role: SponsorRole,
    ) -> StoreResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO bill_legislators (bill_id, legislator_id, role)
             VALUES (?1, ?2, ?3)",
            params![bill_id, legislator_id, role_str(role)],
        )
        .map_err(|e| map_constraint(e, &format!("legislator {legislator_id}")))?;
        Ok(())
    }

    /// Import legislators and their bill links in a single transaction.
    pub fn import_sponsors(&self, bill_id: &str, sponsors: &[BillSponsor]) -> StoreResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for sponsor in sponsors {
            upsert_legislator_on(&tx, &sponsor.legislator)?;
            tx.execute(
                "INSERT OR REPLACE INTO bill_legislators (bill_id, legislator_id, role)
                 VALUES (?1, ?2, ?3)",
                params![bill_id, sponsor.legislator.id, role_str(sponsor.role)],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

impl Repository for Database {
    fn find_vote(&self, user_id: &str, bill_id: &str) -> StoreResult<Option<Vote>> {
        find_vote_on(&self.conn(), user_id, bill_id)
    }

    fn create_vote(&self, user_id: &str, bill_id: &str, vote_type: VoteType) -> StoreResult<Vote> {
        create_vote_on(&self.conn(), user_id, bill_id, vote_type)
    }

    fn update_vote(&self, vote_id: i64, vote_type: VoteType) -> StoreResult<()> {
        update_vote_on(&self.conn(), vote_id, vote_type)
    }

    fn delete_vote(&self, vote_id: i64) -> StoreResult<()> {
        delete_vote_on(&self.conn(), vote_id)
    }

    fn cast_vote(&self, user_id: &str, bill_id: &str, vote_type: VoteType) -> StoreResult<VoteAction> {
        self.write_vote_atomically(user_id, bill_id, |current| toggled_vote(current, vote_type))
    }

    fn set_vote(&self, user_id: &str, bill_id: &str, target: Option<VoteType>) -> StoreResult<VoteAction> {
        self.write_vote_atomically(user_id, bill_id, |_| target)
    }

    fn votes_for_bill(&self, bill_id: &str) -> StoreResult<Vec<Vote>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, bill_id, vote_type FROM votes WHERE bill_id = ?1 ORDER BY id",
        )?;
        let rows: Vec<(i64, String, String, String)> = stmt
            .query_map(params![bill_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(vote_from_row).collect()
    }

    fn create_comment(&self, user_id: &str, bill_id: &str, content: &str) -> StoreResult<Comment> {
        let conn = self.conn();
        let (id, created_at): (i64, String) = conn.query_row(
            "INSERT INTO comments (user_id, bill_id, content) VALUES (?1, ?2, ?3)
             RETURNING id, created_at",
            params![user_id, bill_id, content],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(Comment {
            id,
            user_id: user_id.to_string(),
            bill_id: bill_id.to_string(),
            content: content.to_string(),
            created_at: parse_timestamp(&created_at)?,
        })
    }

    fn find_comment(&self, comment_id: i64) -> StoreResult<Option<Comment>> {
        let conn = self.conn();
        let row: Option<(i64, String, String, String, String)> = conn
            .query_row(
                "SELECT id, user_id, bill_id, content, created_at FROM comments WHERE id = ?1",
                params![comment_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()?;
        row.map(comment_from_row).transpose()
    }

    fn delete_comment_row(&self, comment_id: i64) -> StoreResult<()> {
        let conn = self.conn();
        let changed = conn.execute("DELETE FROM comments WHERE id = ?1", params![comment_id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("comment {comment_id}")));
        }
        Ok(())
    }

    fn comments_for_bill(&self, bill_id: &str) -> StoreResult<Vec<Comment>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, bill_id, content, created_at FROM comments
             WHERE bill_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows: Vec<(i64, String, String, String, String)> = stmt
            .query_map(params![bill_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(comment_from_row).collect()
    }

    fn find_saved(&self, user_id: &str, bill_id: &str) -> StoreResult<Option<SavedBill>> {
        let conn = self.conn();
        let saved_at: Option<String> = conn
            .query_row(
                "SELECT saved_at FROM saved_bills WHERE user_id = ?1 AND bill_id = ?2",
                params![user_id, bill_id],
                |row| row.get(0),
            )
            .optional()?;
        saved_at
            .map(|ts| {
                Ok(SavedBill {
                    user_id: user_id.to_string(),
                    bill_id: bill_id.to_string(),
                    saved_at: parse_timestamp(&ts)?,
                })
            })
            .transpose()
    }

    fn create_saved(&self, user_id: &str, bill_id: &str) -> StoreResult<SavedBill> {
        let conn = self.conn();
        let saved_at: String = conn
            .query_row(
                "INSERT INTO saved_bills (user_id, bill_id) VALUES (?1, ?2) RETURNING saved_at",
                params![user_id, bill_id],
                |row| row.get(0),
            )
            .map_err(|e| map_constraint(e, &format!("saved bill {bill_id}")))?;
        Ok(SavedBill {
            user_id: user_id.to_string(),
            bill_id: bill_id.to_string(),
            saved_at: parse_timestamp(&saved_at)?,
        })
    }

    fn delete_saved(&self, user_id: &str, bill_id: &str) -> StoreResult<()> {
        let conn = self.conn();
        let changed = conn.execute(
            "DELETE FROM saved_bills WHERE user_id = ?1 AND bill_id = ?2",
            params![user_id, bill_id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("saved bill {bill_id}")));
        }
        Ok(())
    }

    fn saved_for_user(&self, user_id: &str) -> StoreResult<Vec<SavedBill>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT bill_id, saved_at FROM saved_bills WHERE user_id = ?1
             ORDER BY saved_at DESC, rowid DESC",
        )?;
        let rows: Vec<(String, String)> = stmt
            .query_map(params![user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(bill_id, ts)| {
                Ok(SavedBill {
                    user_id: user_id.to_string(),
                    bill_id,
                    saved_at: parse_timestamp(&ts)?,
                })
            })
            .collect()
    }

    fn legislators_for_bill(&self, bill_id: &str) -> StoreResult<Vec<BillSponsor>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT l.id, l.name, l.title, l.level, l.jurisdiction, l.contact_email,
                    l.contact_phone, l.office_address, l.website_url, bl.role
             FROM bill_legislators bl
             JOIN legislators l ON l.id = bl.legislator_id
             WHERE bl.bill_id = ?1
             ORDER BY CASE bl.role WHEN 'sponsor' THEN 0 ELSE 1 END, l.name",
        )?;
        let rows = stmt
            .query_map(params![bill_id], |row| {
                Ok(SponsorRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    title: row.get(2)?,
                    level: row.get(3)?,
                    jurisdiction: row.get(4)?,
                    contact_email: row.get(5)?,
                    contact_phone: row.get(6)?,
                    office_address: row.get(7)?,
                    website_url: row.get(8)?,
                    role: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(SponsorRow::into_sponsor).collect()
    }

    /// Counted in SQL rather than by loading every row.
    fn engagement(&self, bill_id: &str) -> StoreResult<EngagementSnapshot> {
        let conn = self.conn();
        let (upvotes, downvotes): (i64, i64) = conn.query_row(
            "SELECT COALESCE(SUM(vote_type = 'upvote'), 0), COALESCE(SUM(vote_type = 'downvote'), 0)
             FROM votes WHERE bill_id = ?1",
            params![bill_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let comments: i64 = conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE bill_id = ?1",
            params![bill_id],
            |row| row.get(0),
        )?;
        Ok(EngagementSnapshot {
            upvotes: upvotes as u32,
            downvotes: downvotes as u32,
            comments: comments as u32,
        })
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

struct SponsorRow {
    id: String,
    name: String,
    title: String,
    level: String,
    jurisdiction: String,
    contact_email: Option<String>,
    contact_phone: Option<String>,
    office_address: Option<String>,
    website_url: Option<String>,
    role: String,
}

impl SponsorRow {
    fn into_sponsor(self) -> StoreResult<BillSponsor> {
        let level = Level::from_str_level(&self.level)
            .ok_or_else(|| StoreError::Corrupt(format!("legislator level {:?}", self.level)))?;
        let role = match self.role.as_str() {
            "sponsor" => SponsorRole::Sponsor,
            "cosponsor" => SponsorRole::Cosponsor,
            other => return Err(StoreError::Corrupt(format!("sponsor role {other:?}"))),
        };
        Ok(BillSponsor {
            legislator: Legislator {
                id: self.id,
                name: self.name,
                title: self.title,
                level,
                jurisdiction: self.jurisdiction,
                contact_email: self.contact_email,
                contact_phone: self.contact_phone,
                office_address: self.office_address,
                website_url: self.website_url,
            },
            role,
        })
    }
}

fn upsert_legislator_on(conn: &Connection, legislator: &Legislator) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO legislators
            (id, name, title, level, jurisdiction, contact_email, contact_phone, office_address, website_url)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
            name           = excluded.name,
            title          = excluded.title,
            level          = excluded.level,
            jurisdiction   = excluded.jurisdiction,
            contact_email  = excluded.contact_email,
            contact_phone  = excluded.contact_phone,
            office_address = excluded.office_address,
            website_url    = excluded.website_url",
        params![
            legislator.id,
            legislator.name,
            legislator.title,
            legislator.level.as_str(),
            legislator.jurisdiction,
            legislator.contact_email,
            legislator.contact_phone,
            legislator.office_address,
            legislator.website_url,
        ],
    )?;
    Ok(())
}

fn find_vote_on(conn: &Connection, user_id: &str, bill_id: &str) -> StoreResult<Option<Vote>> {
    let row = conn
        .query_row(
            "SELECT id, user_id, bill_id, vote_type FROM votes
             WHERE user_id = ?1 AND bill_id = ?2",
            params![user_id, bill_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;
    row.map(vote_from_row).transpose()
}

fn create_vote_on(conn: &Connection, user_id: &str, bill_id: &str, vote_type: VoteType) -> StoreResult<Vote> {
    let id: i64 = conn
        .query_row(
            "INSERT INTO votes (user_id, bill_id, vote_type) VALUES (?1, ?2, ?3)
             RETURNING id",
            params![user_id, bill_id, vote_type.as_str()],
            |row| row.get(0),
        )
        .map_err(|e| map_constraint(e, &format!("vote on {bill_id}")))?;
    Ok(Vote {
        id,
        user_id: user_id.to_string(),
        bill_id: bill_id.to_string(),
        vote_type,
    })
}

fn update_vote_on(conn: &Connection, vote_id: i64, vote_type: VoteType) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE votes SET vote_type = ?1 WHERE id = ?2",
        params![vote_type.as_str(), vote_id],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!("vote {vote_id}")));
    }
    Ok(())
}

fn delete_vote_on(conn: &Connection, vote_id: i64) -> StoreResult<()> {
    let changed = conn.execute("DELETE FROM votes WHERE id = ?1", params![vote_id])?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!("vote {vote_id}")));
    }
    Ok(())
}

fn role_str(role: SponsorRole) -> &'static str {
    match role {
        SponsorRole::Sponsor => "sponsor",
        SponsorRole::Cosponsor => "cosponsor",
    }
}

fn vote_from_row((id, user_id, bill_id, vote_type): (i64, String, String, String)) -> StoreResult<Vote> {
    let vote_type = VoteType::from_str_vote(&vote_type)
        .ok_or_else(|| StoreError::Corrupt(format!("vote type {vote_type:?}")))?;
    Ok(Vote {
        id,
        user_id,
        bill_id,
        vote_type,
    })
}

fn comment_from_row(
    (id, user_id, bill_id, content, created_at): (i64, String, String, String, String),
) -> StoreResult<Comment> {
    Ok(Comment {
        id,
        user_id,
        bill_id,
        content,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp {raw:?}: {e}")))
}

/// A dangling foreign key becomes `NotFound`, any other constraint failure
/// `Conflict`; everything else passes through as a backend error.
fn map_constraint(err: rusqlite::Error, what: &str) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            StoreError::NotFound(what.to_string())
        }
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict(what.to_string())
        }
        _ => StoreError::Backend(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: create a fresh in-memory database for each test.
    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn legislator(id: &str, name: &str) -> Legislator {
        Legislator {
            id: id.to_string(),
            name: name.to_string(),
            title: "State Senator".to_string(),
            level: Level::State,
            jurisdiction: "California".to_string(),
            contact_email: Some(format!("{id}@senate.ca.gov")),
            contact_phone: None,
            office_address: None,
            website_url: None,
        }
    }

    // ------------------------------------------------------------------
    // Schema / open
    // ------------------------------------------------------------------

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for expected in ["votes", "comments", "saved_bills", "legislators", "bill_legislators"] {
            assert!(tables.contains(&expected.to_string()), "missing table {expected}");
        }
    }

    // ------------------------------------------------------------------
    // Votes
    // ------------------------------------------------------------------

    #[test]
    fn cast_vote_creates_switches_and_removes() {
        let db = test_db();

        assert_eq!(db.cast_vote("u1", "b1", VoteType::Upvote).unwrap(), VoteAction::Created);
        assert_eq!(db.user_vote("u1", "b1").unwrap(), Some(VoteType::Upvote));

        assert_eq!(db.cast_vote("u1", "b1", VoteType::Downvote).unwrap(), VoteAction::Updated);
        assert_eq!(db.user_vote("u1", "b1").unwrap(), Some(VoteType::Downvote));

        assert_eq!(db.cast_vote("u1", "b1", VoteType::Downvote).unwrap(), VoteAction::Removed);
        assert_eq!(db.user_vote("u1", "b1").unwrap(), None);
    }

    #[test]
    fn second_vote_row_for_same_user_and_bill_conflicts() {
        let db = test_db();
        db.create_vote("u1", "b1", VoteType::Upvote).unwrap();

        let err = db.create_vote("u1", "b1", VoteType::Downvote).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");
    }

    #[test]
    fn set_vote_reaches_target_and_repeats_as_no_op() {
        let db = test_db();

        assert_eq!(db.set_vote("u1", "b1", Some(VoteType::Upvote)).unwrap(), VoteAction::Created);
        assert_eq!(db.set_vote("u1", "b1", Some(VoteType::Upvote)).unwrap(), VoteAction::Unchanged);
        assert_eq!(db.user_vote("u1", "b1").unwrap(), Some(VoteType::Upvote));

        assert_eq!(db.set_vote("u1", "b1", Some(VoteType::Downvote)).unwrap(), VoteAction::Updated);
        assert_eq!(db.set_vote("u1", "b1", None).unwrap(), VoteAction::Removed);
        assert_eq!(db.set_vote("u1", "b1", None).unwrap(), VoteAction::Unchanged);
        assert_eq!(db.user_vote("u1", "b1").unwrap(), None);
    }

    #[test]
    fn concurrent_toggles_from_separate_connections_all_apply() {
        let path = std::env::temp_dir().join("civicfeed_db_concurrent_votes.sqlite");
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
        let path = path.to_string_lossy().to_string();
        Database::open(&path).unwrap();

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let db = Database::open(&path).unwrap();
                    (0..25)
                        .map(|_| db.cast_vote("u1", "b1", VoteType::Upvote))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for worker in workers {
            for result in worker.join().unwrap() {
                assert!(result.is_ok(), "toggle failed: {result:?}");
            }
        }

        // 50 toggles from no vote land back on no vote.
        let db = Database::open(&path).unwrap();
        assert_eq!(db.user_vote("u1", "b1").unwrap(), None);
        assert!(db.votes_for_bill("b1").unwrap().is_empty());
    }

    #[test]
    fn anonymous_vote_is_unauthorized() {
        let db = test_db();
        let err = db.cast_vote("", "b1", VoteType::Upvote).unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized));
        assert!(db.votes_for_bill("b1").unwrap().is_empty());
    }

    #[test]
    fn engagement_counts_votes_and_comments() {
        let db = test_db();
        db.cast_vote("u1", "b1", VoteType::Upvote).unwrap();
        db.cast_vote("u2", "b1", VoteType::Upvote).unwrap();
        db.cast_vote("u3", "b1", VoteType::Downvote).unwrap();
        db.cast_vote("u1", "b2", VoteType::Downvote).unwrap();
        db.post_comment("u1", "b1", "first").unwrap();

        let snapshot = db.engagement("b1").unwrap();
        assert_eq!(
            snapshot,
            EngagementSnapshot {
                upvotes: 2,
                downvotes: 1,
                comments: 1
            }
        );
        assert_eq!(db.engagement("none").unwrap(), EngagementSnapshot::default());
    }

    // ------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------

    #[test]
    fn post_comment_rejects_blank_content() {
        let db = test_db();
        let err = db.post_comment("u1", "b1", "   \n").unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
        assert!(db.comments_for_bill("b1").unwrap().is_empty());
    }

    #[test]
    fn post_comment_trims_content() {
        let db = test_db();
        let comment = db.post_comment("u1", "b1", "  Great bill!  ").unwrap();
        assert_eq!(comment.content, "Great bill!");
        assert_eq!(db.find_comment(comment.id).unwrap(), Some(comment));
    }

    #[test]
    fn comments_list_newest_first() {
        let db = test_db();
        let first = db.post_comment("u1", "b1", "first").unwrap();
        let second = db.post_comment("u2", "b1", "second").unwrap();
        let third = db.post_comment("u1", "b1", "third").unwrap();
        db.post_comment("u1", "b2", "elsewhere").unwrap();

        let ids: Vec<i64> = db.comments_for_bill("b1").unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[test]
    fn only_author_can_delete_comment() {
        let db = test_db();
        let comment = db.post_comment("author", "b1", "mine").unwrap();

        let err = db.delete_comment("someone-else", comment.id).unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));

        db.delete_comment("author", comment.id).unwrap();
        assert!(db.find_comment(comment.id).unwrap().is_none());

        let err = db.delete_comment("author", comment.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    // ------------------------------------------------------------------
    // Saved bills
    // ------------------------------------------------------------------

    #[test]
    fn save_and_unsave_bill() {
        let db = test_db();
        assert!(!db.is_saved("u1", "b1").unwrap());

        let saved = db.save_bill("u1", "b1").unwrap();
        assert_eq!(saved.bill_id, "b1");
        assert!(db.is_saved("u1", "b1").unwrap());
        assert!(!db.is_saved("u2", "b1").unwrap());

        db.unsave_bill("u1", "b1").unwrap();
        assert!(!db.is_saved("u1", "b1").unwrap());
    }

    #[test]
    fn saving_twice_conflicts() {
        let db = test_db();
        db.save_bill("u1", "b1").unwrap();
        let err = db.save_bill("u1", "b1").unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn unsaving_unknown_bill_is_not_found() {
        let db = test_db();
        let err = db.unsave_bill("u1", "b1").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn saved_bills_are_scoped_to_user() {
        let db = test_db();
        db.save_bill("u1", "b1").unwrap();
        db.save_bill("u1", "b2").unwrap();
        db.save_bill("u2", "b3").unwrap();

        let mut ids: Vec<String> = db
            .saved_for_user("u1")
            .unwrap()
            .into_iter()
            .map(|s| s.bill_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["b1", "b2"]);
    }

    // ------------------------------------------------------------------
    // Sponsors
    // ------------------------------------------------------------------

    #[test]
    fn sponsors_listed_before_cosponsors() {
        let db = test_db();
        db.import_sponsors(
            "b1",
            &[
                BillSponsor {
                    legislator: legislator("leg-a", "Aaron Adams"),
                    role: SponsorRole::Cosponsor,
                },
                BillSponsor {
                    legislator: legislator("leg-z", "Zoe Zimmer"),
                    role: SponsorRole::Sponsor,
                },
            ],
        )
        .unwrap();

        let sponsors = db.legislators_for_bill("b1").unwrap();
        assert_eq!(sponsors.len(), 2);
        assert_eq!(sponsors[0].legislator.id, "leg-z");
        assert_eq!(sponsors[0].role, SponsorRole::Sponsor);
        assert_eq!(sponsors[1].role, SponsorRole::Cosponsor);
        assert!(db.legislators_for_bill("b2").unwrap().is_empty());
    }

    #[test]
    fn link_requires_known_legislator() {
        let db = test_db();
        let err = db
            .link_legislator("b1", "ghost", SponsorRole::Sponsor)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)), "got {err:?}");

        db.upsert_legislator(&legislator("leg-1", "Maria Garcia")).unwrap();
        db.link_legislator("b1", "leg-1", SponsorRole::Sponsor).unwrap();
        assert_eq!(db.legislators_for_bill("b1").unwrap().len(), 1);
    }
}
