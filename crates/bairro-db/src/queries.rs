use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use crate::models::{DistrictRow, NewSession, SessionRow, TaxonRow, UserRow};
use crate::sequences::{SEQ_SESSION, SEQ_USER, next_id};
use crate::{Database, OptionalExt};

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str, password_hash: &str, admin: bool) -> Result<UserRow> {
        let created_at = Utc::now();
        self.with_tx(|tx| {
            let id = next_id(tx, SEQ_USER)?;
            tx.execute(
                "INSERT INTO users (id, username, password, status, admin, created_at)
                 VALUES (?1, ?2, ?3, 'A', ?4, ?5)",
                rusqlite::params![id, username, password_hash, admin, created_at],
            )?;
            Ok(UserRow {
                id,
                username: username.to_string(),
                password: password_hash.to_string(),
                status: "A".to_string(),
                admin,
                created_at,
            })
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{USER_COLUMNS} WHERE username = ?1"),
                [username],
                user_from_row,
            )
            .optional()
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{USER_COLUMNS} WHERE id = ?1"), [id], user_from_row)
                .optional()
        })
    }

    pub fn set_user_status(&self, id: i64, status: &str) -> Result<bool> {
        self.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE users SET status = ?1 WHERE id = ?2",
                rusqlite::params![status, id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Sessions --

    pub fn create_session(&self, new: &NewSession<'_>) -> Result<SessionRow> {
        self.with_tx(|tx| {
            let id = next_id(tx, SEQ_SESSION)?;
            tx.execute(
                "INSERT INTO sessions
                    (id, user_id, public_token, private_token, status, created_at, updated_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, 'A', ?5, ?5, ?6)",
                rusqlite::params![
                    id,
                    new.user_id,
                    new.public_token,
                    new.private_token,
                    new.created_at,
                    new.expires_at,
                ],
            )?;
            Ok(SessionRow {
                id,
                user_id: Some(new.user_id),
                public_token: new.public_token.to_string(),
                private_token: new.private_token.to_string(),
                status: "A".to_string(),
                created_at: new.created_at,
                updated_at: new.created_at,
                expires_at: new.expires_at,
            })
        })
    }

    /// Any session holding this private token, whatever its status or expiry.
    pub fn get_session_by_private_token(&self, private_token: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{SESSION_COLUMNS} WHERE private_token = ?1"),
                [private_token],
                session_from_row,
            )
            .optional()
        })
    }

    /// Active, unexpired session holding this public token.
    pub fn get_live_session_by_public_token(
        &self,
        public_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "{SESSION_COLUMNS} WHERE public_token = ?1 AND status = 'A' AND expires_at > ?2"
                ),
                rusqlite::params![public_token, now],
                session_from_row,
            )
            .optional()
        })
    }

    /// Mark a session inactive. Returns false when it was already inactive.
    pub fn deactivate_session(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        self.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE sessions SET status = 'I', updated_at = ?1 WHERE id = ?2 AND status = 'A'",
                rusqlite::params![now, id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Taxonomy --

    pub fn find_city(&self, indexed_name: &str) -> Result<Option<TaxonRow>> {
        self.with_conn(|conn| find_taxon(conn, "cities", indexed_name))
    }

    pub fn find_category(&self, indexed_name: &str) -> Result<Option<TaxonRow>> {
        self.with_conn(|conn| find_taxon(conn, "categories", indexed_name))
    }

    pub fn find_district(&self, indexed_name: &str, city_id: i64) -> Result<Option<DistrictRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{DISTRICT_COLUMNS} WHERE indexed_name = ?1 AND city_id = ?2"),
                rusqlite::params![indexed_name, city_id],
                district_from_row,
            )
            .optional()
        })
    }

    /// Every district with this indexed name, across all cities.
    pub fn find_districts_by_name(&self, indexed_name: &str) -> Result<Vec<DistrictRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{DISTRICT_COLUMNS} WHERE indexed_name = ?1 ORDER BY id"
            ))?;
            let rows = stmt
                .query_map([indexed_name], district_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_cities(&self) -> Result<Vec<TaxonRow>> {
        self.with_conn(|conn| list_taxa(conn, "cities"))
    }

    pub fn list_categories(&self) -> Result<Vec<TaxonRow>> {
        self.with_conn(|conn| list_taxa(conn, "categories"))
    }

    pub fn list_districts(&self) -> Result<Vec<DistrictRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{DISTRICT_COLUMNS} ORDER BY city_id, name"))?;
            let rows = stmt
                .query_map([], district_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

const USER_COLUMNS: &str = "SELECT id, username, password, status, admin, created_at FROM users";

const SESSION_COLUMNS: &str = "SELECT id, user_id, public_token, private_token, status, created_at, updated_at, expires_at FROM sessions";

const DISTRICT_COLUMNS: &str = "SELECT id, city_id, indexed_name, name FROM districts";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        status: row.get(3)?,
        admin: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        public_token: row.get(2)?,
        private_token: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        expires_at: row.get(7)?,
    })
}

fn district_from_row(row: &Row<'_>) -> rusqlite::Result<DistrictRow> {
    Ok(DistrictRow {
        id: row.get(0)?,
        city_id: row.get(1)?,
        indexed_name: row.get(2)?,
        name: row.get(3)?,
    })
}

// `table` is always one of our own constants, never caller input.
fn find_taxon(conn: &Connection, table: &str, indexed_name: &str) -> Result<Option<TaxonRow>> {
    conn.query_row(
        &format!("SELECT id, indexed_name, name FROM {table} WHERE indexed_name = ?1"),
        [indexed_name],
        |row| {
            Ok(TaxonRow {
                id: row.get(0)?,
                indexed_name: row.get(1)?,
                name: row.get(2)?,
            })
        },
    )
    .optional()
}

fn list_taxa(conn: &Connection, table: &str) -> Result<Vec<TaxonRow>> {
    let mut stmt = conn.prepare(&format!("SELECT id, indexed_name, name FROM {table} ORDER BY id"))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TaxonRow {
                id: row.get(0)?,
                indexed_name: row.get(1)?,
                name: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn db_with_user() -> (Database, UserRow) {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("maria", "digest", false).unwrap();
        (db, user)
    }

    #[test]
    fn user_roundtrip_and_unique_username() {
        let (db, user) = db_with_user();
        let loaded = db.get_user_by_username("maria").unwrap().unwrap();
        assert_eq!(loaded.id, user.id);
        assert_eq!(loaded.status, "A");
        assert!(!loaded.admin);

        assert!(db.create_user("maria", "other", false).is_err());
        assert!(db.get_user_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn public_lookup_respects_status_and_expiry() {
        let (db, user) = db_with_user();
        let now = Utc::now();
        let session = db
            .create_session(&NewSession {
                user_id: user.id,
                public_token: "pub",
                private_token: "priv",
                created_at: now,
                expires_at: now + Duration::days(30),
            })
            .unwrap();

        assert!(db.get_live_session_by_public_token("pub", now).unwrap().is_some());
        assert!(
            db.get_live_session_by_public_token("pub", now + Duration::days(31))
                .unwrap()
                .is_none()
        );

        assert!(db.deactivate_session(session.id, now).unwrap());
        assert!(!db.deactivate_session(session.id, now).unwrap());
        assert!(db.get_live_session_by_public_token("pub", now).unwrap().is_none());

        // Logged-out rows stay in storage.
        let kept = db.get_session_by_private_token("priv").unwrap().unwrap();
        assert_eq!(kept.status, "I");
    }

    #[test]
    fn district_lookup_is_scoped_by_city() {
        let db = Database::open_in_memory().unwrap();
        let taquara = db.find_city("TAQUARA").unwrap().unwrap();
        let parobe = db.find_city("PAROBE").unwrap().unwrap();

        let a = db.find_district("CENTRO", taquara.id).unwrap().unwrap();
        let b = db.find_district("CENTRO", parobe.id).unwrap().unwrap();
        assert_ne!(a.id, b.id);

        assert!(db.find_district("RONDA", parobe.id).unwrap().is_none());
        assert_eq!(db.find_districts_by_name("CENTRO").unwrap().len(), 2);
        assert_eq!(db.list_categories().unwrap().len(), 7);
    }
}
