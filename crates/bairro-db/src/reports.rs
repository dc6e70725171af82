use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};

use crate::models::{
    FeedbackRow, MediaRow, NewReport, RateLimit, ReportInsert, ReportListingRow, ReportQuery,
    ReportRow,
};
use crate::sequences::{SEQ_REPORT, SEQ_REPORT_FEEDBACK, SEQ_REPORT_MEDIA, next_id};
use crate::{Database, OptionalExt};

impl Database {
    // -- Reports --

    pub fn count_reports_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<i64> {
        self.with_conn(|conn| count_since(conn, user_id, since))
    }

    /// Insert a report and all of its media in one transaction. Nothing is
    /// written if any insert fails.
    pub fn create_report(
        &self,
        new: &NewReport<'_>,
        medias: &[String],
    ) -> Result<(ReportRow, Vec<MediaRow>)> {
        self.with_tx(|tx| insert_report(tx, new, medias))
    }

    /// Like [`Database::create_report`], but counts the user's reports in
    /// `limit`'s window under the same write lock first, so concurrent
    /// submissions cannot all slip past the cap.
    pub fn create_report_within_limit(
        &self,
        new: &NewReport<'_>,
        medias: &[String],
        limit: &RateLimit,
    ) -> Result<ReportInsert> {
        self.with_tx(|tx| {
            let recent = count_since(tx, new.user_id, limit.since)?;
            if recent >= limit.max {
                return Ok(ReportInsert::RateLimited { recent });
            }
            let (report, media) = insert_report(tx, new, medias)?;
            Ok(ReportInsert::Created { report, media })
        })
    }

    pub fn get_report(&self, id: i64) -> Result<Option<ReportRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, title, body, city_id, district_id, category_id, status, votes, created_at, updated_at
                 FROM reports WHERE id = ?1",
                [id],
                |row| {
                    Ok(ReportRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        title: row.get(2)?,
                        body: row.get(3)?,
                        city_id: row.get(4)?,
                        district_id: row.get(5)?,
                        category_id: row.get(6)?,
                        status: row.get(7)?,
                        votes: row.get(8)?,
                        created_at: row.get(9)?,
                        updated_at: row.get(10)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn get_report_votes(&self, id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT votes FROM reports WHERE id = ?1", [id], |r| r.get(0))
                .optional()
        })
    }

    pub fn get_report_listing(&self, id: i64) -> Result<Option<ReportListingRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{LISTING_COLUMNS} WHERE r.id = ?1"),
                [id],
                listing_from_row,
            )
            .optional()
        })
    }

    /// One page of reports plus the total number of matches.
    pub fn list_reports(&self, query: &ReportQuery) -> Result<(Vec<ReportListingRow>, u64)> {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        // body_search holds the Unicode-lowercased body; SQLite's lower() only
        // folds ASCII.
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            params.push(Value::Text(search.to_lowercase()));
            clauses.push(format!("instr(r.body_search, ?{}) > 0", params.len()));
        }
        if let Some(status) = &query.status {
            params.push(Value::Text(status.clone()));
            clauses.push(format!("r.status = ?{}", params.len()));
        }
        if let Some(city_id) = query.city_id {
            params.push(Value::Integer(city_id));
            clauses.push(format!("r.city_id = ?{}", params.len()));
        }
        if let Some(district_ids) = query.district_ids.as_ref().filter(|ids| !ids.is_empty()) {
            let placeholders: Vec<String> = district_ids
                .iter()
                .map(|id| {
                    params.push(Value::Integer(*id));
                    format!("?{}", params.len())
                })
                .collect();
            clauses.push(format!("r.district_id IN ({})", placeholders.join(", ")));
        }
        if let Some(category_id) = query.category_id {
            params.push(Value::Integer(category_id));
            clauses.push(format!("r.category_id = ?{}", params.len()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let direction = if query.descending { "DESC" } else { "ASC" };

        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM reports r{where_sql}"),
                rusqlite::params_from_iter(params.iter()),
                |r| r.get(0),
            )?;

            let sql = format!(
                "{LISTING_COLUMNS}{where_sql} ORDER BY {} {direction}, r.id {direction} LIMIT {} OFFSET {}",
                query.sort.sql(),
                query.limit,
                query.offset,
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), listing_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total as u64))
        })
    }

    /// Batch-fetch media for a set of report IDs.
    pub fn get_media_for_reports(&self, report_ids: &[i64]) -> Result<Vec<MediaRow>> {
        if report_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=report_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, report_id, base64 FROM report_media WHERE report_id IN ({}) ORDER BY id",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(report_ids.iter()), |row| {
                    Ok(MediaRow {
                        id: row.get(0)?,
                        report_id: row.get(1)?,
                        base64: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Feedback --

    /// Replace the user's vote on a report: drop any existing feedback rows,
    /// insert the new one and recompute the report's aggregate.
    pub fn replace_feedback(
        &self,
        report_id: i64,
        user_id: i64,
        kind: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                "DELETE FROM report_feedback WHERE report_id = ?1 AND user_id = ?2",
                rusqlite::params![report_id, user_id],
            )?;

            let id = next_id(tx, SEQ_REPORT_FEEDBACK)?;
            tx.execute(
                "INSERT INTO report_feedback (id, report_id, user_id, type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, report_id, user_id, kind, now],
            )?;

            tx.execute(
                "UPDATE reports SET votes = (
                    SELECT COALESCE(SUM(CASE type WHEN 'UP' THEN 1 WHEN 'DOWN' THEN -1 ELSE 0 END), 0)
                    FROM report_feedback WHERE report_id = ?1
                 )
                 WHERE id = ?1",
                [report_id],
            )?;
            Ok(())
        })
    }

    pub fn get_feedback(&self, report_id: i64, user_id: i64) -> Result<Vec<FeedbackRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, report_id, user_id, type, created_at
                 FROM report_feedback WHERE report_id = ?1 AND user_id = ?2 ORDER BY id",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![report_id, user_id], |row| {
                    Ok(FeedbackRow {
                        id: row.get(0)?,
                        report_id: row.get(1)?,
                        user_id: row.get(2)?,
                        kind: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn count_since(conn: &Connection, user_id: i64, since: DateTime<Utc>) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM reports WHERE user_id = ?1 AND created_at >= ?2",
        rusqlite::params![user_id, since],
        |r| r.get(0),
    )?;
    Ok(count)
}

fn insert_report(
    conn: &Connection,
    new: &NewReport<'_>,
    medias: &[String],
) -> Result<(ReportRow, Vec<MediaRow>)> {
    let id = next_id(conn, SEQ_REPORT)?;
    conn.execute(
        "INSERT INTO reports
            (id, user_id, title, body, body_search, city_id, district_id, category_id, status, votes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'A', 0, ?9, ?9)",
        rusqlite::params![
            id,
            new.user_id,
            new.title,
            new.body,
            new.body.to_lowercase(),
            new.city_id,
            new.district_id,
            new.category_id,
            new.created_at,
        ],
    )?;

    let mut media_rows = Vec::with_capacity(medias.len());
    for base64 in medias {
        let media_id = next_id(conn, SEQ_REPORT_MEDIA)?;
        conn.execute(
            "INSERT INTO report_media (id, report_id, base64, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![media_id, id, base64, new.created_at],
        )?;
        media_rows.push(MediaRow {
            id: media_id,
            report_id: id,
            base64: base64.clone(),
        });
    }

    let report = ReportRow {
        id,
        user_id: new.user_id,
        title: new.title.to_string(),
        body: new.body.to_string(),
        city_id: new.city_id,
        district_id: new.district_id,
        category_id: new.category_id,
        status: "A".to_string(),
        votes: 0,
        created_at: new.created_at,
        updated_at: new.created_at,
    };
    Ok((report, media_rows))
}

// JOIN users and taxonomy to fetch display fields in a single query
const LISTING_COLUMNS: &str = "
    SELECT r.id, r.title, r.body, u.username,
           c.indexed_name, c.name, d.indexed_name, d.name, k.indexed_name, k.name,
           r.votes, r.created_at, r.updated_at
    FROM reports r
    LEFT JOIN users u ON u.id = r.user_id
    JOIN cities c ON c.id = r.city_id
    JOIN districts d ON d.id = r.district_id
    JOIN categories k ON k.id = r.category_id";

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<ReportListingRow> {
    Ok(ReportListingRow {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        username: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| "unknown".to_string()),
        city_indexed_name: row.get(4)?,
        city_name: row.get(5)?,
        district_indexed_name: row.get(6)?,
        district_name: row.get(7)?,
        category_indexed_name: row.get(8)?,
        category_name: row.get(9)?,
        votes: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SortColumn;

    fn seeded() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("joao", "digest", false).unwrap();
        (db, user.id)
    }

    fn new_report<'a>(db: &Database, user_id: i64, body: &'a str) -> NewReport<'a> {
        let city = db.find_city("TAQUARA").unwrap().unwrap();
        let district = db.find_district("CENTRO", city.id).unwrap().unwrap();
        let category = db.find_category("ROADS").unwrap().unwrap();
        NewReport {
            user_id,
            title: body,
            body,
            city_id: city.id,
            district_id: district.id,
            category_id: category.id,
            created_at: Utc::now(),
        }
    }

    fn query() -> ReportQuery {
        ReportQuery {
            search: None,
            status: None,
            city_id: None,
            district_ids: None,
            category_id: None,
            sort: SortColumn::CreatedAt,
            descending: false,
            offset: 0,
            limit: 25,
        }
    }

    #[test]
    fn report_and_media_are_created_together() {
        let (db, user_id) = seeded();
        let new = new_report(&db, user_id, "Buraco na rua");
        let (report, media) = db
            .create_report(&new, &["aGVsbG8=".to_string(), "d29ybGQ=".to_string()])
            .unwrap();

        assert_eq!(report.id, 1);
        assert_eq!(media.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(db.get_media_for_reports(&[report.id]).unwrap().len(), 2);
    }

    #[test]
    fn failing_media_insert_rolls_back_report() {
        let (db, user_id) = seeded();
        let new = new_report(&db, user_id, "Lâmpada queimada");

        // Empty media violates the column check on the second insert.
        let result = db.create_report(&new, &["aGVsbG8=".to_string(), String::new()]);
        assert!(result.is_err());

        let (rows, total) = db.list_reports(&query()).unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 0);
        assert!(db.get_media_for_reports(&[1]).unwrap().is_empty());
    }

    #[test]
    fn replacing_feedback_keeps_one_row() {
        let (db, user_id) = seeded();
        let (report, _) = db
            .create_report(&new_report(&db, user_id, "Árvore caída"), &[])
            .unwrap();

        db.replace_feedback(report.id, user_id, "UP", Utc::now()).unwrap();
        db.replace_feedback(report.id, user_id, "UP", Utc::now()).unwrap();
        assert_eq!(db.get_feedback(report.id, user_id).unwrap().len(), 1);
        assert_eq!(db.get_report_votes(report.id).unwrap(), Some(1));

        db.replace_feedback(report.id, user_id, "DOWN", Utc::now()).unwrap();
        let rows = db.get_feedback(report.id, user_id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, "DOWN");
        assert_eq!(db.get_report_votes(report.id).unwrap(), Some(-1));
    }

    #[test]
    fn listing_filters_and_pages() {
        let (db, user_id) = seeded();
        for body in ["Semáforo quebrado", "Lixo na calçada", "semáforo piscando"] {
            db.create_report(&new_report(&db, user_id, body), &[]).unwrap();
        }

        let mut q = query();
        q.search = Some("SEM".to_string());
        let (_, total) = db.list_reports(&q).unwrap();
        assert_eq!(total, 2);

        q.search = Some("LIXO".to_string());
        let (rows, total) = db.list_reports(&q).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].body, "Lixo na calçada");
        assert_eq!(rows[0].username, "joao");
        assert_eq!(rows[0].city_name, "Taquara");

        let mut q = query();
        q.limit = 2;
        q.offset = 2;
        let (rows, total) = db.list_reports(&q).unwrap();
        assert_eq!(total, 3);
        assert_eq!(rows.len(), 1);

        let mut q = query();
        q.descending = true;
        let (rows, _) = db.list_reports(&q).unwrap();
        assert_eq!(rows[0].id, 3);
    }

    #[test]
    fn recent_report_count_uses_window() {
        let (db, user_id) = seeded();
        db.create_report(&new_report(&db, user_id, "Poste apagado"), &[])
            .unwrap();

        let window_start = Utc::now() - chrono::Duration::minutes(10);
        assert_eq!(db.count_reports_since(user_id, window_start).unwrap(), 1);
        let future = Utc::now() + chrono::Duration::minutes(1);
        assert_eq!(db.count_reports_since(user_id, future).unwrap(), 0);
    }

    #[test]
    fn search_folds_accented_letters() {
        let (db, user_id) = seeded();
        for body in ["Semáforo quebrado na ÁREA central", "Buraco na avenida"] {
            db.create_report(&new_report(&db, user_id, body), &[]).unwrap();
        }

        let mut q = query();
        for term in ["SEMÁFORO", "área", "Área Central"] {
            q.search = Some(term.to_string());
            let (rows, total) = db.list_reports(&q).unwrap();
            assert_eq!(total, 1, "search {term:?}");
            assert_eq!(rows[0].body, "Semáforo quebrado na ÁREA central");
        }
    }

    #[test]
    fn limited_insert_refuses_past_the_cap() {
        let (db, user_id) = seeded();
        let limit = RateLimit {
            since: Utc::now() - chrono::Duration::minutes(10),
            max: 1,
        };

        let first = db
            .create_report_within_limit(&new_report(&db, user_id, "Poste caído"), &[], &limit)
            .unwrap();
        assert!(matches!(first, ReportInsert::Created { .. }));

        let second = db
            .create_report_within_limit(&new_report(&db, user_id, "Outro poste"), &[], &limit)
            .unwrap();
        assert!(matches!(second, ReportInsert::RateLimited { recent: 1 }));
        assert_eq!(db.list_reports(&query()).unwrap().1, 1);
    }

    #[test]
    fn concurrent_limited_inserts_create_one_report() {
        use std::sync::{Arc, Barrier};

        let (db, user_id) = seeded();
        let db = Arc::new(db);
        let barrier = Arc::new(Barrier::new(8));
        let limit = RateLimit {
            since: Utc::now() - chrono::Duration::minutes(10),
            max: 1,
        };

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let db = db.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let body = format!("Calçada quebrada {i}");
                    let new = new_report(&db, user_id, &body);
                    barrier.wait();
                    db.create_report_within_limit(&new, &[], &limit).unwrap()
                })
            })
            .collect();

        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| matches!(r, ReportInsert::Created { .. }))
            .count();
        assert_eq!(created, 1);
        assert_eq!(db.count_reports_since(user_id, limit.since).unwrap(), 1);
    }
}
