use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("DB: running migration v1 (initial schema)");
        conn.execute_batch(SCHEMA_V1)?;
    }

    if version < 2 {
        info!("DB: running migration v2 (taxonomy seed)");
        conn.execute_batch(SEED_V2)?;
    }

    if version < 3 {
        info!("DB: running migration v3 (report search column)");
        add_body_search(conn)?;
    }

    info!("Database migrations complete");
    Ok(())
}

const SCHEMA_V1: &str = "
    BEGIN;

    CREATE TABLE sequences (
        name    TEXT PRIMARY KEY,
        value   INTEGER NOT NULL
    );

    INSERT INTO sequences (name, value) VALUES
        ('seq_user', 0),
        ('seq_session', 0),
        ('seq_report', 0),
        ('seq_report_media', 0),
        ('seq_report_feedback', 0);

    CREATE TABLE users (
        id          INTEGER PRIMARY KEY,
        username    TEXT NOT NULL UNIQUE,
        password    TEXT NOT NULL,
        status      TEXT NOT NULL DEFAULT 'A' CHECK (status IN ('A', 'I')),
        admin       INTEGER NOT NULL DEFAULT 0,
        created_at  TEXT NOT NULL
    );

    CREATE TABLE sessions (
        id              INTEGER PRIMARY KEY,
        user_id         INTEGER REFERENCES users(id),
        public_token    TEXT NOT NULL UNIQUE,
        private_token   TEXT NOT NULL UNIQUE,
        status          TEXT NOT NULL DEFAULT 'A' CHECK (status IN ('A', 'I')),
        created_at      TEXT NOT NULL,
        updated_at      TEXT NOT NULL,
        expires_at      TEXT NOT NULL
    );

    CREATE TABLE cities (
        id              INTEGER PRIMARY KEY,
        indexed_name    TEXT NOT NULL UNIQUE,
        name            TEXT NOT NULL
    );

    CREATE TABLE districts (
        id              INTEGER PRIMARY KEY,
        city_id         INTEGER NOT NULL REFERENCES cities(id),
        indexed_name    TEXT NOT NULL,
        name            TEXT NOT NULL,
        UNIQUE(city_id, indexed_name)
    );

    CREATE TABLE categories (
        id              INTEGER PRIMARY KEY,
        indexed_name    TEXT NOT NULL UNIQUE,
        name            TEXT NOT NULL
    );

    CREATE TABLE reports (
        id              INTEGER PRIMARY KEY,
        user_id         INTEGER NOT NULL REFERENCES users(id),
        title           TEXT NOT NULL,
        body            TEXT NOT NULL,
        city_id         INTEGER NOT NULL REFERENCES cities(id),
        district_id     INTEGER NOT NULL REFERENCES districts(id),
        category_id     INTEGER NOT NULL REFERENCES categories(id),
        status          TEXT NOT NULL DEFAULT 'A' CHECK (status IN ('A', 'I')),
        votes           INTEGER NOT NULL DEFAULT 0,
        created_at      TEXT NOT NULL,
        updated_at      TEXT NOT NULL
    );

    CREATE INDEX idx_reports_user_created ON reports(user_id, created_at);

    CREATE TABLE report_media (
        id          INTEGER PRIMARY KEY,
        report_id   INTEGER NOT NULL REFERENCES reports(id),
        base64      TEXT NOT NULL CHECK (length(base64) > 0),
        created_at  TEXT NOT NULL
    );

    CREATE INDEX idx_report_media_report ON report_media(report_id);

    CREATE TABLE report_feedback (
        id          INTEGER PRIMARY KEY,
        report_id   INTEGER NOT NULL REFERENCES reports(id),
        user_id     INTEGER NOT NULL REFERENCES users(id),
        type        TEXT NOT NULL CHECK (type IN ('UP', 'DOWN')),
        created_at  TEXT NOT NULL
    );

    CREATE INDEX idx_report_feedback_report_user ON report_feedback(report_id, user_id);

    INSERT INTO schema_version (version) VALUES (1);

    COMMIT;
";

// Reference data behind the city, district and category pickers.
const SEED_V2: &str = "
    BEGIN;

    INSERT INTO cities (id, indexed_name, name) VALUES
        (1, 'TAQUARA', 'Taquara'),
        (2, 'PAROBE', 'Parobé');

    INSERT INTO districts (city_id, indexed_name, name) VALUES
        (1, 'CENTRO', 'Centro'),
        (1, 'VILA_NOVA', 'Vila Nova'),
        (1, 'JARDIM_DO_PRADO', 'Jardim do Prado'),
        (1, 'RONDA', 'Ronda'),
        (1, 'SAGRADA_FAMILIA', 'Sagrada Família'),
        (1, 'IDEAL', 'Ideal'),
        (1, 'KM4', 'Km 4'),
        (1, 'ELDORADO', 'Eldorado'),
        (1, 'NOSSA_SENHORA_DE_FATIMA', 'Nossa Senhora de Fátima'),
        (1, 'RECREIO', 'Recreio'),
        (1, 'MORRO_DO_LEONCIO', 'Morro do Leôncio'),
        (1, 'EMPRESA', 'Empresa'),
        (1, 'TUCANOS', 'Tucanos'),
        (1, 'MUNDO_NOVO', 'Mundo Novo'),
        (1, 'MEDIANEIRA', 'Medianeira'),
        (1, 'SANTA_TEREZINHA', 'Santa Terezinha'),
        (1, 'PETROPOLIS', 'Petrópolis'),
        (1, 'SANTA_ROSA', 'Santa Rosa'),
        (1, 'FOGAO_GAUCHO', 'Fogão Gaúcho'),
        (1, 'CRUZEIRO_DO_SUL', 'Cruzeiro do Sul'),
        (1, 'PICADA_FRANCESA', 'Picada Francesa'),
        (1, 'MORRO_DA_CRUZ', 'Morro da Cruz'),
        (1, 'SANTA_MARIA', 'Santa Maria'),
        (2, 'CENTRO', 'Centro'),
        (2, 'NOVA_PAROBE', 'Nova Parobé'),
        (2, 'PLANAZA', 'Planaza'),
        (2, 'BELA_VISTA', 'Bela Vista'),
        (2, 'FUNIL', 'Funil'),
        (2, 'GUARUJA', 'Guarujá'),
        (2, 'ALTO_GUARUJA', 'Alto Guarujá'),
        (2, 'VILA_MARIANA', 'Vila Mariana');

    INSERT INTO categories (id, indexed_name, name) VALUES
        (1, 'TRAFFIC_LIGHTS', 'Traffic lights'),
        (2, 'ROADS', 'Roads'),
        (3, 'POTHOLES', 'Potholes'),
        (4, 'GARBAGE', 'Garbage'),
        (5, 'STREET_LIGHTS', 'Street lights'),
        (6, 'TREES', 'Trees'),
        (7, 'OTHER', 'Other');

    INSERT INTO schema_version (version) VALUES (2);

    COMMIT;
";

/// SQLite's lower() only folds ASCII, so report search matches against a
/// copy of the body lowercased in Rust.
fn add_body_search(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch("ALTER TABLE reports ADD COLUMN body_search TEXT NOT NULL DEFAULT '';")?;

    let rows: Vec<(i64, String)> = {
        let mut stmt = tx.prepare("SELECT id, body FROM reports")?;
        let rows = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;
        rows.collect::<rusqlite::Result<_>>()?
    };
    for (id, body) in rows {
        tx.execute(
            "UPDATE reports SET body_search = ?1 WHERE id = ?2",
            rusqlite::params![body.to_lowercase(), id],
        )?;
    }

    tx.execute("INSERT INTO schema_version (version) VALUES (3)", [])?;
    tx.commit()?;
    Ok(())
}
