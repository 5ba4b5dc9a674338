use rusqlite::Connection;

/// Initialize the license database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Licenses are never physically deleted; revocation is a flag.
        -- issued_at / expires_at are ISO dates, validated_at / revoked_at unix seconds.
        CREATE TABLE IF NOT EXISTS licenses (
            id TEXT PRIMARY KEY,
            license_key TEXT NOT NULL,
            email TEXT NOT NULL,
            plugin TEXT NOT NULL,
            plan TEXT NOT NULL CHECK (plan IN ('year', 'life')),
            issued_at TEXT NOT NULL,
            expires_at TEXT,
            validated_at INTEGER,
            revoked INTEGER NOT NULL DEFAULT 0,
            revoke_reason TEXT,
            revoked_at INTEGER,
            CHECK ((plan = 'year') = (expires_at IS NOT NULL)),
            CHECK (revoked = 0 OR (revoke_reason IS NOT NULL AND revoked_at IS NOT NULL))
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_licenses_key ON licenses(license_key);
        CREATE INDEX IF NOT EXISTS idx_licenses_email ON licenses(email);

        -- Checkout sessions that already produced licenses (webhook replay guard)
        CREATE TABLE IF NOT EXISTS processed_checkouts (
            session_id TEXT PRIMARY KEY,
            processed_at INTEGER NOT NULL
        );
        "#,
    )
}
