#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS notifications (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          idempotency_key TEXT NOT NULL UNIQUE,
          kind TEXT NOT NULL,
          title TEXT NOT NULL,
          message TEXT NOT NULL,
          child_id TEXT,
          vaccination_id TEXT,
          rooms_json TEXT NOT NULL,
          meta_json TEXT,
          created_at_ms INTEGER NOT NULL,
          dispatched_at_ms INTEGER,
          dispatch_attempts INTEGER NOT NULL DEFAULT 0,
          last_error TEXT
        );

        CREATE TABLE IF NOT EXISTS notification_rooms (
          seq INTEGER NOT NULL REFERENCES notifications(seq) ON DELETE CASCADE,
          room TEXT NOT NULL,
          PRIMARY KEY (seq, room)
        );

        CREATE TABLE IF NOT EXISTS notification_reads (
          seq INTEGER NOT NULL REFERENCES notifications(seq) ON DELETE CASCADE,
          reader TEXT NOT NULL,
          read_at_ms INTEGER NOT NULL,
          PRIMARY KEY (seq, reader)
        );

        CREATE TABLE IF NOT EXISTS campaigns (
          id TEXT PRIMARY KEY,
          revision INTEGER NOT NULL,
          title TEXT NOT NULL,
          description TEXT NOT NULL,
          vaccine_id TEXT REFERENCES vaccines(id),
          region TEXT,
          district TEXT,
          starts_at_ms INTEGER NOT NULL,
          ends_at_ms INTEGER NOT NULL,
          created_by TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );
"#;
