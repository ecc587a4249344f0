#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS stocks (
          id TEXT PRIMARY KEY,
          revision INTEGER NOT NULL,
          vaccine_id TEXT NOT NULL REFERENCES vaccines(id),
          batch_number TEXT NOT NULL,
          health_center TEXT NOT NULL,
          district TEXT NOT NULL,
          region TEXT NOT NULL,
          quantity INTEGER NOT NULL CHECK (quantity >= 0),
          alert_threshold INTEGER NOT NULL,
          expires_at_ms INTEGER,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          UNIQUE (vaccine_id, health_center, batch_number)
        );

        CREATE TABLE IF NOT EXISTS stock_movements (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          stock_id TEXT NOT NULL REFERENCES stocks(id),
          delta INTEGER NOT NULL,
          quantity_after INTEGER NOT NULL,
          reason TEXT NOT NULL,
          vaccination_id TEXT,
          actor_id TEXT,
          ts_ms INTEGER NOT NULL
        );
"#;
