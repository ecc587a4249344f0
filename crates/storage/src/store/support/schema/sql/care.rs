#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS vaccinations (
          id TEXT PRIMARY KEY,
          revision INTEGER NOT NULL,
          child_id TEXT NOT NULL REFERENCES children(id) ON DELETE CASCADE,
          vaccine_id TEXT NOT NULL REFERENCES vaccines(id),
          dose INTEGER NOT NULL,
          status TEXT NOT NULL,
          scheduled_at_ms INTEGER,
          done_at_ms INTEGER,
          batch_number TEXT,
          health_center TEXT,
          administered_by TEXT,
          notes TEXT,
          created_by TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS appointments (
          id TEXT PRIMARY KEY,
          revision INTEGER NOT NULL,
          child_id TEXT NOT NULL REFERENCES children(id) ON DELETE CASCADE,
          vaccine_id TEXT REFERENCES vaccines(id),
          scheduled_at_ms INTEGER NOT NULL,
          status TEXT NOT NULL,
          notes TEXT,
          request_id TEXT,
          created_by TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS appointment_requests (
          id TEXT PRIMARY KEY,
          revision INTEGER NOT NULL,
          child_id TEXT NOT NULL REFERENCES children(id) ON DELETE CASCADE,
          guardian_phone TEXT NOT NULL,
          vaccine_id TEXT REFERENCES vaccines(id),
          preferred_at_ms INTEGER,
          message TEXT,
          status TEXT NOT NULL,
          response_note TEXT,
          appointment_id TEXT,
          answered_by TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );
"#;
