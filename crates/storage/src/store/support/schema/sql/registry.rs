#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS vaccines (
          id TEXT PRIMARY KEY,
          revision INTEGER NOT NULL,
          name TEXT NOT NULL UNIQUE,
          description TEXT,
          min_age_days INTEGER NOT NULL,
          doses_required INTEGER NOT NULL,
          dose_interval_days INTEGER NOT NULL,
          active INTEGER NOT NULL DEFAULT 1,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS children (
          id TEXT PRIMARY KEY,
          revision INTEGER NOT NULL,
          first_name TEXT NOT NULL,
          last_name TEXT NOT NULL,
          gender TEXT NOT NULL,
          birth_date_ms INTEGER NOT NULL,
          guardian_name TEXT NOT NULL,
          guardian_phone TEXT NOT NULL,
          address TEXT,
          health_center TEXT NOT NULL,
          district TEXT NOT NULL,
          region TEXT NOT NULL,
          status TEXT NOT NULL,
          next_appointment_ms INTEGER,
          status_updated_at_ms INTEGER NOT NULL,
          created_by TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );
"#;
