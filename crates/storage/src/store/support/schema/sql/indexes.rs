#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE UNIQUE INDEX IF NOT EXISTS idx_vaccinations_open_dose
          ON vaccinations(child_id, vaccine_id, dose)
          WHERE status IN ('planned', 'scheduled');
        CREATE UNIQUE INDEX IF NOT EXISTS idx_vaccinations_done_dose
          ON vaccinations(child_id, vaccine_id, dose)
          WHERE status = 'done';
        CREATE INDEX IF NOT EXISTS idx_vaccinations_child ON vaccinations(child_id, status);
        CREATE INDEX IF NOT EXISTS idx_vaccinations_due
          ON vaccinations(status, scheduled_at_ms);

        CREATE INDEX IF NOT EXISTS idx_children_hc ON children(health_center);
        CREATE INDEX IF NOT EXISTS idx_children_district ON children(district);
        CREATE INDEX IF NOT EXISTS idx_children_region ON children(region);
        CREATE INDEX IF NOT EXISTS idx_children_guardian ON children(guardian_phone);
        CREATE INDEX IF NOT EXISTS idx_children_status ON children(status);

        CREATE INDEX IF NOT EXISTS idx_appointments_child ON appointments(child_id, status);
        CREATE INDEX IF NOT EXISTS idx_appointments_due
          ON appointments(status, scheduled_at_ms);
        CREATE INDEX IF NOT EXISTS idx_appointment_requests_child
          ON appointment_requests(child_id, status);

        CREATE INDEX IF NOT EXISTS idx_stocks_hc ON stocks(health_center, vaccine_id);
        CREATE INDEX IF NOT EXISTS idx_stock_movements_stock ON stock_movements(stock_id, seq);

        CREATE INDEX IF NOT EXISTS idx_notifications_pending
          ON notifications(dispatched_at_ms, seq);
        CREATE INDEX IF NOT EXISTS idx_notification_rooms_room ON notification_rooms(room, seq);
        CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions(expires_at_ms);
"#;
