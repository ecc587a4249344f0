#![forbid(unsafe_code)]

use super::support::{
    bool_to_i64, check_revision, enum_column, hash_secret, map_insert_conflict,
    new_session_token, next_id_tx, normalize_id, normalize_limit, normalize_location,
    normalize_phone_input, normalize_required_text, now_ms,
    scope_filter, to_sqlite_i64, token_digest, verify_secret,
};
use super::*;
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};
use vt_core::ids::RecordKind;
use vt_core::model::Role;
use vt_core::scope::{Actor, Location};

const MAX_USER_NAME_LEN: usize = 120;
const MAX_EMAIL_LEN: usize = 254;
const MIN_PASSWORD_LEN: usize = 8;
// bcrypt reads at most 72 bytes of input.
const MAX_PASSWORD_BYTES: usize = 72;
const MIN_PIN_DIGITS: usize = 4;
const MAX_PIN_DIGITS: usize = 6;
const MAX_PIN_FAILURES: i64 = 5;
const PIN_LOCK_MS: i64 = 15 * 60_000;
const MIN_SESSION_TTL_MS: i64 = 60_000;

const USER_COLUMNS: &str = "u.id, u.revision, u.name, u.email, u.phone, u.role, \
     u.health_center, u.district, u.region, u.active, u.created_at_ms, u.updated_at_ms";

fn read_user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        revision: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        role: enum_column(5, "role", row.get(5)?, Role::parse)?,
        location: Location {
            health_center: row.get(6)?,
            district: row.get(7)?,
            region: row.get(8)?,
        },
        active: row.get(9)?,
        created_at_ms: row.get(10)?,
        updated_at_ms: row.get(11)?,
    })
}

fn normalize_email(raw: &str) -> Result<String, StoreError> {
    let email = raw.trim().to_ascii_lowercase();
    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return Err(StoreError::InvalidInput("email is invalid"));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(StoreError::InvalidInput("email is invalid"));
    };
    if local.is_empty() || domain.is_empty() || email.chars().any(char::is_whitespace) {
        return Err(StoreError::InvalidInput("email is invalid"));
    }
    Ok(email)
}

fn normalize_password(raw: &str) -> Result<&str, StoreError> {
    let len = raw.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(StoreError::InvalidInput("password must have at least 8 characters"));
    }
    if raw.len() > MAX_PASSWORD_BYTES {
        return Err(StoreError::InvalidInput("password is too long"));
    }
    Ok(raw)
}

fn normalize_pin(raw: &str) -> Result<String, StoreError> {
    let pin = raw.trim();
    if pin.len() < MIN_PIN_DIGITS
        || pin.len() > MAX_PIN_DIGITS
        || !pin.chars().all(|c| c.is_ascii_digit())
    {
        return Err(StoreError::InvalidInput("pin must be 4 to 6 digits"));
    }
    Ok(pin.to_string())
}

/// Keeps exactly the location levels the role is scoped by.
fn normalize_staff_location(role: Role, location: &Location) -> Result<Location, StoreError> {
    let location = normalize_location(location)?;
    let require = |value: Option<String>, message: &'static str| {
        value.ok_or(StoreError::InvalidInput(message))
    };
    match role {
        Role::User => Err(StoreError::InvalidInput(
            "guardians sign in with phone and pin",
        )),
        Role::National => Ok(Location::default()),
        Role::Regional => Ok(Location {
            region: Some(require(location.region, "region is required")?),
            ..Location::default()
        }),
        Role::District => Ok(Location {
            health_center: None,
            district: Some(require(location.district, "district is required")?),
            region: Some(require(location.region, "region is required")?),
        }),
        Role::Agent => Ok(Location {
            health_center: Some(require(location.health_center, "health_center is required")?),
            district: Some(require(location.district, "district is required")?),
            region: Some(require(location.region, "region is required")?),
        }),
    }
}

impl SqliteStore {
    pub fn user_create(&mut self, request: UserCreateRequest) -> Result<UserRow, StoreError> {
        let name = normalize_required_text(&request.name, MAX_USER_NAME_LEN, "name is invalid")?;
        let email = normalize_email(&request.email)?;
        let phone = request
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(normalize_phone_input)
            .transpose()?;
        let location = normalize_staff_location(request.role, &request.location)?;
        let password = normalize_password(&request.password)?;
        let hash = hash_secret(password)?;
        let now = now_ms();

        let tx = self.conn.transaction()?;
        let id = next_id_tx(&tx, RecordKind::User)?;
        tx.execute(
            "INSERT INTO users(id, revision, name, email, phone, role, health_center, district, \
             region, password_hash, active, created_at_ms, updated_at_ms) \
             VALUES (?1, 0, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?10)",
            params![
                id,
                name,
                email,
                phone,
                request.role.as_str(),
                location.health_center,
                location.district,
                location.region,
                hash,
                now,
            ],
        )
        .map_err(|err| map_insert_conflict(err, "email is already registered"))?;
        tx.commit()?;

        Ok(UserRow {
            id,
            revision: 0,
            name,
            email,
            phone,
            role: request.role,
            location,
            active: true,
            created_at_ms: now,
            updated_at_ms: now,
        })
    }

    pub fn user_get(&self, id: &str) -> Result<UserRow, StoreError> {
        let id = normalize_id(RecordKind::User, id)?;
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id=?1"),
                params![id],
                read_user_row,
            )
            .optional()?
            .ok_or(StoreError::UnknownId)
    }

    pub fn users_count(&self) -> Result<u64, StoreError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(1) FROM users", [], |row| row.get::<_, i64>(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    pub fn users_list(&self, request: UsersListRequest) -> Result<Vec<UserRow>, StoreError> {
        let filter = scope_filter(&request.scope, "u", None);
        let mut sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE {}", filter.clause);
        let mut values = filter.params;
        if let Some(role) = request.role {
            sql.push_str(" AND u.role = ?");
            values.push(Value::Text(role.as_str().to_string()));
        }
        sql.push_str(" ORDER BY u.id ASC LIMIT ? OFFSET ?");
        values.push(Value::Integer(to_sqlite_i64(normalize_limit(request.limit))?));
        values.push(Value::Integer(to_sqlite_i64(request.offset)?));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), read_user_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Deactivating a user also ends their sessions.
    pub fn user_set_active(&mut self, request: UserSetActiveRequest) -> Result<UserRow, StoreError> {
        let id = normalize_id(RecordKind::User, &request.id)?;
        let now = now_ms();
        let tx = self.conn.transaction()?;
        let revision = tx
            .query_row(
                "SELECT revision FROM users WHERE id=?1",
                params![id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .ok_or(StoreError::UnknownId)?;
        check_revision(request.expected_revision, revision)?;

        tx.execute(
            "UPDATE users SET active=?2, revision=?3, updated_at_ms=?4 WHERE id=?1",
            params![id, bool_to_i64(request.active), revision + 1, now],
        )?;
        if !request.active {
            tx.execute("DELETE FROM sessions WHERE user_id=?1", params![id])?;
        }
        let row = tx.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id=?1"),
            params![id],
            read_user_row,
        )?;
        tx.commit()?;
        Ok(row)
    }

    /// Unknown email, wrong password and inactive accounts are indistinguishable.
    pub fn user_authenticate(&self, email: &str, password: &str) -> Result<UserRow, StoreError> {
        let Ok(email) = normalize_email(email) else {
            return Err(StoreError::InvalidCredentials);
        };
        let found = self
            .conn
            .query_row(
                &format!(
                    "SELECT {USER_COLUMNS}, u.password_hash FROM users u \
                     WHERE u.email=?1"
                ),
                params![email],
                |row| {
                    Ok((read_user_row(row)?, row.get::<_, String>(12)?))
                },
            )
            .optional()?;
        let Some((user, hash)) = found else {
            return Err(StoreError::InvalidCredentials);
        };
        if !user.active || !verify_secret(password, &hash) {
            return Err(StoreError::InvalidCredentials);
        }
        Ok(user)
    }

    pub fn session_create(
        &mut self,
        request: SessionCreateRequest,
    ) -> Result<SessionIssued, StoreError> {
        let now = now_ms();
        let ttl_ms = request.ttl_ms.max(MIN_SESSION_TTL_MS);
        let expires_at_ms = now.saturating_add(ttl_ms);
        let token = new_session_token();
        let digest = token_digest(&token);

        let (user_id, guardian_phone) = match request.subject {
            SessionSubject::User(id) => {
                let user = self.user_get(&id)?;
                if !user.active {
                    return Err(StoreError::InvalidCredentials);
                }
                (Some(user.id), None)
            }
            SessionSubject::Guardian(phone) => (None, Some(normalize_phone_input(&phone)?)),
        };

        self.conn.execute(
            "INSERT INTO sessions(token_digest, user_id, guardian_phone, created_at_ms, \
             expires_at_ms) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![digest, user_id, guardian_phone, now, expires_at_ms],
        )?;

        Ok(SessionIssued {
            token,
            expires_at_ms,
        })
    }

    /// Resolves a bearer token to the acting principal. Expired sessions and deactivated
    /// users resolve to `InvalidCredentials`.
    pub fn session_resolve(&self, token: &str, now_ms: i64) -> Result<Actor, StoreError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(StoreError::InvalidCredentials);
        }
        let found = self
            .conn
            .query_row(
                "SELECT user_id, guardian_phone, expires_at_ms FROM sessions WHERE token_digest=?1",
                params![token_digest(token)],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((user_id, guardian_phone, expires_at_ms)) = found else {
            return Err(StoreError::InvalidCredentials);
        };
        if expires_at_ms <= now_ms {
            return Err(StoreError::InvalidCredentials);
        }

        match (user_id, guardian_phone) {
            (Some(user_id), _) => {
                let user = self
                    .user_get(&user_id)
                    .map_err(|_| StoreError::InvalidCredentials)?;
                if !user.active {
                    return Err(StoreError::InvalidCredentials);
                }
                Ok(user.actor())
            }
            (None, Some(phone)) => Ok(Actor {
                subject: phone,
                role: Role::User,
                location: Location::default(),
            }),
            (None, None) => Err(StoreError::InvalidCredentials),
        }
    }

    pub fn session_revoke(&mut self, token: &str) -> Result<bool, StoreError> {
        let removed = self.conn.execute(
            "DELETE FROM sessions WHERE token_digest=?1",
            params![token_digest(token.trim())],
        )?;
        Ok(removed > 0)
    }

    pub(super) fn sessions_purge_expired(&mut self, now_ms: i64) -> Result<usize, StoreError> {
        Ok(self.conn.execute(
            "DELETE FROM sessions WHERE expires_at_ms <= ?1",
            params![now_ms],
        )?)
    }

    /// Sets or replaces a guardian's PIN and clears any lockout. Only phones with at least one
    /// registered child can hold a PIN.
    pub fn guardian_pin_set(&mut self, phone: &str, pin: &str) -> Result<(), StoreError> {
        let phone = normalize_phone_input(phone)?;
        let pin = normalize_pin(pin)?;
        let tx = self.conn.transaction()?;
        let children = tx.query_row(
            "SELECT COUNT(1) FROM children WHERE guardian_phone=?1",
            params![phone],
            |row| row.get::<_, i64>(0),
        )?;
        if children == 0 {
            return Err(StoreError::UnknownId);
        }
        let hash = hash_secret(&pin)?;
        tx.execute(
            r#"
            INSERT INTO guardian_pins(phone, pin_hash, failed_attempts, locked_until_ms, updated_at_ms)
            VALUES (?1, ?2, 0, NULL, ?3)
            ON CONFLICT(phone) DO UPDATE SET pin_hash=excluded.pin_hash,
              failed_attempts=0, locked_until_ms=NULL, updated_at_ms=excluded.updated_at_ms
            "#,
            params![phone, hash, now_ms()],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn guardian_lookup(&self, phone: &str) -> Result<GuardianLookup, StoreError> {
        let phone = normalize_phone_input(phone)?;
        let children = self.conn.query_row(
            "SELECT COUNT(1) FROM children WHERE guardian_phone=?1",
            params![phone],
            |row| row.get::<_, i64>(0),
        )?;
        let pin_set = self
            .conn
            .query_row(
                "SELECT 1 FROM guardian_pins WHERE phone=?1",
                params![phone],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(GuardianLookup {
            phone,
            children: u64::try_from(children).unwrap_or(0),
            pin_set,
        })
    }

    /// Checks a guardian PIN and returns the normalized phone. Failed attempts are recorded
    /// even though the call fails; the fifth consecutive failure locks the phone.
    pub fn guardian_authenticate(
        &mut self,
        phone: &str,
        pin: &str,
        now_ms: i64,
    ) -> Result<String, StoreError> {
        let Ok(phone) = normalize_phone_input(phone) else {
            return Err(StoreError::InvalidCredentials);
        };
        let tx = self.conn.transaction()?;
        let found = tx
            .query_row(
                "SELECT pin_hash, failed_attempts, locked_until_ms \
                 FROM guardian_pins WHERE phone=?1",
                params![phone],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((hash, failed_attempts, locked_until_ms)) = found else {
            return Err(StoreError::InvalidCredentials);
        };
        if let Some(until_ms) = locked_until_ms
            && until_ms > now_ms
        {
            return Err(StoreError::Locked { until_ms });
        }

        if verify_secret(pin.trim(), &hash) {
            tx.execute(
                "UPDATE guardian_pins SET failed_attempts=0, locked_until_ms=NULL WHERE phone=?1",
                params![phone],
            )?;
            tx.commit()?;
            return Ok(phone);
        }

        let attempts = failed_attempts + 1;
        if attempts >= MAX_PIN_FAILURES {
            let until_ms = now_ms.saturating_add(PIN_LOCK_MS);
            tx.execute(
                "UPDATE guardian_pins SET failed_attempts=0, locked_until_ms=?2 WHERE phone=?1",
                params![phone, until_ms],
            )?;
            tx.commit()?;
            return Err(StoreError::Locked { until_ms });
        }
        tx.execute(
            "UPDATE guardian_pins SET failed_attempts=?2, locked_until_ms=NULL WHERE phone=?1",
            params![phone, attempts],
        )?;
        tx.commit()?;
        Err(StoreError::InvalidCredentials)
    }
}

