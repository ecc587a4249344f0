#![forbid(unsafe_code)]

pub mod rooms;
pub mod schedule;
pub mod scope;
pub mod status;
pub mod stock;

pub mod ids {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum RecordKind {
        User,
        Child,
        Vaccine,
        Vaccination,
        Appointment,
        AppointmentRequest,
        Stock,
        Campaign,
    }

    impl RecordKind {
        pub fn prefix(self) -> &'static str {
            match self {
                Self::User => "USR",
                Self::Child => "CHD",
                Self::Vaccine => "VAX",
                Self::Vaccination => "VCN",
                Self::Appointment => "APT",
                Self::AppointmentRequest => "ARQ",
                Self::Stock => "STK",
                Self::Campaign => "CMP",
            }
        }

        /// Name of the row in the `counters` table that allocates ids of this kind.
        pub fn counter(self) -> &'static str {
            match self {
                Self::User => "user_seq",
                Self::Child => "child_seq",
                Self::Vaccine => "vaccine_seq",
                Self::Vaccination => "vaccination_seq",
                Self::Appointment => "appointment_seq",
                Self::AppointmentRequest => "appointment_request_seq",
                Self::Stock => "stock_seq",
                Self::Campaign => "campaign_seq",
            }
        }

        pub fn format(self, seq: i64) -> String {
            format!("{}-{seq:04}", self.prefix())
        }

        pub fn parse(self, raw: &str) -> Result<String, RecordIdError> {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(RecordIdError::Empty);
            }
            let upper = raw.to_ascii_uppercase();
            let Some(digits) = upper
                .strip_prefix(self.prefix())
                .and_then(|rest| rest.strip_prefix('-'))
            else {
                return Err(RecordIdError::WrongPrefix);
            };
            if digits.len() < 4 {
                return Err(RecordIdError::TooFewDigits);
            }
            if !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(RecordIdError::InvalidDigit);
            }
            Ok(upper)
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum RecordIdError {
        Empty,
        WrongPrefix,
        TooFewDigits,
        InvalidDigit,
    }

    impl RecordIdError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "id must not be empty",
                Self::WrongPrefix => "id has the wrong prefix",
                Self::TooFewDigits => "id must have at least 4 digits",
                Self::InvalidDigit => "id digits must be [0-9]",
            }
        }
    }
}

pub mod model {
    /// Who is acting. Staff roles are ordered by visibility; `User` is a guardian signed in
    /// from the mobile API with phone + PIN.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum Role {
        Agent,
        District,
        Regional,
        National,
        User,
    }

    impl Role {
        pub fn parse(value: &str) -> Option<Self> {
            match value.trim().to_ascii_lowercase().as_str() {
                "agent" => Some(Self::Agent),
                "district" => Some(Self::District),
                "regional" | "region" => Some(Self::Regional),
                "national" | "admin" => Some(Self::National),
                "user" | "parent" | "guardian" => Some(Self::User),
                _ => None,
            }
        }

        pub fn as_str(self) -> &'static str {
            match self {
                Self::Agent => "agent",
                Self::District => "district",
                Self::Regional => "regional",
                Self::National => "national",
                Self::User => "user",
            }
        }

        pub fn rank(self) -> u8 {
            match self {
                Self::User => 0,
                Self::Agent => 1,
                Self::District => 2,
                Self::Regional => 3,
                Self::National => 4,
            }
        }

        pub fn is_staff(self) -> bool {
            self != Self::User
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum VaccinationStatus {
        Planned,
        Scheduled,
        Done,
        Missed,
        Cancelled,
    }

    impl VaccinationStatus {
        pub fn parse(value: &str) -> Option<Self> {
            match value.trim().to_ascii_lowercase().as_str() {
                "planned" => Some(Self::Planned),
                "scheduled" => Some(Self::Scheduled),
                "done" | "completed" => Some(Self::Done),
                "missed" => Some(Self::Missed),
                "cancelled" | "canceled" => Some(Self::Cancelled),
                _ => None,
            }
        }

        pub fn as_str(self) -> &'static str {
            match self {
                Self::Planned => "planned",
                Self::Scheduled => "scheduled",
                Self::Done => "done",
                Self::Missed => "missed",
                Self::Cancelled => "cancelled",
            }
        }

        /// Planned and scheduled records count toward the child's next appointment.
        pub fn is_open(self) -> bool {
            matches!(self, Self::Planned | Self::Scheduled)
        }

        pub fn is_terminal(self) -> bool {
            matches!(self, Self::Done | Self::Cancelled)
        }

        pub fn can_transition(self, next: Self) -> bool {
            match next {
                Self::Done | Self::Cancelled | Self::Scheduled => {
                    matches!(self, Self::Planned | Self::Scheduled | Self::Missed)
                }
                Self::Missed => self == Self::Scheduled,
                Self::Planned => false,
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum VaccinationTransition {
        Complete,
        MarkMissed,
        Cancel,
        Reschedule,
    }

    impl VaccinationTransition {
        pub fn target(self) -> VaccinationStatus {
            match self {
                Self::Complete => VaccinationStatus::Done,
                Self::MarkMissed => VaccinationStatus::Missed,
                Self::Cancel => VaccinationStatus::Cancelled,
                Self::Reschedule => VaccinationStatus::Scheduled,
            }
        }

        pub fn notification_kind(self) -> NotificationKind {
            match self {
                Self::Complete => NotificationKind::VaccinationDone,
                Self::MarkMissed => NotificationKind::VaccinationMissed,
                Self::Cancel => NotificationKind::VaccinationCancelled,
                Self::Reschedule => NotificationKind::VaccinationRescheduled,
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum ChildStatus {
        UpToDate,
        Late,
        Unscheduled,
        DueNow,
    }

    impl ChildStatus {
        pub const ALL: [ChildStatus; 4] = [
            ChildStatus::UpToDate,
            ChildStatus::Late,
            ChildStatus::Unscheduled,
            ChildStatus::DueNow,
        ];

        pub fn parse(value: &str) -> Option<Self> {
            match value.trim().to_ascii_lowercase().as_str() {
                "up_to_date" | "uptodate" => Some(Self::UpToDate),
                "late" => Some(Self::Late),
                "unscheduled" => Some(Self::Unscheduled),
                "due_now" | "duenow" => Some(Self::DueNow),
                _ => None,
            }
        }

        pub fn as_str(self) -> &'static str {
            match self {
                Self::UpToDate => "up_to_date",
                Self::Late => "late",
                Self::Unscheduled => "unscheduled",
                Self::DueNow => "due_now",
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum AppointmentStatus {
        Scheduled,
        Completed,
        Missed,
        Cancelled,
    }

    impl AppointmentStatus {
        pub fn parse(value: &str) -> Option<Self> {
            match value.trim().to_ascii_lowercase().as_str() {
                "scheduled" => Some(Self::Scheduled),
                "completed" | "done" => Some(Self::Completed),
                "missed" => Some(Self::Missed),
                "cancelled" | "canceled" => Some(Self::Cancelled),
                _ => None,
            }
        }

        pub fn as_str(self) -> &'static str {
            match self {
                Self::Scheduled => "scheduled",
                Self::Completed => "completed",
                Self::Missed => "missed",
                Self::Cancelled => "cancelled",
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum RequestStatus {
        Pending,
        Accepted,
        Rejected,
    }

    impl RequestStatus {
        pub fn parse(value: &str) -> Option<Self> {
            match value.trim().to_ascii_lowercase().as_str() {
                "pending" => Some(Self::Pending),
                "accepted" => Some(Self::Accepted),
                "rejected" => Some(Self::Rejected),
                _ => None,
            }
        }

        pub fn as_str(self) -> &'static str {
            match self {
                Self::Pending => "pending",
                Self::Accepted => "accepted",
                Self::Rejected => "rejected",
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum Gender {
        Male,
        Female,
    }

    impl Gender {
        pub fn parse(value: &str) -> Option<Self> {
            match value.trim().to_ascii_lowercase().as_str() {
                "male" | "m" => Some(Self::Male),
                "female" | "f" => Some(Self::Female),
                _ => None,
            }
        }

        pub fn as_str(self) -> &'static str {
            match self {
                Self::Male => "male",
                Self::Female => "female",
            }
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum NotificationKind {
        VaccinationScheduled,
        VaccinationDone,
        VaccinationMissed,
        VaccinationCancelled,
        VaccinationRescheduled,
        AppointmentScheduled,
        AppointmentRequested,
        AppointmentRequestAnswered,
        Campaign,
        StockLow,
    }

    impl NotificationKind {
        pub fn as_str(self) -> &'static str {
            match self {
                Self::VaccinationScheduled => "vaccination_scheduled",
                Self::VaccinationDone => "vaccination_done",
                Self::VaccinationMissed => "vaccination_missed",
                Self::VaccinationCancelled => "vaccination_cancelled",
                Self::VaccinationRescheduled => "vaccination_rescheduled",
                Self::AppointmentScheduled => "appointment_scheduled",
                Self::AppointmentRequested => "appointment_requested",
                Self::AppointmentRequestAnswered => "appointment_request_answered",
                Self::Campaign => "campaign",
                Self::StockLow => "stock_low",
            }
        }

        pub fn title(self) -> &'static str {
            match self {
                Self::VaccinationScheduled => "Vaccination scheduled",
                Self::VaccinationDone => "Vaccination completed",
                Self::VaccinationMissed => "Vaccination missed",
                Self::VaccinationCancelled => "Vaccination cancelled",
                Self::VaccinationRescheduled => "Vaccination rescheduled",
                Self::AppointmentScheduled => "Appointment scheduled",
                Self::AppointmentRequested => "Appointment requested",
                Self::AppointmentRequestAnswered => "Appointment request answered",
                Self::Campaign => "Awareness campaign",
                Self::StockLow => "Low vaccine stock",
            }
        }
    }
}

pub mod phone {
    const MIN_DIGITS: usize = 8;
    const MAX_DIGITS: usize = 15;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum PhoneError {
        Empty,
        InvalidChar { ch: char, index: usize },
        TooShort,
        TooLong,
    }

    impl PhoneError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "phone must not be empty",
                Self::InvalidChar { .. } => "phone contains invalid characters",
                Self::TooShort => "phone is too short",
                Self::TooLong => "phone is too long",
            }
        }
    }

    /// Canonical lookup form: optional leading `+` followed by digits only. Spaces, dots,
    /// dashes and parentheses are dropped.
    pub fn normalize_phone(raw: &str) -> Result<String, PhoneError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PhoneError::Empty);
        }
        let mut out = String::with_capacity(raw.len());
        for (index, ch) in raw.chars().enumerate() {
            match ch {
                '0'..='9' => out.push(ch),
                '+' if out.is_empty() && index == 0 => out.push(ch),
                ' ' | '.' | '-' | '(' | ')' => {}
                _ => return Err(PhoneError::InvalidChar { ch, index }),
            }
        }
        let digits = out.trim_start_matches('+').len();
        if digits == 0 {
            return Err(PhoneError::Empty);
        }
        if digits < MIN_DIGITS {
            return Err(PhoneError::TooShort);
        }
        if digits > MAX_DIGITS {
            return Err(PhoneError::TooLong);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests;
