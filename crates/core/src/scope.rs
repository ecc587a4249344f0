#![forbid(unsafe_code)]

use crate::model::Role;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    pub health_center: Option<String>,
    pub district: Option<String>,
    pub region: Option<String>,
}

impl Location {
    pub fn new(health_center: &str, district: &str, region: &str) -> Self {
        Self {
            health_center: Some(health_center.to_string()),
            district: Some(district.to_string()),
            region: Some(region.to_string()),
        }
    }
}

/// What part of the national registry an actor may read and write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    National,
    Region(String),
    District(String),
    HealthCenter(String),
    Guardian(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupLevel {
    Region,
    District,
    HealthCenter,
}

impl GroupLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::District => "district",
            Self::HealthCenter => "health_center",
        }
    }
}

impl Scope {
    pub fn covers(&self, location: &Location) -> bool {
        match self {
            Self::National => true,
            Self::Region(region) => location.region.as_deref() == Some(region.as_str()),
            Self::District(district) => location.district.as_deref() == Some(district.as_str()),
            Self::HealthCenter(center) => {
                location.health_center.as_deref() == Some(center.as_str())
            }
            Self::Guardian(_) => false,
        }
    }

    /// Reports break figures down one administrative level below the scope.
    pub fn breakdown_level(&self) -> GroupLevel {
        match self {
            Self::National => GroupLevel::Region,
            Self::Region(_) => GroupLevel::District,
            Self::District(_) | Self::HealthCenter(_) | Self::Guardian(_) => {
                GroupLevel::HealthCenter
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    /// User id for staff, normalized phone for guardians.
    pub subject: String,
    pub role: Role,
    pub location: Location,
}

impl Actor {
    /// `None` when a staff account lacks the location its role needs; such an account sees
    /// nothing.
    pub fn scope(&self) -> Option<Scope> {
        match self.role {
            Role::National => Some(Scope::National),
            Role::Regional => self.location.region.clone().map(Scope::Region),
            Role::District => self.location.district.clone().map(Scope::District),
            Role::Agent => self.location.health_center.clone().map(Scope::HealthCenter),
            Role::User => Some(Scope::Guardian(self.subject.clone())),
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn at_least(&self, role: Role) -> bool {
        self.role.is_staff() && self.role.rank() >= role.rank()
    }

    pub fn can_see(&self, location: &Location, guardian_phone: Option<&str>) -> bool {
        match self.scope() {
            Some(Scope::Guardian(phone)) => guardian_phone == Some(phone.as_str()),
            Some(scope) => scope.covers(location),
            None => false,
        }
    }

    /// Staff may create accounts strictly below their own rank, inside their own scope.
    pub fn can_manage(&self, role: Role, location: &Location) -> bool {
        if !self.is_staff() || !role.is_staff() {
            return false;
        }
        if self.role.rank() <= role.rank() {
            return false;
        }
        self.scope().is_some_and(|scope| scope.covers(location))
    }
}
