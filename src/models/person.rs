use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role. Serialized as the numeric role id used by the browser client
/// (`1` = recruiter, `2` = applicant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Role {
    Recruiter,
    Applicant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown role id {0}")]
pub struct UnknownRole(pub i32);

impl Role {
    pub fn id(self) -> i32 {
        match self {
            Role::Recruiter => 1,
            Role::Applicant => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Recruiter => "recruiter",
            Role::Applicant => "applicant",
        }
    }
}

impl TryFrom<i32> for Role {
    type Error = UnknownRole;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Role::Recruiter),
            2 => Ok(Role::Applicant),
            other => Err(UnknownRole(other)),
        }
    }
}

impl From<Role> for i32 {
    fn from(role: Role) -> Self {
        role.id()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Unsent,
    Unhandled,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown application status '{0}'")]
pub struct UnknownStatus(pub String);

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Unsent => "unsent",
            ApplicationStatus::Unhandled => "unhandled",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    /// Statuses a recruiter may move an application into.
    pub fn is_review_target(self) -> bool {
        match self {
            ApplicationStatus::Unhandled
            | ApplicationStatus::Accepted
            | ApplicationStatus::Rejected => true,
            ApplicationStatus::Unsent => false,
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unsent" => Ok(ApplicationStatus::Unsent),
            "unhandled" => Ok(ApplicationStatus::Unhandled),
            "accepted" => Ok(ApplicationStatus::Accepted),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the `person` table. Holds the password hash, so it is never serialized.
#[derive(Debug, Clone)]
pub struct Person {
    pub person_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub personal_number: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub status: ApplicationStatus,
    pub last_updated: DateTime<Utc>,
}

impl Person {
    /// Application status as exposed to clients; recruiters have none.
    pub fn application_status(&self) -> Option<ApplicationStatus> {
        match self.role {
            Role::Applicant => Some(self.status),
            Role::Recruiter => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPerson {
    pub first_name: String,
    pub last_name: String,
    pub personal_number: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

/// The authenticated caller, attached to request extensions by the auth gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub person_id: i32,
    pub role: Role,
}
