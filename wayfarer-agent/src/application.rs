use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use wayfarer_core::{CoreError, CoreResult};
use wayfarer_shared::Masked;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 3] =
        [ApplicationStatus::Pending, ApplicationStatus::Approved, ApplicationStatus::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ApplicationStatus::Pending),
            "APPROVED" => Ok(ApplicationStatus::Approved),
            "REJECTED" => Ok(ApplicationStatus::Rejected),
            other => Err(CoreError::validation(format!("Invalid application status: {}", other))),
        }
    }
}

/// Public form posted by a prospective agent
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AgentApplicationForm {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 5, max = 32))]
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub license_number: Option<String>,
    #[validate(range(min = 0, max = 70))]
    pub years_experience: i32,
    #[serde(default)]
    pub specializations: Vec<String>,
    #[validate(length(min = 1, max = 4000))]
    pub motivation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentApplication {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: Masked<String>,
    pub phone: Option<Masked<String>>,
    pub company_name: Option<String>,
    pub license_number: Option<String>,
    pub years_experience: i32,
    pub specializations: Vec<String>,
    pub motivation: String,
    pub status: ApplicationStatus,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentApplication {
    /// Validates the form; the applicant may or may not already have an account.
    pub fn submit(form: AgentApplicationForm, user_id: Option<Uuid>) -> CoreResult<Self> {
        form.validate().map_err(|e| CoreError::validation(e.to_string()))?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            email: Masked::new(form.email.trim().to_lowercase()),
            phone: form.phone.map(Masked::new),
            company_name: form.company_name.filter(|c| !c.trim().is_empty()),
            license_number: form.license_number.filter(|l| !l.trim().is_empty()),
            years_experience: form.years_experience,
            specializations: form
                .specializations
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            motivation: form.motivation,
            status: ApplicationStatus::Pending,
            admin_notes: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApplicationStatus::Pending
    }

    pub fn approve(&mut self, admin_id: Uuid, notes: Option<String>) {
        self.review(ApplicationStatus::Approved, admin_id, notes);
    }

    pub fn reject(&mut self, admin_id: Uuid, reason: Option<String>) {
        self.review(ApplicationStatus::Rejected, admin_id, reason);
    }

    // reviewed_at is stamped on the first non-PENDING transition only.
    fn review(&mut self, status: ApplicationStatus, admin_id: Uuid, notes: Option<String>) {
        let now = Utc::now();
        if status != ApplicationStatus::Pending && self.reviewed_at.is_none() {
            self.reviewed_at = Some(now);
        }
        self.status = status;
        self.reviewed_by = Some(admin_id);
        if notes.is_some() {
            self.admin_notes = notes;
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn form(email: &str) -> AgentApplicationForm {
        AgentApplicationForm {
            first_name: "Marco".into(),
            last_name: "Polo".into(),
            email: email.into(),
            phone: Some("+39 041 555 0101".into()),
            company_name: Some("Silk Road Travel".into()),
            license_number: None,
            years_experience: 12,
            specializations: vec!["Asia".into(), " ".into()],
            motivation: "I have walked most of these routes.".into(),
        }
    }

    #[test]
    fn test_submit_normalizes() {
        let app = AgentApplication::submit(form(" Marco@Example.com "), None).unwrap();
        assert_eq!(app.email.expose(), "marco@example.com");
        assert_eq!(app.specializations, vec!["Asia".to_string()]);
        assert!(app.is_pending());
        assert!(app.reviewed_at.is_none());
    }

    #[test]
    fn test_submit_rejects_bad_email() {
        let err = AgentApplication::submit(form("not-an-email"), None).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_submit_requires_motivation() {
        let mut f = form("marco@example.com");
        f.motivation = String::new();
        assert!(AgentApplication::submit(f, None).is_err());
    }

    #[test]
    fn test_reviewed_at_set_once() {
        let mut app = AgentApplication::submit(form("marco@example.com"), None).unwrap();
        let admin = Uuid::new_v4();
        app.reject(admin, Some("Missing license".into()));
        let first = app.reviewed_at.unwrap();

        let second_admin = Uuid::new_v4();
        app.approve(second_admin, None);
        assert_eq!(app.reviewed_at, Some(first));
        assert_eq!(app.reviewed_by, Some(second_admin));
        assert_eq!(app.admin_notes.as_deref(), Some("Missing license"));
        assert_eq!(app.status, ApplicationStatus::Approved);
    }
}
