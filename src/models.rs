//! Request and response models for the API.
//!
//! All models use serde for serialization/deserialization. JSON field names
//! follow the dashboard client (camelCase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Roles and accounts
// ============================================================================

/// Role carried by a verified session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Professor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Professor => "professor",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Employment type of a professor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfessorKind {
    Permanent,
    Vacataire,
}

impl ProfessorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfessorKind::Permanent => "permanent",
            ProfessorKind::Vacataire => "vacataire",
        }
    }
}

impl std::str::FromStr for ProfessorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permanent" => Ok(ProfessorKind::Permanent),
            "vacataire" => Ok(ProfessorKind::Vacataire),
            _ => Err(format!("Invalid professor type: {}", s)),
        }
    }
}

/// Professor-only extension data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfessorProfile {
    pub kind: ProfessorKind,
    pub subjects: Vec<String>,
}

/// What an account is. Administrators carry no professor data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountKind {
    Admin,
    Professor(ProfessorProfile),
}

impl AccountKind {
    pub fn role(&self) -> Role {
        match self {
            AccountKind::Admin => Role::Admin,
            AccountKind::Professor(_) => Role::Professor,
        }
    }
}

/// An account as loaded from the credential store.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub photo: Option<String>,
    pub kind: AccountKind,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// "Name Surname", as shown in the audit log.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.name, self.surname)
    }
}

/// Account fields sent back to the client. Never contains the hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub is_admin: bool,
    pub is_professor: bool,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        let role = account.kind.role();
        AccountSummary {
            id: account.id.clone(),
            name: account.name.clone(),
            surname: account.surname.clone(),
            email: account.email.clone(),
            is_admin: role == Role::Admin,
            is_professor: role == Role::Professor,
        }
    }
}

// ============================================================================
// Auth Models
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: AccountSummary,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        MessageResponse {
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecoverRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
}

/// Identity of the current session, as returned by `GET /api/me`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub photo: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub expires_at: i64,
}

// ============================================================================
// Settings Models
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordUpdateRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

// ============================================================================
// Professor Models
// ============================================================================

/// Validated professor fields, shared by create, update and import.
#[derive(Debug, Clone)]
pub struct ProfessorInput {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phone: String,
    pub kind: ProfessorKind,
    pub subjects: Vec<String>,
    pub photo: Option<String>,
}

/// One row of a bulk import, already parsed from the spreadsheet by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub subjects: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub message: String,
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub imported_count: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfessorInfo {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(rename = "type")]
    pub kind: ProfessorKind,
    pub subjects: Vec<String>,
    pub photo: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MonthCount {
    pub month: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct ProfessorStats {
    pub total: i64,
    pub permanent: i64,
    pub vacataire: i64,
    pub trends: Vec<MonthCount>,
}

#[derive(Debug, Serialize)]
pub struct SubjectCount {
    pub total: i64,
}

// ============================================================================
// Audit Log Models
// ============================================================================

/// Label of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    Logout,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "Connexion",
            AuditAction::Logout => "Déconnexion",
        }
    }
}

/// Audit entry joined with its account, as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredLogEntry {
    pub id: i64,
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    pub account_surname: Option<String>,
    pub action: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

/// Audit entry for the log listing view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryInfo {
    pub id: i64,
    pub user_id: Option<String>,
    pub user: String,
    pub action: String,
    pub details: String,
    pub date: String,
    pub time: String,
}

impl From<StoredLogEntry> for LogEntryInfo {
    fn from(entry: StoredLogEntry) -> Self {
        let user = match (&entry.account_name, &entry.account_surname) {
            (Some(name), Some(surname)) => format!("{} {}", name, surname),
            _ => "Anonyme".to_string(),
        };
        LogEntryInfo {
            id: entry.id,
            user_id: entry.account_id,
            user,
            action: entry.action,
            details: entry.details,
            date: entry.created_at.format("%Y-%m-%d").to_string(),
            time: entry.created_at.format("%H:%M:%S").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn professor() -> Account {
        Account {
            id: "abcdefghijkl".to_string(),
            name: "Durand".to_string(),
            surname: "Claire".to_string(),
            email: "claire@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            phone: Some("0612345678".to_string()),
            photo: None,
            kind: AccountKind::Professor(ProfessorProfile {
                kind: ProfessorKind::Permanent,
                subjects: vec!["Maths".to_string()],
            }),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_never_contains_hash() {
        let summary = AccountSummary::from(&professor());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["isProfessor"], true);
        assert_eq!(json["isAdmin"], false);
        assert!(!json.to_string().contains("argon2id"));
    }

    #[test]
    fn test_role_strings() {
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(Role::Professor.as_str(), "professor");
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), "admin");
    }

    #[test]
    fn test_log_entry_formatting() {
        let entry = StoredLogEntry {
            id: 7,
            account_id: Some("abcdefghijkl".to_string()),
            account_name: Some("Admin".to_string()),
            account_surname: Some("User".to_string()),
            action: AuditAction::Login.as_str().to_string(),
            details: "Admin User s'est connecté.".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 4, 9, 5, 7).unwrap(),
        };
        let info = LogEntryInfo::from(entry);
        assert_eq!(info.user, "Admin User");
        assert_eq!(info.action, "Connexion");
        assert_eq!(info.date, "2025-03-04");
        assert_eq!(info.time, "09:05:07");
    }

    #[test]
    fn test_anonymous_log_entry() {
        let entry = StoredLogEntry {
            id: 1,
            account_id: None,
            account_name: None,
            account_surname: None,
            action: AuditAction::Logout.as_str().to_string(),
            details: "Un utilisateur s'est déconnecté.".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(LogEntryInfo::from(entry).user, "Anonyme");
    }
}
