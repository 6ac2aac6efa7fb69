use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// JWT Claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (username)
    pub name: String,
    pub exp: usize,  // Expiration time (timestamp)
}

/// Struct to hold authenticated user details, to be passed as a request extension.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub username: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManageTab {
    #[default]
    View,
    Add,
    Edit,
    Delete,
}

impl ManageTab {
    pub fn as_str(self) -> &'static str {
        match self {
            ManageTab::View => "view",
            ManageTab::Add => "add",
            ManageTab::Edit => "edit",
            ManageTab::Delete => "delete",
        }
    }
}

/// `?column=` picks the numeric column charted on the dashboard.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub column: Option<String>,
}

/// Query string of the management page and the CSV export.
#[derive(Debug, Default, Deserialize)]
pub struct ManageQuery {
    #[serde(default)]
    pub tab: ManageTab,
    pub column: Option<String>,
    pub q: Option<String>,
    pub id: Option<i64>,
    pub status: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    pub confirm: Option<String>,
}
