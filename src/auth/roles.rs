use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Access level attached to a credential record. Ordered: `User < Analyst < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Analyst,
    Admin,
}

/// Dashboard areas a session may be gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Area {
    Dashboard,
    Cybersecurity,
    DataScience,
    ItOperations,
    AiAssistant,
    UserAdmin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Analyst => "analyst",
            Role::Admin => "admin",
        }
    }

    /// Label shown next to the role on the dashboard.
    pub fn access_level(self) -> &'static str {
        match self {
            Role::User => "Basic",
            Role::Analyst => "Multi-domain",
            Role::Admin => "Full system",
        }
    }

    pub fn can_access(self, area: Area) -> bool {
        self >= area.required_role()
    }

    pub fn accessible_areas(self) -> Vec<Area> {
        Area::ALL
            .into_iter()
            .filter(|a| self.can_access(*a))
            .collect()
    }
}

impl Area {
    pub const ALL: [Area; 6] = [
        Area::Dashboard,
        Area::Cybersecurity,
        Area::DataScience,
        Area::ItOperations,
        Area::AiAssistant,
        Area::UserAdmin,
    ];

    pub fn required_role(self) -> Role {
        match self {
            Area::Dashboard | Area::AiAssistant => Role::User,
            Area::Cybersecurity | Area::DataScience | Area::ItOperations => Role::Analyst,
            Area::UserAdmin => Role::Admin,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "analyst" => Ok(Role::Analyst),
            "admin" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

// Lets `sqlx::FromRow` read the TEXT column through `#[sqlx(try_from = "String")]`.
impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for Area {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dashboard" => Ok(Area::Dashboard),
            "cybersecurity" => Ok(Area::Cybersecurity),
            "data_science" => Ok(Area::DataScience),
            "it_operations" => Ok(Area::ItOperations),
            "ai_assistant" => Ok(Area::AiAssistant),
            "user_admin" => Ok(Area::UserAdmin),
            other => Err(format!("unknown area {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ordered_by_privilege() {
        assert!(Role::User < Role::Analyst);
        assert!(Role::Analyst < Role::Admin);
    }

    #[test]
    fn user_only_reaches_shared_areas() {
        assert_eq!(
            Role::User.accessible_areas(),
            vec![Area::Dashboard, Area::AiAssistant]
        );
        assert!(!Role::User.can_access(Area::Cybersecurity));
    }

    #[test]
    fn analyst_reaches_domains_but_not_admin() {
        assert!(Role::Analyst.can_access(Area::DataScience));
        assert!(Role::Analyst.can_access(Area::ItOperations));
        assert!(!Role::Analyst.can_access(Area::UserAdmin));
    }

    #[test]
    fn admin_reaches_everything() {
        assert_eq!(Role::Admin.accessible_areas(), Area::ALL.to_vec());
    }

    #[test]
    fn parse_is_case_insensitive_and_strict() {
        assert_eq!("Analyst".parse::<Role>().unwrap(), Role::Analyst);
        assert_eq!(Role::try_from("admin".to_string()).unwrap(), Role::Admin);
        assert!("admin, ".parse::<Role>().is_err());
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn access_level_labels() {
        assert_eq!(Role::User.access_level(), "Basic");
        assert_eq!(Role::Analyst.access_level(), "Multi-domain");
        assert_eq!(Role::Admin.access_level(), "Full system");
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Role::Analyst).unwrap(), "\"analyst\"");
        let area: Area = serde_json::from_str("\"it_operations\"").unwrap();
        assert_eq!(area, Area::ItOperations);
        assert_eq!("it_operations".parse::<Area>().unwrap(), Area::ItOperations);
    }
}
