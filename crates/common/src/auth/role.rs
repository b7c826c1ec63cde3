//! User roles and the role-to-route redirect table

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role carried by every user and every session token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Secretaire,
    ControleurBudgetaire,
    Ordonnateur,
    AgentComptable,
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Secretaire,
        Role::ControleurBudgetaire,
        Role::Ordonnateur,
        Role::AgentComptable,
        Role::Admin,
    ];

    /// Database and wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Secretaire => "SECRETAIRE",
            Role::ControleurBudgetaire => "CONTROLEUR_BUDGETAIRE",
            Role::Ordonnateur => "ORDONNATEUR",
            Role::AgentComptable => "AGENT_COMPTABLE",
            Role::Admin => "ADMIN",
        }
    }

    /// Landing page the client is redirected to after login
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Admin => "/dashboard",
            Role::Secretaire => "/folders",
            Role::ControleurBudgetaire => "/cb-dashboard",
            Role::Ordonnateur => "/ordonnateur-dashboard",
            Role::AgentComptable => "/ac-dashboard",
        }
    }

    /// Whether this role is accepted by an allow-list. Admin passes every list.
    pub fn is_allowed(&self, allowed: &[Role]) -> bool {
        *self == Role::Admin || allowed.contains(self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_table() {
        assert_eq!(Role::Admin.home_path(), "/dashboard");
        assert_eq!(Role::Secretaire.home_path(), "/folders");
        assert_eq!(Role::ControleurBudgetaire.home_path(), "/cb-dashboard");
        assert_eq!(Role::Ordonnateur.home_path(), "/ordonnateur-dashboard");
        assert_eq!(Role::AgentComptable.home_path(), "/ac-dashboard");
    }

    #[test]
    fn test_parse_matches_serde() {
        for role in Role::ALL {
            let parsed: Role = role.as_str().parse().unwrap();
            assert_eq!(parsed, role);

            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
        assert!("secretaire".parse::<Role>().is_err());
    }

    #[test]
    fn test_admin_passes_every_allow_list() {
        assert!(Role::Admin.is_allowed(&[]));
        assert!(Role::Admin.is_allowed(&[Role::Secretaire]));
        assert!(Role::Secretaire.is_allowed(&[Role::Secretaire]));
        assert!(!Role::Ordonnateur.is_allowed(&[Role::Secretaire]));
    }
}
