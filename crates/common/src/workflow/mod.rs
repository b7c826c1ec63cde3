//! Dossier approval workflow
//!
//! A dossier is registered by a secretary, checked by the budget controller,
//! ordered for payment by the ordonnateur and paid then closed by the
//! accounting agent. Each step is an [`DossierAction`] allowed for exactly one
//! role (admins may perform any of them) from exactly one status.

mod service;

pub use service::DossierService;

use crate::auth::Role;
use crate::db::models::NotificationKind;
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Workflow status stored in `dossiers.statut`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DossierStatus {
    #[serde(rename = "EN_ATTENTE")]
    EnAttente,
    #[serde(rename = "VALIDÉ_CB")]
    ValideCb,
    #[serde(rename = "REJETÉ_CB")]
    RejeteCb,
    #[serde(rename = "VALIDÉ_ORDONNATEUR")]
    ValideOrdonnateur,
    #[serde(rename = "PAYÉ")]
    Paye,
    #[serde(rename = "TERMINÉ")]
    Termine,
}

impl DossierStatus {
    pub const ALL: [DossierStatus; 6] = [
        DossierStatus::EnAttente,
        DossierStatus::ValideCb,
        DossierStatus::RejeteCb,
        DossierStatus::ValideOrdonnateur,
        DossierStatus::Paye,
        DossierStatus::Termine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DossierStatus::EnAttente => "EN_ATTENTE",
            DossierStatus::ValideCb => "VALIDÉ_CB",
            DossierStatus::RejeteCb => "REJETÉ_CB",
            DossierStatus::ValideOrdonnateur => "VALIDÉ_ORDONNATEUR",
            DossierStatus::Paye => "PAYÉ",
            DossierStatus::Termine => "TERMINÉ",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DossierStatus::Termine)
    }

    /// Role expected to act on a dossier in this status
    pub fn awaiting_role(&self) -> Option<Role> {
        match self {
            DossierStatus::EnAttente => Some(Role::ControleurBudgetaire),
            DossierStatus::RejeteCb => Some(Role::Secretaire),
            DossierStatus::ValideCb => Some(Role::Ordonnateur),
            DossierStatus::ValideOrdonnateur | DossierStatus::Paye => Some(Role::AgentComptable),
            DossierStatus::Termine => None,
        }
    }

    /// Statuses that make up a role's work queue. Admins see every open dossier.
    pub fn queue_for(role: Role) -> Vec<DossierStatus> {
        DossierStatus::ALL
            .into_iter()
            .filter(|status| match status.awaiting_role() {
                Some(awaiting) => role == Role::Admin || awaiting == role,
                None => false,
            })
            .collect()
    }
}

impl fmt::Display for DossierStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DossierStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        DossierStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::InvalidFormat {
                message: format!("unknown dossier status '{}'", s),
            })
    }
}

/// A workflow step requested by a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DossierAction {
    ValiderCb,
    RejeterCb,
    Resoumettre,
    Ordonnancer,
    Payer,
    Terminer,
}

impl DossierAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DossierAction::ValiderCb => "valider_cb",
            DossierAction::RejeterCb => "rejeter_cb",
            DossierAction::Resoumettre => "resoumettre",
            DossierAction::Ordonnancer => "ordonnancer",
            DossierAction::Payer => "payer",
            DossierAction::Terminer => "terminer",
        }
    }

    /// (required status, resulting status, role allowed to act)
    fn rule(&self) -> (DossierStatus, DossierStatus, Role) {
        use DossierStatus::*;
        match self {
            DossierAction::ValiderCb => (EnAttente, ValideCb, Role::ControleurBudgetaire),
            DossierAction::RejeterCb => (EnAttente, RejeteCb, Role::ControleurBudgetaire),
            DossierAction::Resoumettre => (RejeteCb, EnAttente, Role::Secretaire),
            DossierAction::Ordonnancer => (ValideCb, ValideOrdonnateur, Role::Ordonnateur),
            DossierAction::Payer => (ValideOrdonnateur, Paye, Role::AgentComptable),
            DossierAction::Terminer => (Paye, Termine, Role::AgentComptable),
        }
    }

    pub fn requires_comment(&self) -> bool {
        matches!(self, DossierAction::RejeterCb)
    }
}

impl fmt::Display for DossierAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated status change, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub action: DossierAction,
    pub from: DossierStatus,
    pub to: DossierStatus,
    pub comment: Option<String>,
}

impl Transition {
    /// Check role, current status and comment, in that order
    pub fn plan(
        action: DossierAction,
        current: DossierStatus,
        role: Role,
        comment: Option<&str>,
    ) -> Result<Self> {
        let (from, to, allowed) = action.rule();

        if !role.is_allowed(&[allowed]) {
            return Err(AppError::Forbidden {
                message: format!("Action '{}' requires role {}", action, allowed),
            });
        }

        if current != from {
            return Err(AppError::InvalidTransition {
                action: action.to_string(),
                from: current.to_string(),
            });
        }

        let comment = comment.map(str::trim).filter(|c| !c.is_empty()).map(String::from);
        if action.requires_comment() && comment.is_none() {
            return Err(AppError::validation("comment", "A rejection reason is required"));
        }

        Ok(Transition { action, from, to, comment })
    }

    /// Rejection reason to store on the dossier: set on rejection, cleared on resubmission
    pub fn motif_rejet(&self) -> Option<String> {
        match self.to {
            DossierStatus::RejeteCb => self.comment.clone(),
            _ => None,
        }
    }

    /// Who should hear about this change
    pub fn recipients(&self) -> Vec<Recipient> {
        recipients_for(self.to)
    }
}

/// Target of a workflow notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every active user holding the role
    Role(Role),
    /// The secretary who registered the dossier
    Secretary,
}

/// Recipients for a dossier entering `status`
pub fn recipients_for(status: DossierStatus) -> Vec<Recipient> {
    match status {
        DossierStatus::RejeteCb | DossierStatus::Termine => vec![Recipient::Secretary],
        other => other
            .awaiting_role()
            .map(Recipient::Role)
            .into_iter()
            .collect(),
    }
}

/// Title, message and severity of the notification sent when a dossier enters `status`
pub fn notification_text(
    status: DossierStatus,
    numero_dossier: &str,
    comment: Option<&str>,
) -> (String, String, NotificationKind) {
    match status {
        DossierStatus::EnAttente => (
            "Nouveau dossier à contrôler".to_string(),
            format!("Le dossier {} attend le contrôle budgétaire.", numero_dossier),
            NotificationKind::Info,
        ),
        DossierStatus::ValideCb => (
            "Dossier à ordonnancer".to_string(),
            format!("Le dossier {} a été validé par le contrôleur budgétaire.", numero_dossier),
            NotificationKind::Info,
        ),
        DossierStatus::RejeteCb => (
            "Dossier rejeté".to_string(),
            match comment {
                Some(reason) => format!("Le dossier {} a été rejeté : {}", numero_dossier, reason),
                None => format!("Le dossier {} a été rejeté.", numero_dossier),
            },
            NotificationKind::Warning,
        ),
        DossierStatus::ValideOrdonnateur => (
            "Dossier à payer".to_string(),
            format!("Le dossier {} a été ordonnancé.", numero_dossier),
            NotificationKind::Info,
        ),
        DossierStatus::Paye => (
            "Dossier payé".to_string(),
            format!("Le paiement du dossier {} a été effectué.", numero_dossier),
            NotificationKind::Success,
        ),
        DossierStatus::Termine => (
            "Dossier terminé".to_string(),
            format!("Le dossier {} est clôturé.", numero_dossier),
            NotificationKind::Success,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIONS: [DossierAction; 6] = [
        DossierAction::ValiderCb,
        DossierAction::RejeterCb,
        DossierAction::Resoumettre,
        DossierAction::Ordonnancer,
        DossierAction::Payer,
        DossierAction::Terminer,
    ];

    #[test]
    fn test_status_wire_names() {
        for status in DossierStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<DossierStatus>().unwrap(), status);
        }
        assert!("VALIDE_CB".parse::<DossierStatus>().is_err());
    }

    #[test]
    fn test_happy_path() {
        let steps = [
            (DossierAction::ValiderCb, Role::ControleurBudgetaire),
            (DossierAction::Ordonnancer, Role::Ordonnateur),
            (DossierAction::Payer, Role::AgentComptable),
            (DossierAction::Terminer, Role::AgentComptable),
        ];

        let mut status = DossierStatus::EnAttente;
        for (action, role) in steps {
            status = Transition::plan(action, status, role, None).unwrap().to;
        }
        assert_eq!(status, DossierStatus::Termine);
        assert!(status.is_terminal());
    }

    #[test]
    fn test_only_listed_triples_succeed() {
        for action in ACTIONS {
            let (from, to, allowed) = action.rule();
            for status in DossierStatus::ALL {
                for role in Role::ALL {
                    let result = Transition::plan(action, status, role, Some("motif"));
                    let expected_ok = status == from && (role == allowed || role == Role::Admin);
                    assert_eq!(result.is_ok(), expected_ok, "{action} from {status} as {role}");
                    if let Ok(t) = result {
                        assert_eq!(t.to, to);
                    }
                }
            }
        }
    }

    #[test]
    fn test_wrong_role_is_forbidden_before_status_check() {
        let err = Transition::plan(
            DossierAction::Payer,
            DossierStatus::EnAttente,
            Role::Secretaire,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
    }

    #[test]
    fn test_wrong_status_is_invalid_transition() {
        let err = Transition::plan(
            DossierAction::Payer,
            DossierStatus::EnAttente,
            Role::AgentComptable,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn test_rejection_requires_comment() {
        for comment in [None, Some(""), Some("   ")] {
            let err = Transition::plan(
                DossierAction::RejeterCb,
                DossierStatus::EnAttente,
                Role::ControleurBudgetaire,
                comment,
            )
            .unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }));
        }

        let t = Transition::plan(
            DossierAction::RejeterCb,
            DossierStatus::EnAttente,
            Role::ControleurBudgetaire,
            Some(" pièce manquante "),
        )
        .unwrap();
        assert_eq!(t.motif_rejet().as_deref(), Some("pièce manquante"));
        assert_eq!(t.recipients(), vec![Recipient::Secretary]);
    }

    #[test]
    fn test_resubmission_clears_motif() {
        let t = Transition::plan(
            DossierAction::Resoumettre,
            DossierStatus::RejeteCb,
            Role::Secretaire,
            Some("corrigé"),
        )
        .unwrap();
        assert_eq!(t.to, DossierStatus::EnAttente);
        assert_eq!(t.motif_rejet(), None);
        assert_eq!(t.recipients(), vec![Recipient::Role(Role::ControleurBudgetaire)]);
    }

    #[test]
    fn test_queues() {
        assert_eq!(
            DossierStatus::queue_for(Role::ControleurBudgetaire),
            vec![DossierStatus::EnAttente]
        );
        assert_eq!(
            DossierStatus::queue_for(Role::AgentComptable),
            vec![DossierStatus::ValideOrdonnateur, DossierStatus::Paye]
        );
        assert_eq!(DossierStatus::queue_for(Role::Secretaire), vec![DossierStatus::RejeteCb]);
        assert_eq!(DossierStatus::queue_for(Role::Admin).len(), 5);
    }

    #[test]
    fn test_terminal_notifies_secretary() {
        assert_eq!(recipients_for(DossierStatus::Termine), vec![Recipient::Secretary]);
        let (_, message, kind) = notification_text(DossierStatus::Termine, "D-001", None);
        assert!(message.contains("D-001"));
        assert_eq!(kind, NotificationKind::Success);
    }
}
