//! Dossier workflow operations on top of the repository

use super::{notification_text, recipients_for, DossierAction, DossierStatus, Recipient, Transition};
use crate::auth::AuthContext;
use crate::db::models::Dossier;
use crate::db::{NewDossier, NewNotification, Repository};
use crate::errors::{AppError, Result};
use tracing::{info, warn};
use uuid::Uuid;

pub struct DossierService {
    repo: Repository,
}

impl DossierService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Register a new dossier after checking its references, then notify the budget controllers
    pub async fn create(&self, auth: &AuthContext, new: NewDossier) -> Result<Dossier> {
        if self.repo.find_poste_comptable_by_id(new.poste_comptable_id).await?.is_none() {
            return Err(AppError::validation("poste_comptable_id", "Unknown accounting post"));
        }
        if self.repo.find_nature_document_by_id(new.nature_document_id).await?.is_none() {
            return Err(AppError::validation("nature_document_id", "Unknown document nature"));
        }
        if let Some(folder_id) = new.folder_id {
            if self.repo.find_folder_by_id(folder_id).await?.is_none() {
                return Err(AppError::validation("folder_id", "Unknown folder"));
            }
        }

        let dossier = self.repo.create_dossier(new, auth.user_id).await?;

        info!(
            dossier_id = %dossier.id,
            numero = %dossier.numero_dossier,
            user_id = %auth.user_id,
            "Dossier created"
        );

        self.notify(&dossier, DossierStatus::EnAttente, None, auth.user_id).await;
        Ok(dossier)
    }

    /// Validate and apply a workflow action, then notify whoever acts next
    pub async fn perform(
        &self,
        auth: &AuthContext,
        dossier_id: Uuid,
        action: DossierAction,
        comment: Option<&str>,
    ) -> Result<Dossier> {
        let dossier = self
            .repo
            .find_dossier_by_id(dossier_id)
            .await?
            .ok_or_else(|| AppError::not_found("dossier", dossier_id))?;

        let transition = Transition::plan(action, dossier.status()?, auth.role, comment)?;
        let updated = self
            .repo
            .apply_transition(dossier_id, &transition, auth.user_id)
            .await?;

        crate::metrics::record_transition(action.as_str());
        info!(
            dossier_id = %dossier_id,
            action = %action,
            from = %transition.from,
            to = %transition.to,
            user_id = %auth.user_id,
            "Dossier transition applied"
        );

        self.notify(&updated, transition.to, transition.comment.as_deref(), auth.user_id)
            .await;
        Ok(updated)
    }

    /// Fan out notifications for a dossier entering `status`.
    ///
    /// The status change is already committed, so a failure here is logged and
    /// swallowed rather than reported to the caller.
    async fn notify(&self, dossier: &Dossier, status: DossierStatus, comment: Option<&str>, actor_id: Uuid) {
        match self.build_notifications(dossier, status, comment, actor_id).await {
            Ok(batch) => match self.repo.create_notifications(batch).await {
                Ok(count) => crate::metrics::record_notifications(count),
                Err(e) => warn!(dossier_id = %dossier.id, error = %e, "Failed to store notifications"),
            },
            Err(e) => warn!(dossier_id = %dossier.id, error = %e, "Failed to resolve notification recipients"),
        }
    }

    async fn build_notifications(
        &self,
        dossier: &Dossier,
        status: DossierStatus,
        comment: Option<&str>,
        actor_id: Uuid,
    ) -> Result<Vec<NewNotification>> {
        let mut user_ids = Vec::new();
        for recipient in recipients_for(status) {
            match recipient {
                Recipient::Role(role) => {
                    user_ids.extend(self.repo.active_user_ids_with_role(role).await?);
                }
                Recipient::Secretary => user_ids.push(dossier.secretaire_id),
            }
        }

        // The actor does not need to hear about their own action
        user_ids.retain(|id| *id != actor_id);
        user_ids.sort();
        user_ids.dedup();

        let (title, message, kind) = notification_text(status, &dossier.numero_dossier, comment);
        let link = Some(format!("/dossiers/{}", dossier.id));

        Ok(user_ids
            .into_iter()
            .map(|user_id| NewNotification {
                user_id,
                title: title.clone(),
                message: message.clone(),
                kind,
                link: link.clone(),
            })
            .collect())
    }
}
