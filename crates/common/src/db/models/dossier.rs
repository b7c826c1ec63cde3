//! Dossier entity: a payment case moving through the approval workflow

use crate::workflow::DossierStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dossiers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub numero_dossier: String,

    #[sea_orm(column_type = "Text")]
    pub numero_nature: String,

    #[sea_orm(column_type = "Text")]
    pub objet_operation: String,

    #[sea_orm(column_type = "Text")]
    pub beneficiaire: String,

    pub poste_comptable_id: Uuid,

    pub nature_document_id: Uuid,

    /// Secretary who registered the dossier
    pub secretaire_id: Uuid,

    pub folder_id: Option<Uuid>,

    /// One of the `DossierStatus` wire names
    #[sea_orm(column_type = "Text")]
    pub statut: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub motif_rejet: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Parse the stored status
    pub fn status(&self) -> crate::errors::Result<DossierStatus> {
        self.statut.parse().map_err(|e| crate::errors::AppError::Internal {
            message: format!("Dossier {} has {}", self.id, e),
        })
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::poste_comptable::Entity",
        from = "Column::PosteComptableId",
        to = "super::poste_comptable::Column::Id"
    )]
    PosteComptable,

    #[sea_orm(
        belongs_to = "super::nature_document::Entity",
        from = "Column::NatureDocumentId",
        to = "super::nature_document::Column::Id"
    )]
    NatureDocument,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SecretaireId",
        to = "super::user::Column::Id"
    )]
    Secretaire,

    #[sea_orm(
        belongs_to = "super::folder::Entity",
        from = "Column::FolderId",
        to = "super::folder::Column::Id",
        on_delete = "SetNull"
    )]
    Folder,

    #[sea_orm(has_many = "super::dossier_history::Entity")]
    History,
}

impl Related<super::poste_comptable::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PosteComptable.def()
    }
}

impl Related<super::nature_document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::NatureDocument.def()
    }
}

impl Related<super::dossier_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::History.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
