//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.

use crate::auth::Role;
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::workflow::{DossierStatus, Transition};
use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr},
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

/// Fields for a new document row
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub url: String,
    pub checksum: Option<String>,
    pub folder_id: Option<Uuid>,
    pub author_id: Uuid,
}

/// Partial document update; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub folder_id: Option<Option<Uuid>>,
}

/// Listing filter for documents
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub folder_id: Option<Uuid>,
    pub search: Option<String>,
    pub offset: u64,
    pub limit: u64,
}

/// Partial folder update; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct FolderUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub parent_id: Option<Option<Uuid>>,
}

/// Partial user update (administration)
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewDossier {
    pub numero_dossier: String,
    pub numero_nature: String,
    pub objet_operation: String,
    pub beneficiaire: String,
    pub poste_comptable_id: Uuid,
    pub nature_document_id: Uuid,
    pub folder_id: Option<Uuid>,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by (already normalized) email
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        UserEntity::find()
            .order_by_asc(UserColumn::Email)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Ids of every active user holding `role`
    pub async fn active_user_ids_with_role(&self, role: Role) -> Result<Vec<Uuid>> {
        UserEntity::find()
            .select_only()
            .column(UserColumn::Id)
            .filter(UserColumn::Role.eq(role.as_str()))
            .filter(UserColumn::IsActive.eq(true))
            .into_tuple::<Uuid>()
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn create_user(
        &self,
        email: String,
        name: String,
        password_hash: String,
        role: Role,
    ) -> Result<User> {
        let now = Utc::now();

        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            name: Set(name),
            password_hash: Set(password_hash),
            role: Set(role.as_str().to_string()),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        user.insert(self.conn()).await.map_err(Into::into)
    }

    pub async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User> {
        let user = self
            .find_user_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("user", id))?;

        let mut active: UserActiveModel = user.into();
        if let Some(name) = update.name {
            active.name = Set(name);
        }
        if let Some(role) = update.role {
            active.role = Set(role.as_str().to_string());
        }
        if let Some(is_active) = update.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now().into());

        active.update(self.conn()).await.map_err(Into::into)
    }

    /// Replace a user's password hash; false when the user does not exist
    pub async fn set_password_hash(&self, id: Uuid, password_hash: String) -> Result<bool> {
        let result = UserEntity::update_many()
            .col_expr(UserColumn::PasswordHash, Expr::value(password_hash))
            .col_expr(UserColumn::UpdatedAt, Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())))
            .filter(UserColumn::Id.eq(id))
            .exec(self.conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Folder Operations
    // ========================================================================

    /// List folders, optionally restricted to the children of one folder
    pub async fn list_folders(&self, parent_id: Option<Uuid>) -> Result<Vec<Folder>> {
        let mut query = FolderEntity::find();
        if let Some(parent_id) = parent_id {
            query = query.filter(FolderColumn::ParentId.eq(parent_id));
        }

        query
            .order_by_asc(FolderColumn::Name)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_folder_by_id(&self, id: Uuid) -> Result<Option<Folder>> {
        FolderEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn create_folder(
        &self,
        name: String,
        description: Option<String>,
        parent_id: Option<Uuid>,
        author_id: Uuid,
    ) -> Result<Folder> {
        let now = Utc::now();

        let folder = FolderActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            description: Set(description),
            parent_id: Set(parent_id),
            author_id: Set(author_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        folder.insert(self.conn()).await.map_err(Into::into)
    }

    pub async fn update_folder(&self, folder: Folder, update: FolderUpdate) -> Result<Folder> {
        let mut active: FolderActiveModel = folder.into();
        if let Some(name) = update.name {
            active.name = Set(name);
        }
        if let Some(description) = update.description {
            active.description = Set(description);
        }
        if let Some(parent_id) = update.parent_id {
            active.parent_id = Set(parent_id);
        }
        active.updated_at = Set(Utc::now().into());

        active.update(self.conn()).await.map_err(Into::into)
    }

    pub async fn delete_folder(&self, id: Uuid) -> Result<bool> {
        let result = FolderEntity::delete_by_id(id)
            .exec(self.conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn child_folders(&self, parent_id: Uuid) -> Result<Vec<Folder>> {
        self.list_folders(Some(parent_id)).await
    }

    // ========================================================================
    // Document Operations
    // ========================================================================

    /// List documents newest first, with the total matching count
    pub async fn list_documents(&self, filter: &DocumentFilter) -> Result<(Vec<Document>, u64)> {
        let mut query = DocumentEntity::find();

        if let Some(folder_id) = filter.folder_id {
            query = query.filter(DocumentColumn::FolderId.eq(folder_id));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = LikeExpr::new(contains_pattern(&search.to_lowercase())).escape('\\');
            query = query.filter(
                Expr::expr(Func::lower(Expr::col(DocumentColumn::Title))).like(pattern),
            );
        }

        let total = query.clone().count(self.conn()).await?;
        let documents = query
            .order_by_desc(DocumentColumn::CreatedAt)
            .offset(filter.offset)
            .limit(filter.limit)
            .all(self.conn())
            .await?;

        Ok((documents, total))
    }

    pub async fn documents_in_folder(&self, folder_id: Uuid) -> Result<Vec<Document>> {
        DocumentEntity::find()
            .filter(DocumentColumn::FolderId.eq(folder_id))
            .order_by_desc(DocumentColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_document_by_id(&self, id: Uuid) -> Result<Option<Document>> {
        DocumentEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn create_document(&self, new: NewDocument) -> Result<Document> {
        let now = Utc::now();

        let document = DocumentActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(new.title),
            description: Set(new.description),
            file_name: Set(new.file_name),
            file_size: Set(new.file_size),
            mime_type: Set(new.mime_type),
            url: Set(new.url),
            checksum: Set(new.checksum),
            folder_id: Set(new.folder_id),
            author_id: Set(new.author_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        document.insert(self.conn()).await.map_err(Into::into)
    }

    pub async fn update_document(&self, document: Document, update: DocumentUpdate) -> Result<Document> {
        let mut active: DocumentActiveModel = document.into();
        if let Some(title) = update.title {
            active.title = Set(title);
        }
        if let Some(description) = update.description {
            active.description = Set(description);
        }
        if let Some(folder_id) = update.folder_id {
            active.folder_id = Set(folder_id);
        }
        active.updated_at = Set(Utc::now().into());

        active.update(self.conn()).await.map_err(Into::into)
    }

    pub async fn delete_document(&self, id: Uuid) -> Result<bool> {
        let result = DocumentEntity::delete_by_id(id)
            .exec(self.conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Notification Operations
    // ========================================================================

    pub async fn list_notifications(&self, user_id: Uuid, unread_only: bool) -> Result<Vec<Notification>> {
        let mut query = NotificationEntity::find().filter(NotificationColumn::UserId.eq(user_id));
        if unread_only {
            query = query.filter(NotificationColumn::IsRead.eq(false));
        }

        query
            .order_by_desc(NotificationColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn unread_notification_count(&self, user_id: Uuid) -> Result<u64> {
        NotificationEntity::find()
            .filter(NotificationColumn::UserId.eq(user_id))
            .filter(NotificationColumn::IsRead.eq(false))
            .count(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Mark one of the user's notifications read; false when it is not theirs
    pub async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = NotificationEntity::update_many()
            .col_expr(NotificationColumn::IsRead, Expr::value(true))
            .col_expr(NotificationColumn::ReadAt, Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())))
            .filter(NotificationColumn::Id.eq(id))
            .filter(NotificationColumn::UserId.eq(user_id))
            .exec(self.conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Mark every unread notification of the user read, returning how many changed
    pub async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<u64> {
        let result = NotificationEntity::update_many()
            .col_expr(NotificationColumn::IsRead, Expr::value(true))
            .col_expr(NotificationColumn::ReadAt, Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())))
            .filter(NotificationColumn::UserId.eq(user_id))
            .filter(NotificationColumn::IsRead.eq(false))
            .exec(self.conn())
            .await?;

        Ok(result.rows_affected)
    }

    pub async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = NotificationEntity::delete_many()
            .filter(NotificationColumn::Id.eq(id))
            .filter(NotificationColumn::UserId.eq(user_id))
            .exec(self.conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Insert a batch of notifications; an empty batch is a no-op
    pub async fn create_notifications(&self, batch: Vec<NewNotification>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let count = batch.len();
        let now = Utc::now();
        let rows = batch.into_iter().map(|n| NotificationActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(n.user_id),
            title: Set(n.title),
            message: Set(n.message),
            kind: Set(n.kind.as_str().to_string()),
            link: Set(n.link),
            is_read: Set(false),
            read_at: Set(None),
            created_at: Set(now.into()),
        });

        NotificationEntity::insert_many(rows)
            .exec_without_returning(self.conn())
            .await?;

        Ok(count)
    }

    // ========================================================================
    // Reference Table Operations
    // ========================================================================

    pub async fn list_natures_documents(&self) -> Result<Vec<NatureDocument>> {
        NatureDocumentEntity::find()
            .filter(NatureDocumentColumn::IsActive.eq(true))
            .order_by_asc(NatureDocumentColumn::Numero)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_nature_document_by_id(&self, id: Uuid) -> Result<Option<NatureDocument>> {
        NatureDocumentEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn create_nature_document(
        &self,
        numero: String,
        nom: String,
        description: Option<String>,
    ) -> Result<NatureDocument> {
        let nature = NatureDocumentActiveModel {
            id: Set(Uuid::new_v4()),
            numero: Set(numero),
            nom: Set(nom),
            description: Set(description),
            is_active: Set(true),
            created_at: Set(Utc::now().into()),
        };

        nature.insert(self.conn()).await.map_err(Into::into)
    }

    pub async fn list_postes_comptables(&self) -> Result<Vec<PosteComptable>> {
        PosteComptableEntity::find()
            .filter(PosteComptableColumn::IsActive.eq(true))
            .order_by_asc(PosteComptableColumn::Numero)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_poste_comptable_by_id(&self, id: Uuid) -> Result<Option<PosteComptable>> {
        PosteComptableEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn create_poste_comptable(&self, numero: String, intitule: String) -> Result<PosteComptable> {
        let poste = PosteComptableActiveModel {
            id: Set(Uuid::new_v4()),
            numero: Set(numero),
            intitule: Set(intitule),
            is_active: Set(true),
            created_at: Set(Utc::now().into()),
        };

        poste.insert(self.conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Dossier Operations
    // ========================================================================

    /// List dossiers most recently updated first, optionally by status
    pub async fn list_dossiers(&self, statuses: Option<&[DossierStatus]>) -> Result<Vec<Dossier>> {
        let mut query = DossierEntity::find();
        if let Some(statuses) = statuses {
            query = query.filter(
                DossierColumn::Statut.is_in(statuses.iter().map(|s| s.as_str())),
            );
        }

        query
            .order_by_desc(DossierColumn::UpdatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_dossier_by_id(&self, id: Uuid) -> Result<Option<Dossier>> {
        DossierEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn dossier_history(&self, dossier_id: Uuid) -> Result<Vec<DossierHistory>> {
        DossierHistoryEntity::find()
            .filter(DossierHistoryColumn::DossierId.eq(dossier_id))
            .order_by_asc(DossierHistoryColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Insert a dossier in `EN_ATTENTE` together with its creation history entry
    pub async fn create_dossier(&self, new: NewDossier, secretaire_id: Uuid) -> Result<Dossier> {
        let now = Utc::now();
        let txn = self.conn().begin().await?;

        let dossier = DossierActiveModel {
            id: Set(Uuid::new_v4()),
            numero_dossier: Set(new.numero_dossier),
            numero_nature: Set(new.numero_nature),
            objet_operation: Set(new.objet_operation),
            beneficiaire: Set(new.beneficiaire),
            poste_comptable_id: Set(new.poste_comptable_id),
            nature_document_id: Set(new.nature_document_id),
            secretaire_id: Set(secretaire_id),
            folder_id: Set(new.folder_id),
            statut: Set(DossierStatus::EnAttente.as_str().to_string()),
            motif_rejet: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        DossierHistoryActiveModel {
            id: Set(Uuid::new_v4()),
            dossier_id: Set(dossier.id),
            from_statut: Set(None),
            to_statut: Set(DossierStatus::EnAttente.as_str().to_string()),
            actor_id: Set(secretaire_id),
            comment: Set(None),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(dossier)
    }

    /// Apply a planned transition.
    ///
    /// The update is conditioned on the current status, so of two concurrent
    /// transitions from the same status only one can succeed; the loser gets
    /// `InvalidTransition`.
    pub async fn apply_transition(
        &self,
        dossier_id: Uuid,
        transition: &Transition,
        actor_id: Uuid,
    ) -> Result<Dossier> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let txn = self.conn().begin().await?;

        let result = DossierEntity::update_many()
            .col_expr(DossierColumn::Statut, Expr::value(transition.to.as_str()))
            .col_expr(DossierColumn::MotifRejet, Expr::value(transition.motif_rejet()))
            .col_expr(DossierColumn::UpdatedAt, Expr::value(now))
            .filter(DossierColumn::Id.eq(dossier_id))
            .filter(DossierColumn::Statut.eq(transition.from.as_str()))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(AppError::InvalidTransition {
                action: transition.action.to_string(),
                from: transition.from.to_string(),
            });
        }

        DossierHistoryActiveModel {
            id: Set(Uuid::new_v4()),
            dossier_id: Set(dossier_id),
            from_statut: Set(Some(transition.from.as_str().to_string())),
            to_statut: Set(transition.to.as_str().to_string()),
            actor_id: Set(actor_id),
            comment: Set(transition.comment.clone()),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let dossier = DossierEntity::find_by_id(dossier_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("dossier", dossier_id))?;

        txn.commit().await?;
        Ok(dossier)
    }
}

/// `%term%` with LIKE wildcards in the term matched literally
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("facture"), "%facture%");
        assert_eq!(contains_pattern("50%"), "%50\\%%");
        assert_eq!(contains_pattern("a_b\\c"), "%a\\_b\\\\c%");
    }

    #[tokio::test]
    async fn test_document_search_escapes_percent() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![BTreeMap::from([("num_items", Value::BigInt(Some(0)))])]])
            .append_query_results([Vec::<Document>::new()])
            .into_connection();
        let db = Arc::new(db);
        let repo = Repository::new(DbPool::from_shared(db.clone()));

        let filter = DocumentFilter {
            folder_id: None,
            search: Some("50%".to_string()),
            limit: 50,
            offset: 0,
        };
        let (documents, total) = repo.list_documents(&filter).await.unwrap();
        assert!(documents.is_empty());
        assert_eq!(total, 0);

        drop(repo);
        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        let search = log
            .iter()
            .flat_map(|txn| txn.statements())
            .find(|stmt| stmt.sql.contains(" LIKE "))
            .unwrap();
        assert!(search.sql.contains("ESCAPE"));
        let pattern = Value::from("%50\\%%");
        assert!(search.values.as_ref().unwrap().0.contains(&pattern));
    }
}
