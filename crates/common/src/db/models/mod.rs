//! SeaORM entity models
//!
//! Database entities for ACGE

mod user;
mod folder;
mod document;
mod notification;
mod nature_document;
mod poste_comptable;
mod dossier;
mod dossier_history;

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
};

pub use folder::{
    Entity as FolderEntity,
    Model as Folder,
    ActiveModel as FolderActiveModel,
    Column as FolderColumn,
};

pub use document::{
    Entity as DocumentEntity,
    Model as Document,
    ActiveModel as DocumentActiveModel,
    Column as DocumentColumn,
};

pub use notification::{
    Entity as NotificationEntity,
    Model as Notification,
    ActiveModel as NotificationActiveModel,
    Column as NotificationColumn,
    NotificationKind,
};

pub use nature_document::{
    Entity as NatureDocumentEntity,
    Model as NatureDocument,
    ActiveModel as NatureDocumentActiveModel,
    Column as NatureDocumentColumn,
};

pub use poste_comptable::{
    Entity as PosteComptableEntity,
    Model as PosteComptable,
    ActiveModel as PosteComptableActiveModel,
    Column as PosteComptableColumn,
};

pub use dossier::{
    Entity as DossierEntity,
    Model as Dossier,
    ActiveModel as DossierActiveModel,
    Column as DossierColumn,
};

pub use dossier_history::{
    Entity as DossierHistoryEntity,
    Model as DossierHistory,
    ActiveModel as DossierHistoryActiveModel,
    Column as DossierHistoryColumn,
};
