use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryOrder};
use serde::{Deserialize, Serialize};

/// One stored upload. A message with several files gets one row per file,
/// never a single row pointing at a list.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "message_attachments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub message_id: i64,

    /// Storage locator under which the file is served back. Write-once.
    pub url: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::messages::Entity",
        from = "Column::MessageId",
        to = "super::messages::Column::Id"
    )]
    Message,
}

impl Related<super::messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Message.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Input for attachment creation, decoupled from the multipart layer.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub url: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
}

impl Model {
    pub async fn create_many<C: ConnectionTrait>(
        db: &C,
        message_id: i64,
        attachments: &[NewAttachment],
    ) -> Result<Vec<Model>, DbErr> {
        let mut created = Vec::with_capacity(attachments.len());
        for att in attachments {
            let active = ActiveModel {
                message_id: Set(message_id),
                url: Set(att.url.clone()),
                mime_type: Set(att.mime_type.clone()),
                size_bytes: Set(att.size_bytes),
                ..Default::default()
            };
            created.push(active.insert(db).await?);
        }
        Ok(created)
    }

    pub async fn find_for_message<C: ConnectionTrait>(
        db: &C,
        message_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::MessageId.eq(message_id))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    /// Batch fetch for nesting attachments under a message list.
    pub async fn find_for_messages<C: ConnectionTrait>(
        db: &C,
        message_ids: &[i64],
    ) -> Result<Vec<Model>, DbErr> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .filter(Column::MessageId.is_in(message_ids.to_vec()))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}
