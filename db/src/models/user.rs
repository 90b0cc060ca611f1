use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Represents a user in the `users` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Primary key ID (auto-incremented).
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// Securely hashed password string. Never serialized out.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Role deciding what the user may do. Immutable except through
    /// `set_role` (admin action).
    pub role: Role,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    /// Opaque push-subscription payload, stored as JSON text.
    #[serde(skip_serializing)]
    pub push_subscription: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "user_role")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    #[sea_orm(string_value = "user")]
    User,

    #[sea_orm(string_value = "moderator")]
    Moderator,

    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Role {
    /// Moderators and admins act on other users' tickets.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tickets::Entity")]
    Tickets,
}

impl Related<super::tickets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tickets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        username: &str,
        password: &str,
        role: Role,
        full_name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Model, DbErr> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| DbErr::Custom(format!("Failed to hash password: {e}")))?
            .to_string();

        let active = ActiveModel {
            username: Set(username.to_owned()),
            password_hash: Set(password_hash),
            role: Set(role),
            full_name: Set(full_name.map(str::to_owned)),
            phone: Set(phone.map(str::to_owned)),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        active.insert(db).await
    }

    pub async fn find_by_username<C: ConnectionTrait>(
        db: &C,
        username: &str,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::Username.eq(username))
            .one(db)
            .await
    }

    /// Constant-ish time password check against the stored argon2 hash.
    pub fn verify_password(&self, password: &str) -> bool {
        PasswordHash::new(&self.password_hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }

    pub async fn set_push_subscription<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        subscription_json: &str,
    ) -> Result<(), DbErr> {
        let user = Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound("User not found".to_string()))?;

        let mut active: ActiveModel = user.into();
        active.push_subscription = Set(Some(subscription_json.to_owned()));
        active.update(db).await?;
        Ok(())
    }

    /// Drops a subscription the push endpoint reported as gone.
    pub async fn clear_push_subscription<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
    ) -> Result<(), DbErr> {
        let Some(user) = Entity::find_by_id(user_id).one(db).await? else {
            return Ok(());
        };
        let mut active: ActiveModel = user.into();
        active.push_subscription = Set(None);
        active.update(db).await?;
        Ok(())
    }

    /// All staff members that currently hold a push subscription.
    pub async fn staff_with_subscriptions<C: ConnectionTrait>(
        db: &C,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::Role.is_in([Role::Moderator, Role::Admin]))
            .filter(Column::PushSubscription.is_not_null())
            .all(db)
            .await
    }

    pub async fn find_moderators<C: ConnectionTrait>(db: &C) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::Role.eq(Role::Moderator))
            .order_by_asc(Column::Username)
            .all(db)
            .await
    }

    /// Only an admin may change another user's role; the route layer enforces
    /// that, this just persists it.
    pub async fn set_role<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        role: Role,
    ) -> Result<Model, DbErr> {
        let user = Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound("User not found".to_string()))?;

        let mut active: ActiveModel = user.into();
        active.role = Set(role);
        active.update(db).await
    }

    pub async fn update_contact_info<C: ConnectionTrait>(
        db: &C,
        user_id: i64,
        full_name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Model, DbErr> {
        let user = Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound("User not found".to_string()))?;

        let mut active: ActiveModel = user.into();
        active.full_name = Set(full_name.map(str::to_owned));
        active.phone = Set(phone.map(str::to_owned));
        active.update(db).await
    }
}
