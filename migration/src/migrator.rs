use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202608300001_create_users::Migration),
            Box::new(migrations::m202608300002_create_tickets::Migration),
            Box::new(migrations::m202608300003_create_messages::Migration),
            Box::new(migrations::m202608300004_create_message_attachments::Migration),
            Box::new(migrations::m202608300005_create_status_history::Migration),
        ]
    }
}
