use sea_orm_migration::prelude::*;

mod m20260101_000001_create_users;
mod m20260101_000002_create_catalog;
mod m20260101_000003_create_recipes;
mod m20260101_000004_create_memberships;
mod m20260101_000005_create_audit_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_users::Migration),
            Box::new(m20260101_000002_create_catalog::Migration),
            Box::new(m20260101_000003_create_recipes::Migration),
            Box::new(m20260101_000004_create_memberships::Migration),
            Box::new(m20260101_000005_create_audit_logs::Migration),
        ]
    }
}
