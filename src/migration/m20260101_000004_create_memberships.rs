use sea_orm_migration::prelude::*;

use super::m20260101_000001_create_users::Users;
use super::m20260101_000003_create_recipes::Recipes;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (table, index) in [
            (Membership::Favorites, "uq_favorites_user_recipe"),
            (Membership::ShoppingCart, "uq_shopping_cart_user_recipe"),
        ] {
            manager
                .create_table(
                    Table::create()
                        .table(table)
                        .if_not_exists()
                        .col(ColumnDef::new(Membership::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Membership::UserId).uuid().null())
                        .col(ColumnDef::new(Membership::RecipeId).uuid().null())
                        .col(
                            ColumnDef::new(Membership::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .from(table, Membership::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .from(table, Membership::RecipeId)
                                .to(Recipes::Table, Recipes::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(index)
                        .table(table)
                        .col(Membership::UserId)
                        .col(Membership::RecipeId)
                        .unique()
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(Follows::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Follows::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Follows::UserId).uuid().null())
                    .col(ColumnDef::new(Follows::FollowingId).uuid().null())
                    .col(
                        ColumnDef::new(Follows::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(Follows::UserId).ne(Expr::col(Follows::FollowingId)))
                    .foreign_key(
                        ForeignKey::create()
                            .from(Follows::Table, Follows::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Follows::Table, Follows::FollowingId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_follows_user_following")
                    .table(Follows::Table)
                    .col(Follows::UserId)
                    .col(Follows::FollowingId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [Membership::ShoppingCart, Membership::Favorites] {
            manager
                .drop_table(Table::drop().table(table).to_owned())
                .await?;
        }
        manager
            .drop_table(Table::drop().table(Follows::Table).to_owned())
            .await
    }
}

#[derive(Iden, Clone, Copy)]
enum Membership {
    Favorites,
    ShoppingCart,
    Id,
    UserId,
    RecipeId,
    CreatedAt,
}

#[derive(Iden)]
enum Follows {
    Table,
    Id,
    UserId,
    FollowingId,
    CreatedAt,
}
