use sea_orm_migration::prelude::*;

use super::m20260101_000001_create_users::Users;
use super::m20260101_000002_create_catalog::{Ingredients, Tags};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Recipes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Recipes::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Recipes::AuthorId).uuid().not_null())
                    .col(ColumnDef::new(Recipes::Name).string_len(200).not_null())
                    .col(ColumnDef::new(Recipes::Image).text().not_null())
                    .col(ColumnDef::new(Recipes::Text).text().not_null())
                    .col(ColumnDef::new(Recipes::CookingTime).integer().not_null())
                    .col(
                        ColumnDef::new(Recipes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(Recipes::CookingTime).gte(1))
                    .foreign_key(
                        ForeignKey::create()
                            .from(Recipes::Table, Recipes::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RecipeTags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RecipeTags::RecipeId).uuid().not_null())
                    .col(ColumnDef::new(RecipeTags::TagId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(RecipeTags::RecipeId)
                            .col(RecipeTags::TagId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(RecipeTags::Table, RecipeTags::RecipeId)
                            .to(Recipes::Table, Recipes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(RecipeTags::Table, RecipeTags::TagId)
                            .to(Tags::Table, Tags::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RecipeIngredients::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RecipeIngredients::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RecipeIngredients::RecipeId).uuid().not_null())
                    .col(
                        ColumnDef::new(RecipeIngredients::IngredientId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RecipeIngredients::Amount).integer().not_null())
                    .check(Expr::col(RecipeIngredients::Amount).gte(1))
                    .foreign_key(
                        ForeignKey::create()
                            .from(RecipeIngredients::Table, RecipeIngredients::RecipeId)
                            .to(Recipes::Table, Recipes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(RecipeIngredients::Table, RecipeIngredients::IngredientId)
                            .to(Ingredients::Table, Ingredients::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_recipe_ingredients_recipe_id")
                    .table(RecipeIngredients::Table)
                    .col(RecipeIngredients::RecipeId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RecipeIngredients::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RecipeTags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Recipes::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Recipes {
    Table,
    Id,
    AuthorId,
    Name,
    Image,
    Text,
    CookingTime,
    CreatedAt,
}

#[derive(Iden)]
enum RecipeTags {
    Table,
    RecipeId,
    TagId,
}

#[derive(Iden)]
enum RecipeIngredients {
    Table,
    Id,
    RecipeId,
    IngredientId,
    Amount,
}
