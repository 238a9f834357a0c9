use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Sellers::Table)
          .if_not_exists()
          .col(ColumnDef::new(Sellers::Id).string().not_null().primary_key())
          .col(ColumnDef::new(Sellers::Username).string().not_null())
          .col(ColumnDef::new(Sellers::Email).string().not_null())
          .col(ColumnDef::new(Sellers::InviteKey).string().not_null())
          .col(
            ColumnDef::new(Sellers::Verified).boolean().not_null().default(false),
          )
          .col(ColumnDef::new(Sellers::Banned).boolean().not_null().default(false))
          .col(ColumnDef::new(Sellers::Balance).double().not_null().default(0.0))
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_sellers_username")
          .table(Sellers::Table)
          .col(Sellers::Username)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Sellers::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Sellers {
  Table,
  Id,
  Username,
  Email,
  InviteKey,
  Verified,
  Banned,
  Balance,
}
