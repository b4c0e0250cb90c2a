use sea_orm::{
    sea_query::{Table, TableCreateStatement},
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    EntityTrait, Schema, Statement, TransactionTrait,
};
use std::time::Duration;

pub mod order;
pub mod order_item;

/// Open a pooled connection whose connect and acquire waits are bounded by `timeout`.
pub async fn connect(db_url: &str, timeout: Duration) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(db_url.to_owned());
    options
        .connect_timeout(timeout)
        .acquire_timeout(timeout)
        .sqlx_logging(false);
    Database::connect(options).await
}

fn create_statement<E>(db: &DatabaseConnection, entity: E) -> TableCreateStatement
where
    E: EntityTrait,
{
    let schema = Schema::new(db.get_database_backend());
    let mut create_stmt = schema.create_table_from_entity(entity);
    create_stmt.if_not_exists();
    create_stmt
}

async fn drop_table<E>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let mut drop_stmt = Table::drop();
    drop_stmt.if_exists().table(entity);
    db.execute(db.get_database_backend().build(&drop_stmt)).await?;
    Ok(())
}

async fn _schema_setup<E>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let create_stmt = backend.build(&create_statement(db, entity));

    if backend == DatabaseBackend::Postgres {
        // for crdb
        let txn = db.begin().await?;
        let serial_normalization = Statement::from_string(
            DatabaseBackend::Postgres,
            "set local serial_normalization = sql_sequence;".to_owned(),
        );
        txn.execute(serial_normalization).await?;
        txn.execute(create_stmt).await?;
        txn.commit().await?;
    } else {
        // for other db
        db.execute(create_stmt).await?;
    }

    let schema = Schema::new(backend);
    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        db.execute(backend.build(&index)).await?;
    }
    Ok(())
}

/// Create the order tables if they are missing. With `reset` the existing
/// tables are dropped first, items before their orders.
pub async fn schema_setup(db: &DatabaseConnection, reset: bool) -> Result<(), DbErr> {
    if reset {
        drop_table(db, order_item::Entity).await?;
        drop_table(db, order::Entity).await?;
        tracing::warn!("existing order tables dropped");
    }
    _schema_setup(db, order::Entity).await?;
    tracing::info!("orders schema ready");
    _schema_setup(db, order_item::Entity).await?;
    tracing::info!("order_items schema ready");
    Ok(())
}

#[cfg(test)]
pub async fn memory_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    // one connection, otherwise every pooled connection sees its own empty database
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("Failed to open in-memory database");
    schema_setup(&db, false)
        .await
        .expect("Failed to setup schema");
    db
}
