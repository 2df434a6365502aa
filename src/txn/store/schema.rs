//! PostgreSQL schema for the transaction stores

use sqlx::PgPool;

const CREATE_USER_BALANCES: &str = r#"
CREATE TABLE IF NOT EXISTS user_balances_tb (
    username        TEXT PRIMARY KEY,
    current_balance NUMERIC(30, 10) NOT NULL DEFAULT 0,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_BALANCE_TRANSACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS balance_transactions_tb (
    transaction_id   UUID PRIMARY KEY,
    username         TEXT NOT NULL,
    transaction_type SMALLINT NOT NULL,
    amount           NUMERIC(30, 10) NOT NULL,
    description      TEXT NOT NULL DEFAULT '',
    status           SMALLINT NOT NULL,
    reference_id     UUID,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_BALANCE_TRANSACTIONS_IDX: &str = r#"
CREATE INDEX IF NOT EXISTS balance_transactions_username_idx
    ON balance_transactions_tb (username, created_at)
"#;

const CREATE_ORDERS: &str = r#"
CREATE TABLE IF NOT EXISTS orders_tb (
    order_id     UUID PRIMARY KEY,
    username     TEXT NOT NULL,
    order_type   SMALLINT NOT NULL,
    asset_id     TEXT NOT NULL,
    quantity     NUMERIC(30, 10) NOT NULL,
    price        NUMERIC(30, 10) NOT NULL,
    total_amount NUMERIC(30, 10) NOT NULL,
    status       SMALLINT NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_ORDERS_IDX: &str = r#"
CREATE INDEX IF NOT EXISTS orders_username_idx
    ON orders_tb (username, created_at)
"#;

const CREATE_ASSET_BALANCES: &str = r#"
CREATE TABLE IF NOT EXISTS asset_balances_tb (
    username   TEXT NOT NULL,
    asset_id   TEXT NOT NULL,
    quantity   NUMERIC(30, 10) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (username, asset_id)
)
"#;

const CREATE_ASSET_TRANSACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS asset_transactions_tb (
    transaction_id   UUID PRIMARY KEY,
    username         TEXT NOT NULL,
    asset_id         TEXT NOT NULL,
    transaction_type SMALLINT NOT NULL,
    quantity         NUMERIC(30, 10) NOT NULL,
    price            NUMERIC(30, 10) NOT NULL,
    total_amount     NUMERIC(30, 10) NOT NULL,
    order_id         UUID,
    status           SMALLINT NOT NULL,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_ASSET_TRANSACTIONS_IDX: &str = r#"
CREATE INDEX IF NOT EXISTS asset_transactions_username_idx
    ON asset_transactions_tb (username, created_at)
"#;

/// Create all tables and indexes if they do not exist
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Ensuring transaction store schema");

    for ddl in [
        CREATE_USER_BALANCES,
        CREATE_BALANCE_TRANSACTIONS,
        CREATE_BALANCE_TRANSACTIONS_IDX,
        CREATE_ORDERS,
        CREATE_ORDERS_IDX,
        CREATE_ASSET_BALANCES,
        CREATE_ASSET_TRANSACTIONS,
        CREATE_ASSET_TRANSACTIONS_IDX,
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    Ok(())
}
