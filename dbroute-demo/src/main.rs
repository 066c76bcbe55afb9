//! dbroute Demo - Main entry point
//!
//! Usage: `dbroute-demo <routing-key> [sql]` with `DB_ROUTER_*` set, e.g.
//!
//! ```text
//! DB_ROUTER_DB_COUNT=2 DB_ROUTER_TB_COUNT=4 DB_ROUTER_ROUTER_KEY=userId \
//! DB_ROUTER_LIST=db01,db02 DB_ROUTER_DEFAULT=db00 \
//! DB_ROUTER_DB00_URL=mysql://127.0.0.1/db00 DB_ROUTER_DB00_USERNAME=root \
//! DB_ROUTER_DB01_URL=mysql://127.0.0.1/db01 DB_ROUTER_DB01_USERNAME=root \
//! DB_ROUTER_DB02_URL=mysql://127.0.0.1/db02 DB_ROUTER_DB02_USERNAME=root \
//! dbroute-demo 10000
//! ```

use dbroute_core::RouterSettings;
use dbroute_demo::RoutedDao;
use dbroute_router::{CallArg, RoutableEntity};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEMO_STATEMENT_ID: &str = "demo.UserOrderMapper.queryByUserId";
const DEMO_SQL: &str = "select * from user_order where user_id = ?";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let key = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: dbroute-demo <routing-key> [sql]"))?;
    let sql = args.next().unwrap_or_else(|| DEMO_SQL.to_string());

    // Load configuration from environment
    let settings = RouterSettings::from_env()?;
    let dao = RoutedDao::from_settings(&settings)?
        .with_entity(RoutableEntity::split("demo.UserOrderMapper"));

    let statement = dao
        .plan_async(
            None,
            &[CallArg::from(key.as_str())],
            DEMO_STATEMENT_ID,
            &sql,
            |statement| async move { Ok(statement) },
        )
        .await?;

    info!(
        key = %key,
        shard = ?statement.shard,
        data_source = %statement.data_source,
        "Call routed"
    );
    println!("{}\t{}", statement.data_source, statement.sql);

    Ok(())
}
