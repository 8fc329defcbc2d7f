use sea_orm::Database;
use sea_orm_migration::prelude::*;

const DEFAULT_DATABASE_URL: &str = "sqlite:./courier.db?mode=rwc";
const USAGE: &str = "usage: migration [up|down|fresh|status] (DATABASE_URL selects the store)";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cmd = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());
    if !matches!(cmd.as_str(), "up" | "down" | "fresh" | "status") {
        eprintln!("{USAGE}");
        std::process::exit(2);
    }

    let db_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let db = Database::connect(&db_url).await?;

    match cmd.as_str() {
        "down" => migration::Migrator::down(&db, Some(1)).await?,
        "fresh" => migration::Migrator::fresh(&db).await?,
        "status" => migration::Migrator::status(&db).await?,
        _ => migration::Migrator::up(&db, None).await?,
    }

    Ok(())
}
