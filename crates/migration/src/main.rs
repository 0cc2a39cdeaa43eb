use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::prelude::*;

const DEFAULT_URL: &str = "sqlite:./sheets.db?mode=rwc";

async fn run(db: &DatabaseConnection, cmd: &str) -> Result<(), DbErr> {
    match cmd {
        "up" => migration::Migrator::up(db, None).await,
        "down" => migration::Migrator::down(db, None).await,
        "fresh" => migration::Migrator::fresh(db).await,
        "status" => migration::Migrator::status(db).await,
        other => {
            eprintln!("unknown command: {other}");
            eprintln!("Usage: cargo run -p migration -- [up|down|fresh|status]");
            std::process::exit(2);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cmd = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());
    let db_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());

    let db = Database::connect(&db_url).await?;
    run(&db, &cmd).await?;

    Ok(())
}
