//! Install (or refresh) the default achievement catalog.
//!
//! Reads `WELLNESS_DATABASE_URL` like every other entry point; safe to run
//! repeatedly since entries are upserted by title.

use wellness_log::catalog::seed_default_catalog;

#[tokio::main]
async fn main() {
  if let Err(e) = run().await {
    tracing::error!("seed-catalog failed: {}", e);
    eprintln!("seed-catalog failed: {}", e);
    std::process::exit(1);
  }
}

async fn run() -> wellness_log::error::EngineResult<()> {
  let engine = wellness_log::bootstrap().await?;

  let seeded = seed_default_catalog(&engine.achievements).await?;
  for achievement in &seeded {
    tracing::info!(id = achievement.id, points = achievement.points, "{}", achievement.title);
  }
  tracing::info!("Seeded {} achievements", seeded.len());

  engine.store.pool().close().await;
  Ok(())
}
