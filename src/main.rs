use metacache::Model;
use metacache::config::CONFIG;
use metacache::utils::logging::{init_tracing, with_pretty_json_debug};
use mimalloc::MiMalloc;
use tracing::{debug, info};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = &CONFIG;
    init_tracing(&cfg.basic.loglevel);

    let project = std::env::args().nth(1).unwrap_or_else(|| "default".to_string());

    info!(
        database_url = %cfg.basic.database_url,
        loglevel = %cfg.basic.loglevel,
        expansion = %cfg.cache.expansion,
        project = %project
    );

    let pool = metacache::db::connect(&cfg.basic.database_url, cfg.cache.busy_timeout()).await?;
    let mut model = Model::from_pool(pool);

    let instances = model.instances_full(&project).await?;
    with_pretty_json_debug(&instances, |json| debug!("instances:\n{json}"));

    let expanded = model.expand(cfg.cache.expansion, &project).await?;
    println!("{}", serde_json::to_string_pretty(&expanded)?);

    info!(instances = instances.len(), "done");
    Ok(())
}
