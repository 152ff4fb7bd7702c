use std::path::PathBuf;

// Standalone entry point for `cargo run -p web-server`. The config path can be
// overridden with RECIPE_CONFIG.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::var_os("RECIPE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let config = configuration::load_config(&path)?;
    let _guard = configuration::init_tracing(&config.logging)?;

    web_server::run_server(&config).await
}
