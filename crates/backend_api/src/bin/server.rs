use backend_api::run_server;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Environment overrides with sane defaults
    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);
    let settings_path = env::var("SETTINGS_PATH").ok().map(PathBuf::from);

    let settings = settings_loader::load_settings_or_default(settings_path.as_ref())?;

    println!("Jainam Report API Server");
    println!("========================");
    match &settings_path {
        Some(path) => println!("Settings: {}", path.display()),
        None => println!("Settings: built-in defaults"),
    }
    println!("Allocation sheet: {}", settings.allocation_sheet);
    println!("Row alignment: {:?}", settings.alignment);
    println!("Listening on: {}:{}", host, port);
    println!();

    run_server(Arc::new(settings), &host, port).await?;

    Ok(())
}
