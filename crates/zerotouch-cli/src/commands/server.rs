//! `zerotouch server` - Start the ZeroTouch HTTP server.

use zerotouch_core::AppConfig;

pub async fn run(
    host: String,
    port: u16,
    static_dir: Option<String>,
    app_config: AppConfig,
) -> Result<(), String> {
    let config = zerotouch_server::ServerConfig {
        host: host.clone(),
        port,
        static_dir,
    };

    println!("Starting ZeroTouch server on {}:{}...", host, port);

    let addr = zerotouch_server::start_server(config, app_config).await?;
    println!("ZeroTouch server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}
