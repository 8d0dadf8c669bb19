use portal_gateway::modules;
use portal_gateway::proxy;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = {
        let _bootstrap = modules::bootstrap_logger();
        modules::load_app_config()?
    };
    modules::init_logger(&config.logging);

    let proxy_config = config.proxy;
    let bind_address = match std::env::var("PORTAL_GATEWAY_BIND") {
        Ok(addr) => addr,
        Err(_) => proxy_config.get_bind_address().to_string(),
    };
    let port = proxy_config.port;

    let state = proxy::AppState::new(proxy_config)?;
    let (server, handle) = proxy::AxumServer::start(bind_address.clone(), port, state)
        .await
        .map_err(|e| anyhow::anyhow!("failed to start gateway: {}", e))?;

    tracing::info!("portal-gateway listening on http://{}:{}", bind_address, port);

    tokio::signal::ctrl_c().await?;

    tracing::info!("shutdown requested, stopping server...");
    server.stop();
    let _ = handle.await;

    Ok(())
}
