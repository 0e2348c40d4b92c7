use anyhow::Result;
use factory_server::AppState;

use super::Ctx;

pub fn run(ctx: Ctx, host: Option<String>, port: Option<u16>, no_open: bool) -> Result<()> {
    let host = host.unwrap_or_else(|| ctx.settings.server.host.clone());
    let port = port.unwrap_or(ctx.settings.server.port);
    let state = AppState::new(ctx.layout.root.clone(), ctx.settings, ctx.identity);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
        tokio::select! {
            res = factory_server::serve_on(state, listener, !no_open) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
