use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::ledger::Ledger;
use crate::{server, Config, Mode, Result};
use std::net::SocketAddr;
use tracing::warn;

/// Serves the ledger over HTTP until Ctrl-C.
pub async fn serve(config: Config, mode: Mode, addr: SocketAddr) -> Result<Out<()>> {
    let ledger = Ledger::open(&config, mode).await?;
    if !ledger.synchronizer().has_remote() {
        warn!("No GitHub token is configured, every change will be saved locally only");
    }
    server::serve(ledger, addr)
        .await
        .pub_result(ErrorType::Internal)?;
    Ok("The HTTP server has stopped".into())
}
