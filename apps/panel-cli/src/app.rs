//! Application orchestrator: connects the session and drives the indicator.

use anyhow::{Context, bail};
use tokio::sync::watch;

use kady_gateway_client::{ConnectionSession, Credentials, SessionState};

use crate::config::{PanelConfig, SECRET_ENV};
use crate::indicator::ConnectionIndicator;

/// Runs the panel until the connection ends or shutdown is requested.
pub async fn run(config: PanelConfig) -> anyhow::Result<()> {
    if !Credentials::is_well_formed_identifier(&config.identifier) {
        bail!(
            "identifier {:?} must be ASCII letters only",
            config.identifier
        );
    }
    let secret = std::env::var(SECRET_ENV).with_context(|| format!("{SECRET_ENV} is not set"))?;
    let credentials = Credentials::new(config.identifier.clone(), secret);

    let session = ConnectionSession::new(config.session_config());
    let indicator = ConnectionIndicator::attach(session.bus())?;
    let mut state = session.watch_state();

    session
        .connect(credentials, &config.host)
        .await
        .with_context(|| format!("connecting to {}", config.host))?;
    tracing::info!("credentials sent, waiting for the gateway");

    let lost = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
            false
        }
        lost = wait_refused(&mut state) => lost,
    };

    let status = indicator.snapshot();
    drop(indicator);
    session.close().await;

    if lost {
        bail!("gateway connection ended: {}", status.status);
    }
    tracing::info!(%status, "final status");
    Ok(())
}

/// Resolves once the session reaches `Refused`; `false` if the session went away.
async fn wait_refused(state: &mut watch::Receiver<SessionState>) -> bool {
    state
        .wait_for(|s| *s == SessionState::Refused)
        .await
        .is_ok()
}
