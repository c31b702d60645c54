// MIT License - Copyright (c) 2026 Peter Wright
// Reconnect policy around successive sessions

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::LinkConfig;
use crate::error::{LinkError, SessionError};
use crate::session::SessionController;
use crate::transport::Connector;

/// Run sessions until one ends in a way `config` does not retry.
///
/// Connect failures are retried with [`LinkConfig::reconnect_backoff`] up to
/// `max_reconnect_attempts` times. Handshake and session failures end
/// supervision unless `reconnect_after_session` is set, in which case the
/// failure count starts over. `connector` builds the connector for each new
/// session.
///
/// Returns `Ok(())` once `cancel` fires, otherwise the error that ended the
/// last session (see [`LinkError::exit_code`]).
pub async fn supervise<C, F>(
    config: &LinkConfig,
    cancel: &CancellationToken,
    mut connector: F,
) -> crate::Result<()>
where
    C: Connector,
    F: FnMut() -> C,
{
    let mut connect_failures = 0u32;

    loop {
        let mut session = SessionController::new(config.peer.clone(), connector());

        let err = match session.run(config, cancel).await {
            Ok(()) | Err(LinkError::Session(SessionError::Cancelled)) => return Ok(()),
            Err(e) => e,
        };
        if cancel.is_cancelled() {
            return Ok(());
        }

        let delay = if err.is_retryable() {
            if connect_failures >= config.max_reconnect_attempts {
                error!(
                    "Giving up on {} after {} connect attempts: {}",
                    session.address(),
                    connect_failures + 1,
                    err
                );
                return Err(err);
            }
            connect_failures += 1;
            config.reconnect_backoff(connect_failures)
        } else if config.reconnect_after_session {
            connect_failures = 0;
            config.reconnect_backoff(1)
        } else {
            error!("Session with {} ended: {}", session.address(), err);
            return Err(err);
        };

        warn!(
            "{} - starting a new session in {:.1}s",
            err,
            delay.as_secs_f64()
        );
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Cancelled while waiting to reconnect");
                return Ok(());
            }
            _ = sleep(delay) => {}
        }
    }
}
