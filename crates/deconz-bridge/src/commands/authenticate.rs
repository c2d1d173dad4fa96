//! `authenticate`: obtain an API key and save the gateway settings.

use deconz_core::{SetupOutcome, setup};

use crate::cli::{AuthenticateArgs, GlobalOpts};
use crate::error::CliError;

use super::Context;

pub async fn handle(
    ctx: &Context,
    args: &AuthenticateArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let options = ctx.config.to_session_options()?;
    let mut store = ctx.settings_store();
    if args.keyring {
        store = store.with_keyring();
    }

    let outcome = match &args.host {
        Some(host) => setup::authenticate(&options, &store, host, args.port).await?,
        None => setup::discover_and_register(&options, &store).await?,
    };

    match outcome {
        SetupOutcome::Configured(config) => {
            if !global.quiet {
                eprintln!(
                    "Authenticated with {}:{} (stream port {}); saved to {}",
                    config.host.as_deref().unwrap_or_default(),
                    config.port.unwrap_or_default(),
                    config.ws_port.unwrap_or_default(),
                    store.path().display()
                );
            }
            Ok(())
        }
        SetupOutcome::LinkButtonRequired {
            host,
            port,
            message,
        } => {
            tracing::info!(%host, port, "gateway locked");
            Err(CliError::LinkButtonRequired {
                message: message.to_owned(),
            })
        }
    }
}
