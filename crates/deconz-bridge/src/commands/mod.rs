//! Command handlers and the context they share.

pub mod authenticate;
pub mod devices;
pub mod discover;
pub mod repair;
pub mod run;
pub mod simulate;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use deconz_config::{Config, FileSettingsStore};
use deconz_core::GatewaySession;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Loaded configuration plus where it came from.
pub struct Context {
    pub config: Config,
    pub path: PathBuf,
}

impl Context {
    pub fn load(global: &GlobalOpts) -> Result<Self, CliError> {
        let path = global
            .config
            .clone()
            .unwrap_or_else(deconz_config::config_path);
        let config = deconz_config::load_config_from(&path)?;
        tracing::debug!(path = %path.display(), devices = config.devices.len(), "config loaded");
        Ok(Self { config, path })
    }

    /// Fail early, naming the file to edit, when the gateway is not set up.
    pub fn require_complete(&self) -> Result<(), CliError> {
        let missing = self.config.to_gateway_config().missing_fields();
        if missing.is_empty() {
            return Ok(());
        }
        Err(CliError::Incomplete {
            missing: missing.join(", "),
            path: self.path.display().to_string(),
        })
    }

    pub fn settings_store(&self) -> FileSettingsStore {
        FileSettingsStore::new(&self.path)
    }

    /// A session over every configured device. Nothing is connected yet.
    pub fn session(&self) -> Result<GatewaySession, CliError> {
        Ok(GatewaySession::new(
            self.config.to_gateway_config(),
            self.config.to_session_options()?,
            Arc::new(self.config.build_registry()),
            Arc::new(self.settings_store()),
        ))
    }
}

/// Route a gateway command to its handler.
pub async fn dispatch(cmd: Command, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Run(args) => run::handle(ctx, &args, global).await,
        Command::Discover => discover::handle(ctx, global).await,
        Command::Authenticate(args) => authenticate::handle(ctx, &args, global).await,
        Command::Sync => sync::handle(ctx, global).await,
        Command::Devices => devices::handle(ctx, global),
        Command::Simulate(args) => simulate::handle(ctx, &args, global),
        Command::Repair => repair::handle(ctx, global).await,
        // Generated in main without loading the config.
        Command::Completions(_) => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write as _;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::cli::OutputFormat;

    fn global_for(path: &std::path::Path) -> GlobalOpts {
        GlobalOpts {
            config: Some(path.to_path_buf()),
            output: OutputFormat::Plain,
            verbose: 0,
            quiet: true,
        }
    }

    #[test]
    fn incomplete_gateway_names_the_loaded_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[gateway]
host = "10.0.0.5"

[[devices]]
kind = "lights"
id = "3"
name = "Desk lamp"
capabilities = ["onoff", "dim"]
"#
        )
        .unwrap();

        let ctx = Context::load(&global_for(file.path())).unwrap();
        assert_eq!(ctx.path, file.path());

        let Err(CliError::Incomplete { missing, path }) = ctx.require_complete() else {
            panic!("expected an incomplete gateway");
        };
        assert!(missing.contains("port"), "{missing}");
        assert!(missing.contains("ws_port"), "{missing}");
        assert_eq!(path, file.path().display().to_string());

        let views = devices::views(&ctx.config.build_registry());
        let keys: Vec<String> = views.iter().map(devices::DeviceView::key).collect();
        assert_eq!(keys, ["lights/3"]);
    }
}
