//! `simulate`: apply a stream message to the configured devices offline.

use deconz_core::Dispatch;

use crate::cli::{GlobalOpts, SimulateArgs};
use crate::error::CliError;
use crate::output;

use super::{Context, devices::DeviceView};

pub fn handle(ctx: &Context, args: &SimulateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let text = match (&args.message, &args.file) {
        (Some(message), _) => message.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => {
            return Err(CliError::Validation {
                field: "message".into(),
                reason: "pass the message text or --file".into(),
            });
        }
    };

    let session = ctx.session()?;
    match session.handle_message(&text) {
        Dispatch::Applied(key) | Dispatch::NoPayload(key) => {
            let Some(device) = session.registry().lookup(key.kind, &key.id) else {
                return Err(CliError::Internal(format!("{key} vanished from the registry")));
            };
            let view = DeviceView::from(device.as_ref());
            output::print_output(
                &output::render_single(&global.output, &view, DeviceView::detail, DeviceView::key),
                global.quiet,
            );
            Ok(())
        }
        Dispatch::UnknownDevice => {
            if !global.quiet {
                eprintln!("No registered device matches this message");
            }
            Ok(())
        }
        Dispatch::Ignored => {
            if !global.quiet {
                eprintln!("Message does not address a light, sensor or group");
            }
            Ok(())
        }
        Dispatch::Invalid => Err(CliError::Validation {
            field: "message".into(),
            reason: "not a gateway stream message".into(),
        }),
    }
}
