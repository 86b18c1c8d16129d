use serde_json::Value;

use crate::collection::PresentableCollection;
use crate::options::PresentOptions;

/// Result of routing a command through the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A controller consumed the command.
    Handled,

    /// No controller consumed it, or an exclusive entry blocked propagation.
    Unhandled,
}

impl CommandOutcome {
    pub fn is_handled(self) -> bool {
        matches!(self, CommandOutcome::Handled)
    }
}

/// Walk the stack top-down. The first command-receptive controller that
/// accepts the command wins. A non-handling entry with `EXCLUSIVE` set stops
/// the scan: entries below it are never queried.
pub(crate) fn route(
    collection: &mut PresentableCollection,
    name: &str,
    args: &Value,
) -> CommandOutcome {
    for index in (0..collection.len()).rev() {
        let Some(entry) = collection.at_mut(index) else {
            continue;
        };
        if !entry.is_command_receptive() {
            continue;
        }

        let exclusive = entry.options().contains(PresentOptions::EXCLUSIVE);
        let ctx = entry.context();
        let handled = entry
            .controller_mut()
            .map(|controller| controller.handle_command(&ctx, name, args))
            .unwrap_or(false);

        if handled {
            log::debug!("command '{}' handled by entry #{}", name, ctx.id());
            return CommandOutcome::Handled;
        }
        if exclusive {
            log::debug!("command '{}' blocked by exclusive entry #{}", name, ctx.id());
            return CommandOutcome::Unhandled;
        }
    }
    CommandOutcome::Unhandled
}
