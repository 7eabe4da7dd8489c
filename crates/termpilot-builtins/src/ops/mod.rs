/// `edit`.
pub mod edit;
/// `mkdir`, `touch`, `rm`, `cp`, `mv`.
pub mod fs;
/// `pwd`, `ls`, `cd`.
pub mod nav;
/// `cat`, `find`, `grep`.
pub mod read;
/// `whoami`, `uname`, `df`, `ps`, `cpu`, `mem`.
pub mod system;
/// `clear`, `echo`, `date`.
pub mod text;

use crate::builtin::BuiltinDescriptor;
use termpilot_core::CommandError;

fn usage(descriptor: &BuiltinDescriptor) -> CommandError {
    CommandError::Usage(descriptor.usage.clone())
}

/// Runs blocking filesystem or sysinfo work off the async runtime.
async fn blocking<T, F>(work: F) -> Result<T, CommandError>
where
    F: FnOnce() -> Result<T, CommandError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CommandError::Io(format!("background task failed: {e}")))?
}
