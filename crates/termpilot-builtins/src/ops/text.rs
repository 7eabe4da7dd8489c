use crate::builtin::{Builtin, BuiltinDescriptor};
use async_trait::async_trait;
use termpilot_core::{CommandResult, ExecContext};

/// ANSI erase-display plus cursor-home.
pub const CLEAR_SEQUENCE: &str = "\x1b[2J\x1b[H";

pub struct ClearCommand {
    descriptor: BuiltinDescriptor,
}

impl ClearCommand {
    pub fn new() -> Self {
        Self {
            descriptor: BuiltinDescriptor::new("clear", "clear", "Clear screen"),
        }
    }
}

impl Default for ClearCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Builtin for ClearCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _args: &[String], _ctx: &mut ExecContext) -> CommandResult {
        Ok(CLEAR_SEQUENCE.to_string())
    }
}

pub struct EchoCommand {
    descriptor: BuiltinDescriptor,
}

impl EchoCommand {
    pub fn new() -> Self {
        Self {
            descriptor: BuiltinDescriptor::new("echo", "echo [text]", "Print text"),
        }
    }
}

impl Default for EchoCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Builtin for EchoCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: &[String], _ctx: &mut ExecContext) -> CommandResult {
        Ok(args.join(" "))
    }
}

pub struct DateCommand {
    descriptor: BuiltinDescriptor,
}

impl DateCommand {
    pub fn new() -> Self {
        Self {
            descriptor: BuiltinDescriptor::new("date", "date", "Show date and time"),
        }
    }
}

impl Default for DateCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Builtin for DateCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _args: &[String], _ctx: &mut ExecContext) -> CommandResult {
        Ok(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_joins() {
        let mut ctx = ExecContext::new("s1", "/");
        let out = EchoCommand::new()
            .execute(&["hello".to_string(), "world".to_string()], &mut ctx)
            .await
            .unwrap();
        assert_eq!(out, "hello world");
        assert_eq!(EchoCommand::new().execute(&[], &mut ctx).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_date_format() {
        let mut ctx = ExecContext::new("s1", "/");
        let out = DateCommand::new().execute(&[], &mut ctx).await.unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(&out, "%Y-%m-%d %H:%M:%S").is_ok());
    }

    #[tokio::test]
    async fn test_clear_sequence() {
        let mut ctx = ExecContext::new("s1", "/");
        let out = ClearCommand::new().execute(&[], &mut ctx).await.unwrap();
        assert_eq!(out, CLEAR_SEQUENCE);
    }
}
