//! Host information commands. Every sysinfo probe runs on the blocking
//! pool since refreshing process and disk tables touches `/proc` and friends.

use super::blocking;
use crate::builtin::{Builtin, BuiltinDescriptor};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::Path;
use sysinfo::{Disks, System, Users};
use termpilot_core::{CommandError, CommandResult, ExecContext};

const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * 1024 * 1024;

fn lossy(s: impl AsRef<OsStr>) -> String {
    s.as_ref().to_string_lossy().into_owned()
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

macro_rules! simple_builtin {
    ($ty:ident, $name:literal, $summary:literal) => {
        pub struct $ty {
            descriptor: BuiltinDescriptor,
        }

        impl $ty {
            pub fn new() -> Self {
                Self {
                    descriptor: BuiltinDescriptor::new($name, $name, $summary),
                }
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

simple_builtin!(WhoamiCommand, "whoami", "Show current user");
simple_builtin!(UnameCommand, "uname", "Show system information");
simple_builtin!(DfCommand, "df", "Show disk usage");
simple_builtin!(PsCommand, "ps", "List running processes");
simple_builtin!(CpuCommand, "cpu", "Show CPU usage");
simple_builtin!(MemCommand, "mem", "Show memory usage");

#[async_trait]
impl Builtin for WhoamiCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _args: &[String], _ctx: &mut ExecContext) -> CommandResult {
        for var in ["USER", "USERNAME", "LOGNAME"] {
            if let Ok(name) = std::env::var(var) {
                if !name.is_empty() {
                    return Ok(name);
                }
            }
        }
        blocking(|| {
            let sys = System::new_all();
            let users = Users::new_with_refreshed_list();
            let pid = sysinfo::get_current_pid().map_err(|e| CommandError::Io(e.to_string()))?;
            sys.process(pid)
                .and_then(|p| p.user_id())
                .and_then(|uid| users.get_user_by_id(uid))
                .map(|u| u.name().to_string())
                .ok_or_else(|| CommandError::Io("unable to determine current user".to_string()))
        })
        .await
    }
}

#[async_trait]
impl Builtin for UnameCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _args: &[String], _ctx: &mut ExecContext) -> CommandResult {
        let os = System::name().unwrap_or_else(|| std::env::consts::OS.to_string());
        let release = System::kernel_version().unwrap_or_else(|| "unknown".to_string());
        Ok(format!("{os} {release} {}", std::env::consts::ARCH))
    }
}

/// Reports the disk whose mount point is the longest prefix of the
/// session's working directory.
#[async_trait]
impl Builtin for DfCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _args: &[String], ctx: &mut ExecContext) -> CommandResult {
        let cwd = ctx.cwd.clone();
        blocking(move || {
            let disks = Disks::new_with_refreshed_list();
            let disk = disks
                .list()
                .iter()
                .filter(|d| cwd.starts_with(d.mount_point()))
                .max_by_key(|d| d.mount_point().components().count())
                .ok_or_else(|| CommandError::Io("no disk found for current directory".to_string()))?;

            let total = disk.total_space();
            let free = disk.available_space();
            let used = total.saturating_sub(free);
            Ok(format_df(
                &lossy(disk.name()),
                disk.mount_point(),
                total,
                used,
                free,
            ))
        })
        .await
    }
}

fn format_df(name: &str, mount: &Path, total: u64, used: u64, free: u64) -> String {
    format!(
        "Filesystem      Size  Used  Avail  Use%  Mounted on\n{:<15} {:3}G  {:3}G  {:4}G  {:4.1}%  {}",
        name,
        total / GB,
        used / GB,
        free / GB,
        percent(used, total),
        mount.display()
    )
}

#[async_trait]
impl Builtin for PsCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _args: &[String], _ctx: &mut ExecContext) -> CommandResult {
        blocking(|| {
            let sys = System::new_all();
            let users = Users::new_with_refreshed_list();

            let mut rows: Vec<(u32, String, String)> = sys
                .processes()
                .iter()
                .map(|(pid, process)| {
                    let user = process
                        .user_id()
                        .and_then(|uid| users.get_user_by_id(uid))
                        .map(|u| u.name().to_string())
                        .unwrap_or_else(|| "?".to_string());
                    (pid.as_u32(), lossy(process.name()), user)
                })
                .collect();
            rows.sort_by_key(|(pid, _, _)| *pid);

            if rows.is_empty() {
                return Ok("No processes found".to_string());
            }
            let mut out = format!("{:>6} {:<20} {}", "PID", "Name", "User");
            for (pid, name, user) in rows {
                out.push_str(&format!("\n{pid:>6} {name:<20} {user}"));
            }
            Ok(out)
        })
        .await
    }
}

#[async_trait]
impl Builtin for CpuCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _args: &[String], _ctx: &mut ExecContext) -> CommandResult {
        blocking(|| {
            let mut sys = System::new();
            sys.refresh_cpu_usage();
            std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            sys.refresh_cpu_usage();
            Ok(format!("CPU Usage: {:.1}%", sys.global_cpu_usage()))
        })
        .await
    }
}

#[async_trait]
impl Builtin for MemCommand {
    fn descriptor(&self) -> &BuiltinDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _args: &[String], _ctx: &mut ExecContext) -> CommandResult {
        blocking(|| {
            let mut sys = System::new();
            sys.refresh_memory();
            Ok(format_mem(sys.used_memory(), sys.total_memory()))
        })
        .await
    }
}

fn format_mem(used: u64, total: u64) -> String {
    format!(
        "Memory Usage: {:.1}% ({} MB / {} MB)",
        percent(used, total),
        used / MB,
        total / MB
    )
}
