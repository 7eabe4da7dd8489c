//! Help screens for the REPL.

use std::fmt::Write;

struct Category {
    title: &'static str,
    commands: &'static [(&'static str, &'static str)],
}

const CATEGORIES: &[Category] = &[
    Category {
        title: "Session Management",
        commands: &[
            ("newterm", "Start a new terminal session"),
            ("sessions", "List all existing sessions"),
            ("switch <id>", "Switch to another session"),
            ("history", "Show command history for the current session"),
            ("stats", "Show statistics across all sessions"),
        ],
    },
    Category {
        title: "File Operations",
        commands: &[
            ("pwd", "Print current working directory"),
            ("ls [path]", "List directory contents"),
            ("cd <dir>", "Change directory"),
            ("mkdir [dir]", "Create directory"),
            ("touch [file]", "Create empty file"),
            ("rm <file/folder>", "Remove file or directory"),
            ("cp [src] [dest]", "Copy file or directory"),
            ("mv [src] [dest]", "Move or rename file or directory"),
            ("cat <file>", "Display file contents"),
            ("edit <file>", "Edit file content"),
            ("find [path] <pattern>", "Find files by name pattern"),
            ("grep <pattern> <file>", "Search for pattern in file"),
        ],
    },
    Category {
        title: "System Information",
        commands: &[
            ("ps", "Show running processes"),
            ("cpu", "Show CPU usage"),
            ("mem", "Show memory usage"),
            ("df", "Show disk usage"),
            ("date", "Show current date and time"),
            ("whoami", "Show current user"),
            ("uname", "Show system information"),
        ],
    },
    Category {
        title: "AI & Chat",
        commands: &[
            ("chat", "Toggle conversation mode"),
            ("clear", "Clear the terminal screen"),
            ("echo <text>", "Print text to terminal"),
        ],
    },
    Category {
        title: "Control",
        commands: &[
            ("help", "Show this help message"),
            ("help <command>", "Get detailed help for a specific command"),
            ("exit", "Exit the terminal"),
        ],
    },
];

pub const NATURAL_LANGUAGE_EXAMPLES: &[&str] = &[
    "create a new folder called test",
    "create a new file called main.py",
    "move file file1.txt to test",
    "copy file config.txt to backup.txt",
    "show me the current directory",
    "list all files in current folder",
    "show running processes",
    "what is the CPU usage?",
    "show memory usage",
    "search for hello in main.py",
    "what time is it?",
    "how much disk space do I have?",
];

fn examples(command: &str) -> &'static [&'static str] {
    match command {
        "mkdir" => &["mkdir test", "mkdir projects/myapp", "mkdir"],
        "touch" => &["touch file.txt", "touch src/main.rs", "touch"],
        "rm" => &["rm file.txt", "rm old_folder"],
        "cp" => &["cp file.txt backup.txt", "cp folder backup_folder", "cp file.txt folder"],
        "mv" => &["mv old.txt new.txt", "mv file.txt folder"],
        "cat" => &["cat file.txt", "cat README.md"],
        "edit" => &["edit config.txt", "edit main.py"],
        "find" => &["find . .py", "find src config", "find notes"],
        "grep" => &["grep error log.txt", "grep TODO main.rs"],
        "ls" => &["ls", "ls src", "ls .."],
        "cd" => &["cd /home", "cd ..", "cd projects/myapp"],
        "switch" => &["switch session_2"],
        "chat" => &["chat", "talk"],
        _ => &[],
    }
}

/// Full help screen: every category plus natural-language examples.
pub fn general() -> String {
    let mut out = String::from(
        "termpilot: multi-session terminal with natural language support\n\
         Type commands or plain English. 'help <command>' shows details for one command.\n",
    );

    let width = CATEGORIES
        .iter()
        .flat_map(|c| c.commands.iter())
        .map(|(usage, _)| usage.len())
        .max()
        .unwrap_or(0);

    for category in CATEGORIES {
        let _ = writeln!(out, "\n{}:", category.title);
        for (usage, description) in category.commands {
            let _ = writeln!(out, "  {usage:<width$}  {description}");
        }
    }

    out.push_str("\nNatural language examples:\n");
    for example in NATURAL_LANGUAGE_EXAMPLES {
        let _ = writeln!(out, "  • {example}");
    }
    out.push_str("Without a model, a built-in pattern table interprets requests like these.");
    out
}

/// Detail for one command, matched on its first word.
pub fn command(name: &str) -> Option<String> {
    let name = name.to_lowercase();
    let (usage, description) = CATEGORIES
        .iter()
        .flat_map(|c| c.commands.iter())
        .find(|(usage, _)| usage.split_whitespace().next() == Some(name.as_str()))?;

    let mut out = format!("{usage}\n  {description}");
    let examples = examples(&name);
    if !examples.is_empty() {
        out.push_str("\n\nExamples:");
        for example in examples {
            let _ = write!(out, "\n  {example}");
        }
    }
    Some(out)
}
