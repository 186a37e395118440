//! Command filtering: blocklist, safelist, and file-modification detection.
//!
//! Grounded on `safe_shell.py`'s `CommandPolicy`.

use std::collections::HashSet;

use regex::Regex;

const BLOCKED_COMMANDS: &[&str] = &[
    "rm -rf /",
    "rm -rf /*",
    "mkfs",
    "dd if=/dev/zero",
    ":(){ :|:& };:",
    "> /dev/sda",
    "chmod -R 777 /",
    "chown -R",
];

const BLOCKED_PATTERNS: &[&str] = &[
    r"rm\s+-rf\s+/[^/]",
    r">\s*/dev/",
    r"mkfs\.",
    r"dd\s+if=.*/dev/",
    r"curl.*\|\s*(ba)?sh",
    r"wget.*\|\s*(ba)?sh",
    r"chmod\s+-R\s+777\s+/",
    r"sudo\s+rm",
    r"sudo\s+dd",
];

const SAFE_COMMANDS: &[&str] = &[
    "ls", "pwd", "whoami", "date", "echo", "cat", "head", "tail", "grep", "find", "which", "type",
    "env", "printenv", "python --version", "pip --version", "node --version", "git status",
    "git log", "git diff", "git branch",
];

const FILE_MODIFYING_PATTERNS: &[&str] = &[
    r"(^|\s)(cp|mv|rm|mkdir|rmdir|touch|chmod|chown)\s",
    r">\s*\S",
    r">>\s*\S",
    r"(^|\s)(sed|awk)\s+-i",
    r"(^|\s)tee\s",
    r"(^|\s)(pip|npm|yarn|poetry)\s+(install|uninstall)",
];

const NETWORK_COMMANDS: &[&str] = &["curl", "wget", "ssh", "scp", "rsync", "nc", "netcat"];

pub struct CommandPolicy {
    blocked_commands: HashSet<String>,
    safe_commands: HashSet<String>,
    blocked_patterns: Vec<Regex>,
    file_modifying_patterns: Vec<Regex>,
    allow_sudo: bool,
    allow_network: bool,
}

impl CommandPolicy {
    pub fn new(allow_sudo: bool, allow_network: bool) -> Self {
        CommandPolicy {
            blocked_commands: BLOCKED_COMMANDS.iter().map(|s| s.to_lowercase()).collect(),
            safe_commands: SAFE_COMMANDS.iter().map(|s| s.to_string()).collect(),
            blocked_patterns: BLOCKED_PATTERNS.iter().map(|p| Regex::new(p).unwrap()).collect(),
            file_modifying_patterns: FILE_MODIFYING_PATTERNS
                .iter()
                .map(|p| Regex::new(p).unwrap())
                .collect(),
            allow_sudo,
            allow_network,
        }
    }

    pub fn with_additional_blocked(mut self, extra: impl IntoIterator<Item = String>) -> Self {
        self.blocked_commands.extend(extra.into_iter().map(|s| s.to_lowercase()));
        self
    }

    pub fn with_additional_safe(mut self, extra: impl IntoIterator<Item = String>) -> Self {
        self.safe_commands.extend(extra);
        self
    }

    /// Returns the blocking reason, if any.
    pub fn is_blocked(&self, command: &str) -> Option<String> {
        let cmd_lower = command.to_lowercase();
        let cmd_lower = cmd_lower.trim();

        for blocked in &self.blocked_commands {
            if cmd_lower.contains(blocked.as_str()) {
                return Some(format!("blocked command pattern: {blocked}"));
            }
        }

        for pattern in &self.blocked_patterns {
            if pattern.is_match(cmd_lower) {
                return Some(format!("matches blocked pattern: {}", pattern.as_str()));
            }
        }

        if !self.allow_sudo && Regex::new(r"(^|\s)sudo\s").unwrap().is_match(cmd_lower) {
            return Some("sudo not allowed".to_string());
        }

        if !self.allow_network {
            for nc in NETWORK_COMMANDS {
                if Regex::new(&format!(r"(^|\s){nc}\s")).unwrap().is_match(cmd_lower) {
                    return Some(format!("network command not allowed: {nc}"));
                }
            }
        }

        None
    }

    pub fn is_safe(&self, command: &str) -> bool {
        let trimmed = command.trim();
        if self.safe_commands.contains(trimmed) {
            return true;
        }
        self.safe_commands.iter().any(|safe| trimmed.starts_with(safe.as_str()))
    }

    pub fn modifies_files(&self, command: &str) -> bool {
        self.file_modifying_patterns.iter().any(|p| p.is_match(command))
    }
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self::new(false, true)
    }
}
