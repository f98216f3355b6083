//! The ordered rule table used by the intent classifier.
//!
//! Rules are tested top to bottom and the first match wins, so specific or
//! destructive intents are listed ahead of the general listing rules.

use regex::Regex;
use rllm_types::RiskLevel;
use std::ops::Range;
use std::sync::LazyLock;

/// Words that can land in a capture group but never name a real target.
const STOPWORDS: &[&str] = &[
    "a", "all", "an", "and", "app", "application", "at", "current", "directory", "dir", "every",
    "file", "files", "folder", "for", "from", "here", "in", "into", "it", "me", "my", "of", "on",
    "process", "processes", "program", "some", "that", "the", "these", "this", "those", "to",
    "with",
];

/// Predicate half of a rule.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Each group must be satisfied by at least one word of the input.
    Keywords(&'static [&'static [&'static str]]),
    /// Regex over the normalized input; capture group 1 is the optional target.
    Pattern(Regex),
}

/// Result of a successful predicate test.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuleCapture {
    /// Byte range of the captured target inside the normalized input.
    pub target: Option<Range<usize>>,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: &'static str,
    pub matcher: Matcher,
    /// Command template; `{target}` is replaced by the captured or default target.
    pub command: &'static str,
    /// Used when the template needs a target and none could be extracted.
    pub default_target: Option<&'static str>,
    pub risk_level: RiskLevel,
    /// Explanation template; `{input}` is the original request, `{target}` as above.
    pub explanation: &'static str,
    pub alternatives: &'static [&'static str],
    pub warnings: &'static [&'static str],
    pub confidence: f64,
}

impl Rule {
    /// Test the rule against `normalized` text, already split into `words`.
    pub fn matches(&self, normalized: &str, words: &[&str]) -> Option<RuleCapture> {
        match &self.matcher {
            Matcher::Keywords(groups) => {
                let hit = groups
                    .iter()
                    .all(|group| group.iter().any(|kw| words.iter().any(|w| word_matches(w, kw))));
                hit.then(RuleCapture::default)
            }
            Matcher::Pattern(regex) => {
                let caps = regex.captures(normalized)?;
                let target = caps
                    .get(1)
                    .filter(|m| !is_stopword(m.as_str()))
                    .map(|m| m.range());
                Some(RuleCapture { target })
            }
        }
    }

    pub fn needs_target(&self) -> bool {
        self.command.contains("{target}")
    }
}

/// Accepts the keyword itself and its simple plurals.
fn word_matches(word: &str, keyword: &str) -> bool {
    match word.strip_prefix(keyword) {
        Some(rest) => rest.is_empty() || rest == "s" || rest == "es",
        None => false,
    }
}

fn is_stopword(candidate: &str) -> bool {
    let trimmed = candidate.trim_matches(|c: char| !c.is_alphanumeric());
    trimmed.is_empty() || STOPWORDS.contains(&trimmed)
}

fn pattern(source: &str) -> Matcher {
    Matcher::Pattern(Regex::new(source).unwrap())
}

pub static DEFAULT_RULES: LazyLock<Vec<Rule>> = LazyLock::new(default_rules);

fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "format_disk",
            matcher: Matcher::Keywords(&[
                &["format", "reformat", "wipe", "erase"],
                &["disk", "drive", "partition", "device", "usb", "ssd"],
            ]),
            command: "sudo mkfs.ext4 /dev/sdX",
            default_target: None,
            risk_level: RiskLevel::Critical,
            explanation: "Creates a new ext4 filesystem on a block device, destroying everything stored on it (requested: \"{input}\").",
            alternatives: &["lsblk -f", "sudo fdisk -l"],
            warnings: &[
                "Destructive operation: formatting erases all data on the target device",
                "Replace /dev/sdX with the device verified via lsblk before running",
            ],
            confidence: 0.6,
        },
        Rule {
            name: "remove_directory",
            matcher: pattern(
                r"\b(?:delete|remove|rm)\s+(?:the\s+)?(?:directory|folder|dir)\b(?:\s+(?:named|called))?(?:\s+([\w./~-]+))?",
            ),
            command: "rm -r {target}",
            default_target: Some("target_dir"),
            risk_level: RiskLevel::High,
            explanation: "Recursively deletes the directory {target} and everything inside it (requested: \"{input}\").",
            alternatives: &["rm -ri {target}", "rmdir {target}"],
            warnings: &[
                "Deleted files cannot be recovered",
                "Recursive deletion removes every file below the directory",
            ],
            confidence: 0.85,
        },
        Rule {
            name: "remove_temp_files",
            matcher: Matcher::Keywords(&[
                &["remove", "delete", "clean", "clear", "purge"],
                &["temp", "temporary", "tmp"],
            ]),
            command: r"find . -type f \( -name '*.tmp' -o -name '*.temp' \) -exec rm -f {} +",
            default_target: None,
            risk_level: RiskLevel::High,
            explanation: "Searches the current directory tree for *.tmp and *.temp files and deletes them (requested: \"{input}\").",
            alternatives: &[
                "find . -type f -name '*.tmp' -print",
                "find . -type f -name '*.tmp' -delete",
            ],
            warnings: &[
                "Deleted files cannot be recovered",
                "Preview the matches first with: find . -type f -name '*.tmp'",
            ],
            confidence: 0.85,
        },
        Rule {
            name: "delete_file",
            matcher: pattern(
                r"\b(?:delete|remove)\s+(?:the\s+)?(?:file\s+)?(?:named\s+|called\s+)?([\w-]+\.[\w.]+)",
            ),
            command: "rm -i {target}",
            default_target: Some("file.txt"),
            risk_level: RiskLevel::Medium,
            explanation: "Deletes the file {target}, asking for confirmation first (requested: \"{input}\").",
            alternatives: &["mv {target} /tmp/", "gio trash {target}"],
            warnings: &["Deleted files cannot be recovered"],
            confidence: 0.8,
        },
        Rule {
            name: "kill_process",
            matcher: pattern(
                r"\b(?:kill|terminate|stop)\s+(?:the\s+|all\s+)?(?:process(?:es)?\s+)?(?:named\s+|called\s+)?([\w.-]+)?",
            ),
            command: "pkill {target}",
            default_target: Some("process_name"),
            risk_level: RiskLevel::Medium,
            explanation: "Sends SIGTERM to every process named {target} (requested: \"{input}\").",
            alternatives: &["pgrep -a {target}", "kill <pid>"],
            warnings: &["Unsaved work in the terminated processes will be lost"],
            confidence: 0.8,
        },
        Rule {
            name: "world_writable",
            matcher: Matcher::Keywords(&[
                &["permission", "chmod", "access"],
                &["everyone", "777", "world", "anyone"],
            ]),
            command: "chmod 777 .",
            default_target: None,
            risk_level: RiskLevel::High,
            explanation: "Gives every user read, write and execute access to the current directory (requested: \"{input}\").",
            alternatives: &["chmod 755 .", "chmod u+rwx,go+rx ."],
            warnings: &[
                "World-writable permissions let any user modify these files",
                "Prefer the narrowest permissions that work",
            ],
            confidence: 0.75,
        },
        Rule {
            name: "make_executable",
            matcher: pattern(
                r"\bmake\s+(?:the\s+)?(?:file\s+|script\s+)?([\w./~-]+)?\s*executable\b",
            ),
            command: "chmod +x {target}",
            default_target: Some("script.sh"),
            risk_level: RiskLevel::Low,
            explanation: "Adds the executable bit to {target} (requested: \"{input}\").",
            alternatives: &["chmod u+x {target}", "chmod 755 {target}"],
            warnings: &[],
            confidence: 0.85,
        },
        Rule {
            name: "update_packages",
            matcher: Matcher::Keywords(&[
                &["update", "upgrade"],
                &["package", "system", "software"],
            ]),
            command: "sudo apt update && sudo apt upgrade",
            default_target: None,
            risk_level: RiskLevel::Medium,
            explanation: "Refreshes the package index and upgrades installed packages (requested: \"{input}\").",
            alternatives: &["sudo dnf upgrade", "brew upgrade"],
            warnings: &[
                "Requires administrator privileges",
                "Assumes a Debian-based system using apt",
            ],
            confidence: 0.75,
        },
        Rule {
            name: "download",
            matcher: pattern(r"\bdownload\s+(?:the\s+)?(?:file\s+)?(?:from\s+)?(\S+)?"),
            command: "curl -LO {target}",
            default_target: Some("https://example.com/file"),
            risk_level: RiskLevel::Medium,
            explanation: "Downloads {target} into the current directory, following redirects (requested: \"{input}\").",
            alternatives: &["wget {target}"],
            warnings: &["Only download files from sources you trust"],
            confidence: 0.75,
        },
        Rule {
            name: "disk_space",
            matcher: Matcher::Keywords(&[
                &["disk", "storage", "filesystem"],
                &["space", "usage", "free", "left", "full"],
            ]),
            command: "df -h",
            default_target: None,
            risk_level: RiskLevel::Low,
            explanation: "Shows used and available space on every mounted filesystem in human-readable units (requested: \"{input}\").",
            alternatives: &["du -sh *", "df -i"],
            warnings: &[],
            confidence: 0.9,
        },
        Rule {
            name: "find_large_files",
            matcher: Matcher::Keywords(&[
                &["find", "search", "show", "locate", "list"],
                &["large", "big", "huge", "biggest", "largest"],
                &["file"],
            ]),
            command: "find . -type f -size +100M -exec ls -lh {} +",
            default_target: None,
            risk_level: RiskLevel::Low,
            explanation: "Lists files larger than 100 MB below the current directory (requested: \"{input}\").",
            alternatives: &["du -ah . | sort -rh | head -n 20"],
            warnings: &[],
            confidence: 0.85,
        },
        Rule {
            name: "directory_size",
            matcher: Matcher::Keywords(&[
                &["size", "big", "large", "much"],
                &["directory", "folder", "dir"],
            ]),
            command: "du -sh .",
            default_target: None,
            risk_level: RiskLevel::Low,
            explanation: "Prints the total size of the current directory (requested: \"{input}\").",
            alternatives: &["du -h --max-depth=1 ."],
            warnings: &[],
            confidence: 0.85,
        },
        Rule {
            name: "find_by_name",
            matcher: pattern(
                r"\b(?:find|locate|search\s+for)\s+(?:a\s+|the\s+|all\s+)?files?\s+(?:named|called)\s+([\w.*-]+)",
            ),
            command: "find . -name {target}",
            default_target: Some("*"),
            risk_level: RiskLevel::Low,
            explanation: "Searches the current directory tree for files named {target} (requested: \"{input}\").",
            alternatives: &["locate {target}"],
            warnings: &[],
            confidence: 0.9,
        },
        Rule {
            name: "search_text",
            matcher: pattern(r#"\b(?:(?:search|grep|look)\s+for|containing)\s+["']?([\w.-]+)"#),
            command: "grep -rn {target} .",
            default_target: Some("pattern"),
            risk_level: RiskLevel::Low,
            explanation: "Searches every file below the current directory for {target} and prints matching lines (requested: \"{input}\").",
            alternatives: &["rg {target}"],
            warnings: &[],
            confidence: 0.85,
        },
        Rule {
            name: "list_processes",
            matcher: Matcher::Keywords(&[
                &["process"],
                &["list", "show", "display", "running", "all"],
            ]),
            command: "ps aux",
            default_target: None,
            risk_level: RiskLevel::Low,
            explanation: "Lists every running process with its owner, CPU and memory usage (requested: \"{input}\").",
            alternatives: &["top", "pgrep -a <name>"],
            warnings: &[],
            confidence: 0.9,
        },
        Rule {
            name: "network_ports",
            matcher: Matcher::Keywords(&[
                &["port"],
                &["open", "listening", "used", "which", "show", "list"],
            ]),
            command: "ss -tulpn",
            default_target: None,
            risk_level: RiskLevel::Low,
            explanation: "Shows listening TCP and UDP ports with the owning processes (requested: \"{input}\").",
            alternatives: &["netstat -tulpn", "lsof -i -P -n"],
            warnings: &[],
            confidence: 0.85,
        },
        Rule {
            name: "memory_usage",
            matcher: Matcher::Keywords(&[&["memory", "ram"]]),
            command: "free -h",
            default_target: None,
            risk_level: RiskLevel::Low,
            explanation: "Shows total, used and free memory in human-readable units (requested: \"{input}\").",
            alternatives: &["vmstat -s", "top"],
            warnings: &[],
            confidence: 0.9,
        },
        Rule {
            name: "git_status",
            matcher: Matcher::Keywords(&[
                &["git", "repository", "repo"],
                &["status", "change", "changed", "modified"],
            ]),
            command: "git status",
            default_target: None,
            risk_level: RiskLevel::Low,
            explanation: "Shows staged, unstaged and untracked changes in the current repository (requested: \"{input}\").",
            alternatives: &["git status -s", "git diff --stat"],
            warnings: &[],
            confidence: 0.9,
        },
        Rule {
            name: "create_directory",
            matcher: pattern(
                r"\b(?:create|make|new)\s+(?:a\s+)?(?:new\s+)?(?:directory|folder|dir)\b(?:\s+(?:named|called))?(?:\s+([\w./~-]+))?",
            ),
            command: "mkdir -p {target}",
            default_target: Some("new_folder"),
            risk_level: RiskLevel::Low,
            explanation: "Creates the directory {target}, including missing parent directories (requested: \"{input}\").",
            alternatives: &["mkdir {target}"],
            warnings: &[],
            confidence: 0.9,
        },
        Rule {
            name: "compress",
            matcher: pattern(
                r"\b(?:compress|archive|zip|tar)\s+(?:up\s+)?(?:the\s+)?(?:directory\s+|folder\s+)?([\w./~-]+)?",
            ),
            command: "tar -czf {target}.tar.gz {target}",
            default_target: Some("my_folder"),
            risk_level: RiskLevel::Low,
            explanation: "Packs {target} into a gzip-compressed tar archive (requested: \"{input}\").",
            alternatives: &["zip -r {target}.zip {target}"],
            warnings: &[],
            confidence: 0.8,
        },
        Rule {
            name: "extract",
            matcher: pattern(
                r"\b(?:extract|unzip|untar|decompress)\s+(?:the\s+)?(?:archive\s+|file\s+)?([\w./~-]+)?",
            ),
            command: "tar -xzf {target}",
            default_target: Some("archive.tar.gz"),
            risk_level: RiskLevel::Low,
            explanation: "Extracts the gzip-compressed tar archive {target} into the current directory (requested: \"{input}\").",
            alternatives: &["unzip {target}"],
            warnings: &[],
            confidence: 0.8,
        },
        Rule {
            name: "current_directory",
            matcher: pattern(
                r"^(?:what\s+is\s+|show\s+(?:me\s+)?|print\s+)?(?:the\s+|my\s+)?(?:current|working)\s+(?:working\s+)?(?:directory|folder|path)\??$|\bwhere\s+am\s+i\b",
            ),
            command: "pwd",
            default_target: None,
            risk_level: RiskLevel::Low,
            explanation: "Prints the absolute path of the working directory (requested: \"{input}\").",
            alternatives: &["echo $PWD"],
            warnings: &[],
            confidence: 0.95,
        },
        Rule {
            name: "list_hidden",
            matcher: Matcher::Keywords(&[
                &["list", "show", "display", "see"],
                &["hidden", "dotfile", "all"],
                &["file", "dotfile", "everything"],
            ]),
            command: "ls -la",
            default_target: None,
            risk_level: RiskLevel::Low,
            explanation: "Lists all files, hidden dotfiles included, with permissions, owner, size and modification time (requested: \"{input}\").",
            alternatives: &["ls -A", "ls -lah"],
            warnings: &[],
            confidence: 0.95,
        },
        Rule {
            name: "list_files",
            matcher: Matcher::Keywords(&[
                &["list", "show", "display", "see", "ls"],
                &["file", "directory", "folder", "content", "dir"],
            ]),
            command: "ls -l",
            default_target: None,
            risk_level: RiskLevel::Low,
            explanation: "Lists the files in the current directory in long format (requested: \"{input}\").",
            alternatives: &["ls", "ls -la"],
            warnings: &[],
            confidence: 0.9,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<&str> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect()
    }

    fn rule(name: &str) -> &'static Rule {
        DEFAULT_RULES
            .iter()
            .find(|r| r.name == name)
            .unwrap_or_else(|| panic!("missing rule {name}"))
    }

    #[test]
    fn all_patterns_compile_and_names_are_unique() {
        let mut names: Vec<_> = DEFAULT_RULES.iter().map(|r| r.name).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn target_rules_define_defaults() {
        for rule in DEFAULT_RULES.iter().filter(|r| r.needs_target()) {
            assert!(
                rule.default_target.is_some(),
                "rule {} needs a default target",
                rule.name
            );
        }
    }

    #[test]
    fn confidence_is_in_range() {
        for rule in DEFAULT_RULES.iter() {
            assert!((0.0..1.0).contains(&rule.confidence), "{}", rule.name);
        }
    }

    #[test]
    fn keyword_matching_accepts_plurals() {
        assert!(word_matches("files", "file"));
        assert!(word_matches("processes", "process"));
        assert!(word_matches("file", "file"));
        assert!(!word_matches("filesystem", "file"));
        assert!(!word_matches("fil", "file"));
    }

    #[test]
    fn keyword_rule_requires_every_group() {
        let text = "check disk space";
        assert!(rule("disk_space").matches(text, &words(text)).is_some());
        let text = "check disk";
        assert!(rule("disk_space").matches(text, &words(text)).is_none());
    }

    #[test]
    fn pattern_rule_captures_target() {
        let text = "create a folder named backups";
        let capture = rule("create_directory")
            .matches(text, &words(text))
            .unwrap();
        assert_eq!(capture.target.map(|r| &text[r]), Some("backups"));
    }

    #[test]
    fn stopword_capture_is_dropped() {
        let text = "kill the process";
        let capture = rule("kill_process").matches(text, &words(text)).unwrap();
        assert_eq!(capture.target, None);

        let text = "create a new folder";
        let capture = rule("create_directory")
            .matches(text, &words(text))
            .unwrap();
        assert_eq!(capture.target, None);
    }

    #[test]
    fn current_directory_is_anchored() {
        let text = "list files in the current directory";
        assert!(rule("current_directory").matches(text, &words(text)).is_none());
        let text = "what is my current directory?";
        assert!(rule("current_directory").matches(text, &words(text)).is_some());
    }
}
