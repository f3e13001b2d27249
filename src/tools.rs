//! External tool detection
//!
//! - apkanalyzer (Android SDK cmdline-tools, needed for dex attribution)
//! - git (optional, records the checkout revision in snapshots)

use crate::fmt::{CHECKMARK, CROSSMARK, INFO, WRENCH};
use crate::infra::{CommandExecutor, RealCommandExecutor};
use console::style;
use thiserror::Error;

/// Errors that can occur during tool operations
#[derive(Error, Debug)]
pub enum ToolError {
    /// I/O error during tool execution
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tool execution failed
    #[error("Failed to get version for {0}")]
    VersionFailed(String),

    /// Required tool is missing
    #[error("Required tool missing: {0}")]
    MissingTool(String),
}

/// An external program supersize may run
///
/// # Examples
///
/// ```no_run
/// use supersize::tools::Tool;
///
/// let git = Tool::new("git", "git", "--version", false);
/// if git.is_installed() {
///     println!("git is installed");
/// }
/// ```
#[derive(Debug)]
pub struct Tool<CE: CommandExecutor = RealCommandExecutor> {
    /// Human-readable name
    pub name: &'static str,
    /// Binary name in PATH, or a path
    pub binary: String,
    /// Flag to get version (e.g., "--version")
    pub version_flag: &'static str,
    /// Whether this tool is required
    pub required: bool,
    cmd_executor: CE,
}

impl<CE: CommandExecutor> Tool<CE> {
    /// Create a new Tool with a custom command executor
    pub fn with_executor(
        name: &'static str,
        binary: impl Into<String>,
        version_flag: &'static str,
        required: bool,
        cmd_executor: CE,
    ) -> Self {
        Self {
            name,
            binary: binary.into(),
            version_flag,
            required,
            cmd_executor,
        }
    }

    /// Whether the tool can be found (on PATH, or at the given path)
    pub fn is_installed(&self) -> bool {
        which::which(&self.binary).is_ok()
    }

    /// First line the tool prints for its version flag
    pub fn version(&self) -> Result<String, ToolError> {
        let output = self
            .cmd_executor
            .execute(|cmd| cmd.arg(self.version_flag), &self.binary)?;

        if !output.status.success() {
            return Err(ToolError::VersionFailed(self.name.to_string()));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .to_string();

        Ok(version)
    }

    /// Check and report the tool status
    pub fn check(&self) -> ToolStatus {
        if self.is_installed() {
            match self.version() {
                Ok(version) if !version.is_empty() => ToolStatus::Available(version),
                _ => ToolStatus::InstalledButVersionUnknown,
            }
        } else {
            ToolStatus::Missing
        }
    }
}

impl Tool<RealCommandExecutor> {
    /// Create a new Tool with real command execution
    pub fn new(
        name: &'static str,
        binary: impl Into<String>,
        version_flag: &'static str,
        required: bool,
    ) -> Self {
        Self::with_executor(name, binary, version_flag, required, RealCommandExecutor)
    }
}

/// Status of a tool check
#[derive(Debug, PartialEq, Eq)]
pub enum ToolStatus {
    /// Tool is available and version was successfully retrieved
    Available(String),
    /// Tool binary exists but version check failed
    InstalledButVersionUnknown,
    /// Tool binary not found
    Missing,
}

/// The external tools supersize knows about
pub struct ToolChain<CE: CommandExecutor = RealCommandExecutor> {
    /// apkanalyzer (required for APK inputs)
    pub apkanalyzer: Tool<CE>,
    /// git (optional)
    pub git: Tool<CE>,
}

impl ToolChain<RealCommandExecutor> {
    /// Create a ToolChain; `apkanalyzer` is the configured binary or path
    pub fn new(apkanalyzer: impl Into<String>) -> Self {
        Self::with_executor(apkanalyzer, RealCommandExecutor)
    }
}

impl<CE: CommandExecutor + Clone> ToolChain<CE> {
    /// Create a ToolChain with a custom command executor
    pub fn with_executor(apkanalyzer: impl Into<String>, cmd_executor: CE) -> Self {
        Self {
            apkanalyzer: Tool::with_executor(
                "apkanalyzer",
                apkanalyzer,
                "--version",
                true,
                cmd_executor.clone(),
            ),
            git: Tool::with_executor("git", "git", "--version", false, cmd_executor),
        }
    }
}

impl<CE: CommandExecutor> ToolChain<CE> {
    /// Check all tools and print their status
    pub fn check_all(&self) -> Result<(), ToolError> {
        println!("\n{} Checking external tools...", WRENCH);

        let mut missing_required: Vec<&Tool<CE>> = Vec::new();

        for tool in [&self.apkanalyzer, &self.git] {
            match tool.check() {
                ToolStatus::Available(version) => {
                    println!(
                        "   {} {} - {}",
                        style("✓").green(),
                        style(tool.name).bold(),
                        style(version).dim()
                    );
                }
                ToolStatus::InstalledButVersionUnknown => {
                    println!(
                        "   {} {} - {}",
                        style("✓").green(),
                        style(tool.name).bold(),
                        style("(version unknown)").dim()
                    );
                }
                ToolStatus::Missing if tool.required => {
                    println!(
                        "   {} {} - {}",
                        style("✗").red(),
                        style(tool.name).bold(),
                        style("NOT FOUND").red()
                    );
                    missing_required.push(tool);
                }
                ToolStatus::Missing => {
                    println!(
                        "   {} {} - {} {}",
                        style("○").yellow(),
                        style(tool.name).bold(),
                        style("NOT FOUND").yellow(),
                        style("(optional)").dim()
                    );
                }
            }
        }

        if missing_required.is_empty() {
            println!("\n{} All required tools found", CHECKMARK);
            return Ok(());
        }

        println!("\n{} Missing required tools:", CROSSMARK);
        for tool in &missing_required {
            println!("   • {} ({})", tool.name, tool.binary);
        }
        println!("\n{} Installation instructions:", INFO);
        for tool in &missing_required {
            print_installation_instructions(tool.name);
        }
        Err(ToolError::MissingTool(
            missing_required
                .iter()
                .map(|t| t.name)
                .collect::<Vec<_>>()
                .join(", "),
        ))
    }
}

fn print_installation_instructions(name: &str) {
    match name {
        "apkanalyzer" => {
            println!("\n   apkanalyzer (Android SDK command-line tools):");
            println!("     sdkmanager \"cmdline-tools;latest\"");
            println!("     # or set `apkanalyzer = \"/path/to/apkanalyzer\"` in .supersize.toml");
        }
        "git" => {
            println!("\n   git:");
            println!("     sudo apt install git");
        }
        _ => {}
    }
}
