//! Dex size attribution via `apkanalyzer`
//!
//! `apkanalyzer dex packages` prints a pre-order walk of the dex tree
//! (packages, classes, methods, fields) where every node's size includes its
//! children. This module turns that into one [`Symbol`] per node carrying
//! only the node's own bytes.

use crate::apk::{self, ApkError};
use crate::infra::{CommandExecutor, RealCommandExecutor};
use crate::models::symbol::{Symbol, APK_PREFIX_PATH, SECTION_DEX, SECTION_DEX_METHOD};
use log::{debug, error, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the root node apkanalyzer reports
pub const TOTAL_NODE_NAME: &str = "<TOTAL>";

/// Symbol name given to the root node
pub const UNATTRIBUTED_DEX_NAME: &str = "* Unattributed Dex";

/// Errors that can occur during dex attribution
#[derive(Error, Debug)]
pub enum ApkAnalyzerError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// apkanalyzer exited unsuccessfully
    #[error("apkanalyzer failed with status {status}: {stderr}")]
    CommandFailed {
        /// Exit code, -1 when killed by a signal
        status: i32,
        /// Captured stderr
        stderr: String,
    },

    /// A line of apkanalyzer output could not be parsed
    #[error("Unexpected apkanalyzer output: {0:?}")]
    MalformedLine(String),

    /// Children claim more bytes than their parent
    #[error("Children of '{name}' total {child_total} bytes, more than its {size} bytes")]
    ChildrenExceedParent {
        /// Parent node
        name: String,
        /// Parent's declared size
        size: i64,
        /// Sum of the direct children's sizes
        child_total: i64,
    },

    /// The APK could not be read
    #[error(transparent)]
    Apk(#[from] ApkError),
}

/// A node of the dex tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexNode {
    /// Package, class, method or field name
    pub name: String,
    /// Size in bytes
    pub size: i64,
}

impl DexNode {
    /// Create a node
    pub fn new(name: impl Into<String>, size: i64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Split off `count` whitespace-separated fields; the rest of the line is the
/// final element.
fn split_fields(line: &str, count: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(count + 1);
    let mut rest = line.trim_start();
    for _ in 0..count {
        match rest.find(char::is_whitespace) {
            Some(end) => {
                fields.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                if !rest.is_empty() {
                    fields.push(rest);
                }
                return fields;
            }
        }
    }
    let rest = rest.trim_end();
    if !rest.is_empty() {
        fields.push(rest);
    }
    fields
}

/// Parse `apkanalyzer dex packages` output.
///
/// Each line is `type state defined referenced size name...`.
///
/// # Examples
///
/// ```
/// use supersize::apkanalyzer::parse_dex_packages_output;
///
/// let nodes = parse_dex_packages_output("P d 3 3 120 <TOTAL>\nC d 1 1 40 org.Foo\n")?;
/// assert_eq!(nodes[1].name, "org.Foo");
/// assert_eq!(nodes[1].size, 40);
/// # Ok::<(), supersize::apkanalyzer::ApkAnalyzerError>(())
/// ```
pub fn parse_dex_packages_output(output: &str) -> Result<Vec<DexNode>, ApkAnalyzerError> {
    let mut nodes = Vec::new();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_fields(line, 5);
        if fields.len() != 6 {
            return Err(ApkAnalyzerError::MalformedLine(line.to_string()));
        }
        let size = fields[4]
            .parse::<i64>()
            .map_err(|_| ApkAnalyzerError::MalformedLine(line.to_string()))?;
        nodes.push(DexNode::new(fields[5], size));
    }
    Ok(nodes)
}

fn is_child(parent: &str, child: &str) -> bool {
    if parent == TOTAL_NODE_NAME {
        return true;
    }
    child.len() > parent.len()
        && child.starts_with(parent)
        && matches!(child.as_bytes()[parent.len()], b'.' | b' ')
}

/// Convert inclusive node sizes to exclusive ones.
///
/// Nodes must be in pre-order. A node is a child of the node above it on the
/// stack when that node is `<TOTAL>` or when its name continues the parent's
/// name with `.` or a space. Output keeps the input order.
///
/// # Examples
///
/// ```
/// use supersize::apkanalyzer::{undo_hierarchical_sizing, DexNode};
///
/// let nodes = vec![
///     DexNode::new("<TOTAL>", 100),
///     DexNode::new("org", 70),
///     DexNode::new("org.Foo", 50),
///     DexNode::new("com", 20),
/// ];
/// let sizes: Vec<i64> = undo_hierarchical_sizing(&nodes)?.iter().map(|n| n.size).collect();
/// assert_eq!(sizes, vec![10, 20, 50, 20]);
/// # Ok::<(), supersize::apkanalyzer::ApkAnalyzerError>(())
/// ```
pub fn undo_hierarchical_sizing(nodes: &[DexNode]) -> Result<Vec<DexNode>, ApkAnalyzerError> {
    struct Frame {
        index: usize,
        child_total: i64,
    }

    fn pop_frame(
        stack: &mut Vec<Frame>,
        nodes: &[DexNode],
        result: &mut [DexNode],
    ) -> Result<(), ApkAnalyzerError> {
        let Some(frame) = stack.pop() else {
            return Ok(());
        };
        let node = &nodes[frame.index];
        if frame.child_total > node.size {
            return Err(ApkAnalyzerError::ChildrenExceedParent {
                name: node.name.clone(),
                size: node.size,
                child_total: frame.child_total,
            });
        }
        result[frame.index].size = node.size - frame.child_total;
        if let Some(parent) = stack.last_mut() {
            parent.child_total += node.size;
        }
        Ok(())
    }

    let mut result = nodes.to_vec();
    let mut stack: Vec<Frame> = Vec::new();

    for (index, node) in nodes.iter().enumerate() {
        while let Some(top) = stack.last() {
            if is_child(&nodes[top.index].name, &node.name) {
                break;
            }
            pop_frame(&mut stack, nodes, &mut result)?;
        }
        stack.push(Frame {
            index,
            child_total: 0,
        });
    }
    while !stack.is_empty() {
        pop_frame(&mut stack, nodes, &mut result)?;
    }

    Ok(result)
}

/// Parse a `.jar.info` file: `package,source_path` per line
pub fn parse_jar_info(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .filter_map(|line| line.split_once(','))
        .map(|(package, path)| (package.trim().to_string(), path.trim().to_string()))
        .filter(|(package, path)| !package.is_empty() && !path.is_empty())
        .collect()
}

/// Load `size-info/<apk name>.jar.info` from the output directory.
///
/// A missing file yields an empty map.
pub fn load_jar_info(output_directory: &Path, apk_path: &Path) -> HashMap<String, String> {
    let apk_name = apk_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let info_path = output_directory
        .join("size-info")
        .join(format!("{}.jar.info", apk_name));

    match std::fs::read_to_string(&info_path) {
        Ok(contents) => parse_jar_info(&contents),
        Err(e) => {
            warn!(
                "Dex source paths unavailable, could not read {}: {}",
                info_path.display(),
                e
            );
            HashMap::new()
        }
    }
}

/// Build dex symbols from exclusive node sizes.
///
/// `expected_dex_size` is the total size of the APK's `.dex` files; whatever
/// the nodes do not account for (id tables, headers) is folded into the root
/// node.
pub fn create_dex_symbols(
    nodes: &[DexNode],
    source_map: &HashMap<String, String>,
    expected_dex_size: i64,
) -> Vec<Symbol> {
    let total: i64 = nodes.iter().map(|n| n.size).sum();
    let mut overhead = expected_dex_size - total;
    if overhead < 0 {
        error!(
            "Dex nodes total {} bytes, more than the {} bytes of .dex files",
            total, expected_dex_size
        );
        overhead = 0;
    }
    debug!("Dex id/metadata overhead: {} bytes", overhead);

    nodes
        .iter()
        .map(|node| {
            let package = node.name.split(' ').next().unwrap_or_default();
            let class_path = package.split('$').next().unwrap_or_default();

            let (full_name, object_path, source_path, size) = match source_map.get(class_path) {
                Some(source) => (
                    node.name.clone(),
                    package.to_string(),
                    source.clone(),
                    node.size,
                ),
                None if package == TOTAL_NODE_NAME => (
                    UNATTRIBUTED_DEX_NAME.to_string(),
                    String::new(),
                    String::new(),
                    node.size + overhead,
                ),
                None => (
                    node.name.clone(),
                    std::iter::once(APK_PREFIX_PATH)
                        .chain(package.split('.'))
                        .collect::<Vec<_>>()
                        .join("/"),
                    String::new(),
                    node.size,
                ),
            };

            let section_name = if full_name.ends_with(')') {
                SECTION_DEX_METHOD
            } else {
                SECTION_DEX
            };
            Symbol::new(section_name, full_name, size)
                .with_object_path(object_path)
                .with_source_path(source_path)
        })
        .collect()
}

/// Runs apkanalyzer and attributes dex bytes
pub struct ApkAnalyzer<CE: CommandExecutor = RealCommandExecutor> {
    tool: String,
    java_home: Option<PathBuf>,
    cmd_executor: CE,
}

impl ApkAnalyzer<RealCommandExecutor> {
    /// Create an analyzer that runs `tool` (a path or a name on `PATH`)
    pub fn new(tool: impl Into<String>, java_home: Option<PathBuf>) -> Self {
        Self::with_executor(tool, java_home, RealCommandExecutor)
    }
}

impl<CE: CommandExecutor> ApkAnalyzer<CE> {
    /// Create an analyzer with a custom command executor (for testing)
    pub fn with_executor(tool: impl Into<String>, java_home: Option<PathBuf>, cmd_executor: CE) -> Self {
        Self {
            tool: tool.into(),
            java_home,
            cmd_executor,
        }
    }

    /// Run `apkanalyzer dex packages` and parse its output.
    ///
    /// A `<apk>.mapping` file next to the APK is passed as proguard mappings.
    pub fn run_dex_packages(&self, apk_path: &Path) -> Result<Vec<DexNode>, ApkAnalyzerError> {
        let mapping_path = PathBuf::from(format!("{}.mapping", apk_path.display()));
        let has_mapping = mapping_path.exists();

        let output = self.cmd_executor.execute(
            |cmd| {
                cmd.args(["dex", "packages"]);
                if has_mapping {
                    cmd.arg("--proguard-mappings").arg(&mapping_path);
                }
                if let Some(java_home) = &self.java_home {
                    cmd.env("JAVA_HOME", java_home);
                }
                cmd.arg(apk_path)
            },
            &self.tool,
        )?;

        if !output.status.success() {
            return Err(ApkAnalyzerError::CommandFailed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_dex_packages_output(&String::from_utf8_lossy(&output.stdout))
    }

    /// Produce `.dex` and `.dex.method` symbols for an APK
    pub fn create_dex_symbols(
        &self,
        apk_path: &Path,
        output_directory: Option<&Path>,
    ) -> Result<Vec<Symbol>, ApkAnalyzerError> {
        let nodes = self.run_dex_packages(apk_path)?;
        let nodes = undo_hierarchical_sizing(&nodes)?;
        let source_map = output_directory
            .map(|dir| load_jar_info(dir, apk_path))
            .unwrap_or_default();
        let expected_dex_size = apk::expected_dex_total_size(apk_path)? as i64;

        Ok(create_dex_symbols(&nodes, &source_map, expected_dex_size))
    }
}
