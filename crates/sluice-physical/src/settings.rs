/// The resolved side-effect options for one tee invocation.
///
/// Options are supplied textually at the call site and resolved exactly once
/// when the call is bound. The resolved settings are carried on the tee step
/// and treated as immutable for the remainder of execution.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TeeSettings {
    /// Render the buffered rows to the terminal once the input is drained.
    pub terminal: bool,
    /// Pipe the rendering through an external pager instead of printing it.
    pub pager: bool,
    /// Write the buffered rows to a delimited file at this path.
    pub path: Option<String>,
    /// Materialize the buffered rows into a table with this name.
    pub table_name: Option<String>,
    /// Optional label emitted immediately before the rendering.
    pub symbol: Option<String>,
}

impl Default for TeeSettings {
    fn default() -> Self {
        Self {
            terminal: true,
            pager: false,
            path: None,
            table_name: None,
            symbol: None,
        }
    }
}
