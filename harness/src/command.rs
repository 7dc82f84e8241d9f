use serde::Deserialize;

#[derive(Deserialize)]
pub struct Execution(pub Vec<Command>);

/// One step of a scripted end-to-end scenario. `Send` writes a line
/// straight into a running node's stdin, reusing its interactive
/// operator prompt instead of inventing a parallel RPC protocol.
#[derive(Deserialize, Clone, Debug)]
#[serde(tag = "type")]
pub enum Command {
    /// Start a node with the given identity and peer addresses
    Start { id: i32, listen: String, name: String, peers: Vec<String> },

    /// Send an operator command to the given node's stdin
    Send { id: i32, line: String },

    /// Kill the given node's process
    Crash { id: i32 },

    /// Sleep the harness for `ms` milliseconds
    Sleep { ms: u64 },
}
