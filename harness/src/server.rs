use std::io::Write;
use std::process::{Child, Command, Stdio};

/// A running `werewolf-node` process. Killed on drop, mirroring this
/// codebase's existing harness `Server`.
pub struct Server(Child);

impl Server {
    pub fn new(
        path: &std::path::PathBuf,
        id: i32,
        listen: &str,
        name: &str,
        peers: &[String],
        verbose: u8,
    ) -> Self {
        let mut command = Command::new(path);
        if verbose > 0 {
            let verbosity = "-".to_string() + &"v".repeat(verbose as usize);
            command.arg(&verbosity);
        }
        command.args(["-i", &id.to_string()]).args(["-n", name]).args(["-l", listen]);
        for peer in peers {
            command.args(["-p", peer]);
        }
        command
            .stdin(Stdio::piped())
            .spawn()
            .map(Server)
            .expect("[INTERNAL ERROR]: could not spawn werewolf-node")
    }

    pub fn send_line(&mut self, line: &str) {
        if let Some(stdin) = self.0.stdin.as_mut() {
            let _ = writeln!(stdin, "{}", line);
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.0.kill().ok();
    }
}
