use std::collections::HashMap;

use structopt::StructOpt;

mod command;
mod server;

use crate::command::{Command, Execution};
use crate::server::Server;

#[derive(StructOpt)]
#[structopt(name = "harness")]
struct Opt {
    /// werewolf-node binary
    #[structopt(short = "n", long = "node")]
    node: std::path::PathBuf,

    /// Scenario file (JSON array of commands)
    #[structopt(short = "f", long = "file")]
    file: std::path::PathBuf,

    /// werewolf-node logging verbosity
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,
}

fn main() {
    let opt = Opt::from_args();

    let execution: Execution = std::fs::File::open(&opt.file)
        .map(std::io::BufReader::new)
        .map(serde_json::from_reader)
        .unwrap_or_else(|error| panic!("could not open scenario file {:?}: {}", opt.file, error))
        .expect("[INTERNAL ERROR]: could not parse scenario file");

    let mut nodes: HashMap<i32, Server> = HashMap::new();

    for command in execution.0 {
        println!("executing {:?}", command);
        match command {
            Command::Start { id, listen, name, peers } => {
                nodes.insert(id, Server::new(&opt.node, id, &listen, &name, &peers, opt.verbose));
            }
            Command::Send { id, line } => {
                if let Some(node) = nodes.get_mut(&id) {
                    node.send_line(&line);
                } else {
                    eprintln!("[ERROR]: no running node with id {}", id);
                }
            }
            Command::Crash { id } => {
                nodes.remove(&id);
            }
            Command::Sleep { ms } => {
                std::thread::sleep(std::time::Duration::from_millis(ms));
            }
        }
    }
}
