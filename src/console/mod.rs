//! Stdin command console (Component K, ambient): the interactive
//! `add`/`rem`/`list`/`save`/`stop` surface the specification treats as
//! an external collaborator, dispatching into the registry's
//! control-plane surface (4.H).
//!
//! Grounded on the original `cmd.CommandHandler.Listen`/`Handle`
//! (`src/cmd/cmdhandler.go`) and the individual `cmds/*_cmd.go`
//! handlers: a blocking stdin read loop, lowercase-command dispatch,
//! and a tab-aligned `list` dump.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::HostConfig;
use crate::registry::Registry;

const HELP_TEXT: &str = "====COMMANDS====\n\
stop stops the proxy\n\
add <NAME> <ADDR> Add a server\n\
rem <NAME> Remove a server\n\
list show all servers\n\
save save the current configuration";

pub struct Console {
    registry: Arc<Registry>,
    config_path: PathBuf,
}

impl Console {
    pub fn new(registry: Arc<Registry>, config_path: PathBuf) -> Self {
        Self { registry, config_path }
    }

    /// Read commands from stdin until EOF or a `stop` command, relaying
    /// shutdown over `shutdown`.
    pub async fn run(self, shutdown: broadcast::Sender<()>) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "console read error");
                    break;
                }
            };

            if self.handle(&line).await {
                let _ = shutdown.send(());
                break;
            }
        }
    }

    /// Handle one line of input. Returns `true` if it was a `stop`
    /// command.
    async fn handle(&self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }

        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return false;
        };
        let args: Vec<&str> = parts.collect();

        match command.to_lowercase().as_str() {
            "stop" => return true,
            "add" => self.add(&args),
            "rem" => self.rem(&args),
            "list" => self.list(),
            "save" => self.save(),
            _ => println!("{HELP_TEXT}"),
        }

        false
    }

    fn add(&self, args: &[&str]) {
        if args.len() < 2 {
            println!("\"add\" needs 2 args: the name of the server and the address");
            return;
        }
        self.registry.add_host(HostConfig {
            name: args[0].to_string(),
            addr: args[1].to_string(),
        });
        info!(name = args[0], addr = args[1], "host added");
    }

    fn rem(&self, args: &[&str]) {
        if args.is_empty() {
            println!("\"rem\" needs 1 arg: the name of the server");
            return;
        }
        self.registry.remove_host(args[0]);
        info!(name = args[0], "host removed");
    }

    fn list(&self) {
        println!("{:<6}|{:<16}|{:<24}|{:<7}|{}", "Index", "Name", "Address", "Online", "Active");
        for (i, host) in self.registry.list_hosts().into_iter().enumerate() {
            println!(
                "{:<6}|{:<16}|{:<24}|{:<7}|{}",
                i, host.name, host.addr, host.online, host.active
            );
        }
    }

    fn save(&self) {
        let config = self.registry.get_config();
        if let Err(e) = config.save(&self.config_path) {
            error!(error = %e, "failed to save configuration");
        } else {
            info!(path = %self.config_path.display(), "configuration saved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn add_then_rem_round_trips_membership() {
        let registry = Registry::new(Config::default_config());
        let console = Console::new(Arc::clone(&registry), PathBuf::from("unused.json"));

        let before = registry.list().len();
        assert!(!console.handle("add extra 127.0.0.1:9").await);
        assert_eq!(registry.list().len(), before + 1);

        assert!(!console.handle("rem extra").await);
        assert_eq!(registry.list().len(), before);
    }

    #[tokio::test]
    async fn stop_command_signals_shutdown() {
        let registry = Registry::new(Config::default_config());
        let console = Console::new(registry, PathBuf::from("unused.json"));
        assert!(console.handle("stop").await);
    }

    #[tokio::test]
    async fn unknown_command_does_not_signal_shutdown() {
        let registry = Registry::new(Config::default_config());
        let console = Console::new(registry, PathBuf::from("unused.json"));
        assert!(!console.handle("banana").await);
    }
}
