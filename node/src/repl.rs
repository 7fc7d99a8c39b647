//! Stdin command loop (spec §6 "Node CLI").
//!
//! Runs on a blocking thread (`tokio::task::spawn_blocking`) reading lines
//! from stdin, parses each into a [`ReplCommand`], and sends it onto the
//! same event channel the transport reader uses so the consensus loop sees
//! wire messages and local commands in one FIFO order (spec §5).

use tokio::sync::mpsc;

/// A parsed command from the node's stdin REPL.
#[derive(Clone, Debug)]
pub enum ReplCommand {
    Tx { to: String, amount: f64 },
    Stake { amount: f64 },
    Unstake { amount: f64 },
    Forge { force: bool },
    Sync,
    Chain,
    Wallet,
    Mempool,
    Info,
    Nodes,
    Exit,
}

/// Parses one line of REPL input. Returns `None` for blank lines or
/// anything unrecognized (logged by the caller, not here).
pub fn parse(line: &str) -> Option<ReplCommand> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["tx", to, amount] => amount.parse().ok().map(|amount| ReplCommand::Tx { to: to.to_string(), amount }),
        ["stake", amount] => amount.parse().ok().map(|amount| ReplCommand::Stake { amount }),
        ["unstake", amount] => amount.parse().ok().map(|amount| ReplCommand::Unstake { amount }),
        ["forge"] => Some(ReplCommand::Forge { force: false }),
        ["forge", "--force"] => Some(ReplCommand::Forge { force: true }),
        ["sync"] => Some(ReplCommand::Sync),
        ["chain"] => Some(ReplCommand::Chain),
        ["wallet"] => Some(ReplCommand::Wallet),
        ["mempool"] => Some(ReplCommand::Mempool),
        ["info"] => Some(ReplCommand::Info),
        ["nodes"] => Some(ReplCommand::Nodes),
        ["exit"] => Some(ReplCommand::Exit),
        _ => None,
    }
}

/// Spawns the blocking stdin-reading loop, sending each parsed command to
/// `tx`. Returns once stdin closes or the channel's receiver is dropped.
pub fn spawn(tx: mpsc::UnboundedSender<ReplCommand>) {
    std::thread::spawn(move || {
        use std::io::BufRead;
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse(&line) {
                Some(cmd) => {
                    let is_exit = matches!(cmd, ReplCommand::Exit);
                    if tx.send(cmd).is_err() {
                        break;
                    }
                    if is_exit {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => eprintln!("unrecognized command: {line}"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tx_command() {
        match parse("tx node2 12.5") {
            Some(ReplCommand::Tx { to, amount }) => {
                assert_eq!(to, "node2");
                assert_eq!(amount, 12.5);
            }
            other => panic!("expected Tx, got {other:?}"),
        }
    }

    #[test]
    fn parses_forge_with_and_without_force() {
        assert!(matches!(parse("forge"), Some(ReplCommand::Forge { force: false })));
        assert!(matches!(parse("forge --force"), Some(ReplCommand::Forge { force: true })));
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!(parse("frobnicate").is_none());
        assert!(parse("tx only-one-arg").is_none());
    }
}
