//! Admin stdin command loop (spec.md §6 "Relay admin commands").
//!
//! Runs on a blocking thread, same idiom as the node's REPL: parses one
//! line at a time, sends the parsed command to the relay's main loop over
//! an mpsc channel.

use tokio::sync::mpsc;

use chain::AccountId;

#[derive(Clone, Copy, Debug)]
pub enum DropAction {
    On,
    Off,
    Toggle,
}

#[derive(Clone, Debug)]
pub enum AdminCommand {
    Step,
    Stop,
    Continue,
    Drop { id: AccountId, action: DropAction },
    Delay { id: AccountId, ms: Option<u64> },
    Threshold(f64),
    Detect,
    Attacks,
    Exit,
}

/// Parses one line of admin input. Returns `None` for blank lines or
/// anything unrecognized.
pub fn parse(line: &str) -> Option<AdminCommand> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["step"] => Some(AdminCommand::Step),
        ["stop"] => Some(AdminCommand::Stop),
        ["continue"] => Some(AdminCommand::Continue),
        ["drop", id, "on"] => Some(AdminCommand::Drop { id: AccountId::new(*id), action: DropAction::On }),
        ["drop", id, "off"] => Some(AdminCommand::Drop { id: AccountId::new(*id), action: DropAction::Off }),
        ["drop", id, "toggle"] => Some(AdminCommand::Drop { id: AccountId::new(*id), action: DropAction::Toggle }),
        ["delay", id, "off"] => Some(AdminCommand::Delay { id: AccountId::new(*id), ms: None }),
        ["delay", id, ms] => ms.parse().ok().map(|ms| AdminCommand::Delay { id: AccountId::new(*id), ms: Some(ms) }),
        ["threshold", x] => x.parse().ok().map(AdminCommand::Threshold),
        ["detect"] => Some(AdminCommand::Detect),
        ["attacks"] => Some(AdminCommand::Attacks),
        ["exit"] => Some(AdminCommand::Exit),
        _ => None,
    }
}

/// Spawns the blocking stdin-reading loop, sending each parsed command to
/// `tx`. Returns once stdin closes or the channel's receiver is dropped.
pub fn spawn(tx: mpsc::UnboundedSender<AdminCommand>) {
    std::thread::spawn(move || {
        use std::io::BufRead;
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse(&line) {
                Some(cmd) => {
                    let is_exit = matches!(cmd, AdminCommand::Exit);
                    if tx.send(cmd).is_err() {
                        break;
                    }
                    if is_exit {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => eprintln!("unrecognized admin command: {line}"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_drop_variants() {
        assert!(matches!(
            parse("drop node2 on"),
            Some(AdminCommand::Drop { action: DropAction::On, .. })
        ));
        assert!(matches!(
            parse("drop node2 toggle"),
            Some(AdminCommand::Drop { action: DropAction::Toggle, .. })
        ));
    }

    #[test]
    fn parses_delay_with_and_without_value() {
        match parse("delay node2 250") {
            Some(AdminCommand::Delay { ms: Some(250), .. }) => {}
            other => panic!("expected Delay{{ms: Some(250)}}, got {other:?}"),
        }
        assert!(matches!(parse("delay node2 off"), Some(AdminCommand::Delay { ms: None, .. })));
    }

    #[test]
    fn parses_threshold_and_rejects_garbage() {
        assert!(matches!(parse("threshold 0.8"), Some(AdminCommand::Threshold(x)) if (x - 0.8).abs() < 1e-9));
        assert!(parse("threshold not-a-number").is_none());
        assert!(parse("frobnicate").is_none());
    }
}
