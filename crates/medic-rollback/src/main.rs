use clap::{value_parser, Arg, Command};
use medic_rollback::RollbackManager;
use std::path::PathBuf;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let matches = Command::new("medic-rollback")
        .version("0.1.0")
        .about("Revert the patch registered for a ticket")
        .arg(
            Arg::new("ticket-id")
                .required(true)
                .help("Ticket whose patch should be reverted"),
        )
        .arg(
            Arg::new("dir")
                .long("dir")
                .default_value(".medic/patches")
                .value_parser(value_parser!(PathBuf))
                .help("Patch registry directory"),
        )
        .arg(
            Arg::new("worktree")
                .long("worktree")
                .default_value(".")
                .value_parser(value_parser!(PathBuf))
                .help("Worktree to revert against"),
        )
        .get_matches();

    let ticket_id = matches.get_one::<String>("ticket-id").unwrap();
    let dir = matches.get_one::<PathBuf>("dir").unwrap();
    let worktree = matches.get_one::<PathBuf>("worktree").unwrap();

    let result = RollbackManager::open(dir, worktree)
        .and_then(|mut manager| manager.rollback(ticket_id));

    match result {
        Ok(()) => {
            println!("rolled back ticket {ticket_id}");
        }
        Err(e) => {
            eprintln!("rollback failed: {e}");
            std::process::exit(1);
        }
    }
}
