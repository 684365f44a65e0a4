use clap::{value_parser, Arg, ArgAction, Command};
use medic_verify::SmokeRunner;
use std::time::Duration;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let matches = Command::new("medic-smoke")
        .version("0.1.0")
        .about("Run the external smoke-test command and emit a JSON outcome")
        .arg(
            Arg::new("project")
                .long("project")
                .required(true)
                .help("Project identifier"),
        )
        .arg(
            Arg::new("service")
                .long("service")
                .required(true)
                .help("Service identifier"),
        )
        .arg(
            Arg::new("test")
                .long("test")
                .required(true)
                .help("Test path to execute"),
        )
        .arg(
            Arg::new("budget")
                .long("budget")
                .default_value("2000")
                .value_parser(value_parser!(usize))
                .help("Token budget for failure logs"),
        )
        .arg(
            Arg::new("timeout-secs")
                .long("timeout-secs")
                .default_value("300")
                .value_parser(value_parser!(u64))
                .help("Wall-clock timeout in seconds"),
        )
        .arg(
            Arg::new("cmd")
                .long("cmd")
                .default_value("pytest")
                .help("Smoke-test command to invoke"),
        )
        .arg(
            Arg::new("extra")
                .action(ArgAction::Append)
                .trailing_var_arg(true)
                .help("Extra arguments forwarded to the smoke command"),
        )
        .get_matches();

    let project = matches.get_one::<String>("project").unwrap();
    let service = matches.get_one::<String>("service").unwrap();
    let test_path = matches.get_one::<String>("test").unwrap();
    let budget = *matches.get_one::<usize>("budget").unwrap();
    let timeout_secs = *matches.get_one::<u64>("timeout-secs").unwrap();
    let cmd = matches.get_one::<String>("cmd").unwrap();
    let extra: Vec<String> = matches
        .get_many::<String>("extra")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();

    let runner = SmokeRunner::new(cmd, Duration::from_secs(timeout_secs), budget);
    let outcome = runner.run(project, service, test_path, &extra).await;

    match serde_json::to_string(&outcome) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("failed to encode outcome: {e}");
            std::process::exit(1);
        }
    }
    std::process::exit(if outcome.success { 0 } else { 1 });
}
