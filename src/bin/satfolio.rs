use std::{env, process};

fn main() {
    let args: Vec<String> = env::args().collect();

    let config = satfolio::CliConfig::new(&args).unwrap_or_else(|err| {
        eprintln!("Invalid configuration: {}", err);
        process::exit(1);
    });

    let outcome = config.run().unwrap_or_else(|err| {
        eprintln!("Problem while solving: {}", err);
        process::exit(1);
    });

    process::exit(outcome.exit_code());
}
