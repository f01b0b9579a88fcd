// src/main.rs

use neurodrive::{cli, logging, run};

#[tokio::main]
async fn main() {
    let code = match run_main().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("neurodrive error: {err:?}");
            1
        }
    };
    // A pending stdin read cannot be cancelled; exit instead of waiting on it.
    std::process::exit(code);
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
