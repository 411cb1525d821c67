use clap::Parser;
use shafu::Shafu;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Initialize tracing based on RUST_LOG env var
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match shafu::run(Shafu::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let cancelled = e
                .downcast_ref::<shafu_core::Error>()
                .is_some_and(shafu_core::Error::is_cancelled);
            if cancelled {
                eprintln!("Cancelled");
                ExitCode::from(130)
            } else {
                eprintln!("Error: {e:#}");
                ExitCode::FAILURE
            }
        }
    }
}
