use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match mcprt_cli::run().await {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
