use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match timemaster::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
