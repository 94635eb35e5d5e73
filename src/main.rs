use std::process::ExitCode;

#[actix_web::main]
async fn main() -> ExitCode {
    match pricehub_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Config errors arrive before the tracing subscriber is installed.
            eprintln!("pricehub: {}", err);
            ExitCode::FAILURE
        }
    }
}
