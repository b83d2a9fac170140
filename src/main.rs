//! git-secret-scanner - main entry point

use git_secret_scanner::cli::{exit_codes, CliApp};

#[tokio::main]
async fn main() {
    let app = CliApp::new();
    let code = match app.run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_codes::INTERNAL_ERROR
        }
    };
    std::process::exit(code);
}
