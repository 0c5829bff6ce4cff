//! Portfolio Dashboard - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    if let Err(e) = portfolio_dashboard::run().await {
        eprintln!("portfolio-dashboard failed to start: {e}");
        std::process::exit(1);
    }
}
