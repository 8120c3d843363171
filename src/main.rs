#[tokio::main]
async fn main() {
    if let Err(e) = dentdesk::run().await {
        eprintln!("dentdesk: {e}");
        std::process::exit(1);
    }
}
