use parley::cli::initialize_from_arguments;

/// Without arguments, main runs the scripted echo scenario.
#[tokio::main]
async fn main() {
    println!("parley v{}", env!("CARGO_PKG_VERSION"));
    initialize_from_arguments().await;
}
