//! Binary entrypoint for the Roster CLI.

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let exit_code = roster_cli::run().await;
    std::process::exit(exit_code);
}
