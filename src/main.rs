#[tokio::main]
async fn main() {
    markervault_lib::init_tracing();

    if let Err(e) = markervault_lib::run().await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
