#[tokio::main]
async fn main() {
    wildlife::start_server().await;
}
