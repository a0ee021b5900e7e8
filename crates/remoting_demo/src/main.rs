use lib_remoting_demo::init;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init().await
}
