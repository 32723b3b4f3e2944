#[tokio::main]
async fn main() {
    let code = droid_inventory_lib::run().await;
    std::process::exit(code);
}
