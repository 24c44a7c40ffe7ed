#[tokio::main]
async fn main() {
    if let Err(e) = aqar_match_lib::run().await {
        eprintln!("aqar-match 启动失败: {:#}", e);
        std::process::exit(1);
    }
}
