use mock_server::{MockResponse, MockState};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let script = std::env::var("MOCK_RESPONSES").unwrap_or_else(|_| "200".to_string());
    let responses = MockResponse::parse_script(&script)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("listening on {addr} serving {script}");
    mock_server::run(listener, MockState::new(responses)).await
}
