use std::time::Duration;
use yfinance_proxy::config::YahooEndpoints;
use yfinance_proxy::error::ProviderError;
use yfinance_proxy::yahoo::YahooClient;

#[tokio::main]
async fn main() -> Result<(), ProviderError> {
    println!("Yahoo Client Example");
    println!("====================");

    let client = YahooClient::new(YahooEndpoints::default(), Duration::from_secs(30))?;
    let ticker = client.ticker("AAPL");

    // 1. Informational snapshot
    println!("\n🏢 Snapshot for {}", ticker.symbol());
    println!("{}", "-".repeat(40));

    match ticker.info().await {
        Ok(info) => {
            println!("✅ Success! {} fields retrieved", info.len());
            for key in ["longName", "sector", "currency", "regularMarketPrice", "marketCap"] {
                println!("  {key}: {}", info.get(key).map(|v| v.to_string()).unwrap_or_else(|| "-".into()));
            }
        }
        Err(e) => println!("❌ Failed to retrieve snapshot: {e}"),
    }

    tokio::time::sleep(Duration::from_secs(1)).await;

    // 2. Last month of daily bars
    println!("\n📈 History for {}", ticker.symbol());
    println!("{}", "-".repeat(40));

    match ticker.history("1mo", "1d").await {
        Ok(bars) => {
            println!("✅ Success! Retrieved {} bars", bars.len());
            if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
                println!("📅 Range: {} to {}", first["Date"], last["Date"]);
                println!("💹 Latest close: {}", last["Close"]);
            }
        }
        Err(e) => println!("❌ Failed to retrieve history: {e}"),
    }

    println!("\n{}", "=".repeat(40));
    Ok(())
}
