//! Simple example of using reqwest-proxy-fetch.

use reqwest_proxy_fetch::{
    Downloader, DownloaderConfig, FetchOptions, HttpProxySource, RequestForm,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Initializing downloader...");

    let config = DownloaderConfig::builder()
        // free proxy list, one `scheme://host:port` per line
        .proxy_source_url("https://cdn.jsdelivr.net/gh/proxifly/free-proxy-list@main/proxies/protocols/http/data.txt")
        .pool_capacity(10)
        .max_reuse(5)
        .timeout(Duration::from_secs(15))
        .build();

    let source = Arc::new(HttpProxySource::new(config.proxy_source_url.clone()));
    let downloader = Downloader::new(config, source).await?;

    println!("Fetching...");
    match downloader
        .download("https://httpbin.org/ip", FetchOptions::default())
        .await
    {
        Some(response) => {
            println!("Status: {}", response.status);
            if let Some((scheme, endpoint)) = &response.proxy {
                println!("Served via proxy {}://{}", scheme, endpoint);
            }
            println!("Response: {}", response.text());
        }
        None => println!("Download failed after retries, see logs."),
    }

    // A structured POST: `data` implies the method.
    let form = RequestForm::new("https://httpbin.org/post")
        .data(vec![("q".to_string(), "rust".to_string())])
        .keep_status_code(true);
    if let Some(response) = downloader.download(form, FetchOptions::default()).await {
        println!("POST status: {}", response.status);
    }

    Ok(())
}
