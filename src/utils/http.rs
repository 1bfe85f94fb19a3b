use reqwest::{Client, Proxy};
use std::time::Duration;

use crate::Result;

/// Client for one-off authenticated requests; cookies are passed per request.
pub fn build_client(timeout_secs: u64, proxy: Option<&str>) -> Result<Client> {
    let mut builder = Client::builder().timeout(Duration::from_secs(timeout_secs));
    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }
    Ok(builder.build()?)
}
